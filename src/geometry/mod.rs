//! 几何基础类型模块
//!
//! 提供截图流水线中所有坐标计算共用的值类型：
//! - `Location`：二维点（滚动偏移、区域左上角）
//! - `RectangleSize`：宽高（视口尺寸、内容尺寸）
//! - `Region`：矩形区域（截图裁剪区、页面区域）
//!
//! # 设计思路
//!
//! - 全部为 `Copy` 值类型，构造后不可变，所有运算返回新值。
//! - `Region` 的宽高使用有符号整数，允许求交/平移过程中出现的临时负值，
//!   由 `is_size_empty` 统一判定“无面积”，再收敛到 `Region::EMPTY`。
//! - 缩放统一向上取整，保证缩放后的区域不会丢失边缘像素。
//!
//! # 实现思路
//!
//! - 边界判断采用左闭右开区间 `[left, right)`，相邻区域交界处不会重复命中。
//! - 求交无重叠时返回 `Region::EMPTY`，调用方无需再判断负宽高。

use std::fmt;

use serde::{Deserialize, Serialize};

/// 二维坐标点。
///
/// 坐标可以暂时为负（例如换算到上下文相对坐标时）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Location {
    pub x: i32,
    pub y: i32,
}

impl Location {
    pub const ZERO: Location = Location { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// 平移后的新坐标。
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
    }

    /// 两点之差 `self - other`。
    pub fn sub(self, other: Location) -> Self {
        Self::new(self.x.saturating_sub(other.x), self.y.saturating_sub(other.y))
    }

    /// 按比例缩放（向上取整）。
    pub fn scale(self, ratio: f64) -> Self {
        Self::new(scale_ceil(self.x, ratio), scale_ceil(self.y, ratio))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// 宽高尺寸，始终非负。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RectangleSize {
    pub width: u32,
    pub height: u32,
}

impl RectangleSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// 面积（像素数），使用 `u64` 避免大图溢出。
    pub fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// 按比例缩放（向上取整）。
    pub fn scale(self, ratio: f64) -> Self {
        Self::new(
            scale_ceil(self.width as i32, ratio).max(0) as u32,
            scale_ceil(self.height as i32, ratio).max(0) as u32,
        )
    }
}

impl fmt::Display for RectangleSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// 区域坐标所在的坐标空间。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatesType {
    /// 截图图像内的原始像素坐标。
    #[default]
    ScreenshotAsIs,
    /// 相对当前上下文（页面/元素）可视区域的坐标。
    ContextRelative,
    /// 当前上下文的完整内容坐标（含已滚出视口的部分）。
    ContextAsIs,
}

/// 矩形区域。
///
/// 宽高允许为负，仅用于表达运算中的临时状态；
/// 任何对外结果在无面积时都应收敛为 [`Region::EMPTY`]。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
    #[serde(default)]
    pub coordinates_type: CoordinatesType,
}

impl Default for Region {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Region {
    /// 规范空区域。
    pub const EMPTY: Region = Region {
        left: 0,
        top: 0,
        width: 0,
        height: 0,
        coordinates_type: CoordinatesType::ScreenshotAsIs,
    };

    pub const fn new(left: i32, top: i32, width: i32, height: i32) -> Self {
        Self {
            left,
            top,
            width,
            height,
            coordinates_type: CoordinatesType::ScreenshotAsIs,
        }
    }

    pub fn from_parts(location: Location, size: RectangleSize) -> Self {
        Self::new(
            location.x,
            location.y,
            clamp_to_i32(size.width),
            clamp_to_i32(size.height),
        )
    }

    pub fn with_coordinates_type(mut self, coordinates_type: CoordinatesType) -> Self {
        self.coordinates_type = coordinates_type;
        self
    }

    pub fn location(&self) -> Location {
        Location::new(self.left, self.top)
    }

    /// 区域尺寸，负宽高收敛为 0。
    pub fn size(&self) -> RectangleSize {
        RectangleSize::new(self.width.max(0) as u32, self.height.max(0) as u32)
    }

    pub fn right(&self) -> i32 {
        self.left.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i32 {
        self.top.saturating_add(self.height)
    }

    /// 宽或高不为正即视为无面积。
    pub fn is_size_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    /// 平移后的新区域，坐标空间保持不变。
    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self {
            left: self.left.saturating_add(dx),
            top: self.top.saturating_add(dy),
            ..*self
        }
    }

    /// 求交。无重叠时返回 `Region::EMPTY`。
    pub fn intersect(&self, other: &Region) -> Self {
        if self.is_size_empty() || other.is_size_empty() {
            return Self::EMPTY;
        }

        let left = self.left.max(other.left);
        let top = self.top.max(other.top);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right <= left || bottom <= top {
            return Self::EMPTY;
        }

        Self {
            left,
            top,
            width: right - left,
            height: bottom - top,
            coordinates_type: self.coordinates_type,
        }
    }

    /// 点是否落在区域内（左闭右开）。
    pub fn contains_location(&self, location: Location) -> bool {
        location.x >= self.left
            && location.x < self.right()
            && location.y >= self.top
            && location.y < self.bottom()
    }

    /// `other` 是否完整落在当前区域内。
    pub fn contains(&self, other: &Region) -> bool {
        !other.is_size_empty()
            && other.left >= self.left
            && other.top >= self.top
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// 按比例缩放位置与尺寸（向上取整）。
    pub fn scale(&self, ratio: f64) -> Self {
        Self {
            left: scale_ceil(self.left, ratio),
            top: scale_ceil(self.top, ratio),
            width: scale_ceil(self.width, ratio),
            height: scale_ceil(self.height, ratio),
            coordinates_type: self.coordinates_type,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}) {}x{}, {:?}",
            self.left, self.top, self.width, self.height, self.coordinates_type
        )
    }
}

fn scale_ceil(value: i32, ratio: f64) -> i32 {
    let scaled = (value as f64 * ratio).ceil();
    scaled.clamp(i32::MIN as f64, i32::MAX as f64) as i32
}

fn clamp_to_i32(value: u32) -> i32 {
    value.min(i32::MAX as u32) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn offset_keeps_size_and_coordinates_type() {
        let region = Region::new(10, 20, 30, 40).with_coordinates_type(CoordinatesType::ContextAsIs);
        let moved = region.offset(5, -7);

        assert_eq!(moved.location(), Location::new(15, 13));
        assert_eq!(moved.size(), RectangleSize::new(30, 40));
        assert_eq!(moved.coordinates_type, CoordinatesType::ContextAsIs);
    }

    #[test]
    fn intersect_overlapping_regions() {
        let a = Region::new(0, 0, 100, 100);
        let b = Region::new(50, 60, 100, 100);

        assert_eq!(a.intersect(&b), Region::new(50, 60, 50, 40));
    }

    #[test]
    fn intersect_touching_edges_is_empty() {
        // 右边界开区间，紧贴不算重叠
        let a = Region::new(0, 0, 100, 100);
        let b = Region::new(100, 0, 50, 50);

        assert!(a.intersect(&b).is_empty());
    }

    #[test]
    fn negative_size_is_size_empty() {
        assert!(Region::new(5, 5, -1, 10).is_size_empty());
        assert!(Region::new(5, 5, 10, 0).is_size_empty());
        assert!(!Region::new(5, 5, 1, 1).is_size_empty());
        assert_eq!(Region::new(5, 5, -3, 10).size(), RectangleSize::new(0, 10));
    }

    #[test]
    fn contains_location_is_half_open() {
        let region = Region::new(0, 0, 1920, 1080);

        assert!(region.contains_location(Location::new(0, 0)));
        assert!(!region.contains_location(Location::new(1920, 540)));
        assert!(!region.contains_location(Location::new(960, 1080)));
    }

    #[test]
    fn scale_rounds_up() {
        let region = Region::new(1, 3, 5, 7);
        assert_eq!(region.scale(1.5), Region::new(2, 5, 8, 11));
        assert_eq!(RectangleSize::new(5, 7).scale(0.5), RectangleSize::new(3, 4));
        assert_eq!(Location::new(-3, 3).scale(0.5), Location::new(-1, 2));
    }

    #[test]
    fn display_formats() {
        assert_eq!(Location::new(3, -4).to_string(), "(3, -4)");
        assert_eq!(RectangleSize::new(800, 600).to_string(), "800x600");
    }

    proptest! {
        #[test]
        fn intersect_is_commutative_and_contained(
            ax in -500i32..500, ay in -500i32..500, aw in 0i32..400, ah in 0i32..400,
            bx in -500i32..500, by in -500i32..500, bw in 0i32..400, bh in 0i32..400,
        ) {
            let a = Region::new(ax, ay, aw, ah);
            let b = Region::new(bx, by, bw, bh);
            let ab = a.intersect(&b);

            prop_assert_eq!(ab, b.intersect(&a));
            if !ab.is_empty() {
                prop_assert!(a.contains(&ab));
                prop_assert!(b.contains(&ab));
            }
        }

        #[test]
        fn offset_roundtrip(x in -10_000i32..10_000, y in -10_000i32..10_000, dx in -500i32..500, dy in -500i32..500) {
            let region = Region::new(x, y, 10, 10);
            prop_assert_eq!(region.offset(dx, dy).offset(-dx, -dy), region);
        }
    }
}
