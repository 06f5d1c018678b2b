//! 区域位置修正模块（按渲染器档位）
//!
//! 不同渲染器在特定像素比下会把元素/视口坐标报偏几个像素，偏移量是经验常数。
//! 每种偏差收敛到一个 `RegionPositionCompensation` 实现里，拼接算法本身不感知任何浏览器差异。
//!
//! 修正后的区域用来在原始截图里取样：内容在截图中实际落在哪里。
//! 画布上的写入位置不受影响，仍是滚动后实际到达的偏移。
//!
//! # 设计思路
//!
//! - 会话开始时根据 `RendererProfile` 选定一次修正策略，整个会话不再切换。
//! - 新增浏览器 = 新增一个 `RendererProfile` 变体 + 一个实现，不需要继承层级。
//!
//! # 已知修正
//!
//! | 档位 | 像素比 = 1 | 无面积区域 | 其它 |
//! |------|-----------|-----------|------|
//! | Safari | 原样返回 | `Region::EMPTY` | 下移 `ceil(ratio)` |
//! | Firefox（顶层文档） | 原样返回 | `Region::EMPTY` | 上移 `ceil(ratio / 2)` |
//! | 其它 | 原样返回 | 原样返回 | 原样返回 |

use serde::{Deserialize, Serialize};

use crate::geometry::Region;

/// 渲染器档位，由驱动能力决定。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RendererProfile {
    Chrome,
    Firefox,
    Safari,
    Edge,
    InternetExplorer,
    Other,
}

impl RendererProfile {
    /// 从浏览器名解析档位，无法识别时归为 `Other`。
    pub fn from_browser_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "chrome" | "chromium" | "googlechrome" => Self::Chrome,
            "firefox" | "mozilla firefox" => Self::Firefox,
            "safari" | "mobilesafari" => Self::Safari,
            "edge" | "msedge" | "microsoftedge" => Self::Edge,
            "ie" | "internet explorer" | "internet_explorer" | "internetexplorer" => Self::InternetExplorer,
            _ => Self::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chrome => "chrome",
            Self::Firefox => "firefox",
            Self::Safari => "safari",
            Self::Edge => "edge",
            Self::InternetExplorer => "internet_explorer",
            Self::Other => "other",
        }
    }

    /// 选定该档位的修正策略。
    ///
    /// `in_frame` 表示截图发生在 iframe 内部。
    pub fn compensation(self, in_frame: bool) -> Box<dyn RegionPositionCompensation> {
        match self {
            Self::Safari => Box::new(SafariRegionPositionCompensation),
            Self::Firefox => Box::new(FirefoxRegionPositionCompensation { in_frame }),
            Self::Chrome | Self::Edge | Self::InternetExplorer | Self::Other => {
                Box::new(NullRegionPositionCompensation)
            }
        }
    }
}

/// 区域位置修正策略。
///
/// 输入为截图在整页物理像素坐标中声称覆盖的区域，输出为内容实际所在的区域。
pub trait RegionPositionCompensation: Send + Sync {
    fn compensate_region_position(&self, region: Region, pixel_ratio: f64) -> Region;
}

/// 不做任何修正。
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRegionPositionCompensation;

impl RegionPositionCompensation for NullRegionPositionCompensation {
    fn compensate_region_position(&self, region: Region, _pixel_ratio: f64) -> Region {
        region
    }
}

/// Safari：像素比大于 1 时纵向少报 `ceil(ratio)` 像素。
#[derive(Debug, Default, Clone, Copy)]
pub struct SafariRegionPositionCompensation;

impl RegionPositionCompensation for SafariRegionPositionCompensation {
    fn compensate_region_position(&self, region: Region, pixel_ratio: f64) -> Region {
        if pixel_ratio == 1.0 {
            return region;
        }

        if region.is_size_empty() {
            return Region::EMPTY;
        }

        region.offset(0, pixel_ratio.ceil() as i32)
    }
}

/// Firefox：顶层文档中纵向多报 `ceil(ratio / 2)` 像素，iframe 内不受影响。
#[derive(Debug, Default, Clone, Copy)]
pub struct FirefoxRegionPositionCompensation {
    pub in_frame: bool,
}

impl RegionPositionCompensation for FirefoxRegionPositionCompensation {
    fn compensate_region_position(&self, region: Region, pixel_ratio: f64) -> Region {
        if pixel_ratio == 1.0 || self.in_frame {
            return region;
        }

        if region.is_size_empty() {
            return Region::EMPTY;
        }

        region.offset(0, -((pixel_ratio / 2.0).ceil() as i32))
    }
}
