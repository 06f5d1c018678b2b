//! # 像素缓冲模块（raster）
//!
//! ## 设计思路
//!
//! `RasterImage` 是整条“截图 → 修正 → 拼接 → 编码”链路中唯一的像素载体，
//! 构造时校验 `bytes.len() == width * height * bytes_per_pixel`，之后不再变更尺寸。
//! 所有权按阶段移动，不在组件之间共享引用。
//!
//! - `decode`：PNG / Base64 截图解码与像素上限校验
//! - `scale`：按像素比缩放（`fast_image_resize`，失败回退 `image`）
//!
//! ## 实现思路
//!
//! 像素拷贝（`blit` / `crop`）一律按行处理，先用 `Region` 求交裁掉越界部分，
//! 再逐行 `copy_from_slice`，避免逐像素循环。

mod decode;
mod scale;

pub use decode::DecodeLimits;
pub use scale::scale_image;

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use crate::geometry::{Location, RectangleSize, Region};

/// 像素缓冲相关错误。
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("像素缓冲长度异常：期望 {expected} 字节，实际 {actual} 字节")]
    InvalidBuffer { expected: usize, actual: usize },

    #[error("像素格式不一致：{0:?} 与 {1:?}")]
    FormatMismatch(PixelFormat, PixelFormat),

    #[error("格式错误：{0}")]
    InvalidFormat(String),

    #[error("解码错误：{0}")]
    Decode(String),

    #[error("编码错误：{0}")]
    Encode(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),
}

/// 像素格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    Rgba8,
    Rgb8,
    Gray8,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8 => 4,
            Self::Rgb8 => 3,
            Self::Gray8 => 1,
        }
    }

    /// 线格式中的格式编码。
    pub const fn code(self) -> u8 {
        match self {
            Self::Rgba8 => 1,
            Self::Rgb8 => 2,
            Self::Gray8 => 3,
        }
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Rgba8),
            2 => Some(Self::Rgb8),
            3 => Some(Self::Gray8),
            _ => None,
        }
    }
}

/// 已解码的像素图像。
#[derive(Clone, PartialEq, Eq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    format: PixelFormat,
    bytes: Vec<u8>,
}

impl std::fmt::Debug for RasterImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl RasterImage {
    /// 用现有像素字节构造图像，长度不符时拒绝。
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        bytes: Vec<u8>,
    ) -> Result<Self, RasterError> {
        let expected = Self::expected_len(width, height, format)?;
        if bytes.len() != expected {
            return Err(RasterError::InvalidBuffer {
                expected,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            width,
            height,
            format,
            bytes,
        })
    }

    /// 全零像素的空白画布。
    pub fn blank(width: u32, height: u32, format: PixelFormat) -> Result<Self, RasterError> {
        let len = Self::expected_len(width, height, format)?;
        Ok(Self {
            width,
            height,
            format,
            bytes: vec![0; len],
        })
    }

    fn expected_len(width: u32, height: u32, format: PixelFormat) -> Result<usize, RasterError> {
        (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(format.bytes_per_pixel()))
            .ok_or_else(|| {
                RasterError::ResourceLimit(format!("图片尺寸导致内存溢出风险：{}x{}", width, height))
            })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn size(&self) -> RectangleSize {
        RectangleSize::new(self.width, self.height)
    }

    pub fn bounds(&self) -> Region {
        Region::from_parts(Location::ZERO, self.size())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// 单行字节数。
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// 尺寸与格式是否一致（编解码前置条件）。
    pub fn same_layout(&self, other: &RasterImage) -> bool {
        self.width == other.width && self.height == other.height && self.format == other.format
    }

    /// 将 `src` 中 `src_region` 的像素拷贝到当前图像 `dest` 位置。
    ///
    /// 源区域与目标区域越界部分都会被裁掉，完全越界时不做任何事。
    /// 返回实际写入的行数。
    pub fn blit(
        &mut self,
        src: &RasterImage,
        src_region: Region,
        dest: Location,
    ) -> Result<u32, RasterError> {
        if src.format != self.format {
            return Err(RasterError::FormatMismatch(src.format, self.format));
        }

        let clipped = src_region.intersect(&src.bounds());
        if clipped.is_empty() {
            return Ok(0);
        }

        let dest = dest.offset(clipped.left - src_region.left, clipped.top - src_region.top);
        let dest_region = Region::from_parts(dest, clipped.size()).intersect(&self.bounds());
        if dest_region.is_empty() {
            return Ok(0);
        }

        let src_x = clipped.left + (dest_region.left - dest.x);
        let src_y = clipped.top + (dest_region.top - dest.y);
        let bpp = self.format.bytes_per_pixel();
        let span = dest_region.width as usize * bpp;
        let src_row_bytes = src.row_bytes();
        let dst_row_bytes = self.row_bytes();

        for row in 0..dest_region.height as usize {
            let src_start = (src_y as usize + row) * src_row_bytes + src_x as usize * bpp;
            let dst_start = (dest_region.top as usize + row) * dst_row_bytes + dest_region.left as usize * bpp;
            self.bytes[dst_start..dst_start + span]
                .copy_from_slice(&src.bytes[src_start..src_start + span]);
        }

        Ok(dest_region.height as u32)
    }

    /// 裁剪出 `region` 与图像边界的交集；无交集时返回 0x0 图像。
    pub fn crop(&self, region: Region) -> Result<RasterImage, RasterError> {
        let clipped = region.intersect(&self.bounds());
        let size = clipped.size();
        let mut out = RasterImage::blank(size.width, size.height, self.format)?;
        if !clipped.is_empty() {
            out.blit(self, clipped, Location::ZERO)?;
        }
        Ok(out)
    }

    pub(crate) fn from_dynamic(image: DynamicImage) -> Result<Self, RasterError> {
        let (width, height) = (image.width(), image.height());
        match image {
            DynamicImage::ImageLuma8(gray) => Self::new(width, height, PixelFormat::Gray8, gray.into_raw()),
            DynamicImage::ImageRgb8(rgb) => Self::new(width, height, PixelFormat::Rgb8, rgb.into_raw()),
            other => Self::new(width, height, PixelFormat::Rgba8, other.to_rgba8().into_raw()),
        }
    }

    pub(crate) fn to_dynamic(&self) -> Result<DynamicImage, RasterError> {
        let bytes = self.bytes.clone();
        let image = match self.format {
            PixelFormat::Rgba8 => RgbaImage::from_raw(self.width, self.height, bytes).map(DynamicImage::ImageRgba8),
            PixelFormat::Rgb8 => RgbImage::from_raw(self.width, self.height, bytes).map(DynamicImage::ImageRgb8),
            PixelFormat::Gray8 => GrayImage::from_raw(self.width, self.height, bytes).map(DynamicImage::ImageLuma8),
        };

        image.ok_or_else(|| RasterError::InvalidBuffer {
            expected: self.bytes.len(),
            actual: self.bytes.len(),
        })
    }

    /// 编码为 PNG，用于整图上传。
    pub fn encode_png(&self) -> Result<Vec<u8>, RasterError> {
        let dynamic = self.to_dynamic()?;
        let mut out = Cursor::new(Vec::new());
        dynamic
            .write_to(&mut out, ImageFormat::Png)
            .map_err(|e| RasterError::Encode(format!("PNG 编码失败：{}", e)))?;
        Ok(out.into_inner())
    }
}
