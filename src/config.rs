//! # 截图配置模块
//!
//! ## 设计思路
//!
//! 将拼接、编码、归一化阶段的所有“可调策略”集中到 `CaptureConfig`，
//! 会话构造时传入一份快照，单次截图过程中配置不会漂移。
//!
//! ## 实现思路
//!
//! - `Default` 提供生产可用的默认值。
//! - `validate` 在会话构造时拒绝明显错误的组合（零分块、零迭代上限等）。
//! - `load_from_path` 读取 JSON；文件缺失或解析失败时回退默认值并记录警告，
//!   保证配置损坏不会阻塞截图。

use std::fs;
use std::path::Path;

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use crate::error::CaptureError;
use crate::logging::Logger;
use crate::raster::DecodeLimits;

/// 缩放滤镜。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    Nearest,
    #[default]
    Bilinear,
    CatmullRom,
    Lanczos3,
}

impl ResizeFilter {
    pub(crate) fn to_image_filter(self) -> FilterType {
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Bilinear => FilterType::Triangle,
            Self::CatmullRom => FilterType::CatmullRom,
            Self::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// 截图流水线配置。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// 相邻两次视口截图的重叠像素（CSS 像素）。
    pub stitch_overlap: u32,
    /// 拼接定位步数上限，防止滚动条永不到底时死循环。
    pub max_stitch_iterations: u32,
    /// 每次滚动后、截图前的等待时间（毫秒），给页面重绘留时间。
    pub wait_before_capture_ms: u64,
    /// 差分编码每个分块包含的像素行数。
    pub delta_tile_rows: u32,
    /// 拼接结果允许的最大像素数（`width * height`）。
    pub max_stitched_pixels: u64,
    /// 是否把物理像素截图缩放回 CSS 像素。
    pub scale_to_css_pixels: bool,
    /// 缩放滤镜。
    pub resize_filter: ResizeFilter,
    /// 单张视口截图编码后的体积上限（字节）。
    pub max_screenshot_bytes: u64,
    /// 单张视口截图解码后的像素上限。
    pub max_screenshot_pixels: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            stitch_overlap: 50,
            max_stitch_iterations: 100,
            wait_before_capture_ms: 100,
            delta_tile_rows: 10,
            max_stitched_pixels: 100_000_000,
            scale_to_css_pixels: false,
            resize_filter: ResizeFilter::Bilinear,
            max_screenshot_bytes: 64 * 1024 * 1024,
            max_screenshot_pixels: 40_000_000,
        }
    }
}

impl CaptureConfig {
    /// 校验配置组合。
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.delta_tile_rows == 0 {
            return Err(CaptureError::InvalidConfig("delta_tile_rows 必须大于 0".to_string()));
        }
        if self.max_stitch_iterations == 0 {
            return Err(CaptureError::InvalidConfig("max_stitch_iterations 必须大于 0".to_string()));
        }
        if self.stitch_overlap >= 10_000 {
            return Err(CaptureError::InvalidConfig("stitch_overlap 必须小于 10000".to_string()));
        }
        if self.max_stitched_pixels == 0 {
            return Err(CaptureError::InvalidConfig("max_stitched_pixels 必须大于 0".to_string()));
        }
        if self.max_screenshot_bytes == 0 || self.max_screenshot_pixels == 0 {
            return Err(CaptureError::InvalidConfig("截图解码上限必须大于 0".to_string()));
        }
        Ok(())
    }

    /// 视口截图的解码上限。
    pub fn screenshot_limits(&self) -> DecodeLimits {
        DecodeLimits {
            max_encoded_bytes: self.max_screenshot_bytes,
            max_pixels: self.max_screenshot_pixels,
        }
    }

    /// 从 JSON 文件加载，失败时回退默认值。
    pub fn load_from_path(path: &Path, logger: &Logger) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    logger.warn(format_args!("解析截图配置失败，使用默认值: {} ({})", path.display(), e));
                    Self::default()
                }
            },
            Err(e) => {
                logger.warn(format_args!("读取截图配置失败，使用默认值: {} ({})", path.display(), e));
                Self::default()
            }
        }
    }

    /// 以格式化 JSON 写入文件。
    pub fn save_to_path(&self, path: &Path) -> Result<(), CaptureError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| CaptureError::InvalidConfig(format!("序列化配置失败: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }
}
