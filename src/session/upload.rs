//! 上传载荷与上传协作方接口
//!
//! 核心只负责组装载荷；HTTP 传输、鉴权与重试属于 `UploadSink` 的实现。

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;

use crate::compensation::RendererProfile;
use crate::error::CaptureError;
use crate::geometry::RectangleSize;

/// 随截图一起上报的元数据。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureMetadata {
    pub target: String,
    pub viewport_size: RectangleSize,
    pub entire_size: RectangleSize,
    /// 上传图像的实际尺寸（物理像素或缩放后的 CSS 像素）
    pub image_size: RectangleSize,
    pub renderer_profile: RendererProfile,
    pub pixel_ratio: f64,
    pub scaled_to_css_pixels: bool,
    /// ISO-8601（RFC 3339）截图时间
    pub captured_at: String,
    pub iterations: u32,
    pub delta_format_version: u8,
    pub baseline_present: bool,
}

/// 图像主体：无基线时上传完整 PNG，有基线时上传差分块。
#[derive(Debug, Clone, PartialEq)]
pub enum ImageBody {
    Full(Vec<u8>),
    Delta(Bytes),
}

impl ImageBody {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Full(_) => "full",
            Self::Delta(_) => "delta",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Full(png) => png.len(),
            Self::Delta(block) => block.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadPayload {
    pub metadata: CaptureMetadata,
    pub body: ImageBody,
}

/// 上传协作方。
#[async_trait]
pub trait UploadSink: Send + Sync {
    async fn upload(&self, payload: UploadPayload) -> Result<(), CaptureError>;
}
