//! 驱动协作方接口
//!
//! 截图核心不管理 WebDriver / Appium 会话，只通过 `TargetDriver` 调用以下能力：
//! 滚动偏移读写、内容尺寸、视口截图、像素比、渲染器档位与平台信息。
//! 重试策略（如有）属于驱动实现本身，核心层不做重试。

use async_trait::async_trait;
use bytes::Bytes;

use crate::compensation::RendererProfile;
use crate::geometry::{Location, RectangleSize};
use crate::raster::{DecodeLimits, RasterError, RasterImage};

/// 元素在驱动侧的句柄。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementId(pub String);

/// 滚动作用域：整页、内部可滚动元素或移动端视图。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScrollScope {
    Document,
    Element(ElementId),
    MobileView,
}

impl std::fmt::Display for ScrollScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Document => write!(f, "document"),
            Self::Element(id) => write!(f, "element#{}", id.0),
            Self::MobileView => write!(f, "mobile-view"),
        }
    }
}

/// 驱动调用失败。
#[derive(Debug, Clone, thiserror::Error)]
pub enum DriverError {
    #[error("会话已断开: {0}")]
    SessionLost(String),

    #[error("元素已脱离文档: {0}")]
    Detached(String),

    #[error("驱动命令失败: {0}")]
    Command(String),
}

/// 驱动交回的原始截图，解码前的形态。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedScreenshot {
    /// PNG/JPEG 等编码字节
    Encoded(Bytes),
    /// Base64 文本，可带 `data:image/...;base64,` 前缀（WebDriver `takeScreenshot` 的返回形式）
    Base64(String),
}

impl EncodedScreenshot {
    pub fn decode(&self, limits: &DecodeLimits) -> Result<RasterImage, RasterError> {
        match self {
            Self::Encoded(bytes) => RasterImage::decode(bytes, limits),
            Self::Base64(text) => RasterImage::decode_base64(text, limits),
        }
    }
}

/// 驱动/会话协作方。
#[async_trait]
pub trait TargetDriver: Send + Sync {
    async fn query_scroll_offset(&self, scope: &ScrollScope) -> Result<Location, DriverError>;

    /// 尽力滚动；越界时由驱动自行收敛，调用方需重新读取实际偏移。
    async fn set_scroll_offset(&self, scope: &ScrollScope, location: Location) -> Result<(), DriverError>;

    async fn query_content_size(&self, scope: &ScrollScope) -> Result<RectangleSize, DriverError>;

    /// 当前截图目标可见区域的编码截图（物理像素）。
    ///
    /// 整页目标为浏览器视口；元素目标为该元素的可见区域；移动端为应用视图。
    /// 解码与体积上限检查由拼接引擎负责。
    async fn capture_screenshot(&self) -> Result<EncodedScreenshot, DriverError>;

    async fn query_pixel_ratio(&self) -> Result<f64, DriverError>;

    async fn query_renderer_profile(&self) -> Result<RendererProfile, DriverError>;

    /// 当前所在 iframe 深度，顶层文档为 0。
    async fn query_frame_depth(&self) -> Result<usize, DriverError> {
        Ok(0)
    }

    /// 能力中的 `platformName`。
    async fn platform_name(&self) -> Result<Option<String>, DriverError> {
        Ok(None)
    }

    /// 能力中的 `platformVersion`。
    async fn platform_version(&self) -> Result<Option<String>, DriverError> {
        Ok(None)
    }
}
