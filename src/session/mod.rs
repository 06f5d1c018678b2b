//! 截图会话模块
//!
//! # 设计思路
//!
//! `CaptureSession` 把整条流水线串起来：
//!
//! ```text
//! 驱动能力 ─→ 选定修正策略 ─→ 选定滚动提供者 ─→ 拼接 ─→ (缩放) ─→ 差分编码 ─→ 上传载荷
//! ```
//!
//! 一个会话绑定一个驱动，会话之间没有共享可变状态，可以完全并行。
//! 同一目标的独占使用由调用方保证。
//!
//! # 实现思路
//!
//! - 像素比、渲染器档位与 iframe 深度在每次截图开始时读取一次，整次截图内不变。
//! - 移动端目标按 `platformName` 选择平台，无法识别时直接报错。
//! - 有基线时输出差分块并上传差分；没有基线时不做差分编码，直接上传完整 PNG。

mod upload;

pub use upload::{CaptureMetadata, ImageBody, UploadPayload, UploadSink};

use std::fmt;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};

use crate::codec::{DeltaBlock, FORMAT_VERSION, ImageDeltaCompressor};
use crate::config::CaptureConfig;
use crate::driver::{ElementId, TargetDriver};
use crate::error::CaptureError;
use crate::logging::Logger;
use crate::positioning::{
    ElementPositionProvider, MobilePlatform, MobilePositionProvider, PositionProvider,
    ScrollPositionProvider,
};
use crate::raster::{RasterImage, scale_image};
use crate::stitching::{CancelFlag, StitchEngine};

/// 截图目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureTarget {
    Page,
    Element(ElementId),
    Mobile,
}

impl fmt::Display for CaptureTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Page => write!(f, "page"),
            Self::Element(id) => write!(f, "element#{}", id.0),
            Self::Mobile => write!(f, "mobile"),
        }
    }
}

/// 一次截图的产物。
#[derive(Debug)]
pub struct CaptureOutcome {
    pub image: RasterImage,
    /// 相对基线的差分块；没有基线时为 `None`
    pub delta: Option<DeltaBlock>,
    pub metadata: CaptureMetadata,
}

impl CaptureOutcome {
    /// 组装上传载荷。
    pub fn into_upload_payload(self) -> Result<UploadPayload, CaptureError> {
        let body = match self.delta {
            Some(delta) => ImageBody::Delta(delta.into_bytes()),
            None => ImageBody::Full(self.image.encode_png()?),
        };

        Ok(UploadPayload {
            metadata: self.metadata,
            body,
        })
    }
}

pub struct CaptureSession {
    driver: Arc<dyn TargetDriver>,
    logger: Logger,
    config: CaptureConfig,
    compressor: ImageDeltaCompressor,
}

impl CaptureSession {
    pub fn new(
        driver: Arc<dyn TargetDriver>,
        logger: Logger,
        config: CaptureConfig,
    ) -> Result<Self, CaptureError> {
        config.validate()?;
        let compressor = ImageDeltaCompressor::new(config.delta_tile_rows)?;

        Ok(Self {
            driver,
            logger,
            config,
            compressor,
        })
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// 截取 `target` 的完整内容，有 `baseline` 时对其做差分编码。
    ///
    /// `baseline` 必须与本次结果尺寸、像素格式一致，否则返回 `DimensionMismatch`。
    pub async fn capture(
        &self,
        target: &CaptureTarget,
        baseline: Option<&RasterImage>,
        cancel: &CancelFlag,
    ) -> Result<CaptureOutcome, CaptureError> {
        let target_name = target.to_string();
        self.logger.log(format_args!("开始截图 [{target_name}]"));

        let pixel_ratio = self
            .driver
            .query_pixel_ratio()
            .await
            .map_err(|e| CaptureError::target_unavailable(&target_name, e))?;
        if !pixel_ratio.is_finite() || pixel_ratio <= 0.0 {
            return Err(CaptureError::target_unavailable(
                &target_name,
                format!("无效的像素比 {pixel_ratio}"),
            ));
        }

        let profile = self
            .driver
            .query_renderer_profile()
            .await
            .map_err(|e| CaptureError::target_unavailable(&target_name, e))?;
        let frame_depth = self
            .driver
            .query_frame_depth()
            .await
            .map_err(|e| CaptureError::target_unavailable(&target_name, e))?;
        self.logger.verbose(format_args!(
            "像素比 {pixel_ratio}, 渲染器 {}, iframe 深度 {frame_depth}",
            profile.as_str()
        ));

        let provider = self.provider_for(target, pixel_ratio).await?;
        let mut engine = StitchEngine::new(
            Arc::clone(&self.driver),
            profile.compensation(frame_depth > 0),
            pixel_ratio,
            self.config.clone(),
            self.logger.clone(),
        )?;
        let report = engine.stitch(provider.as_ref(), cancel).await?;

        let scaled = self.config.scale_to_css_pixels && pixel_ratio != 1.0;
        let image = if scaled {
            scale_image(report.image, 1.0 / pixel_ratio, self.config.resize_filter, &self.logger)?
        } else {
            report.image
        };

        let delta = match baseline {
            Some(baseline) => {
                let delta = self.compressor.compress(Some(baseline), &image)?;
                let stats = delta.stats()?;
                self.logger.log(format_args!(
                    "差分编码 [{target_name}]: {} 字节, {} 个复制段 ({} 块), {} 个字面块",
                    delta.len(),
                    stats.copy_runs,
                    stats.copied_tiles,
                    stats.literal_tiles
                ));
                Some(delta)
            }
            None => None,
        };

        let metadata = CaptureMetadata {
            target: target_name,
            viewport_size: report.viewport_size,
            entire_size: report.entire_size,
            image_size: image.size(),
            renderer_profile: profile,
            pixel_ratio,
            scaled_to_css_pixels: scaled,
            captured_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            iterations: report.iterations,
            delta_format_version: FORMAT_VERSION,
            baseline_present: baseline.is_some(),
        };

        Ok(CaptureOutcome {
            image,
            delta,
            metadata,
        })
    }

    /// 截图后交给 `sink` 上传，返回本次截图的结果图像。
    pub async fn capture_and_upload(
        &self,
        target: &CaptureTarget,
        baseline: Option<&RasterImage>,
        cancel: &CancelFlag,
        sink: &dyn UploadSink,
    ) -> Result<RasterImage, CaptureError> {
        let outcome = self.capture(target, baseline, cancel).await?;
        let image = outcome.image.clone();
        let payload = outcome.into_upload_payload()?;
        self.logger.verbose(format_args!(
            "上传 {} 载荷 {} 字节",
            payload.body.kind(),
            payload.body.len()
        ));
        sink.upload(payload).await?;
        Ok(image)
    }

    async fn provider_for(
        &self,
        target: &CaptureTarget,
        pixel_ratio: f64,
    ) -> Result<Box<dyn PositionProvider>, CaptureError> {
        let driver = Arc::clone(&self.driver);
        let logger = self.logger.clone();

        match target {
            CaptureTarget::Page => Ok(Box::new(ScrollPositionProvider::new(driver, logger))),
            CaptureTarget::Element(id) => Ok(Box::new(ElementPositionProvider::new(
                driver,
                id.clone(),
                logger,
            ))),
            CaptureTarget::Mobile => {
                let name = self
                    .driver
                    .platform_name()
                    .await
                    .map_err(|e| CaptureError::target_unavailable("mobile", e))?
                    .unwrap_or_default();
                let version = self
                    .driver
                    .platform_version()
                    .await
                    .map_err(|e| CaptureError::target_unavailable("mobile", e))?;
                let platform = MobilePlatform::from_platform_name(&name).ok_or_else(|| {
                    CaptureError::target_unavailable("mobile", format!("无法识别的平台 '{name}'"))
                })?;
                self.logger.verbose(format_args!(
                    "移动平台 {platform:?} {}",
                    version.as_deref().unwrap_or("unknown")
                ));
                Ok(Box::new(MobilePositionProvider::new(
                    driver,
                    platform,
                    pixel_ratio,
                    logger,
                )?))
            }
        }
    }
}
