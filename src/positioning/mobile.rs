//! 移动端视图滚动提供者
//!
//! # 平台差异
//!
//! - Android：视图偏移与内容尺寸以物理像素上报，读取时除以像素比换算为 CSS 像素，
//!   写入时乘以像素比。
//! - iOS：以 point 上报，与 CSS 像素一致，不做换算。

use std::sync::Arc;

use async_trait::async_trait;

use super::{PositionProvider, ProviderId, ProviderKind, apply_offset, clamp_requested, query_offset, query_size};
use crate::driver::{ScrollScope, TargetDriver};
use crate::error::CaptureError;
use crate::geometry::{Location, RectangleSize};
use crate::logging::Logger;

/// 移动端平台
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MobilePlatform {
    Android,
    Ios,
}

impl MobilePlatform {
    /// 从能力中的 `platformName` 识别平台（大小写不敏感）。
    pub fn from_platform_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "ANDROID" => Some(Self::Android),
            "IOS" | "MAC" => Some(Self::Ios),
            _ => None,
        }
    }
}

pub struct MobilePositionProvider {
    id: ProviderId,
    driver: Arc<dyn TargetDriver>,
    platform: MobilePlatform,
    pixel_ratio: f64,
    logger: Logger,
}

impl MobilePositionProvider {
    pub fn new(
        driver: Arc<dyn TargetDriver>,
        platform: MobilePlatform,
        pixel_ratio: f64,
        logger: Logger,
    ) -> Result<Self, CaptureError> {
        if !pixel_ratio.is_finite() || pixel_ratio <= 0.0 {
            return Err(CaptureError::target_unavailable(
                "mobile-view",
                format!("无效的像素比 {pixel_ratio}"),
            ));
        }

        Ok(Self {
            id: ProviderId::next(ProviderKind::Mobile),
            driver,
            platform,
            pixel_ratio,
            logger,
        })
    }

    pub fn platform(&self) -> MobilePlatform {
        self.platform
    }

    fn to_css(&self, device: Location) -> Location {
        match self.platform {
            MobilePlatform::Android => Location::new(
                (device.x as f64 / self.pixel_ratio).round() as i32,
                (device.y as f64 / self.pixel_ratio).round() as i32,
            ),
            MobilePlatform::Ios => device,
        }
    }

    fn to_device(&self, css: Location) -> Location {
        match self.platform {
            MobilePlatform::Android => Location::new(
                (css.x as f64 * self.pixel_ratio).round() as i32,
                (css.y as f64 * self.pixel_ratio).round() as i32,
            ),
            MobilePlatform::Ios => css,
        }
    }
}

#[async_trait]
impl PositionProvider for MobilePositionProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn target_name(&self) -> String {
        ScrollScope::MobileView.to_string()
    }

    async fn get_current_position(&self) -> Result<Location, CaptureError> {
        let device = query_offset(self.driver.as_ref(), &ScrollScope::MobileView).await?;
        let position = self.to_css(device);
        self.logger
            .verbose(format_args!("移动端视图位置: {position} (设备 {device})"));
        Ok(position)
    }

    async fn set_position(&self, location: Location) -> Result<(), CaptureError> {
        let location = clamp_requested(location);
        let device = self.to_device(location);
        self.logger
            .verbose(format_args!("移动端视图滚动到 {location} (设备 {device})"));
        apply_offset(self.driver.as_ref(), &ScrollScope::MobileView, device).await
    }

    async fn get_entire_size(&self) -> Result<RectangleSize, CaptureError> {
        let device = query_size(self.driver.as_ref(), &ScrollScope::MobileView).await?;
        let size = match self.platform {
            MobilePlatform::Android => device.scale(1.0 / self.pixel_ratio),
            MobilePlatform::Ios => device,
        };
        self.logger.verbose(format_args!("移动端内容尺寸: {size}"));
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::positioning::testing::FakeDriver;

    fn driver() -> Arc<FakeDriver> {
        Arc::new(FakeDriver::with_size(ScrollScope::MobileView, RectangleSize::new(1080, 6000)))
    }

    #[test]
    fn recognises_platform_names() {
        assert_eq!(MobilePlatform::from_platform_name("Android"), Some(MobilePlatform::Android));
        assert_eq!(MobilePlatform::from_platform_name("iOS"), Some(MobilePlatform::Ios));
        assert_eq!(MobilePlatform::from_platform_name("mac"), Some(MobilePlatform::Ios));
        assert_eq!(MobilePlatform::from_platform_name("windows"), None);
    }

    #[tokio::test]
    async fn android_converts_between_css_and_device_pixels() {
        let driver = driver();
        let provider = MobilePositionProvider::new(driver.clone(), MobilePlatform::Android, 3.0, Logger::default())
            .expect("provider");

        provider.set_position(Location::new(0, 500)).await.expect("set");

        let calls = driver.set_calls.lock().unwrap().clone();
        assert_eq!(calls, vec![(ScrollScope::MobileView, Location::new(0, 1500))]);
        assert_eq!(provider.get_current_position().await.expect("get"), Location::new(0, 500));
        assert_eq!(provider.get_entire_size().await.expect("size"), RectangleSize::new(360, 2000));
    }

    #[tokio::test]
    async fn ios_offsets_pass_through() {
        let driver = driver();
        let provider =
            MobilePositionProvider::new(driver.clone(), MobilePlatform::Ios, 2.0, Logger::default()).expect("provider");

        provider.set_position(Location::new(0, 500)).await.expect("set");

        assert_eq!(provider.get_current_position().await.expect("get"), Location::new(0, 500));
        assert_eq!(provider.get_entire_size().await.expect("size"), RectangleSize::new(1080, 6000));
    }

    #[test]
    fn rejects_non_positive_ratio() {
        let result = MobilePositionProvider::new(driver(), MobilePlatform::Android, 0.0, Logger::default());
        assert!(result.is_err());
    }
}
