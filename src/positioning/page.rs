//! 整页滚动提供者：读写文档的滚动偏移。

use std::sync::Arc;

use async_trait::async_trait;

use super::{PositionProvider, ProviderId, ProviderKind, apply_offset, clamp_requested, query_offset, query_size};
use crate::driver::{ScrollScope, TargetDriver};
use crate::error::CaptureError;
use crate::geometry::{Location, RectangleSize};
use crate::logging::Logger;

pub struct ScrollPositionProvider {
    id: ProviderId,
    driver: Arc<dyn TargetDriver>,
    logger: Logger,
}

impl ScrollPositionProvider {
    pub fn new(driver: Arc<dyn TargetDriver>, logger: Logger) -> Self {
        Self {
            id: ProviderId::next(ProviderKind::Page),
            driver,
            logger,
        }
    }
}

#[async_trait]
impl PositionProvider for ScrollPositionProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn target_name(&self) -> String {
        ScrollScope::Document.to_string()
    }

    async fn get_current_position(&self) -> Result<Location, CaptureError> {
        let position = query_offset(self.driver.as_ref(), &ScrollScope::Document).await?;
        self.logger.verbose(format_args!("当前页面滚动位置: {position}"));
        Ok(position)
    }

    async fn set_position(&self, location: Location) -> Result<(), CaptureError> {
        let location = clamp_requested(location);
        self.logger.verbose(format_args!("页面滚动到 {location}"));
        apply_offset(self.driver.as_ref(), &ScrollScope::Document, location).await
    }

    async fn get_entire_size(&self) -> Result<RectangleSize, CaptureError> {
        let size = query_size(self.driver.as_ref(), &ScrollScope::Document).await?;
        self.logger.verbose(format_args!("页面完整尺寸: {size}"));
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::positioning::testing::FakeDriver;

    fn provider(driver: Arc<FakeDriver>) -> ScrollPositionProvider {
        ScrollPositionProvider::new(driver, Logger::default())
    }

    #[tokio::test]
    async fn set_position_is_clamped_by_driver() {
        let driver = Arc::new(FakeDriver::with_size(ScrollScope::Document, RectangleSize::new(800, 3000)));
        let page = provider(driver.clone());

        page.set_position(Location::new(-10, 5000)).await.expect("set");
        assert_eq!(page.get_current_position().await.expect("get"), Location::new(0, 3000));
        assert_eq!(page.get_entire_size().await.expect("size"), RectangleSize::new(800, 3000));
    }

    #[tokio::test]
    async fn restore_forces_saved_offset_after_external_scroll() {
        let driver = Arc::new(FakeDriver::with_size(ScrollScope::Document, RectangleSize::new(800, 3000)));
        let page = provider(driver.clone());

        page.set_position(Location::new(0, 120)).await.expect("set");
        let memento = page.get_state().await.expect("state");

        driver
            .set_scroll_offset(&ScrollScope::Document, Location::new(0, 900))
            .await
            .expect("external scroll");
        page.restore_state(memento).await.expect("restore");

        assert_eq!(page.get_current_position().await.expect("get"), Location::new(0, 120));
    }

    #[tokio::test]
    async fn memento_from_another_page_provider_is_rejected() {
        let driver = Arc::new(FakeDriver::with_size(ScrollScope::Document, RectangleSize::new(800, 3000)));
        let first = provider(driver.clone());
        let second = provider(driver.clone());

        let memento = first.get_state().await.expect("state");
        let err = second.restore_state(memento).await.unwrap_err();
        assert!(matches!(err, CaptureError::MementoMismatch { .. }));
    }
}
