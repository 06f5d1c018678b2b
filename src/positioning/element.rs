//! 元素内部滚动提供者
//!
//! 滚动的是页面内某个可滚动元素（`overflow: auto` 之类），而不是文档本身。
//! 完整尺寸取元素的 scroll 尺寸。

use std::sync::Arc;

use async_trait::async_trait;

use super::{PositionProvider, ProviderId, ProviderKind, apply_offset, clamp_requested, query_offset, query_size};
use crate::driver::{ElementId, ScrollScope, TargetDriver};
use crate::error::CaptureError;
use crate::geometry::{Location, RectangleSize};
use crate::logging::Logger;

pub struct ElementPositionProvider {
    id: ProviderId,
    driver: Arc<dyn TargetDriver>,
    scope: ScrollScope,
    logger: Logger,
}

impl ElementPositionProvider {
    pub fn new(driver: Arc<dyn TargetDriver>, element: ElementId, logger: Logger) -> Self {
        logger.verbose(format_args!("创建元素滚动提供者: element#{}", element.0));
        Self {
            id: ProviderId::next(ProviderKind::Element),
            driver,
            scope: ScrollScope::Element(element),
            logger,
        }
    }
}

#[async_trait]
impl PositionProvider for ElementPositionProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn target_name(&self) -> String {
        self.scope.to_string()
    }

    async fn get_current_position(&self) -> Result<Location, CaptureError> {
        self.logger.verbose("读取元素滚动位置...");
        let position = query_offset(self.driver.as_ref(), &self.scope).await?;
        self.logger.verbose(format_args!("元素滚动位置: {position}"));
        Ok(position)
    }

    async fn set_position(&self, location: Location) -> Result<(), CaptureError> {
        let location = clamp_requested(location);
        self.logger.verbose(format_args!("元素滚动到 {location}"));
        apply_offset(self.driver.as_ref(), &self.scope, location).await?;
        self.logger.verbose("完成");
        Ok(())
    }

    async fn get_entire_size(&self) -> Result<RectangleSize, CaptureError> {
        self.logger.verbose("读取元素完整尺寸...");
        let size = query_size(self.driver.as_ref(), &self.scope).await?;
        self.logger.verbose(format_args!("元素完整尺寸: {size}"));
        Ok(size)
    }
}
