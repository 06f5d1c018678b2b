//! 滚动位置提供者模块
//!
//! # 设计思路
//!
//! 拼接引擎只依赖 `PositionProvider` 这一组能力：读取/设置滚动偏移、查询完整内容尺寸、
//! 保存/恢复位置快照。整页、元素内部滚动与移动端视图各自实现一份，差异被封装在实现内部。
//!
//! # 实现思路
//!
//! - `set_position` 尽力而为：负坐标截断为 0，越界由驱动自行收敛，调用方需重新读取实际偏移。
//! - 每个提供者实例带唯一 `ProviderId`，`PositionMemento` 记录创建者；
//!   在其它实例上恢复会立即返回 `MementoMismatch`。
//! - 快照不可克隆，`restore_state` 按值消费，保证只被恢复一次。
//! - 驱动错误统一映射为 `TargetUnavailable`，本层不重试。

mod element;
mod mobile;
mod page;

pub use element::ElementPositionProvider;
pub use mobile::{MobilePlatform, MobilePositionProvider};
pub use page::ScrollPositionProvider;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::driver::{ScrollScope, TargetDriver};
use crate::error::CaptureError;
use crate::geometry::{Location, RectangleSize};

static NEXT_PROVIDER_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// 提供者种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Page,
    Element,
    Mobile,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Element => "element",
            Self::Mobile => "mobile",
        }
    }
}

/// 提供者实例标识：种类 + 进程内唯一序号。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProviderId {
    kind: ProviderKind,
    instance: u64,
}

impl ProviderId {
    pub fn next(kind: ProviderKind) -> Self {
        Self {
            kind,
            instance: NEXT_PROVIDER_INSTANCE.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind.as_str(), self.instance)
    }
}

/// 位置快照，只能由创建它的提供者恢复一次。
#[derive(Debug, PartialEq, Eq)]
pub struct PositionMemento {
    owner: ProviderId,
    position: Location,
}

impl PositionMemento {
    pub fn new(owner: ProviderId, position: Location) -> Self {
        Self { owner, position }
    }

    pub fn owner(&self) -> ProviderId {
        self.owner
    }

    pub fn position(&self) -> Location {
        self.position
    }

    /// 校验快照归属。
    pub fn check_owner(&self, actual: ProviderId) -> Result<(), CaptureError> {
        if self.owner != actual {
            return Err(CaptureError::MementoMismatch {
                expected: self.owner.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }
}

/// 滚动位置能力集合。
#[async_trait]
pub trait PositionProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    /// 日志与错误中使用的目标描述。
    fn target_name(&self) -> String;

    /// 当前滚动偏移（CSS 像素），无副作用。
    async fn get_current_position(&self) -> Result<Location, CaptureError>;

    /// 尽力滚动到 `location`，实际到达位置需重新读取。
    async fn set_position(&self, location: Location) -> Result<(), CaptureError>;

    /// 可滚动内容的完整尺寸（CSS 像素）。
    async fn get_entire_size(&self) -> Result<RectangleSize, CaptureError>;

    async fn get_state(&self) -> Result<PositionMemento, CaptureError> {
        let position = self.get_current_position().await?;
        Ok(PositionMemento::new(self.id(), position))
    }

    /// 强制恢复到快照偏移，不关心期间是否被外部滚动过。
    async fn restore_state(&self, memento: PositionMemento) -> Result<(), CaptureError> {
        memento.check_owner(self.id())?;
        self.set_position(memento.position()).await
    }
}

pub(crate) fn clamp_requested(location: Location) -> Location {
    Location::new(location.x.max(0), location.y.max(0))
}

pub(crate) async fn query_offset(
    driver: &dyn TargetDriver,
    scope: &ScrollScope,
) -> Result<Location, CaptureError> {
    driver
        .query_scroll_offset(scope)
        .await
        .map_err(|e| CaptureError::target_unavailable(&scope.to_string(), e))
}

pub(crate) async fn apply_offset(
    driver: &dyn TargetDriver,
    scope: &ScrollScope,
    location: Location,
) -> Result<(), CaptureError> {
    driver
        .set_scroll_offset(scope, location)
        .await
        .map_err(|e| CaptureError::target_unavailable(&scope.to_string(), e))
}

pub(crate) async fn query_size(
    driver: &dyn TargetDriver,
    scope: &ScrollScope,
) -> Result<RectangleSize, CaptureError> {
    driver
        .query_content_size(scope)
        .await
        .map_err(|e| CaptureError::target_unavailable(&scope.to_string(), e))
}
