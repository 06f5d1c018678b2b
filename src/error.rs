//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义全局统一的 `CaptureError` 枚举，所有对外操作统一返回
//! `Result<T, CaptureError>`。错误携带足够的现场信息（目标标识、最后到达的偏移、
//! 迭代次数），调用方无需查看内部状态即可定位问题。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `DeltaError` / `RasterError` / `io::Error` 提供 `From` 转换，无需手动 map。
//! - `code()` 输出稳定错误码，供上传/报告协作方使用。
//! - 实现 `Serialize` 将错误序列化为字符串，便于随结果元数据一起上报。

use serde::Serialize;

use crate::codec::DeltaError;
use crate::geometry::Location;
use crate::raster::{RasterError, RasterImage};

/// 拼接未完成时的现场：尽力拼出的部分结果与诊断信息。
#[derive(Debug)]
pub struct IncompleteStitch {
    pub target: String,
    pub last_offset: Location,
    pub iterations: u32,
    pub partial: RasterImage,
}

/// 截图流水线统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// 驱动会话丢失、页面跳转或元素脱离文档
    ///
    /// 拼接过程中出现时带上最后到达的偏移与已用定位次数；拼接开始前为 `None` / 0。
    #[error("截图目标不可用 [{target}]: {reason}")]
    TargetUnavailable {
        target: String,
        reason: String,
        last_offset: Option<Location>,
        iterations: u32,
    },

    /// 达到迭代上限仍未覆盖完整内容
    #[error(
        "拼接未完成 [{}]: {} 次定位后停在 {}",
        .0.target, .0.iterations, .0.last_offset
    )]
    StitchIncomplete(Box<IncompleteStitch>),

    /// 位置快照与恢复它的提供者不匹配
    #[error("位置快照不匹配: 快照属于 {expected}，恢复方为 {actual}")]
    MementoMismatch { expected: String, actual: String },

    /// 调用方取消了截图
    #[error("截图已取消 [{target}]")]
    Cancelled {
        target: String,
        last_offset: Option<Location>,
        iterations: u32,
    },

    /// 差分编解码失败
    #[error("{0}")]
    Codec(#[from] DeltaError),

    /// 像素缓冲处理失败（解码 / 拼接 / 缩放）
    #[error("{0}")]
    Raster(#[from] RasterError),

    /// 配置不合法
    #[error("配置错误: {0}")]
    InvalidConfig(String),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 上传协作方拒绝了结果
    #[error("上传失败: {0}")]
    Upload(String),
}

impl CaptureError {
    pub(crate) fn target_unavailable(target: &str, reason: impl std::fmt::Display) -> Self {
        Self::TargetUnavailable {
            target: target.to_string(),
            reason: reason.to_string(),
            last_offset: None,
            iterations: 0,
        }
    }

    /// 补上拼接进度；已带进度的错误保持不变。
    pub(crate) fn with_progress(mut self, offset: Option<Location>, steps: u32) -> Self {
        match &mut self {
            Self::TargetUnavailable {
                last_offset,
                iterations,
                ..
            }
            | Self::Cancelled {
                last_offset,
                iterations,
                ..
            } if last_offset.is_none() && *iterations == 0 => {
                *last_offset = offset;
                *iterations = steps;
            }
            _ => {}
        }
        self
    }

    /// 稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            Self::TargetUnavailable { .. } => "E_TARGET_UNAVAILABLE",
            Self::StitchIncomplete(_) => "E_STITCH_INCOMPLETE",
            Self::MementoMismatch { .. } => "E_MEMENTO_MISMATCH",
            Self::Cancelled { .. } => "E_CANCELLED",
            Self::Codec(DeltaError::DimensionMismatch { .. }) => "E_DIMENSION_MISMATCH",
            Self::Codec(_) => "E_CORRUPT_DELTA",
            Self::Raster(_) => "E_RASTER",
            Self::InvalidConfig(_) => "E_INVALID_CONFIG",
            Self::Io(_) => "E_IO",
            Self::Upload(_) => "E_UPLOAD",
        }
    }

    /// 取出拼接未完成时的部分结果。
    pub fn into_partial_image(self) -> Option<RasterImage> {
        match self {
            Self::StitchIncomplete(incomplete) => Some(incomplete.partial),
            _ => None,
        }
    }
}

/// 将错误序列化为人类可读的字符串。
impl Serialize for CaptureError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
