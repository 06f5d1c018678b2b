//! # 编解码错误模型
//!
//! 编码与解码失败都是“整块失败”：不会返回部分写入的缓冲。

use crate::geometry::RectangleSize;
use crate::raster::PixelFormat;

/// 差分编解码错误。
#[derive(Debug, thiserror::Error)]
pub enum DeltaError {
    #[error("尺寸不一致：基线 {baseline} {baseline_format:?}，目标 {target} {target_format:?}")]
    DimensionMismatch {
        baseline: RectangleSize,
        baseline_format: PixelFormat,
        target: RectangleSize,
        target_format: PixelFormat,
    },

    #[error("差分数据损坏：{0}")]
    CorruptDelta(String),

    #[error("分块大小无效：{0}")]
    InvalidTileSize(String),

    #[error("差分数据引用了基线，但未提供基线图像")]
    MissingSource,
}

impl DeltaError {
    pub(crate) fn corrupt(message: impl Into<String>) -> Self {
        Self::CorruptDelta(message.into())
    }
}
