//! # 视觉回归截图流水线：库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │            外部协作方 (WebDriver / Appium / 上传服务)      │
//! │                                                          │
//! │   TargetDriver (滚动·截图·像素比·能力)    UploadSink      │
//! └───────┼───────────────────────────────────────▲──────────┘
//!         ↕ async trait                           │ UploadPayload
//! ┌───────┼───────────────────────────────────────┼──────────┐
//! │       ↕            截图核心 (Rust)             │          │
//! │                                                          │
//! │  ┌─ session ──── CaptureSession (串起整条流水线)           │
//! │  │   └─ upload       载荷组装 + UploadSink                │
//! │  │                                                       │
//! │  ├─ positioning ─ PositionProvider + PositionMemento     │
//! │  │   ├─ page         整页滚动                             │
//! │  │   ├─ element      元素内部滚动                         │
//! │  │   └─ mobile       移动端视图 (Android / iOS)           │
//! │  │                                                       │
//! │  ├─ compensation ─ 按渲染器修正区域位置                   │
//! │  ├─ stitching ─── 拼接状态机 + 取消 + 恢复位置            │
//! │  ├─ codec ─────── 分块差分编解码 (固定线格式 v1)          │
//! │  ├─ raster ────── 像素缓冲·PNG/Base64 解码·缩放           │
//! │  └─ geometry ──── Location / RectangleSize / Region      │
//! │                                                          │
//! │  error · config · logging  (全局共享)                     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `CaptureError` 与稳定错误码 |
//! | [`config`] | 拼接、等待、分块等参数，JSON 读写 |
//! | [`logging`] | 可注入的日志接收器与带会话标识的 `Logger` |
//! | [`geometry`] | 坐标、尺寸、区域及其运算 |
//! | [`raster`] | `RasterImage` 像素缓冲、解码、拼贴、裁剪、缩放 |
//! | [`codec`] | `ImageDeltaCompressor` 差分编解码 |
//! | [`driver`] | 驱动协作方接口 `TargetDriver` |
//! | [`positioning`] | 滚动位置提供者与位置快照 |
//! | [`compensation`] | 渲染器档位与区域位置修正策略 |
//! | [`stitching`] | 整页拼接引擎 |
//! | [`session`] | 截图会话与上传载荷 |

pub mod codec;
pub mod compensation;
pub mod config;
pub mod driver;
pub mod error;
pub mod geometry;
pub mod logging;
pub mod positioning;
pub mod raster;
pub mod session;
pub mod stitching;

pub use codec::{DeltaBlock, DeltaError, ImageDeltaCompressor};
pub use config::CaptureConfig;
pub use error::CaptureError;
pub use geometry::{Location, RectangleSize, Region};
pub use raster::{PixelFormat, RasterImage};
pub use session::{CaptureSession, CaptureTarget};
pub use stitching::{CancelFlag, StitchEngine, StitchReport, StitchState};
