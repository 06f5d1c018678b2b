//! 拼接引擎模块
//!
//! # 设计思路
//!
//! 驱动 `PositionProvider` 逐屏滚动，每屏截取并解码视口截图，经 `RegionPositionCompensation`
//! 修正“从截图中取哪一块”，再把这一块写到画布上实际到达的偏移处。
//! 定位、截图、修正严格串行：每一步都依赖上一步建立的滚动状态。
//!
//! 状态流转：
//!
//! ```text
//! Idle → Positioning → Capturing → Compensating → Accumulating ─┐
//!            ▲                                                  │
//!            └──────────────────────────────────────────────────┘
//!                                 … → Restoring → Done | Failed
//! ```
//!
//! # 实现思路
//!
//! - 进入时保存位置快照，任何退出路径（成功、错误、取消）都会先恢复快照。
//! - 每一步都重新读取实际到达的偏移，越界截断由提供者负责。
//! - 实际偏移未前进（含重复到达同一偏移）即视为内容已耗尽，正常结束。
//! - 定位次数受 `max_stitch_iterations` 约束，超限返回带部分结果的 `StitchIncomplete`。
//! - 内容宽于视口时逐行横向拼接；最终图像裁剪到实际覆盖范围。
//! - 取消标志在每一步开始时检查，使用 `Arc<AtomicBool>`，可跨任务共享。
//! - 出错或取消时把最后到达的偏移与定位次数写进错误。

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::compensation::RegionPositionCompensation;
use crate::config::CaptureConfig;
use crate::driver::TargetDriver;
use crate::error::{CaptureError, IncompleteStitch};
use crate::geometry::{Location, RectangleSize, Region};
use crate::logging::Logger;
use crate::positioning::PositionProvider;
use crate::raster::{PixelFormat, RasterError, RasterImage};

/// 截图取消标志。克隆后共享同一个标志位。
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 拼接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StitchState {
    Idle,
    Positioning,
    Capturing,
    Compensating,
    Accumulating,
    Restoring,
    Done,
    Failed,
}

impl StitchState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Positioning => "Positioning",
            Self::Capturing => "Capturing",
            Self::Compensating => "Compensating",
            Self::Accumulating => "Accumulating",
            Self::Restoring => "Restoring",
            Self::Done => "Done",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for StitchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一次成功拼接的结果。
#[derive(Debug)]
pub struct StitchReport {
    /// 物理像素的整页图像
    pub image: RasterImage,
    /// 实际截取过的偏移（CSS 像素），按截取顺序
    pub positions: Vec<Location>,
    /// 定位次数
    pub iterations: u32,
    pub state: StitchState,
    /// 内容完整尺寸（CSS 像素）
    pub entire_size: RectangleSize,
    /// 视口尺寸（CSS 像素）
    pub viewport_size: RectangleSize,
}

/// 整页画布与覆盖范围。
#[derive(Default)]
struct Accumulator {
    canvas: Option<RasterImage>,
    covered_right: i32,
    covered_bottom: i32,
    positions: Vec<Location>,
    visited: HashSet<Location>,
}

impl Accumulator {
    /// 把 `frame` 中的 `source` 区域写到画布 `dest` 处，越出截图的部分按偏移裁掉。
    fn place(
        &mut self,
        frame: &RasterImage,
        source: Region,
        dest: Location,
        canvas_size: RectangleSize,
    ) -> Result<(), RasterError> {
        if self.canvas.is_none() {
            self.canvas = Some(RasterImage::blank(
                canvas_size.width,
                canvas_size.height,
                frame.format(),
            )?);
        }
        let Some(canvas) = self.canvas.as_mut() else {
            return Ok(());
        };

        canvas.blit(frame, source, dest)?;

        let visible = source.intersect(&frame.bounds());
        let dest = dest.offset(visible.left - source.left, visible.top - source.top);
        let written = Region::from_parts(dest, visible.size()).intersect(&canvas.bounds());
        if !written.is_empty() {
            self.covered_right = self.covered_right.max(written.right());
            self.covered_bottom = self.covered_bottom.max(written.bottom());
        }
        Ok(())
    }

    /// 已覆盖部分；尚无画布时返回 `None`。
    fn covered(&self) -> Result<Option<RasterImage>, RasterError> {
        match &self.canvas {
            Some(canvas) => canvas
                .crop(Region::new(0, 0, self.covered_right, self.covered_bottom))
                .map(Some),
            None => Ok(None),
        }
    }
}

/// 拼接引擎，每次截图会话独占一个实例。
pub struct StitchEngine {
    driver: Arc<dyn TargetDriver>,
    compensation: Box<dyn RegionPositionCompensation>,
    pixel_ratio: f64,
    config: CaptureConfig,
    logger: Logger,
    state: StitchState,
    last_offset: Option<Location>,
    iterations: u32,
}

impl StitchEngine {
    pub fn new(
        driver: Arc<dyn TargetDriver>,
        compensation: Box<dyn RegionPositionCompensation>,
        pixel_ratio: f64,
        config: CaptureConfig,
        logger: Logger,
    ) -> Result<Self, CaptureError> {
        config.validate()?;
        if !pixel_ratio.is_finite() || pixel_ratio <= 0.0 {
            return Err(CaptureError::InvalidConfig(format!("无效的像素比 {pixel_ratio}")));
        }

        Ok(Self {
            driver,
            compensation,
            pixel_ratio,
            config,
            logger,
            state: StitchState::Idle,
            last_offset: None,
            iterations: 0,
        })
    }

    pub fn state(&self) -> StitchState {
        self.state
    }

    fn transition(&mut self, next: StitchState) {
        if self.state != next {
            self.logger
                .verbose(format_args!("拼接状态: {} -> {}", self.state, next));
            self.state = next;
        }
    }

    /// 拼接 `provider` 所代表目标的完整内容。
    ///
    /// 无论成功与否，返回前都会把目标恢复到进入时的滚动位置。
    /// 拼接本身失败时优先返回拼接错误，恢复失败只记录告警。
    ///
    /// 恢复发生在这个 future 内部。直接丢弃 future（例如外层 `tokio::time::timeout`
    /// 超时）会跳过恢复，目标停在最后的滚动位置；需要超时请在计时到期时调用
    /// [`CancelFlag::cancel`]，引擎会在下一步开始前停下并恢复，返回 `Cancelled`。
    pub async fn stitch(
        &mut self,
        provider: &dyn PositionProvider,
        cancel: &CancelFlag,
    ) -> Result<StitchReport, CaptureError> {
        self.state = StitchState::Idle;
        self.last_offset = None;
        self.iterations = 0;
        let memento = match provider.get_state().await {
            Ok(memento) => memento,
            Err(e) => {
                self.transition(StitchState::Failed);
                return Err(e);
            }
        };
        self.logger.verbose(format_args!(
            "保存 {} 的滚动位置 {}",
            provider.target_name(),
            memento.position()
        ));

        let outcome = self.run(provider, cancel).await;
        let outcome = outcome.map_err(|e| e.with_progress(self.last_offset, self.iterations));

        self.transition(StitchState::Restoring);
        let restored = provider.restore_state(memento).await;

        match (outcome, restored) {
            (Ok(mut report), Ok(())) => {
                self.transition(StitchState::Done);
                report.state = StitchState::Done;
                self.logger.log(format_args!(
                    "拼接完成 [{}]: {} 帧, {} 次定位, 图像 {}",
                    provider.target_name(),
                    report.positions.len(),
                    report.iterations,
                    report.image.size()
                ));
                Ok(report)
            }
            (Ok(_), Err(restore_err)) => {
                self.transition(StitchState::Failed);
                Err(restore_err)
            }
            (Err(e), Ok(())) => {
                self.transition(StitchState::Failed);
                Err(e)
            }
            (Err(e), Err(restore_err)) => {
                self.logger
                    .warn(format_args!("恢复滚动位置失败: {restore_err}"));
                self.transition(StitchState::Failed);
                Err(e)
            }
        }
    }

    async fn run(
        &mut self,
        provider: &dyn PositionProvider,
        cancel: &CancelFlag,
    ) -> Result<StitchReport, CaptureError> {
        let target = provider.target_name();
        let ratio = self.pixel_ratio;

        self.transition(StitchState::Positioning);
        let entire = provider.get_entire_size().await?;
        if entire.is_empty() {
            return Err(CaptureError::target_unavailable(
                &target,
                format!("内容尺寸为空 {entire}"),
            ));
        }

        let canvas_size = entire.scale(ratio);
        if canvas_size.area() > self.config.max_stitched_pixels {
            return Err(RasterError::ResourceLimit(format!(
                "拼接图像 {canvas_size} 超过上限 {} 像素",
                self.config.max_stitched_pixels
            ))
            .into());
        }

        let overlap = self.config.stitch_overlap as i32;
        let content_width = entire.width as i32;
        let content_height = entire.height as i32;

        let limits = self.config.screenshot_limits();
        let mut acc = Accumulator::default();
        let mut viewport = RectangleSize::default();
        let mut row_target_y = 0i32;
        let mut prev_row_y: Option<i32> = None;

        'rows: loop {
            let mut col_target_x = 0i32;
            let mut prev_col_x: Option<i32> = None;
            let mut row_y: Option<i32> = None;

            loop {
                if cancel.is_cancelled() {
                    self.logger.log(format_args!("拼接已取消 [{target}]"));
                    return Err(CaptureError::Cancelled {
                        target,
                        last_offset: self.last_offset,
                        iterations: self.iterations,
                    });
                }

                let iterations = self.iterations;
                if iterations >= self.config.max_stitch_iterations {
                    let partial = match acc.covered()? {
                        Some(image) => image,
                        None => RasterImage::blank(0, 0, PixelFormat::Rgba8)?,
                    };
                    let last_offset = self.last_offset.unwrap_or(Location::ZERO);
                    self.logger.warn(format_args!(
                        "达到定位上限 {} 次，停在 {last_offset}",
                        iterations
                    ));
                    return Err(CaptureError::StitchIncomplete(Box::new(IncompleteStitch {
                        target,
                        last_offset,
                        iterations,
                        partial,
                    })));
                }
                self.iterations += 1;

                self.transition(StitchState::Positioning);
                let requested = Location::new(col_target_x, row_target_y);
                provider.set_position(requested).await?;
                let achieved = provider.get_current_position().await?;
                self.last_offset = Some(achieved);

                let exhausted = match (prev_col_x, prev_row_y) {
                    (Some(prev_x), _) => achieved.x <= prev_x,
                    (None, Some(prev_y)) => achieved.y <= prev_y,
                    (None, None) => false,
                } || acc.visited.contains(&achieved);
                if exhausted {
                    self.logger
                        .verbose(format_args!("请求 {requested}，实际 {achieved}，偏移未前进"));
                    if prev_col_x.is_none() {
                        break 'rows;
                    }
                    break;
                }
                acc.visited.insert(achieved);
                if row_y.is_none() {
                    row_y = Some(achieved.y);
                }

                self.transition(StitchState::Capturing);
                if self.config.wait_before_capture_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(self.config.wait_before_capture_ms)).await;
                }
                let screenshot = self
                    .driver
                    .capture_screenshot()
                    .await
                    .map_err(|e| CaptureError::target_unavailable(&target, e))?;
                let frame = screenshot.decode(&limits)?;
                if frame.size().is_empty() {
                    return Err(CaptureError::target_unavailable(&target, "视口截图为空"));
                }

                // 修正结果只决定截图内的取样区域，写入位置始终是实际到达的偏移
                self.transition(StitchState::Compensating);
                let dest = achieved.scale(ratio);
                let claimed = Region::from_parts(dest, frame.size());
                let compensated = self.compensation.compensate_region_position(claimed, ratio);
                let source = compensated.offset(-claimed.left, -claimed.top);
                let visible = source.intersect(&frame.bounds());

                self.transition(StitchState::Accumulating);
                if compensated.is_size_empty() || visible.is_empty() {
                    viewport = frame.size().scale(1.0 / ratio);
                    self.logger
                        .warn(format_args!("偏移 {achieved} 处的截图修正后为空，跳过"));
                } else {
                    viewport = visible.size().scale(1.0 / ratio);
                    acc.place(&frame, source, dest, canvas_size)?;
                    acc.positions.push(achieved);
                    self.logger.verbose(format_args!(
                        "第 {} 帧: 偏移 {achieved}, 取样 {source}",
                        self.iterations
                    ));
                }

                let viewport_width = viewport.width as i32;
                if achieved.x.saturating_add(viewport_width) >= content_width {
                    break;
                }
                prev_col_x = Some(achieved.x);
                col_target_x = achieved.x + (viewport_width - overlap).max(1);
            }

            let Some(row_y) = row_y else {
                break;
            };
            let viewport_height = viewport.height as i32;
            if row_y.saturating_add(viewport_height) >= content_height {
                break;
            }
            prev_row_y = Some(row_y);
            row_target_y = row_y + (viewport_height - overlap).max(1);
        }

        let image = acc
            .covered()?
            .ok_or_else(|| CaptureError::target_unavailable(&target, "没有截取到有效画面"))?;

        Ok(StitchReport {
            image,
            positions: acc.positions,
            iterations: self.iterations,
            state: self.state,
            entire_size: entire,
            viewport_size: viewport,
        })
    }
}
