//! 集成测试共用的脚本化驱动与上传接收器。

#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};

use visual_capture::compensation::RendererProfile;
use visual_capture::driver::{DriverError, EncodedScreenshot, ScrollScope, TargetDriver};
use visual_capture::error::CaptureError;
use visual_capture::session::{UploadPayload, UploadSink};
use visual_capture::stitching::CancelFlag;
use visual_capture::{Location, PixelFormat, RasterImage, RectangleSize, Region};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 合成整页：每个像素由绝对坐标决定，便于校验拼接结果。
pub fn synthetic_page(width: u32, height: u32) -> RasterImage {
    let mut bytes = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            bytes.push(((x * 7 + y * 13) % 251) as u8);
        }
    }
    RasterImage::new(width, height, PixelFormat::Gray8, bytes).expect("synthetic page")
}

/// 截图交付方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenshotEncoding {
    Png,
    /// `data:image/png;base64,...`，与 WebDriver 一致
    DataUrl,
}

/// 模拟一块可滚动内容的驱动。
///
/// 偏移以 CSS 像素保存并按 `content - viewport` 截断；截图从物理像素整页中裁出当前视口，
/// 编码后交回。
pub struct ScriptedDriver {
    pub content: RectangleSize,
    pub viewport: RectangleSize,
    pub pixel_ratio: f64,
    pub profile: RendererProfile,
    pub platform: Option<String>,
    /// 移动端视图是否以物理像素上报（Android 行为）
    pub mobile_device_units: bool,
    /// 忽略所有滚动请求
    pub ignore_scroll: bool,
    /// 第 N 次（从 1 开始）截图时返回会话丢失
    pub fail_capture_at: Option<usize>,
    /// 第 N 次截图后触发取消
    pub cancel_after: Option<(usize, CancelFlag)>,
    /// 截图顶部额外的浏览器栏行数（物理像素，值为 255）
    pub header_rows: u32,
    /// 每次截图耗时
    pub capture_delay: Duration,
    pub encoding: ScreenshotEncoding,
    page: RasterImage,
    offset: Mutex<Location>,
    pub set_calls: Mutex<Vec<Location>>,
    captures: Mutex<usize>,
}

impl ScriptedDriver {
    pub fn new(content: RectangleSize, viewport: RectangleSize, pixel_ratio: f64) -> Self {
        let physical = content.scale(pixel_ratio);
        Self {
            content,
            viewport,
            pixel_ratio,
            profile: RendererProfile::Chrome,
            platform: None,
            mobile_device_units: false,
            ignore_scroll: false,
            fail_capture_at: None,
            cancel_after: None,
            header_rows: 0,
            capture_delay: Duration::ZERO,
            encoding: ScreenshotEncoding::Png,
            page: synthetic_page(physical.width, physical.height),
            offset: Mutex::new(Location::ZERO),
            set_calls: Mutex::new(Vec::new()),
            captures: Mutex::new(0),
        }
    }

    pub fn page(&self) -> &RasterImage {
        &self.page
    }

    pub fn offset(&self) -> Location {
        *self.offset.lock().unwrap()
    }

    pub fn place_at(&self, location: Location) {
        *self.offset.lock().unwrap() = location;
    }

    pub fn set_calls(&self) -> Vec<Location> {
        self.set_calls.lock().unwrap().clone()
    }

    pub fn captures(&self) -> usize {
        *self.captures.lock().unwrap()
    }

    fn device_units(&self, scope: &ScrollScope) -> bool {
        self.mobile_device_units && *scope == ScrollScope::MobileView
    }

    fn visible_frame(&self) -> Result<RasterImage, DriverError> {
        let visible = Region::from_parts(self.offset(), self.viewport).scale(self.pixel_ratio);
        let content = self
            .page
            .crop(visible)
            .map_err(|e| DriverError::Command(e.to_string()))?;
        if self.header_rows == 0 {
            return Ok(content);
        }

        let row = content.row_bytes();
        let mut bytes = vec![255u8; row * self.header_rows as usize];
        bytes.extend_from_slice(content.bytes());
        RasterImage::new(
            content.width(),
            content.height() + self.header_rows,
            content.format(),
            bytes,
        )
        .map_err(|e| DriverError::Command(e.to_string()))
    }
}

#[async_trait]
impl TargetDriver for ScriptedDriver {
    async fn query_scroll_offset(&self, scope: &ScrollScope) -> Result<Location, DriverError> {
        let offset = self.offset();
        if self.device_units(scope) {
            return Ok(offset.scale(self.pixel_ratio));
        }
        Ok(offset)
    }

    async fn set_scroll_offset(&self, scope: &ScrollScope, location: Location) -> Result<(), DriverError> {
        let css = if self.device_units(scope) {
            Location::new(
                (location.x as f64 / self.pixel_ratio).round() as i32,
                (location.y as f64 / self.pixel_ratio).round() as i32,
            )
        } else {
            location
        };
        self.set_calls.lock().unwrap().push(css);
        if self.ignore_scroll {
            return Ok(());
        }

        let max_x = self.content.width.saturating_sub(self.viewport.width) as i32;
        let max_y = self.content.height.saturating_sub(self.viewport.height) as i32;
        self.place_at(Location::new(css.x.clamp(0, max_x), css.y.clamp(0, max_y)));
        Ok(())
    }

    async fn query_content_size(&self, scope: &ScrollScope) -> Result<RectangleSize, DriverError> {
        if self.device_units(scope) {
            return Ok(self.content.scale(self.pixel_ratio));
        }
        Ok(self.content)
    }

    async fn capture_screenshot(&self) -> Result<EncodedScreenshot, DriverError> {
        if !self.capture_delay.is_zero() {
            tokio::time::sleep(self.capture_delay).await;
        }
        let count = {
            let mut captures = self.captures.lock().unwrap();
            *captures += 1;
            *captures
        };
        if self.fail_capture_at == Some(count) {
            return Err(DriverError::SessionLost("page navigated away".to_string()));
        }
        if let Some((after, flag)) = &self.cancel_after {
            if count >= *after {
                flag.cancel();
            }
        }

        let png = self
            .visible_frame()?
            .encode_png()
            .map_err(|e| DriverError::Command(e.to_string()))?;
        Ok(match self.encoding {
            ScreenshotEncoding::Png => EncodedScreenshot::Encoded(png.into()),
            ScreenshotEncoding::DataUrl => EncodedScreenshot::Base64(format!(
                "data:image/png;base64,{}",
                general_purpose::STANDARD.encode(png)
            )),
        })
    }

    async fn query_pixel_ratio(&self) -> Result<f64, DriverError> {
        Ok(self.pixel_ratio)
    }

    async fn query_renderer_profile(&self) -> Result<RendererProfile, DriverError> {
        Ok(self.profile)
    }

    async fn platform_name(&self) -> Result<Option<String>, DriverError> {
        Ok(self.platform.clone())
    }

    async fn platform_version(&self) -> Result<Option<String>, DriverError> {
        Ok(self.platform.as_ref().map(|_| "14".to_string()))
    }
}

/// 记录所有上传载荷的接收器。
#[derive(Default)]
pub struct RecordingSink {
    pub payloads: Mutex<Vec<UploadPayload>>,
    pub reject: bool,
}

#[async_trait]
impl UploadSink for RecordingSink {
    async fn upload(&self, payload: UploadPayload) -> Result<(), CaptureError> {
        if self.reject {
            return Err(CaptureError::Upload("503 service unavailable".to_string()));
        }
        self.payloads.lock().unwrap().push(payload);
        Ok(())
    }
}
