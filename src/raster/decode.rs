//! # 截图解码
//!
//! 驱动交回的视口截图是编码后的数据：WebDriver 给 Base64 PNG（有的实现带 Data URL 前缀），
//! 原生驱动可能直接给 PNG 字节。解码分两步：
//!
//! 1. 只读文件头拿到宽高，先做像素上限检查；
//! 2. 通过后才完整解码成 `RasterImage`。
//!
//! Base64 在解码前按编码长度估算解码后体积，超限直接拒绝，不分配缓冲。

use std::io::Cursor;

use base64::{Engine as _, engine::general_purpose};
use image::ImageReader;

use super::{RasterError, RasterImage};

/// 解码资源上限。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    /// 编码字节上限。
    pub max_encoded_bytes: u64,
    /// 解码后像素上限（`width * height`）。
    pub max_pixels: u64,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_encoded_bytes: 64 * 1024 * 1024,
            max_pixels: 40_000_000,
        }
    }
}

impl DecodeLimits {
    fn check_encoded_len(&self, len: u64) -> Result<(), RasterError> {
        if len > self.max_encoded_bytes {
            return Err(RasterError::ResourceLimit(format!(
                "截图编码体积 {} 字节超过上限 {} 字节",
                len, self.max_encoded_bytes
            )));
        }
        Ok(())
    }

    fn check_pixels(&self, width: u32, height: u32) -> Result<(), RasterError> {
        let pixels = width as u64 * height as u64;
        if pixels > self.max_pixels {
            return Err(RasterError::ResourceLimit(format!(
                "截图 {}x{} 共 {} 像素，超过上限 {} 像素",
                width, height, pixels, self.max_pixels
            )));
        }
        Ok(())
    }
}

impl RasterImage {
    /// 从 PNG/JPEG 等编码字节解码。
    pub fn decode(bytes: &[u8], limits: &DecodeLimits) -> Result<Self, RasterError> {
        limits.check_encoded_len(bytes.len() as u64)?;

        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| RasterError::InvalidFormat(format!("无法识别截图格式：{}", e)))?;
        if reader.format().is_none() {
            return Err(RasterError::InvalidFormat("无法识别截图格式".to_string()));
        }

        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| RasterError::InvalidFormat(format!("无法读取截图尺寸：{}", e)))?;
        limits.check_pixels(width, height)?;

        let decoded = image::load_from_memory(bytes)
            .map_err(|e| RasterError::Decode(format!("截图解码失败：{}", e)))?;
        RasterImage::from_dynamic(decoded)
    }

    /// 从 Base64 字符串解码，接受 `data:image/...;base64,` 前缀。
    pub fn decode_base64(data: &str, limits: &DecodeLimits) -> Result<Self, RasterError> {
        let payload = strip_data_url(data.trim())?;
        limits.check_encoded_len(base64::decoded_len_estimate(payload.len()) as u64)?;

        let bytes = general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| RasterError::Decode(format!("Base64 解码失败：{}", e)))?;
        Self::decode(&bytes, limits)
    }
}

/// 去掉 Data URL 头，只留 Base64 负载。
fn strip_data_url(data: &str) -> Result<&str, RasterError> {
    let Some(rest) = data.strip_prefix("data:") else {
        return Ok(data);
    };

    rest.split_once(";base64,")
        .map(|(_, payload)| payload)
        .ok_or_else(|| RasterError::InvalidFormat("Data URL 缺少 ;base64, 标记".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::PixelFormat;

    fn tiny_png() -> Vec<u8> {
        RasterImage::new(2, 1, PixelFormat::Rgba8, vec![255, 0, 0, 255, 0, 255, 0, 255])
            .expect("valid image")
            .encode_png()
            .expect("encode png")
    }

    #[test]
    fn decode_base64_accepts_data_url() {
        let encoded = general_purpose::STANDARD.encode(tiny_png());
        let data_url = format!("data:image/png;base64,{}", encoded);

        let image = RasterImage::decode_base64(&data_url, &DecodeLimits::default()).expect("decode");

        assert_eq!(image.width(), 2);
        assert_eq!(image.format(), PixelFormat::Rgba8);
        assert_eq!(&image.bytes()[..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn decode_base64_rejects_missing_marker() {
        let result = RasterImage::decode_base64("data:image/png,AAAA", &DecodeLimits::default());
        assert!(matches!(result, Err(RasterError::InvalidFormat(_))));
    }

    #[test]
    fn oversized_base64_is_rejected_before_decoding() {
        let huge = "A".repeat(1024 * 1024);
        let limits = DecodeLimits {
            max_encoded_bytes: 32,
            ..DecodeLimits::default()
        };

        let result = RasterImage::decode_base64(&huge, &limits);
        assert!(matches!(result, Err(RasterError::ResourceLimit(_))));
    }

    #[test]
    fn plain_base64_without_prefix_decodes() {
        let encoded = general_purpose::STANDARD.encode(tiny_png());
        let image = RasterImage::decode_base64(&format!("  {encoded}\n"), &DecodeLimits::default()).expect("decode");

        assert_eq!((image.width(), image.height()), (2, 1));
    }

    #[test]
    fn decode_rejects_non_image_payload() {
        let result = RasterImage::decode(b"<html>not an image</html>", &DecodeLimits::default());
        assert!(matches!(result, Err(RasterError::InvalidFormat(_))));
    }

    #[test]
    fn decode_enforces_pixel_limit() {
        let limits = DecodeLimits {
            max_pixels: 1,
            ..DecodeLimits::default()
        };
        let result = RasterImage::decode(&tiny_png(), &limits);

        assert!(matches!(result, Err(RasterError::ResourceLimit(_))));
    }
}
