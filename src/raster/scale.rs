//! # 像素比归一化
//!
//! 高 DPI 设备的截图是物理像素，基线通常按 CSS 像素保存。
//! 这里按 `1 / pixel_ratio` 缩放整图：优先 `fast_image_resize`，失败时回退
//! `image::DynamicImage::resize_exact`。

use fast_image_resize as fr;

use super::{PixelFormat, RasterError, RasterImage};
use crate::config::ResizeFilter;
use crate::logging::Logger;

/// 按比例缩放图像；比例为 1 时原样返回。
pub fn scale_image(
    image: RasterImage,
    ratio: f64,
    filter: ResizeFilter,
    logger: &Logger,
) -> Result<RasterImage, RasterError> {
    if !(ratio.is_finite() && ratio > 0.0) {
        return Err(RasterError::ResourceLimit(format!("缩放比例异常：{}", ratio)));
    }
    if (ratio - 1.0).abs() < f64::EPSILON || image.size().is_empty() {
        return Ok(image);
    }

    let target_width = ((image.width() as f64 * ratio).round() as u32).max(1);
    let target_height = ((image.height() as f64 * ratio).round() as u32).max(1);

    logger.verbose(format_args!(
        "像素比归一化：{}x{} -> {}x{}（filter={:?}）",
        image.width(),
        image.height(),
        target_width,
        target_height,
        filter
    ));

    match resize_with_fast_image_resize(&image, target_width, target_height, filter) {
        Ok(resized) => Ok(resized),
        Err(err) => {
            logger.warn(format_args!("fast_image_resize 缩放失败，回退 image::resize_exact：{}", err));
            let dynamic = image.to_dynamic()?;
            let resized = dynamic.resize_exact(target_width, target_height, filter.to_image_filter());
            RasterImage::from_dynamic(resized)
        }
    }
}

fn resize_with_fast_image_resize(
    image: &RasterImage,
    target_width: u32,
    target_height: u32,
    filter: ResizeFilter,
) -> Result<RasterImage, RasterError> {
    let pixel_type = match image.format() {
        PixelFormat::Rgba8 => fr::PixelType::U8x4,
        PixelFormat::Rgb8 => fr::PixelType::U8x3,
        PixelFormat::Gray8 => fr::PixelType::U8,
    };

    let src_image = fr::images::Image::from_vec_u8(
        image.width(),
        image.height(),
        image.bytes().to_vec(),
        pixel_type,
    )
    .map_err(|e| RasterError::Decode(format!("构建源图像缓冲失败：{}", e)))?;

    let mut dst_image = fr::images::Image::new(target_width, target_height, pixel_type);

    let mut resizer = fr::Resizer::new();
    let options = fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(to_fast_filter(filter)));

    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| RasterError::Decode(format!("fast_image_resize 执行失败：{}", e)))?;

    RasterImage::new(target_width, target_height, image.format(), dst_image.into_vec())
}

fn to_fast_filter(filter: ResizeFilter) -> fr::FilterType {
    match filter {
        ResizeFilter::Nearest => fr::FilterType::Box,
        ResizeFilter::Bilinear => fr::FilterType::Bilinear,
        ResizeFilter::CatmullRom => fr::FilterType::CatmullRom,
        ResizeFilter::Lanczos3 => fr::FilterType::Lanczos3,
    }
}
