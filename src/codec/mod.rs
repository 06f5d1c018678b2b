//! # 差分编解码模块（codec）
//!
//! ## 设计思路
//!
//! UI 重新渲染后通常只有小块区域变化。按“行对齐分块”比较基线与目标：
//! - 分块完全相同 → `CopyRun`（连续相同分块合并为一条）
//! - 分块不同     → `Literal`（携带目标原始字节）
//!
//! 解码端拿基线 + 差分块逐块重建目标，结果必须逐字节一致。
//!
//! - `format`：线格式（头部 + 记录）读写
//! - `error`：`DeltaError`
//!
//! ## 实现思路
//!
//! - 编码前校验尺寸与像素格式，不做任何隐式缩放。
//! - 无基线（首次截图）时退化为一条覆盖整图的 `Literal`。
//! - 解码时先校验头部与分块大小/长度的一致性，再按顺序消费记录，
//!   任何越界、乱序、重复或缺失都返回 `CorruptDelta`，不会 panic。

mod error;
mod format;

pub use error::DeltaError;
pub use format::{DeltaHeader, DeltaRecord, FORMAT_VERSION};

use bytes::{Bytes, BytesMut};

use format::{HEADER_LEN, RECORD_OVERHEAD};
use crate::raster::RasterImage;

/// 编码结果：可直接传输的不透明字节块。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaBlock {
    bytes: Bytes,
}

/// 差分块内容统计。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeltaStats {
    pub copy_runs: u32,
    pub copied_tiles: u32,
    pub literal_tiles: u32,
}

impl DeltaBlock {
    /// 包装接收到的字节，内容在解码时校验。
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self { bytes: bytes.into() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn header(&self) -> Result<DeltaHeader, DeltaError> {
        let mut buf: &[u8] = &self.bytes;
        DeltaHeader::read(&mut buf)
    }

    /// 按顺序解析全部记录。
    pub fn records(&self) -> Result<Vec<DeltaRecord>, DeltaError> {
        self.header()?;
        let mut records = Vec::new();
        let mut offset = HEADER_LEN;
        while offset < self.bytes.len() {
            let (record, next) = DeltaRecord::read(&self.bytes, offset)?;
            records.push(record);
            offset = next;
        }
        Ok(records)
    }

    pub fn stats(&self) -> Result<DeltaStats, DeltaError> {
        let mut stats = DeltaStats::default();
        for record in self.records()? {
            match record {
                DeltaRecord::CopyRun { count, .. } => {
                    stats.copy_runs += 1;
                    stats.copied_tiles += count;
                }
                DeltaRecord::Literal { .. } => stats.literal_tiles += 1,
            }
        }
        Ok(stats)
    }
}

/// 图像差分编解码器。
#[derive(Debug, Clone, Copy)]
pub struct ImageDeltaCompressor {
    tile_rows: u32,
}

impl ImageDeltaCompressor {
    /// `tile_rows`：每个分块包含的像素行数。
    pub fn new(tile_rows: u32) -> Result<Self, DeltaError> {
        if tile_rows == 0 {
            return Err(DeltaError::InvalidTileSize("tile_rows 必须大于 0".to_string()));
        }
        Ok(Self { tile_rows })
    }

    pub fn tile_rows(&self) -> u32 {
        self.tile_rows
    }

    /// 编码 `target` 相对 `source` 的差分。
    ///
    /// `source` 为 `None` 时输出单条覆盖整图的 `Literal`。
    pub fn compress(
        &self,
        source: Option<&RasterImage>,
        target: &RasterImage,
    ) -> Result<DeltaBlock, DeltaError> {
        if let Some(source) = source {
            if !source.same_layout(target) {
                return Err(DeltaError::DimensionMismatch {
                    baseline: source.size(),
                    baseline_format: source.format(),
                    target: target.size(),
                    target_format: target.format(),
                });
            }
        }

        let total_len = target.bytes().len();
        let tile_size = match source {
            Some(_) => (self.tile_rows as usize)
                .checked_mul(target.row_bytes())
                .ok_or_else(|| DeltaError::InvalidTileSize("分块字节数溢出".to_string()))?
                .max(1),
            None => total_len.max(1),
        };
        let tile_size = u32::try_from(tile_size)
            .map_err(|_| DeltaError::InvalidTileSize(format!("分块字节数超出 u32：{}", tile_size)))?;
        let tile_count = u32::try_from(total_len.div_ceil(tile_size as usize))
            .map_err(|_| DeltaError::InvalidTileSize("分块数量超出 u32".to_string()))?;

        let header = DeltaHeader {
            version: FORMAT_VERSION,
            source_present: source.is_some(),
            format: target.format(),
            width: target.width(),
            height: target.height(),
            tile_size,
            tile_count,
            total_len: total_len as u64,
        };

        let mut out = BytesMut::with_capacity(HEADER_LEN + RECORD_OVERHEAD);
        header.write(&mut out);

        let target_bytes = Bytes::copy_from_slice(target.bytes());
        let mut pending_run: Option<(u32, u32)> = None;

        for tile in 0..tile_count {
            let start = tile as usize * tile_size as usize;
            let end = start + header.tile_len(tile);
            let unchanged = source.is_some_and(|s| s.bytes()[start..end] == target_bytes[start..end]);

            if unchanged {
                pending_run = match pending_run {
                    Some((run_start, count)) => Some((run_start, count + 1)),
                    None => Some((tile, 1)),
                };
                continue;
            }

            if let Some((run_start, count)) = pending_run.take() {
                DeltaRecord::CopyRun { start: run_start, count }.write(&mut out);
            }
            DeltaRecord::Literal {
                tile,
                data: target_bytes.slice(start..end),
            }
            .write(&mut out);
        }

        if let Some((run_start, count)) = pending_run {
            DeltaRecord::CopyRun { start: run_start, count }.write(&mut out);
        }

        Ok(DeltaBlock { bytes: out.freeze() })
    }

    /// 用 `source` 与差分块重建目标图像。
    ///
    /// 解码只依赖块内头部，与当前实例的 `tile_rows` 无关。
    pub fn decompress(
        source: Option<&RasterImage>,
        block: &DeltaBlock,
    ) -> Result<RasterImage, DeltaError> {
        let header = block.header()?;
        validate_header(&header)?;

        let source = match (header.source_present, source) {
            (true, Some(source)) => {
                if source.bytes().len() as u64 != header.total_len {
                    return Err(DeltaError::corrupt(format!(
                        "基线长度 {} 与声明长度 {} 不一致",
                        source.bytes().len(),
                        header.total_len
                    )));
                }
                if source.width() != header.width
                    || source.height() != header.height
                    || source.format() != header.format
                {
                    return Err(DeltaError::DimensionMismatch {
                        baseline: source.size(),
                        baseline_format: source.format(),
                        target: crate::geometry::RectangleSize::new(header.width, header.height),
                        target_format: header.format,
                    });
                }
                Some(source)
            }
            (true, None) => return Err(DeltaError::MissingSource),
            (false, _) => None,
        };

        let total_len = header.total_len as usize;
        if source.is_none() && total_len > block.len().saturating_sub(HEADER_LEN) {
            return Err(DeltaError::corrupt(format!(
                "无基线时声明长度 {} 超过数据块剩余 {} 字节",
                total_len,
                block.len().saturating_sub(HEADER_LEN)
            )));
        }
        let tile_size = header.tile_size as usize;
        let mut out = vec![0u8; total_len];
        let mut next_tile: u32 = 0;
        let mut offset = HEADER_LEN;

        while offset < block.bytes.len() {
            let (record, next_offset) = DeltaRecord::read(&block.bytes, offset)?;
            offset = next_offset;

            match record {
                DeltaRecord::CopyRun { start, count } => {
                    let source = source.ok_or_else(|| DeltaError::corrupt("无基线的差分块出现 CopyRun"))?;
                    if start != next_tile || count == 0 {
                        return Err(DeltaError::corrupt(format!(
                            "CopyRun({}, {}) 与期望分块 {} 不连续",
                            start, count, next_tile
                        )));
                    }
                    let end_tile = start
                        .checked_add(count)
                        .filter(|end| *end <= header.tile_count)
                        .ok_or_else(|| DeltaError::corrupt(format!("CopyRun({}, {}) 越界", start, count)))?;

                    let byte_start = start as usize * tile_size;
                    let byte_end = (end_tile as usize * tile_size).min(total_len);
                    out[byte_start..byte_end].copy_from_slice(&source.bytes()[byte_start..byte_end]);
                    next_tile = end_tile;
                }
                DeltaRecord::Literal { tile, data } => {
                    if tile != next_tile || tile >= header.tile_count {
                        return Err(DeltaError::corrupt(format!(
                            "Literal({}) 与期望分块 {} 不连续",
                            tile, next_tile
                        )));
                    }
                    let expected = header.tile_len(tile);
                    if data.len() != expected {
                        return Err(DeltaError::corrupt(format!(
                            "Literal({}) 长度 {} 与分块长度 {} 不一致",
                            tile,
                            data.len(),
                            expected
                        )));
                    }

                    let byte_start = tile as usize * tile_size;
                    out[byte_start..byte_start + expected].copy_from_slice(&data);
                    next_tile = tile + 1;
                }
            }
        }

        if next_tile != header.tile_count {
            return Err(DeltaError::corrupt(format!(
                "记录只覆盖 {} / {} 个分块",
                next_tile, header.tile_count
            )));
        }

        RasterImage::new(header.width, header.height, header.format, out)
            .map_err(|e| DeltaError::corrupt(e.to_string()))
    }
}

/// 头部自洽性检查：分块大小、分块数量与总长度必须互相吻合。
fn validate_header(header: &DeltaHeader) -> Result<(), DeltaError> {
    let expected_len = header.width as u64 * header.height as u64 * header.format.bytes_per_pixel() as u64;
    if expected_len != header.total_len {
        return Err(DeltaError::corrupt(format!(
            "声明长度 {} 与 {}x{} 像素不符",
            header.total_len, header.width, header.height
        )));
    }
    if header.total_len > usize::MAX as u64 {
        return Err(DeltaError::corrupt("声明长度超出平台上限"));
    }
    if header.tile_size == 0 {
        return Err(DeltaError::InvalidTileSize("分块大小为 0".to_string()));
    }

    let expected_tiles = header.total_len.div_ceil(header.tile_size as u64);
    if expected_tiles != header.tile_count as u64 {
        return Err(DeltaError::InvalidTileSize(format!(
            "分块大小 {} 与总长度 {} 推算出 {} 块，声明 {} 块",
            header.tile_size, header.total_len, expected_tiles, header.tile_count
        )));
    }

    let row_bytes = header.width as u64 * header.format.bytes_per_pixel() as u64;
    if header.source_present && row_bytes > 0 && header.tile_size as u64 % row_bytes != 0 {
        return Err(DeltaError::InvalidTileSize(format!(
            "分块大小 {} 未按行对齐（行字节 {}）",
            header.tile_size, row_bytes
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::PixelFormat;
    use proptest::prelude::*;

    fn gray(width: u32, height: u32, fill: impl Fn(u32, u32) -> u8) -> RasterImage {
        let mut bytes = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                bytes.push(fill(x, y));
            }
        }
        RasterImage::new(width, height, PixelFormat::Gray8, bytes).expect("valid image")
    }

    #[test]
    fn changed_rows_emit_literals_between_copy_runs() {
        let source = gray(100, 100, |x, y| ((x + y) % 200) as u8);
        let target = gray(100, 100, |x, y| {
            if (40..=60).contains(&y) { 255 } else { ((x + y) % 200) as u8 }
        });

        let codec = ImageDeltaCompressor::new(10).expect("codec");
        let block = codec.compress(Some(&source), &target).expect("compress");
        let records = block.records().expect("records");

        let literal_tiles: Vec<u32> = records
            .iter()
            .filter_map(|r| match r {
                DeltaRecord::Literal { tile, .. } => Some(*tile),
                _ => None,
            })
            .collect();
        let runs: Vec<(u32, u32)> = records
            .iter()
            .filter_map(|r| match r {
                DeltaRecord::CopyRun { start, count } => Some((*start, *count)),
                _ => None,
            })
            .collect();

        assert_eq!(literal_tiles, vec![4, 5, 6]);
        assert_eq!(runs, vec![(0, 4), (7, 3)]);
        assert_eq!(
            ImageDeltaCompressor::decompress(Some(&source), &block).expect("decompress"),
            target
        );
    }

    #[test]
    fn identical_images_encode_to_single_copy_run() {
        let image = gray(64, 48, |x, y| (x * y % 256) as u8);
        let codec = ImageDeltaCompressor::new(8).expect("codec");

        let block = codec.compress(Some(&image), &image).expect("compress");

        assert_eq!(block.len(), HEADER_LEN + RECORD_OVERHEAD);
        assert_eq!(block.records().expect("records"), vec![DeltaRecord::CopyRun { start: 0, count: 6 }]);
        assert_eq!(ImageDeltaCompressor::decompress(Some(&image), &block).expect("decompress"), image);
    }

    #[test]
    fn missing_baseline_degrades_to_single_literal() {
        let target = gray(10, 7, |x, _| x as u8);
        let codec = ImageDeltaCompressor::new(2).expect("codec");

        let block = codec.compress(None, &target).expect("compress");
        let header = block.header().expect("header");

        assert!(!header.source_present);
        assert_eq!(header.tile_count, 1);
        assert!(matches!(
            block.records().expect("records").as_slice(),
            [DeltaRecord::Literal { tile: 0, data }] if data.len() == 70
        ));
        assert_eq!(ImageDeltaCompressor::decompress(None, &block).expect("decompress"), target);
    }

    #[test]
    fn compress_rejects_dimension_mismatch() {
        let codec = ImageDeltaCompressor::new(4).expect("codec");
        let a = gray(10, 10, |_, _| 0);
        let b = gray(10, 11, |_, _| 0);

        assert!(matches!(
            codec.compress(Some(&a), &b),
            Err(DeltaError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn zero_tile_rows_is_rejected() {
        assert!(matches!(ImageDeltaCompressor::new(0), Err(DeltaError::InvalidTileSize(_))));
    }

    #[test]
    fn decompress_requires_baseline_when_flagged() {
        let image = gray(8, 8, |_, _| 1);
        let block = ImageDeltaCompressor::new(2)
            .expect("codec")
            .compress(Some(&image), &image)
            .expect("compress");

        assert!(matches!(
            ImageDeltaCompressor::decompress(None, &block),
            Err(DeltaError::MissingSource)
        ));
    }

    #[test]
    fn decompress_rejects_wrong_length_baseline() {
        let image = gray(8, 8, |_, _| 1);
        let other = gray(8, 9, |_, _| 1);
        let block = ImageDeltaCompressor::new(2)
            .expect("codec")
            .compress(Some(&image), &image)
            .expect("compress");

        assert!(matches!(
            ImageDeltaCompressor::decompress(Some(&other), &block),
            Err(DeltaError::CorruptDelta(_))
        ));
    }

    #[test]
    fn decompress_rejects_every_truncation() {
        let source = gray(16, 16, |x, _| x as u8);
        let target = gray(16, 16, |x, y| if y == 5 { 9 } else { x as u8 });
        let block = ImageDeltaCompressor::new(4)
            .expect("codec")
            .compress(Some(&source), &target)
            .expect("compress");

        for cut in 0..block.len() {
            let truncated = DeltaBlock::from_bytes(block.as_bytes()[..cut].to_vec());
            let result = ImageDeltaCompressor::decompress(Some(&source), &truncated);
            assert!(
                matches!(result, Err(DeltaError::CorruptDelta(_))),
                "cut at {} should be rejected, got {:?}",
                cut,
                result
            );
        }
    }

    #[test]
    fn decompress_rejects_inconsistent_tile_size() {
        let image = gray(10, 10, |_, _| 3);
        let block = ImageDeltaCompressor::new(5)
            .expect("codec")
            .compress(Some(&image), &image)
            .expect("compress");

        // tile_size 位于偏移 16..20，改成 7 字节（不按行对齐、块数也不符）
        let mut bytes = block.as_bytes().to_vec();
        bytes[16..20].copy_from_slice(&7u32.to_be_bytes());

        assert!(matches!(
            ImageDeltaCompressor::decompress(Some(&image), &DeltaBlock::from_bytes(bytes)),
            Err(DeltaError::InvalidTileSize(_))
        ));
    }

    #[test]
    fn decompress_rejects_unknown_version_and_tag() {
        let image = gray(4, 4, |_, _| 3);
        let block = ImageDeltaCompressor::new(2)
            .expect("codec")
            .compress(Some(&image), &image)
            .expect("compress");

        let mut bad_version = block.as_bytes().to_vec();
        bad_version[4] = 9;
        assert!(matches!(
            ImageDeltaCompressor::decompress(Some(&image), &DeltaBlock::from_bytes(bad_version)),
            Err(DeltaError::CorruptDelta(_))
        ));

        let mut bad_tag = block.as_bytes().to_vec();
        bad_tag[HEADER_LEN] = 0x7f;
        assert!(matches!(
            ImageDeltaCompressor::decompress(Some(&image), &DeltaBlock::from_bytes(bad_tag)),
            Err(DeltaError::CorruptDelta(_))
        ));
    }

    #[test]
    fn stats_count_runs_and_literals() {
        let source = gray(4, 8, |_, _| 0);
        let target = gray(4, 8, |_, y| if y == 0 || y == 7 { 1 } else { 0 });
        let block = ImageDeltaCompressor::new(2)
            .expect("codec")
            .compress(Some(&source), &target)
            .expect("compress");

        assert_eq!(
            block.stats().expect("stats"),
            DeltaStats { copy_runs: 1, copied_tiles: 2, literal_tiles: 2 }
        );
    }

    proptest! {
        #[test]
        fn roundtrip_reconstructs_target(
            width in 1u32..24,
            height in 1u32..24,
            tile_rows in 1u32..8,
            seed in any::<u64>(),
            changes in proptest::collection::vec((0usize..2048, any::<u8>()), 0..16),
        ) {
            let len = (width * height * 4) as usize;
            let source_bytes: Vec<u8> = (0..len).map(|i| ((i as u64).wrapping_mul(seed | 1) >> 3) as u8).collect();
            let mut target_bytes = source_bytes.clone();
            for (index, value) in changes {
                let index = index % len;
                target_bytes[index] = value;
            }

            let source = RasterImage::new(width, height, PixelFormat::Rgba8, source_bytes).expect("source");
            let target = RasterImage::new(width, height, PixelFormat::Rgba8, target_bytes).expect("target");
            let codec = ImageDeltaCompressor::new(tile_rows).expect("codec");

            let block = codec.compress(Some(&source), &target).expect("compress");
            prop_assert_eq!(ImageDeltaCompressor::decompress(Some(&source), &block).expect("decompress"), target.clone());

            let full = codec.compress(None, &target).expect("compress without baseline");
            prop_assert_eq!(ImageDeltaCompressor::decompress(None, &full).expect("decompress"), target);
        }
    }
}
