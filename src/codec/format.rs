//! # 差分块线格式（v1）
//!
//! ```text
//! 头部（32 字节，整数均为大端）
//! ┌────────┬─────────┬───────┬────────┬──────────┬───────┬────────┬───────────┬────────────┬───────────┐
//! │ "VDLT" │ version │ flags │ format │ reserved │ width │ height │ tile_size │ tile_count │ total_len │
//! │   4    │    1    │   1   │   1    │    1     │   4   │   4    │     4     │     4      │     8     │
//! └────────┴─────────┴───────┴────────┴──────────┴───────┴────────┴───────────┴────────────┴───────────┘
//!
//! 记录（按分块顺序排列）
//!   0x01 CopyRun  : start u32, count u32
//!   0x02 Literal  : tile u32, len u32, bytes[len]
//! ```
//!
//! `flags` 的 bit0 表示编码时存在基线。格式一旦发布不可改动，
//! 变更时必须提升 `version`，旧解码器会直接拒绝未知版本。

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::DeltaError;
use crate::raster::PixelFormat;

pub(crate) const MAGIC: &[u8; 4] = b"VDLT";
pub const FORMAT_VERSION: u8 = 1;
pub(crate) const HEADER_LEN: usize = 32;

const FLAG_SOURCE_PRESENT: u8 = 0b0000_0001;
const TAG_COPY_RUN: u8 = 0x01;
const TAG_LITERAL: u8 = 0x02;

/// 单条记录固定开销（tag + 两个 u32）。
pub(crate) const RECORD_OVERHEAD: usize = 9;

/// 差分块头部。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaHeader {
    pub version: u8,
    pub source_present: bool,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// 单个分块的字节数（最后一块可以更短）。
    pub tile_size: u32,
    pub tile_count: u32,
    pub total_len: u64,
}

impl DeltaHeader {
    pub(crate) fn write(&self, out: &mut BytesMut) {
        out.put_slice(MAGIC);
        out.put_u8(self.version);
        out.put_u8(if self.source_present { FLAG_SOURCE_PRESENT } else { 0 });
        out.put_u8(self.format.code());
        out.put_u8(0);
        out.put_u32(self.width);
        out.put_u32(self.height);
        out.put_u32(self.tile_size);
        out.put_u32(self.tile_count);
        out.put_u64(self.total_len);
    }

    pub(crate) fn read(buf: &mut &[u8]) -> Result<Self, DeltaError> {
        if buf.remaining() < HEADER_LEN {
            return Err(DeltaError::corrupt(format!(
                "头部长度不足：{} 字节",
                buf.remaining()
            )));
        }

        let mut magic = [0u8; 4];
        buf.copy_to_slice(&mut magic);
        if &magic != MAGIC {
            return Err(DeltaError::corrupt("魔数不匹配"));
        }

        let version = buf.get_u8();
        if version != FORMAT_VERSION {
            return Err(DeltaError::corrupt(format!("不支持的版本：{}", version)));
        }

        let flags = buf.get_u8();
        let format_code = buf.get_u8();
        let format = PixelFormat::from_code(format_code)
            .ok_or_else(|| DeltaError::corrupt(format!("未知像素格式：{}", format_code)))?;
        let _reserved = buf.get_u8();

        Ok(Self {
            version,
            source_present: flags & FLAG_SOURCE_PRESENT != 0,
            format,
            width: buf.get_u32(),
            height: buf.get_u32(),
            tile_size: buf.get_u32(),
            tile_count: buf.get_u32(),
            total_len: buf.get_u64(),
        })
    }

    /// 第 `tile` 个分块的字节长度。
    pub(crate) fn tile_len(&self, tile: u32) -> usize {
        let start = tile as u64 * self.tile_size as u64;
        (self.total_len.saturating_sub(start)).min(self.tile_size as u64) as usize
    }
}

/// 单条差分记录。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaRecord {
    /// 连续 `count` 个分块与基线相同。
    CopyRun { start: u32, count: u32 },
    /// 分块内容不同，携带目标原始字节。
    Literal { tile: u32, data: Bytes },
}

impl DeltaRecord {
    pub(crate) fn write(&self, out: &mut BytesMut) {
        match self {
            Self::CopyRun { start, count } => {
                out.put_u8(TAG_COPY_RUN);
                out.put_u32(*start);
                out.put_u32(*count);
            }
            Self::Literal { tile, data } => {
                out.put_u8(TAG_LITERAL);
                out.put_u32(*tile);
                out.put_u32(data.len() as u32);
                out.put_slice(data);
            }
        }
    }

    /// 从 `block` 的 `offset` 处读取一条记录，返回记录与新偏移。
    ///
    /// `Literal` 的数据为 `block` 的零拷贝切片。
    pub(crate) fn read(block: &Bytes, offset: usize) -> Result<(Self, usize), DeltaError> {
        let mut buf = &block[offset..];
        if buf.remaining() < RECORD_OVERHEAD {
            return Err(DeltaError::corrupt(format!("记录在偏移 {} 处被截断", offset)));
        }

        let tag = buf.get_u8();
        let first = buf.get_u32();
        let second = buf.get_u32();
        let body_start = offset + RECORD_OVERHEAD;

        match tag {
            TAG_COPY_RUN => Ok((Self::CopyRun { start: first, count: second }, body_start)),
            TAG_LITERAL => {
                let len = second as usize;
                if buf.remaining() < len {
                    return Err(DeltaError::corrupt(format!(
                        "Literal 记录声明 {} 字节，仅剩 {} 字节",
                        len,
                        buf.remaining()
                    )));
                }
                let data = block.slice(body_start..body_start + len);
                Ok((Self::Literal { tile: first, data }, body_start + len))
            }
            other => Err(DeltaError::corrupt(format!("未知记录标签：0x{:02x}", other))),
        }
    }
}
