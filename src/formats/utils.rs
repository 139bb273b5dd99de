//! Bounds-checked integer reads shared by the format engines.

use crate::error::{DissectError, Result};
use crate::io::ByteSource;

/// Byte order of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

/// Trait for reading values with endianness support
pub trait EndianRead {
    fn read_u8(&self, offset: usize) -> Result<u8>;
    fn read_u16(&self, offset: usize, endian: Endian) -> Result<u16>;
    fn read_u32(&self, offset: usize, endian: Endian) -> Result<u32>;
    fn read_u64(&self, offset: usize, endian: Endian) -> Result<u64>;
    fn read_bytes(&self, offset: usize, len: usize) -> Result<&[u8]>;

    fn read_u16_le(&self, offset: usize) -> Result<u16> {
        self.read_u16(offset, Endian::Little)
    }

    fn read_u32_le(&self, offset: usize) -> Result<u32> {
        self.read_u32(offset, Endian::Little)
    }

    fn read_u64_le(&self, offset: usize) -> Result<u64> {
        self.read_u64(offset, Endian::Little)
    }
}

fn array_at<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N]> {
    offset
        .checked_add(N)
        .and_then(|end| data.get(offset..end))
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| DissectError::truncated(offset as u64, N as u64))
}

impl EndianRead for [u8] {
    fn read_u8(&self, offset: usize) -> Result<u8> {
        self.get(offset)
            .copied()
            .ok_or_else(|| DissectError::truncated(offset as u64, 1))
    }

    fn read_u16(&self, offset: usize, endian: Endian) -> Result<u16> {
        let bytes = array_at::<2>(self, offset)?;
        Ok(match endian {
            Endian::Little => u16::from_le_bytes(bytes),
            Endian::Big => u16::from_be_bytes(bytes),
        })
    }

    fn read_u32(&self, offset: usize, endian: Endian) -> Result<u32> {
        let bytes = array_at::<4>(self, offset)?;
        Ok(match endian {
            Endian::Little => u32::from_le_bytes(bytes),
            Endian::Big => u32::from_be_bytes(bytes),
        })
    }

    fn read_u64(&self, offset: usize, endian: Endian) -> Result<u64> {
        let bytes = array_at::<8>(self, offset)?;
        Ok(match endian {
            Endian::Little => u64::from_le_bytes(bytes),
            Endian::Big => u64::from_be_bytes(bytes),
        })
    }

    fn read_bytes(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.read_at(offset as u64, len)
            .map_err(|_| DissectError::truncated(offset as u64, len as u64))
    }
}

/// Read an unsigned big-endian integer of 0..=8 bytes.
pub fn read_be_uint(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// Check if a range is within bounds
pub fn check_bounds(offset: usize, size: usize, data_len: usize) -> Result<()> {
    match offset.checked_add(size) {
        Some(end) if end <= data_len => Ok(()),
        _ => Err(DissectError::truncated(offset as u64, size as u64)),
    }
}

/// Decode little-endian UTF-16 bytes, stopping at the first NUL.
pub fn utf16le_to_string(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .take_while(|&u| u != 0)
        .collect();
    String::from_utf16_lossy(&units)
}
