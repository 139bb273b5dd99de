//! Read-only byte sources for dissection.
//!
//! Engines never own the input: they borrow a [`ByteSource`] and parse from
//! its backing slice through bounds-checked reads. [`MappedSource`] maps a
//! file with `memmap2` and enforces a size limit; [`MemorySource`] wraps an
//! in-memory buffer.

pub mod error;

use crate::io::error::{IoError, Result};
use bytes::Bytes;
use memchr::memmem;
use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// Defines the resource limits for opening sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoLimits {
    /// The absolute maximum file size that can be opened.
    pub max_file_size: u64,
}

impl Default for IoLimits {
    fn default() -> Self {
        Self {
            max_file_size: 512 * 1024 * 1024, // 512MB
        }
    }
}

/// Random-access, read-only view of file bytes.
pub trait ByteSource {
    /// Total length in bytes.
    fn len(&self) -> u64;

    /// Raw access to the whole source for zero-copy parsing.
    fn as_slice(&self) -> &[u8];

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow exactly `n` bytes at `offset`; never short-reads.
    fn read_at(&self, offset: u64, n: usize) -> Result<&[u8]> {
        let data = self.as_slice();
        let len = data.len() as u64;
        let end = offset.checked_add(n as u64).filter(|&e| e <= len);
        match end {
            Some(end) => Ok(&data[offset as usize..end as usize]),
            None => Err(IoError::Truncated {
                offset,
                needed: n as u64,
                available: len.saturating_sub(offset),
            }),
        }
    }

    /// First occurrence of `needle` at or after `from`.
    fn find_forward(&self, from: u64, needle: &[u8]) -> Option<u64> {
        let data = self.as_slice();
        if from > data.len() as u64 {
            return None;
        }
        memmem::find(&data[from as usize..], needle).map(|pos| from + pos as u64)
    }

    /// Last occurrence of `needle` that ends at or before `before`.
    fn find_backward(&self, before: u64, needle: &[u8]) -> Option<u64> {
        let data = self.as_slice();
        let end = before.min(data.len() as u64) as usize;
        memmem::rfind(&data[..end], needle).map(|pos| pos as u64)
    }

    fn cursor(&self) -> SourceCursor<'_> {
        SourceCursor::new(self.as_slice())
    }
}

/// A seekable read position over a source.
#[derive(Debug, Clone)]
pub struct SourceCursor<'a> {
    data: &'a [u8],
    pos: u64,
}

impl<'a> SourceCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn remaining(&self) -> u64 {
        (self.data.len() as u64).saturating_sub(self.pos)
    }

    /// Move to an absolute offset; the end of the source is a valid position.
    pub fn seek(&mut self, offset: u64) -> Result<u64> {
        if offset > self.data.len() as u64 {
            return Err(IoError::OutOfBounds {
                offset,
                len: self.data.len() as u64,
            });
        }
        self.pos = offset;
        Ok(offset)
    }

    /// Read exactly `n` bytes and advance, or fail without moving.
    pub fn read(&mut self, n: usize) -> Result<&'a [u8]> {
        let available = self.remaining();
        if (n as u64) > available {
            return Err(IoError::Truncated {
                offset: self.pos,
                needed: n as u64,
                available,
            });
        }
        let start = self.pos as usize;
        self.pos += n as u64;
        Ok(&self.data[start..start + n])
    }

    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<()> {
        let bytes = self.read(buf.len())?;
        buf.copy_from_slice(bytes);
        Ok(())
    }

    /// Offset of the next `needle` at or after the cursor.
    pub fn find_forward(&self, needle: &[u8]) -> Option<u64> {
        ByteSource::find_forward(self.data, self.pos, needle)
    }

    /// Offset of the last `needle` that ends at or before the cursor.
    pub fn find_backward(&self, needle: &[u8]) -> Option<u64> {
        ByteSource::find_backward(self.data, self.pos, needle)
    }
}

/// Parsing stages work on borrowed slices of a source; they search and read
/// through the same checked operations.
impl ByteSource for [u8] {
    fn len(&self) -> u64 {
        <[u8]>::len(self) as u64
    }

    fn as_slice(&self) -> &[u8] {
        self
    }
}

/// A memory-mapped file source bounded by [`IoLimits`].
pub struct MappedSource {
    path: PathBuf,
    // None when the file size is zero; memmap cannot map empty files.
    mmap: Option<Mmap>,
    limits: IoLimits,
}

impl MappedSource {
    /// Opens and maps a file read-only.
    ///
    /// Fails if the file size exceeds `limits.max_file_size`.
    pub fn open<P: AsRef<Path>>(path: P, limits: IoLimits) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();

        debug!(
            path = %path.display(),
            size = file_size,
            limits.max_file_size = limits.max_file_size,
            "Opening file for dissection"
        );

        if file_size > limits.max_file_size {
            warn!(
                path = %path.display(),
                size = file_size,
                limit = limits.max_file_size,
                "File is too large"
            );
            return Err(IoError::FileTooLarge {
                limit: limits.max_file_size,
                found: file_size,
            });
        }

        let mmap = if file_size == 0 {
            None
        } else {
            // Safety: read-only map of a regular file; the source never hands out mutable access.
            Some(unsafe { Mmap::map(&file)? })
        };

        trace!(path = %path.display(), mapped = mmap.is_some(), "File mapped");
        Ok(Self {
            path: path.to_path_buf(),
            mmap,
            limits,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn limits(&self) -> &IoLimits {
        &self.limits
    }
}

impl ByteSource for MappedSource {
    fn len(&self) -> u64 {
        self.mmap.as_ref().map_or(0, |m| m.len() as u64)
    }

    fn as_slice(&self) -> &[u8] {
        match &self.mmap {
            Some(m) => &m[..],
            None => &[],
        }
    }
}

/// An in-memory source.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    data: Bytes,
}

impl MemorySource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

impl ByteSource for MemorySource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn as_slice(&self) -> &[u8] {
        &self.data
    }
}
