//! Stream descriptors and stream data extraction

use crate::config::CbffConfig;
use crate::diag::{DiagnosticKind, Diagnostics};
use crate::error::{DissectError, Result};
use crate::formats::cbff::fat::{sectors_in_source, AllocationTable};
use crate::formats::cbff::types::*;
use crate::formats::chain::{ChainStep, ChainWalker};
use crate::formats::utils::EndianRead;
use crate::tree::{ByteRange, NodeId};
use tracing::{debug, trace};

/// A named stream found in the directory hierarchy.
#[derive(Debug, Clone)]
pub struct CbffStream {
    pub name: String,
    pub entry_index: u32,
    pub start_sector: u32,
    pub size: u64,
    /// Tree node created for the stream during reconstruction
    pub node: NodeId,
    /// Set by stream dissectors before data is fetched
    pub wanted: bool,
    pub data: Option<Vec<u8>>,
    /// File offset of each chunk (sector or mini-sector) of `data`
    pub chunk_offsets: Vec<u64>,
    pub chunk_size: u64,
}

impl CbffStream {
    pub fn new(name: String, entry_index: u32, start_sector: u32, size: u64, node: NodeId) -> Self {
        Self {
            name,
            entry_index,
            start_sector,
            size,
            node,
            wanted: false,
            data: None,
            chunk_offsets: Vec::new(),
            chunk_size: 0,
        }
    }

    /// Loaded bytes, empty when nothing was fetched.
    pub fn bytes(&self) -> &[u8] {
        self.data.as_deref().unwrap_or(&[])
    }

    pub fn is_loaded(&self) -> bool {
        self.data.is_some()
    }

    /// Map an offset inside the stream to its physical file offset.
    pub fn file_offset(&self, stream_offset: u64) -> Option<u64> {
        if stream_offset >= self.bytes().len() as u64 || self.chunk_size == 0 {
            return None;
        }
        let chunk = (stream_offset / self.chunk_size) as usize;
        let rem = stream_offset % self.chunk_size;
        self.chunk_offsets.get(chunk).map(|&base| base + rem)
    }

    /// Physical ranges covering `len` stream bytes starting at `stream_offset`.
    ///
    /// Adjacent chunks are merged, so a span inside contiguous sectors yields
    /// one range and a span crossing a discontinuity yields several.
    pub fn file_ranges(&self, stream_offset: u64, len: u64) -> Vec<ByteRange> {
        let mut out: Vec<ByteRange> = Vec::new();
        if self.chunk_size == 0 {
            return out;
        }
        let total = self.bytes().len() as u64;
        let mut pos = stream_offset;
        let end = stream_offset.saturating_add(len).min(total);
        while pos < end {
            let chunk = (pos / self.chunk_size) as usize;
            let rem = pos % self.chunk_size;
            let Some(&base) = self.chunk_offsets.get(chunk) else {
                break;
            };
            let take = (self.chunk_size - rem).min(end - pos);
            let start = base + rem;
            match out.last_mut() {
                Some(last) if last.end() == Some(start) => last.length += take,
                _ => out.push(ByteRange::new(start, take)),
            }
            pos += take;
        }
        out
    }
}

/// Fetches stream bytes through the FAT or the mini-stream.
pub struct StreamReader<'a> {
    data: &'a [u8],
    header: &'a CbffHeader,
    fat: &'a AllocationTable,
    minifat: &'a AllocationTable,
    /// File offsets of the sectors holding the mini-stream
    mini_stream: Vec<u64>,
    mini_enabled: bool,
}

impl<'a> StreamReader<'a> {
    /// Prepare a reader; `root` supplies the mini-stream's first sector.
    pub fn new(
        data: &'a [u8],
        header: &'a CbffHeader,
        fat: &'a AllocationTable,
        minifat: &'a AllocationTable,
        root: Option<&DirEntry>,
        diag: &mut Diagnostics,
    ) -> Self {
        let mut mini_enabled = true;
        if header.mini_sector_size > header.sector_size {
            diag.warn(
                DiagnosticKind::Validation,
                "cbff::stream",
                format!(
                    "mini sector size {} exceeds sector size {}, mini-stream reads disabled",
                    header.mini_sector_size, header.sector_size
                ),
            );
            mini_enabled = false;
        }

        let mut mini_stream = Vec::new();
        if let Some(root) = root {
            let limit = sectors_in_source(data.len(), header).max(1);
            let mut walker = ChainWalker::new(&fat.entries, "FAT");
            mini_stream = walker
                .collect(root.start_sector, limit, diag)
                .into_iter()
                .map(|s| header.sector_offset(s))
                .collect();
        }

        Self {
            data,
            header,
            fat,
            minifat,
            mini_stream,
            mini_enabled,
        }
    }

    /// Whether a stream of `size` bytes lives in the mini-stream.
    pub fn uses_mini_stream(&self, size: u64) -> bool {
        size < self.header.mini_cutoff as u64
    }

    fn mini_sector_offset(&self, mini: u32) -> Result<u64> {
        let logical = mini as u64 * self.header.mini_sector_size;
        let idx = (logical / self.header.sector_size) as usize;
        let rem = logical % self.header.sector_size;
        self.mini_stream
            .get(idx)
            .map(|&base| base + rem)
            .ok_or_else(|| {
                DissectError::structural(
                    logical,
                    format!("End of chain reached skipping sectors for mini sector 0x{:x}", mini),
                )
            })
    }

    /// Load `stream.data` and its chunk offsets.
    pub fn read(&self, stream: &mut CbffStream, config: &CbffConfig, diag: &mut Diagnostics) {
        if stream.size == 0 {
            if config.read_empty_streams {
                stream.data = Some(Vec::new());
            }
            return;
        }
        if stream.size > config.max_stream_size {
            diag.warn(
                DiagnosticKind::Resource,
                "cbff::stream",
                format!(
                    "stream \"{}\" is {} bytes, above the {} byte limit; not read",
                    stream.name, stream.size, config.max_stream_size
                ),
            );
            return;
        }

        let mini = self.uses_mini_stream(stream.size);
        if mini && !self.mini_enabled {
            return;
        }
        let (table, chunk, chain) = if mini {
            (&self.minifat.entries, self.header.mini_sector_size, "MiniFAT")
        } else {
            (&self.fat.entries, self.header.sector_size, "FAT")
        };

        let mut buf = Vec::with_capacity(stream.size.min(self.data.len() as u64) as usize);
        let mut offsets = Vec::new();
        let mut remaining = stream.size;
        let mut walker = ChainWalker::new(table, chain);
        let mut cur = stream.start_sector;

        if cur <= MAXREGSECT {
            walker.start(cur);
            loop {
                let offset = if mini {
                    self.mini_sector_offset(cur)
                } else {
                    Ok(self.header.sector_offset(cur))
                };
                let n = chunk.min(remaining) as usize;
                let bytes = offset.and_then(|off| {
                    let start = usize::try_from(off)
                        .map_err(|_| DissectError::truncated(off, n as u64))?;
                    Ok((off, self.data.read_bytes(start, n)?))
                });
                match bytes {
                    Ok((off, b)) => {
                        buf.extend_from_slice(b);
                        offsets.push(off);
                        remaining -= n as u64;
                    }
                    Err(e) => {
                        diag.record("cbff::stream", &e);
                        break;
                    }
                }
                if remaining == 0 {
                    break;
                }
                match walker.next(cur, diag) {
                    ChainStep::Next(next) => cur = next,
                    ChainStep::EndOfChain => break,
                }
            }
        }

        if remaining > 0 {
            diag.warn(
                DiagnosticKind::Structural,
                "cbff::stream",
                format!(
                    "stream \"{}\": returning with {} bytes remaining",
                    stream.name, remaining
                ),
            );
        }

        trace!(
            stream = %stream.name,
            mini,
            chunks = offsets.len(),
            "stream read"
        );
        stream.data = Some(buf);
        stream.chunk_offsets = offsets;
        stream.chunk_size = chunk;
    }

    /// Fetch every wanted stream that is not loaded yet.
    pub fn read_wanted(
        &self,
        streams: &mut [CbffStream],
        config: &CbffConfig,
        diag: &mut Diagnostics,
    ) -> usize {
        let mut count = 0;
        for stream in streams.iter_mut().filter(|s| s.wanted && !s.is_loaded()) {
            self.read(stream, config, diag);
            count += 1;
        }
        debug!(count, "wanted streams read");
        count
    }
}
