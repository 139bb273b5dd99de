//! FAT and MiniFAT loading

use crate::diag::{DiagnosticKind, Diagnostics};
use crate::error::{DissectError, Result};
use crate::formats::cbff::types::*;
use crate::formats::chain::ChainWalker;
use crate::formats::utils::EndianRead;
use crate::tree::{NodeId, TreeSink};
use tracing::debug;

/// An allocation table assembled from whole sectors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllocationTable {
    /// Next-sector entries, in table order
    pub entries: Vec<u32>,
    /// File offset of each sector the table was read from
    pub sector_offsets: Vec<u64>,
}

impl AllocationTable {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sector_count(&self) -> usize {
        self.sector_offsets.len()
    }

    fn push_sector(&mut self, offset: u64, bytes: &[u8]) {
        self.sector_offsets.push(offset);
        self.entries.extend(
            bytes
                .chunks_exact(4)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]])),
        );
    }
}

/// Borrow the bytes of sector `sector`.
pub fn sector_data<'a>(data: &'a [u8], header: &CbffHeader, sector: u32) -> Result<&'a [u8]> {
    let offset = header.sector_offset(sector);
    let start = usize::try_from(offset)
        .map_err(|_| DissectError::truncated(offset, header.sector_size))?;
    let len = usize::try_from(header.sector_size)
        .map_err(|_| DissectError::truncated(offset, header.sector_size))?;
    data.read_bytes(start, len)
}

/// Number of whole sectors that fit in a source of `len` bytes.
pub fn sectors_in_source(len: usize, header: &CbffHeader) -> usize {
    (len as u64 / header.sector_size.max(1)) as usize
}

/// Read the FAT from the sector slots stored in the header.
///
/// Declared counts above the in-header capacity are clamped; sectors that
/// cannot be read truncate the table.
pub fn load_fat(data: &[u8], header: &CbffHeader, diag: &mut Diagnostics) -> AllocationTable {
    let mut declared = header.fat_sector_count as usize;
    if declared > HEADER_FAT_SLOTS {
        diag.warn(
            DiagnosticKind::Unsupported,
            "cbff::fat",
            format!(
                "Unsupported FAT sector count: {} -- only reading the first {}",
                declared, HEADER_FAT_SLOTS
            ),
        );
        declared = HEADER_FAT_SLOTS;
    }

    let mut table = AllocationTable::default();
    let mut remaining = declared;
    for &slot in &header.fat_slots {
        if remaining == 0 {
            break;
        }
        if slot == FREESECT {
            continue;
        }
        match sector_data(data, header, slot) {
            Ok(bytes) => {
                table.push_sector(header.sector_offset(slot), bytes);
                remaining -= 1;
            }
            Err(e) => {
                diag.record("cbff::fat", &e);
                break;
            }
        }
    }

    if remaining > 0 {
        diag.warn(
            DiagnosticKind::Structural,
            "cbff::fat",
            format!(
                "Only found {} of {} FAT sectors, truncating",
                declared - remaining,
                declared
            ),
        );
    }

    debug!(
        sectors = table.sector_count(),
        entries = table.entries.len(),
        "FAT loaded"
    );
    table
}

/// Walk the MiniFAT sector chain through the FAT.
///
/// Reading fewer sectors than declared fails this stage.
pub fn load_minifat(
    data: &[u8],
    header: &CbffHeader,
    fat: &AllocationTable,
    diag: &mut Diagnostics,
) -> Result<AllocationTable> {
    let declared = header.minifat_sector_count as usize;
    let mut table = AllocationTable::default();
    if declared == 0 {
        return Ok(table);
    }

    let mut walker = ChainWalker::new(&fat.entries, "FAT");
    let chain = walker.collect(header.minifat_start, declared, diag);
    for sector in chain {
        match sector_data(data, header, sector) {
            Ok(bytes) => table.push_sector(header.sector_offset(sector), bytes),
            Err(e) => {
                diag.record("cbff::minifat", &e);
                break;
            }
        }
    }

    if table.sector_count() < declared {
        return Err(DissectError::structural(
            header.sector_offset(header.minifat_start),
            format!(
                "Only found {} of {} MiniFAT sectors",
                table.sector_count(),
                declared
            ),
        ));
    }
    Ok(table)
}

/// Add `<title>` with one `<title> sector # n` child per table sector.
pub fn add_table_nodes(
    tree: &mut dyn TreeSink,
    parent: NodeId,
    title: &str,
    table: &AllocationTable,
    sector_size: u64,
) -> NodeId {
    let id = tree.append_label(parent, title);
    let per_sector = (sector_size / 4) as usize;
    for (n, &offset) in table.sector_offsets.iter().enumerate() {
        let sect = tree.append_range(id, &format!("{} sector # {}", title, n), offset, sector_size);
        let first = n * per_sector;
        let entries = table.entries.iter().skip(first).take(per_sector);
        for (j, &value) in entries.enumerate() {
            tree.append_range(
                sect,
                &format!("[0x{:08x}]: {}", first + j, describe_sector(value)),
                offset + (j as u64) * 4,
                4,
            );
        }
    }
    id
}
