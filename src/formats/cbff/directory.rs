//! Directory sectors, entries and hierarchy reconstruction

use crate::diag::{DiagnosticKind, Diagnostics};
use crate::error::{DissectError, Result};
use crate::formats::cbff::fat::{sector_data, sectors_in_source, AllocationTable};
use crate::formats::cbff::stream::CbffStream;
use crate::formats::cbff::types::*;
use crate::formats::chain::ChainWalker;
use crate::formats::utils::{utf16le_to_string, EndianRead};
use crate::timeout::IterationTimeout;
use crate::tree::{ByteRange, NodeId, TreeSink};
use std::collections::HashSet;
use tracing::{debug, warn};

/// The flat directory as read from the directory sector chain.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    /// Every entry slot, including trailing invalid ones
    pub entries: Vec<DirEntry>,
    /// File offset of each directory sector
    pub sector_offsets: Vec<u64>,
    /// Entries before the first invalid one
    pub valid_count: usize,
    /// Index of the first root entry
    pub root: Option<usize>,
}

impl Directory {
    pub fn root_entry(&self) -> Option<&DirEntry> {
        self.root.and_then(|i| self.entries.get(i))
    }

    /// Entry `index` if it lies within the valid range.
    pub fn get(&self, index: u32) -> Option<&DirEntry> {
        let index = index as usize;
        if index < self.valid_count {
            self.entries.get(index)
        } else {
            None
        }
    }
}

/// Decode one 128-byte entry.
pub fn parse_entry(bytes: &[u8], index: u32, file_offset: u64) -> Result<DirEntry> {
    let name_len = bytes.read_u16_le(dirent::NAME_LEN)?;
    let capped = (name_len as usize).min(64);
    let name = utf16le_to_string(bytes.read_bytes(dirent::NAME, capped)?);

    Ok(DirEntry {
        index,
        name,
        name_len,
        entry_type: EntryType::from(bytes.read_u8(dirent::TYPE)?),
        color: EntryColor::from(bytes.read_u8(dirent::COLOR)?),
        left: bytes.read_u32_le(dirent::LEFT)?,
        right: bytes.read_u32_le(dirent::RIGHT)?,
        child: bytes.read_u32_le(dirent::CHILD)?,
        clsid: guid_from_bytes(bytes.read_bytes(dirent::CLSID, 16)?),
        user_flags: bytes.read_u32_le(dirent::USER_FLAGS)?,
        create_time: bytes.read_u64_le(dirent::CREATE_TIME)?,
        modify_time: bytes.read_u64_le(dirent::MODIFY_TIME)?,
        start_sector: bytes.read_u32_le(dirent::START_SECTOR)?,
        size: bytes.read_u32_le(dirent::SIZE)?,
        size_high: bytes.read_u32_le(dirent::SIZE_HIGH)?,
        file_offset,
    })
}

/// Walk the directory chain and decode every entry slot.
pub fn load_directory(
    data: &[u8],
    header: &CbffHeader,
    fat: &AllocationTable,
    diag: &mut Diagnostics,
) -> Result<Directory> {
    let limit = sectors_in_source(data.len(), header).max(1);
    let mut walker = ChainWalker::new(&fat.entries, "FAT");
    let chain = walker.collect(header.dir_start, limit, diag);

    let per_sector = (header.sector_size as usize) / DIR_ENTRY_SIZE;
    if per_sector == 0 {
        return Err(DissectError::Validation(format!(
            "sector size {} cannot hold a directory entry",
            header.sector_size
        )));
    }

    let mut dir = Directory::default();
    for (n, &sector) in chain.iter().enumerate() {
        let bytes = sector_data(data, header, sector).map_err(|_| {
            DissectError::structural(
                header.sector_offset(sector),
                format!("Only read {} of {} directory sectors", n, chain.len()),
            )
        })?;
        let offset = header.sector_offset(sector);
        dir.sector_offsets.push(offset);
        for i in 0..per_sector {
            let start = i * DIR_ENTRY_SIZE;
            let entry_offset = offset + start as u64;
            let index = dir.entries.len() as u32;
            let raw = bytes.read_bytes(start, DIR_ENTRY_SIZE)?;
            dir.entries.push(parse_entry(raw, index, entry_offset)?);
        }
    }

    // Invalid entries are only expected at the tail.
    let mut valid = 0;
    for (i, entry) in dir.entries.iter().enumerate() {
        if dir.root.is_none() && entry.entry_type == EntryType::Root {
            dir.root = Some(i);
        }
        if entry.entry_type == EntryType::Invalid {
            break;
        }
        valid = i + 1;
    }
    dir.valid_count = valid;

    debug!(
        sectors = dir.sector_offsets.len(),
        entries = dir.entries.len(),
        valid = dir.valid_count,
        "Directory loaded"
    );
    Ok(dir)
}

fn field(tree: &mut dyn TreeSink, parent: NodeId, label: String, entry: &DirEntry, at: usize, len: u64) {
    tree.append_range(parent, &label, entry.file_offset + at as u64, len);
}

/// Add `Directory` → `Directory Sector # n` → `Entry n` → fields.
pub fn add_directory_nodes(
    tree: &mut dyn TreeSink,
    parent: NodeId,
    dir: &Directory,
    header: &CbffHeader,
    diag: &mut Diagnostics,
) -> NodeId {
    let id = tree.append_label(parent, "Directory");
    let per_sector = (header.sector_size as usize) / DIR_ENTRY_SIZE;

    for (n, &offset) in dir.sector_offsets.iter().enumerate() {
        let sect = tree.append_range(
            id,
            &format!("Directory Sector # {}", n),
            offset,
            header.sector_size,
        );
        for entry in dir.entries.iter().skip(n * per_sector).take(per_sector) {
            if entry.entry_type == EntryType::Invalid {
                continue;
            }
            let e = tree.append_range(
                sect,
                &format!("Entry {}", entry.index),
                entry.file_offset,
                DIR_ENTRY_SIZE as u64,
            );
            add_entry_fields(tree, e, entry, dir.root == Some(entry.index as usize));
            if let EntryType::Unknown(t) = entry.entry_type {
                diag.warn(
                    DiagnosticKind::Structural,
                    "cbff::directory",
                    format!("Unknown directory entry type (0x{:x}) in entry {}", t, entry.index),
                );
            }
        }
    }
    id
}

fn add_entry_fields(tree: &mut dyn TreeSink, e: NodeId, entry: &DirEntry, is_root: bool) {
    field(tree, e, format!("Name: {}", entry.name), entry, dirent::NAME, 64);
    field(
        tree,
        e,
        format!("Name Length: 0x{:04x}", entry.name_len),
        entry,
        dirent::NAME_LEN,
        2,
    );
    let raw_type = match entry.entry_type {
        EntryType::Invalid => 0,
        EntryType::Storage => 1,
        EntryType::Stream => 2,
        EntryType::LockBytes => 3,
        EntryType::Property => 4,
        EntryType::Root => 5,
        EntryType::Unknown(v) => v,
    };
    field(
        tree,
        e,
        format!("Type: 0x{:02x} ({})", raw_type, entry.entry_type),
        entry,
        dirent::TYPE,
        1,
    );
    field(tree, e, format!("Color: {}", entry.color), entry, dirent::COLOR, 1);
    field(
        tree,
        e,
        format!("Left Sibling: 0x{:08x}", entry.left),
        entry,
        dirent::LEFT,
        4,
    );
    field(
        tree,
        e,
        format!("Right Sibling: 0x{:08x}", entry.right),
        entry,
        dirent::RIGHT,
        4,
    );
    field(tree, e, format!("Child: 0x{:08x}", entry.child), entry, dirent::CHILD, 4);
    field(tree, e, format!("CLSID: {}", entry.clsid), entry, dirent::CLSID, 16);
    field(
        tree,
        e,
        format!("User Flags: 0x{:08x}", entry.user_flags),
        entry,
        dirent::USER_FLAGS,
        4,
    );
    field(
        tree,
        e,
        format!("Create Time: {}", describe_filetime(entry.create_time)),
        entry,
        dirent::CREATE_TIME,
        8,
    );
    field(
        tree,
        e,
        format!("Modify Time: {}", describe_filetime(entry.modify_time)),
        entry,
        dirent::MODIFY_TIME,
        8,
    );
    let (start_label, size_label) = if is_root {
        ("MiniStream Start", "MiniStream Length")
    } else {
        ("Start Sector", "Size")
    };
    field(
        tree,
        e,
        format!("{}: {}", start_label, describe_sector(entry.start_sector)),
        entry,
        dirent::START_SECTOR,
        4,
    );
    field(
        tree,
        e,
        format!("{}: 0x{:08x}", size_label, entry.size),
        entry,
        dirent::SIZE,
        4,
    );
}

struct Visit {
    index: u32,
    parent: NodeId,
    depth: usize,
}

/// Rebuild the storage hierarchy under a `Root` node.
///
/// Traversal is iterative: each entry pushes its right sibling, left sibling
/// and (for storages) its child subtree, so the output order matches a
/// pre-order walk. Subtrees deeper than `max_depth` are skipped, as are
/// entries that were already placed. Stream entries become [`CbffStream`]s.
pub fn reconstruct(
    tree: &mut dyn TreeSink,
    parent: NodeId,
    dir: &Directory,
    max_depth: usize,
    budget: &mut IterationTimeout,
    diag: &mut Diagnostics,
) -> Result<(NodeId, Vec<CbffStream>)> {
    let root_node = tree.append_label(parent, "Root");
    let mut streams = Vec::new();

    let Some(root) = dir.root_entry() else {
        diag.warn(
            DiagnosticKind::Structural,
            "cbff::directory",
            "no root directory entry found",
        );
        return Ok((root_node, streams));
    };
    if root.child == NOSTREAM {
        return Ok((root_node, streams));
    }

    let mut placed: HashSet<u32> = HashSet::new();
    placed.insert(root.index);
    let mut stack = vec![Visit {
        index: root.child,
        parent: root_node,
        depth: 1,
    }];

    while let Some(visit) = stack.pop() {
        budget.check()?;

        let Some(entry) = dir.get(visit.index) else {
            diag.warn(
                DiagnosticKind::Structural,
                "cbff::directory",
                format!("Invalid directory reference (0x{:x})", visit.index),
            );
            continue;
        };
        if visit.depth > max_depth {
            warn!(index = visit.index, depth = visit.depth, "Directory depth cap reached");
            diag.warn(
                DiagnosticKind::RecursionLimit,
                "cbff::directory",
                format!(
                    "Maximum recursion depth reached (0x{:x}) at entry {}",
                    max_depth, visit.index
                ),
            );
            continue;
        }
        if !placed.insert(visit.index) {
            diag.warn(
                DiagnosticKind::CycleDetected,
                "cbff::directory",
                format!("Directory entry {} referenced more than once", visit.index),
            );
            continue;
        }

        let node = tree.append_child(
            visit.parent,
            &entry.name,
            vec![ByteRange::new(entry.file_offset, DIR_ENTRY_SIZE as u64)],
        );

        let next_depth = visit.depth + 1;
        if entry.right != NOSTREAM {
            stack.push(Visit {
                index: entry.right,
                parent: visit.parent,
                depth: next_depth,
            });
        }
        if entry.left != NOSTREAM {
            stack.push(Visit {
                index: entry.left,
                parent: visit.parent,
                depth: next_depth,
            });
        }
        match entry.entry_type {
            EntryType::Storage => {
                if entry.child != NOSTREAM {
                    stack.push(Visit {
                        index: entry.child,
                        parent: node,
                        depth: next_depth,
                    });
                }
            }
            EntryType::Stream => {
                streams.push(CbffStream::new(
                    entry.name.clone(),
                    entry.index,
                    entry.start_sector,
                    entry.size as u64,
                    node,
                ));
            }
            _ => {}
        }
    }

    Ok((root_node, streams))
}
