//! Compound Binary File types and constants

use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

pub use crate::formats::chain::{DIFSECT, ENDOFCHAIN, FATSECT, FREESECT, MAXREGSECT};

/// Size of the fixed header at the start of the file.
pub const HEADER_SIZE: usize = 512;

pub const SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
pub const BETA_SIGNATURE: [u8; 8] = [0x0E, 0x11, 0xFC, 0x0D, 0xD0, 0xCF, 0x11, 0xE0];

/// Little-endian byte order marker
pub const BYTE_ORDER_LE: u16 = 0xFFFE;

/// FAT sector pointers stored in the header itself.
pub const HEADER_FAT_SLOTS: usize = 109;

pub const DIR_ENTRY_SIZE: usize = 128;

/// Sibling/child value meaning "none".
pub const NOSTREAM: u32 = 0xFFFF_FFFF;

/// Header field offsets
pub mod hdr {
    pub const SIGNATURE: usize = 0x00;
    pub const CLSID: usize = 0x08;
    pub const MINOR_VERSION: usize = 0x18;
    pub const DLL_VERSION: usize = 0x1A;
    pub const BYTE_ORDER: usize = 0x1C;
    pub const SECTOR_SHIFT: usize = 0x1E;
    pub const MINI_SECTOR_SHIFT: usize = 0x20;
    pub const RESERVED1: usize = 0x22;
    pub const RESERVED2: usize = 0x24;
    pub const RESERVED3: usize = 0x28;
    pub const FAT_SECTOR_COUNT: usize = 0x2C;
    pub const DIR_START: usize = 0x30;
    pub const TRANSACTION_SIGNATURE: usize = 0x34;
    pub const MINI_CUTOFF: usize = 0x38;
    pub const MINIFAT_START: usize = 0x3C;
    pub const MINIFAT_COUNT: usize = 0x40;
    pub const DIF_START: usize = 0x44;
    pub const DIF_COUNT: usize = 0x48;
    pub const FAT_SLOTS: usize = 0x4C;
}

/// Directory entry field offsets
pub mod dirent {
    pub const NAME: usize = 0x00;
    pub const NAME_LEN: usize = 0x40;
    pub const TYPE: usize = 0x42;
    pub const COLOR: usize = 0x43;
    pub const LEFT: usize = 0x44;
    pub const RIGHT: usize = 0x48;
    pub const CHILD: usize = 0x4C;
    pub const CLSID: usize = 0x50;
    pub const USER_FLAGS: usize = 0x60;
    pub const CREATE_TIME: usize = 0x64;
    pub const MODIFY_TIME: usize = 0x6C;
    pub const START_SECTOR: usize = 0x74;
    pub const SIZE: usize = 0x78;
    pub const SIZE_HIGH: usize = 0x7C;
}

/// Decoded compound file header.
#[derive(Debug, Clone, PartialEq)]
pub struct CbffHeader {
    pub signature: [u8; 8],
    pub clsid: Uuid,
    pub minor_version: u16,
    pub dll_version: u16,
    pub byte_order: u16,
    pub sector_shift: u16,
    pub mini_sector_shift: u16,
    pub reserved1: u16,
    pub reserved2: u32,
    pub reserved3: u32,
    pub fat_sector_count: u32,
    pub dir_start: u32,
    pub transaction_signature: u32,
    pub mini_cutoff: u32,
    pub minifat_start: u32,
    pub minifat_sector_count: u32,
    pub dif_start: u32,
    pub dif_sector_count: u32,
    pub fat_slots: Vec<u32>,
    pub sector_size: u64,
    pub mini_sector_size: u64,
}

impl CbffHeader {
    /// File offset of sector `n`; the header occupies the first sector slot.
    pub fn sector_offset(&self, sector: u32) -> u64 {
        (sector as u64 + 1) * self.sector_size
    }

    /// FAT entries per FAT sector.
    pub fn entries_per_sector(&self) -> u64 {
        self.sector_size / 4
    }
}

/// Directory entry object type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    Invalid,
    Storage,
    Stream,
    LockBytes,
    Property,
    Root,
    Unknown(u8),
}

impl From<u8> for EntryType {
    fn from(val: u8) -> Self {
        match val {
            0 => EntryType::Invalid,
            1 => EntryType::Storage,
            2 => EntryType::Stream,
            3 => EntryType::LockBytes,
            4 => EntryType::Property,
            5 => EntryType::Root,
            other => EntryType::Unknown(other),
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryType::Invalid => write!(f, "Invalid"),
            EntryType::Storage => write!(f, "Storage"),
            EntryType::Stream => write!(f, "Stream"),
            EntryType::LockBytes => write!(f, "LockBytes"),
            EntryType::Property => write!(f, "Property"),
            EntryType::Root => write!(f, "Root"),
            EntryType::Unknown(v) => write!(f, "Unknown ({})", v),
        }
    }
}

/// Red-black tree color of a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryColor {
    Red,
    Black,
    Unknown(u8),
}

impl From<u8> for EntryColor {
    fn from(val: u8) -> Self {
        match val {
            0 => EntryColor::Red,
            1 => EntryColor::Black,
            other => EntryColor::Unknown(other),
        }
    }
}

impl fmt::Display for EntryColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryColor::Red => write!(f, "Red"),
            EntryColor::Black => write!(f, "Black"),
            EntryColor::Unknown(v) => write!(f, "Unknown ({})", v),
        }
    }
}

/// One 128-byte directory entry.
#[derive(Debug, Clone, PartialEq)]
pub struct DirEntry {
    pub index: u32,
    pub name: String,
    pub name_len: u16,
    pub entry_type: EntryType,
    pub color: EntryColor,
    pub left: u32,
    pub right: u32,
    pub child: u32,
    pub clsid: Uuid,
    pub user_flags: u32,
    pub create_time: u64,
    pub modify_time: u64,
    pub start_sector: u32,
    pub size: u32,
    pub size_high: u32,
    /// File offset of the entry itself
    pub file_offset: u64,
}

/// Render a sector id, naming the special values.
pub fn describe_sector(value: u32) -> String {
    match value {
        FREESECT => format!("0x{:08x} (Free)", value),
        ENDOFCHAIN => format!("0x{:08x} (EndOfChain)", value),
        FATSECT => format!("0x{:08x} (FAT)", value),
        DIFSECT => format!("0x{:08x} (DIF)", value),
        _ => format!("0x{:08x}", value),
    }
}

/// Convert a Windows FILETIME (100ns ticks since 1601-01-01) to UTC.
pub fn filetime_to_datetime(ticks: u64) -> Option<DateTime<Utc>> {
    const EPOCH_DIFF_SECS: i64 = 11_644_473_600;
    if ticks == 0 {
        return None;
    }
    let secs = (ticks / 10_000_000) as i64 - EPOCH_DIFF_SECS;
    let nanos = ((ticks % 10_000_000) * 100) as u32;
    DateTime::from_timestamp(secs, nanos)
}

/// FILETIME label value: the date when representable, raw ticks otherwise.
pub fn describe_filetime(ticks: u64) -> String {
    match filetime_to_datetime(ticks) {
        Some(dt) => format!("{} (0x{:016x})", dt.format("%Y-%m-%d %H:%M:%S UTC"), ticks),
        None => format!("0x{:016x}", ticks),
    }
}

/// Mixed-endian GUID as stored on disk.
pub fn guid_from_bytes(bytes: &[u8]) -> Uuid {
    let mut raw = [0u8; 16];
    let n = bytes.len().min(16);
    raw[..n].copy_from_slice(&bytes[..n]);
    Uuid::from_bytes_le(raw)
}
