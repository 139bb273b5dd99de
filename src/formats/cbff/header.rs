//! Header parsing and validation

use crate::diag::{DiagnosticKind, Diagnostics};
use crate::error::{DissectError, Result};
use crate::formats::cbff::types::*;
use crate::formats::utils::EndianRead;
use crate::tree::{NodeId, TreeSink};

/// Parse and validate the fixed header.
///
/// Only a bad signature or an unusable sector shift is fatal; odd values in
/// the remaining fields are reported and parsing continues.
pub fn parse_header(data: &[u8], diag: &mut Diagnostics) -> Result<CbffHeader> {
    if data.len() < HEADER_SIZE {
        return Err(DissectError::Validation(format!(
            "file too short for a compound file header ({} < {} bytes)",
            data.len(),
            HEADER_SIZE
        )));
    }

    let mut signature = [0u8; 8];
    signature.copy_from_slice(data.read_bytes(hdr::SIGNATURE, 8)?);
    if signature != SIGNATURE && signature != BETA_SIGNATURE {
        return Err(DissectError::Validation(format!(
            "invalid signature {}",
            hex::encode(signature)
        )));
    }

    let byte_order = data.read_u16_le(hdr::BYTE_ORDER)?;
    if byte_order != BYTE_ORDER_LE {
        diag.warn(
            DiagnosticKind::Validation,
            "cbff::header",
            format!("unexpected byte order marker 0x{:04x}", byte_order),
        );
    }

    let sector_shift = data.read_u16_le(hdr::SECTOR_SHIFT)?;
    let mini_sector_shift = data.read_u16_le(hdr::MINI_SECTOR_SHIFT)?;
    let sector_size = shift_to_size(sector_shift, "sector")?;
    let mini_sector_size = shift_to_size(mini_sector_shift, "mini sector")?;

    let mut fat_slots = Vec::with_capacity(HEADER_FAT_SLOTS);
    for i in 0..HEADER_FAT_SLOTS {
        fat_slots.push(data.read_u32_le(hdr::FAT_SLOTS + i * 4)?);
    }

    let header = CbffHeader {
        signature,
        clsid: guid_from_bytes(data.read_bytes(hdr::CLSID, 16)?),
        minor_version: data.read_u16_le(hdr::MINOR_VERSION)?,
        dll_version: data.read_u16_le(hdr::DLL_VERSION)?,
        byte_order,
        sector_shift,
        mini_sector_shift,
        reserved1: data.read_u16_le(hdr::RESERVED1)?,
        reserved2: data.read_u32_le(hdr::RESERVED2)?,
        reserved3: data.read_u32_le(hdr::RESERVED3)?,
        fat_sector_count: data.read_u32_le(hdr::FAT_SECTOR_COUNT)?,
        dir_start: data.read_u32_le(hdr::DIR_START)?,
        transaction_signature: data.read_u32_le(hdr::TRANSACTION_SIGNATURE)?,
        mini_cutoff: data.read_u32_le(hdr::MINI_CUTOFF)?,
        minifat_start: data.read_u32_le(hdr::MINIFAT_START)?,
        minifat_sector_count: data.read_u32_le(hdr::MINIFAT_COUNT)?,
        dif_start: data.read_u32_le(hdr::DIF_START)?,
        dif_sector_count: data.read_u32_le(hdr::DIF_COUNT)?,
        fat_slots,
        sector_size,
        mini_sector_size,
    };

    if header.dif_sector_count != 0 {
        diag.warn(
            DiagnosticKind::Unsupported,
            "cbff::header",
            format!(
                "{} DIF sectors declared; the double-indirect FAT is not supported",
                header.dif_sector_count
            ),
        );
    }

    Ok(header)
}

fn shift_to_size(shift: u16, what: &str) -> Result<u64> {
    1u64.checked_shl(shift as u32)
        .filter(|&size| size >= 1 && shift < 32)
        .ok_or_else(|| {
            DissectError::Validation(format!("{} shift {} gives an unusable size", what, shift))
        })
}

/// Add the `Header` node and one child per field.
pub fn add_header_nodes(tree: &mut dyn TreeSink, parent: NodeId, h: &CbffHeader) -> NodeId {
    let id = tree.append_range(parent, "Header", 0, HEADER_SIZE as u64);

    let sig_name = if h.signature == SIGNATURE {
        "valid"
    } else {
        "beta"
    };
    tree.append_range(
        id,
        &format!("Signature: {} ({})", hex::encode(h.signature), sig_name),
        hdr::SIGNATURE as u64,
        8,
    );
    tree.append_range(id, &format!("CLSID: {}", h.clsid), hdr::CLSID as u64, 16);
    tree.append_range(
        id,
        &format!("Minor Version: 0x{:04x}", h.minor_version),
        hdr::MINOR_VERSION as u64,
        2,
    );
    tree.append_range(
        id,
        &format!("DLL Version: 0x{:04x}", h.dll_version),
        hdr::DLL_VERSION as u64,
        2,
    );
    tree.append_range(
        id,
        &format!("Byte Order: 0x{:04x}", h.byte_order),
        hdr::BYTE_ORDER as u64,
        2,
    );
    tree.append_range(
        id,
        &format!("Sector Shift: {} ({} bytes)", h.sector_shift, h.sector_size),
        hdr::SECTOR_SHIFT as u64,
        2,
    );
    tree.append_range(
        id,
        &format!(
            "Mini Sector Shift: {} ({} bytes)",
            h.mini_sector_shift, h.mini_sector_size
        ),
        hdr::MINI_SECTOR_SHIFT as u64,
        2,
    );
    tree.append_range(
        id,
        &format!("Reserved: 0x{:04x}", h.reserved1),
        hdr::RESERVED1 as u64,
        2,
    );
    tree.append_range(
        id,
        &format!("Reserved: 0x{:08x}", h.reserved2),
        hdr::RESERVED2 as u64,
        4,
    );
    tree.append_range(
        id,
        &format!("Reserved: 0x{:08x}", h.reserved3),
        hdr::RESERVED3 as u64,
        4,
    );
    tree.append_range(
        id,
        &format!("FAT Sector Count: {}", h.fat_sector_count),
        hdr::FAT_SECTOR_COUNT as u64,
        4,
    );
    tree.append_range(
        id,
        &format!("Directory Start: {}", describe_sector(h.dir_start)),
        hdr::DIR_START as u64,
        4,
    );
    tree.append_range(
        id,
        &format!("Transaction Signature: 0x{:08x}", h.transaction_signature),
        hdr::TRANSACTION_SIGNATURE as u64,
        4,
    );
    tree.append_range(
        id,
        &format!("Mini Stream Cutoff: 0x{:08x}", h.mini_cutoff),
        hdr::MINI_CUTOFF as u64,
        4,
    );
    tree.append_range(
        id,
        &format!("MiniFAT Start: {}", describe_sector(h.minifat_start)),
        hdr::MINIFAT_START as u64,
        4,
    );
    tree.append_range(
        id,
        &format!("MiniFAT Sector Count: {}", h.minifat_sector_count),
        hdr::MINIFAT_COUNT as u64,
        4,
    );
    tree.append_range(
        id,
        &format!("DIF Start: {}", describe_sector(h.dif_start)),
        hdr::DIF_START as u64,
        4,
    );
    tree.append_range(
        id,
        &format!("DIF Sector Count: {}", h.dif_sector_count),
        hdr::DIF_COUNT as u64,
        4,
    );

    let slots = tree.append_range(
        id,
        "FAT Sectors",
        hdr::FAT_SLOTS as u64,
        (HEADER_FAT_SLOTS * 4) as u64,
    );
    for (i, &slot) in h.fat_slots.iter().enumerate() {
        if slot == FREESECT {
            continue;
        }
        tree.append_range(
            slots,
            &format!("[{}]: {}", i, describe_sector(slot)),
            (hdr::FAT_SLOTS + i * 4) as u64,
            4,
        );
    }

    id
}
