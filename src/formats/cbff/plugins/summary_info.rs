//! OLE property-set dissector for `SummaryInformation` streams.

use super::{compile_patterns, matches_any, NamePattern, StreamDissector};
use crate::diag::{DiagnosticKind, Diagnostics};
use crate::error::{DissectBudget, DissectError, Result};
use crate::formats::cbff::stream::CbffStream;
use crate::formats::cbff::types::{describe_filetime, guid_from_bytes};
use crate::formats::utils::EndianRead;
use crate::timeout::IterationTimeout;
use crate::tree::{NodeId, TreeSink};
use encoding_rs::Encoding;
use tracing::{debug, info_span};
use uuid::{uuid, Uuid};

const ORIGIN: &str = "cbff::summary_info";

pub const HEADER_SIZE: usize = 28;
pub const SECTION_DECL_SIZE: usize = 20;
pub const SECTION_HEADER_SIZE: usize = 8;
pub const PROPERTY_DECL_SIZE: usize = 8;
/// Type plus the first value word
pub const PROPERTY_SIZE: usize = 8;

pub const BYTE_ORDER: u16 = 0xFFFE;

pub const FMTID_SUMMARY_INFORMATION: Uuid = uuid!("f29f85e0-4ff9-1068-ab91-08002b27b3d9");
pub const FMTID_DOC_SUMMARY_INFORMATION: Uuid = uuid!("d5cdd502-2e9c-101b-9397-08002b2cf9ae");
pub const FMTID_USER_DEFINED_PROPERTIES: Uuid = uuid!("d5cdd505-2e9c-101b-9397-08002b2cf9ae");

pub const SUMMARY_STREAM: &str = "\u{5}SummaryInformation";
pub const DOC_SUMMARY_STREAM: &str = "\u{5}DocumentSummaryInformation";

pub mod vt {
    pub const SHORT: u32 = 0x02;
    pub const LONG: u32 = 0x03;
    pub const ULONG: u32 = 0x13;
    pub const STRING: u32 = 0x1E;
    pub const FILETIME: u32 = 0x40;
    pub const BLOB: u32 = 0x41;
    pub const CLIPBOARD: u32 = 0x47;
}

pub const PID_CODEPAGE: u32 = 0x0000_0001;
pub const PID_EDITTIME: u32 = 0x0000_000A;
pub const PID_LOCALE: u32 = 0x8000_0000;

static SUMMARY_PROPERTY_NAMES: &[(u32, &str)] = &[
    (0x01, "Code Page"),
    (0x02, "Title"),
    (0x03, "Subject"),
    (0x04, "Author"),
    (0x05, "Keywords"),
    (0x06, "Comments"),
    (0x07, "Template"),
    (0x08, "Last Saved By"),
    (0x09, "Revision Number"),
    (0x0A, "Total Editing Time"),
    (0x0B, "Last Printed"),
    (0x0C, "Create Time/Date"),
    (0x0D, "Last Saved Time/Date"),
    (0x0E, "Number of Pages"),
    (0x0F, "Number of Words"),
    (0x10, "Number of Characters"),
    (0x11, "Thumbnail"),
    (0x12, "Name of Creating Application"),
    (0x13, "Security"),
    (PID_LOCALE, "Locale Id"),
];

static DOC_SUMMARY_PROPERTY_NAMES: &[(u32, &str)] = &[
    (0x01, "Code Page"),
    (0x02, "Category"),
    (0x03, "Presentation Target"),
    (0x04, "Bytes"),
    (0x05, "Lines"),
    (0x06, "Paragraphs"),
    (0x07, "Slides"),
    (0x08, "Notes"),
    (0x09, "Hidden Slides"),
    (0x0A, "Multimedia Clips"),
    (0x0B, "Scale Crop"),
    (0x0C, "Heading Pairs"),
    (0x0D, "Titles of Parts"),
    (0x0E, "Manager"),
    (0x0F, "Company"),
    (0x10, "Links Up To Date"),
    (PID_LOCALE, "Locale Id"),
];

pub fn fmtid_name(fmtid: &Uuid) -> &'static str {
    if *fmtid == FMTID_SUMMARY_INFORMATION {
        "SummaryInformation"
    } else if *fmtid == FMTID_DOC_SUMMARY_INFORMATION {
        "DocumentSummaryInformation"
    } else if *fmtid == FMTID_USER_DEFINED_PROPERTIES {
        "UserDefinedProperties"
    } else {
        "Unknown"
    }
}

/// Property name within the section identified by `fmtid`.
pub fn property_name(fmtid: &Uuid, id: u32) -> &'static str {
    let table = if *fmtid == FMTID_DOC_SUMMARY_INFORMATION {
        DOC_SUMMARY_PROPERTY_NAMES
    } else {
        SUMMARY_PROPERTY_NAMES
    };
    table
        .iter()
        .find(|(pid, _)| *pid == id)
        .map_or("Unknown", |(_, name)| name)
}

pub fn type_name(ty: u32) -> &'static str {
    match ty {
        vt::SHORT => "Short",
        vt::LONG => "Long",
        vt::ULONG => "Unsigned Long",
        vt::STRING => "String",
        vt::FILETIME => "File Time",
        vt::BLOB => "BLOB",
        vt::CLIPBOARD => "Clipboard",
        _ => "Unknown",
    }
}

/// Map a Windows code page to an encoding. Unknown pages fall back to Windows-1252.
pub fn encoding_for_codepage(codepage: u16) -> &'static Encoding {
    match codepage {
        874 => encoding_rs::WINDOWS_874,
        932 => encoding_rs::SHIFT_JIS,
        936 => encoding_rs::GBK,
        949 => encoding_rs::EUC_KR,
        950 => encoding_rs::BIG5,
        1200 => encoding_rs::UTF_16LE,
        1201 => encoding_rs::UTF_16BE,
        1250 => encoding_rs::WINDOWS_1250,
        1251 => encoding_rs::WINDOWS_1251,
        1253 => encoding_rs::WINDOWS_1253,
        1254 => encoding_rs::WINDOWS_1254,
        1255 => encoding_rs::WINDOWS_1255,
        1256 => encoding_rs::WINDOWS_1256,
        1257 => encoding_rs::WINDOWS_1257,
        1258 => encoding_rs::WINDOWS_1258,
        10000 => encoding_rs::MACINTOSH,
        20866 => encoding_rs::KOI8_R,
        65001 => encoding_rs::UTF_8,
        _ => encoding_rs::WINDOWS_1252,
    }
}

/// Ticks of a FILETIME duration rendered as h:mm:ss.
fn describe_duration(ticks: u64) -> String {
    let secs = ticks / 10_000_000;
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// Dissector for `\x05SummaryInformation` and `\x05DocumentSummaryInformation`.
pub struct SummaryInfoDissector {
    budget: DissectBudget,
    patterns: Vec<NamePattern>,
}

/// Where a section lives and how its strings are encoded.
struct Section {
    index: usize,
    fmtid: Uuid,
    offset: usize,
    length: usize,
    encoding: &'static Encoding,
}

impl SummaryInfoDissector {
    pub fn new(budget: DissectBudget) -> Self {
        Self {
            budget,
            patterns: compile_patterns(&["*SummaryInformation"]),
        }
    }

    fn dissect_stream(
        &self,
        stream: &CbffStream,
        tree: &mut dyn TreeSink,
        diag: &mut Diagnostics,
    ) -> Result<()> {
        let _span = info_span!("property_set", stream = ?stream.name).entered();
        let data = stream.bytes();
        let field = |tree: &mut dyn TreeSink, parent: NodeId, label: String, at: usize, len: usize| {
            tree.append_child(parent, &label, stream.file_ranges(at as u64, len as u64))
        };

        if data.len() < HEADER_SIZE {
            diag.error(
                DiagnosticKind::Structural,
                ORIGIN,
                format!("Stream {:?} too short (no header)", stream.name),
            );
            return Ok(());
        }

        let byte_order = data.read_u16_le(0)?;
        let reserved = data.read_u16_le(2)?;
        let section_count = data.read_u32_le(24)?;
        let hdr = field(tree, stream.node, "Header".into(), 0, HEADER_SIZE);
        field(tree, hdr, format!("Byte Order: 0x{:04x}", byte_order), 0, 2);
        field(tree, hdr, format!("Reserved: 0x{:04x}", reserved), 2, 2);
        field(tree, hdr, format!("OS Version: 0x{:04x}", data.read_u16_le(4)?), 4, 2);
        field(tree, hdr, format!("Platform: 0x{:04x}", data.read_u16_le(6)?), 6, 2);
        let clsid = guid_from_bytes(data.read_bytes(8, 16)?);
        field(tree, hdr, format!("CLSID: {}", clsid), 8, 16);
        field(tree, hdr, format!("Section Count: 0x{:08x}", section_count), 24, 4);

        if byte_order != BYTE_ORDER {
            diag.error(
                DiagnosticKind::Validation,
                ORIGIN,
                format!("Unsupported byte order (0x{:04x}) in property set header", byte_order),
            );
            return Ok(());
        }
        if reserved != 0 {
            diag.error(
                DiagnosticKind::Validation,
                ORIGIN,
                "The reserved field is non-zero",
            );
            return Ok(());
        }

        let sections_node = tree.append_label(stream.node, "Sections");
        if section_count == 0 {
            diag.warn(DiagnosticKind::Structural, ORIGIN, "Section count was zero");
            return Ok(());
        }
        let decl_end = (section_count as u64)
            .checked_mul(SECTION_DECL_SIZE as u64)
            .and_then(|n| n.checked_add(HEADER_SIZE as u64));
        if decl_end.map_or(true, |end| end > data.len() as u64) {
            diag.error(
                DiagnosticKind::Resource,
                ORIGIN,
                format!(
                    "Not enough data for {} section declarations ({} bytes in stream)",
                    section_count,
                    data.len()
                ),
            );
            return Ok(());
        }

        let mut timer = IterationTimeout::new(self.budget.max_time_seconds, "property set")
            .with_check_interval(self.budget.check_interval)
            .with_max_iterations(self.budget.max_items);

        for i in 0..section_count as usize {
            timer.check()?;
            let decl = HEADER_SIZE + i * SECTION_DECL_SIZE;
            let fmtid = guid_from_bytes(data.read_bytes(decl, 16)?);
            let offset = data.read_u32_le(decl + 16)?;

            let sec_node = tree.append_label(sections_node, &format!("Section {}", i));
            let decl_node = field(tree, sec_node, "Header".into(), decl, SECTION_DECL_SIZE);
            field(
                tree,
                decl_node,
                format!("FMTID: {} ({})", fmtid, fmtid_name(&fmtid)),
                decl,
                16,
            );
            field(tree, decl_node, format!("Offset: 0x{:08x}", offset), decl + 16, 4);
            check_fmtid(&stream.name, i, &fmtid, diag);

            let offset = offset as usize;
            if offset > data.len() || data.len() - offset < SECTION_HEADER_SIZE {
                diag.error(
                    DiagnosticKind::Structural,
                    ORIGIN,
                    format!("Section {} offset (0x{:08x}) outside of stream", i, offset),
                );
                continue;
            }

            let length = data.read_u32_le(offset)? as usize;
            let count = data.read_u32_le(offset + 4)?;
            let sh = field(tree, sec_node, "Section Header".into(), offset, SECTION_HEADER_SIZE);
            field(tree, sh, format!("Length: 0x{:08x}", length), offset, 4);
            field(tree, sh, format!("Property Count: 0x{:08x}", count), offset + 4, 4);
            let props_node = tree.append_label(sec_node, "Properties");

            if count == 0 {
                diag.warn(
                    DiagnosticKind::Structural,
                    ORIGIN,
                    format!("Section {} property count was zero", i),
                );
                continue;
            }
            let decls_end = (count as u64)
                .checked_mul(PROPERTY_DECL_SIZE as u64)
                .and_then(|n| n.checked_add((offset + SECTION_HEADER_SIZE) as u64));
            if decls_end.map_or(true, |end| end > data.len() as u64) {
                diag.error(
                    DiagnosticKind::Resource,
                    ORIGIN,
                    format!("Not enough data for property declarations in section {}", i),
                );
                continue;
            }

            let mut section = Section {
                index: i,
                fmtid,
                offset,
                length,
                encoding: encoding_rs::WINDOWS_1252,
            };
            if let Some(cp) = find_codepage(data, &section, count as usize) {
                section.encoding = encoding_for_codepage(cp);
                debug!(section = i, codepage = cp, encoding = section.encoding.name(), "section code page");
            }

            for j in 0..count as usize {
                timer.check()?;
                self.dissect_property(stream, &section, j, props_node, tree, diag)?;
            }
        }
        Ok(())
    }

    fn dissect_property(
        &self,
        stream: &CbffStream,
        section: &Section,
        j: usize,
        props_node: NodeId,
        tree: &mut dyn TreeSink,
        diag: &mut Diagnostics,
    ) -> Result<()> {
        let data = stream.bytes();
        let field = |tree: &mut dyn TreeSink, parent: NodeId, label: String, at: usize, len: usize| {
            tree.append_child(parent, &label, stream.file_ranges(at as u64, len as u64))
        };
        let i = section.index;

        let decl = section.offset + SECTION_HEADER_SIZE + j * PROPERTY_DECL_SIZE;
        let id = data.read_u32_le(decl)?;
        let rel = data.read_u32_le(decl + 4)? as usize;

        let prop_node = tree.append_label(props_node, &format!("Property {}", j));
        let d = field(tree, prop_node, "Declaration".into(), decl, PROPERTY_DECL_SIZE);
        field(
            tree,
            d,
            format!("Id: 0x{:08x} ({})", id, property_name(&section.fmtid, id)),
            decl,
            4,
        );
        field(tree, d, format!("Offset: 0x{:08x}", rel), decl + 4, 4);

        if rel > section.length {
            diag.warn(
                DiagnosticKind::Structural,
                ORIGIN,
                format!(
                    "Section {} property {} offset (0x{:x}) out of bounds",
                    i, j, rel
                ),
            );
            return Ok(());
        }
        // Properties must fit in both the declared section and the stream
        let section_end = (section.offset + section.length).min(data.len());
        let at = section.offset + rel;
        if at > section_end || section_end - at < PROPERTY_SIZE {
            diag.warn(
                DiagnosticKind::Structural,
                ORIGIN,
                format!(
                    "Not enough data for information property in section {} property {}",
                    i, j
                ),
            );
            return Ok(());
        }

        let ty = data.read_u32_le(at)?;
        let p = field(tree, prop_node, "Property".into(), at, PROPERTY_SIZE);
        field(tree, p, format!("Type: 0x{:08x} ({})", ty, type_name(ty)), at, 4);

        let value_at = at + 4;
        let clamp = |want: usize, diag: &mut Diagnostics| -> usize {
            let avail = section_end.saturating_sub(value_at);
            if want > avail {
                diag.warn(
                    DiagnosticKind::Structural,
                    ORIGIN,
                    format!(
                        "Section {} property {} value (0x{:x} bytes) overruns the section, clamped to 0x{:x}",
                        i, j, want, avail
                    ),
                );
                avail
            } else {
                want
            }
        };

        match ty {
            vt::SHORT => {
                let v = data.read_u16_le(value_at)?;
                field(tree, p, format!("Value: 0x{:04x}", v), value_at, 2);
            }
            vt::LONG | vt::ULONG => {
                let v = data.read_u32_le(value_at)?;
                field(tree, p, format!("Value: 0x{:08x}", v), value_at, 4);
            }
            vt::STRING => {
                let len = data.read_u32_le(value_at)? as usize;
                field(tree, p, format!("Length: 0x{:08x}", len), value_at, 4);
                let start = value_at + 4;
                let len = clamp(len.saturating_add(4), diag).saturating_sub(4);
                if len > 0 {
                    let (text, _) = section
                        .encoding
                        .decode_without_bom_handling(&data[start..start + len]);
                    let text = text.trim_end_matches('\0');
                    field(tree, p, format!("Value: {}", text), start, len);
                }
            }
            vt::FILETIME => {
                if clamp(8, diag) < 8 {
                    return Ok(());
                }
                let ticks = data.read_u64_le(value_at)?;
                let label = if id == PID_EDITTIME {
                    format!("Value: {}", describe_duration(ticks))
                } else {
                    format!("Value: {}", describe_filetime(ticks))
                };
                field(tree, p, label, value_at, 8);
            }
            vt::BLOB => {
                let len = data.read_u32_le(value_at)? as usize;
                field(tree, p, format!("Length: 0x{:08x}", len), value_at, 4);
                let len = clamp(len.saturating_add(4), diag).saturating_sub(4);
                if len > 0 {
                    field(tree, p, "Value decoding not supported.".into(), value_at + 4, len);
                }
            }
            vt::CLIPBOARD => {
                let len = data.read_u32_le(value_at)? as usize;
                field(tree, p, format!("Length: 0x{:08x}", len), value_at, 4);
                let len = clamp(len.saturating_add(4), diag).saturating_sub(4);
                if len == 0 {
                    return Ok(());
                }
                if len < 4 {
                    diag.warn(
                        DiagnosticKind::Structural,
                        ORIGIN,
                        format!(
                            "Not enough data for Clipboard Data in section {} property {}",
                            i, j
                        ),
                    );
                    return Ok(());
                }
                let format = data.read_u32_le(value_at + 4)?;
                field(tree, p, format!("Format: 0x{:08x}", format), value_at + 4, 4);
                if len > 4 {
                    field(tree, p, "Value decoding not supported.".into(), value_at + 8, len - 4);
                }
            }
            _ => {
                tree.append_label(p, "Unsupported type!");
            }
        }
        Ok(())
    }
}

/// Code page declared by property 1 of a section, when present and well formed.
fn find_codepage(data: &[u8], section: &Section, count: usize) -> Option<u16> {
    (0..count).find_map(|j| {
        let decl = section.offset + SECTION_HEADER_SIZE + j * PROPERTY_DECL_SIZE;
        if data.read_u32_le(decl).ok()? != PID_CODEPAGE {
            return None;
        }
        let rel = data.read_u32_le(decl + 4).ok()? as usize;
        let at = section.offset.checked_add(rel)?;
        if data.read_u32_le(at).ok()? != vt::SHORT {
            return None;
        }
        data.read_u16_le(at + 4).ok()
    })
}

fn check_fmtid(stream_name: &str, index: usize, fmtid: &Uuid, diag: &mut Diagnostics) {
    let expected = match (stream_name, index) {
        (SUMMARY_STREAM, _) => Some(FMTID_SUMMARY_INFORMATION),
        (DOC_SUMMARY_STREAM, 0) => Some(FMTID_DOC_SUMMARY_INFORMATION),
        (DOC_SUMMARY_STREAM, 1) => Some(FMTID_USER_DEFINED_PROPERTIES),
        _ => None,
    };
    if let Some(expected) = expected {
        if *fmtid != expected {
            diag.warn(
                DiagnosticKind::Validation,
                ORIGIN,
                format!(
                    "Section {} FMTID is not FMTID_{}",
                    index,
                    fmtid_name(&expected)
                ),
            );
        }
    }
}

impl StreamDissector for SummaryInfoDissector {
    fn name(&self) -> &'static str {
        "summary_info"
    }

    fn mark_desired(&mut self, streams: &mut [CbffStream]) {
        for s in streams.iter_mut() {
            if matches_any(&self.patterns, &s.name) {
                s.wanted = true;
            }
        }
    }

    fn dissect(
        &mut self,
        streams: &[CbffStream],
        tree: &mut dyn TreeSink,
        diag: &mut Diagnostics,
    ) -> Result<()> {
        for stream in streams {
            if !matches_any(&self.patterns, &stream.name) || !stream.is_loaded() {
                continue;
            }
            match self.dissect_stream(stream, tree, diag) {
                Ok(()) => {}
                Err(e @ DissectError::Timeout { .. }) => {
                    diag.record(ORIGIN, &e);
                    break;
                }
                Err(e) => {
                    debug!(stream = %stream.name, error = %e, "property set stream abandoned");
                    diag.record(ORIGIN, &e);
                }
            }
        }
        Ok(())
    }
}
