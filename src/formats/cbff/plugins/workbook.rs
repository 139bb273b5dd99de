//! BIFF record dissector for `Workbook` / `Book` streams.
//!
//! Records are `{type: u16, length: u16}` headers followed by the payload.
//! BOF records open a container that collects every following record until
//! the matching EOF, so sheet substreams nest under their BOF record.

use super::workbook_names::{bof_type_name, long_name, short_name};
use super::{compile_patterns, matches_any, NamePattern, StreamDissector};
use crate::diag::{DiagnosticKind, Diagnostics};
use crate::error::{DissectBudget, DissectError, Result};
use crate::formats::cbff::stream::CbffStream;
use crate::formats::utils::EndianRead;
use crate::io::SourceCursor;
use crate::timeout::IterationTimeout;
use crate::tree::{NodeId, TreeSink};
use bitflags::bitflags;
use encoding_rs::{UTF_16LE, WINDOWS_1252};
use tracing::{debug, info_span};

const ORIGIN: &str = "cbff::workbook";

pub const RECORD_HEADER_SIZE: usize = 4;

pub mod rt {
    pub const BOF2: u16 = 0x0009;
    pub const BOF3: u16 = 0x0209;
    pub const BOF4: u16 = 0x0409;
    pub const BOF: u16 = 0x0809;
    pub const EOF: u16 = 0x000A;
    pub const HEADER: u16 = 0x0014;
    pub const FOOTER: u16 = 0x0015;
    pub const UFONT: u16 = 0x0031;
    pub const CODEPAGE: u16 = 0x0042;
    pub const WRITEACCESS: u16 = 0x005C;
    pub const RK: u16 = 0x007E;
    pub const BOUNDSHEET: u16 = 0x0085;
    pub const MULRK: u16 = 0x00BD;
    pub const MULBLANK: u16 = 0x00BE;
    pub const MMS: u16 = 0x00C1;
    pub const INTERFACEHDR: u16 = 0x00E1;
    pub const SST: u16 = 0x00FC;
    pub const LABELSST: u16 = 0x00FD;
    pub const EXTSST: u16 = 0x00FF;
    pub const FONT: u16 = 0x0231;
    pub const RK3: u16 = 0x027E;
    pub const FORMAT: u16 = 0x041E;
}

bitflags! {
    /// FONT record `grbit` attributes
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FontAttributes: u16 {
        const ITALIC = 0x0002;
        const STRIKEOUT = 0x0008;
        const OUTLINE = 0x0010;
        const SHADOW = 0x0020;
    }
}

impl FontAttributes {
    fn describe(self) -> String {
        let names: Vec<&str> = self.iter_names().map(|(name, _)| name).collect();
        if names.is_empty() {
            "none".to_string()
        } else {
            names.join(" | ")
        }
    }
}

/// Decode an RK number.
///
/// Bit 0 divides by 100; bit 1 selects a 30-bit signed integer, otherwise
/// the remaining bits are the top 30 bits of an IEEE double.
pub fn rk_decode(enc: u32) -> f64 {
    let value = if enc & 0x2 != 0 {
        ((enc as i32) >> 2) as f64
    } else {
        f64::from_bits(((enc & 0xFFFF_FFFC) as u64) << 32)
    };
    if enc & 0x1 != 0 {
        value / 100.0
    } else {
        value
    }
}

pub fn rk_type_name(enc: u32) -> &'static str {
    match enc & 0x3 {
        0 => "IEEE Number",
        1 => "IEEE Number x 100",
        2 => "Integer",
        _ => "Integer x 100",
    }
}

/// Byte length of a `cch`-character string with option flags `grbit`.
pub fn string_byte_len(cch: usize, grbit: u8) -> usize {
    if grbit & 0x1 != 0 {
        cch * 2
    } else {
        cch
    }
}

/// Decode string bytes: UTF-16LE when bit 0 of `grbit` is set, else Windows-1252.
pub fn decode_string(bytes: &[u8], grbit: u8) -> String {
    if grbit & 0x1 != 0 {
        let even = bytes.len() & !1;
        UTF_16LE
            .decode_without_bom_handling(&bytes[..even])
            .0
            .into_owned()
    } else {
        WINDOWS_1252.decode_without_bom_handling(bytes).0.into_owned()
    }
}

/// One record being decoded: where its body sits and where its fields go.
struct Record<'s> {
    stream: &'s CbffStream,
    rtype: u16,
    body: &'s [u8],
    /// Stream offset of the first body byte
    body_offset: u64,
    node: NodeId,
}

impl<'s> Record<'s> {
    fn field(&self, tree: &mut dyn TreeSink, label: String, at: usize, len: usize) -> NodeId {
        self.field_under(tree, self.node, label, at, len)
    }

    fn field_under(
        &self,
        tree: &mut dyn TreeSink,
        parent: NodeId,
        label: String,
        at: usize,
        len: usize,
    ) -> NodeId {
        let ranges = self
            .stream
            .file_ranges(self.body_offset + at as u64, len as u64);
        tree.append_child(parent, &label, ranges)
    }

    fn too_short(&self, what: &str) -> DissectError {
        DissectError::structural(
            self.body_offset,
            format!(
                "Not enough data for {} record (0x{:04x})",
                what,
                self.body.len()
            ),
        )
    }

    fn require(&self, min: usize, what: &str) -> Result<()> {
        if self.body.len() < min {
            Err(self.too_short(what))
        } else {
            Ok(())
        }
    }

    /// Decode a string at `at`, clamping it to the record.
    fn string(&self, diag: &mut Diagnostics, at: usize, cch: usize, grbit: u8) -> (String, usize) {
        let available = self.body.len().saturating_sub(at);
        let mut len = string_byte_len(cch, grbit);
        if len > available {
            diag.error(
                DiagnosticKind::Structural,
                ORIGIN,
                format!(
                    "String length (0x{:04x}) is longer than the record (0x{:04x})",
                    len,
                    self.body.len()
                ),
            );
            len = available;
        }
        let bytes = self.body.get(at..at + len).unwrap_or(&[]);
        (decode_string(bytes, grbit), len)
    }
}

/// Dissector for BIFF workbook streams.
pub struct WorkbookDissector {
    budget: DissectBudget,
    patterns: Vec<NamePattern>,
    records_seen: usize,
}

impl WorkbookDissector {
    pub fn new(budget: DissectBudget) -> Self {
        Self {
            budget,
            patterns: compile_patterns(&["Workbook", "Book"]),
            records_seen: 0,
        }
    }

    /// Records decoded since the last `close_file`.
    pub fn records_seen(&self) -> usize {
        self.records_seen
    }

    fn dissect_stream(
        &mut self,
        stream: &CbffStream,
        tree: &mut dyn TreeSink,
        diag: &mut Diagnostics,
    ) -> Result<()> {
        let _span = info_span!("workbook_stream", stream = %stream.name).entered();
        let data = stream.bytes();
        let mut timer = IterationTimeout::new(self.budget.max_time_seconds, "workbook records")
            .with_check_interval(self.budget.check_interval)
            .with_max_iterations(self.budget.max_items);

        let mut containers: Vec<NodeId> = Vec::new();
        let mut cursor = SourceCursor::new(data);

        while cursor.remaining() > 0 {
            timer.check()?;

            let pos = cursor.position() as usize;
            let Ok(header) = cursor.read(RECORD_HEADER_SIZE) else {
                diag.error(
                    DiagnosticKind::Structural,
                    ORIGIN,
                    format!("Not enough data left for record header at 0x{:x}", pos),
                );
                break;
            };
            let rtype = header.read_u16_le(0)?;
            let len = header.read_u16_le(2)? as usize;
            let body_start = pos + RECORD_HEADER_SIZE;
            let Ok(body) = cursor.read(len) else {
                diag.error(
                    DiagnosticKind::Structural,
                    ORIGIN,
                    format!(
                        "Not enough data left for record number 0x{:04x}, length 0x{:04x}",
                        rtype, len
                    ),
                );
                break;
            };

            let parent = containers.last().copied().unwrap_or(stream.node);
            let label = format!(
                "Record 0x{:04x} (length 0x{:04x}): {}: {}",
                rtype,
                len,
                short_name(rtype),
                long_name(rtype)
            );
            let node = tree.append_child(
                parent,
                &label,
                stream.file_ranges(pos as u64, (RECORD_HEADER_SIZE + len) as u64),
            );
            let rec = Record {
                stream,
                rtype,
                body,
                body_offset: body_start as u64,
                node,
            };
            self.records_seen += 1;

            match rtype {
                rt::BOF2 | rt::BOF3 | rt::BOF4 | rt::BOF => {
                    if let Err(e) = add_bof(&rec, tree) {
                        diag.record(ORIGIN, &e);
                    }
                    containers.push(tree.append_label(node, "Children"));
                }
                rt::EOF => {
                    if containers.pop().is_none() {
                        diag.warn(
                            DiagnosticKind::Structural,
                            ORIGIN,
                            format!("Stray EOF record encountered at 0x{:x}", pos),
                        );
                    }
                    if len != 0 {
                        diag.warn(
                            DiagnosticKind::Structural,
                            ORIGIN,
                            format!("EOF erroneously has data (0x{:04x} bytes)", len),
                        );
                    }
                }
                _ => {
                    if let Err(e) = dispatch(&rec, tree, data, diag) {
                        diag.record(ORIGIN, &e);
                    }
                }
            }
        }

        if !containers.is_empty() {
            debug!(open = containers.len(), "stream ended inside BOF substreams");
        }
        Ok(())
    }
}

impl StreamDissector for WorkbookDissector {
    fn name(&self) -> &'static str {
        "workbook"
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
                // a stream that ran out the clock ends the pass; other
                // failures only cost that stream
                Err(e @ DissectError::Timeout { .. }) => {
                    diag.record(ORIGIN, &e);
                    break;
                }
                Err(e) => {
                    debug!(stream = %stream.name, error = %e, "workbook stream abandoned");
                    diag.record(ORIGIN, &e);
                }
            }
        }
        Ok(())
    }

    fn close_file(&mut self) {
        self.records_seen = 0;
    }
}

fn dispatch(
    rec: &Record<'_>,
    tree: &mut dyn TreeSink,
    stream_data: &[u8],
    diag: &mut Diagnostics,
) -> Result<()> {
    match rec.rtype {
        rt::FORMAT => add_format(rec, tree, diag),
        rt::HEADER | rt::FOOTER => add_header_footer(rec, tree, diag),
        rt::INTERFACEHDR | rt::CODEPAGE => add_codepage(rec, tree, diag),
        rt::MMS => add_mms(rec, tree),
        rt::WRITEACCESS => add_write_access(rec, tree),
        rt::BOUNDSHEET => add_boundsheet(rec, tree, stream_data, diag),
        rt::FONT | rt::UFONT => add_font(rec, tree, diag),
        rt::LABELSST => add_labelsst(rec, tree),
        rt::SST => add_sst(rec, tree, diag),
        rt::EXTSST => add_extsst(rec, tree, diag),
        rt::MULBLANK => add_mulblank(rec, tree, diag),
        rt::MULRK => add_mulrk(rec, tree, diag),
        rt::RK | rt::RK3 => add_rk(rec, tree),
        _ => Ok(()),
    }
}

fn add_bof(rec: &Record<'_>, tree: &mut dyn TreeSink) -> Result<()> {
    rec.require(8, "a BOF")?;
    let b = rec.body;
    let dt = b.read_u16_le(2)?;
    rec.field(tree, format!("Version: 0x{:04x}", b.read_u16_le(0)?), 0, 2);
    rec.field(tree, format!("Type: 0x{:04x} ({})", dt, bof_type_name(dt)), 2, 2);
    rec.field(tree, format!("Build: 0x{:04x}", b.read_u16_le(4)?), 4, 2);
    rec.field(tree, format!("Build year: 0x{:04x}", b.read_u16_le(6)?), 6, 2);
    // BIFF8 adds history flags and the lowest version
    if b.len() >= 16 {
        rec.field(tree, format!("File history flags: 0x{:08x}", b.read_u32_le(8)?), 8, 4);
        rec.field(tree, format!("Lowest version: 0x{:08x}", b.read_u32_le(12)?), 12, 4);
    }
    Ok(())
}

fn add_format(rec: &Record<'_>, tree: &mut dyn TreeSink, diag: &mut Diagnostics) -> Result<()> {
    rec.require(5, "a FORMAT")?;
    let b = rec.body;
    let cch = b.read_u16_le(2)?;
    let grbit = b.read_u8(4)?;
    rec.field(tree, format!("Format index code: 0x{:04x}", b.read_u16_le(0)?), 0, 2);
    rec.field(tree, format!("Length of string: 0x{:04x}", cch), 2, 2);
    rec.field(tree, format!("Option Flags: 0x{:02x}", grbit), 4, 1);
    let (value, len) = rec.string(diag, 5, cch as usize, grbit);
    rec.field(tree, format!("Value: {}", value), 5, len);
    Ok(())
}

fn add_header_footer(rec: &Record<'_>, tree: &mut dyn TreeSink, diag: &mut Diagnostics) -> Result<()> {
    // An empty record means no header/footer text
    if rec.body.is_empty() {
        return Ok(());
    }
    rec.require(3, "a HEADER/FOOTER")?;
    let cch = rec.body.read_u16_le(0)?;
    let grbit = rec.body.read_u8(2)?;
    rec.field(tree, format!("String length: 0x{:04x}", cch), 0, 2);
    rec.field(tree, format!("String options: 0x{:02x}", grbit), 2, 1);
    let (value, len) = rec.string(diag, 3, cch as usize, grbit);
    rec.field(tree, format!("Value: {}", value), 3, len);
    Ok(())
}

fn add_codepage(rec: &Record<'_>, tree: &mut dyn TreeSink, diag: &mut Diagnostics) -> Result<()> {
    if rec.body.is_empty() {
        return Ok(());
    }
    rec.require(2, "an INTERFACEHDR")?;
    if rec.body.len() > 2 {
        diag.warn(
            DiagnosticKind::Structural,
            ORIGIN,
            format!(
                "Extra data bytes (0x{:04x}) for INTERFACEHDR record",
                rec.body.len()
            ),
        );
    }
    rec.field(tree, format!("Codepage: 0x{:04x}", rec.body.read_u16_le(0)?), 0, 2);
    Ok(())
}

fn add_mms(rec: &Record<'_>, tree: &mut dyn TreeSink) -> Result<()> {
    if rec.body.len() != 2 {
        return Err(DissectError::structural(
            rec.body_offset,
            format!(
                "Incorrect amount of data for MMS: ADDMENU/DELMENU record (0x{:04x})",
                rec.body.len()
            ),
        ));
    }
    rec.field(tree, format!("ADDMENU Count: 0x{:02x}", rec.body[0]), 0, 1);
    rec.field(tree, format!("DELMENU Count: 0x{:02x}", rec.body[1]), 1, 1);
    Ok(())
}

const WRITEACCESS_SIZE: usize = 112;

fn add_write_access(rec: &Record<'_>, tree: &mut dyn TreeSink) -> Result<()> {
    if rec.body.len() != WRITEACCESS_SIZE {
        return Err(DissectError::structural(
            rec.body_offset,
            format!(
                "Incorrect amount of data for WRITEACCESS record (0x{:04x})",
                rec.body.len()
            ),
        ));
    }
    let cch = rec.body.read_u16_le(0)?;
    let grbit = rec.body.read_u8(2)?;
    rec.field(tree, format!("String length: 0x{:04x}", cch), 0, 2);
    rec.field(tree, format!("String options: 0x{:02x}", grbit), 2, 1);
    // Fixed-size, space-padded name; cch is not used
    let name = decode_string(&rec.body[3..], grbit);
    let name = name.trim_end_matches([' ', '\0']);
    rec.field(tree, format!("User name: {}", name), 3, WRITEACCESS_SIZE - 3);
    Ok(())
}

fn add_boundsheet(
    rec: &Record<'_>,
    tree: &mut dyn TreeSink,
    stream_data: &[u8],
    diag: &mut Diagnostics,
) -> Result<()> {
    rec.require(8, "a BOUNDSHEET")?;
    let b = rec.body;
    let pos = b.read_u32_le(0)?;
    let cch = b.read_u8(6)?;
    let grbit = b.read_u8(7)?;
    rec.field(tree, format!("BOF Stream Position: 0x{:08x}", pos), 0, 4);
    rec.field(tree, format!("Options flags: 0x{:04x}", b.read_u16_le(4)?), 4, 2);
    rec.field(tree, format!("Length of string: 0x{:02x}", cch), 6, 1);
    rec.field(tree, format!("String options: 0x{:02x}", grbit), 7, 1);
    let (value, len) = rec.string(diag, 8, cch as usize, grbit);
    rec.field(tree, format!("Value: {}", value), 8, len);

    match stream_data.read_u16_le(pos as usize) {
        Err(_) => diag.warn(
            DiagnosticKind::Structural,
            ORIGIN,
            format!("lbPlyPos (0x{:08x}) points outside of stream", pos),
        ),
        Ok(target) if target != rt::BOF => diag.warn(
            DiagnosticKind::Structural,
            ORIGIN,
            format!("lbPlyPos (0x{:08x}) does not point at a BOF record", pos),
        ),
        Ok(_) => {}
    }
    Ok(())
}

fn add_font(rec: &Record<'_>, tree: &mut dyn TreeSink, diag: &mut Diagnostics) -> Result<()> {
    rec.require(16, "a FONT")?;
    let b = rec.body;
    let attrs = b.read_u16_le(2)?;
    let cch = b.read_u8(14)?;
    let grbit = b.read_u8(15)?;
    rec.field(tree, format!("Font height: 0x{:04x}", b.read_u16_le(0)?), 0, 2);
    rec.field(
        tree,
        format!(
            "Font attributes: 0x{:04x} ({})",
            attrs,
            FontAttributes::from_bits_truncate(attrs).describe()
        ),
        2,
        2,
    );
    rec.field(tree, format!("Color palette index: 0x{:04x}", b.read_u16_le(4)?), 4, 2);
    rec.field(tree, format!("Bold style: 0x{:04x}", b.read_u16_le(6)?), 6, 2);
    rec.field(tree, format!("Sub/Superscript: 0x{:04x}", b.read_u16_le(8)?), 8, 2);
    rec.field(tree, format!("Underline style: 0x{:02x}", b.read_u8(10)?), 10, 1);
    rec.field(tree, format!("Font family: 0x{:02x}", b.read_u8(11)?), 11, 1);
    rec.field(tree, format!("Character set: 0x{:02x}", b.read_u8(12)?), 12, 1);
    rec.field(tree, format!("Reserved: 0x{:02x}", b.read_u8(13)?), 13, 1);
    rec.field(tree, format!("Name length: 0x{:02x}", cch), 14, 1);
    rec.field(tree, format!("String options: 0x{:02x}", grbit), 15, 1);
    let (value, len) = rec.string(diag, 16, cch as usize, grbit);
    rec.field(tree, format!("Value: {}", value), 16, len);
    Ok(())
}

fn add_labelsst(rec: &Record<'_>, tree: &mut dyn TreeSink) -> Result<()> {
    rec.require(10, "a LABELSST")?;
    let b = rec.body;
    rec.field(tree, format!("Row: 0x{:04x}", b.read_u16_le(0)?), 0, 2);
    rec.field(tree, format!("Column: 0x{:04x}", b.read_u16_le(2)?), 2, 2);
    rec.field(tree, format!("XF Index: 0x{:04x}", b.read_u16_le(4)?), 4, 2);
    rec.field(tree, format!("SST Index: 0x{:08x}", b.read_u32_le(6)?), 6, 4);
    Ok(())
}

fn add_sst(rec: &Record<'_>, tree: &mut dyn TreeSink, diag: &mut Diagnostics) -> Result<()> {
    rec.require(8, "an SST")?;
    let b = rec.body;
    let unique = b.read_u32_le(4)?;
    rec.field(tree, format!("Total strings: 0x{:08x}", b.read_u32_le(0)?), 0, 4);
    rec.field(tree, format!("Unique count: 0x{:08x}", unique), 4, 4);

    let mut at = 8usize;
    for n in 0..unique {
        if b.len() - at < 3 {
            diag.warn(
                DiagnosticKind::Structural,
                ORIGIN,
                format!("End of data looking for string header ({} of {})", n, unique),
            );
            return Ok(());
        }
        let cch = b.read_u16_le(at)?;
        let grbit = b.read_u8(at + 2)?;
        let node = rec.field(tree, format!("String {}", n), at, 3);
        rec.field_under(tree, node, format!("String length: 0x{:04x}", cch), at, 2);
        rec.field_under(tree, node, format!("String options: 0x{:02x}", grbit), at + 2, 1);
        at += 3;

        let mut len = string_byte_len(cch as usize, grbit);
        let left = b.len() - at;
        if len > left {
            diag.error(
                DiagnosticKind::Structural,
                ORIGIN,
                format!(
                    "String length (0x{:04x}) is longer than the remaining data (0x{:04x})",
                    len, left
                ),
            );
            len = left;
        }
        if len > 0 {
            let value = decode_string(&b[at..at + len], grbit);
            rec.field_under(tree, node, format!("Value: {}", value), at, len);
            at += len;
        }
    }

    if at < b.len() {
        diag.warn(
            DiagnosticKind::Structural,
            ORIGIN,
            format!("Extra data remains (0x{:04x} bytes)", b.len() - at),
        );
    }
    Ok(())
}

const ISSTINF_SIZE: usize = 8;

fn add_extsst(rec: &Record<'_>, tree: &mut dyn TreeSink, diag: &mut Diagnostics) -> Result<()> {
    rec.require(2, "an EXTSST")?;
    let b = rec.body;
    rec.field(tree, format!("Strings per bucket: 0x{:04x}", b.read_u16_le(0)?), 0, 2);
    let rest = b.len() - 2;
    if rest % ISSTINF_SIZE != 0 {
        diag.warn(
            DiagnosticKind::Structural,
            ORIGIN,
            format!(
                "Remaining length (0x{:04x}) should be a multiple of {}",
                rest, ISSTINF_SIZE
            ),
        );
    }
    for i in 0..rest / ISSTINF_SIZE {
        let at = 2 + i * ISSTINF_SIZE;
        let node = rec.field(tree, format!("ISSTINF {}", i + 1), at, ISSTINF_SIZE);
        rec.field_under(tree, node, format!("Stream position: 0x{:08x}", b.read_u32_le(at)?), at, 4);
        rec.field_under(
            tree,
            node,
            format!("Bucket SST offset: 0x{:04x}", b.read_u16_le(at + 4)?),
            at + 4,
            2,
        );
        rec.field_under(
            tree,
            node,
            format!("Reserved (must be zero): 0x{:04x}", b.read_u16_le(at + 6)?),
            at + 6,
            2,
        );
    }
    Ok(())
}

/// Shared row/first/last column layout of MULBLANK and MULRK.
fn multi_cell_header(rec: &Record<'_>, tree: &mut dyn TreeSink, what: &str) -> Result<(u16, u16)> {
    rec.require(6, what)?;
    let b = rec.body;
    let first = b.read_u16_le(2)?;
    let last_at = b.len() - 2;
    let last = b.read_u16_le(last_at)?;
    rec.field(tree, format!("Row number: 0x{:04x}", b.read_u16_le(0)?), 0, 2);
    rec.field(tree, format!("First column: 0x{:04x}", first), 2, 2);
    rec.field(tree, format!("Last column: 0x{:04x}", last), last_at, 2);
    if first > last {
        return Err(DissectError::structural(
            rec.body_offset,
            format!(
                "{} first column (0x{:04x}) is greater than last column (0x{:04x})",
                what, first, last
            ),
        ));
    }
    Ok((first, last))
}

fn add_mulblank(rec: &Record<'_>, tree: &mut dyn TreeSink, diag: &mut Diagnostics) -> Result<()> {
    let (first, last) = multi_cell_header(rec, tree, "MULBLANK")?;
    let bytes_left = rec.body.len() - 6;
    let expected = (last - first) as usize + 1;
    let count = bytes_left / 2;
    if bytes_left % 2 != 0 || count != expected {
        diag.warn(
            DiagnosticKind::Structural,
            ORIGIN,
            format!(
                "Number of BLANK records ({}) does not match remaining byte count (0x{:04x})",
                expected, bytes_left
            ),
        );
    }
    for i in 0..count {
        let at = 4 + i * 2;
        rec.field(
            tree,
            format!(
                "Column {} XF Index: 0x{:04x}",
                first as usize + i,
                rec.body.read_u16_le(at)?
            ),
            at,
            2,
        );
    }
    Ok(())
}

const RKREC_SIZE: usize = 6;

fn add_rk_fields(rec: &Record<'_>, tree: &mut dyn TreeSink, parent: NodeId, at: usize) -> Result<()> {
    let ixfe = rec.body.read_u16_le(at)?;
    let rk = rec.body.read_u32_le(at + 2)?;
    rec.field_under(tree, parent, format!("XF Index: 0x{:04x}", ixfe), at, 2);
    rec.field_under(tree, parent, format!("RK type: {}", rk_type_name(rk)), at + 2, 4);
    rec.field_under(tree, parent, format!("RK value: {}", rk_decode(rk)), at + 2, 4);
    Ok(())
}

fn add_mulrk(rec: &Record<'_>, tree: &mut dyn TreeSink, diag: &mut Diagnostics) -> Result<()> {
    let (first, last) = multi_cell_header(rec, tree, "MULRK")?;
    let bytes_left = rec.body.len() - 6;
    let expected = (last - first) as usize + 1;
    let count = bytes_left / RKREC_SIZE;
    if bytes_left % RKREC_SIZE != 0 || count != expected {
        diag.warn(
            DiagnosticKind::Structural,
            ORIGIN,
            format!(
                "Number of RK records ({}) does not match remaining byte count (0x{:04x})",
                expected, bytes_left
            ),
        );
    }
    for i in 0..count {
        let at = 4 + i * RKREC_SIZE;
        let col = rec.field(tree, format!("Column {}", first as usize + i), at, RKREC_SIZE);
        add_rk_fields(rec, tree, col, at)?;
    }
    Ok(())
}

fn add_rk(rec: &Record<'_>, tree: &mut dyn TreeSink) -> Result<()> {
    rec.require(10, "an RK")?;
    let b = rec.body;
    rec.field(tree, format!("Row number: 0x{:04x}", b.read_u16_le(0)?), 0, 2);
    rec.field(tree, format!("Column number: 0x{:04x}", b.read_u16_le(2)?), 2, 2);
    add_rk_fields(rec, tree, rec.node, 4)
}
