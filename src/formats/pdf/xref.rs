//! Cross-reference sections
//!
//! Sections are walked newest first: the `startxref` section, then for each
//! processed section its `XRefStm` and then its `Prev`. Together with
//! first-registration-wins in the object table this makes the newest
//! revision of every object authoritative.

use super::lexer::{is_digits, parse_decimal, parse_two_integers, read_line, Line};
use super::objects::ObjectTable;
use super::parser::BodyParser;
use super::trailer::TrailerInfo;
use super::types::{ObjectKey, PdfDictionary, KW_STARTXREF, KW_TRAILER, KW_XREF, XREF_ENTRY_LEN};
use super::xref_stream::dissect_xref_stream;
use crate::config::PdfConfig;
use crate::diag::{DiagnosticKind, Diagnostics};
use crate::error::{DissectBudget, DissectError, Result};
use crate::io::ByteSource;
use crate::timeout::IterationTimeout;
use crate::tree::{ByteRange, DiscardSink, NodeId, TreeSink};
use std::collections::HashSet;
use tracing::{debug, info_span};

const ORIGIN: &str = "pdf::xref";

/// Summary of an xref walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct XrefSummary {
    /// Sections that parsed without a section-level error
    pub sections: usize,
    pub failed: usize,
}

/// Walks every reachable xref section and fills the object table.
pub struct XrefWalker<'a> {
    data: &'a [u8],
    config: &'a PdfConfig,
    budget: &'a DissectBudget,
    /// Range of the trailer dictionary already shown under `Trailer`
    shown_trailer: Option<(usize, usize)>,
    section_ranges: Vec<ByteRange>,
}

impl<'a> XrefWalker<'a> {
    pub fn new(data: &'a [u8], config: &'a PdfConfig, budget: &'a DissectBudget) -> Self {
        Self {
            data,
            config,
            budget,
            shown_trailer: None,
            section_ranges: Vec::new(),
        }
    }

    pub fn walk(
        &mut self,
        trailer: &TrailerInfo,
        table: &mut ObjectTable,
        tree: &mut dyn TreeSink,
        root: NodeId,
        diag: &mut Diagnostics,
    ) -> XrefSummary {
        let _span = info_span!("xref_walk").entered();
        self.shown_trailer = trailer.dict_range;
        let xref_node = tree.append_label(root, "Xref");
        let mut summary = XrefSummary::default();

        let mut pending: Vec<u64> = Vec::new();
        match (trailer.startxref, &trailer.dict) {
            (Some(off), _) => pending.push(off),
            (None, Some(dict)) => self.queue_chain(dict, &mut pending, diag),
            (None, None) => {}
        }

        let mut timer = IterationTimeout::new(self.budget.max_time_seconds, "xref entries")
            .with_check_interval(self.budget.check_interval)
            .with_max_iterations(self.budget.max_items);
        let mut visited = HashSet::new();

        while let Some(offset) = pending.pop() {
            if !visited.insert(offset) {
                diag.warn(
                    DiagnosticKind::CycleDetected,
                    ORIGIN,
                    format!("Xref section at {:#x} was already processed", offset),
                );
                continue;
            }
            if summary.sections + summary.failed >= self.config.max_xref_sections {
                diag.warn(
                    DiagnosticKind::Resource,
                    ORIGIN,
                    format!(
                        "More than {} xref sections, ignoring the rest",
                        self.config.max_xref_sections
                    ),
                );
                break;
            }

            match self.section(offset, table, tree, xref_node, &mut timer, diag) {
                Ok(dict) => {
                    summary.sections += 1;
                    if let Some(dict) = dict {
                        self.queue_chain(&dict, &mut pending, diag);
                    }
                }
                Err(e) => {
                    diag.record(ORIGIN, &e);
                    summary.failed += 1;
                    if matches!(
                        e,
                        DissectError::Timeout { .. } | DissectError::ResourceExhausted { .. }
                    ) {
                        break;
                    }
                }
            }
        }

        if !self.section_ranges.is_empty() {
            tree.set_ranges(xref_node, std::mem::take(&mut self.section_ranges));
        }
        debug!(
            sections = summary.sections,
            failed = summary.failed,
            objects = table.len(),
            "xref walk finished"
        );
        summary
    }

    /// Push `Prev` then `XRefStm`, so the stream is processed first.
    fn queue_chain(&self, dict: &PdfDictionary, pending: &mut Vec<u64>, diag: &mut Diagnostics) {
        for key in ["Prev", "XRefStm"] {
            let Some(value) = dict.get(key) else {
                continue;
            };
            match value
                .as_integer()
                .and_then(|v| u64::try_from(v).ok())
                .filter(|&v| v < self.data.len() as u64)
            {
                Some(off) => pending.push(off),
                None => diag.warn(
                    DiagnosticKind::Structural,
                    ORIGIN,
                    format!("{} does not hold a usable offset", key),
                ),
            }
        }
    }

    fn section(
        &mut self,
        offset: u64,
        table: &mut ObjectTable,
        tree: &mut dyn TreeSink,
        xref_node: NodeId,
        timer: &mut IterationTimeout,
        diag: &mut Diagnostics,
    ) -> Result<Option<PdfDictionary>> {
        let start = offset as usize;
        match read_line(self.data, start) {
            Some(line) if line.bytes(self.data).starts_with(KW_XREF) => {
                self.classic_section(line, table, tree, xref_node, timer, diag)
            }
            _ => dissect_xref_stream(
                self.data,
                offset,
                self.config,
                table,
                tree,
                xref_node,
                timer,
                diag,
            )
            .map(Some),
        }
    }

    fn classic_section(
        &mut self,
        xref_line: Line,
        table: &mut ObjectTable,
        tree: &mut dyn TreeSink,
        xref_node: NodeId,
        timer: &mut IterationTimeout,
        diag: &mut Diagnostics,
    ) -> Result<Option<PdfDictionary>> {
        let data = self.data;
        let mut pos = xref_line.next;
        let mut trailer = None;

        loop {
            let Some(line) = read_line(data, pos) else {
                diag.warn(
                    DiagnosticKind::Structural,
                    ORIGIN,
                    format!(
                        "Xref section at {:#x} ends without a trailer",
                        xref_line.start
                    ),
                );
                break;
            };
            let bytes = line.bytes(data);
            if bytes.starts_with(KW_TRAILER) {
                trailer = self.section_trailer(line.start, tree, xref_node, diag);
                pos = line.start;
                break;
            }
            let (first, count, _) = parse_two_integers(bytes).ok_or_else(|| {
                DissectError::structural(line.start as u64, "unable to parse xref subsection")
            })?;
            pos = self.subsection(line, first, count, table, tree, xref_node, timer, diag)?;
        }

        self.section_ranges.push(ByteRange::new(
            xref_line.start as u64,
            (pos - xref_line.start) as u64,
        ));
        Ok(trailer)
    }

    /// Parse one subsection, returning the offset after its last entry.
    #[allow(clippy::too_many_arguments)]
    fn subsection(
        &mut self,
        header: Line,
        first: u64,
        count: u64,
        table: &mut ObjectTable,
        tree: &mut dyn TreeSink,
        xref_node: NodeId,
        timer: &mut IterationTimeout,
        diag: &mut Diagnostics,
    ) -> Result<usize> {
        let data = self.data;
        let node = tree.append_range(
            xref_node,
            "Subsection",
            header.start as u64,
            header.len() as u64,
        );
        tree.append_label(node, &format!("First Object: {}", first));
        tree.append_label(node, &format!("Object Count: {}", count));
        let entries = tree.append_label(node, "Entries");

        let mut pos = header.next;
        for i in 0..count {
            timer.check()?;
            let Some(line) = read_line(data, pos) else {
                break;
            };
            // a short or long line starts the next subsection or the trailer
            if !(XREF_ENTRY_LEN..=XREF_ENTRY_LEN + 1).contains(&line.len()) {
                diag.warn(
                    DiagnosticKind::Structural,
                    ORIGIN,
                    format!(
                        "Xref subsection at {:#x} ends after {} of {} entries",
                        header.start, i, count
                    ),
                );
                break;
            }
            pos = line.next;

            let Some(number) = first.checked_add(i).and_then(|n| u32::try_from(n).ok()) else {
                diag.warn(
                    DiagnosticKind::Structural,
                    ORIGIN,
                    format!("Xref object number {}+{} out of range", first, i),
                );
                break;
            };
            match parse_entry(line.bytes(data)) {
                Some(entry) => add_entry(tree, entries, &line, i, number, entry, table, diag),
                None => diag.warn(
                    DiagnosticKind::Structural,
                    ORIGIN,
                    format!("Xref entry {} at {:#x} is malformed", i, line.start),
                ),
            }
        }
        Ok(pos)
    }

    fn section_trailer(
        &self,
        keyword: usize,
        tree: &mut dyn TreeSink,
        xref_node: NodeId,
        diag: &mut Diagnostics,
    ) -> Option<PdfDictionary> {
        let start = keyword + KW_TRAILER.len();
        let end = self
            .data
            .find_forward(start as u64, KW_STARTXREF)
            .map_or(self.data.len(), |p| p as usize);
        let parser = BodyParser::new(self.data, self.config);
        let body = if self.shown_trailer.map(|(s, _)| s) == Some(start) {
            parser.parse_dictionary(start..end, &mut DiscardSink, NodeId::default(), diag)
        } else {
            let node = tree.append_range(
                xref_node,
                "Trailer",
                keyword as u64,
                (end - keyword) as u64,
            );
            parser.parse_dictionary(start..end, tree, node, diag)
        };
        body.dict
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ClassicEntry {
    value: u64,
    generation: u16,
    kind: u8,
}

/// `oooooooooo ggggg t`
fn parse_entry(line: &[u8]) -> Option<ClassicEntry> {
    if line.len() < XREF_ENTRY_LEN || line[10] != b' ' || line[16] != b' ' {
        return None;
    }
    if !is_digits(&line[..10]) || !is_digits(&line[11..16]) {
        return None;
    }
    Some(ClassicEntry {
        value: parse_decimal(&line[..10])?,
        generation: u16::try_from(parse_decimal(&line[11..16])?).ok()?,
        kind: line[17],
    })
}

#[allow(clippy::too_many_arguments)]
fn add_entry(
    tree: &mut dyn TreeSink,
    entries: NodeId,
    line: &Line,
    index: u64,
    number: u32,
    entry: ClassicEntry,
    table: &mut ObjectTable,
    diag: &mut Diagnostics,
) {
    let at = line.start as u64;
    let node = tree.append_range(
        entries,
        &format!("Entry {} - Object {} {}", index, number, entry.generation),
        at,
        line.len() as u64,
    );
    let kind = match entry.kind {
        b'n' => {
            tree.append_range(node, &format!("Offset: {:#x}", entry.value), at, 10);
            table.register(ObjectKey::new(number, entry.generation), entry.value, diag);
            "In-Use"
        }
        b'f' => {
            tree.append_range(
                node,
                &format!("Next Free Object: {}", entry.value),
                at,
                10,
            );
            "Free"
        }
        other => {
            diag.warn(
                DiagnosticKind::Structural,
                ORIGIN,
                format!(
                    "Xref entry {} has unknown type {:?}",
                    index, other as char
                ),
            );
            "Unknown"
        }
    };
    tree.append_range(node, &format!("Generation: {}", entry.generation), at + 11, 5);
    tree.append_range(node, &format!("Entry type: {}", kind), at + 17, 1);
}
