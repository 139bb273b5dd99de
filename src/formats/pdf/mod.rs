//! Portable Document Format engine
//!
//! Stages, each recorded in the tree under `Portable Document`:
//!
//! 1. header version check
//! 2. backward trailer scan for `%%EOF`, `startxref` and the trailer dictionary
//! 3. xref walk over classic tables and compressed xref streams
//! 4. parse of every registered indirect object, in object number order
//!
//! Only a header or trailer too short to read stops a run with an error.
//! A file whose xref chain yields nothing stops after stage 3 with an
//! error diagnostic.

pub mod filters;
pub mod header;
pub mod lexer;
pub mod objects;
pub mod parser;
pub mod trailer;
pub mod types;
pub mod xref;
pub mod xref_stream;

use crate::config::PdfConfig;
use crate::diag::{DiagnosticKind, Diagnostics};
use crate::error::{DissectBudget, Result};
use crate::formats::{extension_in, report_overruns, FormatEngine};
use crate::io::ByteSource;
use crate::timeout::IterationTimeout;
use crate::tree::{BoundedSink, ByteRange, NodeId, TreeSink};
use objects::{read_indirect, ObjectTable, TableResolver};
use parser::BodyParser;
use std::collections::HashMap;
use tracing::{debug, info, info_span, warn};
use trailer::TrailerInfo;
pub use types::*;
use xref::{XrefSummary, XrefWalker};

const ORIGIN: &str = "pdf";

/// Everything learned about the current file.
#[derive(Debug, Clone)]
pub struct PdfDocument {
    pub version: PdfVersion,
    pub trailer: TrailerInfo,
    pub table: ObjectTable,
    pub xref: XrefSummary,
    pub objects: Vec<IndirectObject>,
}

impl PdfDocument {
    pub fn object(&self, key: ObjectKey) -> Option<&IndirectObject> {
        self.objects.iter().find(|o| o.header.key == key)
    }

    /// Follow a reference to its object.
    pub fn resolve(&self, obj: &PdfObject) -> Option<&IndirectObject> {
        match obj {
            PdfObject::Reference(key) => self.object(*key),
            _ => None,
        }
    }
}

/// The PDF format engine.
pub struct PdfEngine {
    config: PdfConfig,
    budget: DissectBudget,
    document: Option<PdfDocument>,
}

impl PdfEngine {
    pub fn new(config: PdfConfig, budget: DissectBudget) -> Self {
        Self {
            config,
            budget,
            document: None,
        }
    }

    pub fn config(&self) -> &PdfConfig {
        &self.config
    }

    /// State of the last dissected file, `None` after `close_file`.
    pub fn document(&self) -> Option<&PdfDocument> {
        self.document.as_ref()
    }

    fn run(&mut self, data: &[u8], tree: &mut dyn TreeSink, diag: &mut Diagnostics) -> Result<()> {
        let root = tree.add_root("Portable Document");

        let version = header::parse_header(data, tree, root, diag)?;
        debug!(%version, "header parsed");
        let trailer = trailer::parse_trailer(data, &self.config, tree, root, diag)?;

        let mut table = ObjectTable::new();
        let xref = XrefWalker::new(data, &self.config, &self.budget).walk(
            &trailer, &mut table, tree, root, diag,
        );

        let mut document = PdfDocument {
            version,
            trailer,
            table,
            xref,
            objects: Vec::new(),
        };
        if document.table.is_empty() && xref.sections == 0 {
            warn!("no usable xref source");
            diag.error(
                DiagnosticKind::Structural,
                ORIGIN,
                "No usable xref section was found",
            );
            self.document = Some(document);
            return Ok(());
        }

        document.objects = self.dissect_objects(data, &document.table, tree, root, diag);
        info!(
            objects = document.objects.len(),
            registered = document.table.len(),
            "objects dissected"
        );
        self.document = Some(document);
        Ok(())
    }

    fn dissect_objects(
        &self,
        data: &[u8],
        table: &ObjectTable,
        tree: &mut dyn TreeSink,
        root: NodeId,
        diag: &mut Diagnostics,
    ) -> Vec<IndirectObject> {
        let list = tree.append_label(root, "Indirect Objects");
        let parser = BodyParser::new(data, &self.config);
        let mut lengths = HashMap::new();
        let mut timer = IterationTimeout::new(self.budget.max_time_seconds, "indirect objects")
            .with_check_interval(self.budget.check_interval)
            .with_max_iterations(self.budget.max_items);
        let mut objects = Vec::with_capacity(table.len());

        for (key, offset) in table.iter() {
            if let Err(e) = timer.check() {
                diag.record("pdf::objects", &e);
                break;
            }
            let node = tree.append_label(list, &format!("Object {}", key));
            let header = match read_indirect(data, offset, Some(key), diag) {
                Ok(h) => h,
                Err(e) => {
                    diag.record("pdf::objects", &e);
                    continue;
                }
            };
            tree.set_ranges(node, vec![ByteRange::new(header.offset, header.length)]);

            let start = header.data_offset as usize;
            let end = start + header.data_len as usize;
            let mut resolver = TableResolver::new(data, table, &self.config, &mut lengths);
            let body = parser.parse(start..end, tree, node, &mut resolver, diag);
            if !body.complete {
                diag.warn(
                    DiagnosticKind::Structural,
                    "pdf::objects",
                    format!("Object {} did not parse cleanly", key),
                );
            }

            if let (true, Some(stream)) = (self.config.decode_streams, &body.stream) {
                let empty = PdfDictionary::new();
                let dict = body.dict.as_ref().unwrap_or(&empty);
                let decoded = filters::decoded(stream, dict, &self.config, diag);
                if let Some(stream_node) = body.stream_node {
                    tree.append_label(
                        stream_node,
                        &format!("Decoded Length: {}", decoded.data.len()),
                    );
                }
            }

            objects.push(IndirectObject {
                header,
                dict: body.dict,
                stream: body.stream,
                object: body.object,
                node,
            });
        }
        debug!(
            iterations = timer.iterations(),
            elapsed = ?timer.elapsed(),
            "object pass finished"
        );
        objects
    }
}

impl FormatEngine for PdfEngine {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn supports_extension(&self, ext: &str) -> bool {
        extension_in(&self.config.extensions, ext)
    }

    fn dissect(
        &mut self,
        source: &dyn ByteSource,
        tree: &mut dyn TreeSink,
        diag: &mut Diagnostics,
    ) -> Result<()> {
        let _span = info_span!("dissect_pdf", len = source.len()).entered();
        self.close_file();

        let mut sink = BoundedSink::new(tree, source.len());
        let result = self.run(source.as_slice(), &mut sink, diag);
        if let Err(e) = &result {
            diag.record(ORIGIN, e);
        }
        report_overruns(sink.into_overruns(), source.len(), ORIGIN, diag);
        result
    }

    fn close_file(&mut self) {
        self.document = None;
    }
}
