//! Format engines and the registry that selects them by file extension.

pub mod cbff;
pub mod chain;
pub mod pdf;
pub mod utils;

use crate::config::DissectConfig;
use crate::diag::{DiagnosticKind, Diagnostics};
use crate::error::Result;
use crate::io::ByteSource;
use crate::tree::{ByteRange, TreeSink};
use std::path::Path;

/// A dissector for one top-level file format.
pub trait FormatEngine {
    /// Short engine name used in logs.
    fn name(&self) -> &'static str;

    fn supports_extension(&self, ext: &str) -> bool;

    /// Dissect `source` into `tree`, reporting problems through `diag`.
    ///
    /// Returns `Err` only when the run could not get past its first
    /// validation stage; everything built until then stays in the tree.
    fn dissect(
        &mut self,
        source: &dyn ByteSource,
        tree: &mut dyn TreeSink,
        diag: &mut Diagnostics,
    ) -> Result<()>;

    /// Drop all per-file state.
    fn close_file(&mut self);
}

/// Case-insensitive extension match against a configured list.
pub(crate) fn extension_in(list: &[String], ext: &str) -> bool {
    let ext = ext.trim_start_matches('.');
    list.iter().any(|e| e.eq_ignore_ascii_case(ext))
}

/// Most out-of-bounds ranges reported individually per run.
const MAX_OVERRUN_REPORTS: usize = 16;

/// Turn the overruns collected by a [`crate::tree::BoundedSink`] into diagnostics.
pub(crate) fn report_overruns(
    overruns: Vec<(String, ByteRange)>,
    source_len: u64,
    origin: &str,
    diag: &mut Diagnostics,
) {
    let total = overruns.len();
    for (label, range) in overruns.into_iter().take(MAX_OVERRUN_REPORTS) {
        diag.warn(
            DiagnosticKind::Structural,
            origin,
            format!(
                "range {} of \"{}\" extends past end of source ({:#x})",
                range, label, source_len
            ),
        );
    }
    if total > MAX_OVERRUN_REPORTS {
        diag.warn(
            DiagnosticKind::Structural,
            origin,
            format!(
                "{} more ranges extend past end of source",
                total - MAX_OVERRUN_REPORTS
            ),
        );
    }
}

/// Ordered set of format engines.
#[derive(Default)]
pub struct FormatRegistry {
    engines: Vec<Box<dyn FormatEngine>>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the compound-file and PDF engines.
    pub fn with_defaults(config: &DissectConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(cbff::CbffEngine::new(
            config.cbff.clone(),
            config.budget.clone(),
        )));
        registry.register(Box::new(pdf::PdfEngine::new(
            config.pdf.clone(),
            config.budget.clone(),
        )));
        registry
    }

    pub fn register(&mut self, engine: Box<dyn FormatEngine>) {
        self.engines.push(engine);
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.engines.iter().map(|e| e.name()).collect()
    }

    /// Index of the first engine claiming `ext`.
    pub fn position_for_extension(&self, ext: &str) -> Option<usize> {
        self.engines.iter().position(|e| e.supports_extension(ext))
    }

    pub fn engine_for_extension(&mut self, ext: &str) -> Option<&mut (dyn FormatEngine + 'static)> {
        let idx = self.position_for_extension(ext)?;
        Some(self.engines[idx].as_mut())
    }

    pub fn engine_for_path(&mut self, path: &Path) -> Option<&mut (dyn FormatEngine + 'static)> {
        let ext = path.extension()?.to_str()?;
        self.engine_for_extension(ext)
    }

    pub fn engine_at(&mut self, idx: usize) -> Option<&mut (dyn FormatEngine + 'static)> {
        match self.engines.get_mut(idx) {
            Some(e) => Some(e.as_mut()),
            None => None,
        }
    }
}
