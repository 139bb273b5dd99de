//! Diagnostic channel shared by all engines.
//!
//! Every problem found while dissecting is logged through `tracing` and also
//! kept in a [`Diagnostics`] collector so callers can inspect what was
//! recovered from, skipped or rejected.

use crate::error::DissectError;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info, warn};

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// What kind of problem a diagnostic describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    Validation,
    Structural,
    Resource,
    CycleDetected,
    RecursionLimit,
    Heuristic,
    Unsupported,
    Timeout,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagnosticKind::Validation => "Validation",
            DiagnosticKind::Structural => "Structural",
            DiagnosticKind::Resource => "Resource",
            DiagnosticKind::CycleDetected => "CycleDetected",
            DiagnosticKind::RecursionLimit => "RecursionLimit",
            DiagnosticKind::Heuristic => "Heuristic",
            DiagnosticKind::Unsupported => "Unsupported",
            DiagnosticKind::Timeout => "Timeout",
        };
        f.write_str(s)
    }
}

impl From<&DissectError> for DiagnosticKind {
    fn from(err: &DissectError) -> Self {
        match err {
            DissectError::Validation(_)
            | DissectError::UnsupportedFormat(_)
            | DissectError::Config(_) => DiagnosticKind::Validation,
            DissectError::Structural { .. } | DissectError::Io(_) => DiagnosticKind::Structural,
            DissectError::ResourceExhausted { .. } => DiagnosticKind::Resource,
            DissectError::CycleDetected { .. } => DiagnosticKind::CycleDetected,
            DissectError::RecursionLimit { .. } => DiagnosticKind::RecursionLimit,
            DissectError::Timeout { .. } => DiagnosticKind::Timeout,
        }
    }
}

/// A single recorded diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    /// Stage or component that raised it, e.g. `cbff::fat`
    pub origin: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:?}/{}] {}: {}",
            self.severity, self.kind, self.origin, self.message
        )
    }
}

/// Collector for the diagnostics raised during one dissection run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, kind: DiagnosticKind, origin: &str, message: impl Into<String>) {
        let message = message.into();
        info!(origin, kind = %kind, "{}", message);
        self.push(Severity::Info, kind, origin, message);
    }

    pub fn warn(&mut self, kind: DiagnosticKind, origin: &str, message: impl Into<String>) {
        let message = message.into();
        warn!(origin, kind = %kind, "{}", message);
        self.push(Severity::Warning, kind, origin, message);
    }

    pub fn error(&mut self, kind: DiagnosticKind, origin: &str, message: impl Into<String>) {
        let message = message.into();
        error!(origin, kind = %kind, "{}", message);
        self.push(Severity::Error, kind, origin, message);
    }

    /// Record a stage failure at error severity.
    pub fn record(&mut self, origin: &str, err: &DissectError) {
        self.error(DiagnosticKind::from(err), origin, err.to_string());
    }

    fn push(&mut self, severity: Severity, kind: DiagnosticKind, origin: &str, message: String) {
        self.entries.push(Diagnostic {
            severity,
            kind,
            origin: origin.to_string(),
            message,
        });
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(|d| d.severity == Severity::Error)
    }

    /// True if any diagnostic message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.entries.iter().any(|d| d.message.contains(needle))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
