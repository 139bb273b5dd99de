//! Dissection of compound binary files (OLE2) and PDF documents into
//! byte-range annotated trees.

/// Configuration loaded from JSON
pub mod config;
pub mod diag;
pub mod error;
/// Format engines and the extension registry
pub mod formats;
/// Byte sources over files and memory
pub mod io;
pub mod logging;
pub mod session;
pub mod timeout;
/// Append-only dissection tree
pub mod tree;

pub use config::DissectConfig;
pub use diag::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use error::{DissectError, Result};
pub use formats::{FormatEngine, FormatRegistry};
pub use io::{ByteSource, MappedSource, MemorySource};
pub use session::{dissect_path, dissect_path_with_timeout, DissectSession, Dissection};
pub use tree::{ByteRange, DissectionTree, NodeId, TreeSink};
