//! Error types for the docdissect framework.
//!
//! Structural stages return these errors; the engines convert them into
//! diagnostics so that a malformed input never aborts the whole process.

use crate::io::error::IoError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Main error type for dissection operations.
#[derive(Debug, Error)]
pub enum DissectError {
    /// Bad magic, version or required field
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Offset or length out of bounds, truncated record
    #[error("Structural error at offset {offset:#x}: {message}")]
    Structural { offset: u64, message: String },

    /// A size or count computation would overflow or exceed a configured limit
    #[error("Resource limit exceeded: {resource} ({used}/{limit})")]
    ResourceExhausted {
        resource: String,
        used: u64,
        limit: u64,
    },

    /// An index chain revisited an entry
    #[error("Cycle detected in {chain} at index {index:#x}")]
    CycleDetected { chain: String, index: u64 },

    /// Bounded traversal hit its depth cap
    #[error("Recursion limit of {limit} reached in {context}")]
    RecursionLimit { context: String, limit: usize },

    /// Dissection timeout
    #[error("Dissection timeout after {seconds}s")]
    Timeout { seconds: u64 },

    /// No engine claims the file extension
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// Byte source errors
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
}

impl DissectError {
    pub fn truncated(offset: u64, needed: u64) -> Self {
        Self::Structural {
            offset,
            message: format!("truncated, needed {} bytes", needed),
        }
    }

    pub fn structural(offset: u64, message: impl Into<String>) -> Self {
        Self::Structural {
            offset,
            message: message.into(),
        }
    }
}

/// Result type alias for dissection operations
pub type Result<T> = std::result::Result<T, DissectError>;

/// Work budget guarding against inputs that drive unbounded-but-finite work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DissectBudget {
    /// Maximum wall-clock time for a single dissection, in seconds
    pub max_time_seconds: u64,
    /// How many loop iterations pass between clock checks
    pub check_interval: usize,
    /// Maximum recursion depth for tree-shaped structures
    pub max_recursion_depth: usize,
    /// Maximum number of items (records, entries, objects) processed per stage
    pub max_items: usize,
}

impl Default for DissectBudget {
    fn default() -> Self {
        Self {
            max_time_seconds: crate::timeout::DEFAULT_TIMEOUT_SECONDS,
            check_interval: 1000,
            max_recursion_depth: 32,
            max_items: 1_000_000,
        }
    }
}

impl fmt::Display for DissectBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Budget: {}s time, {} recursion, {} items (checked every {} iterations)",
            self.max_time_seconds, self.max_recursion_depth, self.max_items, self.check_interval
        )
    }
}
