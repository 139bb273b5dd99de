//! Configuration for dissection runs.
//!
//! All sections carry sensible defaults and deserialize from partial JSON.

use crate::error::{DissectBudget, DissectError, Result};
use crate::io::IoLimits;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Master configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DissectConfig {
    /// Limits applied when opening sources.
    pub io: IoLimits,
    /// Compound file engine settings.
    pub cbff: CbffConfig,
    /// PDF engine settings.
    pub pdf: PdfConfig,
    /// Time and iteration budget shared by all engines.
    pub budget: DissectBudget,
}

impl DissectConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| DissectError::Config(e.to_string()))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            DissectError::Config(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_json_str(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| DissectError::Config(e.to_string()))
    }
}

/// Compound Binary File engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CbffConfig {
    /// File extensions handled by the engine (default: xls, doc, ppt).
    pub extensions: Vec<String>,
    /// Depth cap for directory-tree reconstruction (default: 32).
    pub max_directory_depth: usize,
    /// Streams larger than this are not fetched (default: 64MB).
    pub max_stream_size: u64,
    /// Whether zero-length wanted streams are handed to dissectors (default: true).
    pub read_empty_streams: bool,
}

impl Default for CbffConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["xls".into(), "doc".into(), "ppt".into()],
            max_directory_depth: 32,
            max_stream_size: 64 * 1024 * 1024,
            read_empty_streams: true,
        }
    }
}

/// PDF engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// File extensions handled by the engine (default: pdf, fdf).
    pub extensions: Vec<String>,
    /// "%%EOF" must start within this many bytes of the end (default: 1024).
    pub eof_search_window: u64,
    /// Maximum dictionary/array nesting in one object (default: 256).
    pub max_nesting_depth: usize,
    /// Maximum number of xref sections followed through Prev/XRefStm (default: 64).
    pub max_xref_sections: usize,
    /// Check that a declared stream Length lands on "endstream" (default: true).
    pub verify_stream_length: bool,
    /// Decode stream filters while dissecting objects (default: true).
    pub decode_streams: bool,
    /// Cap on decoded stream size (default: 64MB).
    pub max_decoded_size: u64,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["pdf".into(), "fdf".into()],
            eof_search_window: 1024,
            max_nesting_depth: 256,
            max_xref_sections: 64,
            verify_stream_length: true,
            decode_streams: true,
            max_decoded_size: 64 * 1024 * 1024,
        }
    }
}
