//! Dissectors for the contents of individual streams.

pub mod summary_info;
pub mod workbook;
pub mod workbook_names;

use crate::diag::Diagnostics;
use crate::error::{DissectBudget, Result};
use crate::formats::cbff::stream::CbffStream;
use crate::tree::TreeSink;
use regex::Regex;

/// A dissector for one kind of stream.
///
/// Dissection runs in two steps: `mark_desired` flags the streams the
/// dissector wants without touching their data, then `dissect` runs after
/// all flagged streams have been fetched.
pub trait StreamDissector {
    fn name(&self) -> &'static str;

    fn mark_desired(&mut self, streams: &mut [CbffStream]);

    fn dissect(
        &mut self,
        streams: &[CbffStream],
        tree: &mut dyn TreeSink,
        diag: &mut Diagnostics,
    ) -> Result<()>;

    fn close_file(&mut self) {}
}

/// Shell-style stream name pattern (`*` and `?` wildcards).
#[derive(Debug, Clone)]
pub struct NamePattern {
    source: String,
    regex: Regex,
}

impl NamePattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let mut re = String::from("(?s)^");
        for c in pattern.chars() {
            match c {
                '*' => re.push_str(".*"),
                '?' => re.push('.'),
                other => re.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
            }
        }
        re.push('$');
        let regex = Regex::new(&re)
            .map_err(|e| crate::error::DissectError::Config(format!("{}: {}", pattern, e)))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Compile a fixed pattern list.
pub(crate) fn compile_patterns(patterns: &[&str]) -> Vec<NamePattern> {
    patterns
        .iter()
        .filter_map(|p| NamePattern::new(p).ok())
        .collect()
}

pub(crate) fn matches_any(patterns: &[NamePattern], name: &str) -> bool {
    patterns.iter().any(|p| p.matches(name))
}

/// Ordered set of stream dissectors.
#[derive(Default)]
pub struct StreamDissectorRegistry {
    dissectors: Vec<Box<dyn StreamDissector>>,
}

impl StreamDissectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the workbook and property-set dissectors.
    pub fn with_defaults(budget: &DissectBudget) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(workbook::WorkbookDissector::new(budget.clone())));
        registry.register(Box::new(summary_info::SummaryInfoDissector::new(
            budget.clone(),
        )));
        registry
    }

    pub fn register(&mut self, dissector: Box<dyn StreamDissector>) {
        self.dissectors.push(dissector);
    }

    pub fn len(&self) -> usize {
        self.dissectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dissectors.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.dissectors.iter().map(|d| d.name()).collect()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn StreamDissector>> {
        self.dissectors.iter_mut()
    }

    pub fn close_file(&mut self) {
        for d in &mut self.dissectors {
            d.close_file();
        }
    }
}
