//! Common test utilities and helpers.
//!
//! Integration tests build their inputs synthetically: compound files
//! through [`cbff::CbffBuilder`], PDFs through [`pdf`], and on-disk copies
//! through [`test_utils`].

#![allow(dead_code)]

pub mod cbff;

use docdissect::{Diagnostics, DissectionTree, NodeId};

/// Resolve a label path or fail with the tree dumped for inspection.
pub fn expect_path(tree: &DissectionTree, path: &[&str]) -> NodeId {
    match tree.find_path(path) {
        Some(id) => id,
        None => panic!(
            "path {:?} not found in tree:\n{}",
            path,
            tree.to_json_pretty().unwrap_or_default()
        ),
    }
}

/// Format all diagnostics on one line each, for assertion messages.
pub fn dump(diag: &Diagnostics) -> String {
    diag.entries()
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
