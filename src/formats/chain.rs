//! Index-chain traversal with revisit detection.
//!
//! FAT, MiniFAT and directory sector chains are linked lists stored inside
//! an index table. Every dereference goes through [`ChainWalker::next`], which
//! forces the walk to end when an index is out of range or already visited.

use crate::diag::{DiagnosticKind, Diagnostics};
use std::collections::HashSet;

pub const FREESECT: u32 = 0xFFFF_FFFF;
pub const ENDOFCHAIN: u32 = 0xFFFF_FFFE;
pub const FATSECT: u32 = 0xFFFF_FFFD;
pub const DIFSECT: u32 = 0xFFFF_FFFC;

/// Largest value that addresses a real sector.
pub const MAXREGSECT: u32 = 0xFFFF_FFFA;

/// Outcome of one chain step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStep {
    Next(u32),
    EndOfChain,
}

/// Walks one chain through an index table.
#[derive(Debug)]
pub struct ChainWalker<'t> {
    table: &'t [u32],
    visited: HashSet<u32>,
    chain: &'static str,
}

impl<'t> ChainWalker<'t> {
    pub fn new(table: &'t [u32], chain: &'static str) -> Self {
        Self {
            table,
            visited: HashSet::new(),
            chain,
        }
    }

    /// Mark the first index of a chain as visited.
    pub fn start(&mut self, index: u32) {
        self.visited.insert(index);
    }

    pub fn visited(&self) -> usize {
        self.visited.len()
    }

    /// Look up the successor of `index`.
    ///
    /// Out-of-range indices, revisits and special values other than
    /// ENDOFCHAIN end the walk with a diagnostic.
    pub fn next(&mut self, index: u32, diag: &mut Diagnostics) -> ChainStep {
        let Some(&value) = self.table.get(index as usize) else {
            diag.warn(
                DiagnosticKind::Structural,
                "chain",
                format!(
                    "{} index 0x{:08x} beyond table of {} entries, treating as end of chain",
                    self.chain,
                    index,
                    self.table.len()
                ),
            );
            return ChainStep::EndOfChain;
        };

        if value == ENDOFCHAIN {
            return ChainStep::EndOfChain;
        }
        if value > MAXREGSECT {
            diag.warn(
                DiagnosticKind::Structural,
                "chain",
                format!(
                    "{} entry 0x{:08x} holds special value 0x{:08x} inside a chain",
                    self.chain, index, value
                ),
            );
            return ChainStep::EndOfChain;
        }
        if !self.visited.insert(value) {
            diag.warn(
                DiagnosticKind::CycleDetected,
                "chain",
                format!(
                    "{} loop detected: entry 0x{:08x} points back to 0x{:08x}",
                    self.chain, index, value
                ),
            );
            return ChainStep::EndOfChain;
        }
        ChainStep::Next(value)
    }

    /// Collect a whole chain starting at `start`, at most `limit` entries.
    pub fn collect(&mut self, start: u32, limit: usize, diag: &mut Diagnostics) -> Vec<u32> {
        let mut out = Vec::new();
        if start > MAXREGSECT || limit == 0 {
            return out;
        }
        self.start(start);
        let mut cur = start;
        loop {
            out.push(cur);
            match self.next(cur, diag) {
                ChainStep::Next(n) => {
                    if out.len() >= limit {
                        diag.warn(
                            DiagnosticKind::Resource,
                            "chain",
                            format!(
                                "{} chain longer than {} entries, truncated",
                                self.chain, limit
                            ),
                        );
                        break;
                    }
                    cur = n;
                }
                ChainStep::EndOfChain => break,
            }
        }
        out
    }
}
