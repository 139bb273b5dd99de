//! Compound Binary File (OLE2) engine
//!
//! Dissection runs as a fixed sequence of stages. Each stage gates the next;
//! a failing stage is recorded as a diagnostic and the nodes built so far
//! stay in the tree.
//!
//! 1. header validation
//! 2. FAT load
//! 3. MiniFAT load
//! 4. directory load and hierarchy reconstruction
//! 5. stream dissection: dissectors mark the streams they want, the wanted
//!    streams are fetched in one pass, then every dissector runs

pub mod directory;
pub mod fat;
pub mod header;
pub mod plugins;
pub mod stream;
pub mod types;

use crate::config::CbffConfig;
use crate::diag::Diagnostics;
use crate::error::{DissectBudget, Result};
use crate::formats::{extension_in, report_overruns, FormatEngine};
use crate::io::ByteSource;
use crate::timeout::IterationTimeout;
use crate::tree::{BoundedSink, NodeId, TreeSink};
use directory::Directory;
use fat::AllocationTable;
use plugins::StreamDissectorRegistry;
use stream::{CbffStream, StreamReader};
use tracing::{debug, info, info_span};
pub use types::*;

const ORIGIN: &str = "cbff";

/// Everything learned about the current file.
#[derive(Debug, Clone)]
pub struct CompoundFile {
    pub header: CbffHeader,
    pub fat: AllocationTable,
    pub minifat: AllocationTable,
    pub directory: Directory,
    pub streams: Vec<CbffStream>,
}

impl CompoundFile {
    pub fn stream(&self, name: &str) -> Option<&CbffStream> {
        self.streams.iter().find(|s| s.name == name)
    }
}

/// The compound file format engine.
pub struct CbffEngine {
    config: CbffConfig,
    budget: DissectBudget,
    dissectors: StreamDissectorRegistry,
    file: Option<CompoundFile>,
}

impl CbffEngine {
    /// Engine with the default stream dissectors.
    pub fn new(config: CbffConfig, budget: DissectBudget) -> Self {
        let dissectors = StreamDissectorRegistry::with_defaults(&budget);
        Self::with_dissectors(config, budget, dissectors)
    }

    pub fn with_dissectors(
        config: CbffConfig,
        budget: DissectBudget,
        dissectors: StreamDissectorRegistry,
    ) -> Self {
        Self {
            config,
            budget,
            dissectors,
            file: None,
        }
    }

    pub fn config(&self) -> &CbffConfig {
        &self.config
    }

    pub fn dissectors(&self) -> &StreamDissectorRegistry {
        &self.dissectors
    }

    /// State of the last dissected file, `None` after `close_file`.
    pub fn compound_file(&self) -> Option<&CompoundFile> {
        self.file.as_ref()
    }

    fn run(&mut self, data: &[u8], tree: &mut dyn TreeSink, diag: &mut Diagnostics) -> Result<()> {
        let root = tree.add_root("Compound Binary File");

        let header = header::parse_header(data, diag)?;
        header::add_header_nodes(tree, root, &header);
        debug!(
            sector_size = header.sector_size,
            mini_sector_size = header.mini_sector_size,
            "header parsed"
        );

        let fat = fat::load_fat(data, &header, diag);
        fat::add_table_nodes(tree, root, "FAT", &fat, header.sector_size);

        let minifat = match fat::load_minifat(data, &header, &fat, diag) {
            Ok(table) => table,
            Err(e) => {
                diag.record("cbff::minifat", &e);
                AllocationTable::default()
            }
        };
        if !minifat.is_empty() {
            fat::add_table_nodes(tree, root, "MiniFAT", &minifat, header.sector_size);
        }

        let directory = match directory::load_directory(data, &header, &fat, diag) {
            Ok(dir) => dir,
            Err(e) => {
                diag.record("cbff::directory", &e);
                self.file = Some(CompoundFile {
                    header,
                    fat,
                    minifat,
                    directory: Directory::default(),
                    streams: Vec::new(),
                });
                return Ok(());
            }
        };
        directory::add_directory_nodes(tree, root, &directory, &header, diag);

        let mut timer = IterationTimeout::new(self.budget.max_time_seconds, "directory reconstruction")
            .with_check_interval(self.budget.check_interval)
            .with_max_iterations(self.budget.max_items);
        let mut streams = match directory::reconstruct(
            tree,
            root,
            &directory,
            self.config
                .max_directory_depth
                .min(self.budget.max_recursion_depth),
            &mut timer,
            diag,
        ) {
            Ok((_, streams)) => streams,
            Err(e) => {
                diag.record("cbff::directory", &e);
                Vec::new()
            }
        };

        self.dissect_streams(data, &header, &fat, &minifat, &directory, &mut streams, tree, diag);

        self.file = Some(CompoundFile {
            header,
            fat,
            minifat,
            directory,
            streams,
        });
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn dissect_streams(
        &mut self,
        data: &[u8],
        header: &CbffHeader,
        fat: &AllocationTable,
        minifat: &AllocationTable,
        directory: &Directory,
        streams: &mut [CbffStream],
        tree: &mut dyn TreeSink,
        diag: &mut Diagnostics,
    ) {
        if streams.is_empty() || self.dissectors.is_empty() {
            return;
        }

        for d in self.dissectors.iter_mut() {
            d.mark_desired(streams);
        }

        let reader = StreamReader::new(data, header, fat, minifat, directory.root_entry(), diag);
        let fetched = reader.read_wanted(streams, &self.config, diag);
        debug!(fetched, total = streams.len(), "streams fetched");

        for d in self.dissectors.iter_mut() {
            info!("Dissecting streams using {}", d.name());
            if let Err(e) = d.dissect(streams, tree, diag) {
                diag.record(d.name(), &e);
            }
        }
    }
}

impl FormatEngine for CbffEngine {
    fn name(&self) -> &'static str {
        "cbff"
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
        let _span = info_span!("dissect_cbff", len = source.len()).entered();
        self.close_file();

        let mut sink = BoundedSink::new(tree, source.len());
        let result = self.run(source.as_slice(), &mut sink, diag);
        if let Err(e) = &result {
            diag.record("cbff::header", e);
        }
        report_overruns(sink.into_overruns(), source.len(), ORIGIN, diag);
        result
    }

    fn close_file(&mut self) {
        self.file = None;
        self.dissectors.close_file();
    }
}

/// Node of the first root created by this engine, if any.
pub fn root_node(tree: &crate::tree::DissectionTree) -> Option<NodeId> {
    tree.roots()
        .iter()
        .copied()
        .find(|&r| tree.label(r) == Some("Compound Binary File"))
}
