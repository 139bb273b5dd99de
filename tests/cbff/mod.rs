//! Compound file engine tests over synthetic files.

mod chains;
mod directory;
mod dissectors;

use crate::common::cbff::CbffImage;
use docdissect::config::CbffConfig;
use docdissect::error::DissectBudget;
use docdissect::formats::cbff::plugins::{StreamDissector, StreamDissectorRegistry};
use docdissect::formats::cbff::stream::CbffStream;
use docdissect::formats::cbff::CbffEngine;
use docdissect::{Diagnostics, DissectionTree, FormatEngine, MemorySource, Result, TreeSink};

/// Wants every stream and labels each one with its loaded length.
struct FetchAll;

impl StreamDissector for FetchAll {
    fn name(&self) -> &'static str {
        "fetch_all"
    }

    fn mark_desired(&mut self, streams: &mut [CbffStream]) {
        for s in streams {
            s.wanted = true;
        }
    }

    fn dissect(
        &mut self,
        streams: &[CbffStream],
        tree: &mut dyn TreeSink,
        _diag: &mut Diagnostics,
    ) -> Result<()> {
        for s in streams {
            tree.append_label(s.node, &format!("Loaded: {}", s.bytes().len()));
        }
        Ok(())
    }
}

pub(crate) struct Run {
    pub engine: CbffEngine,
    pub tree: DissectionTree,
    pub diag: Diagnostics,
    pub ok: bool,
}

impl Run {
    pub fn stream(&self, name: &str) -> &CbffStream {
        self.engine
            .compound_file()
            .and_then(|f| f.stream(name))
            .unwrap_or_else(|| panic!("stream {:?} missing", name))
    }
}

fn run_with(engine: CbffEngine, image: &CbffImage) -> Run {
    let mut engine = engine;
    let mut tree = DissectionTree::new();
    let mut diag = Diagnostics::new();
    let ok = engine
        .dissect(&MemorySource::new(image.data.clone()), &mut tree, &mut diag)
        .is_ok();
    Run {
        engine,
        tree,
        diag,
        ok,
    }
}

/// Dissect with the default workbook and property-set dissectors.
pub(crate) fn dissect(image: &CbffImage) -> Run {
    run_with(
        CbffEngine::new(CbffConfig::default(), DissectBudget::default()),
        image,
    )
}

/// Dissect with a single dissector that fetches every stream.
pub(crate) fn dissect_fetch_all(image: &CbffImage) -> Run {
    let mut registry = StreamDissectorRegistry::new();
    registry.register(Box::new(FetchAll));
    run_with(
        CbffEngine::with_dissectors(CbffConfig::default(), DissectBudget::default(), registry),
        image,
    )
}
