mod objects;
mod xref;

use docdissect::config::PdfConfig;
use docdissect::error::DissectBudget;
use docdissect::formats::pdf::PdfEngine;
use docdissect::{Diagnostics, DissectionTree, FormatEngine, MemorySource};

pub struct Run {
    pub engine: PdfEngine,
    pub tree: DissectionTree,
    pub diag: Diagnostics,
    pub ok: bool,
}

pub fn dissect_with(data: Vec<u8>, config: PdfConfig) -> Run {
    let mut engine = PdfEngine::new(config, DissectBudget::default());
    let mut tree = DissectionTree::new();
    let mut diag = Diagnostics::new();
    let ok = engine
        .dissect(&MemorySource::new(data), &mut tree, &mut diag)
        .is_ok();
    Run {
        engine,
        tree,
        diag,
        ok,
    }
}

pub fn dissect(data: Vec<u8>) -> Run {
    dissect_with(data, PdfConfig::default())
}
