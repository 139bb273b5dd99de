use super::{dissect, dissect_fetch_all, run_with};
use crate::common::cbff::{CbffBuilder, DirLink};
use crate::common::{dump, expect_path};
use docdissect::config::CbffConfig;
use docdissect::error::DissectBudget;
use docdissect::formats::cbff::CbffEngine;
use docdissect::DiagnosticKind;

fn builder(count: usize) -> CbffBuilder {
    (0..count).fold(CbffBuilder::new(), |b, i| {
        b.stream(&format!("S{:02}", i), vec![i as u8; 16])
    })
}

#[test]
fn siblings_are_placed_under_root() {
    let run = dissect_fetch_all(&builder(3).build());
    assert!(run.diag.is_empty(), "{}", dump(&run.diag));
    let root = expect_path(&run.tree, &["Compound Binary File", "Root"]);
    assert_eq!(run.tree.child_labels(root), vec!["S00", "S01", "S02"]);
    for name in ["S00", "S01", "S02"] {
        let node = expect_path(&run.tree, &["Compound Binary File", "Root", name]);
        assert_eq!(run.tree.child_labels(node), vec!["Loaded: 16"]);
    }
}

#[test]
fn right_sibling_cycle_is_cut_once() {
    let mut image = builder(3).build();
    // last stream points back at the first
    image.set_dir_link(3, DirLink::Right, 1);
    let run = dissect(&image);
    assert!(run.ok);
    assert_eq!(run.diag.count(DiagnosticKind::CycleDetected), 1, "{}", dump(&run.diag));
    let root = expect_path(&run.tree, &["Compound Binary File", "Root"]);
    assert_eq!(run.tree.children(root).len(), 3);
    assert_eq!(run.engine.compound_file().unwrap().streams.len(), 3);
}

#[test]
fn left_sibling_pointing_at_itself() {
    let mut image = builder(2).build();
    image.set_dir_link(2, DirLink::Left, 2);
    let run = dissect(&image);
    assert_eq!(run.diag.count(DiagnosticKind::CycleDetected), 1, "{}", dump(&run.diag));
    let root = expect_path(&run.tree, &["Compound Binary File", "Root"]);
    assert_eq!(run.tree.children(root).len(), 2);
}

#[test]
fn stream_claiming_children_is_not_descended() {
    // child links on stream entries are ignored
    let mut image = builder(2).build();
    image.set_dir_link(1, DirLink::Child, 0);
    let run = dissect(&image);
    assert_eq!(run.diag.count(DiagnosticKind::CycleDetected), 0, "{}", dump(&run.diag));
    let root = expect_path(&run.tree, &["Compound Binary File", "Root"]);
    assert_eq!(run.tree.children(root).len(), 2);
}

#[test]
fn long_sibling_chain_stops_at_depth_cap() {
    let run = dissect(&builder(40).build());
    assert!(run.ok);
    assert_eq!(run.diag.count(DiagnosticKind::RecursionLimit), 1, "{}", dump(&run.diag));
    let root = expect_path(&run.tree, &["Compound Binary File", "Root"]);
    assert_eq!(run.tree.children(root).len(), 32);
    assert_eq!(run.engine.compound_file().unwrap().streams.len(), 32);
}

#[test]
fn recursion_budget_tightens_the_depth_cap() {
    let budget = DissectBudget {
        max_recursion_depth: 4,
        ..DissectBudget::default()
    };
    let run = run_with(
        CbffEngine::new(CbffConfig::default(), budget),
        &builder(10).build(),
    );
    assert!(run.ok);
    assert_eq!(run.diag.count(DiagnosticKind::RecursionLimit), 1, "{}", dump(&run.diag));
    let root = expect_path(&run.tree, &["Compound Binary File", "Root"]);
    assert_eq!(run.tree.children(root).len(), 4);
}

#[test]
fn dangling_sibling_reference_is_skipped() {
    let mut image = builder(2).build();
    image.set_dir_link(2, DirLink::Right, 500);
    let run = dissect(&image);
    assert!(run.diag.contains("Invalid directory reference"), "{}", dump(&run.diag));
    let root = expect_path(&run.tree, &["Compound Binary File", "Root"]);
    assert_eq!(run.tree.children(root).len(), 2);
}

#[test]
fn directory_entries_are_listed_by_sector() {
    let run = dissect(&builder(5).build());
    let dir = expect_path(&run.tree, &["Compound Binary File", "Directory"]);
    assert_eq!(
        run.tree.child_labels(dir),
        vec!["Directory Sector # 0", "Directory Sector # 1"]
    );
    let second = expect_path(
        &run.tree,
        &["Compound Binary File", "Directory", "Directory Sector # 1"],
    );
    // six entries: root, five streams; the tail slots are invalid and hidden
    assert_eq!(run.tree.child_labels(second), vec!["Entry 4", "Entry 5"]);
}
