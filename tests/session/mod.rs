use crate::common::cbff::{minimal_workbook, CbffBuilder};
use crate::common::pdf::classic;
use crate::common::test_utils::{temp_dir_file, temp_file_with_ext};
use docdissect::config::DissectConfig;
use docdissect::{
    dissect_path, dissect_path_with_timeout, DissectError, DissectSession, MemorySource,
};

fn workbook_file() -> Vec<u8> {
    CbffBuilder::new()
        .stream("Workbook", minimal_workbook())
        .build()
        .data
}

#[test]
fn extension_selects_the_engine() {
    let xls = temp_file_with_ext(&workbook_file(), "xls");
    let pdf = temp_file_with_ext(&classic(&["<< /Type /Catalog >>"]), "PDF");

    let mut session = DissectSession::new(DissectConfig::default());
    let d = session.open(xls.path()).unwrap();
    assert_eq!(d.engine, "cbff");
    assert!(d.complete);
    assert_eq!(session.path(), Some(xls.path()));

    let d = session.open(pdf.path()).unwrap();
    assert_eq!(d.engine, "pdf");
    assert!(d.complete);
    let root = d.tree.root().unwrap();
    assert_eq!(d.tree.label(root), Some("Portable Document"));
}

#[test]
fn rescan_rebuilds_an_identical_tree() {
    let file = temp_file_with_ext(&workbook_file(), "xls");
    let mut session = DissectSession::new(DissectConfig::default());
    let first = session.open(file.path()).unwrap().tree.snapshot();
    let again = session.rescan().unwrap();
    assert_eq!(
        serde_json::to_value(again.tree.snapshot()).unwrap(),
        serde_json::to_value(first).unwrap()
    );
}

#[test]
fn close_forgets_the_file() {
    let file = temp_file_with_ext(&classic(&["<< /Type /Catalog >>"]), "pdf");
    let mut session = DissectSession::new(DissectConfig::default());
    session.open(file.path()).unwrap();
    session.close();
    assert!(session.current().is_none());
    assert!(session.path().is_none());
    assert!(matches!(session.rescan(), Err(DissectError::Config(_))));
}

#[test]
fn unknown_extension_is_refused() {
    let file = temp_file_with_ext(b"PK\x03\x04", "zip");
    let mut session = DissectSession::new(DissectConfig::default());
    assert!(matches!(
        session.open(file.path()),
        Err(DissectError::UnsupportedFormat(_))
    ));
}

#[test]
fn oversized_file_is_not_mapped() {
    let mut config = DissectConfig::default();
    config.io.max_file_size = 64;
    let (_dir, path) = temp_dir_file(&classic(&["<< /Type /Catalog >>"]), "big.pdf");
    assert!(matches!(
        dissect_path(&path, &config),
        Err(DissectError::Io(_))
    ));
}

#[test]
fn truncated_file_yields_a_partial_result() {
    let (_dir, path) = temp_dir_file(b"\xD0\xCF\x11\xE0", "short.doc");
    let d = dissect_path(&path, &DissectConfig::default()).unwrap();
    assert!(!d.complete);
    assert!(d.diagnostics.errors().count() >= 1);
    assert!(d.tree.root().is_some());
}

#[test]
fn in_memory_sources_cannot_be_rescanned() {
    let mut session = DissectSession::new(DissectConfig::default());
    let src = MemorySource::new(classic(&["<< /Type /Catalog >>"]));
    assert!(session.dissect_source("pdf", &src).unwrap().complete);
    assert!(matches!(session.rescan(), Err(DissectError::Config(_))));
    // the result survives the failed rescan
    assert!(session.current().is_some());
}

#[test]
fn report_is_json() {
    let file = temp_file_with_ext(&workbook_file(), "xls");
    let d = dissect_path(file.path(), &DissectConfig::default()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&d.to_json_pretty().unwrap()).unwrap();
    assert_eq!(value["engine"], "cbff");
    assert_eq!(value["complete"], true);
    assert!(value["tree"].is_array());
}

#[tokio::test]
async fn bounded_dissection_completes() {
    let (_dir, path) = temp_dir_file(&classic(&["<< /Type /Catalog >>"]), "doc.pdf");
    let d = dissect_path_with_timeout(path, DissectConfig::default())
        .await
        .unwrap();
    assert_eq!(d.engine, "pdf");
    assert!(d.complete);
}
