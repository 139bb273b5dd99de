use super::{dissect, run_with};
use crate::common::cbff::{
    biff_bof, biff_eof, biff_record, minimal_workbook, property_set_header, summary_information,
    CbffBuilder, SUMMARY_STREAM,
};
use crate::common::{dump, expect_path};
use docdissect::config::CbffConfig;
use docdissect::error::DissectBudget;
use docdissect::formats::cbff::plugins::workbook::WorkbookDissector;
use docdissect::formats::cbff::plugins::StreamDissectorRegistry;
use docdissect::formats::cbff::CbffEngine;
use docdissect::{DiagnosticKind, FormatEngine};

#[test]
fn workbook_records_nest_under_bof() {
    let image = CbffBuilder::new()
        .stream("Workbook", minimal_workbook())
        .build();
    let run = dissect(&image);
    assert!(run.diag.is_empty(), "{}", dump(&run.diag));

    let stream = expect_path(&run.tree, &["Compound Binary File", "Root", "Workbook"]);
    let records = run.tree.children(stream);
    assert_eq!(records.len(), 1);
    let bof = records[0];
    assert!(run.tree.label(bof).unwrap().starts_with("Record 0x0809"));
    let children = run.tree.find_child(bof, "Children").unwrap();
    let labels = run.tree.child_labels(children);
    assert_eq!(labels.len(), 2);
    assert!(labels[0].starts_with("Record 0x0042"));
    assert!(labels[1].starts_with("Record 0x000a"));
}

#[test]
fn nested_substreams_attach_to_the_open_bof() {
    let mut data = biff_bof(0x0005);
    data.extend(biff_bof(0x0010));
    data.extend(biff_record(0x0042, &1252u16.to_le_bytes()));
    data.extend(biff_eof());
    data.extend(biff_eof());
    let run = dissect(&CbffBuilder::new().stream("Book", data).build());
    assert!(run.diag.is_empty(), "{}", dump(&run.diag));

    let stream = expect_path(&run.tree, &["Compound Binary File", "Root", "Book"]);
    let outer = run.tree.children(stream)[0];
    let outer_children = run.tree.find_child(outer, "Children").unwrap();
    let inner = run.tree.children(outer_children)[0];
    let inner_children = run.tree.find_child(inner, "Children").unwrap();
    assert_eq!(run.tree.children(inner_children).len(), 2);
}

#[test]
fn stray_eof_warns_once_and_continues() {
    let mut data = biff_eof();
    data.extend(biff_record(0x0042, &1252u16.to_le_bytes()));
    let run = dissect(&CbffBuilder::new().stream("Workbook", data).build());
    assert_eq!(run.diag.warnings().count(), 1, "{}", dump(&run.diag));
    assert!(run.diag.contains("Stray EOF"));
    let stream = expect_path(&run.tree, &["Compound Binary File", "Root", "Workbook"]);
    assert_eq!(run.tree.children(stream).len(), 2);
}

#[test]
fn truncated_record_header_stops_that_stream_only() {
    let mut data = biff_record(0x0042, &1252u16.to_le_bytes());
    data.extend([0x0A, 0x00]);
    let image = CbffBuilder::new()
        .stream("Workbook", data)
        .stream(SUMMARY_STREAM, summary_information("Quarterly"))
        .build();
    let run = dissect(&image);
    assert_eq!(run.diag.errors().count(), 1, "{}", dump(&run.diag));
    assert!(run.diag.contains("Not enough data left for record header"));

    let stream = expect_path(&run.tree, &["Compound Binary File", "Root", "Workbook"]);
    assert_eq!(run.tree.children(stream).len(), 1);
    // the property set stream is still dissected
    expect_path(
        &run.tree,
        &["Compound Binary File", "Root", SUMMARY_STREAM, "Sections", "Section 0"],
    );
}

#[test]
fn exhausted_stream_does_not_stop_the_next_one() {
    let codepage = biff_record(0x0042, &1252u16.to_le_bytes());
    let image = CbffBuilder::new()
        .stream("Book", codepage.repeat(5))
        .stream("Workbook", codepage.repeat(2))
        .build();
    let budget = DissectBudget {
        max_items: 3,
        ..DissectBudget::default()
    };
    let mut registry = StreamDissectorRegistry::new();
    registry.register(Box::new(WorkbookDissector::new(budget)));
    let engine =
        CbffEngine::with_dissectors(CbffConfig::default(), DissectBudget::default(), registry);
    let run = run_with(engine, &image);

    assert!(run.ok);
    assert_eq!(run.diag.count(DiagnosticKind::Resource), 1, "{}", dump(&run.diag));
    let book = expect_path(&run.tree, &["Compound Binary File", "Root", "Book"]);
    assert_eq!(run.tree.children(book).len(), 3);
    let workbook = expect_path(&run.tree, &["Compound Binary File", "Root", "Workbook"]);
    assert_eq!(run.tree.children(workbook).len(), 2);
}

#[test]
fn summary_information_properties_are_decoded() {
    let image = CbffBuilder::new()
        .stream(SUMMARY_STREAM, summary_information("Quarterly"))
        .build();
    let run = dissect(&image);
    assert!(run.diag.is_empty(), "{}", dump(&run.diag));

    let title = expect_path(
        &run.tree,
        &[
            "Compound Binary File",
            "Root",
            SUMMARY_STREAM,
            "Sections",
            "Section 0",
            "Properties",
            "Property 1",
            "Property",
        ],
    );
    let labels = run.tree.child_labels(title);
    assert_eq!(labels[0], "Type: 0x0000001e (String)");
    assert_eq!(labels.last().copied(), Some("Value: Quarterly"));
}

#[test]
fn overflowing_section_count_adds_no_sections() {
    let image = CbffBuilder::new()
        .stream(SUMMARY_STREAM, property_set_header(0xFFFF_FFFF))
        .build();
    let run = dissect(&image);
    assert_eq!(run.diag.count(DiagnosticKind::Resource), 1, "{}", dump(&run.diag));
    let sections = expect_path(
        &run.tree,
        &["Compound Binary File", "Root", SUMMARY_STREAM, "Sections"],
    );
    assert!(run.tree.children(sections).is_empty());
}

#[test]
fn bad_property_set_byte_order_is_rejected() {
    let mut data = summary_information("x");
    data[0] = 0xFF;
    data[1] = 0xFF;
    let run = dissect(&CbffBuilder::new().stream(SUMMARY_STREAM, data).build());
    assert!(run.diag.contains("Unsupported byte order"), "{}", dump(&run.diag));
    let stream = expect_path(&run.tree, &["Compound Binary File", "Root", SUMMARY_STREAM]);
    assert!(run.tree.find_child(stream, "Sections").is_none());
}

#[test]
fn close_file_drops_streams_and_dissector_state() {
    let image = CbffBuilder::new()
        .stream("Workbook", minimal_workbook())
        .build();
    let mut run = dissect(&image);
    assert!(run.engine.compound_file().is_some());
    run.engine.close_file();
    assert!(run.engine.compound_file().is_none());
}
