use super::{dissect, dissect_with};
use crate::common::pdf::{classic, deflate, png_up, with_xref_stream, PdfBuilder};
use crate::common::{dump, expect_path};
use docdissect::config::PdfConfig;
use docdissect::formats::pdf::{ObjectKey, PdfVersion};
use docdissect::DiagnosticKind;

/// Append an incremental update that redefines object 1.
fn with_update(base: Vec<u8>, body: &str) -> (Vec<u8>, usize) {
    let old_xref = base
        .windows(6)
        .rposition(|w| w == b"\nxref\n")
        .map(|p| p + 1)
        .unwrap();
    let mut out = base;
    let obj = out.len();
    out.extend_from_slice(format!("1 0 obj\n{}\nendobj\n", body).as_bytes());
    let xref = out.len();
    out.extend_from_slice(
        format!(
            "xref\n1 1\n{:010} 00000 n\r\ntrailer\n<< /Size 2 /Root 1 0 R /Prev {} >>\nstartxref\n{}\n%%EOF\n",
            obj, old_xref, xref
        )
        .as_bytes(),
    );
    (out, obj)
}

#[test]
fn header_version_is_read() {
    let run = dissect(classic(&["<< /Type /Catalog >>"]));
    assert!(run.ok);
    let doc = run.engine.document().unwrap();
    assert_eq!(doc.version, PdfVersion { major: 1, minor: 7 });
    expect_path(&run.tree, &["Portable Document", "Header", "Version: 1.7"]);
}

#[test]
fn future_minor_version_warns_but_continues() {
    let mut b = PdfBuilder::new("1.9");
    b.object(b"<< /Type /Catalog >>");
    let run = dissect(b.finish(""));
    assert!(run.ok);
    assert_eq!(run.diag.warnings().count(), 1, "{}", dump(&run.diag));
    let doc = run.engine.document().unwrap();
    assert_eq!(doc.version, PdfVersion { major: 1, minor: 9 });
    assert_eq!(doc.objects.len(), 1);
}

#[test]
fn classic_subsection_registers_every_in_use_entry() {
    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for n in 0..3 {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n<< /N {} >>\nendobj\n", n, n).as_bytes());
    }
    let xref = out.len();
    out.extend_from_slice(b"xref\n0 3\n");
    for off in &offsets {
        out.extend_from_slice(format!("{:010} 00000 n\r\n", off).as_bytes());
    }
    out.extend_from_slice(
        format!("trailer\n<< /Size 3 >>\nstartxref\n{}\n%%EOF\n", xref).as_bytes(),
    );

    let run = dissect(out);
    assert!(run.diag.is_empty(), "{}", dump(&run.diag));
    let doc = run.engine.document().unwrap();
    assert_eq!(doc.table.len(), 3);
    for (n, off) in offsets.iter().enumerate() {
        assert_eq!(doc.table.offset(ObjectKey::new(n as u32, 0)), Some(*off as u64));
    }
    let entries = expect_path(
        &run.tree,
        &["Portable Document", "Xref", "Subsection", "Entries"],
    );
    assert_eq!(run.tree.children(entries).len(), 3);
}

#[test]
fn compressed_xref_stream_is_the_only_index() {
    let (data, offsets) = with_xref_stream(&["<< /Type /Catalog >>", "<< /Kind /Second >>"]);
    let run = dissect(data);
    assert_eq!(run.diag.warnings().count(), 0, "{}", dump(&run.diag));
    assert_eq!(run.diag.errors().count(), 0, "{}", dump(&run.diag));

    let doc = run.engine.document().unwrap();
    assert_eq!(doc.xref.sections, 1);
    assert_eq!(doc.table.offset(ObjectKey::new(1, 0)), Some(offsets[0] as u64));
    assert_eq!(doc.table.offset(ObjectKey::new(2, 0)), Some(offsets[1] as u64));
    // the xref stream registers itself as object 3
    assert_eq!(doc.table.len(), 3);
    assert_eq!(doc.objects.len(), 3);

    let rows = expect_path(
        &run.tree,
        &["Portable Document", "Xref", "Xref Stream - Object 3 0", "Stream Data"],
    );
    assert!(run.tree.find_child_prefix(rows, "Entry 0: Free").is_some());
    assert!(run.tree.find_child_prefix(rows, "Entry 2: In-Use at").is_some());
}

#[test]
fn xref_stream_without_index_spans_zero_to_size() {
    let mut out = b"%PDF-1.5\n".to_vec();
    let mut offsets = Vec::new();
    let bodies = ["null", "<< /Type /Catalog >>", "<< /Kind /Second >>", "<< /Kind /Third >>"];
    for (n, body) in bodies.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", n, body).as_bytes());
    }
    let xref = out.len();
    offsets.push(xref);

    // every row, object 0 included, is an in-use entry
    let rows: Vec<Vec<u8>> = offsets
        .iter()
        .map(|&off| vec![1, (off >> 8) as u8, off as u8, 0])
        .collect();
    let payload = deflate(&png_up(&rows));
    out.extend_from_slice(
        format!(
            "4 0 obj\n<< /Type /XRef /Size 5 /W [1 2 1] /Root 1 0 R /Filter /FlateDecode \
             /DecodeParms << /Columns 4 /Predictor 12 >> /Length {} >>\nstream\n",
            payload.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(&payload);
    out.extend_from_slice(format!("\nendstream\nendobj\nstartxref\n{}\n%%EOF\n", xref).as_bytes());

    let run = dissect(out);
    assert_eq!(run.diag.errors().count(), 0, "{}", dump(&run.diag));
    let doc = run.engine.document().unwrap();
    assert_eq!(doc.xref.sections, 1);
    assert_eq!(doc.table.len(), 5);
    for (n, &off) in offsets.iter().enumerate() {
        assert_eq!(doc.table.offset(ObjectKey::new(n as u32, 0)), Some(off as u64));
    }

    let data = expect_path(
        &run.tree,
        &["Portable Document", "Xref", "Xref Stream - Object 4 0", "Stream Data"],
    );
    assert!(run.tree.find_child(data, "Decoded Length: 20").is_some());
    assert!(run.tree.find_child_prefix(data, "Entry 0: In-Use").is_some());
    assert!(run.tree.find_child_prefix(data, "Entry 4: In-Use").is_some());
}

#[test]
fn newest_revision_of_an_object_wins() {
    let (data, new_offset) = with_update(classic(&["<< /V 1 >>"]), "<< /V 2 >>");
    let run = dissect(data);
    assert!(run.ok);
    assert_eq!(run.diag.warnings().count(), 1, "{}", dump(&run.diag));
    assert!(run.diag.contains("already defined"));

    let doc = run.engine.document().unwrap();
    assert_eq!(doc.xref.sections, 2);
    assert_eq!(doc.table.offset(ObjectKey::new(1, 0)), Some(new_offset as u64));
    let obj = doc.object(ObjectKey::new(1, 0)).unwrap();
    assert_eq!(obj.dict.as_ref().unwrap().integer("V"), Some(2));
}

#[test]
fn prev_pointing_at_itself_is_walked_once() {
    let mut b = PdfBuilder::new("1.7");
    b.object(b"<< /Type /Catalog >>");
    let xref = b.len();
    let run = dissect(b.finish(&format!("/Prev {} ", xref)));
    assert!(run.ok);
    assert_eq!(run.diag.count(DiagnosticKind::CycleDetected), 1, "{}", dump(&run.diag));
    let doc = run.engine.document().unwrap();
    assert_eq!(doc.xref.sections, 1);
    assert_eq!(doc.objects.len(), 1);
}

#[test]
fn section_limit_stops_the_prev_chain() {
    let (data, _) = with_update(classic(&["<< /V 1 >>"]), "<< /V 2 >>");
    let config = PdfConfig {
        max_xref_sections: 1,
        ..PdfConfig::default()
    };
    let run = dissect_with(data, config);
    assert_eq!(run.diag.count(DiagnosticKind::Resource), 1, "{}", dump(&run.diag));
    assert!(run.diag.contains("More than 1 xref sections"));
    let doc = run.engine.document().unwrap();
    assert_eq!(doc.xref.sections, 1);
    assert_eq!(doc.objects.len(), 1);
}

#[test]
fn hybrid_file_reads_the_xrefstm_rows() {
    let mut out = b"%PDF-1.5\n".to_vec();
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj\n<< /Type /Catalog >>\nendobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj\n<< /Hidden true >>\nendobj\n");
    let o3 = out.len();
    out.extend_from_slice(
        b"3 0 obj\n<< /Type /XRef /Size 4 /W [1 2 1] /Index [2 1] /Length 4 >>\nstream\n",
    );
    out.extend_from_slice(&[1, (o2 >> 8) as u8, o2 as u8, 0]);
    out.extend_from_slice(b"\nendstream\nendobj\n");
    let xref = out.len();
    out.extend_from_slice(
        format!(
            "xref\n0 2\n0000000000 65535 f\r\n{:010} 00000 n\r\n3 1\n{:010} 00000 n\r\n\
             trailer\n<< /Size 4 /Root 1 0 R /XRefStm {} >>\nstartxref\n{}\n%%EOF\n",
            o1, o3, o3, xref
        )
        .as_bytes(),
    );

    let run = dissect(out);
    assert_eq!(run.diag.warnings().count(), 0, "{}", dump(&run.diag));
    let doc = run.engine.document().unwrap();
    assert_eq!(doc.xref.sections, 2);
    assert_eq!(doc.table.len(), 3);
    assert_eq!(doc.table.offset(ObjectKey::new(2, 0)), Some(o2 as u64));
    let hidden = doc.object(ObjectKey::new(2, 0)).unwrap();
    assert!(hidden.dict.as_ref().unwrap().get("Hidden").is_some());
}

#[test]
fn xref_stream_length_resolves_through_earlier_rows() {
    let mut out = b"%PDF-1.5\n".to_vec();
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj\n<< /Type /Catalog >>\nendobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj\n<< /Hidden true >>\nendobj\n");
    let o3 = out.len();
    out.extend_from_slice(
        b"3 0 obj\n<< /Type /XRef /Size 5 /W [1 2 1] /Index [2 1] /Length 4 0 R >>\nstream\n",
    );
    out.extend_from_slice(&[1, (o2 >> 8) as u8, o2 as u8, 0]);
    out.extend_from_slice(b"\nendstream\nendobj\n");
    let o4 = out.len();
    out.extend_from_slice(b"4 0 obj\n4\nendobj\n");
    let xref = out.len();
    out.extend_from_slice(
        format!(
            "xref\n0 2\n0000000000 65535 f\r\n{:010} 00000 n\r\n3 2\n{:010} 00000 n\r\n\
             {:010} 00000 n\r\ntrailer\n<< /Size 5 /Root 1 0 R /XRefStm {} >>\nstartxref\n{}\n%%EOF\n",
            o1, o3, o4, o3, xref
        )
        .as_bytes(),
    );

    let run = dissect(out);
    assert_eq!(run.diag.warnings().count(), 0, "{}", dump(&run.diag));
    assert_eq!(run.diag.count(DiagnosticKind::Heuristic), 0);
    let doc = run.engine.document().unwrap();
    assert_eq!(doc.table.len(), 4);
    assert_eq!(doc.table.offset(ObjectKey::new(2, 0)), Some(o2 as u64));
}

#[test]
fn startxref_into_an_object_body_finds_nothing() {
    let data = b"%PDF-1.4\n1 0 obj\n<< /A 1 >>\nendobj\nstartxref\n20\n%%EOF\n".to_vec();
    let run = dissect(data);
    assert!(run.ok);
    assert!(run.diag.contains("No usable xref section"), "{}", dump(&run.diag));
    assert!(run.engine.document().unwrap().objects.is_empty());
}

#[test]
fn late_eof_marker_is_reported() {
    let mut data = classic(&["<< /Type /Catalog >>"]);
    data.extend(std::iter::repeat(b' ').take(2000));
    let run = dissect(data);
    assert!(run.ok);
    assert!(run.diag.contains("outside the last 1024"), "{}", dump(&run.diag));
    assert_eq!(run.engine.document().unwrap().objects.len(), 1);
}

#[test]
fn file_too_short_for_a_trailer_fails() {
    let run = dissect(b"%PDF-1.4\n%%EOF\n".to_vec());
    assert!(!run.ok);
    assert_eq!(run.diag.errors().count(), 1, "{}", dump(&run.diag));
    assert!(run.tree.root().is_some());
}
