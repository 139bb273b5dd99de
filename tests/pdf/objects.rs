use super::{dissect, dissect_with};
use crate::common::pdf::{classic, deflate, png_up};
use crate::common::{dump, expect_path};
use docdissect::config::PdfConfig;
use docdissect::formats::pdf::{ObjectKey, PdfObject};
use docdissect::DiagnosticKind;

fn first_stream(run: &super::Run, number: u32) -> Vec<u8> {
    let doc = run.engine.document().unwrap();
    let obj = doc.object(ObjectKey::new(number, 0)).unwrap();
    obj.stream.as_ref().unwrap().data.clone()
}

#[test]
fn catalog_dictionary_has_two_entries() {
    let run = dissect(classic(&["<< /Type /Catalog /Count 3 >>"]));
    assert!(run.diag.is_empty(), "{}", dump(&run.diag));
    let doc = run.engine.document().unwrap();
    let dict = doc.object(ObjectKey::new(1, 0)).unwrap().dict.as_ref().unwrap();
    assert_eq!(dict.len(), 2);
    assert_eq!(dict.name("Type"), Some("Catalog"));
    assert_eq!(dict.integer("Count"), Some(3));

    let obj = expect_path(&run.tree, &["Portable Document", "Indirect Objects", "Object 1 0"]);
    assert!(run.tree.ranges(obj)[0].length > 0);
}

#[test]
fn nested_values_and_references() {
    let run = dissect(classic(&[
        "<< /Kids [2 0 R] /Nested << /A [ [1 2.5] (lit) <414> ] >> >>",
        "<< /Type /Page >>",
    ]));
    assert!(run.diag.is_empty(), "{}", dump(&run.diag));
    let doc = run.engine.document().unwrap();
    let root = doc.object(ObjectKey::new(1, 0)).unwrap().dict.as_ref().unwrap();

    let kids = root.get("Kids").and_then(|k| k.as_array()).unwrap();
    let page = doc.resolve(&kids[0]).unwrap();
    assert_eq!(page.dict.as_ref().unwrap().name("Type"), Some("Page"));

    let nested = root.get("Nested").and_then(|n| n.as_dict()).unwrap();
    let a = nested.get("A").and_then(|a| a.as_array()).unwrap();
    assert_eq!(
        a[0],
        PdfObject::Array(vec![PdfObject::Integer(1), PdfObject::Real(2.5)])
    );
    assert_eq!(a[1], PdfObject::LiteralString(b"lit".to_vec()));
    // odd digit count pads with zero
    assert_eq!(a[2], PdfObject::HexString(vec![0x41, 0x40]));
}

#[test]
fn bare_values_are_kept() {
    let run = dissect(classic(&["<< /Type /Catalog >>", "42", "(just text)"]));
    assert!(run.diag.is_empty(), "{}", dump(&run.diag));
    let doc = run.engine.document().unwrap();
    assert_eq!(
        doc.object(ObjectKey::new(2, 0)).unwrap().object,
        Some(PdfObject::Integer(42))
    );
    assert!(doc.object(ObjectKey::new(3, 0)).unwrap().dict.is_none());
}

#[test]
fn correct_stream_length_is_trusted() {
    let run = dissect(classic(&["<< /Length 5 >>\nstream\nabcde\nendstream"]));
    assert!(run.diag.is_empty(), "{}", dump(&run.diag));
    assert_eq!(first_stream(&run, 1), b"abcde");
}

#[test]
fn indirect_stream_length_is_resolved() {
    let run = dissect(classic(&["<< /Length 2 0 R >>\nstream\nabcde\nendstream", "5"]));
    assert!(run.diag.is_empty(), "{}", dump(&run.diag));
    assert_eq!(first_stream(&run, 1), b"abcde");
}

#[test]
fn missing_length_falls_back_to_a_scan() {
    let run = dissect(classic(&["<< /Type /Blob >>\nstream\nabcde\nendstream"]));
    assert_eq!(run.diag.count(DiagnosticKind::Heuristic), 1, "{}", dump(&run.diag));
    assert!(run.diag.contains("does not contain \"Length\" key"));
    assert_eq!(first_stream(&run, 1), b"abcde");
}

#[test]
fn wrong_length_falls_back_to_a_scan() {
    let run = dissect(classic(&["<< /Length 3 >>\nstream\nabcde\nendstream"]));
    assert_eq!(run.diag.count(DiagnosticKind::Heuristic), 1, "{}", dump(&run.diag));
    assert!(run.diag.contains("does not end at endstream"));
    assert_eq!(first_stream(&run, 1), b"abcde");
}

#[test]
fn unchecked_length_is_taken_as_declared() {
    let config = PdfConfig {
        verify_stream_length: false,
        ..PdfConfig::default()
    };
    let run = dissect_with(
        classic(&["<< /Length 3 >>\nstream\nabcde\nendstream"]),
        config,
    );
    assert_eq!(run.diag.count(DiagnosticKind::Heuristic), 0, "{}", dump(&run.diag));
    assert_eq!(first_stream(&run, 1), b"abc");
}

#[test]
fn flate_stream_with_png_predictor_is_decoded() {
    let rows = vec![vec![1u8, 2, 3, 4], vec![5, 6, 7, 8], vec![9, 10, 11, 12]];
    let payload = deflate(&png_up(&rows));
    let mut body = format!(
        "<< /Filter /FlateDecode /DecodeParms << /Predictor 12 /Columns 4 >> /Length {} >>\nstream\n",
        payload.len()
    )
    .into_bytes();
    body.extend_from_slice(&payload);
    body.extend_from_slice(b"\nendstream");

    let mut b = crate::common::pdf::PdfBuilder::new("1.7");
    b.object(&body);
    let run = dissect(b.finish(""));
    assert!(run.diag.is_empty(), "{}", dump(&run.diag));

    let doc = run.engine.document().unwrap();
    let stream = doc.object(ObjectKey::new(1, 0)).unwrap().stream.as_ref().unwrap();
    let decoded = stream.decoded().unwrap();
    assert!(decoded.complete);
    assert_eq!(decoded.data, rows.concat());
    expect_path(
        &run.tree,
        &[
            "Portable Document",
            "Indirect Objects",
            "Object 1 0",
            "Stream Data",
            "Decoded Length: 12",
        ],
    );
}

#[test]
fn unsupported_filter_keeps_raw_bytes() {
    let run = dissect(classic(&[
        "<< /Filter /ASCIIHexDecode /Length 4 >>\nstream\n4142\nendstream",
    ]));
    assert_eq!(run.diag.count(DiagnosticKind::Unsupported), 1, "{}", dump(&run.diag));
    assert!(run.diag.contains("Unsupported filter ASCIIHexDecode"));
    assert_eq!(first_stream(&run, 1), b"4142");
}

#[test]
fn nesting_beyond_the_limit_is_cut() {
    let config = PdfConfig {
        max_nesting_depth: 4,
        ..PdfConfig::default()
    };
    let run = dissect_with(classic(&["[[[[[[1]]]]]]"]), config);
    assert_eq!(run.diag.count(DiagnosticKind::RecursionLimit), 1, "{}", dump(&run.diag));
    assert!(run.diag.contains("did not parse cleanly"));
}

#[test]
fn unbalanced_containers_are_reported() {
    let run = dissect(classic(&["<< /A [1 2 >>", "<< /B 1 >> >>"]));
    assert!(run.diag.warnings().count() >= 2, "{}", dump(&run.diag));
    assert!(run.diag.contains("Spurious"));
    // the second object still parses its dictionary
    let doc = run.engine.document().unwrap();
    let second = doc.object(ObjectKey::new(2, 0)).unwrap();
    assert_eq!(second.dict.as_ref().unwrap().integer("B"), Some(1));
}

#[test]
fn object_number_mismatch_warns() {
    let mut data = classic(&["<< /Type /Catalog >>"]);
    let at = data.windows(7).position(|w| w == b"1 0 obj").unwrap();
    data[at] = b'7';
    let run = dissect(data);
    assert!(run.diag.warnings().count() >= 1, "{}", dump(&run.diag));
    assert_eq!(run.engine.document().unwrap().objects.len(), 1);
}
