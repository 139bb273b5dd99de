use super::{dissect, dissect_fetch_all};
use crate::common::cbff::{biff_record, minimal_workbook, CbffBuilder, CbffImage, MINI_SECTOR, SECTOR};
use crate::common::{dump, expect_path};
use docdissect::{ByteRange, DiagnosticKind};

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn clean_file_builds_every_stage() {
    let image = CbffBuilder::new()
        .stream("Workbook", minimal_workbook())
        .stream("Data", pattern(5000))
        .build();
    let run = dissect(&image);
    assert!(run.ok);
    assert_eq!(run.diag.warnings().count(), 0, "{}", dump(&run.diag));
    assert_eq!(run.diag.errors().count(), 0, "{}", dump(&run.diag));

    let root = run.tree.root().unwrap();
    assert_eq!(
        run.tree.child_labels(root),
        vec!["Header", "FAT", "MiniFAT", "Directory", "Root"]
    );
    let dir_root = expect_path(&run.tree, &["Compound Binary File", "Root"]);
    assert_eq!(run.tree.child_labels(dir_root), vec!["Workbook", "Data"]);
    expect_path(&run.tree, &["Compound Binary File", "FAT", "FAT sector # 0"]);

    // only the workbook stream was wanted
    assert!(run.stream("Workbook").is_loaded());
    assert!(!run.stream("Data").is_loaded());
}

#[test]
fn well_formed_chain_visits_every_sector() {
    let image = CbffBuilder::new().stream("Data", pattern(8 * SECTOR)).build();
    let run = dissect_fetch_all(&image);
    assert!(run.diag.is_empty(), "{}", dump(&run.diag));

    let s = run.stream("Data");
    assert_eq!(s.chunk_offsets.len(), 8);
    let expected: Vec<u64> = image
        .layout("Data")
        .chain
        .iter()
        .map(|&c| CbffImage::sector_offset(c) as u64)
        .collect();
    assert_eq!(s.chunk_offsets, expected);
    assert_eq!(s.bytes(), &pattern(8 * SECTOR)[..]);
}

#[test]
fn fat_loop_ends_the_walk_with_one_diagnostic() {
    let mut image = CbffBuilder::new().stream("Data", pattern(10 * SECTOR)).build();
    let chain = image.layout("Data").chain.clone();
    image.set_fat(chain[2], chain[0]);

    let run = dissect_fetch_all(&image);
    assert_eq!(run.diag.count(DiagnosticKind::CycleDetected), 1, "{}", dump(&run.diag));
    let s = run.stream("Data");
    assert_eq!(s.bytes().len(), 3 * SECTOR);
    assert!(run.diag.contains(&format!("{} bytes remaining", 7 * SECTOR)));
}

#[test]
fn out_of_range_fat_entry_truncates() {
    let mut image = CbffBuilder::new().stream("Data", pattern(5 * SECTOR)).build();
    let chain = image.layout("Data").chain.clone();
    image.set_fat(chain[0], 50_000);

    let run = dissect_fetch_all(&image);
    assert_eq!(run.stream("Data").bytes().len(), SECTOR);
    assert!(run.diag.errors().count() >= 1, "{}", dump(&run.diag));
    assert!(run.diag.contains(&format!("{} bytes remaining", 4 * SECTOR)));
    assert_eq!(run.diag.count(DiagnosticKind::CycleDetected), 0);
}

#[test]
fn mini_cutoff_boundary_routes_by_size() {
    let image = CbffBuilder::new()
        .stream("Below", pattern(4095))
        .stream("AtCutoff", pattern(4096))
        .build();
    let run = dissect_fetch_all(&image);
    assert!(run.diag.is_empty(), "{}", dump(&run.diag));

    let below = run.stream("Below");
    assert_eq!(below.chunk_size, MINI_SECTOR as u64);
    assert_eq!(below.chunk_offsets.len(), 64);
    assert_eq!(below.bytes(), &pattern(4095)[..]);

    let at = run.stream("AtCutoff");
    assert_eq!(at.chunk_size, SECTOR as u64);
    assert_eq!(at.chunk_offsets.len(), 8);
    assert_eq!(at.bytes(), &pattern(4096)[..]);
}

#[test]
fn mini_stream_offsets_map_into_container_sectors() {
    let image = CbffBuilder::new()
        .stream("First", pattern(100))
        .stream("Second", pattern(200))
        .build();
    let run = dissect_fetch_all(&image);
    let base = CbffImage::sector_offset(image.mini_stream_sectors[0]) as u64;

    // First occupies mini sectors 0-1, Second starts at mini sector 2
    let second = run.stream("Second");
    assert_eq!(second.file_offset(0), Some(base + 2 * MINI_SECTOR as u64));
    assert_eq!(second.file_offset(70), Some(base + 3 * MINI_SECTOR as u64 + 6));
    assert_eq!(second.file_offset(200), None);
    assert_eq!(
        second.file_ranges(0, 200),
        vec![ByteRange::new(base + 2 * MINI_SECTOR as u64, 200)]
    );
}

#[test]
fn scattered_stream_yields_one_range_per_run() {
    let image = CbffBuilder::new()
        .stream("Data", pattern(9 * SECTOR))
        .scatter()
        .build();
    let chain = image.layout("Data").chain.clone();
    assert_eq!(chain[1], chain[0] + 2);

    let run = dissect_fetch_all(&image);
    assert!(run.diag.is_empty(), "{}", dump(&run.diag));
    let s = run.stream("Data");
    let at = |i: usize| CbffImage::sector_offset(chain[i]) as u64;
    assert_eq!(
        s.file_ranges(0, 2 * SECTOR as u64),
        vec![ByteRange::new(at(0), 512), ByteRange::new(at(1), 512)]
    );
    assert_eq!(
        s.file_ranges(500, 24),
        vec![ByteRange::new(at(0) + 500, 12), ByteRange::new(at(1), 12)]
    );
    assert_eq!(s.file_ranges(10, 20), vec![ByteRange::new(at(0) + 10, 20)]);
}

#[test]
fn contiguous_stream_merges_ranges() {
    let image = CbffBuilder::new().stream("Data", pattern(9 * SECTOR)).build();
    let run = dissect_fetch_all(&image);
    let s = run.stream("Data");
    let start = CbffImage::sector_offset(image.layout("Data").chain[0]) as u64;
    assert_eq!(
        s.file_ranges(0, 3 * SECTOR as u64),
        vec![ByteRange::new(start, 3 * SECTOR as u64)]
    );
}

#[test]
fn workbook_record_spanning_scattered_sectors_has_two_ranges() {
    let mut data = Vec::new();
    while data.len() < 4 * 1024 + 600 {
        data.extend(biff_record(0x0001, &[0u8; 596]));
    }
    let image = CbffBuilder::new().stream("Workbook", data).scatter().build();
    let chain = image.layout("Workbook").chain.clone();

    let run = dissect(&image);
    assert!(run.diag.is_empty(), "{}", dump(&run.diag));
    let stream = expect_path(&run.tree, &["Compound Binary File", "Root", "Workbook"]);
    let first = run.tree.children(stream)[0];
    assert_eq!(
        run.tree.ranges(first),
        &[
            ByteRange::new(CbffImage::sector_offset(chain[0]) as u64, 512),
            ByteRange::new(CbffImage::sector_offset(chain[1]) as u64, 88),
        ]
    );
}

#[test]
fn missing_fat_sectors_truncate_the_table() {
    let mut image = CbffBuilder::new().stream("Data", pattern(5000)).build();
    image.set_header_u32(0x2C, 2);
    let run = dissect(&image);
    assert!(run.ok);
    assert!(run.diag.contains("Only found 1 of 2 FAT sectors"), "{}", dump(&run.diag));
}

#[test]
fn declared_dif_sectors_are_reported_as_unsupported() {
    let mut image = CbffBuilder::new().stream("Workbook", minimal_workbook()).build();
    image.set_header_u32(0x48, 1);
    let run = dissect(&image);
    assert!(run.ok);
    assert_eq!(run.diag.count(DiagnosticKind::Unsupported), 1);
    expect_path(&run.tree, &["Compound Binary File", "Root", "Workbook"]);
}
