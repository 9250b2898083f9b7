//! Store integration scenarios.
//!
//! Drives the full pipeline on a temp directory: add -> reopen -> decode ->
//! project -> render, including the zero-sample and no-fix edge cases.

use tempfile::TempDir;
use track_atlas::{
    filter_headers, date_range, AppContext, AtlasError, DiskStore, Header, Record, Store,
    TileEngine, TileMode, SENTINEL,
};

fn record(start: i64, sport: u32, samples: u64) -> Record {
    let n = samples as usize;
    Record {
        header: Header {
            start,
            sport,
            seconds: 3600.0,
            meters: 10000.0,
            samples,
        },
        time: (0..n).map(|i| i as f32).collect(),
        dist: (0..n).map(|i| 10.0 * i as f32).collect(),
        alt: (0..n).map(|i| 100.0 + i as f32).collect(),
        lat: vec![100_000_000; n],
        lon: vec![200_000_000; n],
    }
}

/// The canonical two-activity scenario: a run with one valid and one no-fix
/// sample, and a header-only bike entry.
fn seeded_store() -> (DiskStore, TempDir) {
    let _ = env_logger::builder().is_test(true).try_init();
    let tmp = TempDir::new().expect("failed to create temp dir");
    let mut store = DiskStore::create(tmp.path()).expect("failed to create store");

    let mut run = record(1000, 1, 2);
    run.lat[1] = SENTINEL;
    run.lon[1] = SENTINEL;
    store.add(&run).expect("failed to add run");

    store.add(&record(2000, 2, 0)).expect("failed to add bike");
    (store, tmp)
}

#[test]
fn test_end_to_end_scenario() {
    let (store, tmp) = seeded_store();
    drop(store);

    // Reopen from disk; ledger order is positional order.
    let store = DiskStore::open(tmp.path()).expect("failed to reopen store");
    assert_eq!(store.len(), 2);

    // The run decodes to exactly one valid projected point.
    let run = store.record(0).expect("run must decode");
    assert_eq!(run.header.samples, 2);
    assert_eq!(run.mercator_points().len(), 1);

    // The zero-sample bike entry has no blob.
    match store.record(1) {
        Err(AtlasError::NotFound { start }) => assert_eq!(start, 2000),
        other => panic!("expected not-found, got {:?}", other.map(|r| r.header)),
    }
}

#[test]
fn test_reopened_store_serves_identical_record() {
    let (store, tmp) = seeded_store();
    let before = store.find_record(1000).unwrap();
    drop(store);

    let store = DiskStore::open(tmp.path()).unwrap();
    let after = store.find_record(1000).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_duplicate_add_after_reopen() {
    let (store, tmp) = seeded_store();
    drop(store);

    let mut store = DiskStore::open(tmp.path()).unwrap();
    let lines = std::fs::read_to_string(tmp.path().join("index.txt"))
        .unwrap()
        .lines()
        .count();
    assert!(matches!(
        store.add(&record(1000, 1, 1)),
        Err(AtlasError::Duplicate { start: 1000 })
    ));
    let lines_after = std::fs::read_to_string(tmp.path().join("index.txt"))
        .unwrap()
        .lines()
        .count();
    assert_eq!(lines, lines_after);
}

#[test]
fn test_tile_engine_over_store() {
    let (store, _tmp) = seeded_store();

    let engine = TileEngine::build(&store);
    // One valid run sample; the no-fix sample and the empty bike drop out.
    assert_eq!(engine.point_count(), 1);

    // The single point lands in the zoom-0 world tile.
    let img = engine.render(0, 0, 0, TileMode::Plain);
    assert_eq!(img.pixels().filter(|p| p.0[3] != 0).count(), 1);
}

#[test]
fn test_filtered_view_feeds_engine() {
    let (mut store, _tmp) = seeded_store();
    store.add(&record(3000, 1, 3)).unwrap();

    let early = filter_headers(&store, date_range(0, 1500));
    assert_eq!(early.len(), 1);
    let engine = TileEngine::build(&early);
    assert_eq!(engine.point_count(), 1);
}

#[test]
fn test_context_over_scenario_store() {
    let (store, _tmp) = seeded_store();
    let ctx = AppContext::new(store);

    let totals = ctx.totals();
    assert_eq!(totals.activities, 2);
    assert_eq!(totals.samples, 2);

    let track = ctx.track(1000).unwrap();
    assert_eq!(track.len(), 1);

    let png = ctx.tile_png(TileMode::Inferno, 11, 1063, 675);
    assert_eq!(&png[..4], &[0x89, 0x50, 0x4E, 0x47]);
}
