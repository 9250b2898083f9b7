//! Activity store: the index ledger, record blobs and composable views.
//!
//! A store directory holds `index.txt` (append-only text ledger, one header
//! per line) and one binary blob per activity with samples, named by the
//! decimal start timestamp. `DiskStore` owns the directory; `View` is a
//! read-only index-remapping projection that borrows its parent and can wrap
//! another view, so filters compose without copying data.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike};
use serde::Serialize;

use crate::codec;
use crate::error::{AtlasError, Result};
use crate::races::{self, Race};
use crate::{ActivityType, Header, Record};

const INDEX_FILE: &str = "index.txt";
const RACE_FILE: &str = "race.txt";

/// Read-only positional access shared by the physical store and its views.
///
/// Implementors expose an ordered sequence of headers; `record` materializes
/// the full sample arrays for one position. `Sync` is part of the contract:
/// a store is shared read-only across concurrent request workers.
pub trait Store: Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn header(&self, i: usize) -> &Header;

    /// Decode the record at position `i`. Positions with `samples == 0`
    /// have no blob and yield a not-found error.
    fn record(&self, i: usize) -> Result<Record>;

    /// Race ledger; empty on views.
    fn races(&self) -> &[Race] {
        &[]
    }

    /// Linear scan for the header whose start equals `start`.
    fn find_header(&self, start: i64) -> Result<&Header> {
        for i in 0..self.len() {
            let h = self.header(i);
            if h.start == start {
                return Ok(h);
            }
        }
        Err(AtlasError::NotFound { start })
    }

    /// Linear scan for the record whose start equals `start`.
    fn find_record(&self, start: i64) -> Result<Record> {
        for i in 0..self.len() {
            if self.header(i).start == start {
                return self.record(i);
            }
        }
        Err(AtlasError::NotFound { start })
    }
}

// ============================================================================
// Disk Store
// ============================================================================

/// The physical store: in-memory header index rebuilt from the ledger on
/// open, blobs read on demand.
#[derive(Debug)]
pub struct DiskStore {
    dir: PathBuf,
    index: Vec<Header>,
    races: Vec<Race>,
}

impl DiskStore {
    /// Open a store directory. The ledger must exist and parse in full; a
    /// malformed line aborts with a `path:line:` error. Ledger order is the
    /// store's positional order.
    pub fn open(dir: impl Into<PathBuf>) -> Result<DiskStore> {
        let dir = dir.into();
        let path = dir.join(INDEX_FILE);
        let text = fs::read_to_string(&path)?;
        let mut index = Vec::new();
        for (i, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let h = Header::parse_index_line(line).map_err(|message| AtlasError::Parse {
                file: path.clone(),
                line: i + 1,
                message,
            })?;
            index.push(h);
        }
        let races = races::read_races_file(&dir.join(RACE_FILE))?;
        Ok(DiskStore { dir, index, races })
    }

    /// Create an empty store directory (empty ledger, no blobs).
    pub fn create(dir: impl Into<PathBuf>) -> Result<DiskStore> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(INDEX_FILE), b"")?;
        Ok(DiskStore {
            dir,
            index: Vec::new(),
            races: Vec::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    fn blob_path(&self, start: i64) -> PathBuf {
        self.dir.join(start.to_string())
    }

    /// Append one activity. Fails with a duplicate-key error (ledger
    /// untouched) when the start timestamp already exists. The ledger line
    /// is appended and synced before the blob write; a blob failure after
    /// that leaves a header with no blob, surfaced to the caller and not
    /// rolled back.
    pub fn add(&mut self, rec: &Record) -> Result<()> {
        for h in &self.index {
            if h.start == rec.header.start {
                return Err(AtlasError::Duplicate {
                    start: rec.header.start,
                });
            }
        }
        let mut fp = OpenOptions::new()
            .append(true)
            .create(true)
            .open(self.index_path())?;
        writeln!(fp, "{}", rec.header.index_line())?;
        fp.sync_all()?;
        self.index.push(rec.header);
        if rec.header.samples == 0 {
            return Ok(());
        }
        fs::write(self.blob_path(rec.header.start), codec::encode(rec))?;
        Ok(())
    }
}

impl Store for DiskStore {
    fn len(&self) -> usize {
        self.index.len()
    }

    fn header(&self, i: usize) -> &Header {
        &self.index[i]
    }

    fn record(&self, i: usize) -> Result<Record> {
        let h = &self.index[i];
        if h.samples == 0 {
            return Err(AtlasError::NotFound { start: h.start });
        }
        let buf = fs::read(self.blob_path(h.start))?;
        codec::decode(&buf)
    }

    fn races(&self) -> &[Race] {
        &self.races
    }
}

// ============================================================================
// Views
// ============================================================================

/// A read-only subset of a parent store's positions, in parent order.
/// Borrows its parent; wrap a view in another view to compose filters.
pub struct View<'a> {
    parent: &'a dyn Store,
    map: Vec<usize>,
}

impl Store for View<'_> {
    fn len(&self) -> usize {
        self.map.len()
    }

    fn header(&self, i: usize) -> &Header {
        self.parent.header(self.map[i])
    }

    fn record(&self, i: usize) -> Result<Record> {
        self.parent.record(self.map[i])
    }
}

/// View of the positions whose decoded record satisfies the predicate.
/// Positions that fail to decode (including zero-sample entries) are
/// silently excluded.
pub fn filter_records<'a>(
    parent: &'a dyn Store,
    pred: impl Fn(&Record) -> bool,
) -> View<'a> {
    let mut map = Vec::new();
    for i in 0..parent.len() {
        if let Ok(rec) = parent.record(i) {
            if pred(&rec) {
                map.push(i);
            }
        }
    }
    View { parent, map }
}

/// View of the positions whose header satisfies the predicate.
pub fn filter_headers<'a>(
    parent: &'a dyn Store,
    pred: impl Fn(&Header) -> bool,
) -> View<'a> {
    let mut map = Vec::new();
    for i in 0..parent.len() {
        if pred(parent.header(i)) {
            map.push(i);
        }
    }
    View { parent, map }
}

/// Inclusive membership test on the start timestamp, for `filter_headers`.
pub fn date_range(start: i64, end: i64) -> impl Fn(&Header) -> bool {
    move |h| h.start >= start && h.start <= end
}

// ============================================================================
// Aggregation
// ============================================================================

/// Whole-store sums.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Totals {
    pub activities: usize,
    pub seconds: f64,
    pub km: f64,
    pub samples: u64,
}

pub fn totals(store: &dyn Store) -> Totals {
    let mut t = Totals {
        activities: store.len(),
        ..Default::default()
    };
    for i in 0..store.len() {
        let h = store.header(i);
        t.seconds += h.seconds as f64;
        t.km += h.meters as f64 / 1000.0;
        t.samples += h.samples;
    }
    t
}

/// Per-year sums, run and bike km split out.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct YearTotals {
    pub year: i32,
    pub run_km: f64,
    pub bike_km: f64,
    pub hours: f64,
}

/// One entry per calendar year from the earliest to the latest activity,
/// zero-filled for years with no entries.
pub fn yearly(store: &dyn Store) -> Vec<YearTotals> {
    use std::collections::BTreeMap;

    let mut by_year: BTreeMap<i32, YearTotals> = BTreeMap::new();
    let (mut y0, mut y1) = (i32::MAX, i32::MIN);
    for i in 0..store.len() {
        let h = store.header(i);
        let Some(d) = DateTime::from_timestamp(h.start, 0) else {
            continue;
        };
        let y = d.year();
        y0 = y0.min(y);
        y1 = y1.max(y);
        let e = by_year.entry(y).or_insert(YearTotals {
            year: y,
            ..Default::default()
        });
        e.hours += h.seconds as f64 / 3600.0;
        match h.activity_type() {
            ActivityType::Run => e.run_km += h.meters as f64 / 1000.0,
            ActivityType::Bike => e.bike_km += h.meters as f64 / 1000.0,
            _ => {}
        }
    }
    if y0 > y1 {
        return Vec::new();
    }
    (y0..=y1)
        .map(|year| {
            by_year.get(&year).copied().unwrap_or(YearTotals {
                year,
                ..Default::default()
            })
        })
        .collect()
}

/// Neighbor navigation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Prev,
    Next,
}

/// Start of the previous/next activity in positional order. Clamps to the
/// same id at the ends; `None` when `start` is not in the store.
pub fn neighbor(store: &dyn Store, start: i64, dir: Direction) -> Option<i64> {
    let n = store.len();
    for i in 0..n {
        if store.header(i).start == start {
            let j = match dir {
                Direction::Prev => i.saturating_sub(1),
                Direction::Next => (i + 1).min(n - 1),
            };
            return Some(store.header(j).start);
        }
    }
    None
}
