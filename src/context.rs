//! Application context for a serving process.
//!
//! Built once at startup from an opened store and passed by reference into
//! request handlers. One mutex guards the store and the calendar aggregate;
//! every access path that touches the header list goes through it. The tile
//! engine's point buffers are immutable after construction and render
//! without locking. Offline mutation (`add`) runs on a separate command
//! path, never concurrently with a serving context.

use std::sync::{Mutex, MutexGuard};

use crate::calendar::{Calendar, WeekTotals, YearWeek};
use crate::error::Result;
use crate::profile::elevation_profile;
use crate::store::{self, DiskStore, Direction, Store, Totals};
use crate::tiles::{png_bytes, TileEngine, TileMode};
use crate::{AtlasError, Header, Record};

struct CoreState {
    store: DiskStore,
    calendar: Calendar,
}

/// Store, calendar and tile buffers bundled for concurrent read-only
/// serving.
pub struct AppContext {
    state: Mutex<CoreState>,
    tiles: TileEngine,
}

impl AppContext {
    /// Build the derived state (calendar, tile buffers) and wrap the store.
    /// Everything decoded here is decoded exactly once per process life.
    pub fn new(store: DiskStore) -> AppContext {
        let calendar = Calendar::build(&store);
        let tiles = TileEngine::build(&store);
        AppContext {
            state: Mutex::new(CoreState { store, calendar }),
            tiles,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CoreState> {
        self.state.lock().unwrap()
    }

    /// Whole-store sums for the index page.
    pub fn totals(&self) -> Totals {
        store::totals(&self.lock().store)
    }

    /// One-line listing for an activity id.
    pub fn header_line(&self, id: i64) -> Result<String> {
        Ok(self.lock().store.find_header(id)?.to_string())
    }

    /// The race ledger.
    pub fn races(&self) -> Vec<crate::Race> {
        self.lock().store.races().to_vec()
    }

    /// All headers, positional order.
    pub fn headers(&self) -> Vec<Header> {
        let state = self.lock();
        (0..state.store.len())
            .map(|i| *state.store.header(i))
            .collect()
    }

    /// Headers of activities passing through the given degree bounding box
    /// (north, south, west, east). Activities without decodable samples
    /// drop out, matching the record-filter contract.
    pub fn headers_in_rect(&self, n: f64, s: f64, w: f64, e: f64) -> Vec<Header> {
        let state = self.lock();
        let view = store::filter_records(&state.store, |rec| {
            rec.track()
                .iter()
                .any(|&(la, lo)| la <= n && la >= s && lo >= w && lo <= e)
        });
        (0..view.len()).map(|i| *view.header(i)).collect()
    }

    /// The full decoded record, serde-ready for the JSON endpoint.
    pub fn record(&self, id: i64) -> Result<Record> {
        self.lock().store.find_record(id)
    }

    /// Valid (lat, lon) degree pairs for client-side track rendering.
    pub fn track(&self, id: i64) -> Result<Vec<(f64, f64)>> {
        Ok(self.lock().store.find_record(id)?.track())
    }

    /// Previous/next activity id in store order.
    pub fn neighbor(&self, id: i64, dir: Direction) -> Option<i64> {
        store::neighbor(&self.lock().store, id, dir)
    }

    /// Weekly calendar sums, oldest week first.
    pub fn weekly_totals(&self) -> Vec<(YearWeek, WeekTotals)> {
        self.lock()
            .calendar
            .weeks
            .iter()
            .map(|w| (w.year_week, w.totals()))
            .collect()
    }

    /// The weekly training-volume strip as PNG.
    pub fn calendar_strip_png(&self) -> Option<Vec<u8>> {
        self.lock().calendar.strip().map(|img| png_bytes(&img))
    }

    /// The elevation profile of one activity as PNG.
    pub fn elevation_profile_png(&self, id: i64) -> Result<Vec<u8>> {
        let rec = self.lock().store.find_record(id)?;
        match elevation_profile(&rec) {
            Some(img) => Ok(png_bytes(&img)),
            None => Err(AtlasError::NotFound { start: id }),
        }
    }

    /// Render a map tile. Lock-free: the point buffers are immutable.
    pub fn tile_png(&self, mode: TileMode, zoom: u32, x: u32, y: u32) -> Vec<u8> {
        self.tiles.render_png(zoom, x, y, mode)
    }
}
