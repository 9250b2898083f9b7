//! # Track Atlas
//!
//! On-disk GPS activity log with web mercator tile rendering.
//!
//! This library provides:
//! - A binary record format for GPS-tracked activities (header + five
//!   parallel sample arrays) and its text index ledger
//! - A composable read-only store abstraction over the activity log
//! - A fixed-point web mercator projection at an implicit zoom level of 24
//! - A tile engine rendering 256x256 rasters in plain, grey and inferno modes
//! - Calendar, elevation-profile and proximity aggregations over the log
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use track_atlas::{AppContext, DiskStore, TileMode};
//!
//! let store = DiskStore::open("./db")?;
//! let ctx = AppContext::new(store);
//! let png = ctx.tile_png(TileMode::Inferno, 11, 1063, 675);
//! # Ok::<(), track_atlas::AtlasError>(())
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{AtlasError, Result};

// Semicircle units and web mercator projection
pub mod geo;
pub use geo::{degrees, project, to_semicircles, SENTINEL};

// Binary record blob layout
pub mod codec;
pub use codec::{decode, encode};

// Activity store: disk store, views, filters, aggregation
pub mod store;
pub use store::{
    filter_headers, filter_records, neighbor, totals, yearly, date_range, Direction, DiskStore,
    Store, Totals, View, YearTotals,
};

// Race ledger
pub mod races;
pub use races::Race;

// Tile engine
pub mod tiles;
pub use tiles::{TileEngine, TileMode, TILE_SIZE};

// ISO-week calendar aggregation
pub mod calendar;
pub use calendar::{Calendar, Week, WeekTotals, YearWeek};

// Elevation-vs-distance profile raster
pub mod profile;
pub use profile::elevation_profile;

// Great-circle proximity search
pub mod nearby;
pub use nearby::{distance_meters, near};

// FIT activity file ingestion
pub mod ingest;
pub use ingest::read_fit;

// Application context for a serving process
pub mod context;
pub use context::AppContext;

// ============================================================================
// Core Types
// ============================================================================

/// Activity type, stored on disk as a small unsigned code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityType {
    Run,
    Bike,
    Swim,
    /// Any code the log does not recognize; carried through unchanged.
    Other(u32),
}

impl ActivityType {
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => ActivityType::Run,
            2 => ActivityType::Bike,
            5 => ActivityType::Swim,
            other => ActivityType::Other(other),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            ActivityType::Run => 1,
            ActivityType::Bike => 2,
            ActivityType::Swim => 5,
            ActivityType::Other(code) => code,
        }
    }

    /// One-letter tag used in listings and the calendar.
    pub fn letter(self) -> char {
        match self {
            ActivityType::Run => 'R',
            ActivityType::Bike => 'B',
            ActivityType::Swim => 'S',
            ActivityType::Other(_) => '?',
        }
    }
}

/// Summary of one activity: a line of the index ledger.
///
/// `start` doubles as the activity's unique identifier across the store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// Unix time, seconds. Unique across the store.
    pub start: i64,
    /// Activity type code: 1 run, 2 bike, 5 swim.
    pub sport: u32,
    /// Total duration in seconds.
    pub seconds: f32,
    /// Total distance in meters.
    pub meters: f32,
    /// Number of per-sample records (0 for header-only entries).
    pub samples: u64,
}

impl Header {
    pub fn activity_type(&self) -> ActivityType {
        ActivityType::from_code(self.sport)
    }

    /// The entry written to the index ledger:
    /// `start type seconds meters samples`, whitespace separated.
    pub fn index_line(&self) -> String {
        format!(
            "{} {} {} {} {}",
            self.start, self.sport, self.seconds, self.meters, self.samples
        )
    }

    /// Parse one index ledger line. The caller supplies file/line context.
    pub fn parse_index_line(s: &str) -> std::result::Result<Header, String> {
        let v: Vec<&str> = s.split_whitespace().collect();
        if v.len() != 5 {
            return Err(format!("expected 5 fields (not {})", v.len()));
        }
        let start = v[0].parse::<i64>().map_err(|_| "parse start".to_string())?;
        let sport = v[1].parse::<u32>().map_err(|_| "parse type".to_string())?;
        let seconds = v[2]
            .parse::<f32>()
            .map_err(|_| "parse seconds".to_string())?;
        let meters = v[3].parse::<f32>().map_err(|_| "parse meters".to_string())?;
        let samples = v[4].parse::<u64>().map_err(|_| "parse samples".to_string())?;
        Ok(Header {
            start,
            sport,
            seconds,
            meters,
            samples,
        })
    }
}

impl fmt::Display for Header {
    /// List line: id, sport letter, local date, duration, km.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let date = chrono::DateTime::from_timestamp(self.start, 0)
            .map(|d| d.format("%Y.%m.%dT%H:%M:%S").to_string())
            .unwrap_or_else(|| "?".to_string());
        let hh = (self.seconds / 3600.0) as i32;
        let mm = (self.seconds / 60.0) as i32 - hh * 60;
        let ss = self.seconds as i32 - hh * 3600 - mm * 60;
        write!(
            f,
            "{} {} {} {:02}:{:02}:{:02} {:6.2}",
            self.start,
            self.activity_type().letter(),
            date,
            hh,
            mm,
            ss,
            self.meters / 1000.0
        )
    }
}

/// One activity: header plus five parallel sample sequences, each exactly
/// `header.samples` long.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(flatten)]
    pub header: Header,
    /// Seconds since `header.start`.
    pub time: Vec<f32>,
    /// Cumulative meters.
    pub dist: Vec<f32>,
    /// Meters; NaN for unknown.
    pub alt: Vec<f32>,
    /// Semicircles; `SENTINEL` when the sample has no fix.
    pub lat: Vec<i32>,
    /// Semicircles; sentinel paired with `lat`.
    pub lon: Vec<i32>,
}

impl Record {
    /// Full-range mercator projection of every sample with a valid fix,
    /// in sample order. Invalid samples are skipped.
    pub fn mercator_points(&self) -> Vec<(u32, u32)> {
        self.lat
            .iter()
            .zip(&self.lon)
            .filter_map(|(&la, &lo)| geo::project(la, lo))
            .collect()
    }

    /// Degree (lat, lon) pairs of every sample with a valid fix, for
    /// client-side rendering.
    pub fn track(&self) -> Vec<(f64, f64)> {
        self.lat
            .iter()
            .zip(&self.lon)
            .filter_map(|(&la, &lo)| {
                let (la, lo) = (geo::degrees(la), geo::degrees(lo));
                if la.is_nan() || lo.is_nan() {
                    None
                } else {
                    Some((la, lo))
                }
            })
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
