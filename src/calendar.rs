//! ISO-week calendar aggregation.
//!
//! Buckets every activity header into Monday-first day slots of a
//! chronological week list spanning the first to the last entry. The
//! calendar is a pure aggregate of the header index; it is rebuilt together
//! with the application context, never incrementally.

use std::array;
use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, Utc};
use image::RgbaImage;
use log::debug;

use crate::store::Store;
use crate::tiles::{BIKE_COLOR, RUN_COLOR, SWIM_COLOR};
use crate::{ActivityType, Header};

/// Width of the weekly strip raster: one pixel per whole training hour.
const STRIP_WIDTH: u32 = 50;

/// An ISO week key: (iso year, iso week number).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct YearWeek {
    pub year: i32,
    pub week: u32,
}

/// One calendar week: seven Monday-first day buckets of headers.
#[derive(Debug, Clone)]
pub struct Week {
    pub year_week: YearWeek,
    pub days: [Vec<Header>; 7],
}

/// Per-week sums.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WeekTotals {
    pub hours: f64,
    pub km: f64,
    pub run_km: f64,
    pub bike_km: f64,
    pub run_hours: f64,
    pub bike_hours: f64,
    pub swim_hours: f64,
}

impl Week {
    fn new(year_week: YearWeek) -> Week {
        Week {
            year_week,
            days: array::from_fn(|_| Vec::new()),
        }
    }

    pub fn totals(&self) -> WeekTotals {
        let mut t = WeekTotals::default();
        for day in &self.days {
            for h in day {
                let hours = h.seconds as f64 / 3600.0;
                let km = h.meters as f64 / 1000.0;
                t.hours += hours;
                t.km += km;
                match h.activity_type() {
                    ActivityType::Run => {
                        t.run_km += km;
                        t.run_hours += hours;
                    }
                    ActivityType::Bike => {
                        t.bike_km += km;
                        t.bike_hours += hours;
                    }
                    ActivityType::Swim => t.swim_hours += hours,
                    ActivityType::Other(_) => {}
                }
            }
        }
        t
    }
}

/// Chronological week list from the first to the last stored activity.
#[derive(Debug, Clone, Default)]
pub struct Calendar {
    pub weeks: Vec<Week>,
}

impl Calendar {
    /// Bucket every header of the store. Assumes the store is roughly
    /// chronological (the week span runs first entry to last entry);
    /// headers outside that span are skipped with a debug log.
    pub fn build(store: &dyn Store) -> Calendar {
        let n = store.len();
        if n == 0 {
            return Calendar::default();
        }
        let (Some(first), Some(last)) = (
            date(store.header(0).start),
            date(store.header(n - 1).start),
        ) else {
            return Calendar::default();
        };

        let mut weeks = Vec::new();
        let mut index = HashMap::new();
        let mut t = first;
        loop {
            let yw = year_week(t);
            index.insert(yw, weeks.len());
            weeks.push(Week::new(yw));
            if t > last {
                break;
            }
            t += Duration::days(7);
        }

        for i in 0..n {
            let h = *store.header(i);
            let Some(d) = date(h.start) else { continue };
            match index.get(&year_week(d)) {
                Some(&k) => weeks[k].days[weekday(d)].push(h),
                None => debug!("{}: outside calendar span, not bucketed", h.start),
            }
        }
        Calendar { weeks }
    }

    pub fn len(&self) -> usize {
        self.weeks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weeks.is_empty()
    }

    /// Whole-calendar sums.
    pub fn totals(&self) -> WeekTotals {
        let mut t = WeekTotals::default();
        for wk in &self.weeks {
            let w = wk.totals();
            t.hours += w.hours;
            t.km += w.km;
            t.run_km += w.run_km;
            t.bike_km += w.bike_km;
            t.run_hours += w.run_hours;
            t.bike_hours += w.bike_hours;
            t.swim_hours += w.swim_hours;
        }
        t
    }

    /// Weekly strip raster: one row per week, newest first, one pixel per
    /// whole hour, swim then bike then run. `None` for an empty calendar.
    pub fn strip(&self) -> Option<RgbaImage> {
        if self.weeks.is_empty() {
            return None;
        }
        let mut img = RgbaImage::new(STRIP_WIDTH, self.weeks.len() as u32);
        for (y, wk) in self.weeks.iter().rev().enumerate() {
            let t = wk.totals();
            let mut x = 0u32;
            for (hours, color) in [
                (t.swim_hours, SWIM_COLOR),
                (t.bike_hours, BIKE_COLOR),
                (t.run_hours, RUN_COLOR),
            ] {
                for _ in 0..hours.round() as u32 {
                    if x >= STRIP_WIDTH {
                        break;
                    }
                    img.put_pixel(x, y as u32, color);
                    x += 1;
                }
            }
        }
        Some(img)
    }
}

fn date(start: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(start, 0)
}

fn year_week(d: DateTime<Utc>) -> YearWeek {
    let iso = d.iso_week();
    YearWeek {
        year: iso.year(),
        week: iso.week(),
    }
}

/// Day slot 0..6, Monday first.
fn weekday(d: DateTime<Utc>) -> usize {
    d.weekday().num_days_from_monday() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DiskStore, Store};
    use crate::Record;
    use tempfile::TempDir;

    const DAY: i64 = 86_400;

    fn header_only(start: i64, sport: u32, seconds: f32, meters: f32) -> Record {
        Record {
            header: Header {
                start,
                sport,
                seconds,
                meters,
                samples: 0,
            },
            time: vec![],
            dist: vec![],
            alt: vec![],
            lat: vec![],
            lon: vec![],
        }
    }

    fn build_store(records: &[Record]) -> (DiskStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let mut store = DiskStore::create(tmp.path()).unwrap();
        for r in records {
            store.add(r).unwrap();
        }
        (store, tmp)
    }

    // 2020-01-06 is a Monday (ISO 2020-W02).
    const MONDAY: i64 = 1578268800;

    #[test]
    fn test_empty_store_gives_empty_calendar() {
        let (store, _tmp) = build_store(&[]);
        let cal = Calendar::build(&store);
        assert!(cal.is_empty());
        assert!(cal.strip().is_none());
    }

    #[test]
    fn test_day_bucketing_is_monday_first() {
        let (store, _tmp) = build_store(&[
            header_only(MONDAY, 1, 3600.0, 10000.0),
            header_only(MONDAY + 2 * DAY, 2, 7200.0, 60000.0), // Wednesday
            header_only(MONDAY + 6 * DAY, 5, 1800.0, 2000.0),  // Sunday
        ]);
        let cal = Calendar::build(&store);
        let first = &cal.weeks[0];
        assert_eq!(first.year_week, YearWeek { year: 2020, week: 2 });
        assert_eq!(first.days[0].len(), 1);
        assert_eq!(first.days[2].len(), 1);
        assert_eq!(first.days[6].len(), 1);
        assert_eq!(first.days[1].len(), 0);
    }

    #[test]
    fn test_weeks_span_first_to_last() {
        let (store, _tmp) = build_store(&[
            header_only(MONDAY, 1, 3600.0, 10000.0),
            header_only(MONDAY + 21 * DAY, 1, 3600.0, 10000.0), // three weeks later
        ]);
        let cal = Calendar::build(&store);
        assert!(cal.len() >= 4);
        assert_eq!(cal.weeks[0].days[0].len(), 1);
        assert_eq!(cal.weeks[3].days[0].len(), 1);
        // The weeks in between exist but are empty.
        assert_eq!(cal.weeks[1].totals(), WeekTotals::default());
    }

    #[test]
    fn test_week_totals_split_by_type() {
        let (store, _tmp) = build_store(&[
            header_only(MONDAY, 1, 3600.0, 10000.0),
            header_only(MONDAY + DAY, 2, 7200.0, 60000.0),
            header_only(MONDAY + 2 * DAY, 5, 1800.0, 2000.0),
        ]);
        let cal = Calendar::build(&store);
        let t = cal.weeks[0].totals();
        assert_eq!(t.run_km, 10.0);
        assert_eq!(t.bike_km, 60.0);
        assert_eq!(t.run_hours, 1.0);
        assert_eq!(t.bike_hours, 2.0);
        assert_eq!(t.swim_hours, 0.5);
        assert_eq!(t.hours, 3.5);
        assert_eq!(t.km, 72.0);
    }

    #[test]
    fn test_strip_rows_newest_first() {
        let (store, _tmp) = build_store(&[
            header_only(MONDAY, 1, 2.0 * 3600.0, 20000.0),
            header_only(MONDAY + 7 * DAY, 2, 3.0 * 3600.0, 90000.0),
        ]);
        let cal = Calendar::build(&store);
        let img = cal.strip().unwrap();
        assert_eq!(img.dimensions(), (STRIP_WIDTH, cal.len() as u32));
        // Rows run newest week first; the bike week sits above the run week.
        let bottom = cal.len() as u32 - 1; // oldest week: two run pixels
        assert_eq!(*img.get_pixel(0, bottom), RUN_COLOR);
        assert_eq!(*img.get_pixel(1, bottom), RUN_COLOR);
        assert_eq!(img.get_pixel(2, bottom).0[3], 0);
        let bike_row = bottom - 1; // the following week: three bike pixels
        assert_eq!(*img.get_pixel(0, bike_row), BIKE_COLOR);
        assert_eq!(*img.get_pixel(2, bike_row), BIKE_COLOR);
        assert_eq!(img.get_pixel(3, bike_row).0[3], 0);
    }

    #[test]
    fn test_strip_clamps_at_width() {
        let (store, _tmp) = build_store(&[header_only(
            MONDAY,
            1,
            100.0 * 3600.0, // more hours than the strip is wide
            100000.0,
        )]);
        let cal = Calendar::build(&store);
        let img = cal.strip().unwrap();
        assert_eq!(*img.get_pixel(STRIP_WIDTH - 1, img.height() - 1), RUN_COLOR);
    }
}
