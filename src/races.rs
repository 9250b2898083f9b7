//! Race ledger.
//!
//! Races live beside the activity index in `race.txt`, one per line:
//! `YYYYMMDDTHHMMSS kind duration result name...`, e.g.
//! `20190914T101500 800m 2m32s 101/2048 City relays`.

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, Result};

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

/// One race result, keyed like activities by its Unix start time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Race {
    /// Unix time, seconds.
    pub start: i64,
    /// Distance class, e.g. "800m".
    pub kind: String,
    /// Finishing time.
    pub time: Duration,
    /// Placement, e.g. "101/2048".
    pub result: String,
    /// Event name; may contain spaces.
    pub name: String,
}

impl Race {
    /// Parse one ledger line. The caller supplies file/line context.
    pub fn parse_line(s: &str) -> std::result::Result<Race, String> {
        let err = |reason: &str| format!("race: {}: {}", s, reason);
        let v: Vec<&str> = s.split_whitespace().collect();
        if v.len() < 5 {
            return Err(err("fields"));
        }
        let start = NaiveDateTime::parse_from_str(v[0], TIMESTAMP_FORMAT)
            .map_err(|_| err("parse start"))?
            .and_utc()
            .timestamp();
        let time = parse_duration(v[2]).ok_or_else(|| err("parse time"))?;
        Ok(Race {
            start,
            kind: v[1].to_string(),
            time,
            result: v[3].to_string(),
            name: v[4..].join(" "),
        })
    }
}

impl fmt::Display for Race {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.kind.is_empty() { "-" } else { &self.kind };
        let result = if self.result.is_empty() {
            "0/0"
        } else {
            &self.result
        };
        let start = chrono::DateTime::from_timestamp(self.start, 0)
            .map(|d| d.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_else(|| "?".to_string());
        write!(
            f,
            "{} {} {} {} {}",
            start,
            kind,
            format_duration(self.time),
            result,
            self.name
        )
    }
}

/// Read `race.txt`. A missing file yields an empty list; the race ledger is
/// ancillary and a store created by `add` alone never has one.
pub fn read_races_file(path: &Path) -> Result<Vec<Race>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(path)?;
    let mut races = Vec::new();
    for (i, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let r = Race::parse_line(line).map_err(|message| AtlasError::Parse {
            file: path.to_path_buf(),
            line: i + 1,
            message,
        })?;
        races.push(r);
    }
    Ok(races)
}

/// Parse a duration in `1h2m3s` notation. Fractional components are
/// accepted (`2m32.5s`); a bare `0` means zero.
fn parse_duration(s: &str) -> Option<Duration> {
    if s == "0" {
        return Some(Duration::ZERO);
    }
    let mut total = 0.0f64;
    let mut num = String::new();
    for c in s.chars() {
        if c.is_ascii_digit() || c == '.' {
            num.push(c);
        } else {
            let v: f64 = num.parse().ok()?;
            num.clear();
            let unit = match c {
                'h' => 3600.0,
                'm' => 60.0,
                's' => 1.0,
                _ => return None,
            };
            total += v * unit;
        }
    }
    if !num.is_empty() {
        // trailing digits without a unit
        return None;
    }
    if total == 0.0 && s.is_empty() {
        return None;
    }
    Some(Duration::from_secs_f64(total))
}

fn format_duration(d: Duration) -> String {
    let total = d.as_secs();
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    let mut out = String::new();
    if h > 0 {
        out.push_str(&format!("{}h", h));
    }
    if m > 0 || (h > 0 && s > 0) {
        out.push_str(&format!("{}m", m));
    }
    if s > 0 || out.is_empty() {
        out.push_str(&format!("{}s", s));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_race_line() {
        let r = Race::parse_line("20190914T101500 800m 2m32s 101/2048 City relays").unwrap();
        assert_eq!(r.kind, "800m");
        assert_eq!(r.time, Duration::from_secs(152));
        assert_eq!(r.result, "101/2048");
        assert_eq!(r.name, "City relays");
    }

    #[test]
    fn test_race_display_round_trip() {
        let r = Race::parse_line("20190914T101500 800m 2m32s 101/2048 City relays").unwrap();
        let again = Race::parse_line(&r.to_string()).unwrap();
        assert_eq!(r, again);
    }

    #[test]
    fn test_parse_race_errors() {
        assert!(Race::parse_line("20190914T101500 800m").unwrap_err().contains("fields"));
        assert!(Race::parse_line("not-a-date 800m 2m32s 1/2 x")
            .unwrap_err()
            .contains("parse start"));
        assert!(Race::parse_line("20190914T101500 800m 2x32 1/2 x")
            .unwrap_err()
            .contains("parse time"));
    }

    #[test]
    fn test_parse_duration_forms() {
        assert_eq!(parse_duration("1h2m3s"), Some(Duration::from_secs(3723)));
        assert_eq!(parse_duration("38m"), Some(Duration::from_secs(2280)));
        assert_eq!(parse_duration("0"), Some(Duration::ZERO));
        assert_eq!(
            parse_duration("2m32.5s"),
            Some(Duration::from_secs_f64(152.5))
        );
        assert_eq!(parse_duration("12"), None);
    }

    #[test]
    fn test_format_duration_forms() {
        assert_eq!(format_duration(Duration::from_secs(3723)), "1h2m3s");
        assert_eq!(format_duration(Duration::from_secs(2280)), "38m");
        assert_eq!(format_duration(Duration::ZERO), "0s");
        assert_eq!(format_duration(Duration::from_secs(3601)), "1h0m1s");
    }

    #[test]
    fn test_missing_file_is_empty() {
        let races = read_races_file(Path::new("/nonexistent/race.txt")).unwrap();
        assert!(races.is_empty());
    }
}
