//! FIT activity file ingestion.
//!
//! Turns a device FIT file into the canonical record shape. Session
//! messages supply the summary (start, sport, summed timer time and
//! distance); record messages supply the five sample arrays. Missing
//! per-sample values become NaN altitudes and sentinel positions, so the
//! rest of the pipeline never sees a partially filled sample.

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Local};
use fitparser::profile::MesgNum;
use fitparser::{FitDataRecord, Value};
use log::debug;

use crate::error::{AtlasError, Result};
use crate::geo::SENTINEL;
use crate::{Header, Record};

/// Read and convert one FIT activity file.
pub fn read_fit(path: impl AsRef<Path>) -> Result<Record> {
    let mut file = File::open(path.as_ref())?;
    let data = fitparser::from_reader(&mut file).map_err(|e| AtlasError::Ingest {
        message: e.to_string(),
    })?;
    record_from_messages(&data)
}

fn record_from_messages(messages: &[FitDataRecord]) -> Result<Record> {
    let mut start: Option<DateTime<Local>> = None;
    let mut sport = 0u32;
    let mut seconds = 0.0f64;
    let mut meters = 0.0f64;

    // First session wins for start and sport; totals accumulate over all.
    for msg in messages.iter().filter(|m| m.kind() == MesgNum::Session) {
        for field in msg.fields() {
            match field.name() {
                "start_time" => {
                    if start.is_none() {
                        start = value_time(field.value());
                    }
                }
                "sport" => {
                    if sport == 0 {
                        sport = sport_code(field.value());
                    }
                }
                "total_timer_time" => seconds += value_f64(field.value()).unwrap_or(0.0),
                "total_distance" => meters += value_f64(field.value()).unwrap_or(0.0),
                _ => {}
            }
        }
    }

    let mut time = Vec::new();
    let mut dist = Vec::new();
    let mut alt = Vec::new();
    let mut lat = Vec::new();
    let mut lon = Vec::new();

    for msg in messages.iter().filter(|m| m.kind() == MesgNum::Record) {
        let mut ts = None;
        let mut d = None;
        let mut a_enhanced = None;
        let mut a_basic = None;
        let mut la = None;
        let mut lo = None;
        for field in msg.fields() {
            match field.name() {
                "timestamp" => ts = value_time(field.value()),
                "distance" => d = value_f64(field.value()),
                "enhanced_altitude" => a_enhanced = value_f64(field.value()),
                "altitude" => a_basic = value_f64(field.value()),
                "position_lat" => la = value_i32(field.value()),
                "position_long" => lo = value_i32(field.value()),
                _ => {}
            }
        }
        let Some(ts) = ts else {
            debug!("record message without timestamp, skipped");
            continue;
        };
        // No session? Anchor the activity at its first record.
        let t0 = *start.get_or_insert(ts);
        time.push((ts - t0).num_milliseconds() as f32 / 1000.0);
        dist.push(d.unwrap_or(f64::NAN) as f32);
        alt.push(a_enhanced.or(a_basic).unwrap_or(f64::NAN) as f32);
        lat.push(la.unwrap_or(SENTINEL));
        lon.push(lo.unwrap_or(SENTINEL));
    }

    if time.is_empty() {
        return Err(AtlasError::Ingest {
            message: "file has no records".to_string(),
        });
    }
    let Some(start) = start else {
        return Err(AtlasError::Ingest {
            message: "file has no start time".to_string(),
        });
    };

    let header = Header {
        start: start.timestamp(),
        sport,
        seconds: seconds as f32,
        meters: meters as f32,
        samples: time.len() as u64,
    };
    Ok(Record {
        header,
        time,
        dist,
        alt,
        lat,
        lon,
    })
}

fn value_time(v: &Value) -> Option<DateTime<Local>> {
    match v {
        Value::Timestamp(t) => Some(*t),
        _ => None,
    }
}

fn value_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Float64(x) => Some(*x),
        Value::Float32(x) => Some(*x as f64),
        Value::SInt64(x) => Some(*x as f64),
        Value::UInt64(x) => Some(*x as f64),
        Value::UInt64z(x) => Some(*x as f64),
        Value::SInt32(x) => Some(*x as f64),
        Value::UInt32(x) => Some(*x as f64),
        Value::UInt32z(x) => Some(*x as f64),
        Value::SInt16(x) => Some(*x as f64),
        Value::UInt16(x) => Some(*x as f64),
        Value::UInt16z(x) => Some(*x as f64),
        Value::SInt8(x) => Some(*x as f64),
        Value::UInt8(x) => Some(*x as f64),
        Value::UInt8z(x) => Some(*x as f64),
        Value::Byte(x) => Some(*x as f64),
        Value::Enum(x) => Some(*x as f64),
        _ => None,
    }
}

fn value_i32(v: &Value) -> Option<i32> {
    match v {
        Value::SInt32(x) => Some(*x),
        other => value_f64(other).map(|f| f as i32),
    }
}

/// Map the FIT sport field onto the store's activity codes. The FIT enum
/// itself uses 1 running, 2 cycling, 5 swimming, so numeric values pass
/// through unchanged.
fn sport_code(v: &Value) -> u32 {
    match v {
        Value::String(s) => match s.as_str() {
            "running" => 1,
            "cycling" => 2,
            "swimming" => 5,
            _ => 0,
        },
        Value::Enum(x) => *x as u32,
        Value::UInt8(x) => *x as u32,
        Value::UInt32(x) => *x,
        _ => 0,
    }
}
