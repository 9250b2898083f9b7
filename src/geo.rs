//! Semicircle units and the full-range web mercator projection.
//!
//! Positions are stored as "semicircles": a fixed-point angular unit where
//! the full signed 32-bit range spans +/-180 degrees. The projection maps a
//! semicircle pair onto an unsigned 32-bit grid at an implicit zoom level of
//! 24 (one unit = one pixel at zoom 24); lower zooms are derived by shifting.

use std::f64::consts::PI;

/// Reserved semicircle value meaning "no GPS fix for this sample".
pub const SENTINEL: i32 = 0x7FFF_FFFF;

/// Latitude bound of the projectable band, in radians (+/-85.05113 degrees,
/// the standard web mercator clamp).
pub const MAX_LAT_RAD: f64 = 1.4844;

/// Implicit zoom level of the projected grid.
pub const MAX_ZOOM: u32 = 24;

/// Degrees per semicircle unit: 180 / 2^31.
const DEG_PER_SEMI: f64 = 180.0 / (1u64 << 31) as f64;

/// Convert semicircles to degrees. The sentinel maps to NaN.
#[inline]
pub fn degrees(semi: i32) -> f64 {
    if semi == SENTINEL {
        return f64::NAN;
    }
    semi as f64 * DEG_PER_SEMI
}

/// Convert degrees to semicircles, rounding toward zero. NaN maps to the
/// sentinel. Used by data ingestion when a source carries degree values.
#[inline]
pub fn to_semicircles(deg: f64) -> i32 {
    if deg.is_nan() {
        return SENTINEL;
    }
    (deg / DEG_PER_SEMI) as i32
}

/// Project a semicircle position onto the full-range u32 mercator grid.
///
/// Returns `None` when either coordinate is the sentinel or the latitude is
/// outside the projectable band. Longitude maps linearly (the semicircle
/// domain already spans the full signed 32-bit range); latitude uses the
/// spherical mercator `ln(tan + sec)` transform rescaled so that y = 0 is
/// the north edge of the band.
#[inline]
pub fn project(lat: i32, lon: i32) -> Option<(u32, u32)> {
    if lat == SENTINEL || lon == SENTINEL {
        return None;
    }
    let la = degrees(lat).to_radians();
    if la >= MAX_LAT_RAD || la <= -MAX_LAT_RAD {
        return None;
    }
    let x = (lon as i64 + (1i64 << 31)) as u32;
    let s = (1u64 << 31) as f64;
    let y = (s * (1.0 - ((la.tan() + 1.0 / la.cos()).ln()) / PI)) as u32;
    Some((x, y))
}
