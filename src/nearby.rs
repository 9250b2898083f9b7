//! Great-circle proximity search.
//!
//! "Which activities pass within N meters of here" as a record predicate
//! for `filter_records`. Distances use the atan2 great-circle formulation,
//! which stays accurate for both tiny and antipodal separations.

use crate::geo;
use crate::Record;

/// Mean earth radius in meters (IUGG).
pub const EARTH_RADIUS: f64 = 6_371_008.8;

/// Default search radius in meters.
pub const DEFAULT_RADIUS: f64 = 50.0;

/// Great-circle distance in meters between two degree positions.
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (la1, lo1) = (lat1.to_radians(), lon1.to_radians());
    let (la2, lo2) = (lat2.to_radians(), lon2.to_radians());
    let dlon = (lo2 - lo1).abs();
    let a = la2.cos() * dlon.sin();
    let b = la1.cos() * la2.sin() - la1.sin() * la2.cos() * dlon.cos();
    let dot = la1.sin() * la2.sin() + la1.cos() * la2.cos() * dlon.cos();
    EARTH_RADIUS * (a * a + b * b).sqrt().atan2(dot)
}

/// Predicate matching records with at least one valid sample within
/// `radius_m` meters of (lat, lon) degrees.
pub fn near(lat: f64, lon: f64, radius_m: f64) -> impl Fn(&Record) -> bool {
    move |rec| {
        rec.lat.iter().zip(&rec.lon).any(|(&la, &lo)| {
            let (la, lo) = (geo::degrees(la), geo::degrees(lo));
            if la.is_nan() || lo.is_nan() {
                return false;
            }
            let m = distance_meters(lat, lon, la, lo);
            !m.is_nan() && m < radius_m
        })
    }
}
