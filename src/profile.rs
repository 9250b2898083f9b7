//! Elevation-vs-distance profile raster.
//!
//! A fixed 600x50 strip with one black dot per sample at
//! (distance * xs, height - altitude * ys). The axis scales start at
//! 0.001 px/m horizontally and 0.1 px/m vertically and are halved until the
//! whole track fits; NaN altitudes are skipped.

use image::{Rgba, RgbaImage};

use crate::Record;

pub const PROFILE_WIDTH: u32 = 600;
pub const PROFILE_HEIGHT: u32 = 50;

const DOT: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Largest non-NaN value, 0 for an all-NaN or empty slice.
fn max_finite(values: &[f32]) -> f64 {
    values
        .iter()
        .map(|&v| v as f64)
        .filter(|v| !v.is_nan())
        .fold(0.0, f64::max)
}

/// Render the profile for one record; `None` for a record without samples.
pub fn elevation_profile(rec: &Record) -> Option<RgbaImage> {
    if rec.header.samples == 0 {
        return None;
    }
    let (w, h) = (PROFILE_WIDTH as f64, PROFILE_HEIGHT as f64);
    let mut xs = 0.001;
    let mut ys = 0.1;
    let dist_max = max_finite(&rec.dist);
    let alt_max = max_finite(&rec.alt);
    while xs * dist_max > w {
        xs /= 2.0;
    }
    while ys * alt_max > h {
        ys /= 2.0;
    }

    let mut img = RgbaImage::new(PROFILE_WIDTH, PROFILE_HEIGHT);
    for (d, a) in rec.dist.iter().zip(&rec.alt) {
        let x = xs * *d as f64;
        let y = h - ys * *a as f64;
        if x.is_nan() || y.is_nan() {
            continue;
        }
        let (xi, yi) = (x as i64, y as i64);
        if (0..PROFILE_WIDTH as i64).contains(&xi) && (0..PROFILE_HEIGHT as i64).contains(&yi) {
            img.put_pixel(xi as u32, yi as u32, DOT);
        }
    }
    Some(img)
}
