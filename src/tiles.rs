//! Raster tile rendering for stored activities.
//!
//! The engine projects every stored sample once, at store-snapshot time, onto
//! the full-range u32 mercator grid (one unit = one pixel at zoom 24) and
//! keeps two flat point buffers, one per plotted activity type. Serving a
//! tile is then pure integer work: shift the stored coordinates down to the
//! requested zoom and plot whatever lands inside the 256x256 window. The
//! buffers are built exactly once and never updated; a process restart picks
//! up new activities.

use std::io::Cursor;
use std::str::FromStr;

use image::{Rgba, RgbaImage};
use log::{info, warn};
use once_cell::sync::Lazy;
use rayon::prelude::*;

use crate::geo::MAX_ZOOM;
use crate::store::Store;
use crate::ActivityType;

/// Tile edge length in pixels.
pub const TILE_SIZE: u32 = 256;

/// First hit on a pixel starts the density counter here so single hits are
/// already visible; later hits increment toward 255.
const HIT_FLOOR: u8 = 20;

pub(crate) const RUN_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
pub(crate) const BIKE_COLOR: Rgba<u8> = Rgba([0, 160, 0, 255]);
pub(crate) const SWIM_COLOR: Rgba<u8> = Rgba([0, 0, 255, 255]);

/// Visual style of a rendered tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileMode {
    /// Flat per-type colors; bike drawn first, run on top.
    Plain,
    /// Saturating density counter shown directly as greyscale.
    Grey,
    /// Same counter through a fixed 256-entry perceptual ramp.
    Inferno,
}

impl FromStr for TileMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(TileMode::Plain),
            "grey" => Ok(TileMode::Grey),
            "inferno" => Ok(TileMode::Inferno),
            other => Err(format!("unknown tile mode: {}", other)),
        }
    }
}

/// Flat projected point buffers, one per plotted activity type, built once
/// from a store snapshot and immutable for the serving lifetime.
pub struct TileEngine {
    run: Vec<(u32, u32)>,
    bike: Vec<(u32, u32)>,
}

impl TileEngine {
    /// Project every record in the store. Records that fail to decode are
    /// logged and skipped; the engine still builds from the rest. Types
    /// other than run and bike are not plotted.
    pub fn build<S: Store + ?Sized>(store: &S) -> TileEngine {
        let per_record: Vec<(ActivityType, Vec<(u32, u32)>)> = (0..store.len())
            .into_par_iter()
            .filter_map(|i| {
                let head = store.header(i);
                if head.samples == 0 {
                    return None;
                }
                match store.record(i) {
                    Ok(rec) => Some((head.activity_type(), rec.mercator_points())),
                    Err(e) => {
                        warn!("{}: skipped while building tiles: {}", head.start, e);
                        None
                    }
                }
            })
            .collect();

        let mut run = Vec::new();
        let mut bike = Vec::new();
        for (sport, points) in per_record {
            match sport {
                ActivityType::Run => run.extend(points),
                ActivityType::Bike => bike.extend(points),
                _ => {}
            }
        }
        info!(
            "tile engine: {} run points, {} bike points",
            run.len(),
            bike.len()
        );
        TileEngine { run, bike }
    }

    /// Total number of buffered points.
    pub fn point_count(&self) -> usize {
        self.run.len() + self.bike.len()
    }

    /// Render the tile at `(zoom, tile_x, tile_y)`. Out-of-range or
    /// malformed addresses yield an empty, well-formed tile.
    pub fn render(&self, zoom: u32, tile_x: u32, tile_y: u32, mode: TileMode) -> RgbaImage {
        let mut img = RgbaImage::new(TILE_SIZE, TILE_SIZE);
        if zoom > MAX_ZOOM {
            return img;
        }
        let tiles = 1u64 << zoom;
        if tile_x as u64 >= tiles || tile_y as u64 >= tiles {
            return img;
        }

        let shift = MAX_ZOOM - zoom;
        let span = (TILE_SIZE as u64) << shift;
        let x0 = tile_x as u64 * span;
        let y0 = tile_y as u64 * span;

        match mode {
            TileMode::Plain => {
                // Bike first, run second: overlapping pixels show run.
                for &(x, y) in &self.bike {
                    if let Some((px, py)) = locate(x, y, x0, y0, span, shift) {
                        img.put_pixel(px, py, BIKE_COLOR);
                    }
                }
                for &(x, y) in &self.run {
                    if let Some((px, py)) = locate(x, y, x0, y0, span, shift) {
                        img.put_pixel(px, py, RUN_COLOR);
                    }
                }
            }
            TileMode::Grey | TileMode::Inferno => {
                let mut hits = vec![0u8; (TILE_SIZE * TILE_SIZE) as usize];
                for &(x, y) in self.bike.iter().chain(self.run.iter()) {
                    if let Some((px, py)) = locate(x, y, x0, y0, span, shift) {
                        let c = &mut hits[(py * TILE_SIZE + px) as usize];
                        *c = if *c == 0 { HIT_FLOOR } else { c.saturating_add(1) };
                    }
                }
                for (i, &v) in hits.iter().enumerate() {
                    let (px, py) = (i as u32 % TILE_SIZE, i as u32 / TILE_SIZE);
                    let rgb = match mode {
                        TileMode::Grey => [v, v, v],
                        _ => INFERNO[v as usize],
                    };
                    img.put_pixel(px, py, Rgba([rgb[0], rgb[1], rgb[2], 255]));
                }
            }
        }
        img
    }

    /// Render a tile and encode it as PNG.
    pub fn render_png(&self, zoom: u32, tile_x: u32, tile_y: u32, mode: TileMode) -> Vec<u8> {
        png_bytes(&self.render(zoom, tile_x, tile_y, mode))
    }
}

/// Pixel position of a stored point within the tile window, or `None` when
/// it falls outside. Explicit bounds check in u64; `x0 + span` cannot
/// overflow because span and origin both live below 2^32.
#[inline]
fn locate(x: u32, y: u32, x0: u64, y0: u64, span: u64, shift: u32) -> Option<(u32, u32)> {
    let (x, y) = (x as u64, y as u64);
    if x < x0 || x >= x0 + span || y < y0 || y >= y0 + span {
        return None;
    }
    Some((((x - x0) >> shift) as u32, ((y - y0) >> shift) as u32))
}

/// Encode a raster as an in-memory PNG.
pub(crate) fn png_bytes(img: &RgbaImage) -> Vec<u8> {
    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .expect("PNG encoding failed");
    png
}

/// 256-entry inferno ramp, tabulated once from the polynomial fit of the
/// matplotlib colormap.
static INFERNO: Lazy<[[u8; 3]; 256]> = Lazy::new(|| {
    let mut lut = [[0u8; 3]; 256];
    for (i, entry) in lut.iter_mut().enumerate() {
        *entry = inferno(i as f64 / 255.0);
    }
    lut
});

fn inferno(t: f64) -> [u8; 3] {
    const C0: [f64; 3] = [0.0002189403691192265, 0.001651004631001012, -0.01948089843709184];
    const C1: [f64; 3] = [0.1065134194856116, 0.5639564367884091, 3.932712388889277];
    const C2: [f64; 3] = [11.60249308247187, -3.972853965665698, -15.9423941062914];
    const C3: [f64; 3] = [-41.70399613139459, 17.43639888205313, 44.35414519872687];
    const C4: [f64; 3] = [77.162935699427, -33.40235894210092, -81.80730925738993];
    const C5: [f64; 3] = [-71.31942824499214, 32.62606426397723, 73.20951985803202];
    const C6: [f64; 3] = [25.13112622477341, -12.24266895238567, -23.07032500287172];

    let t = t.clamp(0.0, 1.0);
    let mut rgb = [0u8; 3];
    for (k, channel) in rgb.iter_mut().enumerate() {
        let v = C0[k]
            + t * (C1[k] + t * (C2[k] + t * (C3[k] + t * (C4[k] + t * (C5[k] + t * C6[k])))));
        *channel = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    }
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(run: Vec<(u32, u32)>, bike: Vec<(u32, u32)>) -> TileEngine {
        TileEngine { run, bike }
    }

    #[test]
    fn test_tile_mode_from_str() {
        assert_eq!("plain".parse::<TileMode>().unwrap(), TileMode::Plain);
        assert_eq!("grey".parse::<TileMode>().unwrap(), TileMode::Grey);
        assert_eq!("inferno".parse::<TileMode>().unwrap(), TileMode::Inferno);
        assert!("sepia".parse::<TileMode>().is_err());
    }

    #[test]
    fn test_full_zoom_addressing() {
        // At zoom 24 a point renders at (x & 0xFF, y & 0xFF) of tile
        // (x >> 8, y >> 8).
        let (x, y) = (0x1234_5678u32, 0x0FED_CBA9u32);
        let e = engine(vec![(x, y)], vec![]);
        let img = e.render(24, x >> 8, y >> 8, TileMode::Plain);
        assert_eq!(*img.get_pixel(x & 0xFF, y & 0xFF), RUN_COLOR);
    }

    #[test]
    fn test_zoom_zero_contains_everything() {
        let points = vec![(0u32, 0u32), (u32::MAX, u32::MAX), (1 << 31, 1 << 31)];
        let e = engine(points.clone(), vec![]);
        let img = e.render(0, 0, 0, TileMode::Plain);
        let mut plotted = 0;
        for p in img.pixels() {
            if *p == RUN_COLOR {
                plotted += 1;
            }
        }
        // Three distinct pixels at zoom 0.
        assert_eq!(plotted, 3);
        // There is exactly one tile at zoom 0.
        let off = e.render(0, 1, 0, TileMode::Plain);
        assert!(off.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn test_neighboring_tile_excludes_point() {
        let (x, y) = (0x1234_5678u32, 0x0FED_CBA9u32);
        let e = engine(vec![(x, y)], vec![]);
        let img = e.render(24, (x >> 8) + 1, y >> 8, TileMode::Plain);
        assert!(img.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn test_plain_run_overdraws_bike() {
        let p = (1000u32, 2000u32);
        let e = engine(vec![p], vec![p]);
        let img = e.render(24, p.0 >> 8, p.1 >> 8, TileMode::Plain);
        assert_eq!(*img.get_pixel(p.0 & 0xFF, p.1 & 0xFF), RUN_COLOR);
    }

    #[test]
    fn test_grey_counter_floor_and_saturation() {
        // One point once; another point 300 times on the same pixel.
        let once = (0u32, 0u32);
        let many = vec![(256u32, 0u32); 300];
        let mut run = vec![once];
        run.extend(many);
        let e = engine(run, vec![]);
        let img = e.render(24, 0, 0, TileMode::Grey);
        assert_eq!(img.get_pixel(0, 0).0[0], HIT_FLOOR);
        assert_eq!(img.get_pixel(1, 0).0[0], 255, "counter must clamp, not wrap");
    }

    #[test]
    fn test_grey_counter_shared_across_types() {
        // Same pixel hit by bike and run: floor + 1.
        let p = (0u32, 0u32);
        let e = engine(vec![p], vec![p]);
        let img = e.render(24, 0, 0, TileMode::Grey);
        assert_eq!(img.get_pixel(0, 0).0[0], HIT_FLOOR + 1);
    }

    #[test]
    fn test_inferno_indexes_ramp() {
        let e = engine(vec![(0, 0)], vec![]);
        let img = e.render(24, 0, 0, TileMode::Inferno);
        let px = img.get_pixel(0, 0);
        assert_eq!(px.0[..3], INFERNO[HIT_FLOOR as usize]);
        // Background is the ramp's zero entry, opaque.
        let bg = img.get_pixel(10, 10);
        assert_eq!(bg.0[..3], INFERNO[0]);
        assert_eq!(bg.0[3], 255);
    }

    #[test]
    fn test_inferno_ramp_shape() {
        // Dark at 0, bright at 255, strictly brighter overall.
        let lum = |c: [u8; 3]| c[0] as u32 + c[1] as u32 + c[2] as u32;
        assert!(lum(INFERNO[0]) < 30);
        assert!(lum(INFERNO[255]) > 500);
        assert!(lum(INFERNO[64]) < lum(INFERNO[192]));
    }

    #[test]
    fn test_out_of_range_requests_render_empty() {
        let e = engine(vec![(123, 456)], vec![]);
        for img in [
            e.render(30, 0, 0, TileMode::Plain),
            e.render(3, 8, 0, TileMode::Plain),
            e.render(3, 0, 8, TileMode::Plain),
        ] {
            assert_eq!(img.dimensions(), (TILE_SIZE, TILE_SIZE));
            assert!(img.pixels().all(|p| p.0[3] == 0));
        }
    }

    #[test]
    fn test_lower_zoom_aggregates_pixels() {
        // Two points 255 units apart share a pixel once zoom drops by 8.
        let e = engine(vec![(0, 0), (255, 0)], vec![]);
        let img = e.render(16, 0, 0, TileMode::Grey);
        assert_eq!(img.get_pixel(0, 0).0[0], HIT_FLOOR + 1);
        assert_eq!(img.get_pixel(1, 0).0[0], 0);
        // At full zoom they are separate pixels again.
        let img = e.render(24, 0, 0, TileMode::Grey);
        assert_eq!(img.get_pixel(0, 0).0[0], HIT_FLOOR);
        assert_eq!(img.get_pixel(255, 0).0[0], HIT_FLOOR);
    }

    #[test]
    fn test_render_png_is_png() {
        let e = engine(vec![(0, 0)], vec![]);
        let png = e.render_png(24, 0, 0, TileMode::Plain);
        assert_eq!(&png[..4], &[0x89, 0x50, 0x4E, 0x47]);
    }
}
