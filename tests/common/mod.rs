//! Synthetic catalog and boundaries shared by the integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use ndarray::Array2;
use sarflood::raster::PropertyValue;
use sarflood::{
    AnalysisParams, AnalysisRequest, Band, BackscatterScale, CoordinateSystem, DateRange,
    GeoJsonBoundaryResolver, Grid, MemoryEngine, Raster, Scene,
};

/// Pixels per side of the projected test state.
pub const N: usize = 20;
/// Metres per pixel; one pixel is one hectare.
pub const CELL: f64 = 100.0;

pub const S1: &str = "COPERNICUS/S1_GRD";
pub const WATER: &str = "JRC/GSW1_2/GlobalSurfaceWater";
pub const DEM: &str = "WWF/HydroSHEDS/03VFDEM";
pub const LAND_COVER_2022: &str = "MODIS/061/MCD12Q1/2022_01_01";

pub fn projected_grid() -> Grid {
    let side = N as f64 * CELL;
    Grid::covering(0.0, 0.0, side, side, CELL, CoordinateSystem::Projected)
}

pub fn s1_properties() -> BTreeMap<String, PropertyValue> {
    BTreeMap::from([
        ("instrumentMode".to_string(), "IW".into()),
        (
            "transmitterReceiverPolarisation".to_string(),
            PropertyValue::List(vec!["VV".into(), "VH".into()]),
        ),
        ("orbitProperties_pass".to_string(), "DESCENDING".into()),
        ("resolution_meters".to_string(), 10.0.into()),
    ])
}

/// Dual-polarisation scene in linear power; NaN marks missing pixels.
pub fn s1_scene(grid: Grid, month: u32, day: u32, vh: Array2<f64>, vv: f64) -> Scene {
    let vv = vh.mapv(|v| if v.is_finite() { vv } else { f64::NAN });
    Scene {
        id: format!("S1A_2022{month:02}{day:02}"),
        acquired: Utc.with_ymd_and_hms(2022, month, day, 1, 12, 0).unwrap(),
        properties: s1_properties(),
        raster: Raster::new(
            grid,
            vec![Band::from_values("VV", vv), Band::from_values("VH", vh)],
        )
        .unwrap(),
    }
}

pub fn image(grid: Grid, band: &str, values: Array2<f64>) -> Raster {
    Raster::new(grid, vec![Band::from_values(band, values)]).unwrap()
}

/// Projected 20x20 ha state:
/// - after-event VH is 10x the before level on rows 5..15, cols 0..10 plus
///   one stray pixel at (18, 18), and missing elsewhere
/// - permanent water (seasonality 12) on rows 5..7, cols 0..10
/// - urban (13) on rows 10..20, cols 0..4; crop (14) on rows 10..20,
///   cols 4..10; crop (12) on rows 0..10, cols 10..20; grassland elsewhere
pub fn flood_engine(land_cover: fn(usize, usize) -> f64) -> MemoryEngine {
    let grid = projected_grid();
    let mut engine = MemoryEngine::new();

    let before = Array2::from_elem((N, N), 0.01);
    engine.insert_scene(S1, s1_scene(grid, 6, 20, before, 0.05));
    let after = Array2::from_shape_fn((N, N), |(r, c)| {
        if ((5..15).contains(&r) && c < 10) || (r, c) == (18, 18) {
            0.1
        } else {
            f64::NAN
        }
    });
    engine.insert_scene(S1, s1_scene(grid, 8, 25, after, 0.05));

    let seasonality = Array2::from_shape_fn((N, N), |(r, c)| {
        if (5..7).contains(&r) && c < 10 { 12.0 } else { 0.0 }
    });
    engine.insert_image(WATER, image(grid, "seasonality", seasonality));
    engine.insert_image(DEM, image(grid, "elevation", Array2::zeros((N, N))));
    engine.insert_image(
        LAND_COVER_2022,
        image(grid, "LC_Type1", Array2::from_shape_fn((N, N), |(r, c)| land_cover(r, c))),
    );
    engine
}

pub fn mixed_land_cover(r: usize, c: usize) -> f64 {
    if r >= 10 && c < 4 {
        13.0
    } else if r >= 10 && c < 10 {
        14.0
    } else if r < 10 && c >= 10 {
        12.0
    } else {
        10.0
    }
}

pub fn grassland(_: usize, _: usize) -> f64 {
    10.0
}

fn square(x: f64, y: f64, w: f64, h: f64, props: &str) -> String {
    format!(
        r#"{{"type":"Feature","properties":{{{props}}},"geometry":{{"type":"Polygon","coordinates":[[[{x},{y}],[{x1},{y}],[{x1},{y1}],[{x},{y1}],[{x},{y}]]]}}}}"#,
        x1 = x + w,
        y1 = y + h,
    )
}

/// Pakistan with a Sindh state covering `[x, x + w] x [y, y + h]` and a
/// neighbouring Punjab.
pub fn boundaries(x: f64, y: f64, w: f64, h: f64, crs: CoordinateSystem) -> GeoJsonBoundaryResolver {
    let countries = format!(
        r#"{{"type":"FeatureCollection","features":[{}]}}"#,
        square(x, y, 2.0 * w, 2.0 * h, r#""ADM0_NAME":"Pakistan""#),
    );
    let states = format!(
        r#"{{"type":"FeatureCollection","features":[{},{}]}}"#,
        square(x, y, w, h, r#""ADM0_NAME":"Pakistan","ADM1_NAME":"Sindh""#),
        square(x, y + h, w, h, r#""ADM0_NAME":"Pakistan","ADM1_NAME":"Punjab""#),
    );
    GeoJsonBoundaryResolver::from_geojson(&countries, &states, crs).unwrap()
}

pub fn projected_boundaries() -> GeoJsonBoundaryResolver {
    let side = N as f64 * CELL;
    boundaries(0.0, 0.0, side, side, CoordinateSystem::Projected)
}

pub fn request(scale: f64) -> AnalysisRequest {
    AnalysisRequest::new(
        "Pakistan",
        "Sindh",
        DateRange::parse("2022-05-15", "2022-07-15").unwrap(),
        DateRange::parse("2022-07-15", "2022-09-15").unwrap(),
        scale,
        1.0,
    )
}

/// Defaults with scenes declared as linear power.
pub fn params() -> AnalysisParams {
    let mut params = AnalysisParams::default();
    params.speckle.input_scale = BackscatterScale::Linear;
    params
}
