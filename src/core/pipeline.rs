//! Assembly of the flood expression graph.
//!
//! Nothing here touches pixels: [`build`] wires mosaics, speckle filtering,
//! change detection, mask refinement and the land-cover overlay into one
//! graph, and [`check_inputs`] asks the engine whether every source exists so
//! that missing data is reported before any reduction starts.
use tracing::{debug, info};

use crate::core::change::{add_ratio_band, detect};
use crate::core::composite::{CompositeMasks, MaskCompositor};
use crate::core::landcover::{FloodExposure, LandCoverClasses, classify};
use crate::core::params::AnalysisParams;
use crate::engine::RasterEngine;
use crate::error::{Error, Result};
use crate::raster::{ImageCollection, RasterExpr, Region};
use crate::types::{AnalysisWindow, DateRange};

/// Every node of one analysis the caller may want to reduce or display.
#[derive(Debug, Clone)]
pub struct FloodGraph {
    pub before: RasterExpr,
    pub after: RasterExpr,
    pub before_filtered: RasterExpr,
    pub after_filtered: RasterExpr,
    pub masks: CompositeMasks,
    pub land_cover: LandCoverClasses,
    pub exposure: FloodExposure,
}

impl FloodGraph {
    /// Refined flood mask.
    pub fn flood(&self) -> &RasterExpr {
        &self.masks.final_mask
    }
}

/// Sentinel-1 scenes of one date range over the region.
pub fn sentinel1_scenes(params: &AnalysisParams, region: &Region, range: DateRange) -> ImageCollection {
    let s1 = &params.sentinel1;
    let mut collection = ImageCollection::load(&params.datasets.sentinel1)
        .filter_eq("instrumentMode", s1.instrument_mode.as_str());
    for polarisation in &s1.polarisations {
        collection = collection.filter_list_contains("transmitterReceiverPolarisation", polarisation);
    }
    collection
        .filter_eq("orbitProperties_pass", s1.orbit_pass.as_str())
        .filter_eq("resolution_meters", s1.resolution_meters)
        .filter_bounds(region)
        .select(&[s1.cross_band.as_str(), s1.co_band.as_str()])
        .filter_date(range)
}

/// Land-cover image id for the year the before window starts in.
pub fn land_cover_id(params: &AnalysisParams, window: &AnalysisWindow) -> String {
    use chrono::Datelike;
    params.datasets.land_cover_id(window.before.start.year())
}

pub fn build(params: &AnalysisParams, region: &Region, window: &AnalysisWindow) -> FloodGraph {
    let s1 = &params.sentinel1;
    debug!("Building flood graph for {} / {}", window.before, window.after);

    let before = sentinel1_scenes(params, region, window.before).mosaic().clip(region);
    let after = sentinel1_scenes(params, region, window.after).mosaic().clip(region);
    let before = add_ratio_band(&before, &s1.co_band, &s1.cross_band);
    let after = add_ratio_band(&after, &s1.co_band, &s1.cross_band);

    let before_filtered = before.speckle_filter(params.speckle);
    let after_filtered = after.speckle_filter(params.speckle);
    let raw = detect(&before_filtered, &after_filtered, &params.change);

    let seasonality = RasterExpr::image(&params.datasets.surface_water)
        .clip(region)
        .select(&[params.datasets.seasonality_band.as_str()]);
    let elevation = RasterExpr::image(&params.datasets.elevation).clip(region);
    let masks = MaskCompositor::new(params.composite.clone()).composite(&raw, &seasonality, &elevation);

    let land_cover = RasterExpr::image(land_cover_id(params, window)).clip(region);
    let land_cover = classify(&land_cover, &params.land_cover);
    let exposure = land_cover.intersect(&masks.final_mask);

    FloodGraph {
        before,
        after,
        before_filtered,
        after_filtered,
        masks,
        land_cover,
        exposure,
    }
}

/// Fail with `DataUnavailable` when a source of the graph has no data.
pub fn check_inputs<E>(
    engine: &E,
    params: &AnalysisParams,
    region: &Region,
    window: &AnalysisWindow,
) -> Result<()>
where
    E: RasterEngine + ?Sized,
{
    for (label, range) in [("before", window.before), ("after", window.after)] {
        let scenes = engine.collection_size(&sentinel1_scenes(params, region, range))?;
        info!("{} window {}: {} Sentinel-1 scene(s)", label, range, scenes);
        if scenes == 0 {
            return Err(Error::DataUnavailable {
                dataset: params.datasets.sentinel1.clone(),
                detail: format!("no scene in the {label} window {range} over the region"),
            });
        }
    }
    for id in [
        params.datasets.surface_water.clone(),
        params.datasets.elevation.clone(),
        land_cover_id(params, window),
    ] {
        if !engine.has_image(&id) {
            return Err(Error::DataUnavailable {
                dataset: id,
                detail: "image not found in catalog".into(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MemoryEngine;
    use crate::types::CoordinateSystem;

    fn window() -> AnalysisWindow {
        AnalysisWindow {
            before: DateRange::parse("2022-05-15", "2022-07-15").unwrap(),
            after: DateRange::parse("2022-07-15", "2022-09-15").unwrap(),
        }
    }

    #[test]
    fn land_cover_follows_before_year() {
        let mut window = window();
        assert_eq!(
            land_cover_id(&AnalysisParams::default(), &window),
            "MODIS/061/MCD12Q1/2022_01_01"
        );
        window.before = DateRange::parse("2019-12-01", "2020-01-15").unwrap();
        assert_eq!(
            land_cover_id(&AnalysisParams::default(), &window),
            "MODIS/061/MCD12Q1/2019_01_01"
        );
    }

    #[test]
    fn scene_filters_cover_the_workflow() {
        let region = Region::rectangle(0.0, 0.0, 1.0, 1.0, CoordinateSystem::Geographic).unwrap();
        let scenes = sentinel1_scenes(&AnalysisParams::default(), &region, window().before);
        assert_eq!(scenes.dataset(), "COPERNICUS/S1_GRD");
        // mode, two polarisations, pass, resolution, bounds, date
        assert_eq!(scenes.filters().len(), 7);
        assert_eq!(scenes.bands().unwrap(), ["VH".to_string(), "VV".to_string()]);
    }

    #[test]
    fn empty_catalog_is_reported_before_evaluation() {
        let region = Region::rectangle(0.0, 0.0, 1.0, 1.0, CoordinateSystem::Geographic).unwrap();
        let err = check_inputs(&MemoryEngine::new(), &AnalysisParams::default(), &region, &window())
            .unwrap_err();
        match err {
            Error::DataUnavailable { dataset, detail } => {
                assert_eq!(dataset, "COPERNICUS/S1_GRD");
                assert!(detail.contains("before"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
