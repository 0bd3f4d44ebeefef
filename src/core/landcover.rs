//! Urban and cropland classes from an IGBP land-cover image.
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::raster::RasterExpr;

/// Value of urban pixels in the combined layer.
pub const COMBINED_URBAN: f64 = 2.0;
/// Value of crop-only pixels in the combined layer.
pub const COMBINED_CROP: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandCoverParams {
    /// Classification band
    pub band: String,
    /// Urban and built-up lands
    pub urban_class: u16,
    /// Croplands and cropland/natural vegetation mosaics
    pub crop_classes: Vec<u16>,
}

impl Default for LandCoverParams {
    fn default() -> Self {
        Self {
            band: "LC_Type1".to_string(),
            urban_class: 13,
            crop_classes: vec![12, 14],
        }
    }
}

impl LandCoverParams {
    pub fn validate(&self) -> Result<()> {
        if self.band.trim().is_empty() {
            return Err(Error::config("land_cover.band", "must name a band"));
        }
        if self.crop_classes.is_empty() {
            return Err(Error::config("land_cover.crop_classes", "at least one class"));
        }
        if self.crop_classes.contains(&self.urban_class) {
            return Err(Error::config(
                "land_cover.crop_classes",
                format!("class {} is already the urban class", self.urban_class),
            ));
        }
        Ok(())
    }
}

/// Land-cover layers, all masked outside their class.
#[derive(Debug, Clone)]
pub struct LandCoverClasses {
    pub urban: RasterExpr,
    pub crop: RasterExpr,
    /// 1 = crop only, 2 = urban (wins over crop), masked elsewhere
    pub combined: RasterExpr,
}

/// Flood mask restricted to each land-cover class.
#[derive(Debug, Clone)]
pub struct FloodExposure {
    pub urban: RasterExpr,
    pub crop: RasterExpr,
}

pub fn classify(land_cover: &RasterExpr, params: &LandCoverParams) -> LandCoverClasses {
    let classes = land_cover.select(&[params.band.as_str()]);
    let urban = classes.eq(f64::from(params.urban_class));
    let crop = params
        .crop_classes
        .iter()
        .map(|&code| classes.eq(f64::from(code)))
        .reduce(|acc, next| acc.or(&next))
        .unwrap_or_else(|| RasterExpr::constant(0.0));

    let combined = crop.where_(&urban, COMBINED_URBAN);
    let combined = combined.update_mask(&combined.neq(0.0));

    LandCoverClasses {
        urban: urban.self_mask(),
        crop: crop.self_mask(),
        combined,
    }
}

impl LandCoverClasses {
    /// Flood pixels that fall on urban and on crop land.
    pub fn intersect(&self, flood: &RasterExpr) -> FloodExposure {
        FloodExposure {
            urban: flood.update_mask(&self.urban),
            crop: flood.update_mask(&self.crop),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MemoryEngine, RasterEngine, ReduceOptions};
    use crate::raster::{Band, Grid, Raster, Region};
    use crate::types::CoordinateSystem;
    use ndarray::Array2;

    const CLASSES: [f64; 6] = [13.0, 12.0, 14.0, 1.0, 17.0, 13.0];

    fn setup() -> (MemoryEngine, Region, ReduceOptions) {
        let grid = Grid::covering(0.0, 0.0, 6.0, 1.0, 1.0, CoordinateSystem::Projected);
        let lc = Array2::from_shape_vec((1, 6), CLASSES.to_vec()).unwrap();
        let flood = Array2::from_shape_vec((1, 6), vec![1.0, 1.0, f64::NAN, 1.0, 1.0, f64::NAN]).unwrap();
        let mut engine = MemoryEngine::new();
        engine.insert_image(
            "lc",
            Raster::new(grid, vec![Band::from_values("LC_Type1", lc)]).unwrap(),
        );
        engine.insert_image(
            "flood",
            Raster::new(grid, vec![Band::from_values("floodwater", flood)]).unwrap(),
        );
        let region = Region::rectangle(0.0, 0.0, 6.0, 1.0, CoordinateSystem::Projected).unwrap();
        (engine, region, ReduceOptions::new(1.0, 1.0, 100).unwrap())
    }

    fn present(engine: &MemoryEngine, expr: &RasterExpr, region: &Region, options: &ReduceOptions) -> Vec<Option<f64>> {
        let raster = engine.compute(expr, region, options).unwrap();
        let band = raster.single().unwrap();
        (0..6).map(|c| band.get(0, c)).collect()
    }

    #[test]
    fn combined_layer_prefers_urban() {
        let (engine, region, options) = setup();
        let classes = classify(&RasterExpr::image("lc"), &LandCoverParams::default());
        assert_eq!(
            present(&engine, &classes.combined, &region, &options),
            vec![Some(2.0), Some(1.0), Some(1.0), None, None, Some(2.0)]
        );
        assert_eq!(
            present(&engine, &classes.urban, &region, &options),
            vec![Some(1.0), None, None, None, None, Some(1.0)]
        );
        assert_eq!(
            present(&engine, &classes.crop, &region, &options),
            vec![None, Some(1.0), Some(1.0), None, None, None]
        );
    }

    #[test]
    fn exposure_requires_both_flood_and_class() {
        let (engine, region, options) = setup();
        let classes = classify(&RasterExpr::image("lc"), &LandCoverParams::default());
        let exposure = classes.intersect(&RasterExpr::image("flood"));
        assert_eq!(
            present(&engine, &exposure.urban, &region, &options),
            vec![Some(1.0), None, None, None, None, None]
        );
        assert_eq!(
            present(&engine, &exposure.crop, &region, &options),
            vec![None, Some(1.0), None, None, None, None]
        );
    }

    #[test]
    fn overlapping_class_lists_are_rejected() {
        let params = LandCoverParams {
            crop_classes: vec![12, 13],
            ..LandCoverParams::default()
        };
        assert!(params.validate().unwrap_err().is_configuration());
    }
}
