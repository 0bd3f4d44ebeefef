//! Before/after change detection.
//!
//! Backscatter changes are multiplicative, so the detector works on the
//! ratio `after / before` instead of a difference. Pixels where the ratio of
//! the flood band is not strictly above the threshold are masked out, not
//! set to zero; masked `before` pixels and zero denominators give masked
//! output as well.
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::raster::RasterExpr;

/// Name of the co/cross-polarisation ratio band.
pub const RATIO_BAND: &str = "VV/VH";

/// Name of the binary flood band.
pub const FLOOD_BAND: &str = "floodwater";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeParams {
    /// Ratio a pixel must exceed to count as flooded
    pub threshold: f64,
    /// Band of the ratio image that is thresholded
    pub band: String,
}

impl Default for ChangeParams {
    fn default() -> Self {
        Self {
            threshold: 1.05,
            band: "VH".to_string(),
        }
    }
}

impl ChangeParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.threshold.is_finite() && self.threshold > 0.0) {
            return Err(Error::config(
                "change.threshold",
                format!("must be a positive ratio, got {}", self.threshold),
            ));
        }
        if self.band.trim().is_empty() {
            return Err(Error::config("change.band", "must name a band"));
        }
        Ok(())
    }
}

/// Append the `co / cross` ratio band to a dual-polarisation image.
pub fn add_ratio_band(image: &RasterExpr, co: &str, cross: &str) -> RasterExpr {
    let ratio = image
        .select(&[co])
        .divide(&image.select(&[cross]))
        .rename(&[RATIO_BAND]);
    image.add_bands(&ratio)
}

/// Per-band `after / before`.
pub fn change_ratio(before: &RasterExpr, after: &RasterExpr) -> RasterExpr {
    after.divide(before)
}

/// Binary flood mask: the selected ratio band strictly above the threshold,
/// everything else masked.
pub fn detect(before: &RasterExpr, after: &RasterExpr, params: &ChangeParams) -> RasterExpr {
    change_ratio(before, after)
        .select(&[params.band.as_str()])
        .gt(params.threshold)
        .rename(&[FLOOD_BAND])
        .self_mask()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MemoryEngine, RasterEngine, ReduceOptions};
    use crate::raster::{Band, Grid, Raster, Region};
    use crate::types::CoordinateSystem;
    use ndarray::Array2;

    fn engine(before: &[f64], after: &[f64]) -> MemoryEngine {
        let n = before.len();
        let grid = Grid::covering(0.0, 0.0, n as f64, 1.0, 1.0, CoordinateSystem::Projected);
        let band = |values: &[f64]| {
            Band::from_values("VH", Array2::from_shape_vec((1, n), values.to_vec()).unwrap())
        };
        let mut engine = MemoryEngine::new();
        engine.insert_image("before", Raster::new(grid, vec![band(before)]).unwrap());
        engine.insert_image("after", Raster::new(grid, vec![band(after)]).unwrap());
        engine
    }

    fn evaluate(engine: &MemoryEngine, expr: &RasterExpr, n: usize) -> Band {
        let region =
            Region::rectangle(0.0, 0.0, n as f64, 1.0, CoordinateSystem::Projected).unwrap();
        let options = ReduceOptions::new(1.0, 1.0, 1_000).unwrap();
        engine
            .compute(expr, &region, &options)
            .unwrap()
            .single()
            .unwrap()
            .clone()
    }

    #[test]
    fn threshold_is_strict() {
        let at = 1.05_f64;
        let above = f64::from_bits(at.to_bits() + 1);
        let engine = engine(&[1.0, 1.0, 1.0], &[at, above, 2.0]);
        let flood = detect(
            &RasterExpr::image("before"),
            &RasterExpr::image("after"),
            &ChangeParams::default(),
        );
        let band = evaluate(&engine, &flood, 3);
        assert_eq!(band.name, FLOOD_BAND);
        assert_eq!(band.get(0, 0), None);
        assert_eq!(band.get(0, 1), Some(1.0));
        assert_eq!(band.get(0, 2), Some(1.0));
    }

    #[test]
    fn zero_or_missing_before_is_masked() {
        let engine = engine(&[0.0, f64::NAN, -10.0], &[-20.0, -20.0, -20.0]);
        let flood = detect(
            &RasterExpr::image("before"),
            &RasterExpr::image("after"),
            &ChangeParams::default(),
        );
        let band = evaluate(&engine, &flood, 3);
        assert_eq!(band.valid_count(), 1);
        // -20 dB / -10 dB = 2: darker after the event.
        assert_eq!(band.get(0, 2), Some(1.0));
    }

    #[test]
    fn ratio_band_is_appended() {
        let mut engine = MemoryEngine::new();
        let grid = Grid::covering(0.0, 0.0, 1.0, 1.0, 1.0, CoordinateSystem::Projected);
        let vv = Band::from_values("VV", Array2::from_elem((1, 1), -8.0));
        let vh = Band::from_values("VH", Array2::from_elem((1, 1), -16.0));
        engine.insert_image("s1", Raster::new(grid, vec![vh, vv]).unwrap());
        let image = add_ratio_band(&RasterExpr::image("s1"), "VV", "VH");
        let region = Region::rectangle(0.0, 0.0, 1.0, 1.0, CoordinateSystem::Projected).unwrap();
        let out = engine
            .compute(&image, &region, &ReduceOptions::new(1.0, 1.0, 10).unwrap())
            .unwrap();
        assert_eq!(out.band_names(), vec!["VH", "VV", RATIO_BAND]);
        assert_eq!(out.band(RATIO_BAND).unwrap().get(0, 0), Some(0.5));
    }

    #[test]
    fn params_validate() {
        assert!(ChangeParams::default().validate().is_ok());
        let bad = ChangeParams {
            threshold: 0.0,
            ..ChangeParams::default()
        };
        assert!(bad.validate().unwrap_err().is_configuration());
    }
}
