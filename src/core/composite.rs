//! Flood mask refinement.
//!
//! Three steps, applied in this order, each one only removing pixels:
//!
//! 1. permanent water (seasonality at or above the threshold) is removed,
//! 2. pixels on slopes at or above the slope threshold are removed,
//! 3. pixels in connected patches of at most `isolation_threshold` pixels
//!    are removed as noise.
//!
//! Every intermediate mask and every removed set is returned so callers can
//! display what each step excluded.
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::raster::RasterExpr;
use crate::types::Connectivity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeParams {
    /// Months per year of surface water from which a pixel is permanent water
    pub seasonality_threshold: u8,
    /// Slope in degrees from which terrain is too steep to hold floodwater
    pub slope_threshold: f64,
    /// Cap on the connected pixel count
    pub isolation_search: usize,
    /// Patches of at most this many pixels are removed
    pub isolation_threshold: usize,
    pub connectivity: Connectivity,
}

impl Default for CompositeParams {
    fn default() -> Self {
        Self {
            seasonality_threshold: 6,
            slope_threshold: 10.0,
            isolation_search: 25,
            isolation_threshold: 4,
            connectivity: Connectivity::Eight,
        }
    }
}

impl CompositeParams {
    pub fn validate(&self) -> Result<()> {
        if !(1..=12).contains(&self.seasonality_threshold) {
            return Err(Error::config(
                "composite.seasonality_threshold",
                format!("must be 1..=12 months, got {}", self.seasonality_threshold),
            ));
        }
        if !(self.slope_threshold.is_finite() && self.slope_threshold > 0.0) {
            return Err(Error::config(
                "composite.slope_threshold",
                format!("must be a positive angle, got {}", self.slope_threshold),
            ));
        }
        if self.isolation_threshold >= self.isolation_search {
            return Err(Error::config(
                "composite.isolation_threshold",
                format!(
                    "{} must be below the search cap {}",
                    self.isolation_threshold, self.isolation_search
                ),
            ));
        }
        Ok(())
    }
}

/// Intermediate, final and removed masks of one refinement run.
#[derive(Debug, Clone)]
pub struct CompositeMasks {
    pub raw: RasterExpr,
    pub after_water: RasterExpr,
    pub after_slope: RasterExpr,
    pub final_mask: RasterExpr,
    /// Flood pixels removed as permanent water
    pub removed_water: RasterExpr,
    /// Flood pixels removed as steep terrain
    pub removed_slope: RasterExpr,
    /// Flood pixels removed as isolated noise
    pub removed_isolated: RasterExpr,
    /// All permanent water in the scene
    pub permanent_water: RasterExpr,
    /// All terrain at or above the slope threshold
    pub steep_terrain: RasterExpr,
    /// Connected pixel counts of the slope-filtered mask
    pub pixel_count: RasterExpr,
}

#[derive(Debug, Clone, Default)]
pub struct MaskCompositor {
    params: CompositeParams,
}

impl MaskCompositor {
    pub fn new(params: CompositeParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &CompositeParams {
        &self.params
    }

    /// Refine a binary flood mask with a water seasonality image and an
    /// elevation model.
    pub fn composite(
        &self,
        flood: &RasterExpr,
        seasonality: &RasterExpr,
        elevation: &RasterExpr,
    ) -> CompositeMasks {
        let p = &self.params;
        debug!(
            "Compositing with seasonality >= {}, slope >= {} deg, patches <= {} px ({:?})",
            p.seasonality_threshold, p.slope_threshold, p.isolation_threshold, p.connectivity
        );

        let permanent = seasonality.gte(f64::from(p.seasonality_threshold));
        let after_water = flood.where_(&permanent, 0.0).self_mask();

        let slope = elevation.terrain_slope();
        let after_slope = after_water.update_mask(&slope.lt(p.slope_threshold));

        let pixel_count = after_slope.connected_pixel_count(p.isolation_search, p.connectivity);
        let final_mask = after_slope.update_mask(&pixel_count.gt(p.isolation_threshold as f64));

        CompositeMasks {
            removed_water: flood.update_mask(&permanent),
            removed_slope: after_water.update_mask(&slope.gte(p.slope_threshold)),
            removed_isolated: after_slope
                .update_mask(&pixel_count.lte(p.isolation_threshold as f64)),
            permanent_water: permanent.self_mask(),
            steep_terrain: slope.gte(p.slope_threshold).self_mask(),
            raw: flood.clone(),
            after_water,
            after_slope,
            final_mask,
            pixel_count,
        }
    }
}
