//! Raster engine seam.
//!
//! The flood pipeline only builds [`RasterExpr`] graphs; an engine decides how
//! and where they are evaluated. Evaluation is forced by `compute` and
//! `reduce_region`, which is also where construction errors (unknown bands,
//! missing datasets) and budget violations surface. A long evaluation either
//! completes or fails as a unit.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::raster::{ImageCollection, Raster, RasterExpr, Region};
use crate::types::Reducer;

pub mod memory;
pub use memory::{MemoryEngine, Scene};

/// Rows per reduction tile at `tile_scale == 1`.
pub const DEFAULT_TILE_ROWS: usize = 256;

/// Resolution and computation budget of one forced evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReduceOptions {
    /// Ground sample distance in metres
    pub scale: f64,
    /// Tile size divisor; larger values mean smaller tiles
    pub tile_scale: f64,
    /// Maximum number of pixels one evaluation may touch
    pub max_pixels: u64,
}

impl ReduceOptions {
    pub fn new(scale: f64, tile_scale: f64, max_pixels: u64) -> Result<Self> {
        let options = Self {
            scale,
            tile_scale,
            max_pixels,
        };
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(Error::config(
                "scale",
                format!("must be a positive number of metres, got {}", self.scale),
            ));
        }
        if !(self.tile_scale.is_finite() && self.tile_scale > 0.0) {
            return Err(Error::config(
                "tile_scale",
                format!("must be positive, got {}", self.tile_scale),
            ));
        }
        if self.max_pixels == 0 {
            return Err(Error::config("max_pixels", "must be at least 1"));
        }
        Ok(())
    }

    pub fn with_max_pixels(self, max_pixels: u64) -> Self {
        Self { max_pixels, ..self }
    }

    /// Rows per reduction tile.
    pub fn tile_rows(&self) -> usize {
        ((DEFAULT_TILE_ROWS as f64 / self.tile_scale).ceil() as usize).max(1)
    }

    /// Fail with `ResourceExceeded` when `pixels` is over budget.
    pub fn check_budget(&self, pixels: u64) -> Result<()> {
        if pixels > self.max_pixels {
            return Err(Error::ResourceExceeded {
                attempted: pixels,
                max_pixels: self.max_pixels,
                scale: self.scale,
                tile_scale: self.tile_scale,
            });
        }
        Ok(())
    }
}

/// Backend that stores imagery and evaluates expression graphs.
pub trait RasterEngine: Sync {
    /// Number of scenes passing the collection's filters.
    fn collection_size(&self, collection: &ImageCollection) -> Result<usize>;

    /// Whether a single image with this id exists.
    fn has_image(&self, id: &str) -> bool;

    /// Evaluate `expr` on the grid covering `region` at `options.scale`.
    fn compute(&self, expr: &RasterExpr, region: &Region, options: &ReduceOptions)
    -> Result<Raster>;

    /// Reduce each expression over `region`; one map of band name to value
    /// per expression. Sub-graphs shared between the expressions are
    /// evaluated once.
    fn reduce_region(
        &self,
        reducer: Reducer,
        exprs: &[&RasterExpr],
        region: &Region,
        options: &ReduceOptions,
    ) -> Result<Vec<BTreeMap<String, f64>>>;
}
