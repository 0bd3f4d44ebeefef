//! Analysis parameters and run requests, loadable from JSON config files.
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::change::ChangeParams;
use crate::core::composite::CompositeParams;
use crate::core::landcover::LandCoverParams;
use crate::core::speckle::SpeckleFilterParams;
use crate::engine::ReduceOptions;
use crate::error::{Error, Result};
use crate::types::{AnalysisWindow, DateRange};

/// Catalog ids of the datasets an analysis reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetIds {
    pub sentinel1: String,
    pub surface_water: String,
    pub seasonality_band: String,
    pub elevation: String,
    /// Land-cover image id; `{year}` is replaced by the year of the
    /// before-window start
    pub land_cover_template: String,
}

impl Default for DatasetIds {
    fn default() -> Self {
        Self {
            sentinel1: "COPERNICUS/S1_GRD".to_string(),
            surface_water: "JRC/GSW1_2/GlobalSurfaceWater".to_string(),
            seasonality_band: "seasonality".to_string(),
            elevation: "WWF/HydroSHEDS/03VFDEM".to_string(),
            land_cover_template: "MODIS/061/MCD12Q1/{year}_01_01".to_string(),
        }
    }
}

impl DatasetIds {
    pub fn land_cover_id(&self, year: i32) -> String {
        self.land_cover_template.replace("{year}", &year.to_string())
    }
}

/// Sentinel-1 GRD scene selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sentinel1Filter {
    pub instrument_mode: String,
    /// Every listed polarisation must be present in a scene
    pub polarisations: Vec<String>,
    pub orbit_pass: String,
    pub resolution_meters: f64,
    /// Co-polarised band (ratio numerator)
    pub co_band: String,
    /// Cross-polarised band (ratio denominator)
    pub cross_band: String,
}

impl Default for Sentinel1Filter {
    fn default() -> Self {
        Self {
            instrument_mode: "IW".to_string(),
            polarisations: vec!["VH".to_string(), "VV".to_string()],
            orbit_pass: "DESCENDING".to_string(),
            resolution_meters: 10.0,
            co_band: "VV".to_string(),
            cross_band: "VH".to_string(),
        }
    }
}

/// Every tunable of an analysis run, suitable for JSON config files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisParams {
    pub datasets: DatasetIds,
    pub sentinel1: Sentinel1Filter,
    pub speckle: SpeckleFilterParams,
    pub change: ChangeParams,
    pub composite: CompositeParams,
    pub land_cover: LandCoverParams,
    /// Ground sample distance in metres; must be given explicitly
    pub scale: Option<f64>,
    /// Reduction tiling factor; must be given explicitly
    pub tile_scale: Option<f64>,
    /// Pixel budget of flood reductions
    pub flood_max_pixels: u64,
    /// Pixel budget of land-cover reductions
    pub land_cover_max_pixels: u64,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            datasets: DatasetIds::default(),
            sentinel1: Sentinel1Filter::default(),
            speckle: SpeckleFilterParams::default(),
            change: ChangeParams::default(),
            composite: CompositeParams::default(),
            land_cover: LandCoverParams::default(),
            scale: None,
            tile_scale: None,
            flood_max_pixels: 10_000_000_000,
            land_cover_max_pixels: 1_000_000_000_000,
        }
    }
}

impl AnalysisParams {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.speckle.validate()?;
        self.change.validate()?;
        self.composite.validate()?;
        self.land_cover.validate()?;
        if self.sentinel1.co_band == self.sentinel1.cross_band {
            return Err(Error::config(
                "sentinel1.cross_band",
                "co- and cross-polarised bands must differ",
            ));
        }
        if !self.datasets.land_cover_template.contains("{year}") {
            return Err(Error::config(
                "datasets.land_cover_template",
                "must contain a {year} placeholder",
            ));
        }
        Ok(())
    }

    fn options(&self, max_pixels: u64) -> Result<ReduceOptions> {
        let scale = self
            .scale
            .ok_or_else(|| Error::config("scale", "must be given explicitly"))?;
        let tile_scale = self
            .tile_scale
            .ok_or_else(|| Error::config("tile_scale", "must be given explicitly"))?;
        ReduceOptions::new(scale, tile_scale, max_pixels)
    }

    pub fn flood_options(&self) -> Result<ReduceOptions> {
        self.options(self.flood_max_pixels)
    }

    pub fn land_cover_options(&self) -> Result<ReduceOptions> {
        self.options(self.land_cover_max_pixels)
    }
}

/// Inputs of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub country: String,
    pub state: String,
    pub window: AnalysisWindow,
    pub scale: f64,
    pub tile_scale: f64,
}

impl AnalysisRequest {
    pub fn new(
        country: impl Into<String>,
        state: impl Into<String>,
        before: DateRange,
        after: DateRange,
        scale: f64,
        tile_scale: f64,
    ) -> Self {
        Self {
            country: country.into(),
            state: state.into(),
            window: AnalysisWindow { before, after },
            scale,
            tile_scale,
        }
    }

    /// Reject inputs that would fail only after expensive evaluation.
    pub fn validate(&self) -> Result<()> {
        if self.country.trim().is_empty() {
            return Err(Error::config("country", "must not be empty"));
        }
        if self.state.trim().is_empty() {
            return Err(Error::config("state", "must not be empty"));
        }
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
        for (field, range) in [
            ("before", &self.window.before),
            ("after", &self.window.after),
        ] {
            if range.end <= range.start {
                return Err(Error::config(
                    field,
                    format!("end {} must be after start {}", range.end, range.start),
                ));
            }
        }
        Ok(())
    }

    /// `params` with this request's scale and tile scale applied.
    pub fn apply_to(&self, params: &AnalysisParams) -> AnalysisParams {
        AnalysisParams {
            scale: Some(self.scale),
            tile_scale: Some(self.tile_scale),
            ..params.clone()
        }
    }
}
