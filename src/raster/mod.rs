//! Raster data model: evaluated grids (`Grid`, `Band`, `Raster`), the lazy
//! expression builder (`expr`), image collections (`collection`) and vector
//! regions (`region`).
use ndarray::Array2;

use crate::error::{Error, Result};
use crate::types::CoordinateSystem;

pub mod collection;
pub mod expr;
pub mod region;

pub use collection::{CollectionFilter, ImageCollection, PropertyValue};
pub use expr::{BinaryOp, Node, RasterExpr};
pub use region::Region;

/// Equatorial WGS84 radius used for spherical areas and degree lengths.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Length of one degree of arc on the equator.
pub const METERS_PER_DEGREE: f64 = 2.0 * std::f64::consts::PI * EARTH_RADIUS_M / 360.0;

/// North-up pixel grid. `geotransform` follows the GDAL convention
/// `[origin_x, pixel_width, 0, origin_y, 0, pixel_height]` with a negative
/// `pixel_height`; rotated grids are not supported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    pub rows: usize,
    pub cols: usize,
    pub geotransform: [f64; 6],
    pub crs: CoordinateSystem,
}

impl Grid {
    pub fn new(rows: usize, cols: usize, geotransform: [f64; 6], crs: CoordinateSystem) -> Self {
        Self {
            rows,
            cols,
            geotransform,
            crs,
        }
    }

    /// Grid covering `[min_x, max_x] x [min_y, max_y]` with square pixels of
    /// `scale` metres (converted to degrees for geographic coordinates).
    pub fn covering(
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
        scale: f64,
        crs: CoordinateSystem,
    ) -> Self {
        let size = match crs {
            CoordinateSystem::Projected => scale,
            CoordinateSystem::Geographic => scale / METERS_PER_DEGREE,
        };
        let cols = (((max_x - min_x) / size).ceil() as usize).max(1);
        let rows = (((max_y - min_y) / size).ceil() as usize).max(1);
        Self::new(rows, cols, [min_x, size, 0.0, max_y, 0.0, -size], crs)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Pixel count, saturating at `usize::MAX`.
    pub fn len(&self) -> usize {
        self.rows.saturating_mul(self.cols)
    }

    /// Pixel count as checked against pixel budgets; saturates at `u64::MAX`
    /// for grids too large to address.
    pub fn pixel_count(&self) -> u64 {
        (self.rows as u64).saturating_mul(self.cols as u64)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Map coordinates of the centre of pixel (row, col).
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        let gt = &self.geotransform;
        (
            gt[0] + (col as f64 + 0.5) * gt[1],
            gt[3] + (row as f64 + 0.5) * gt[5],
        )
    }

    /// Pixel containing the map coordinate, if inside the grid.
    pub fn locate(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let gt = &self.geotransform;
        let col = ((x - gt[0]) / gt[1]).floor();
        let row = ((y - gt[3]) / gt[5]).floor();
        if col < 0.0 || row < 0.0 {
            return None;
        }
        let (row, col) = (row as usize, col as usize);
        (row < self.rows && col < self.cols).then_some((row, col))
    }

    /// Bounding box `(min_x, min_y, max_x, max_y)`.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let gt = &self.geotransform;
        let x0 = gt[0];
        let x1 = gt[0] + self.cols as f64 * gt[1];
        let y0 = gt[3];
        let y1 = gt[3] + self.rows as f64 * gt[5];
        (x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }

    /// Ground size of a pixel in metres `(dx, dy)` for the given row.
    pub fn cell_size_m(&self, row: usize) -> (f64, f64) {
        let gt = &self.geotransform;
        match self.crs {
            CoordinateSystem::Projected => (gt[1].abs(), gt[5].abs()),
            CoordinateSystem::Geographic => {
                let (_, lat) = self.pixel_center(row, 0);
                let dy = gt[5].abs() * METERS_PER_DEGREE;
                let dx = gt[1].abs() * METERS_PER_DEGREE * lat.to_radians().cos();
                (dx, dy)
            }
        }
    }

    /// Area of one pixel of the given row in square metres.
    pub fn pixel_area_m2(&self, row: usize) -> f64 {
        let gt = &self.geotransform;
        match self.crs {
            CoordinateSystem::Projected => (gt[1] * gt[5]).abs(),
            CoordinateSystem::Geographic => {
                let top = gt[3] + row as f64 * gt[5];
                let bottom = top + gt[5];
                let dlon = gt[1].abs().to_radians();
                EARTH_RADIUS_M
                    * EARTH_RADIUS_M
                    * dlon
                    * (top.to_radians().sin() - bottom.to_radians().sin()).abs()
            }
        }
    }
}

/// One named band with a per-pixel validity mask (`true` = valid).
#[derive(Debug, Clone)]
pub struct Band {
    pub name: String,
    pub values: Array2<f64>,
    pub mask: Array2<bool>,
}

impl Band {
    pub fn new(name: impl Into<String>, values: Array2<f64>, mask: Array2<bool>) -> Result<Self> {
        if values.dim() != mask.dim() {
            return Err(Error::InvalidExpression(format!(
                "band values {:?} and mask {:?} differ in shape",
                values.dim(),
                mask.dim()
            )));
        }
        Ok(Self {
            name: name.into(),
            values,
            mask,
        })
    }

    /// Band where every finite value is valid.
    pub fn from_values(name: impl Into<String>, values: Array2<f64>) -> Self {
        let mask = values.mapv(f64::is_finite);
        Self {
            name: name.into(),
            values,
            mask,
        }
    }

    pub fn valid_count(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        match self.mask.get((row, col)) {
            Some(true) => self.values.get((row, col)).copied(),
            _ => None,
        }
    }
}

/// An evaluated multi-band raster on a fixed grid.
#[derive(Debug, Clone)]
pub struct Raster {
    pub grid: Grid,
    pub bands: Vec<Band>,
}

impl Raster {
    pub fn new(grid: Grid, bands: Vec<Band>) -> Result<Self> {
        if let Some(band) = bands.iter().find(|b| b.values.dim() != grid.shape()) {
            return Err(Error::InvalidExpression(format!(
                "band {:?} has shape {:?}, grid is {:?}",
                band.name,
                band.values.dim(),
                grid.shape()
            )));
        }
        Ok(Self { grid, bands })
    }

    pub fn band_names(&self) -> Vec<&str> {
        self.bands.iter().map(|b| b.name.as_str()).collect()
    }

    pub fn band(&self, name: &str) -> Result<&Band> {
        self.bands
            .iter()
            .find(|b| b.name == name)
            .ok_or_else(|| Error::BandNotFound {
                band: name.to_string(),
                available: self.band_names().join(","),
            })
    }

    /// The only band of a single-band raster.
    pub fn single(&self) -> Result<&Band> {
        match self.bands.as_slice() {
            [band] => Ok(band),
            other => Err(Error::InvalidExpression(format!(
                "expected a single-band raster, got {} bands",
                other.len()
            ))),
        }
    }
}
