use gdal::raster::ResampleAlg;
use gdal::{Dataset, Metadata, errors::GdalError as GdalCrateError};
use ndarray::Array2;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::raster::{Band, Grid, Raster};
use crate::types::CoordinateSystem;

/// Errors encountered when using the GDAL reader
#[derive(Debug, Error)]
pub enum GdalError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] GdalCrateError),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Dimension mismatch: expected {0}x{1}, got {2}x{3}")]
    DimensionMismatch(usize, usize, usize, usize),
    #[error("Rotated geotransform not supported: {0:?}")]
    RotatedGrid([f64; 6]),
}

/// Metadata extracted from a GDAL-supported dataset
#[derive(Debug, Clone)]
pub struct GdalMetadata {
    /// Width (pixels) of the raster
    pub size_x: usize,
    /// Height (lines) of the raster
    pub size_y: usize,
    /// Number of raster bands
    pub bands: usize,
    /// Affine geotransform coefficients ([origin_x, pixel_width, rot_x, origin_y, rot_y, pixel_height])
    pub geotransform: [f64; 6],
    /// Projection in WKT format, or `EPSG:<code>` when an authority tag is present
    pub projection: String,
    /// Additional metadata key-value pairs
    pub metadata: HashMap<String, String>,
}

/// Reader for georeferenced rasters (GeoTIFF, ASCII grid, ...) via GDAL
pub struct GeoRasterReader {
    pub dataset: Dataset,
    pub metadata: GdalMetadata,
}

// Helper to extract EPSG code from WKT authority tag
fn parse_epsg(wkt: &str) -> Option<String> {
    const KEY: &str = "AUTHORITY[\"EPSG\",\"";
    let start = wkt.rfind(KEY)? + KEY.len();
    let end = wkt[start..].find('"')?;
    Some(format!("EPSG:{}", &wkt[start..start + end]))
}

impl GeoRasterReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GdalError> {
        let dataset = Dataset::open(path.as_ref())?;
        let (size_x, size_y) = dataset.raster_size();
        let (size_x, size_y) = (size_x as usize, size_y as usize);
        let bands = dataset.raster_count() as usize;
        if bands == 0 {
            return Err(GdalError::UnsupportedFormat("No raster bands found".into()));
        }
        let geotransform = dataset
            .geo_transform()
            .unwrap_or([0.0, 1.0, 0.0, 0.0, 0.0, -1.0]);
        if geotransform[2] != 0.0 || geotransform[4] != 0.0 {
            return Err(GdalError::RotatedGrid(geotransform));
        }
        let proj = dataset.projection();
        let projection = parse_epsg(&proj).unwrap_or(proj);

        let mut metadata_map = HashMap::new();
        if let Some(entries) = dataset.metadata_domain("") {
            for entry in entries {
                if let Some((key, val)) = entry.split_once('=') {
                    metadata_map.insert(key.to_string(), val.to_string());
                }
            }
        }
        debug!(
            "Opened {} ({}x{}, {} band(s), {})",
            path.as_ref().display(),
            size_x,
            size_y,
            bands,
            projection
        );
        Ok(GeoRasterReader {
            dataset,
            metadata: GdalMetadata {
                size_x,
                size_y,
                bands,
                geotransform,
                projection,
                metadata: metadata_map,
            },
        })
    }

    pub fn grid(&self, crs: CoordinateSystem) -> Grid {
        Grid::new(
            self.metadata.size_y,
            self.metadata.size_x,
            self.metadata.geotransform,
            crs,
        )
    }

    /// Read a single band (1-based index) as an f64 ndarray of shape (height, width)
    pub fn read_band(&self, index: usize) -> Result<Array2<f64>, GdalError> {
        if index == 0 || index > self.metadata.bands {
            return Err(GdalError::UnsupportedFormat(format!(
                "Band index {} out of range",
                index
            )));
        }
        let band = self.dataset.rasterband(index)?;
        let window = (self.metadata.size_x, self.metadata.size_y);
        let buf = band.read_as::<f64>((0, 0), window, window, Some(ResampleAlg::NearestNeighbour))?;
        let data_vec = buf.data().to_vec();
        let got = data_vec.len();
        Array2::from_shape_vec((self.metadata.size_y, self.metadata.size_x), data_vec).map_err(
            |_| GdalError::DimensionMismatch(self.metadata.size_x, self.metadata.size_y, got, 1),
        )
    }

    /// Band name: the explicit name if given, else the GDAL band description,
    /// else `b<index>`.
    fn band_name(&self, index: usize, explicit: Option<&String>) -> Result<String, GdalError> {
        if let Some(name) = explicit {
            return Ok(name.clone());
        }
        let description = self.dataset.rasterband(index)?.description()?;
        Ok(if description.trim().is_empty() {
            format!("b{index}")
        } else {
            description
        })
    }

    /// Read one band with nodata and non-finite values masked.
    pub fn read_masked_band(&self, index: usize, name: Option<&String>) -> Result<Band, GdalError> {
        let values = self.read_band(index)?;
        let nodata = self.dataset.rasterband(index)?.no_data_value();
        let mask = values.mapv(|v| v.is_finite() && Some(v) != nodata);
        Ok(Band {
            name: self.band_name(index, name)?,
            values,
            mask,
        })
    }

    /// Read every band into a [`Raster`]. `names`, when given, renames the
    /// bands in file order and must match the band count.
    pub fn read_raster(
        &self,
        crs: CoordinateSystem,
        names: Option<&[String]>,
    ) -> Result<Raster, GdalError> {
        if let Some(names) = names {
            if names.len() != self.metadata.bands {
                return Err(GdalError::UnsupportedFormat(format!(
                    "{} band name(s) given for {} band(s)",
                    names.len(),
                    self.metadata.bands
                )));
            }
        }
        let bands = (1..=self.metadata.bands)
            .map(|idx| self.read_masked_band(idx, names.and_then(|n| n.get(idx - 1))))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Raster {
            grid: self.grid(crs),
            bands,
        })
    }
}
