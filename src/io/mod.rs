//! I/O layer: GDAL raster reading, the JSON dataset catalog that feeds the
//! in-memory engine, and GeoJSON administrative boundaries.
pub mod boundaries;
pub use boundaries::{Boundaries, BoundaryResolver, GeoJsonBoundaryResolver};

pub mod catalog;
pub use catalog::{CatalogManifest, load_catalog};

pub mod gdal;
pub use gdal::{GdalError, GdalMetadata, GeoRasterReader};
