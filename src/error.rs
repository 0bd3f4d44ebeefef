//! Crate-level error type and `Result` alias for structured error handling.
//! Configuration problems and missing data are reported before any raster is
//! evaluated; budget failures carry the attempted budget so callers can retry
//! with a coarser scale or a larger tile scale.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] crate::io::GdalError),

    #[error("Invalid configuration: {field}: {reason}")]
    Configuration { field: &'static str, reason: String },

    #[error("No boundary found for country={country:?}, state={state:?}")]
    BoundaryNotFound { country: String, state: String },

    #[error("No data available for {dataset}: {detail}")]
    DataUnavailable { dataset: String, detail: String },

    #[error(
        "Computation budget exceeded: {attempted} pixels requested, max_pixels={max_pixels} (scale={scale}, tile_scale={tile_scale})"
    )]
    ResourceExceeded {
        attempted: u64,
        max_pixels: u64,
        scale: f64,
        tile_scale: f64,
    },

    #[error("Band {band:?} not found. Available: {available}")]
    BandNotFound { band: String, available: String },

    #[error("Invalid raster expression: {0}")]
    InvalidExpression(String),

    #[error("Geometry error: {0}")]
    Geometry(String),
}

impl Error {
    pub fn config<S: Into<String>>(field: &'static str, reason: S) -> Self {
        Error::Configuration {
            field,
            reason: reason.into(),
        }
    }

    /// Errors caused by the caller's inputs rather than by data or resources.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Configuration { .. } | Error::BoundaryNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_lookup_failure_counts_as_configuration() {
        let err = Error::BoundaryNotFound {
            country: "Atlantis".into(),
            state: "Sunk".into(),
        };
        assert!(err.is_configuration());
        assert!(!Error::InvalidExpression("x".into()).is_configuration());
    }

    #[test]
    fn resource_error_reports_budget() {
        let err = Error::ResourceExceeded {
            attempted: 2_000,
            max_pixels: 1_000,
            scale: 500.0,
            tile_scale: 8.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("2000"));
        assert!(msg.contains("max_pixels=1000"));
        assert!(msg.contains("tile_scale=8"));
    }
}
