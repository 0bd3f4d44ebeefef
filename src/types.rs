//! Shared types and enums used across the flood analysis.
//! Includes `BackscatterScale`, `Connectivity`, `Reducer`, `CoordinateSystem`,
//! and the date windows (`DateRange`, `AnalysisWindow`).
use chrono::{DateTime, NaiveDate, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Radiometric scale of backscatter bands as declared by the caller.
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackscatterScale {
    /// Power values in decibels (Sentinel-1 GRD as distributed)
    Decibel,
    /// Linear power / ratio values
    Linear,
}

impl std::fmt::Display for BackscatterScale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackscatterScale::Decibel => write!(f, "Decibel"),
            BackscatterScale::Linear => write!(f, "Linear"),
        }
    }
}

/// Pixel neighbourhood used when grouping pixels into connected components.
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Four,
    Eight,
}

impl Connectivity {
    pub fn offsets(&self) -> &'static [(isize, isize)] {
        const FOUR: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
        const EIGHT: [(isize, isize); 8] = [
            (-1, -1),
            (-1, 0),
            (-1, 1),
            (0, -1),
            (0, 1),
            (1, -1),
            (1, 0),
            (1, 1),
        ];
        match self {
            Connectivity::Four => &FOUR,
            Connectivity::Eight => &EIGHT,
        }
    }
}

/// Region reductions supported by the engine.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Reducer {
    /// Sum of valid pixel values
    Sum,
    /// Number of valid pixels
    Count,
}

impl std::fmt::Display for Reducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reducer::Sum => write!(f, "Sum"),
            Reducer::Count => write!(f, "Count"),
        }
    }
}

/// Coordinate system shared by regions and raster grids.
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateSystem {
    /// Longitude/latitude degrees on the WGS84 sphere
    #[default]
    Geographic,
    /// Planar coordinates in metres
    Projected,
}

/// Half-open calendar date range `[start, end)`.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end <= start {
            return Err(Error::config(
                "date_range",
                format!("end {end} must be after start {start}"),
            ));
        }
        Ok(Self { start, end })
    }

    /// Parse `YYYY-MM-DD` bounds.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|e| Error::config("date_range", format!("{s:?}: {e}")))
        };
        Self::new(parse(start)?, parse(end)?)
    }

    pub fn contains(&self, time: &DateTime<Utc>) -> bool {
        let day = time.date_naive();
        day >= self.start && day < self.end
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Before/after acquisition windows of one analysis run.
///
/// `before.end <= after.start` is assumed for meaningful change detection but
/// is not enforced; see [`AnalysisWindow::overlaps`].
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct AnalysisWindow {
    pub before: DateRange,
    pub after: DateRange,
}

impl AnalysisWindow {
    pub fn overlaps(&self) -> bool {
        self.after.start < self.before.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn date_range_is_half_open() {
        let range = DateRange::parse("2022-07-15", "2022-09-15").unwrap();
        let first = Utc.with_ymd_and_hms(2022, 7, 15, 0, 0, 0).unwrap();
        let last = Utc.with_ymd_and_hms(2022, 9, 14, 23, 59, 59).unwrap();
        let end = Utc.with_ymd_and_hms(2022, 9, 15, 0, 0, 0).unwrap();
        assert!(range.contains(&first));
        assert!(range.contains(&last));
        assert!(!range.contains(&end));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = DateRange::parse("2022-09-15", "2022-07-15").unwrap_err();
        assert!(err.is_configuration());
        assert!(DateRange::parse("2022-13-01", "2022-14-01").is_err());
    }

    #[test]
    fn overlapping_windows_are_detected() {
        let window = AnalysisWindow {
            before: DateRange::parse("2022-05-15", "2022-07-20").unwrap(),
            after: DateRange::parse("2022-07-15", "2022-09-15").unwrap(),
        };
        assert!(window.overlaps());
        let window = AnalysisWindow {
            before: DateRange::parse("2022-05-15", "2022-07-15").unwrap(),
            after: DateRange::parse("2022-07-15", "2022-09-15").unwrap(),
        };
        assert!(!window.overlaps());
    }
}
