//! Administrative boundaries from GeoJSON feature collections.
//!
//! Level-0 features carry the country name in `ADM0_NAME`; level-1 features
//! carry both `ADM0_NAME` and the state name in `ADM1_NAME` (FAO GAUL
//! attribute names). Matching is exact; all matching features are merged.
use std::collections::BTreeSet;
use std::path::Path;

use geo::{Geometry, MultiPolygon, Polygon};
use geojson::{Feature, GeoJson};
use tracing::debug;

use crate::error::{Error, Result};
use crate::raster::Region;
use crate::types::CoordinateSystem;

pub const COUNTRY_FIELD: &str = "ADM0_NAME";
pub const STATE_FIELD: &str = "ADM1_NAME";

/// Country and state regions of one analysis.
#[derive(Debug, Clone)]
pub struct Boundaries {
    pub country: Region,
    pub state: Region,
}

pub trait BoundaryResolver: Send + Sync {
    /// Boundaries of `state` within `country`; `BoundaryNotFound` when
    /// either name has no match.
    fn resolve(&self, country: &str, state: &str) -> Result<Boundaries>;

    /// Sorted distinct country names.
    fn countries(&self) -> Vec<String>;

    /// Sorted distinct state names of a country.
    fn states(&self, country: &str) -> Vec<String>;
}

#[derive(Debug, Clone)]
struct AdminUnit {
    country: String,
    state: Option<String>,
    polygons: Vec<Polygon<f64>>,
}

#[derive(Debug, Clone)]
pub struct GeoJsonBoundaryResolver {
    countries: Vec<AdminUnit>,
    states: Vec<AdminUnit>,
    crs: CoordinateSystem,
}

impl GeoJsonBoundaryResolver {
    pub fn from_geojson(countries: &str, states: &str, crs: CoordinateSystem) -> Result<Self> {
        let countries = parse_units(countries, false)?;
        let states = parse_units(states, true)?;
        debug!(
            "Loaded {} country and {} state feature(s)",
            countries.len(),
            states.len()
        );
        Ok(Self {
            countries,
            states,
            crs,
        })
    }

    pub fn from_paths(countries: &Path, states: &Path, crs: CoordinateSystem) -> Result<Self> {
        Self::from_geojson(
            &std::fs::read_to_string(countries)?,
            &std::fs::read_to_string(states)?,
            crs,
        )
    }

    fn merge<'a>(&self, units: impl Iterator<Item = &'a AdminUnit>) -> Option<Result<Region>> {
        let polygons: Vec<Polygon<f64>> = units.flat_map(|u| u.polygons.iter().cloned()).collect();
        (!polygons.is_empty()).then(|| Region::new(MultiPolygon::new(polygons), self.crs))
    }
}

impl BoundaryResolver for GeoJsonBoundaryResolver {
    fn resolve(&self, country: &str, state: &str) -> Result<Boundaries> {
        let not_found = || Error::BoundaryNotFound {
            country: country.to_string(),
            state: state.to_string(),
        };
        let country_region = self
            .merge(self.countries.iter().filter(|u| u.country == country))
            .ok_or_else(not_found)??;
        let state_region = self
            .merge(
                self.states
                    .iter()
                    .filter(|u| u.country == country && u.state.as_deref() == Some(state)),
            )
            .ok_or_else(not_found)??;
        debug!(
            "Resolved {} / {}: {:.1} ha of {:.1} ha",
            state,
            country,
            state_region.area_hectares(),
            country_region.area_hectares()
        );
        Ok(Boundaries {
            country: country_region,
            state: state_region,
        })
    }

    fn countries(&self) -> Vec<String> {
        self.countries
            .iter()
            .map(|u| u.country.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn states(&self, country: &str) -> Vec<String> {
        self.states
            .iter()
            .filter(|u| u.country == country)
            .filter_map(|u| u.state.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

fn parse_units(text: &str, with_state: bool) -> Result<Vec<AdminUnit>> {
    let geojson: GeoJson = text
        .parse()
        .map_err(|e: geojson::Error| Error::Geometry(e.to_string()))?;
    let features = match geojson {
        GeoJson::FeatureCollection(collection) => collection.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(_) => {
            return Err(Error::Geometry(
                "expected a Feature or FeatureCollection".into(),
            ));
        }
    };
    features
        .into_iter()
        .filter_map(|feature| unit(feature, with_state).transpose())
        .collect()
}

/// Admin unit of a feature; `None` for features without a polygon or name.
fn unit(feature: Feature, with_state: bool) -> Result<Option<AdminUnit>> {
    let text = |key: &str| {
        feature
            .property(key)
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };
    let Some(country) = text(COUNTRY_FIELD) else {
        return Ok(None);
    };
    let state = text(STATE_FIELD);
    if with_state && state.is_none() {
        return Ok(None);
    }
    let Some(geometry) = feature.geometry else {
        return Ok(None);
    };
    let geometry = Geometry::<f64>::try_from(geometry.value)
        .map_err(|e| Error::Geometry(format!("{country}: {e}")))?;
    let polygons = match geometry {
        Geometry::Polygon(polygon) => vec![polygon],
        Geometry::MultiPolygon(multi) => multi.0,
        _ => return Ok(None),
    };
    Ok(Some(AdminUnit {
        country,
        state,
        polygons,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: f64, y: f64, size: f64, props: &str) -> String {
        format!(
            r#"{{"type":"Feature","properties":{{{props}}},"geometry":{{"type":"Polygon","coordinates":[[[{x},{y}],[{x1},{y}],[{x1},{y1}],[{x},{y1}],[{x},{y}]]]}}}}"#,
            x1 = x + size,
            y1 = y + size,
        )
    }

    fn resolver() -> GeoJsonBoundaryResolver {
        let countries = format!(
            r#"{{"type":"FeatureCollection","features":[{},{}]}}"#,
            square(0.0, 0.0, 4.0, r#""ADM0_NAME":"Pakistan""#),
            square(10.0, 0.0, 2.0, r#""ADM0_NAME":"India""#),
        );
        let states = format!(
            r#"{{"type":"FeatureCollection","features":[{},{},{},{}]}}"#,
            square(0.0, 0.0, 2.0, r#""ADM0_NAME":"Pakistan","ADM1_NAME":"Sindh""#),
            square(2.0, 0.0, 1.0, r#""ADM0_NAME":"Pakistan","ADM1_NAME":"Sindh""#),
            square(0.0, 2.0, 2.0, r#""ADM0_NAME":"Pakistan","ADM1_NAME":"Punjab""#),
            square(10.0, 0.0, 1.0, r#""ADM0_NAME":"India","ADM1_NAME":"Punjab""#),
        );
        GeoJsonBoundaryResolver::from_geojson(&countries, &states, CoordinateSystem::Projected).unwrap()
    }

    #[test]
    fn matching_features_are_merged() {
        let boundaries = resolver().resolve("Pakistan", "Sindh").unwrap();
        assert_eq!(boundaries.state.geometry().0.len(), 2);
        assert_eq!(boundaries.state.area_m2(), 5.0);
        assert_eq!(boundaries.country.area_m2(), 16.0);
    }

    #[test]
    fn state_must_belong_to_country() {
        let boundaries = resolver().resolve("India", "Punjab").unwrap();
        assert_eq!(boundaries.state.area_m2(), 1.0);
        let err = resolver().resolve("India", "Sindh").unwrap_err();
        assert!(matches!(err, Error::BoundaryNotFound { .. }));
        assert!(resolver().resolve("Atlantis", "Sindh").unwrap_err().is_configuration());
    }

    #[test]
    fn listings_are_sorted_and_distinct() {
        let resolver = resolver();
        assert_eq!(resolver.countries(), vec!["India", "Pakistan"]);
        assert_eq!(resolver.states("Pakistan"), vec!["Punjab", "Sindh"]);
        assert!(resolver.states("Atlantis").is_empty());
    }

    #[test]
    fn invalid_geojson_is_a_geometry_error() {
        let err = GeoJsonBoundaryResolver::from_geojson("{", "{}", CoordinateSystem::Projected)
            .unwrap_err();
        assert!(matches!(err, Error::Geometry(_)));
    }
}
