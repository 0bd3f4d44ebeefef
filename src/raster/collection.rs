//! Filterable image collections, reduced to single rasters by mosaicking.
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::raster::Region;
use crate::raster::expr::RasterExpr;
use crate::types::DateRange;

/// Scene property value as stored in a catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Number(value)
    }
}

#[derive(Debug, Clone)]
pub enum CollectionFilter {
    /// Acquisition time within the half-open date range
    Date(DateRange),
    /// Property equals value
    Eq {
        property: String,
        value: PropertyValue,
    },
    /// List property contains the text value
    ListContains { property: String, value: String },
    /// Scene footprint intersects the region's bounding box
    Bounds(Region),
}

impl CollectionFilter {
    pub fn matches(
        &self,
        acquired: &DateTime<Utc>,
        properties: &BTreeMap<String, PropertyValue>,
        footprint: (f64, f64, f64, f64),
    ) -> bool {
        match self {
            CollectionFilter::Date(range) => range.contains(acquired),
            CollectionFilter::Eq { property, value } => properties.get(property) == Some(value),
            CollectionFilter::ListContains { property, value } => matches!(
                properties.get(property),
                Some(PropertyValue::List(items)) if items.iter().any(|i| i == value)
            ),
            CollectionFilter::Bounds(region) => region.intersects_bounds(footprint),
        }
    }
}

/// Description of a filtered, band-selected view over a catalog collection.
/// Nothing is loaded until an engine evaluates it.
#[derive(Debug, Clone)]
pub struct ImageCollection {
    dataset: String,
    filters: Vec<CollectionFilter>,
    bands: Option<Vec<String>>,
}

impl ImageCollection {
    pub fn load(dataset: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            filters: Vec::new(),
            bands: None,
        }
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn filters(&self) -> &[CollectionFilter] {
        &self.filters
    }

    pub fn bands(&self) -> Option<&[String]> {
        self.bands.as_deref()
    }

    fn with(mut self, filter: CollectionFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn filter_date(self, range: DateRange) -> Self {
        self.with(CollectionFilter::Date(range))
    }

    pub fn filter_eq(self, property: &str, value: impl Into<PropertyValue>) -> Self {
        self.with(CollectionFilter::Eq {
            property: property.to_string(),
            value: value.into(),
        })
    }

    pub fn filter_list_contains(self, property: &str, value: &str) -> Self {
        self.with(CollectionFilter::ListContains {
            property: property.to_string(),
            value: value.to_string(),
        })
    }

    pub fn filter_bounds(self, region: &Region) -> Self {
        self.with(CollectionFilter::Bounds(region.clone()))
    }

    pub fn select(mut self, bands: &[&str]) -> Self {
        self.bands = Some(bands.iter().map(|b| b.to_string()).collect());
        self
    }

    pub fn matches(
        &self,
        acquired: &DateTime<Utc>,
        properties: &BTreeMap<String, PropertyValue>,
        footprint: (f64, f64, f64, f64),
    ) -> bool {
        self.filters
            .iter()
            .all(|f| f.matches(acquired, properties, footprint))
    }

    /// Composite where later acquisitions overwrite earlier ones.
    pub fn mosaic(&self) -> RasterExpr {
        RasterExpr::mosaic(self.clone())
    }
}
