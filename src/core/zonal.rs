//! Zonal area statistics and the result record.
//!
//! Areas are sums of per-pixel area (m²) over the pixels a mask keeps,
//! reduced over the analysis region and converted to hectares. Percentages
//! with a zero denominator are reported as [`Metric::Undefined`].
use std::fmt;

use serde::ser::{SerializeSeq, Serializer};
use serde::Serialize;
use tracing::{debug, info};

use crate::engine::{RasterEngine, ReduceOptions};
use crate::error::{Error, Result};
use crate::raster::{RasterExpr, Region};
use crate::types::Reducer;

/// Square metres per hectare.
pub const M2_PER_HECTARE: f64 = 10_000.0;

/// Band produced by [`area_image`].
const AREA_BAND: &str = "area";

/// Metric labels in reporting order.
pub const STAT_LABELS: [&str; 8] = [
    "Total state area (ha)",
    "Flooded area (ha)",
    "% Flooded area (%)",
    "Crop land area (ha)",
    "Urban land area (ha)",
    "Flood affected urban area (ha)",
    "Flood affected crop area (ha)",
    "% Flood affected urban+crop area (%)",
];

/// A reported number, or the explicit marker for a ratio with a zero
/// denominator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Metric {
    Value(f64),
    Undefined,
}

impl Metric {
    /// `100 * part / whole`, undefined when `whole` is zero or not finite.
    pub fn percent(part: f64, whole: f64) -> Self {
        if whole > 0.0 && whole.is_finite() && part.is_finite() {
            Metric::Value(100.0 * part / whole)
        } else {
            Metric::Undefined
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Metric::Value(v) => Some(*v),
            Metric::Undefined => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Metric::Undefined)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Value(v) => write!(f, "{v:.3}"),
            Metric::Undefined => write!(f, "undefined"),
        }
    }
}

/// Values are rounded to three decimals; `Undefined` serializes as `null`.
impl Serialize for Metric {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Metric::Value(v) => serializer.serialize_f64((v * 1000.0).round() / 1000.0),
            Metric::Undefined => serializer.serialize_none(),
        }
    }
}

/// Hectare totals feeding a [`StatRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ZonalAreas {
    pub total: f64,
    pub flooded: f64,
    pub crop: f64,
    pub urban: f64,
    /// Area of the combined urban/crop layer
    pub urban_crop: f64,
    pub flooded_urban: f64,
    pub flooded_crop: f64,
}

/// Result of one analysis run, one field per reported metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatRecord {
    pub total_area_ha: Metric,
    pub flooded_area_ha: Metric,
    pub flooded_percent: Metric,
    pub crop_area_ha: Metric,
    pub urban_area_ha: Metric,
    pub flooded_urban_ha: Metric,
    pub flooded_crop_ha: Metric,
    pub flooded_urban_crop_percent: Metric,
}

impl From<ZonalAreas> for StatRecord {
    fn from(a: ZonalAreas) -> Self {
        Self {
            total_area_ha: Metric::Value(a.total),
            flooded_area_ha: Metric::Value(a.flooded),
            flooded_percent: Metric::percent(a.flooded, a.total),
            crop_area_ha: Metric::Value(a.crop),
            urban_area_ha: Metric::Value(a.urban),
            flooded_urban_ha: Metric::Value(a.flooded_urban),
            flooded_crop_ha: Metric::Value(a.flooded_crop),
            flooded_urban_crop_percent: Metric::percent(
                a.flooded_urban + a.flooded_crop,
                a.urban_crop,
            ),
        }
    }
}

impl StatRecord {
    /// `(label, metric)` pairs in reporting order.
    pub fn entries(&self) -> [(&'static str, Metric); 8] {
        [
            (STAT_LABELS[0], self.total_area_ha),
            (STAT_LABELS[1], self.flooded_area_ha),
            (STAT_LABELS[2], self.flooded_percent),
            (STAT_LABELS[3], self.crop_area_ha),
            (STAT_LABELS[4], self.urban_area_ha),
            (STAT_LABELS[5], self.flooded_urban_ha),
            (STAT_LABELS[6], self.flooded_crop_ha),
            (STAT_LABELS[7], self.flooded_urban_crop_percent),
        ]
    }

    pub fn get(&self, label: &str) -> Option<Metric> {
        self.entries()
            .into_iter()
            .find(|(l, _)| *l == label)
            .map(|(_, m)| m)
    }
}

impl fmt::Display for StatRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, metric) in self.entries() {
            writeln!(f, "{label}: {metric}")?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct Entry {
    label: &'static str,
    value: Metric,
}

impl Serialize for StatRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let entries = self.entries();
        let mut seq = serializer.serialize_seq(Some(entries.len()))?;
        for (label, value) in entries {
            seq.serialize_element(&Entry { label, value })?;
        }
        seq.end()
    }
}

/// Masks reduced by [`aggregate`].
#[derive(Debug, Clone, Copy)]
pub struct ZonalInputs<'a> {
    pub region: &'a Region,
    pub flood: &'a RasterExpr,
    pub urban: &'a RasterExpr,
    pub crop: &'a RasterExpr,
    pub combined: &'a RasterExpr,
    pub flooded_urban: &'a RasterExpr,
    pub flooded_crop: &'a RasterExpr,
}

/// Budgets of the two reduction groups.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZonalOptions {
    /// Flooded, flooded urban and flooded crop areas
    pub flood: ReduceOptions,
    /// Urban, crop and combined land-cover areas
    pub land_cover: ReduceOptions,
}

/// Per-pixel area where `mask` is valid and non-zero.
pub fn area_image(mask: &RasterExpr) -> RasterExpr {
    RasterExpr::pixel_area().update_mask(mask)
}

/// Reduce every area and assemble the record. The flood and land-cover
/// groups are reduced concurrently; the region area is taken from the
/// region itself.
pub fn aggregate<E>(engine: &E, inputs: &ZonalInputs<'_>, options: &ZonalOptions) -> Result<StatRecord>
where
    E: RasterEngine + ?Sized,
{
    let flood_group = [
        area_image(inputs.flood),
        area_image(inputs.flooded_urban),
        area_image(inputs.flooded_crop),
    ];
    let land_group = [
        area_image(inputs.crop),
        area_image(inputs.urban),
        area_image(inputs.combined),
    ];

    info!("Reducing flood and land-cover areas");
    let (flood_sums, land_sums) = rayon::join(
        || reduce_hectares(engine, &flood_group, inputs.region, &options.flood),
        || reduce_hectares(engine, &land_group, inputs.region, &options.land_cover),
    );
    let [flooded, flooded_urban, flooded_crop] = flood_sums?;
    let [crop, urban, urban_crop] = land_sums?;

    let total = inputs.region.area_hectares();
    // Coverage-weighted sums match the region area up to rounding.
    let within = |hectares: f64| hectares.min(total);
    let areas = ZonalAreas {
        total,
        flooded: within(flooded),
        crop: within(crop),
        urban: within(urban),
        urban_crop: within(urban_crop),
        flooded_urban: within(flooded_urban),
        flooded_crop: within(flooded_crop),
    };
    debug!("Zonal areas (ha): {:?}", areas);
    Ok(StatRecord::from(areas))
}

fn reduce_hectares<E, const N: usize>(
    engine: &E,
    exprs: &[RasterExpr; N],
    region: &Region,
    options: &ReduceOptions,
) -> Result<[f64; N]>
where
    E: RasterEngine + ?Sized,
{
    let refs: Vec<&RasterExpr> = exprs.iter().collect();
    let sums = engine.reduce_region(Reducer::Sum, &refs, region, options)?;
    if sums.len() != N {
        return Err(Error::InvalidExpression(format!(
            "expected {N} reductions, engine returned {}",
            sums.len()
        )));
    }
    let mut hectares = [0.0; N];
    for (slot, sum) in hectares.iter_mut().zip(&sums) {
        let m2 = sum.get(AREA_BAND).ok_or_else(|| Error::BandNotFound {
            band: AREA_BAND.to_string(),
            available: sum.keys().cloned().collect::<Vec<_>>().join(","),
        })?;
        *slot = m2 / M2_PER_HECTARE;
    }
    Ok(hectares)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MemoryEngine;
    use crate::raster::{Band, Grid, Raster};
    use crate::types::CoordinateSystem;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    fn areas() -> ZonalAreas {
        ZonalAreas {
            total: 1_000.0,
            flooded: 250.0,
            crop: 300.0,
            urban: 100.0,
            urban_crop: 400.0,
            flooded_urban: 20.0,
            flooded_crop: 80.0,
        }
    }

    #[test]
    fn labels_follow_reporting_order() {
        let record = StatRecord::from(areas());
        let labels: Vec<_> = record.entries().iter().map(|(l, _)| *l).collect();
        assert_eq!(labels, STAT_LABELS);
        assert_eq!(record.flooded_percent, Metric::Value(25.0));
        assert_eq!(record.flooded_urban_crop_percent, Metric::Value(25.0));
    }

    #[test]
    fn zero_denominators_are_undefined() {
        let record = StatRecord::from(ZonalAreas {
            crop: 0.0,
            urban: 0.0,
            urban_crop: 0.0,
            flooded_urban: 0.0,
            flooded_crop: 0.0,
            ..areas()
        });
        assert!(record.flooded_urban_crop_percent.is_undefined());
        assert_eq!(record.get("% Flood affected urban+crop area (%)"), Some(Metric::Undefined));

        let empty = StatRecord::from(ZonalAreas::default());
        assert!(empty.flooded_percent.is_undefined());
    }

    #[test]
    fn display_uses_three_decimals() {
        let record = StatRecord::from(ZonalAreas {
            urban_crop: 0.0,
            ..areas()
        });
        let text = record.to_string();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 8);
        assert_eq!(lines[0], "Total state area (ha): 1000.000");
        assert_eq!(lines[2], "% Flooded area (%): 25.000");
        assert_eq!(lines[7], "% Flood affected urban+crop area (%): undefined");
    }

    #[test]
    fn json_is_an_ordered_label_value_list() {
        let record = StatRecord::from(ZonalAreas {
            flooded: 1.0 / 3.0,
            urban_crop: 0.0,
            ..areas()
        });
        let json = serde_json::to_value(record).unwrap();
        let list = json.as_array().unwrap();
        assert_eq!(list.len(), 8);
        assert_eq!(list[1]["label"], "Flooded area (ha)");
        assert_eq!(list[1]["value"], 0.333);
        assert!(list[7]["value"].is_null());
    }

    #[test]
    fn aggregate_sums_pixel_areas() {
        // 10x10 grid of 100 m pixels = 1 ha each.
        let grid = Grid::covering(0.0, 0.0, 1_000.0, 1_000.0, 100.0, CoordinateSystem::Projected);
        let mut engine = MemoryEngine::new();
        let flood = Array2::from_shape_fn((10, 10), |(r, _)| if r < 4 { 1.0 } else { f64::NAN });
        let lc = Array2::from_shape_fn((10, 10), |(_, c)| match c {
            0..=1 => 13.0,
            2..=4 => 12.0,
            _ => 1.0,
        });
        engine.insert_image("flood", Raster::new(grid, vec![Band::from_values("floodwater", flood)]).unwrap());
        engine.insert_image("lc", Raster::new(grid, vec![Band::from_values("LC_Type1", lc)]).unwrap());

        let region = Region::rectangle(0.0, 0.0, 1_000.0, 1_000.0, CoordinateSystem::Projected).unwrap();
        let classes = crate::core::landcover::classify(
            &RasterExpr::image("lc"),
            &crate::core::landcover::LandCoverParams::default(),
        );
        let flood = RasterExpr::image("flood");
        let exposure = classes.intersect(&flood);
        let options = ReduceOptions::new(100.0, 2.0, 1_000).unwrap();
        let record = aggregate(
            &engine,
            &ZonalInputs {
                region: &region,
                flood: &flood,
                urban: &classes.urban,
                crop: &classes.crop,
                combined: &classes.combined,
                flooded_urban: &exposure.urban,
                flooded_crop: &exposure.crop,
            },
            &ZonalOptions {
                flood: options,
                land_cover: options,
            },
        )
        .unwrap();

        assert_relative_eq!(record.total_area_ha.value().unwrap(), 100.0);
        assert_relative_eq!(record.flooded_area_ha.value().unwrap(), 40.0);
        assert_relative_eq!(record.flooded_percent.value().unwrap(), 40.0);
        assert_relative_eq!(record.urban_area_ha.value().unwrap(), 20.0);
        assert_relative_eq!(record.crop_area_ha.value().unwrap(), 30.0);
        assert_relative_eq!(record.flooded_urban_ha.value().unwrap(), 8.0);
        assert_relative_eq!(record.flooded_crop_ha.value().unwrap(), 12.0);
        assert_relative_eq!(record.flooded_urban_crop_percent.value().unwrap(), 40.0);
    }

    #[test]
    fn boundary_pixels_count_only_their_covered_part() {
        // A diamond over a 3x3 grid of 1 ha pixels covers 4.5 ha; every pixel
        // it touches is flooded cropland.
        let grid = Grid::covering(0.0, 0.0, 300.0, 300.0, 100.0, CoordinateSystem::Projected);
        let mut engine = MemoryEngine::new();
        let flood = Array2::from_elem((3, 3), 1.0);
        let lc = Array2::from_elem((3, 3), 12.0);
        engine.insert_image("flood", Raster::new(grid, vec![Band::from_values("floodwater", flood)]).unwrap());
        engine.insert_image("lc", Raster::new(grid, vec![Band::from_values("LC_Type1", lc)]).unwrap());

        use geo::polygon;
        let diamond = geo::polygon![
            (x: 150.0, y: 0.0),
            (x: 300.0, y: 150.0),
            (x: 150.0, y: 300.0),
            (x: 0.0, y: 150.0)
        ];
        let region = Region::from_polygon(diamond, CoordinateSystem::Projected).unwrap();
        let classes = crate::core::landcover::classify(
            &RasterExpr::image("lc"),
            &crate::core::landcover::LandCoverParams::default(),
        );
        let flood = RasterExpr::image("flood");
        let exposure = classes.intersect(&flood);
        let options = ReduceOptions::new(100.0, 1.0, 1_000).unwrap();
        let record = aggregate(
            &engine,
            &ZonalInputs {
                region: &region,
                flood: &flood,
                urban: &classes.urban,
                crop: &classes.crop,
                combined: &classes.combined,
                flooded_urban: &exposure.urban,
                flooded_crop: &exposure.crop,
            },
            &ZonalOptions {
                flood: options,
                land_cover: options,
            },
        )
        .unwrap();

        let total = record.total_area_ha.value().unwrap();
        let flooded = record.flooded_area_ha.value().unwrap();
        assert_relative_eq!(total, 4.5, epsilon = 1e-9);
        assert!(flooded <= total, "flooded {flooded} ha of {total} ha");
        assert_relative_eq!(flooded, 4.5, epsilon = 1e-6);
        assert_relative_eq!(record.flooded_percent.value().unwrap(), 100.0, epsilon = 1e-4);
        assert_relative_eq!(record.crop_area_ha.value().unwrap(), 4.5, epsilon = 1e-6);
        assert_relative_eq!(record.flooded_crop_ha.value().unwrap(), 4.5, epsilon = 1e-6);
        assert_eq!(record.urban_area_ha.value().unwrap(), 0.0);
    }

    #[test]
    fn land_cover_budget_is_independent() {
        let grid = Grid::covering(0.0, 0.0, 1_000.0, 1_000.0, 100.0, CoordinateSystem::Projected);
        let mut engine = MemoryEngine::new();
        engine.insert_image("x", Raster::new(grid, vec![Band::from_values("x", Array2::ones((10, 10)))]).unwrap());
        let region = Region::rectangle(0.0, 0.0, 1_000.0, 1_000.0, CoordinateSystem::Projected).unwrap();
        let x = RasterExpr::image("x");
        let inputs = ZonalInputs {
            region: &region,
            flood: &x,
            urban: &x,
            crop: &x,
            combined: &x,
            flooded_urban: &x,
            flooded_crop: &x,
        };
        let roomy = ReduceOptions::new(100.0, 1.0, 1_000).unwrap();
        let err = aggregate(
            &engine,
            &inputs,
            &ZonalOptions {
                flood: roomy,
                land_cover: roomy.with_max_pixels(10),
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::ResourceExceeded { max_pixels: 10, .. }));
    }
}
