//! In-process engine over rasters held in memory.
//!
//! Every forced evaluation picks one target grid: the bounding box of the
//! reduction region at the requested scale. Catalog rasters are resampled onto
//! it with nearest-neighbour lookup of pixel centres. Evaluated nodes are
//! memoised by identity for the duration of one call.
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ndarray::parallel::prelude::*;
use ndarray::{Array2, Zip};
use tracing::{debug, info};

use crate::core::connectivity::connected_pixel_count;
use crate::core::speckle::speckle_filter;
use crate::core::terrain::slope_degrees;
use crate::engine::{RasterEngine, ReduceOptions};
use crate::error::{Error, Result};
use crate::raster::{
    Band, BinaryOp, Grid, ImageCollection, Node, PropertyValue, Raster, RasterExpr, Region,
};
use crate::types::Reducer;

/// One acquisition of a collection.
#[derive(Debug, Clone)]
pub struct Scene {
    pub id: String,
    pub acquired: DateTime<Utc>,
    pub properties: BTreeMap<String, PropertyValue>,
    pub raster: Raster,
}

impl Scene {
    pub fn footprint(&self) -> (f64, f64, f64, f64) {
        self.raster.grid.bounds()
    }
}

#[derive(Debug, Default)]
pub struct MemoryEngine {
    images: HashMap<String, Raster>,
    collections: HashMap<String, Vec<Scene>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_image(&mut self, id: impl Into<String>, raster: Raster) {
        self.images.insert(id.into(), raster);
    }

    pub fn insert_scene(&mut self, collection: impl Into<String>, scene: Scene) {
        self.collections.entry(collection.into()).or_default().push(scene);
    }

    pub fn image_ids(&self) -> impl Iterator<Item = &str> {
        self.images.keys().map(String::as_str)
    }

    pub fn scene_count(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, Vec::len)
    }

    /// Matching scenes, oldest first.
    fn matching_scenes(&self, collection: &ImageCollection) -> Vec<&Scene> {
        let mut scenes: Vec<&Scene> = self
            .collections
            .get(collection.dataset())
            .map(|all| {
                all.iter()
                    .filter(|s| collection.matches(&s.acquired, &s.properties, s.footprint()))
                    .collect()
            })
            .unwrap_or_default();
        scenes.sort_by_key(|s| s.acquired);
        scenes
    }

    fn target_grid(&self, region: &Region, options: &ReduceOptions) -> Result<Grid> {
        options.validate()?;
        let grid = region.grid(options.scale);
        options.check_budget(grid.pixel_count())?;
        Ok(grid)
    }
}

impl RasterEngine for MemoryEngine {
    fn collection_size(&self, collection: &ImageCollection) -> Result<usize> {
        Ok(self.matching_scenes(collection).len())
    }

    fn has_image(&self, id: &str) -> bool {
        self.images.contains_key(id)
    }

    fn compute(
        &self,
        expr: &RasterExpr,
        region: &Region,
        options: &ReduceOptions,
    ) -> Result<Raster> {
        let grid = self.target_grid(region, options)?;
        let mut evaluator = Evaluator::new(self, grid);
        let raster = evaluator.eval(expr)?;
        Ok(Arc::try_unwrap(raster).unwrap_or_else(|shared| (*shared).clone()))
    }

    fn reduce_region(
        &self,
        reducer: Reducer,
        exprs: &[&RasterExpr],
        region: &Region,
        options: &ReduceOptions,
    ) -> Result<Vec<BTreeMap<String, f64>>> {
        let grid = self.target_grid(region, options)?;
        info!(
            "Reducing {} expression(s) over {}x{} pixels at {} m (tile rows {})",
            exprs.len(),
            grid.rows,
            grid.cols,
            options.scale,
            options.tile_rows()
        );
        let mut evaluator = Evaluator::new(self, grid);
        let coverage = evaluator.region_coverage(region);
        let tile_rows = options.tile_rows();

        let mut results = Vec::with_capacity(exprs.len());
        for expr in exprs {
            let raster = evaluator.eval(expr)?;
            let mut reduced = BTreeMap::new();
            for band in &raster.bands {
                let value = reduce_band(band, &coverage, reducer, tile_rows);
                debug!("{:?} of band {} = {}", reducer, band.name, value);
                reduced.insert(band.name.clone(), value);
            }
            results.push(reduced);
        }
        Ok(results)
    }
}

/// Sum or count of valid pixels inside the region, tile by tile. Sums weight
/// each pixel by the fraction of it covered by the region; counts include
/// every pixel the region touches.
fn reduce_band(band: &Band, coverage: &Array2<f64>, reducer: Reducer, tile_rows: usize) -> f64 {
    let (rows, cols) = band.values.dim();
    let tiles = rows.div_ceil(tile_rows);
    let partials: Vec<f64> = (0..tiles)
        .into_par_iter()
        .map(|tile| {
            let start = tile * tile_rows;
            let end = (start + tile_rows).min(rows);
            let mut acc = 0.0;
            for row in start..end {
                for col in 0..cols {
                    let weight = coverage[[row, col]];
                    if band.mask[[row, col]] && weight > 0.0 {
                        acc += match reducer {
                            Reducer::Sum => band.values[[row, col]] * weight,
                            Reducer::Count => 1.0,
                        };
                    }
                }
            }
            acc
        })
        .collect();
    partials.iter().sum()
}

struct Evaluator<'a> {
    engine: &'a MemoryEngine,
    grid: Grid,
    memo: HashMap<usize, Arc<Raster>>,
    region_coverage: HashMap<usize, Arc<Array2<f64>>>,
}

impl<'a> Evaluator<'a> {
    fn new(engine: &'a MemoryEngine, grid: Grid) -> Self {
        Self {
            engine,
            grid,
            memo: HashMap::new(),
            region_coverage: HashMap::new(),
        }
    }

    fn region_coverage(&mut self, region: &Region) -> Arc<Array2<f64>> {
        let grid = self.grid;
        self.region_coverage
            .entry(region.id())
            .or_insert_with(|| Arc::new(region.coverage(&grid)))
            .clone()
    }

    fn eval(&mut self, expr: &RasterExpr) -> Result<Arc<Raster>> {
        if let Some(hit) = self.memo.get(&expr.id()) {
            return Ok(hit.clone());
        }
        let raster = Arc::new(self.eval_node(expr.node())?);
        self.memo.insert(expr.id(), raster.clone());
        Ok(raster)
    }

    fn eval_node(&mut self, node: &Node) -> Result<Raster> {
        let grid = self.grid;
        match node {
            Node::Image(id) => {
                let source = self
                    .engine
                    .images
                    .get(id)
                    .ok_or_else(|| Error::DataUnavailable {
                        dataset: id.clone(),
                        detail: "image not found in catalog".into(),
                    })?;
                let lookup = pixel_lookup(&source.grid, &grid)?;
                let bands = source
                    .bands
                    .iter()
                    .map(|band| resample(band, &lookup))
                    .collect();
                Raster::new(grid, bands)
            }
            Node::Mosaic(collection) => self.mosaic(collection),
            Node::Constant(value) => Raster::new(
                grid,
                vec![Band::from_values(
                    "constant",
                    Array2::from_elem(grid.shape(), *value),
                )],
            ),
            Node::PixelArea => Raster::new(
                grid,
                vec![Band::from_values(
                    "area",
                    Array2::from_shape_fn(grid.shape(), |(row, _)| grid.pixel_area_m2(row)),
                )],
            ),
            Node::Select(input, names) => {
                let input = self.eval(input)?;
                let bands = names
                    .iter()
                    .map(|name| input.band(name).cloned())
                    .collect::<Result<Vec<_>>>()?;
                Raster::new(grid, bands)
            }
            Node::Rename(input, names) => {
                let input = self.eval(input)?;
                if input.bands.len() != names.len() {
                    return Err(Error::InvalidExpression(format!(
                        "cannot rename {} band(s) to {:?}",
                        input.bands.len(),
                        names
                    )));
                }
                let bands = input
                    .bands
                    .iter()
                    .zip(names)
                    .map(|(band, name)| Band {
                        name: name.clone(),
                        ..band.clone()
                    })
                    .collect();
                Raster::new(grid, bands)
            }
            Node::AddBands(left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                let bands = left.bands.iter().chain(&right.bands).cloned().collect();
                Raster::new(grid, bands)
            }
            Node::Binary(op, left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                let bands = paired(&left, &right)?
                    .into_iter()
                    .map(|(a, b, name)| binary(*op, a, b, name))
                    .collect();
                Raster::new(grid, bands)
            }
            Node::Where {
                input,
                condition,
                value,
            } => {
                let input = self.eval(input)?;
                let condition = self.eval(condition)?;
                let value = self.eval(value)?;
                let mut bands = Vec::with_capacity(input.bands.len());
                for (index, band) in input.bands.iter().enumerate() {
                    let cond = broadcast(&condition, index, input.bands.len())?;
                    let replacement = broadcast(&value, index, input.bands.len())?;
                    bands.push(replace_where(band, cond, replacement));
                }
                Raster::new(grid, bands)
            }
            Node::SelfMask(input) => {
                let input = self.eval(input)?;
                let bands = input
                    .bands
                    .iter()
                    .map(|band| {
                        let mut out = band.clone();
                        Zip::from(&mut out.mask)
                            .and(&band.values)
                            .par_for_each(|m, &v| *m = *m && v != 0.0);
                        out
                    })
                    .collect();
                Raster::new(grid, bands)
            }
            Node::UpdateMask(input, mask) => {
                let input = self.eval(input)?;
                let mask = self.eval(mask)?;
                let mut bands = Vec::with_capacity(input.bands.len());
                for (index, band) in input.bands.iter().enumerate() {
                    let gate = broadcast(&mask, index, input.bands.len())?;
                    let mut out = band.clone();
                    Zip::from(&mut out.mask)
                        .and(&gate.mask)
                        .and(&gate.values)
                        .par_for_each(|m, &g, &v| *m = *m && g && v != 0.0);
                    bands.push(out);
                }
                Raster::new(grid, bands)
            }
            Node::Clip(input, region) => {
                let input = self.eval(input)?;
                let coverage = self.region_coverage(region);
                let bands = input
                    .bands
                    .iter()
                    .map(|band| {
                        let mut out = band.clone();
                        Zip::from(&mut out.mask)
                            .and(coverage.as_ref())
                            .par_for_each(|m, &w| *m = *m && w > 0.0);
                        out
                    })
                    .collect();
                Raster::new(grid, bands)
            }
            Node::SpeckleFilter(input, params) => {
                let input = self.eval(input)?;
                speckle_filter(&input, params)
            }
            Node::TerrainSlope(input) => {
                let input = self.eval(input)?;
                let elevation = input.single()?;
                Raster::new(grid, vec![slope_degrees(elevation, &grid)])
            }
            Node::ConnectedPixelCount {
                input,
                max_size,
                connectivity,
            } => {
                let input = self.eval(input)?;
                let bands = input
                    .bands
                    .iter()
                    .map(|band| connected_pixel_count(band, *max_size, *connectivity))
                    .collect();
                Raster::new(grid, bands)
            }
        }
    }

    fn mosaic(&mut self, collection: &ImageCollection) -> Result<Raster> {
        let grid = self.grid;
        let scenes = self.engine.matching_scenes(collection);
        let Some(first) = scenes.first() else {
            return Err(Error::DataUnavailable {
                dataset: collection.dataset().to_string(),
                detail: format!(
                    "no scene matches {} filter(s) ({} scene(s) in catalog)",
                    collection.filters().len(),
                    self.engine.scene_count(collection.dataset())
                ),
            });
        };
        let names: Vec<String> = match collection.bands() {
            Some(bands) => bands.to_vec(),
            None => first.raster.bands.iter().map(|b| b.name.clone()).collect(),
        };
        debug!(
            "Mosaicking {} scene(s) of {} into bands {:?}",
            scenes.len(),
            collection.dataset(),
            names
        );

        let mut bands: Vec<Band> = names
            .iter()
            .map(|name| Band {
                name: name.clone(),
                values: Array2::from_elem(grid.shape(), f64::NAN),
                mask: Array2::from_elem(grid.shape(), false),
            })
            .collect();

        for scene in scenes {
            let lookup = pixel_lookup(&scene.raster.grid, &grid)?;
            for out in bands.iter_mut() {
                let source = scene.raster.band(&out.name)?;
                Zip::from(&mut out.values)
                    .and(&mut out.mask)
                    .and(&lookup)
                    .par_for_each(|value, valid, &at| {
                        if let Some(v) = at.and_then(|(r, c)| source.get(r, c)) {
                            *value = v;
                            *valid = true;
                        }
                    });
            }
        }
        Raster::new(grid, bands)
    }
}

/// Source pixel under the centre of every target pixel.
fn pixel_lookup(source: &Grid, target: &Grid) -> Result<Array2<Option<(usize, usize)>>> {
    if source.crs != target.crs {
        return Err(Error::InvalidExpression(format!(
            "cannot resample {:?} data onto a {:?} grid",
            source.crs, target.crs
        )));
    }
    let mut lookup = Array2::from_elem(target.shape(), None);
    Zip::indexed(&mut lookup).par_for_each(|(row, col), at| {
        let (x, y) = target.pixel_center(row, col);
        *at = source.locate(x, y);
    });
    Ok(lookup)
}

fn resample(band: &Band, lookup: &Array2<Option<(usize, usize)>>) -> Band {
    let mut values = Array2::from_elem(lookup.dim(), f64::NAN);
    let mut mask = Array2::from_elem(lookup.dim(), false);
    Zip::from(&mut values)
        .and(&mut mask)
        .and(lookup)
        .par_for_each(|value, valid, &at| {
            if let Some(v) = at.and_then(|(r, c)| band.get(r, c)) {
                *value = v;
                *valid = true;
            }
        });
    Band {
        name: band.name.clone(),
        values,
        mask,
    }
}

/// Band pairs for a per-band binary operation. Single-band operands
/// broadcast; output names come from the multi-band side, else the left.
fn paired<'r>(left: &'r Raster, right: &'r Raster) -> Result<Vec<(&'r Band, &'r Band, String)>> {
    match (left.bands.len(), right.bands.len()) {
        (n, m) if n == m => Ok(left
            .bands
            .iter()
            .zip(&right.bands)
            .map(|(a, b)| (a, b, a.name.clone()))
            .collect()),
        (_, 1) => Ok(left
            .bands
            .iter()
            .map(|a| (a, &right.bands[0], a.name.clone()))
            .collect()),
        (1, _) => Ok(right
            .bands
            .iter()
            .map(|b| (&left.bands[0], b, b.name.clone()))
            .collect()),
        (n, m) => Err(Error::InvalidExpression(format!(
            "band count mismatch: {n} vs {m} ({:?} vs {:?})",
            left.band_names(),
            right.band_names()
        ))),
    }
}

fn broadcast(raster: &Raster, index: usize, count: usize) -> Result<&Band> {
    match raster.bands.len() {
        1 => Ok(&raster.bands[0]),
        n if n == count => Ok(&raster.bands[index]),
        n => Err(Error::InvalidExpression(format!(
            "expected 1 or {count} band(s), got {n}"
        ))),
    }
}

fn binary(op: BinaryOp, a: &Band, b: &Band, name: String) -> Band {
    let mut values = Array2::from_elem(a.values.dim(), f64::NAN);
    let mut mask = Array2::from_elem(a.values.dim(), false);
    Zip::from(&mut values)
        .and(&mut mask)
        .and(&a.values)
        .and(&a.mask)
        .and(&b.values)
        .and(&b.mask)
        .par_for_each(|out, valid, &x, &xm, &y, &ym| {
            if xm && ym {
                if let Some(v) = op.apply(x, y) {
                    *out = v;
                    *valid = true;
                }
            }
        });
    Band { name, values, mask }
}

fn replace_where(band: &Band, condition: &Band, value: &Band) -> Band {
    let mut out = band.clone();
    Zip::from(&mut out.values)
        .and(&mut out.mask)
        .and(&condition.values)
        .and(&condition.mask)
        .and(&value.values)
        .and(&value.mask)
        .par_for_each(|v, m, &c, &cm, &r, &rm| {
            if cm && c != 0.0 {
                *v = r;
                *m = rm;
            }
        });
    out
}
