//! Vector regions used to clip rasters and weight reductions.
use std::sync::Arc;

use geo::{
    Area, BooleanOps, BoundingRect, ChamberlainDuquetteArea, Contains, LinesIter, MultiPolygon,
    Point, Polygon, Rect,
};
use ndarray::{Array2, Zip, s};

use crate::error::{Error, Result};
use crate::raster::Grid;
use crate::types::CoordinateSystem;

/// Coverage fractions this close to 0 or 1 are treated as exact.
const COVERAGE_EPSILON: f64 = 1e-9;

#[derive(Debug)]
struct RegionInner {
    geometry: MultiPolygon<f64>,
    crs: CoordinateSystem,
    bounds: (f64, f64, f64, f64),
    area_m2: f64,
}

/// A (multi)polygon with its area computed once at construction.
///
/// Cloning is cheap; all clones share the geometry and the area so every
/// percentage derived from one region uses the same denominator.
#[derive(Debug, Clone)]
pub struct Region {
    inner: Arc<RegionInner>,
}

impl Region {
    pub fn new(geometry: MultiPolygon<f64>, crs: CoordinateSystem) -> Result<Self> {
        let rect = geometry
            .bounding_rect()
            .ok_or_else(|| Error::Geometry("region has no coordinates".into()))?;
        let area_m2 = match crs {
            CoordinateSystem::Projected => geometry.unsigned_area(),
            CoordinateSystem::Geographic => geometry.chamberlain_duquette_unsigned_area(),
        };
        Ok(Self {
            inner: Arc::new(RegionInner {
                geometry,
                crs,
                bounds: (rect.min().x, rect.min().y, rect.max().x, rect.max().y),
                area_m2,
            }),
        })
    }

    pub fn from_polygon(polygon: Polygon<f64>, crs: CoordinateSystem) -> Result<Self> {
        Self::new(MultiPolygon::new(vec![polygon]), crs)
    }

    /// Axis-aligned rectangle, handy for synthetic scenes.
    pub fn rectangle(
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
        crs: CoordinateSystem,
    ) -> Result<Self> {
        let rect = geo::Rect::new((min_x, min_y), (max_x, max_y));
        Self::from_polygon(rect.to_polygon(), crs)
    }

    /// Identity shared by all clones of this region.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.inner.geometry
    }

    pub fn crs(&self) -> CoordinateSystem {
        self.inner.crs
    }

    /// `(min_x, min_y, max_x, max_y)`
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.inner.bounds
    }

    pub fn area_m2(&self) -> f64 {
        self.inner.area_m2
    }

    pub fn area_hectares(&self) -> f64 {
        self.inner.area_m2 / 10_000.0
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.inner.geometry.contains(&Point::new(x, y))
    }

    pub fn intersects_bounds(&self, other: (f64, f64, f64, f64)) -> bool {
        let (a0, b0, a1, b1) = self.inner.bounds;
        let (c0, d0, c1, d1) = other;
        a0 <= c1 && a1 >= c0 && b0 <= d1 && b1 >= d0
    }

    /// Analysis grid over the region's bounding box at `scale` metres.
    pub fn grid(&self, scale: f64) -> Grid {
        let (x0, y0, x1, y1) = self.inner.bounds;
        Grid::covering(x0, y0, x1, y1, scale, self.inner.crs)
    }

    /// Fraction of each pixel of `grid` covered by the region, in `[0, 1]`.
    ///
    /// Pixels crossed by a region edge are intersected with the region
    /// exactly. Every other pixel lies wholly inside or outside, which its
    /// centre decides.
    pub fn coverage(&self, grid: &Grid) -> Array2<f64> {
        let edges = self.edge_cells(grid);
        let mut weights = Array2::zeros(grid.shape());
        Zip::indexed(&mut weights)
            .and(&edges)
            .par_for_each(|(row, col), weight, &edge| {
                *weight = if edge {
                    self.cell_fraction(grid, row, col)
                } else {
                    let (x, y) = grid.pixel_center(row, col);
                    if self.contains(x, y) { 1.0 } else { 0.0 }
                };
            });
        weights
    }

    /// Pixels of `grid` that overlap the region.
    pub fn rasterize(&self, grid: &Grid) -> Array2<bool> {
        self.coverage(grid).mapv(|w| w > 0.0)
    }

    /// Cells whose extent meets the bounding box of some region edge.
    fn edge_cells(&self, grid: &Grid) -> Array2<bool> {
        let (rows, cols) = grid.shape();
        let gt = &grid.geotransform;
        let mut edges = Array2::from_elem((rows, cols), false);
        for line in self.inner.geometry.lines_iter() {
            let Some((c0, c1)) = cell_span(gt[0], gt[1], line.start.x, line.end.x, cols) else {
                continue;
            };
            let Some((r0, r1)) = cell_span(gt[3], gt[5], line.start.y, line.end.y, rows) else {
                continue;
            };
            edges.slice_mut(s![r0..=r1, c0..=c1]).fill(true);
        }
        edges
    }

    fn cell_fraction(&self, grid: &Grid, row: usize, col: usize) -> f64 {
        let gt = &grid.geotransform;
        let x0 = gt[0] + col as f64 * gt[1];
        let y0 = gt[3] + row as f64 * gt[5];
        let cell = Rect::new((x0, y0), (x0 + gt[1], y0 + gt[5])).to_polygon();
        let cell_area = cell.unsigned_area();
        if cell_area <= 0.0 {
            return 0.0;
        }
        let covered = MultiPolygon::new(vec![cell])
            .intersection(&self.inner.geometry)
            .unsigned_area();
        let fraction = (covered / cell_area).clamp(0.0, 1.0);
        if fraction < COVERAGE_EPSILON {
            0.0
        } else if fraction > 1.0 - COVERAGE_EPSILON {
            1.0
        } else {
            fraction
        }
    }
}

/// Inclusive range of cell indices along one axis touched by the segment
/// `[a, b]`, or `None` when it misses all `n` cells. Coordinates on a cell
/// boundary mark the cells on both sides.
fn cell_span(origin: f64, step: f64, a: f64, b: f64, n: usize) -> Option<(usize, usize)> {
    let (i0, i1) = ((a - origin) / step, (b - origin) / step);
    let lo = (i0.min(i1).ceil() - 1.0).max(0.0);
    let hi = i0.max(i1).floor();
    if n == 0 || hi < 0.0 || lo >= n as f64 || lo.is_nan() || hi.is_nan() {
        return None;
    }
    Some((lo as usize, (hi as usize).min(n - 1)))
}
