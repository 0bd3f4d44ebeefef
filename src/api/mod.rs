//! High-level library API: run one flood analysis from names, dates and
//! resolution knobs to display layers and the statistics record. Prefer this
//! entry point over wiring the `core` stages by hand.
use tracing::{info, warn};

use crate::core::params::{AnalysisParams, AnalysisRequest};
use crate::core::pipeline::{self, FloodGraph};
use crate::core::zonal::{self, StatRecord, ZonalInputs, ZonalOptions};
use crate::engine::RasterEngine;
use crate::error::Result;
use crate::io::boundaries::{Boundaries, BoundaryResolver};
use crate::raster::RasterExpr;

/// A raster meant for display, in drawing order.
#[derive(Debug, Clone)]
pub struct Layer {
    pub name: &'static str,
    pub image: RasterExpr,
}

/// Everything one analysis produces. Layers are unevaluated; use
/// [`RasterEngine::compute`] over `boundaries.state` to render them.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub boundaries: Boundaries,
    pub graph: FloodGraph,
    pub layers: Vec<Layer>,
    pub stats: StatRecord,
}

impl AnalysisResult {
    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }
}

pub const PERMANENT_WATER: &str = "Permanent Water";
pub const STEEP_TERRAIN: &str = "Steep Terrain";
pub const ISOLATED_PIXELS: &str = "Isolated Pixels";
pub const URBAN_AND_CROP: &str = "Urban and Crop Land";
pub const FLOODED_LAND: &str = "Flooded Land";
pub const FLOODED_URBAN: &str = "Flooded Urban Land";
pub const FLOODED_CROP: &str = "Flooded Crop Land";

fn layers(graph: &FloodGraph) -> Vec<Layer> {
    [
        (PERMANENT_WATER, &graph.masks.permanent_water),
        (STEEP_TERRAIN, &graph.masks.steep_terrain),
        (ISOLATED_PIXELS, &graph.masks.removed_isolated),
        (URBAN_AND_CROP, &graph.land_cover.combined),
        (FLOODED_LAND, graph.flood()),
        (FLOODED_URBAN, &graph.exposure.urban),
        (FLOODED_CROP, &graph.exposure.crop),
    ]
    .into_iter()
    .map(|(name, image)| Layer {
        name,
        image: image.clone(),
    })
    .collect()
}

/// Detect flooding in `request.state` of `request.country` and report the
/// affected areas.
///
/// Inputs are validated and every dataset is checked for availability before
/// any pixel is evaluated. Overlapping before/after windows are logged and
/// accepted.
pub fn run_analysis<E, R>(
    engine: &E,
    resolver: &R,
    request: &AnalysisRequest,
    params: &AnalysisParams,
) -> Result<AnalysisResult>
where
    E: RasterEngine + ?Sized,
    R: BoundaryResolver + ?Sized,
{
    request.validate()?;
    let params = request.apply_to(params);
    params.validate()?;
    let window = &request.window;
    if window.overlaps() {
        warn!(
            "Before window {} overlaps after window {}; flood ratios will be diluted",
            window.before, window.after
        );
    }

    info!("Resolving boundaries for {} / {}", request.state, request.country);
    let boundaries = resolver.resolve(&request.country, &request.state)?;
    let region = &boundaries.state;

    pipeline::check_inputs(engine, &params, region, window)?;
    info!(
        "Building flood graph at {} m (tile scale {})",
        request.scale, request.tile_scale
    );
    let graph = pipeline::build(&params, region, window);

    let options = ZonalOptions {
        flood: params.flood_options()?,
        land_cover: params.land_cover_options()?,
    };
    let stats = zonal::aggregate(
        engine,
        &ZonalInputs {
            region,
            flood: graph.flood(),
            urban: &graph.land_cover.urban,
            crop: &graph.land_cover.crop,
            combined: &graph.land_cover.combined,
            flooded_urban: &graph.exposure.urban,
            flooded_crop: &graph.exposure.crop,
        },
        &options,
    )?;
    info!("Analysis complete for {} / {}", request.state, request.country);

    Ok(AnalysisResult {
        layers: layers(&graph),
        boundaries,
        graph,
        stats,
    })
}
