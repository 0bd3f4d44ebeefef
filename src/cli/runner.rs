use std::path::Path;

use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use sarflood::api::run_analysis;
use sarflood::io::{BoundaryResolver, CatalogManifest, GeoJsonBoundaryResolver};
use sarflood::types::{CoordinateSystem, DateRange};
use sarflood::{AnalysisParams, AnalysisRequest};

use super::args::CliArgs;
use super::errors::AppError;

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn required<'a, T>(value: &'a Option<T>, arg: &str) -> Result<&'a T, AppError> {
    value.as_ref().ok_or_else(|| AppError::missing(arg))
}

/// Config file values with command-line overrides applied.
fn merged_params(args: &CliArgs) -> Result<AnalysisParams, AppError> {
    let mut params = match &args.config {
        Some(path) => AnalysisParams::from_json_file(path)?,
        None => AnalysisParams::default(),
    };
    if let Some(threshold) = args.threshold {
        params.change.threshold = threshold;
    }
    if let Some(radius) = args.speckle_radius {
        params.speckle.radius = radius;
    }
    if let Some(scale) = args.input_scale {
        params.speckle.input_scale = scale;
    }
    if args.scale.is_some() {
        params.scale = args.scale;
    }
    if args.tile_scale.is_some() {
        params.tile_scale = args.tile_scale;
    }
    debug!("Effective parameters: {:?}", params);
    Ok(params)
}

fn request(args: &CliArgs, params: &AnalysisParams) -> Result<AnalysisRequest, AppError> {
    let before = DateRange::parse(
        required(&args.before_start, "before-start")?,
        required(&args.before_end, "before-end")?,
    )?;
    let after = DateRange::parse(
        required(&args.after_start, "after-start")?,
        required(&args.after_end, "after-end")?,
    )?;
    Ok(AnalysisRequest::new(
        required(&args.country, "country")?.as_str(),
        required(&args.state, "state")?.as_str(),
        before,
        after,
        *required(&params.scale, "scale")?,
        *required(&params.tile_scale, "tile-scale")?,
    ))
}

fn resolver(args: &CliArgs, crs: CoordinateSystem) -> Result<GeoJsonBoundaryResolver, AppError> {
    Ok(GeoJsonBoundaryResolver::from_paths(
        &args.countries,
        &args.states,
        crs,
    )?)
}

fn list(args: &CliArgs) -> Result<bool, AppError> {
    if !args.list_countries && args.list_states.is_none() {
        return Ok(false);
    }
    let resolver = resolver(args, CoordinateSystem::default())?;
    if args.list_countries {
        for country in resolver.countries() {
            println!("{country}");
        }
    }
    if let Some(country) = &args.list_states {
        for state in resolver.states(country) {
            println!("{state}");
        }
    }
    Ok(true)
}

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(args.log);

    if list(&args)? {
        return Ok(());
    }

    let params = merged_params(&args)?;
    let request = request(&args, &params)?;

    let catalog_path = required(&args.catalog, "catalog")?;
    let manifest = CatalogManifest::from_json_file(catalog_path).map_err(AppError::from)?;
    let base_dir = catalog_path.parent().unwrap_or_else(|| Path::new("."));
    let engine = manifest.load(base_dir).map_err(AppError::from)?;
    let resolver = resolver(&args, manifest.crs)?;

    info!(
        "Analysing {} / {}: before {}, after {}",
        request.state, request.country, request.window.before, request.window.after
    );
    let result = run_analysis(&engine, &resolver, &request, &params).map_err(AppError::from)?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result.stats).map_err(AppError::from)?
        );
    } else {
        print!("{}", result.stats);
    }
    Ok(())
}
