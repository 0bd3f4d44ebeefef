use clap::Parser;
use std::path::PathBuf;

use sarflood::types::BackscatterScale;

#[derive(Parser)]
#[command(
    name = "sarflood",
    version,
    about = "Flood extent and exposure from Sentinel-1 before/after imagery"
)]
pub struct CliArgs {
    /// Dataset catalog manifest (JSON)
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Level-0 (country) boundaries as a GeoJSON FeatureCollection
    #[arg(long)]
    pub countries: PathBuf,

    /// Level-1 (state) boundaries as a GeoJSON FeatureCollection
    #[arg(long)]
    pub states: PathBuf,

    /// Country name (ADM0_NAME)
    #[arg(long)]
    pub country: Option<String>,

    /// State name within the country (ADM1_NAME)
    #[arg(long)]
    pub state: Option<String>,

    /// First day of the pre-flood window (YYYY-MM-DD)
    #[arg(long)]
    pub before_start: Option<String>,

    /// Day after the pre-flood window (YYYY-MM-DD, exclusive)
    #[arg(long)]
    pub before_end: Option<String>,

    /// First day of the post-flood window (YYYY-MM-DD)
    #[arg(long)]
    pub after_start: Option<String>,

    /// Day after the post-flood window (YYYY-MM-DD, exclusive)
    #[arg(long)]
    pub after_end: Option<String>,

    /// Ground sample distance of the reductions, in metres
    #[arg(long)]
    pub scale: Option<f64>,

    /// Reduction tiling factor; larger values use smaller tiles
    #[arg(long)]
    pub tile_scale: Option<f64>,

    /// JSON file with analysis parameters; flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Change ratio threshold (after/before) above which a pixel is flooded
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Speckle filter radius in pixels
    #[arg(long)]
    pub speckle_radius: Option<usize>,

    /// Backscatter scale of the Sentinel-1 scenes in the catalog
    #[arg(long, value_enum)]
    pub input_scale: Option<BackscatterScale>,

    /// Print the statistics as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Enable debug logging
    #[arg(long, default_value_t = false)]
    pub log: bool,

    /// List the countries of the boundary files and exit
    #[arg(long, default_value_t = false)]
    pub list_countries: bool,

    /// List the states of a country and exit
    #[arg(long, value_name = "COUNTRY")]
    pub list_states: Option<String>,
}
