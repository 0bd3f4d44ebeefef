#![doc = r#"
sarflood: flood extent and exposure mapping from Sentinel-1 imagery.

This crate compares pre- and post-event Sentinel-1 GRD backscatter over an
administrative region, removes permanent water, steep terrain and isolated
noise from the change mask, overlays MODIS land cover, and reports eight
area statistics (flooded hectares, affected cropland and urban land, and
the percentages derived from them). It powers the sarflood CLI and can be
embedded in your own Rust applications.

Stability
---------
The public library API is experimental in initial releases and may evolve
as the crate stabilizes. Breaking changes can occur.

Requirements
------------
- GDAL development headers and runtime available on your system (used to
  read catalog rasters).
- Rust 2024 edition toolchain.

Add dependency
--------------
```toml
[dependencies]
sarflood = "0.1"
```

Quick start: run one analysis
-----------------------------
```rust,no_run
use std::path::Path;
use sarflood::{
    load_catalog, run_analysis, AnalysisParams, AnalysisRequest, DateRange,
    GeoJsonBoundaryResolver, CoordinateSystem,
};

fn main() -> sarflood::Result<()> {
    let engine = load_catalog(Path::new("/data/catalog.json"))?;
    let resolver = GeoJsonBoundaryResolver::from_paths(
        Path::new("/data/gaul_level0.geojson"),
        Path::new("/data/gaul_level1.geojson"),
        CoordinateSystem::Geographic,
    )?;
    let request = AnalysisRequest::new(
        "Pakistan",
        "Sindh",
        DateRange::parse("2022-05-15", "2022-07-15")?,
        DateRange::parse("2022-07-15", "2022-09-15")?,
        500.0, // metres per pixel
        8.0,   // tile scale
    );

    let result = run_analysis(&engine, &resolver, &request, &AnalysisParams::default())?;
    print!("{}", result.stats);
    Ok(())
}
```

Statistics are returned as a [`StatRecord`] whose [`StatRecord::entries`]
yield the eight `(label, Metric)` pairs in a fixed order. A percentage
whose denominator is zero is [`Metric::Undefined`] rather than `NaN`.

Building expressions by hand
----------------------------
The pipeline stages are plain functions over lazy [`RasterExpr`] graphs and
can be composed directly; nothing is evaluated until a [`RasterEngine`]
computes or reduces the graph.

```rust
use sarflood::core::change::{self, ChangeParams};
use sarflood::RasterExpr;

let before = RasterExpr::image("before");
let after = RasterExpr::image("after");
let flood = change::detect(&before, &after, &ChangeParams::default());
let area = sarflood::core::zonal::area_image(&flood);
# let _ = area;
```

Error handling
--------------
All public functions return `sarflood::Result<T>`; match on
`sarflood::Error` to handle specific cases.

```rust,no_run
# use sarflood::{Error, Result};
# fn analyse() -> Result<()> { Ok(()) }
match analyse() {
    Ok(()) => {}
    Err(Error::BoundaryNotFound { country, state }) => eprintln!("no such region: {state} / {country}"),
    Err(Error::ResourceExceeded { attempted, max_pixels, .. }) => {
        eprintln!("{attempted} pixels exceed the budget of {max_pixels}; raise the scale")
    }
    Err(e) if e.is_configuration() => eprintln!("invalid input: {e}"),
    Err(other) => eprintln!("analysis failed: {other}"),
}
```

Useful modules
--------------
- [`api`]: `run_analysis` and its result.
- [`core`]: speckle filter, change detection, mask compositing, land-cover
  overlay and zonal statistics.
- [`engine`]: the `RasterEngine` seam and the in-memory evaluator.
- [`raster`]: rasters, regions, image collections and expressions.
- [`io`]: GDAL raster reading, dataset catalogs and GeoJSON boundaries.
- [`error`]: crate-level `Error` and `Result`.
"#]

// Core modules (public)
pub mod api;
pub mod core;
pub mod engine;
pub mod error;
pub mod io;
pub mod raster;
pub mod types;

// Curated public API surface
// Types
pub use crate::core::params::{AnalysisParams, AnalysisRequest, DatasetIds, Sentinel1Filter};
pub use crate::core::zonal::{Metric, STAT_LABELS, StatRecord};
pub use error::{Error, Result};
pub use types::{
    AnalysisWindow, BackscatterScale, Connectivity, CoordinateSystem, DateRange, Reducer,
};

// Data model and evaluation
pub use engine::{MemoryEngine, RasterEngine, ReduceOptions, Scene};
pub use raster::{Band, Grid, ImageCollection, Raster, RasterExpr, Region};

// Readers
pub use io::{
    Boundaries, BoundaryResolver, CatalogManifest, GdalError, GeoJsonBoundaryResolver,
    GeoRasterReader, load_catalog,
};

// High-level API re-exports
pub use api::{AnalysisResult, Layer, run_analysis};
