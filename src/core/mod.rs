//! Flood analysis building blocks.
//!
//! `speckle`, `change`, `composite`, `landcover` and `zonal` are the analysis
//! stages; `terrain` and `connectivity` are pixel kernels the in-memory engine
//! runs for slope and connected-component nodes; `pipeline` wires the stages
//! into one expression graph configured by `params`.
pub mod change;
pub mod composite;
pub mod connectivity;
pub mod landcover;
pub mod params;
pub mod pipeline;
pub mod speckle;
pub mod terrain;
pub mod zonal;
