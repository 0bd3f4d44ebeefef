//! Command Line Interface (CLI) layer for sarflood.
//!
//! This module defines argument parsing (`args`), error types (`errors`),
//! and the orchestration logic (`runner`): load the catalog and boundaries,
//! merge the JSON config with flags, run one analysis and print the
//! statistics.
//!
//! If you are embedding the analysis into another application, prefer
//! `sarflood::api::run_analysis` instead of calling the CLI code.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
