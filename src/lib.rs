//! # vecbatch
//!
//! Batch conversion of geospatial vector files through `ogr2ogr`.
//!
//! ## Features
//!
//! - Mirrors the source directory tree into the destination
//! - Skips files whose output already exists (unless overwriting)
//! - GeoJSON or newline-delimited GeoJSON output, optional reprojection
//! - Optional gzip copy of each converted file
//! - Sequential or bounded-parallel execution
//! - Timestamped, append-only run log with a final summary line
//!
//! ## Quick Start
//!
//! ```no_run
//! use vecbatch::{Config, Pipeline};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::builder()
//!     .source_dir("./shapes")
//!     .dest_dir("./geojson")
//!     .target_crs(4326)
//!     .parallel(true)
//!     .build()?;
//!
//! let summary = Pipeline::new(config)?.run()?;
//! println!("{}", summary.summary_line());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! 1. **Scanner**: Enumerates input files once, before any work starts
//! 2. **Mirror**: Maps each input's directory into the destination tree
//! 3. **Task**: Decides skip/run and builds the converter's argument list
//! 4. **Invoker**: Runs the converter and classifies its exit status
//! 5. **Compress**: Optionally gzips successful single-document outputs
//! 6. **Scheduler**: Runs tasks one by one or on a bounded worker pool
//! 7. **Report**: Records outcomes, writes the log, computes the summary

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod compress;
mod config;
mod error;
mod invoker;
mod mirror;
mod pipeline;
mod report;
mod scanner;
mod scheduler;
mod task;

#[cfg(all(test, unix))]
mod test_support;

pub use compress::{compressed_path, GZIP_SUFFIX};
pub use config::{
    resolve_workers, Config, ConfigBuilder, ConversionOptions, OutputFormat, MAX_PRECISION,
    MAX_WORKERS,
};
pub use error::{Error, Result};
pub use pipeline::Pipeline;
pub use report::{OutcomeKind, RunSummary, TaskOutcome};
pub use task::{ConversionTask, ConverterArg};

/// Runs a complete batch conversion with the given configuration.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid
/// - Source directory doesn't exist
/// - Destination directory cannot be created
/// - The converter cannot be found
/// - The run log cannot be created
///
/// # Examples
///
/// ```no_run
/// use vecbatch::{Config, run};
///
/// # fn main() -> anyhow::Result<()> {
/// let config = Config::builder()
///     .source_dir("./shapes")
///     .dest_dir("./out")
///     .build()?;
///
/// run(config)?;
/// # Ok(())
/// # }
/// ```
pub fn run(config: Config) -> Result<RunSummary> {
    Pipeline::new(config)?.run()
}
