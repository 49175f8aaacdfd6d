//! Sdmxline OECD - SDMX-JSON dataset pipeline for the OECD statistics API
//!
//! Turns the compact, position-indexed SDMX-JSON documents (one dataflow
//! structure plus one data payload per partition) into fully resolved
//! series records with names, ordinals and validated frequencies.
//!
//! Pipeline, leaves first:
//!
//! - [`period`]: period label → ordinal
//! - `document`: typed serde views of both SDMX-JSON documents
//! - [`dataflow`]: structural document → [`DataflowStructure`]
//! - [`compact`]: data payload → [`IntermediateSeries`]
//! - [`driver`]: one retrieval per filter-dimension value, lazily
//! - [`materialize`]: intermediate series → storage-ready record
//!
//! # Example
//!
//! ```no_run
//! use sdmxline_core::{HttpDownloader, ProgressContext};
//! use sdmxline_oecd::{Config, run};
//! use sdmxline_store::Store;
//!
//! let config = Config {
//!     datasets: vec!["MEI".to_string()],
//!     ..Default::default()
//! };
//! let downloader = HttpDownloader::new(&config.cache_dir, config.reuse_cache)?;
//! let store = Store::new(&config.store_dir)?;
//!
//! let summary = run(&config, &downloader, &store, &ProgressContext::hidden())?;
//! println!("{} series written", summary.series_written());
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod api;
pub mod compact;
pub mod config;
pub mod dataflow;
mod document;
pub mod driver;
pub mod error;
pub mod materialize;
pub mod period;
pub mod registry;
pub mod runner;

// Re-exports
pub use compact::{IntermediateSeries, Observation};
pub use config::Config;
pub use dataflow::DataflowStructure;
pub use driver::PartitionedRetrieval;
pub use error::Error;
pub use materialize::Materializer;
pub use period::{Frequency, ordinal};
pub use registry::{DatasetSpec, Registry};
pub use runner::{DatasetSummary, RunSummary, run};

/// Id of the time dimension in SDMX-JSON documents
pub const TIME_DIMENSION: &str = "TIME_PERIOD";
