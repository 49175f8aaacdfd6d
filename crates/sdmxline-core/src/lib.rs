//! Sdmxline Core - Common infrastructure for statistical data pipelines
//!
//! This crate provides the pieces every provider pipeline shares:
//! a cached HTTP downloader, retry policy, logging, progress reporting,
//! cooperative shutdown and the storage-ready record types.

pub mod download;
pub mod logging;
pub mod progress;
pub mod record;
pub mod retry;
pub mod shutdown;
pub mod stream;

// Re-exports for convenience
pub use download::{Downloader, FetchRequest, Fetched, HttpDownloader};
pub use logging::{IndicatifLogger, init_logging};
pub use progress::ProgressContext;
pub use record::{DatasetMetadata, ObservationRecord, RowError, SeriesRecord};
pub use shutdown::{install_signal_handlers, is_shutdown_requested, request_shutdown};
pub use stream::{HttpConfig, SHARED_RUNTIME, StreamError, http_client, http_config, set_http_config};
