//! sdmxline-store: Per-dataset series store
//!
//! Keeps the latest state of every series of a dataset, with blake3
//! content hashes to tell unchanged series from updated ones. Writes are
//! staged and only become visible on commit.

pub mod export;
pub mod hash;
pub mod manifest;
pub mod store;

pub use hash::{hash_file, series_hash, short_hash};
pub use manifest::{DatasetManifest, SeriesEntry};
pub use store::{DatasetEntry, StagedUpsert, Store, UpsertReport, VerifyResult};
