//! Runtime configuration for OECD retrievals

use std::path::PathBuf;

use crate::api::DEFAULT_BASE_URL;
use crate::registry::{DatasetSpec, Registry};

/// Runtime configuration for one `run`
#[derive(Debug, Clone)]
pub struct Config {
    /// Dataset codes to retrieve, in order
    pub datasets: Vec<String>,
    pub registry: Registry,
    pub base_url: String,
    pub store_dir: PathBuf,
    pub cache_dir: PathBuf,
    /// Keep downloaded documents after a dataset finishes
    pub keep_downloads: bool,
    /// Serve documents from the cache directory when present
    pub reuse_cache: bool,
    /// Datasets retrieved in parallel
    pub workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            datasets: Vec::new(),
            registry: Registry::builtin(),
            base_url: DEFAULT_BASE_URL.to_string(),
            store_dir: PathBuf::from("./data"),
            cache_dir: PathBuf::from(".cache/oecd"),
            keep_downloads: false,
            reuse_cache: false,
            workers: 1,
        }
    }
}

impl Config {
    /// Resolve requested codes against the registry; empty means every dataset
    pub fn selected(&self) -> anyhow::Result<Vec<DatasetSpec>> {
        if self.datasets.is_empty() {
            return Ok(self.registry.iter().cloned().collect());
        }
        self.datasets
            .iter()
            .map(|code| {
                self.registry.get(code).cloned().ok_or_else(|| {
                    anyhow::anyhow!(
                        "Unknown dataset: {code} (known: {})",
                        self.registry.codes().join(", ")
                    )
                })
            })
            .collect()
    }
}
