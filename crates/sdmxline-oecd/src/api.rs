//! OECD SDMX-JSON endpoints

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use sdmxline_core::{Downloader, FetchRequest};
use serde_json::Value;

use crate::dataflow::DataflowStructure;
use crate::error::Error;

pub const DEFAULT_BASE_URL: &str = "http://stats.oecd.org/sdmx-json";

/// Headers for data retrievals
pub const SDMX_DATA_HEADERS: &[(&str, &str)] = &[(
    "Accept",
    "application/vnd.sdmx.data+json;version=1.0.0-wd",
)];

/// URL and cache-name builder for one OECD endpoint
#[derive(Debug, Clone)]
pub struct OecdApi {
    base_url: String,
}

impl Default for OecdApi {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl OecdApi {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn dataflow_url(&self, dataset: &str) -> String {
        format!("{}/dataflow/{dataset}", self.base_url)
    }

    pub fn data_url(&self, dataset: &str, key: &str) -> String {
        format!("{}/data/{dataset}/{key}", self.base_url)
    }
}

pub fn dataflow_filename(dataset: &str) -> String {
    format!("dataflow-{dataset}.json")
}

/// Cache name for one partition; `value` is the filter code
pub fn data_filename(dataset: &str, value: &str) -> String {
    format!("data-{dataset}-{value}.json")
}

/// Parse a downloaded JSON document
pub fn read_json(path: &Path) -> Result<Value, Error> {
    let file = File::open(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Fetch and decode a dataset's structural document.
///
/// Returns the decoded structure and the downloaded file (for cleanup).
pub fn load_dataflow<D: Downloader + ?Sized>(
    api: &OecdApi,
    downloader: &D,
    dataset: &str,
) -> Result<(DataflowStructure, PathBuf), Error> {
    let url = api.dataflow_url(dataset);
    let filename = dataflow_filename(dataset);
    let fetched = downloader
        .fetch(&FetchRequest {
            url: &url,
            filename: &filename,
            headers: &[],
        })
        .map_err(|e| Error::DataflowUnavailable {
            url: url.clone(),
            status: None,
            reason: e.to_string(),
        })?;

    if !fetched.is_success() {
        return Err(Error::DataflowUnavailable {
            url,
            status: Some(fetched.status),
            reason: fetched.reason,
        });
    }

    let doc = read_json(&fetched.path)?;
    let structure = DataflowStructure::decode(&doc)?;
    log::debug!(
        "{dataset}: dataflow with {} dimensions, {} attributes",
        structure.dimension_keys.len(),
        structure.attribute_dataset_keys.len() + structure.attribute_observation_keys.len()
    );
    Ok((structure, fetched.path))
}
