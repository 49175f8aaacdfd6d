//! Storage-ready record types shared by providers and the store.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered code → label mapping (declared order is significant)
pub type Codelist = IndexMap<String, String>;

/// One observation of a materialized series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub period: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<IndexMap<String, String>>,
    pub release_date: DateTime<Utc>,
    pub ordinal: i64,
}

/// A fully resolved series, ready for upsert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesRecord {
    pub provider_name: String,
    pub dataset_code: String,
    pub name: String,
    pub key: String,
    pub values: Vec<ObservationRecord>,
    pub attributes: IndexMap<String, String>,
    pub dimensions: IndexMap<String, String>,
    pub last_update: DateTime<Utc>,
    pub start_date: i64,
    pub end_date: i64,
    pub frequency: String,
}

/// Dataset-level metadata, built up during one retrieval.
///
/// Structural fields are published once from the dataflow; `frequencies`
/// grows as series are materialized. Handed read-only to persistence
/// when the retrieval completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub provider_name: String,
    pub dataset_code: String,
    pub name: String,
    pub doc_href: Option<String>,
    pub last_update: DateTime<Utc>,
    #[serde(default)]
    pub concepts: IndexMap<String, String>,
    #[serde(default)]
    pub codelists: IndexMap<String, Codelist>,
    #[serde(default)]
    pub dimension_keys: Vec<String>,
    #[serde(default)]
    pub attribute_keys: Vec<String>,
    #[serde(default)]
    pub frequencies: BTreeSet<String>,
}

impl DatasetMetadata {
    pub fn new(
        provider_name: &str,
        dataset_code: &str,
        name: &str,
        doc_href: Option<&str>,
        last_update: DateTime<Utc>,
    ) -> Self {
        Self {
            provider_name: provider_name.to_string(),
            dataset_code: dataset_code.to_string(),
            name: name.to_string(),
            doc_href: doc_href.map(str::to_string),
            last_update,
            concepts: IndexMap::new(),
            codelists: IndexMap::new(),
            dimension_keys: Vec::new(),
            attribute_keys: Vec::new(),
            frequencies: BTreeSet::new(),
        }
    }

    /// Register a frequency seen on an accepted series
    pub fn add_frequency(&mut self, frequency: &str) {
        if !self.frequencies.contains(frequency) {
            self.frequencies.insert(frequency.to_string());
        }
    }
}

/// Error carried by a row of a record stream.
///
/// Non-fatal rows are skipped by the consumer; a fatal row aborts the
/// whole dataset.
pub trait RowError: std::error::Error + Send + Sync + 'static {
    fn is_fatal(&self) -> bool;
}
