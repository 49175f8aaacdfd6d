//! Dataset registry: which datasets exist and how to partition them

use indexmap::IndexMap;

/// Provider description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderInfo {
    pub name: &'static str,
    pub long_name: &'static str,
    pub region: &'static str,
    pub website: &'static str,
}

pub const PROVIDER: ProviderInfo = ProviderInfo {
    name: "OECD",
    long_name: "Organisation for Economic Co-operation and Development",
    region: "World",
    website: "http://www.oecd.org",
};

/// One retrievable dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSpec {
    pub code: String,
    pub name: String,
    pub doc_href: Option<String>,
    /// Dimension partitioned on, one request per code
    pub filter: String,
}

impl DatasetSpec {
    pub fn new(code: &str, name: &str, doc_href: Option<&str>, filter: &str) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            doc_href: doc_href.map(str::to_string),
            filter: filter.to_string(),
        }
    }
}

/// Known datasets in registration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    datasets: IndexMap<String, DatasetSpec>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Registry {
    /// Empty registry
    pub fn empty() -> Self {
        Self {
            datasets: IndexMap::new(),
        }
    }

    /// Datasets shipped with the provider
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.insert(DatasetSpec::new(
            "MEI",
            "Main Economics Indicators",
            Some("http://www.oecd-ilibrary.org/economics/data/main-economic-indicators_mei-data-en"),
            "LOCATION",
        ));
        registry.insert(DatasetSpec::new(
            "EO",
            "Economic Outlook",
            Some("http://www.oecd.org/eco/outlook/"),
            "LOCATION",
        ));
        registry
    }

    /// Add or replace a dataset; a replaced entry keeps its position
    pub fn insert(&mut self, spec: DatasetSpec) -> Option<DatasetSpec> {
        self.datasets.insert(spec.code.clone(), spec)
    }

    pub fn get(&self, code: &str) -> Option<&DatasetSpec> {
        self.datasets.get(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DatasetSpec> {
        self.datasets.values()
    }

    pub fn codes(&self) -> Vec<String> {
        self.datasets.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}
