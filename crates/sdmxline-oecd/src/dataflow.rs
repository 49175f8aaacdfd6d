//! Structural ("dataflow") document decoding.
//!
//! ```text
//! { header, structure: {
//!     dimensions: { observation: [ {id, name, values: [{id, name}, ..]}, .. ] },
//!     attributes: { dataSet: [..], observation: [..] } } }
//! ```
//!
//! Declared order is kept everywhere: compact keys index dimensions by
//! position and codes by position, so reordering would silently misalign.

use indexmap::IndexMap;
use sdmxline_core::DatasetMetadata;
use sdmxline_core::record::Codelist;
use serde_json::Value;

use crate::TIME_DIMENSION;
use crate::document::{self, Component, DataflowDoc};
use crate::error::Error;

/// Decoded dataflow: keys, codelists and concept names for one dataset.
///
/// Built once per dataset retrieval, read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataflowStructure {
    /// Series dimensions in compact-key order, time dimension excluded
    pub dimension_keys: Vec<String>,
    pub attribute_dataset_keys: Vec<String>,
    pub attribute_observation_keys: Vec<String>,
    /// Key id → (code → label), including `TIME_PERIOD` and attributes
    pub codelists: IndexMap<String, Codelist>,
    /// Key id → concept name
    pub concepts: IndexMap<String, String>,
}

impl DataflowStructure {
    /// Decode a parsed structural document
    pub fn decode(doc: &Value) -> Result<Self, Error> {
        let doc: DataflowDoc = document::parse(doc, "dataflow")?;
        let dimensions = document::required(
            doc.structure.dimensions.observation,
            "structure.dimensions.observation",
        )?;
        let dataset_attrs = document::required(
            doc.structure.attributes.data_set,
            "structure.attributes.dataSet",
        )?;
        let observation_attrs = document::required(
            doc.structure.attributes.observation,
            "structure.attributes.observation",
        )?;

        let mut structure = Self::default();
        for component in &dimensions {
            structure.add_component(component, "structure.dimensions.observation")?;
            if component.id != TIME_DIMENSION {
                structure.dimension_keys.push(component.id.clone());
            }
        }
        for component in &dataset_attrs {
            structure.add_component(component, "structure.attributes.dataSet")?;
            structure.attribute_dataset_keys.push(component.id.clone());
        }
        for component in &observation_attrs {
            structure.add_component(component, "structure.attributes.observation")?;
            structure.attribute_observation_keys.push(component.id.clone());
        }

        Ok(structure)
    }

    /// Register one component's concept name and codelist
    fn add_component(&mut self, component: &Component, section: &str) -> Result<(), Error> {
        let id = component.id.as_str();
        let mut codelist = Codelist::new();
        for value in &component.values {
            let Some(code) = value.id.as_deref() else {
                return Err(Error::missing(&format!("{section}[{id}].values[].id")));
            };
            let label = value.name.as_deref().unwrap_or(code);
            codelist.insert(code.to_string(), label.to_string());
        }

        let name = component.name.as_deref().unwrap_or(id);
        self.concepts.insert(id.to_string(), name.to_string());
        self.codelists.insert(id.to_string(), codelist);
        Ok(())
    }

    /// All attribute ids, dataset-level first
    pub fn attribute_keys(&self) -> Vec<String> {
        self.attribute_dataset_keys
            .iter()
            .chain(&self.attribute_observation_keys)
            .cloned()
            .collect()
    }

    /// Position of a dimension in compact-key order
    pub fn dimension_position(&self, id: &str) -> Option<usize> {
        self.dimension_keys.iter().position(|k| k == id)
    }

    /// Human label for `code` in the codelist of `key`
    pub fn label(&self, key: &str, code: &str) -> Option<&str> {
        self.codelists.get(key)?.get(code).map(String::as_str)
    }

    /// Publish keys, codelists and concepts into the dataset's metadata.
    ///
    /// One-time copy; later changes to either side are not mirrored.
    pub fn publish(&self, metadata: &mut DatasetMetadata) {
        metadata.concepts = self.concepts.clone();
        metadata.codelists = self.codelists.clone();
        metadata.dimension_keys = self.dimension_keys.clone();
        metadata.attribute_keys = self.attribute_keys();
    }
}
