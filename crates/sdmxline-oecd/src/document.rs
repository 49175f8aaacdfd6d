//! Typed views of the two SDMX-JSON documents.
//!
//! Sections are optional at this level so the decoders can name exactly
//! which one is absent. Positions and observation arrays mix numbers,
//! strings and nulls and stay as [`Value`].

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::Error;

// === Shared ===

/// `{id, name, values}` entry of a dimension or attribute list
#[derive(Debug, Deserialize)]
pub(crate) struct Component {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub values: Vec<CodeValue>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CodeValue {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl Component {
    /// Code at `position` of this component's value list, bounds-checked
    pub fn code(&self, position: usize) -> Result<&str, Error> {
        self.values
            .get(position)
            .and_then(|v| v.id.as_deref())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::unresolved(&self.id, position))
    }
}

// === Structural document ===

/// `{ header, structure: { dimensions, attributes } }`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct DataflowDoc {
    pub structure: DataflowBody,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct DataflowBody {
    pub dimensions: DataflowDimensions,
    pub attributes: DataflowAttributes,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct DataflowDimensions {
    pub observation: Option<Vec<Component>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct DataflowAttributes {
    #[serde(rename = "dataSet")]
    pub data_set: Option<Vec<Component>>,
    pub observation: Option<Vec<Component>>,
}

// === Data payload ===

/// `{ structure: { dimensions, attributes }, dataSets: [{ series }] }`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct DataDoc {
    pub structure: DataBody,
    #[serde(rename = "dataSets", deserialize_with = "null_to_default")]
    pub data_sets: Vec<DataSet>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct DataBody {
    pub dimensions: DataDimensions,
    pub attributes: DataAttributes,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct DataDimensions {
    pub observation: Option<Vec<Component>>,
    pub series: Option<Vec<Component>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct DataAttributes {
    pub series: Option<Vec<Component>>,
    pub observation: Option<Vec<Component>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct DataSet {
    /// Compact key → series body, in payload order
    pub series: Option<IndexMap<String, SeriesBody>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SeriesBody {
    /// Attribute positions, `null` for absent
    #[serde(deserialize_with = "null_to_default")]
    pub attributes: Vec<Value>,
    /// Period index → `[value, attribute positions..]`
    #[serde(deserialize_with = "null_to_default")]
    pub observations: IndexMap<String, Value>,
}

/// Deserialize `null` as the type's default
fn null_to_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Deserialize a parsed document; shape errors become `MissingSection`
pub(crate) fn parse<'a, T: Deserialize<'a>>(doc: &'a Value, document: &str) -> Result<T, Error> {
    T::deserialize(doc).map_err(|e| Error::MissingSection {
        section: format!("{document}: {e}"),
    })
}

/// Require a section, naming its path when absent
pub(crate) fn required<T>(section: Option<T>, path: &str) -> Result<T, Error> {
    section.ok_or_else(|| Error::missing(path))
}
