//! Compact data payload decoding.
//!
//! A data payload addresses everything by position:
//!
//! ```text
//! structure.dimensions.observation[0]   TIME_PERIOD, values = periods
//! structure.dimensions.series[i]        i-th segment of a compact key
//! structure.attributes.series[i]        i-th entry of a series' attribute list
//! structure.attributes.observation[i]   (i+1)-th element of an observation array
//! dataSets[0].series                    "0:3:1" → {attributes, observations: {"7": [value, a0, ..]}}
//! ```
//!
//! Positions index the value list of the payload's own component, and the
//! component id must be known to the dataflow. Positions are always
//! bounds-checked; a bad one fails its series with `UnresolvedCode`.

use indexmap::IndexMap;
use serde_json::Value;

use crate::TIME_DIMENSION;
use crate::dataflow::DataflowStructure;
use crate::document::{self, Component, DataDoc, SeriesBody};
use crate::error::Error;

/// Separator between positions in a compact series key
pub const KEY_SEPARATOR: char = ':';

/// Stored text of a missing (`null`) observation value
pub const MISSING_VALUE: &str = "NaN";

/// One observation, period still a raw label
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub period: String,
    pub value: String,
    /// Observation-level attributes; `None` when none are present
    pub attributes: Option<IndexMap<String, String>>,
}

/// One decoded series of a data payload, before materialization
#[derive(Debug, Clone, PartialEq)]
pub struct IntermediateSeries {
    /// Compact key as found in the payload (`0:3:1`)
    pub key_raw: String,
    pub dimensions: IndexMap<String, String>,
    pub attributes: IndexMap<String, String>,
    pub values: Vec<Observation>,
}

/// Decode one data payload against its dataset's structure.
///
/// The outer `Result` carries payload-level failures (fatal for the
/// dataset); each inner `Result` is one series, in payload order.
pub fn decode_data(
    doc: &Value,
    structure: &DataflowStructure,
) -> Result<Vec<Result<IntermediateSeries, Error>>, Error> {
    let DataDoc {
        structure: body,
        data_sets,
    } = document::parse(doc, "data payload")?;

    let observation_dims = document::required(
        body.dimensions.observation,
        "structure.dimensions.observation",
    )?;
    let Some(time) = observation_dims.into_iter().next() else {
        return Err(Error::TimeDimensionMissing { found: None });
    };
    if time.id != TIME_DIMENSION {
        return Err(Error::TimeDimensionMissing {
            found: Some(time.id),
        });
    }

    let decoder = PayloadDecoder {
        structure,
        time,
        series_dims: document::required(body.dimensions.series, "structure.dimensions.series")?,
        series_attrs: document::required(body.attributes.series, "structure.attributes.series")?,
        observation_attrs: document::required(
            body.attributes.observation,
            "structure.attributes.observation",
        )?,
    };

    let Some(series) = data_sets.into_iter().next().and_then(|d| d.series) else {
        return Ok(Vec::new());
    };

    Ok(series
        .iter()
        .map(|(key, body)| decoder.series(key, body))
        .collect())
}

struct PayloadDecoder<'a> {
    structure: &'a DataflowStructure,
    time: Component,
    series_dims: Vec<Component>,
    series_attrs: Vec<Component>,
    observation_attrs: Vec<Component>,
}

impl PayloadDecoder<'_> {
    fn series(&self, key: &str, body: &SeriesBody) -> Result<IntermediateSeries, Error> {
        let positions: Vec<&str> = key.split(KEY_SEPARATOR).collect();
        if positions.len() != self.series_dims.len() {
            return Err(Error::unresolved("series key", key));
        }

        let mut dimensions = IndexMap::with_capacity(positions.len());
        for (dim, raw) in self.series_dims.iter().zip(&positions) {
            let position = raw
                .parse::<usize>()
                .map_err(|_| Error::unresolved(&dim.id, raw))?;
            dimensions.insert(dim.id.clone(), self.resolve(dim, position)?);
        }

        let attributes = self.attributes(&self.series_attrs, &body.attributes)?;
        let values = body
            .observations
            .iter()
            .map(|(index, encoded)| self.observation(index, encoded))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(IntermediateSeries {
            key_raw: key.to_string(),
            dimensions,
            attributes,
            values,
        })
    }

    fn observation(&self, index: &str, encoded: &Value) -> Result<Observation, Error> {
        let period = index
            .parse::<usize>()
            .map_err(|_| Error::unresolved(TIME_DIMENSION, index))
            .and_then(|i| self.time.code(i))?;

        let elements = encoded.as_array().map(Vec::as_slice).unwrap_or_default();
        let (value, attrs) = match elements.split_first() {
            Some((value, attrs)) => (stringify(value), attrs),
            None => (stringify(encoded), &[][..]),
        };

        let attributes = self.attributes(&self.observation_attrs, attrs)?;
        Ok(Observation {
            period: period.to_string(),
            value,
            attributes: (!attributes.is_empty()).then_some(attributes),
        })
    }

    /// Pair attribute positions with their components; null positions are absent attributes
    fn attributes(
        &self,
        components: &[Component],
        positions: &[Value],
    ) -> Result<IndexMap<String, String>, Error> {
        let mut resolved = IndexMap::new();
        for (component, position) in components.iter().zip(positions) {
            let Some(position) = parse_position(component, position)? else {
                continue;
            };
            resolved.insert(component.id.clone(), self.resolve(component, position)?);
        }
        Ok(resolved)
    }

    fn resolve(&self, component: &Component, position: usize) -> Result<String, Error> {
        if !self.structure.codelists.contains_key(&component.id) {
            return Err(Error::unresolved(&component.id, position));
        }
        component.code(position).map(str::to_string)
    }
}

/// Position from a JSON number or numeric string; `None` for null.
///
/// Numbers must be non-negative and integral; `1.0` is read as `1`.
fn parse_position(component: &Component, value: &Value) -> Result<Option<usize>, Error> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_u64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                    .map(|f| f as u64)
            })
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| Error::unresolved(&component.id, n)),
        Value::String(s) => s
            .parse()
            .map(Some)
            .map_err(|_| Error::unresolved(&component.id, s)),
        other => Err(Error::unresolved(&component.id, other)),
    }
}

/// Observation value as text.
///
/// A `null` value is a missing observation and is stored as the marker
/// [`MISSING_VALUE`], not a computed NaN; numbers keep their JSON text.
fn stringify(value: &Value) -> String {
    match value {
        Value::Null => MISSING_VALUE.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
