//! Intermediate series → storage-ready [`SeriesRecord`]

use chrono::{DateTime, Utc};
use sdmxline_core::{DatasetMetadata, ObservationRecord, SeriesRecord};

use crate::compact::IntermediateSeries;
use crate::dataflow::DataflowStructure;
use crate::error::Error;
use crate::period::{Frequency, ordinal};

/// Dimension holding each series' frequency code
pub const FREQUENCY_DIMENSION: &str = "FREQUENCY";
/// Joins dimension codes into the series key
pub const KEY_DELIMITER: &str = ".";
/// Joins dimension labels into the series name
pub const NAME_SEPARATOR: &str = " - ";

/// Builds final records for one dataset retrieval
#[derive(Debug, Clone, Copy)]
pub struct Materializer<'a> {
    provider: &'a str,
    dataset: &'a str,
    structure: &'a DataflowStructure,
    release_date: DateTime<Utc>,
}

impl<'a> Materializer<'a> {
    pub fn new(
        provider: &'a str,
        dataset: &'a str,
        structure: &'a DataflowStructure,
        release_date: DateTime<Utc>,
    ) -> Self {
        Self {
            provider,
            dataset,
            structure,
            release_date,
        }
    }

    /// Resolve one series. Registers its frequency in `metadata` once accepted.
    pub fn materialize(
        &self,
        series: IntermediateSeries,
        metadata: &mut DatasetMetadata,
    ) -> Result<SeriesRecord, Error> {
        let code = series
            .dimensions
            .get(FREQUENCY_DIMENSION)
            .ok_or_else(|| Error::unresolved(FREQUENCY_DIMENSION, &series.key_raw))?;
        let frequency = Frequency::from_code(code).ok_or_else(|| Error::RejectFrequency {
            provider: self.provider.to_string(),
            dataset: self.dataset.to_string(),
            frequency: code.clone(),
        })?;
        metadata.add_frequency(frequency.code());

        let mut codes = Vec::with_capacity(self.structure.dimension_keys.len());
        let mut labels = Vec::with_capacity(self.structure.dimension_keys.len());
        for dim in &self.structure.dimension_keys {
            let code = series
                .dimensions
                .get(dim)
                .ok_or_else(|| Error::unresolved(dim, &series.key_raw))?;
            let label = self
                .structure
                .label(dim, code)
                .ok_or_else(|| Error::unresolved(dim, code))?;
            codes.push(code.as_str());
            labels.push(label);
        }
        let key = codes.join(KEY_DELIMITER);
        let name = labels.join(NAME_SEPARATOR);

        let values = series
            .values
            .into_iter()
            .map(|obs| {
                Ok(ObservationRecord {
                    ordinal: ordinal(&obs.period, frequency)?,
                    period: obs.period,
                    value: obs.value,
                    attributes: obs.attributes,
                    release_date: self.release_date,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        // Declared order is trusted, no re-sorting
        let (Some(first), Some(last)) = (values.first(), values.last()) else {
            return Err(Error::EmptySeries { key });
        };
        let (start_date, end_date) = (first.ordinal, last.ordinal);

        Ok(SeriesRecord {
            provider_name: self.provider.to_string(),
            dataset_code: self.dataset.to_string(),
            name,
            key,
            values,
            attributes: series.attributes,
            dimensions: series.dimensions,
            last_update: self.release_date,
            start_date,
            end_date,
            frequency: frequency.code().to_string(),
        })
    }

    /// Materialize a stream of intermediate rows, passing errors through
    pub fn stream<'m, I>(
        &'m self,
        rows: I,
        metadata: &'m mut DatasetMetadata,
    ) -> impl Iterator<Item = Result<SeriesRecord, Error>> + 'm
    where
        I: Iterator<Item = Result<IntermediateSeries, Error>> + 'm,
    {
        rows.map(move |row| row.and_then(|series| self.materialize(series, metadata)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compact::Observation;
    use indexmap::IndexMap;
    use serde_json::json;

    fn structure() -> DataflowStructure {
        DataflowStructure::decode(&json!({
            "structure": {
                "dimensions": {"observation": [
                    {"id": "FREQUENCY", "name": "Frequency", "values": [
                        {"id": "M", "name": "Monthly"}, {"id": "S", "name": "Semi-annual"}
                    ]},
                    {"id": "REF_AREA", "name": "Reference area", "values": [
                        {"id": "FR", "name": "France"}, {"id": "DE", "name": "Germany"}
                    ]},
                    {"id": "TIME_PERIOD", "name": "Time", "values": []}
                ]},
                "attributes": {"dataSet": [], "observation": []}
            }
        }))
        .unwrap()
    }

    fn release() -> DateTime<Utc> {
        DateTime::from_timestamp(1_600_000_000, 0).unwrap()
    }

    fn series(freq: &str, area: &str, periods: &[(&str, &str)]) -> IntermediateSeries {
        IntermediateSeries {
            key_raw: "0:0".into(),
            dimensions: IndexMap::from([
                ("FREQUENCY".to_string(), freq.to_string()),
                ("REF_AREA".to_string(), area.to_string()),
            ]),
            attributes: IndexMap::new(),
            values: periods
                .iter()
                .map(|(p, v)| Observation {
                    period: p.to_string(),
                    value: v.to_string(),
                    attributes: None,
                })
                .collect(),
        }
    }

    fn meta() -> DatasetMetadata {
        DatasetMetadata::new("OECD", "TEST", "Test", None, release())
    }

    #[test]
    fn monthly_france() {
        let structure = structure();
        let m = Materializer::new("OECD", "TEST", &structure, release());
        let mut meta = meta();
        let record = m
            .materialize(
                series("M", "FR", &[("2020-01", "10"), ("2020-02", "12")]),
                &mut meta,
            )
            .unwrap();

        assert_eq!(record.key, "M.FR");
        assert_eq!(record.name, "Monthly - France");
        assert_eq!(record.frequency, "M");
        assert_eq!(record.start_date, ordinal("2020-01", Frequency::Monthly).unwrap());
        assert_eq!(record.end_date, record.start_date + 1);
        assert_eq!(record.values[1].value, "12");
        assert_eq!(record.values[1].ordinal, record.values[0].ordinal + 1);
        assert!(record.values.iter().all(|v| v.release_date == release()));
        assert_eq!(record.last_update, release());
        assert!(meta.frequencies.contains("M"));
    }

    #[test]
    fn unsupported_frequency_rejected() {
        let structure = structure();
        let m = Materializer::new("OECD", "TEST", &structure, release());
        let mut meta = meta();
        match m.materialize(series("S", "FR", &[("2020-S1", "1")]), &mut meta) {
            Err(Error::RejectFrequency {
                provider,
                dataset,
                frequency,
            }) => {
                assert_eq!(provider, "OECD");
                assert_eq!(dataset, "TEST");
                assert_eq!(frequency, "S");
            }
            other => panic!("expected RejectFrequency, got {other:?}"),
        }
        assert!(meta.frequencies.is_empty());
    }

    #[test]
    fn malformed_period_fails_series() {
        let structure = structure();
        let m = Materializer::new("OECD", "TEST", &structure, release());
        let err = m
            .materialize(series("M", "FR", &[("2020-Q1", "1")]), &mut meta())
            .unwrap_err();
        assert!(matches!(err, Error::MalformedPeriod { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn missing_label_is_unresolved() {
        let structure = structure();
        let m = Materializer::new("OECD", "TEST", &structure, release());
        let err = m
            .materialize(series("M", "IT", &[("2020-01", "1")]), &mut meta())
            .unwrap_err();
        match err {
            Error::UnresolvedCode { key, code } => {
                assert_eq!(key, "REF_AREA");
                assert_eq!(code, "IT");
            }
            other => panic!("expected UnresolvedCode, got {other:?}"),
        }
    }

    #[test]
    fn missing_frequency_is_unresolved() {
        let structure = structure();
        let m = Materializer::new("OECD", "TEST", &structure, release());
        let mut s = series("M", "FR", &[("2020-01", "1")]);
        s.dimensions.shift_remove("FREQUENCY");
        assert!(matches!(
            m.materialize(s, &mut meta()),
            Err(Error::UnresolvedCode { key, .. }) if key == FREQUENCY_DIMENSION
        ));
    }

    #[test]
    fn empty_series_rejected() {
        let structure = structure();
        let m = Materializer::new("OECD", "TEST", &structure, release());
        assert!(matches!(
            m.materialize(series("M", "DE", &[]), &mut meta()),
            Err(Error::EmptySeries { key }) if key == "M.DE"
        ));
    }

    #[test]
    fn no_resorting_of_observations() {
        let structure = structure();
        let m = Materializer::new("OECD", "TEST", &structure, release());
        let record = m
            .materialize(
                series("M", "FR", &[("2020-03", "3"), ("2020-01", "1")]),
                &mut meta(),
            )
            .unwrap();
        assert_eq!(record.start_date, ordinal("2020-03", Frequency::Monthly).unwrap());
        assert_eq!(record.end_date, ordinal("2020-01", Frequency::Monthly).unwrap());
    }

    #[test]
    fn stream_passes_errors_through() {
        let structure = structure();
        let m = Materializer::new("OECD", "TEST", &structure, release());
        let mut meta = meta();
        let rows = vec![
            Ok(series("M", "FR", &[("2020-01", "1")])),
            Err(Error::unresolved("REF_AREA", 9)),
            Ok(series("S", "DE", &[("2020-S1", "1")])),
        ];
        let out: Vec<_> = m.stream(rows.into_iter(), &mut meta).collect();
        assert_eq!(out.len(), 3);
        assert!(out[0].is_ok());
        assert!(matches!(out[1], Err(Error::UnresolvedCode { .. })));
        assert!(matches!(out[2], Err(Error::RejectFrequency { .. })));
        assert_eq!(meta.frequencies.len(), 1);
    }
}
