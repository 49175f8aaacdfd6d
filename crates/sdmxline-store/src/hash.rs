//! Blake3 hashing utilities

use std::io;
use std::path::Path;

use indexmap::IndexMap;
use sdmxline_core::SeriesRecord;
use serde::Serialize;

/// Hash a file's contents with blake3.
pub fn hash_file(path: &Path) -> io::Result<blake3::Hash> {
    let mut hasher = blake3::Hasher::new();
    hasher.update_mmap(path)?;
    Ok(hasher.finalize())
}

/// First 8 characters of a hex hash, for display
pub fn short_hash(hex: &str) -> &str {
    hex.get(..8).unwrap_or(hex)
}

/// What makes two versions of a series different.
///
/// Timestamps (`last_update`, release dates) are left out: a re-run that
/// retrieves identical data must hash identically.
#[derive(Serialize)]
struct SeriesContent<'a> {
    key: &'a str,
    name: &'a str,
    frequency: &'a str,
    dimensions: &'a IndexMap<String, String>,
    attributes: &'a IndexMap<String, String>,
    start_date: i64,
    end_date: i64,
    values: Vec<ObservationContent<'a>>,
}

#[derive(Serialize)]
struct ObservationContent<'a> {
    period: &'a str,
    value: &'a str,
    ordinal: i64,
    attributes: Option<&'a IndexMap<String, String>>,
}

/// Content hash of a series, hex encoded
pub fn series_hash(record: &SeriesRecord) -> String {
    let content = SeriesContent {
        key: &record.key,
        name: &record.name,
        frequency: &record.frequency,
        dimensions: &record.dimensions,
        attributes: &record.attributes,
        start_date: record.start_date,
        end_date: record.end_date,
        values: record
            .values
            .iter()
            .map(|v| ObservationContent {
                period: &v.period,
                value: &v.value,
                ordinal: v.ordinal,
                attributes: v.attributes.as_ref(),
            })
            .collect(),
    };
    let mut hasher = blake3::Hasher::new();
    // Writing into a hasher cannot fail
    let _ = serde_json::to_writer(&mut hasher, &content);
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use sdmxline_core::ObservationRecord;

    fn record(value: &str, ts: i64) -> SeriesRecord {
        let at = DateTime::from_timestamp(ts, 0).unwrap();
        SeriesRecord {
            provider_name: "OECD".into(),
            dataset_code: "MEI".into(),
            name: "Monthly - France".into(),
            key: "M.FR".into(),
            values: vec![ObservationRecord {
                period: "2020-01".into(),
                value: value.into(),
                attributes: None,
                release_date: at,
                ordinal: 600,
            }],
            attributes: IndexMap::new(),
            dimensions: IndexMap::from([("FREQUENCY".into(), "M".into())]),
            last_update: at,
            start_date: 600,
            end_date: 600,
            frequency: "M".into(),
        }
    }

    #[test]
    fn short_hash_truncates_hex() {
        let hex = blake3::hash(b"test").to_hex().to_string();
        assert_eq!(short_hash(&hex), &hex[..8]);
        assert_eq!(short_hash("abc"), "abc");
        assert_eq!(short_hash("MISSING"), "MISSING");
    }

    #[test]
    fn hash_file_matches_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("series.jsonl.gz");
        std::fs::write(&path, b"file content").unwrap();
        assert_eq!(hash_file(&path).unwrap(), blake3::hash(b"file content"));
    }

    #[test]
    fn series_hash_ignores_timestamps() {
        assert_eq!(
            series_hash(&record("10", 1_600_000_000)),
            series_hash(&record("10", 1_700_000_000))
        );
    }

    #[test]
    fn series_hash_tracks_values() {
        assert_ne!(
            series_hash(&record("10", 1_600_000_000)),
            series_hash(&record("11", 1_600_000_000))
        );
    }
}
