//! Dataset manifest: per-series content hashes plus file hashes

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hash;

pub const CURRENT_FORMAT_VERSION: u32 = 1;
pub const MANIFEST_FILE: &str = "manifest.json";

/// Stored state of one series
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesEntry {
    /// Blake3 of the series content, timestamps excluded
    pub hash: String,
    /// When this content was first stored
    pub last_update: DateTime<Utc>,
}

/// Manifest stored alongside a dataset's files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetManifest {
    pub format_version: u32,
    pub provider_name: String,
    pub dataset_code: String,
    pub last_update: DateTime<Utc>,
    /// Series key → stored state
    pub series: BTreeMap<String, SeriesEntry>,
    /// Filename → full hex blake3 hash
    pub file_hashes: BTreeMap<String, String>,
    pub observation_count: usize,
}

impl DatasetManifest {
    /// Hash every file in `dir` except the manifest, keyed by filename.
    ///
    /// `.tmp` suffixes are stripped so staged files hash under their final name.
    pub fn compute_file_hashes(dir: &Path) -> Result<BTreeMap<String, String>> {
        let pattern = dir.join("*");
        let pattern_str = pattern.to_string_lossy();

        let mut entries: Vec<_> = glob::glob(&pattern_str)
            .context("invalid glob pattern")?
            .filter_map(|e| e.ok())
            .filter(|p| p.is_file())
            .collect();
        entries.sort();

        let mut file_hashes = BTreeMap::new();
        for path in &entries {
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            let name = name.strip_suffix(".tmp").unwrap_or(&name).to_string();
            if name == MANIFEST_FILE {
                continue;
            }
            let h = hash::hash_file(path)
                .with_context(|| format!("failed to hash {}", path.display()))?;
            file_hashes.insert(name, h.to_hex().to_string());
        }
        Ok(file_hashes)
    }

    /// Write manifest as pretty JSON to `path`
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize manifest")?;
        std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Read manifest from dir/manifest.json
    pub fn read_from(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let manifest: Self =
            serde_json::from_str(&json).with_context(|| "failed to parse manifest.json")?;
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_hashes_exclude_manifest_and_strip_tmp() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("series.jsonl.gz.tmp"), b"series").unwrap();
        std::fs::write(dir.path().join("metadata.json"), b"{}").unwrap();
        std::fs::write(dir.path().join("manifest.json.tmp"), b"{}").unwrap();

        let hashes = DatasetManifest::compute_file_hashes(dir.path()).unwrap();
        assert_eq!(hashes.len(), 2);
        assert!(hashes.contains_key("series.jsonl.gz"));
        assert!(hashes.contains_key("metadata.json"));
        assert_eq!(
            hashes["series.jsonl.gz"],
            blake3::hash(b"series").to_hex().to_string()
        );
    }

    #[test]
    fn read_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DatasetManifest::read_from(dir.path()).is_err());
    }

    #[test]
    fn read_from_corrupt_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), b"not valid json").unwrap();
        assert!(DatasetManifest::read_from(dir.path()).is_err());
    }

    #[test]
    fn manifest_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let now = DateTime::from_timestamp(1_600_000_000, 0).unwrap();
        let manifest = DatasetManifest {
            format_version: CURRENT_FORMAT_VERSION,
            provider_name: "OECD".into(),
            dataset_code: "MEI".into(),
            last_update: now,
            series: BTreeMap::from([(
                "M.FR".into(),
                SeriesEntry {
                    hash: "abcd".into(),
                    last_update: now,
                },
            )]),
            file_hashes: BTreeMap::from([("series.jsonl.gz".into(), "hash".into())]),
            observation_count: 2,
        };

        manifest.write_to(&dir.path().join(MANIFEST_FILE)).unwrap();
        let loaded = DatasetManifest::read_from(dir.path()).unwrap();
        assert_eq!(loaded.series, manifest.series);
        assert_eq!(loaded.file_hashes, manifest.file_hashes);
        assert_eq!(loaded.observation_count, 2);
    }
}
