//! Per-dataset series store
//!
//! Directory layout:
//! ```text
//! {base}/
//! └── {provider}/
//!     └── {dataset}/
//!         ├── series.jsonl.gz        # one SeriesRecord per line, sorted by key
//!         ├── observations.parquet   # flattened export
//!         ├── metadata.json          # DatasetMetadata
//!         └── manifest.json          # series hashes + file hashes, written last
//! ```
//!
//! An upsert is staged in memory and written as `.tmp` files on commit;
//! the renames happen only after every file is complete.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use rustc_hash::FxHashSet;
use sdmxline_core::{DatasetMetadata, RowError, SeriesRecord};
use serde::Serialize;

use crate::export::{OBSERVATIONS_FILE, write_observations};
use crate::hash;
use crate::manifest::{CURRENT_FORMAT_VERSION, DatasetManifest, MANIFEST_FILE, SeriesEntry};

pub const SERIES_FILE: &str = "series.jsonl.gz";
pub const METADATA_FILE: &str = "metadata.json";

/// Counts for one upsert
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpsertReport {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Repeated keys within the run (first occurrence kept)
    pub duplicates: usize,
    /// Non-fatal error rows
    pub skipped_rows: usize,
    /// Series stored after commit
    pub total_series: usize,
}

/// A stored dataset, as found by [`Store::list_datasets`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetEntry {
    pub provider_name: String,
    pub dataset_code: String,
    pub path: PathBuf,
}

/// Verification result for a single file.
#[derive(Debug)]
pub struct VerifyResult {
    pub path: String,
    pub expected: String,
    pub actual: String,
    pub ok: bool,
}

/// Series store rooted at one directory.
#[derive(Debug, Clone)]
pub struct Store {
    base: PathBuf,
}

impl Store {
    /// Create a new store rooted at `base`.
    pub fn new(base: &Path) -> Result<Self> {
        fs::create_dir_all(base)
            .with_context(|| format!("failed to create store dir: {}", base.display()))?;
        Ok(Self {
            base: base.to_path_buf(),
        })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn dataset_dir(&self, provider: &str, dataset: &str) -> PathBuf {
        self.base.join(provider).join(dataset)
    }

    /// Consume a record stream and stage the merged dataset.
    ///
    /// Non-fatal error rows are logged and counted. The first fatal row
    /// aborts with nothing staged. Nothing is written until
    /// [`StagedUpsert::commit`].
    pub fn upsert_series<E, I>(
        &self,
        provider: &str,
        dataset: &str,
        records: I,
    ) -> Result<StagedUpsert>
    where
        E: RowError,
        I: Iterator<Item = Result<SeriesRecord, E>>,
    {
        let dir = self.dataset_dir(provider, dataset);
        let (mut stored, mut entries) = if dir.join(MANIFEST_FILE).exists() {
            let manifest = DatasetManifest::read_from(&dir)?;
            let series = read_series(&dir.join(SERIES_FILE))?
                .into_iter()
                .map(|s| (s.key.clone(), s))
                .collect::<BTreeMap<_, _>>();
            (series, manifest.series)
        } else {
            (BTreeMap::new(), BTreeMap::new())
        };

        let mut report = UpsertReport::default();
        let mut seen = FxHashSet::default();

        for row in records {
            let record = match row {
                Ok(record) => record,
                Err(e) if e.is_fatal() => {
                    return Err(anyhow::Error::new(e)
                        .context(format!("{provider}/{dataset}: aborted, nothing committed")));
                }
                Err(e) => {
                    log::debug!("{provider}/{dataset}: skipped series: {e}");
                    report.skipped_rows += 1;
                    continue;
                }
            };

            if !seen.insert(record.key.clone()) {
                log::debug!("{provider}/{dataset}: duplicate key {}", record.key);
                report.duplicates += 1;
                continue;
            }

            let content_hash = hash::series_hash(&record);
            match entries.get(&record.key) {
                Some(entry) if entry.hash == content_hash && stored.contains_key(&record.key) => {
                    report.unchanged += 1;
                    continue;
                }
                Some(_) => report.updated += 1,
                None => report.inserted += 1,
            }
            entries.insert(
                record.key.clone(),
                SeriesEntry {
                    hash: content_hash,
                    last_update: record.last_update,
                },
            );
            stored.insert(record.key.clone(), record);
        }

        report.total_series = stored.len();
        Ok(StagedUpsert {
            store: self.clone(),
            dir,
            provider: provider.to_string(),
            dataset: dataset.to_string(),
            series: stored,
            entries,
            report,
        })
    }

    pub fn load_metadata(&self, provider: &str, dataset: &str) -> Result<DatasetMetadata> {
        let path = self.dataset_dir(provider, dataset).join(METADATA_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn load_manifest(&self, provider: &str, dataset: &str) -> Result<DatasetManifest> {
        DatasetManifest::read_from(&self.dataset_dir(provider, dataset))
    }

    /// All stored series of a dataset, sorted by key
    pub fn load_series(&self, provider: &str, dataset: &str) -> Result<Vec<SeriesRecord>> {
        read_series(&self.dataset_dir(provider, dataset).join(SERIES_FILE))
    }

    /// Datasets with a committed manifest, sorted by provider then code
    pub fn list_datasets(&self) -> Result<Vec<DatasetEntry>> {
        let pattern = self.base.join("*").join("*").join(MANIFEST_FILE);
        let pattern_str = pattern.to_string_lossy();

        let mut entries: Vec<DatasetEntry> = glob::glob(&pattern_str)
            .context("invalid glob pattern")?
            .filter_map(|e| e.ok())
            .filter_map(|manifest| {
                let dir = manifest.parent()?;
                let dataset = dir.file_name()?.to_string_lossy().into_owned();
                let provider = dir.parent()?.file_name()?.to_string_lossy().into_owned();
                Some(DatasetEntry {
                    provider_name: provider,
                    dataset_code: dataset,
                    path: dir.to_path_buf(),
                })
            })
            .collect();
        entries.sort_by(|a, b| {
            (&a.provider_name, &a.dataset_code).cmp(&(&b.provider_name, &b.dataset_code))
        });
        Ok(entries)
    }

    /// Verify file hashes recorded in a dataset's manifest.
    pub fn verify(&self, provider: &str, dataset: &str) -> Result<Vec<VerifyResult>> {
        let dir = self.dataset_dir(provider, dataset);
        let manifest = DatasetManifest::read_from(&dir)
            .with_context(|| format!("no manifest for {provider}/{dataset}"))?;

        let mut results = Vec::new();
        for (filename, expected_hash) in &manifest.file_hashes {
            let file_path = dir.join(filename);
            let (actual, ok) = if file_path.exists() {
                match hash::hash_file(&file_path) {
                    Ok(h) => {
                        let hex = h.to_hex().to_string();
                        let ok = hex == *expected_hash;
                        (hex, ok)
                    }
                    Err(e) => (format!("error: {e}"), false),
                }
            } else {
                ("MISSING".to_string(), false)
            };

            results.push(VerifyResult {
                path: filename.clone(),
                expected: expected_hash.clone(),
                actual,
                ok,
            });
        }

        Ok(results)
    }
}

/// Merged dataset waiting to be written
#[derive(Debug)]
pub struct StagedUpsert {
    store: Store,
    dir: PathBuf,
    provider: String,
    dataset: String,
    series: BTreeMap<String, SeriesRecord>,
    entries: BTreeMap<String, SeriesEntry>,
    report: UpsertReport,
}

impl StagedUpsert {
    /// Write all files as `.tmp`, then rename them into place (manifest last).
    pub fn commit(self, metadata: &DatasetMetadata) -> Result<UpsertReport> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        cleanup_tmp_files(&self.dir)?;

        let series_path = self.dir.join(SERIES_FILE);
        write_series(&tmp_path(&series_path), self.series.values())?;

        let observations_path = self.dir.join(OBSERVATIONS_FILE);
        let observation_count =
            write_observations(&tmp_path(&observations_path), self.series.values())
                .with_context(|| format!("failed to write {}", observations_path.display()))?;

        let metadata_path = self.dir.join(METADATA_FILE);
        write_json(&tmp_path(&metadata_path), metadata)?;

        let manifest = DatasetManifest {
            format_version: CURRENT_FORMAT_VERSION,
            provider_name: self.provider.clone(),
            dataset_code: self.dataset.clone(),
            last_update: metadata.last_update,
            series: self.entries,
            file_hashes: DatasetManifest::compute_file_hashes(&self.dir)?,
            observation_count,
        };
        let manifest_path = self.dir.join(MANIFEST_FILE);
        manifest.write_to(&tmp_path(&manifest_path))?;

        for path in [&series_path, &observations_path, &metadata_path, &manifest_path] {
            rename(&tmp_path(path), path)?;
        }

        log::debug!(
            "{}/{}: committed {} series, {} observations to {}",
            self.provider,
            self.dataset,
            self.report.total_series,
            observation_count,
            self.store.base().display()
        );
        Ok(self.report)
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn rename(from: &Path, to: &Path) -> Result<()> {
    fs::rename(from, to)
        .with_context(|| format!("failed to rename {} → {}", from.display(), to.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize {}", path.display()))?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

fn write_series<'a>(path: &Path, series: impl Iterator<Item = &'a SeriesRecord>) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut gz = GzEncoder::new(BufWriter::new(file), Compression::default());
    for record in series {
        serde_json::to_writer(&mut gz, record)
            .with_context(|| format!("failed to serialize series {}", record.key))?;
        gz.write_all(b"\n")?;
    }
    gz.finish()
        .and_then(|mut w| w.flush())
        .with_context(|| format!("failed to finish {}", path.display()))?;
    Ok(())
}

fn read_series(path: &Path) -> Result<Vec<SeriesRecord>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let reader = BufReader::new(GzDecoder::new(file));
    let mut series = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read {}", path.display()))?;
        if line.is_empty() {
            continue;
        }
        let record: SeriesRecord = serde_json::from_str(&line)
            .with_context(|| format!("{}: invalid record on line {}", path.display(), i + 1))?;
        series.push(record);
    }
    Ok(series)
}

/// Remove stale .tmp files left by an interrupted commit
fn cleanup_tmp_files(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "tmp") {
            log::warn!("Removing stale tmp file: {}", path.display());
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use indexmap::IndexMap;
    use sdmxline_core::ObservationRecord;

    #[derive(Debug)]
    struct TestError(bool);

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "test error (fatal: {})", self.0)
        }
    }

    impl std::error::Error for TestError {}

    impl RowError for TestError {
        fn is_fatal(&self) -> bool {
            self.0
        }
    }

    fn at(ts: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(ts, 0).unwrap()
    }

    fn record(key: &str, value: &str, ts: i64) -> SeriesRecord {
        SeriesRecord {
            provider_name: "OECD".into(),
            dataset_code: "MEI".into(),
            name: key.into(),
            key: key.into(),
            values: vec![ObservationRecord {
                period: "2020-01".into(),
                value: value.into(),
                attributes: None,
                release_date: at(ts),
                ordinal: 600,
            }],
            attributes: IndexMap::new(),
            dimensions: IndexMap::new(),
            last_update: at(ts),
            start_date: 600,
            end_date: 600,
            frequency: "M".into(),
        }
    }

    fn metadata(ts: i64) -> DatasetMetadata {
        DatasetMetadata::new("OECD", "MEI", "Main Economics Indicators", None, at(ts))
    }

    fn upsert(
        store: &Store,
        rows: Vec<Result<SeriesRecord, TestError>>,
        ts: i64,
    ) -> Result<UpsertReport> {
        store
            .upsert_series("OECD", "MEI", rows.into_iter())?
            .commit(&metadata(ts))
    }

    #[test]
    fn first_upsert_inserts_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        let report = upsert(
            &store,
            vec![Ok(record("M.FR", "1", 100)), Ok(record("M.DE", "2", 100))],
            100,
        )
        .unwrap();
        assert_eq!(report.inserted, 2);
        assert_eq!(report.total_series, 2);

        let keys: Vec<_> = store
            .load_series("OECD", "MEI")
            .unwrap()
            .into_iter()
            .map(|s| s.key)
            .collect();
        assert_eq!(keys, ["M.DE", "M.FR"]);
    }

    #[test]
    fn duplicates_keep_first_occurrence() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        let report = upsert(
            &store,
            vec![Ok(record("M.FR", "1", 100)), Ok(record("M.FR", "9", 100))],
            100,
        )
        .unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(store.load_series("OECD", "MEI").unwrap()[0].values[0].value, "1");
    }

    #[test]
    fn unchanged_series_keep_previous_dates() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        upsert(&store, vec![Ok(record("M.FR", "1", 100))], 100).unwrap();

        let report = upsert(
            &store,
            vec![Ok(record("M.FR", "1", 200)), Ok(record("M.DE", "5", 200))],
            200,
        )
        .unwrap();
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.inserted, 1);

        let series = store.load_series("OECD", "MEI").unwrap();
        let fr = series.iter().find(|s| s.key == "M.FR").unwrap();
        assert_eq!(fr.last_update, at(100));
        assert_eq!(fr.values[0].release_date, at(100));
        let manifest = store.load_manifest("OECD", "MEI").unwrap();
        assert_eq!(manifest.series["M.FR"].last_update, at(100));
        assert_eq!(manifest.series["M.DE"].last_update, at(200));
    }

    #[test]
    fn changed_series_are_updated() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        upsert(&store, vec![Ok(record("M.FR", "1", 100))], 100).unwrap();
        let report = upsert(&store, vec![Ok(record("M.FR", "2", 200))], 200).unwrap();
        assert_eq!(report.updated, 1);

        let fr = &store.load_series("OECD", "MEI").unwrap()[0];
        assert_eq!(fr.values[0].value, "2");
        assert_eq!(fr.last_update, at(200));
    }

    #[test]
    fn absent_keys_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        upsert(&store, vec![Ok(record("M.FR", "1", 100))], 100).unwrap();
        let report = upsert(&store, vec![Ok(record("M.DE", "1", 200))], 200).unwrap();
        assert_eq!(report.total_series, 2);
    }

    #[test]
    fn non_fatal_rows_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        let report = upsert(
            &store,
            vec![Err(TestError(false)), Ok(record("M.FR", "1", 100))],
            100,
        )
        .unwrap();
        assert_eq!(report.skipped_rows, 1);
        assert_eq!(report.inserted, 1);
    }

    #[test]
    fn fatal_row_leaves_store_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        upsert(&store, vec![Ok(record("M.FR", "1", 100))], 100).unwrap();

        let err = upsert(
            &store,
            vec![Ok(record("M.FR", "2", 200)), Err(TestError(true))],
            200,
        )
        .unwrap_err();
        assert!(err.to_string().contains("nothing committed"));
        assert_eq!(store.load_series("OECD", "MEI").unwrap()[0].values[0].value, "1");
        assert_eq!(store.load_metadata("OECD", "MEI").unwrap().last_update, at(100));
    }

    #[test]
    fn fatal_first_row_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        assert!(upsert(&store, vec![Err(TestError(true))], 100).is_err());
        assert!(!store.dataset_dir("OECD", "MEI").exists());
    }

    #[test]
    fn commit_writes_verifiable_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        upsert(&store, vec![Ok(record("M.FR", "1", 100))], 100).unwrap();

        let manifest = store.load_manifest("OECD", "MEI").unwrap();
        assert_eq!(manifest.observation_count, 1);
        assert!(manifest.file_hashes.contains_key(SERIES_FILE));
        assert!(manifest.file_hashes.contains_key(OBSERVATIONS_FILE));
        assert!(manifest.file_hashes.contains_key(METADATA_FILE));
        assert!(store.verify("OECD", "MEI").unwrap().iter().all(|r| r.ok));

        let leftovers: Vec<_> = fs::read_dir(store.dataset_dir("OECD", "MEI"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn verify_detects_tampering() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        upsert(&store, vec![Ok(record("M.FR", "1", 100))], 100).unwrap();
        fs::write(store.dataset_dir("OECD", "MEI").join(METADATA_FILE), b"{}").unwrap();

        let results = store.verify("OECD", "MEI").unwrap();
        let metadata = results.iter().find(|r| r.path == METADATA_FILE).unwrap();
        assert!(!metadata.ok);
    }

    #[test]
    fn list_datasets_finds_committed_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        upsert(&store, vec![Ok(record("M.FR", "1", 100))], 100).unwrap();
        fs::create_dir_all(store.dataset_dir("OECD", "EO")).unwrap();

        let datasets = store.list_datasets().unwrap();
        assert_eq!(datasets.len(), 1);
        assert_eq!(datasets[0].provider_name, "OECD");
        assert_eq!(datasets[0].dataset_code, "MEI");
    }

    #[test]
    fn commit_writes_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        let mut meta = metadata(100);
        meta.add_frequency("Q");
        let rows: Vec<Result<SeriesRecord, TestError>> = vec![Ok(record("M.FR", "1", 100))];
        store
            .upsert_series("OECD", "MEI", rows.into_iter())
            .unwrap()
            .commit(&meta)
            .unwrap();
        assert_eq!(store.load_metadata("OECD", "MEI").unwrap(), meta);
        let manifest = store.load_manifest("OECD", "MEI").unwrap();
        assert!(manifest.file_hashes.contains_key(METADATA_FILE));
    }
}
