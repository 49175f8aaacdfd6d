//! Main runner for OECD retrievals

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, SubsecRound, Utc};
use rayon::prelude::*;
use sdmxline_core::download::cleanup_downloads;
use sdmxline_core::progress::{fmt_num, upgrade_to_partitions};
use sdmxline_core::{DatasetMetadata, Downloader, ProgressContext, is_shutdown_requested};
use sdmxline_store::{Store, UpsertReport};

use crate::api::{OecdApi, load_dataflow};
use crate::config::Config;
use crate::driver::PartitionedRetrieval;
use crate::materialize::Materializer;
use crate::registry::{DatasetSpec, PROVIDER};

/// Outcome of one successfully stored dataset
#[derive(Debug, Clone)]
pub struct DatasetSummary {
    pub code: String,
    pub partitions: usize,
    pub partitions_skipped: usize,
    pub report: UpsertReport,
}

impl DatasetSummary {
    fn log(&self) {
        log::info!(
            "{}: {} new, {} updated, {} unchanged, {} skipped ({}/{} partitions skipped)",
            self.code,
            fmt_num(self.report.inserted),
            fmt_num(self.report.updated),
            fmt_num(self.report.unchanged),
            fmt_num(self.report.skipped_rows),
            self.partitions_skipped,
            self.partitions,
        );
    }
}

/// Run execution summary
#[derive(Debug, Default)]
pub struct RunSummary {
    pub datasets: Vec<DatasetSummary>,
    /// (dataset code, fatal cause)
    pub failed: Vec<(String, String)>,
    pub elapsed: Duration,
}

impl RunSummary {
    /// New or changed series committed
    pub fn series_written(&self) -> usize {
        self.datasets
            .iter()
            .map(|d| d.report.inserted + d.report.updated)
            .sum()
    }

    pub fn series_unchanged(&self) -> usize {
        self.datasets.iter().map(|d| d.report.unchanged).sum()
    }

    pub fn series_skipped(&self) -> usize {
        self.datasets.iter().map(|d| d.report.skipped_rows).sum()
    }

    pub fn partitions_skipped(&self) -> usize {
        self.datasets.iter().map(|d| d.partitions_skipped).sum()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn log(&self) {
        log::info!("=== OECD Summary ===");
        log::info!(
            "Datasets: {} ok, {} failed",
            self.datasets.len(),
            self.failed.len()
        );
        log::info!(
            "Series: {} written, {} unchanged, {} skipped",
            fmt_num(self.series_written()),
            fmt_num(self.series_unchanged()),
            fmt_num(self.series_skipped())
        );
        if self.partitions_skipped() > 0 {
            log::info!("Partitions skipped: {}", self.partitions_skipped());
        }
        for (code, cause) in &self.failed {
            log::error!("{code}: {cause}");
        }
        log::info!("Time: {:.1}s", self.elapsed.as_secs_f64());
    }
}

/// Retrieve and store every selected dataset.
///
/// Datasets run in parallel on `config.workers` threads; partitions of one
/// dataset run sequentially. A failed dataset does not stop the others.
pub fn run<D: Downloader + ?Sized>(
    config: &Config,
    downloader: &D,
    store: &Store,
    progress: &ProgressContext,
) -> Result<RunSummary> {
    let start = Instant::now();
    let specs = config.selected()?;
    let api = OecdApi::new(&config.base_url);
    let release_date = Utc::now().trunc_subsecs(0);

    log::info!(
        "Retrieving {} dataset(s) with {} worker(s)",
        specs.len(),
        config.workers
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers.max(1))
        .build()
        .context("Failed to create thread pool")?;

    let outcomes: Vec<(String, Result<DatasetSummary>)> = pool.install(|| {
        specs
            .par_iter()
            .map(|spec| {
                let outcome = if is_shutdown_requested() {
                    Err(anyhow::anyhow!("interrupted before start"))
                } else {
                    fetch_dataset(config, &api, spec, downloader, store, progress, release_date)
                };
                (spec.code.clone(), outcome)
            })
            .collect()
    });

    let mut summary = RunSummary::default();
    for (code, outcome) in outcomes {
        match outcome {
            Ok(dataset) => {
                dataset.log();
                summary.datasets.push(dataset);
            }
            Err(e) => {
                log::error!("{code}: {e:#}");
                summary.failed.push((code, format!("{e:#}")));
            }
        }
    }
    summary.elapsed = start.elapsed();
    Ok(summary)
}

fn fetch_dataset<D: Downloader + ?Sized>(
    config: &Config,
    api: &OecdApi,
    spec: &DatasetSpec,
    downloader: &D,
    store: &Store,
    progress: &ProgressContext,
    release_date: DateTime<Utc>,
) -> Result<DatasetSummary> {
    let pb = progress.dataset_bar(&spec.code);
    pb.set_message("dataflow");

    let mut downloads = Vec::new();
    let result = retrieve(api, spec, downloader, store, &pb, release_date, &mut downloads);

    if config.keep_downloads {
        log::debug!("{}: keeping {} download(s)", spec.code, downloads.len());
    } else {
        cleanup_downloads(&downloads);
    }
    match &result {
        Ok(_) => pb.finish_with_message("done"),
        Err(_) => pb.abandon_with_message("failed"),
    }
    result
}

fn retrieve<D: Downloader + ?Sized>(
    api: &OecdApi,
    spec: &DatasetSpec,
    downloader: &D,
    store: &Store,
    pb: &indicatif::ProgressBar,
    release_date: DateTime<Utc>,
    downloads: &mut Vec<PathBuf>,
) -> Result<DatasetSummary> {
    let (structure, dataflow_path) = load_dataflow(api, downloader, &spec.code)?;
    downloads.push(dataflow_path);

    let mut metadata = DatasetMetadata::new(
        PROVIDER.name,
        &spec.code,
        &spec.name,
        spec.doc_href.as_deref(),
        release_date,
    );
    structure.publish(&mut metadata);

    let mut driver =
        PartitionedRetrieval::new(api, &spec.code, &structure, downloader, &spec.filter)?
            .with_progress(pb.clone());
    upgrade_to_partitions(pb, driver.partition_count() as u64);
    log::debug!(
        "{}: {} partitions on {}",
        spec.code,
        driver.partition_count(),
        spec.filter
    );

    let materializer = Materializer::new(PROVIDER.name, &spec.code, &structure, release_date);
    let staged = store.upsert_series(
        PROVIDER.name,
        &spec.code,
        materializer.stream(driver.by_ref(), &mut metadata),
    );
    downloads.extend(driver.take_downloads());

    let report = staged?
        .commit(&metadata)
        .with_context(|| format!("{}: commit failed", spec.code))?;

    Ok(DatasetSummary {
        code: spec.code.clone(),
        partitions: driver.partition_count(),
        partitions_skipped: driver.skipped().len(),
        report,
    })
}
