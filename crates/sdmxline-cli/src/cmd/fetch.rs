//! Fetch subcommand - retrieve OECD datasets into the store

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use sdmxline_core::{HttpDownloader, ProgressContext};
use sdmxline_core::progress::fmt_num;
use sdmxline_store::Store;

use crate::cmd::print_summary;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Dataset codes to fetch (e.g. MEI EO)
    pub codes: Vec<String>,

    /// Fetch every known dataset
    #[arg(long, conflicts_with = "codes")]
    pub all: bool,

    /// Store directory
    #[arg(short, long)]
    pub store: Option<PathBuf>,

    /// Download cache directory
    #[arg(long)]
    pub cache: Option<PathBuf>,

    /// Always download, even when a cached document exists
    #[arg(long)]
    pub no_cache: bool,

    /// Keep downloaded documents after each dataset
    #[arg(long)]
    pub keep_downloads: bool,

    /// Number of datasets fetched in parallel
    #[arg(short, long)]
    pub workers: Option<usize>,
}

pub fn run(args: FetchArgs, config: &Config, progress: &ProgressContext) -> Result<()> {
    if args.codes.is_empty() && !args.all {
        anyhow::bail!("No dataset given (pass codes or --all)");
    }

    let oecd_config = sdmxline_oecd::Config {
        datasets: args.codes,
        registry: config.registry(),
        base_url: config.oecd.base_url.clone(),
        store_dir: args.store.unwrap_or_else(|| config.store.dir.clone()),
        cache_dir: args.cache.unwrap_or_else(|| config.cache.dir.clone()),
        keep_downloads: args.keep_downloads || config.cache.keep_downloads,
        reuse_cache: config.cache.reuse && !args.no_cache,
        workers: config.workers.resolve(args.workers),
    };

    log::info!("Fetching OECD datasets");
    log::info!("  Store: {}", oecd_config.store_dir.display());
    log::info!("  Cache: {}", oecd_config.cache_dir.display());

    let downloader = HttpDownloader::new(&oecd_config.cache_dir, oecd_config.reuse_cache)?;
    let store = Store::new(&oecd_config.store_dir)?;
    let summary = sdmxline_oecd::run(&oecd_config, &downloader, &store, progress)?;
    summary.log();

    print_summary(
        "OECD",
        &[
            (
                "Datasets",
                format!(
                    "{} ok ({} failed)",
                    summary.datasets.len(),
                    summary.failed.len()
                ),
            ),
            (
                "Series",
                format!(
                    "{} written, {} unchanged, {} skipped",
                    fmt_num(summary.series_written()),
                    fmt_num(summary.series_unchanged()),
                    fmt_num(summary.series_skipped())
                ),
            ),
            (
                "Partitions skipped",
                summary.partitions_skipped().to_string(),
            ),
            ("Time", format!("{:.1}s", summary.elapsed.as_secs_f64())),
        ],
    );

    if !summary.is_success() {
        let codes: Vec<&str> = summary.failed.iter().map(|(c, _)| c.as_str()).collect();
        anyhow::bail!("Failed datasets: {}", codes.join(", "));
    }
    Ok(())
}
