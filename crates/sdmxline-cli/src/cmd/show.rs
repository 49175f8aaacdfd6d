//! `sdmxline show` - summary of one stored dataset

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{Cell, Color};

use sdmxline_oecd::registry::PROVIDER;
use sdmxline_store::{Store, VerifyResult, short_hash};

use crate::cmd::print_summary;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Dataset code
    pub code: String,

    /// Store directory
    #[arg(short, long)]
    pub store: Option<PathBuf>,

    /// Re-hash stored files against the manifest
    #[arg(long)]
    pub verify: bool,
}

pub fn run(args: ShowArgs, config: &Config) -> Result<()> {
    let dir = args.store.unwrap_or_else(|| config.store.dir.clone());
    let store = Store::new(&dir)?;
    let manifest = store
        .load_manifest(PROVIDER.name, &args.code)
        .with_context(|| format!("{} is not stored in {}", args.code, dir.display()))?;
    let metadata = store.load_metadata(PROVIDER.name, &args.code)?;

    let frequencies: Vec<&str> = metadata.frequencies.iter().map(String::as_str).collect();
    print_summary(
        &metadata.dataset_code,
        &[
            ("Name", metadata.name.clone()),
            (
                "Documentation",
                metadata.doc_href.clone().unwrap_or_else(|| "-".to_string()),
            ),
            ("Last update", metadata.last_update.to_rfc3339()),
            ("Dimensions", metadata.dimension_keys.join(", ")),
            ("Attributes", metadata.attribute_keys.join(", ")),
            ("Frequencies", frequencies.join(", ")),
            ("Series", manifest.series.len().to_string()),
            ("Observations", manifest.observation_count.to_string()),
        ],
    );

    let mut table = super::table(&["Dimension", "Concept", "Codes"]);
    for key in &metadata.dimension_keys {
        let concept = metadata.concepts.get(key).map(String::as_str).unwrap_or("-");
        let codes = metadata.codelists.get(key).map_or(0, |c| c.len());
        table.add_row(vec![Cell::new(key), Cell::new(concept), Cell::new(codes)]);
    }
    eprintln!("{table}");

    if args.verify {
        let results = store.verify(PROVIDER.name, &args.code)?;
        if !print_verify_results(&results) {
            anyhow::bail!("{}: integrity check failed", args.code);
        }
    }
    Ok(())
}

fn print_verify_results(results: &[VerifyResult]) -> bool {
    let mut table = super::table(&["File", "Hash", "Status"]);
    for r in results {
        let status = if r.ok {
            Cell::new("OK").fg(Color::Green)
        } else {
            Cell::new("FAIL").fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(&r.path),
            Cell::new(short_hash(&r.expected)),
            status,
        ]);
    }
    eprintln!("{table}");

    for r in results.iter().filter(|r| !r.ok) {
        eprintln!("  MISMATCH: {}", r.path);
        eprintln!("    expected: {}", short_hash(&r.expected));
        eprintln!("    actual:   {}", short_hash(&r.actual));
    }
    results.iter().all(|r| r.ok)
}
