//! `sdmxline datasets` - list known datasets

use std::collections::HashSet;

use anyhow::Result;
use comfy_table::{Cell, Color};

use sdmxline_oecd::registry::PROVIDER;
use sdmxline_store::Store;

use crate::config::Config;

pub fn run(config: &Config) -> Result<()> {
    let registry = config.registry();
    let store = Store::new(&config.store.dir)?;
    let stored: HashSet<String> = store
        .list_datasets()?
        .into_iter()
        .filter(|e| e.provider_name == PROVIDER.name)
        .map(|e| e.dataset_code)
        .collect();

    let mut table = super::table(&["Code", "Name", "Filter", "Stored"]);
    for spec in registry.iter() {
        let stored_cell = if stored.contains(&spec.code) {
            Cell::new("yes").fg(Color::Green)
        } else {
            Cell::new("no").fg(Color::DarkGrey)
        };
        table.add_row(vec![
            Cell::new(&spec.code),
            Cell::new(&spec.name),
            Cell::new(&spec.filter),
            stored_cell,
        ]);
    }

    eprintln!("\n{table}");
    eprintln!("{}", footer(registry.len()));
    Ok(())
}

fn footer(count: usize) -> String {
    format!(
        "{count} datasets from {} ({}, region: {})",
        PROVIDER.long_name, PROVIDER.website, PROVIDER.region
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn footer_names_provider_and_region() {
        let line = footer(2);
        assert!(line.starts_with("2 datasets from Organisation for Economic"));
        assert!(line.ends_with("(http://www.oecd.org, region: World)"));
    }
}
