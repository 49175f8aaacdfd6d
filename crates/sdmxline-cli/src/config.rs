//! Configuration loading from TOML files

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use sdmxline_oecd::api::DEFAULT_BASE_URL;
use sdmxline_oecd::{DatasetSpec, Registry};

/// Global configuration for sdmxline
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub oecd: OecdConfig,
    pub cache: CacheConfig,
    pub store: StoreConfig,
    pub http: HttpSettings,
    pub workers: WorkersConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OecdConfig {
    pub base_url: String,
    /// Extra or overriding dataset definitions, keyed by code
    pub datasets: BTreeMap<String, DatasetEntry>,
}

impl Default for OecdConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            datasets: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetEntry {
    pub name: String,
    pub doc_href: Option<String>,
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "LOCATION".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: PathBuf,
    pub keep_downloads: bool,
    pub reuse: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".cache/oecd"),
            keep_downloads: false,
            reuse: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./data"),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Seconds without data before a transfer counts as stalled
    pub read_timeout: u64,
    pub max_retries: u32,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            read_timeout: 60,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    pub default: usize,
    pub max: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self { default: 1, max: 8 }
    }
}

impl WorkersConfig {
    /// Requested worker count, clamped to `1..=max`
    pub fn resolve(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default).clamp(1, self.max.max(1))
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./sdmxline.toml (current directory)
    /// 2. ~/.config/sdmxline/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("sdmxline.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "sdmxline") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Built-in datasets plus the ones declared under `[oecd.datasets]`
    pub fn registry(&self) -> Registry {
        let mut registry = Registry::builtin();
        for (code, entry) in &self.oecd.datasets {
            let replaced = registry.insert(DatasetSpec::new(
                code,
                &entry.name,
                entry.doc_href.as_deref(),
                &entry.filter,
            ));
            if replaced.is_some() {
                log::debug!("{code}: dataset definition overridden by config");
            }
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.store.dir, PathBuf::from("./data"));
        assert_eq!(config.oecd.base_url, DEFAULT_BASE_URL);
        assert!(!config.cache.reuse);
        assert_eq!(config.workers.default, 1);
    }

    #[test]
    fn parse_config_toml() {
        let toml = r#"
[oecd]
base_url = "https://example.org/sdmx-json"

[oecd.datasets.QNA]
name = "Quarterly National Accounts"

[cache]
dir = "/tmp/cache"
reuse = true

[store]
dir = "/tmp/data"

[workers]
default = 2
max = 4
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.oecd.base_url, "https://example.org/sdmx-json");
        assert_eq!(config.oecd.datasets["QNA"].filter, "LOCATION");
        assert!(config.oecd.datasets["QNA"].doc_href.is_none());
        assert_eq!(config.cache.dir, PathBuf::from("/tmp/cache"));
        assert!(config.cache.reuse);
        assert_eq!(config.store.dir, PathBuf::from("/tmp/data"));
        assert_eq!(config.http.max_retries, 3);
        assert_eq!(config.workers.default, 2);
    }

    #[test]
    fn config_datasets_extend_registry() {
        let config: Config = toml::from_str(
            r#"
[oecd.datasets.QNA]
name = "Quarterly National Accounts"
filter = "SUBJECT"

[oecd.datasets.EO]
name = "Economic Outlook (custom)"
"#,
        )
        .unwrap();
        let registry = config.registry();
        assert_eq!(registry.get("QNA").unwrap().filter, "SUBJECT");
        assert_eq!(registry.get("EO").unwrap().name, "Economic Outlook (custom)");
        assert!(registry.get("MEI").is_some());
    }

    #[test]
    fn from_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sdmxline.toml");
        std::fs::write(&path, "[store]\ndir = \"/srv/sdmx\"\n").unwrap();
        assert_eq!(Config::from_file(&path).unwrap().store.dir, PathBuf::from("/srv/sdmx"));

        std::fs::write(&path, "[store\n").unwrap();
        let err = Config::from_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("sdmxline.toml"));
    }

    #[test]
    fn workers_are_clamped() {
        let workers = WorkersConfig { default: 2, max: 4 };
        assert_eq!(workers.resolve(None), 2);
        assert_eq!(workers.resolve(Some(16)), 4);
        assert_eq!(workers.resolve(Some(0)), 1);
    }
}
