// CLI configuration loaded from YAML

use crate::filter::{DEFAULT_FUZZY_THRESHOLD, SearchMode};
use crate::snapshot::DEFAULT_KEY;
use crate::storage::{FileStorage, KeyValueStore, SqliteStorage, validate_key};
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where the board is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// One JSON file per key
    #[default]
    File,
    /// Key-value table in SQLite
    Sqlite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    #[default]
    Fuzzy,
    Substring,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub mode: SearchKind,
    pub threshold: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            mode: SearchKind::Fuzzy,
            threshold: DEFAULT_FUZZY_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: Backend,
    pub storage_key: String,
    pub search: SearchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::File,
            storage_key: DEFAULT_KEY.to_string(),
            search: SearchConfig::default(),
        }
    }
}

impl Config {
    /// Parse and validate a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml).context("Failed to parse config")?;
        validate_key(&config.storage_key)?;
        Ok(config)
    }

    /// Load config from `path`, else the user config file, else defaults
    ///
    /// An explicit path must exist. The user config file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => path,
                None => {
                    debug!("No config file, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let yaml = fs::read_to_string(&path).with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::from_yaml(&yaml).with_context(|| format!("Invalid config {}", path.display()))?;
        debug!(path = ?path, ?config, "Loaded config");
        Ok(config)
    }

    /// `<config dir>/taskboard/config.yml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("taskboard").join("config.yml"))
    }

    pub fn search_mode(&self) -> SearchMode {
        match self.search.mode {
            SearchKind::Fuzzy => SearchMode::fuzzy(self.search.threshold),
            SearchKind::Substring => SearchMode::Substring,
        }
    }

    /// Open the configured storage backend under `root`
    pub fn open_storage(&self, root: &Path) -> Result<Box<dyn KeyValueStore>> {
        let storage: Box<dyn KeyValueStore> = match self.backend {
            Backend::File => Box::new(FileStorage::open(root)?),
            Backend::Sqlite => Box::new(SqliteStorage::open(root)?),
        };
        Ok(storage)
    }
}
