//! Configuration loading and management
//!
//! Handles parsing of `taskboard.toml` in the data directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::prefs::{ViewMode, DEFAULT_PAGE_SIZE};

/// Name of the config file inside the data directory
pub const CONFIG_FILE: &str = "taskboard.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Undo history
    #[serde(default)]
    pub history: HistoryConfig,

    /// Where `tb seed` takes tasks from
    #[serde(default)]
    pub seed: SeedConfig,

    /// First-run view preferences
    #[serde(default)]
    pub preferences: PreferencesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Maximum number of undo steps
    #[serde(default = "default_history_limit")]
    pub limit: usize,

    /// Keep the initial seed load as an undoable step
    #[serde(default)]
    pub record_initial_load: bool,
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            limit: default_history_limit(),
            record_initial_load: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedKind {
    Builtin,
    File,
    #[default]
    Url,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedConfig {
    #[serde(default)]
    pub source: SeedKind,

    /// Used when `source = "file"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Used when `source = "url"`
    #[serde(default = "default_seed_url")]
    pub url: String,
}

fn default_seed_url() -> String {
    crate::seed::DEFAULT_SEED_URL.to_string()
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            source: SeedKind::default(),
            path: None,
            url: default_seed_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferencesConfig {
    #[serde(default)]
    pub view: ViewMode,

    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            view: ViewMode::default(),
            page_size: default_page_size(),
        }
    }
}

impl Config {
    /// Load configuration from a `taskboard.toml` file
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the data directory, or return defaults
    ///
    /// An unreadable or invalid file is logged and ignored.
    pub fn load_from_dir(dir: &Path) -> Self {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "ignoring invalid config");
                Self::default()
            }
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> crate::error::Result<()> {
        let content = toml::to_string_pretty(self)?;
        crate::lock::write_atomic(path, content.as_bytes())
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.history.limit == 0 {
            return Err(crate::error::Error::InvalidConfig(
                "history.limit must be > 0".to_string(),
            ));
        }
        if self.preferences.page_size == 0 {
            return Err(crate::error::Error::InvalidConfig(
                "preferences.page_size must be > 0".to_string(),
            ));
        }
        match self.seed.source {
            SeedKind::File if self.seed.path.is_none() => Err(
                crate::error::Error::InvalidConfig(
                    "seed.path is required when seed.source = \"file\"".to_string(),
                ),
            ),
            SeedKind::Url if self.seed.url.trim().is_empty() => Err(
                crate::error::Error::InvalidConfig("seed.url cannot be empty".to_string()),
            ),
            _ => Ok(()),
        }
    }
}
