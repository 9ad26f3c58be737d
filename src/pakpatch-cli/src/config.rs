//! Configuration management for pakpatch CLI

use anyhow::{Context, Result};
use pakpatch::RemoteSource;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    /// Working directory containing PAKS/ and UNPACK/
    pub root: Option<PathBuf>,

    /// External archiver executable
    pub archiver: Option<PathBuf>,

    /// Arguments inserted before `-a -r`, e.g. a script path when the
    /// archiver is run through an interpreter
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub archiver_args: Vec<String>,

    pub archiver_timeout_secs: Option<u64>,

    /// Archive used when a command is run without `--archive`
    pub default_archive: Option<String>,

    /// Index file for name lookups (`name | hexcode | index:value`)
    pub index_file: Option<PathBuf>,

    pub remote: Option<RemoteConfig>,
}

/// Remote lookup tables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(flatten)]
    pub source: RemoteSource,

    /// Paste listing the items to replace
    pub source_paste: String,

    /// Paste listing the replacements
    pub replacement_paste: String,
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("pakpatch");

        Ok(config_dir.join("config.toml"))
    }

    /// Load configuration from file, or create default if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?;

        toml::from_str(&contents).context("Failed to parse config file")
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory at {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(config_path, contents)
            .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

        Ok(())
    }
}
