//! Application configuration management.
//!
//! This module handles loading and saving the dispatch configuration: where
//! the record store lives, the default run date and the pairing sheet's
//! column names.
//!
//! Configuration is stored at `~/.config/dispatch/config.json`. The
//! `DISPATCH_DATA_DIR` and `DISPATCH_TARGET_DATE` environment variables
//! override the file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::import::SheetColumns;

/// Application name used for config/data directory paths
const APP_NAME: &str = "dispatch";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const ENV_DATA_DIR: &str = "DISPATCH_DATA_DIR";
pub const ENV_TARGET_DATE: &str = "DISPATCH_TARGET_DATE";

/// Date format for run dates on the command line and in the environment.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    pub data_dir: Option<PathBuf>,
    pub target_date: Option<NaiveDate>,
    #[serde(default)]
    pub columns: SheetColumns,
}

impl Config {
    /// Load the config file and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Invalid config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Override fields from environment lookups.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|v| !v.trim().is_empty()) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(date) = lookup(ENV_TARGET_DATE).filter(|v| !v.trim().is_empty()) {
            self.target_date = Some(
                parse_date(&date).with_context(|| format!("Invalid {}", ENV_TARGET_DATE))?,
            );
        }
        Ok(())
    }

    /// Directory holding the record store documents.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir =
            dirs::data_dir().ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }
}

/// Parse a `YYYY-MM-DD` run date.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .with_context(|| format!("Expected a date like 2025-12-08, got {:?}", s))
}
