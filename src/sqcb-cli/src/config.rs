//! Configuration management for sqcb-unpacker

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::Args;

#[derive(Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub buffer_size: Option<usize>,
    pub wide_tags: bool,
    pub keep_going: bool,
}

impl Config {
    /// Get the path to the default config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("sqcb");

        Ok(config_dir.join("config.toml"))
    }

    /// Load the default config file, or defaults if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a file, or defaults if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Apply command-line overrides
    pub fn merge(self, args: &Args) -> Self {
        Self {
            buffer_size: args.buffer_size.or(self.buffer_size),
            wide_tags: args.wide_tags || self.wide_tags,
            keep_going: args.keep_going || self.keep_going,
        }
    }
}
