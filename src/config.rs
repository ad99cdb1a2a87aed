//! Configuration management for fileswap
//!
//! fileswap stores configuration in ~/.fileswap/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::replacer::DEFAULT_CHUNK_SIZE;

/// fileswap configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Search/replace defaults
    #[serde(default)]
    pub replace: ReplaceConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaceConfig {
    /// Bytes read per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Abort the run on the first unreadable directory or file
    #[serde(default = "default_fail_on_error")]
    pub fail_on_error: bool,

    /// Log every file as it is searched
    #[serde(default)]
    pub verbose: bool,
}

impl Default for ReplaceConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            fail_on_error: true,
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Append a debug log to ~/.fileswap/fileswap.log
    #[serde(default)]
    pub debug: bool,
}

fn default_chunk_size() -> usize { DEFAULT_CHUNK_SIZE }
fn default_fail_on_error() -> bool { true }

/// Get the configuration file path
pub fn config_file_path() -> Result<PathBuf> {
    let home_dir = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(home_dir.join(".fileswap").join("config.toml"))
}

/// Default configuration file content with comments
fn get_default_config_content() -> &'static str {
    r#"# fileswap Configuration File
#
# Values set here can be overridden by command-line flags.

[replace]
# Bytes read per chunk while streaming a file (default: 16384)
# Patterns longer than this still match; the carry-over grows as needed.
chunk_size = 16384

# Abort the whole run on the first unreadable directory or file (default: true)
# When false, the failure is logged and the run continues (same as --keep-going).
fail_on_error = true

# Log every file as it is searched (default: false)
verbose = false

[logging]
# Append a debug log to ~/.fileswap/fileswap.log (default: false)
debug = false
"#
}

/// Write the default commented configuration file to `path`
pub fn save_default_config_to(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
    }

    fs::write(path, get_default_config_content())
        .with_context(|| format!("Failed to write default config file: {}", path.display()))?;

    Ok(())
}

/// Load configuration from the default location, creating it if needed
pub fn load_config() -> Result<Config> {
    load_config_from(&config_file_path()?)
}

/// Load configuration from `path`
///
/// A missing file is created with defaults. A malformed file is replaced with
/// defaults. A well-formed file with invalid values is an error.
pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        save_default_config_to(path)?;
    }

    let config_str = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = match toml::from_str(&config_str) {
        Ok(config) => config,
        Err(_) => {
            save_default_config_to(path)?;
            return Ok(Config::default());
        }
    };

    validate_config(&config).with_context(|| format!("Invalid config file: {}", path.display()))?;

    Ok(config)
}

/// Validate configuration values
pub fn validate_config(config: &Config) -> Result<()> {
    if config.replace.chunk_size == 0 {
        anyhow::bail!("Invalid chunk_size: 0 (must be at least 1)");
    }

    Ok(())
}
