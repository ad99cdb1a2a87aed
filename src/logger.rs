//! Logging support for fileswap
//!
//! Tasks report progress through the [`TaskLog`] sink. The binary routes that
//! sink into `tracing`, written to stderr and, when debug logging is enabled in
//! the config, appended to ~/.fileswap/fileswap.log as well.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

/// Destination for task progress lines and logged-and-skipped failures.
pub trait TaskLog {
    fn info(&mut self, message: &str);
    fn warn(&mut self, message: &str);
}

/// Forwards task output to the global `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl TaskLog for TracingLog {
    fn info(&mut self, message: &str) {
        tracing::info!("{}", message);
    }

    fn warn(&mut self, message: &str) {
        tracing::warn!("{}", message);
    }
}

/// Keeps every line in memory, in order.
#[derive(Debug, Default, Clone)]
pub struct MemoryLog {
    pub lines: Vec<String>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|line| line.contains(needle))
    }
}

impl TaskLog for MemoryLog {
    fn info(&mut self, message: &str) {
        self.lines.push(message.to_string());
    }

    fn warn(&mut self, message: &str) {
        self.lines.push(message.to_string());
    }
}

/// Default filter directive for a verbosity setting.
pub fn default_filter(quiet: bool, debug: bool) -> &'static str {
    if debug {
        "fileswap=debug"
    } else if quiet {
        "fileswap=warn"
    } else {
        "fileswap=info"
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides `filter`. Returns the debug log path when file logging
/// was requested and the file could be opened.
pub fn init_logging(filter: &str, debug_file: bool) -> Result<Option<PathBuf>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    let (file_layer, log_path) = if debug_file {
        match open_log_file() {
            Ok((file, path)) => {
                let layer = fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false);
                (Some(layer), Some(path))
            }
            Err(e) => {
                // Logging must never break a run
                eprintln!("Warning: Could not create log file: {:#}", e);
                (None, None)
            }
        }
    } else {
        (None, None)
    };

    let subscriber = registry().with(env_filter).with(stderr_layer).with(file_layer);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))?;

    Ok(log_path)
}

fn open_log_file() -> Result<(fs::File, PathBuf)> {
    let log_path = get_log_path()?;

    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
    }

    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file: {}", log_path.display()))?;

    Ok((file, log_path))
}

/// Path of the debug log file
pub fn get_log_path() -> Result<PathBuf> {
    let home_dir = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(home_dir.join(".fileswap").join("fileswap.log"))
}
