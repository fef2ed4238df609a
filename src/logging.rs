use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::storage::ensure_parent_dir;

pub const LOG_ENV: &str = "TERMNOTES_LOG";
pub const DEFAULT_LEVEL: &str = "info";

/// Sends tracing output to `path`. The terminal belongs to the UI, so nothing
/// is ever logged to stdout or stderr.
pub fn init_file_logging(path: &Path, level: Option<&str>) -> Result<()> {
    ensure_parent_dir(path)
        .with_context(|| format!("Failed to create log directory for {}", path.display()))?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(level.unwrap_or(DEFAULT_LEVEL)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install logger: {e}"))?;
    Ok(())
}
