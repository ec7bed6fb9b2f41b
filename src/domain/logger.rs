//! File logging for debug runs.
//!
//! Writes one file per day under the configured log directory. `RUST_LOG`
//! overrides the default directives.

use std::fs::{self, DirEntry};
use std::path::Path;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use time::macros::format_description;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::{self, time::OffsetTime};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// File name prefix of every rotated log file.
const LOG_PREFIX: &str = "portcullis";

/// Everything from this crate at debug, dependencies only when they warn.
const DEFAULT_DIRECTIVES: &str = "warn,portcullis=debug";

/// How long rotated files are kept.
pub const LOG_RETENTION: Duration = Duration::from_secs(2 * 24 * 60 * 60);

/// Install the global subscriber writing to `config.log_path`.
pub fn init(config: &Config) -> Result<()> {
    fs::create_dir_all(&config.log_path).with_context(|| {
        format!("Failed to create log directory: {}", config.log_path.display())
    })?;
    let removed = cleanup_old_logs(&config.log_path, SystemTime::now() - LOG_RETENTION)?;

    let appender = RollingFileAppender::new(Rotation::DAILY, &config.log_path, LOG_PREFIX);
    let offset = time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
    let timer = OffsetTime::new(
        offset,
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    );

    let file_layer = fmt::layer()
        .with_writer(appender)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .with_timer(timer);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set global subscriber: {}", e))?;

    tracing::debug!(
        "logging to {} (removed {} old files)",
        config.log_path.display(),
        removed
    );
    Ok(())
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Delete this crate's log files last modified before `cutoff`.
///
/// Other files in the directory are left alone. Returns how many were removed.
pub fn cleanup_old_logs(log_path: &Path, cutoff: SystemTime) -> Result<usize> {
    if !log_path.is_dir() {
        return Ok(0);
    }

    let expired: Vec<_> = fs::read_dir(log_path)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| is_log_file(entry) && modified_before(entry, cutoff))
        .map(|entry| entry.path())
        .collect();

    Ok(expired
        .iter()
        .filter(|path| fs::remove_file(path).is_ok())
        .count())
}

fn is_log_file(entry: &DirEntry) -> bool {
    entry.file_type().map(|t| t.is_file()).unwrap_or(false)
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(LOG_PREFIX))
}

fn modified_before(entry: &DirEntry, cutoff: SystemTime) -> bool {
    entry
        .metadata()
        .and_then(|m| m.modified())
        .map(|modified| modified < cutoff)
        .unwrap_or(false)
}
