//! File logging for spectromesh.
//!
//! The terminal belongs to the visualizer while it runs, so every event goes to
//! a daily-rotated file under the XDG state directory. `RUST_LOG` selects the
//! level (default `info`). Only the newest week of files is kept.

use anyhow::{anyhow, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::prelude::*;

/// Rotated files are named `spectromesh.log.YYYY-MM-DD`.
pub const LOG_FILE_PREFIX: &str = "spectromesh.log";

const MAX_LOG_FILES: usize = 7;

/// Keeps the non-blocking writer flushing until the process exits.
static APPENDER_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Installs the global subscriber writing to the rolling log file.
///
/// # Errors
/// - If the log directory cannot be determined or created
/// - If logging was already initialized
pub fn init_logging() -> Result<()> {
    let log_dir = get_log_dir()?;

    if let Err(e) = prune_old_logs(&log_dir) {
        eprintln!("Warning: Failed to prune old logs: {e}");
    }

    let (writer, guard) = tracing_appender::non_blocking(rolling::daily(&log_dir, LOG_FILE_PREFIX));
    APPENDER_GUARD
        .set(guard)
        .map_err(|_| anyhow!("Logging already initialized"))?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false),
        )
        .init();

    tracing::debug!("Logging to {}", log_dir.display());
    Ok(())
}

/// `$XDG_STATE_HOME/spectromesh`, or `~/.local/state/spectromesh`. Created if missing.
///
/// # Errors
/// - If the home directory cannot be determined
/// - If the directory cannot be created
pub fn get_log_dir() -> Result<PathBuf> {
    let state_dir = match std::env::var_os("XDG_STATE_HOME") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::home_dir()
            .ok_or_else(|| anyhow!("Could not determine home directory"))?
            .join(".local")
            .join("state"),
    };
    let log_dir = state_dir.join("spectromesh");
    fs::create_dir_all(&log_dir)?;
    Ok(log_dir)
}

/// Whether `name` is a dated rotation of the log file.
fn is_rotated_log(name: &str) -> bool {
    name.strip_prefix(LOG_FILE_PREFIX)
        .and_then(|rest| rest.strip_prefix('.'))
        .is_some_and(|date| date.len() == 10 && date.matches('-').count() == 2)
}

/// Deletes all but the `MAX_LOG_FILES` most recently modified rotated logs.
fn prune_old_logs(log_dir: &Path) -> Result<()> {
    let mut rotated: Vec<_> = fs::read_dir(log_dir)?
        .filter_map(|entry| {
            let path = entry.ok()?.path();
            let name = path.file_name()?.to_str()?;
            if !is_rotated_log(name) {
                return None;
            }
            let modified = fs::metadata(&path).ok()?.modified().ok()?;
            Some((path, modified))
        })
        .collect();

    rotated.sort_by(|a, b| b.1.cmp(&a.1));

    for (path, _) in rotated.iter().skip(MAX_LOG_FILES) {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!("Failed to delete old log file {}: {}", path.display(), e);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotated_log_names() {
        assert!(is_rotated_log("spectromesh.log.2026-10-16"));
        assert!(!is_rotated_log("spectromesh.log"));
        assert!(!is_rotated_log("spectromesh.log.old"));
        assert!(!is_rotated_log("other.log.2026-10-16"));
    }
}
