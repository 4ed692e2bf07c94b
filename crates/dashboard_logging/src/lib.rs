//! Shared logging setup for the dashboard binaries.
//!
//! Every binary logs to a daily file under `<home>/logs` and to stderr.
//! Scheduled jobs (cron, systemd timers) keep stderr quiet unless
//! `--verbose` is passed, so the per-file summary on stdout stays readable.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "dashboard=info,dashboard_ingest=info,dashboard_db=info";

/// Daily files kept before the oldest is removed.
const MAX_LOG_FILES: usize = 14;

/// Logging configuration shared by dashboard binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
}

/// Initialize tracing with a daily log file and stderr output.
///
/// The returned guard flushes the file writer on drop; keep it alive until
/// the process exits.
pub fn init_logging(config: LogConfig<'_>) -> Result<WorkerGuard> {
    let log_dir = ensure_logs_dir().context("Failed to ensure log directory")?;
    let (file_writer, guard) = file_writer(&log_dir, config.app_name)?;

    let file_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let console_filter = if config.verbose {
        file_filter.clone()
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

/// Non-blocking writer for `<dir>/<app_name>.<yyyy-mm-dd>.log`.
fn file_writer(dir: &Path, app_name: &str) -> Result<(NonBlocking, WorkerGuard)> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(app_name)
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(dir)
        .with_context(|| format!("Failed to open log file for {} in {}", app_name, dir.display()))?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Dashboard home directory: `$DASHBOARD_HOME`, else `~/.dspace_dashboard`.
pub fn dashboard_home() -> Result<PathBuf> {
    if let Ok(override_path) = std::env::var("DASHBOARD_HOME") {
        return Ok(PathBuf::from(override_path));
    }
    dirs::home_dir()
        .map(|home| home.join(".dspace_dashboard"))
        .context("Could not determine home directory; set DASHBOARD_HOME")
}

/// Logs directory: `<home>/logs`
pub fn logs_dir() -> Result<PathBuf> {
    Ok(dashboard_home()?.join("logs"))
}

/// Ensure the logs directory exists.
pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir()?;
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}
