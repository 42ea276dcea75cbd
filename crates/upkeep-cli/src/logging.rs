use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub(crate) const LOG_FILE_NAME: &str = "updates.log";
const LOG_FILTER_ENV: &str = "UPKEEP_LOG";
const DEFAULT_LOG_FILTER: &str = "upkeep=info,upkeep_supervisor=info,upkeep_core=info";

pub(crate) fn config_home() -> Result<PathBuf> {
    directories::ProjectDirs::from("", "", "upkeep")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| anyhow!("cannot determine the user configuration directory"))
}

pub(crate) fn log_file_path() -> Result<PathBuf> {
    Ok(config_home()?.join(LOG_FILE_NAME))
}

pub(crate) fn init_logging() -> Result<WorkerGuard> {
    let log_dir = config_home()?;
    init_logging_in(&log_dir)
}

fn init_logging_in(log_dir: &Path) -> Result<WorkerGuard> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory: {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_env_filter(log_filter())
        .try_init()
        .map_err(|err| anyhow!("failed to install log subscriber: {err}"))?;

    Ok(guard)
}

fn log_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}
