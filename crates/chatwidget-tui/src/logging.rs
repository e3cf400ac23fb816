use std::path::PathBuf;

use anyhow::{anyhow, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const LOG_FILE_NAME: &str = "chatwidget.log";
const DEFAULT_LEVEL: &str = "info";

/// `RUST_LOG` wins, then the configured level, then `info`
fn filter(level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = level.unwrap_or(DEFAULT_LEVEL);
        EnvFilter::try_new(format!("chatwidget={level},chatwidget_core={level},warn"))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL))
    })
}

pub fn log_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| anyhow!("Could not determine data directory"))?;
    Ok(data_dir.join("chatwidget"))
}

/// Log to a file while the terminal UI owns the screen. Keep the guard alive
/// until exit so buffered lines get flushed.
pub fn init_file(level: Option<&str>) -> Result<(PathBuf, WorkerGuard)> {
    let dir = log_dir()?;
    std::fs::create_dir_all(&dir)?;

    let appender = tracing_appender::rolling::never(&dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter(level))
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    Ok((dir.join(LOG_FILE_NAME), guard))
}

/// Headless commands log to stderr so stdout carries only the reply
pub fn init_stderr(level: Option<&str>) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(filter(level))
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}
