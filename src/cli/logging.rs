use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Default log file, relative to the working directory
pub const DEFAULT_LOG_FILE: &str = "logs/etl_log.txt";

/// Initializes logging to the console and to `log_file`.
///
/// `RUST_LOG` overrides the default filter. The returned guard flushes the
/// file writer when dropped, so keep it alive until the process exits.
pub fn init_logging(log_file: &Path, verbose: bool) -> Result<WorkerGuard> {
    let directory = log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = log_file
        .file_name()
        .context("log file path has no file name")?;
    fs::create_dir_all(directory)
        .with_context(|| format!("creating log directory {}", directory.display()))?;

    let file_appender = tracing_appender::rolling::never(directory, file_name);
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if verbose { "record_etl=debug" } else { "record_etl=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(non_blocking_writer);
    let console_layer = fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("installing the tracing subscriber")?;

    Ok(guard)
}
