//! Tracing setup for the CLI, the daemon and the hook.
//!
//! `RUST_LOG` overrides the default level. The detached daemon has no
//! terminal, so it logs through a rolling, non-blocking file appender.

use std::fs;
use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

use crate::config::{LogRotation, LoggingConfig};

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

pub fn level(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

/// Log to stderr.
pub fn init_stderr(default: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(filter(default))
        .with_writer(io::stderr)
        .init();
}

/// Log to a rolling file at `path`. Keep the guard alive until exit or
/// buffered lines are lost.
pub fn init_file(default: &str, path: &Path, config: &LoggingConfig) -> io::Result<WorkerGuard> {
    let (writer, guard) = tracing_appender::non_blocking(appender(path, config)?);
    tracing_subscriber::fmt()
        .with_env_filter(filter(default))
        .with_ansi(false)
        .with_writer(writer)
        .init();
    Ok(guard)
}

/// Appender writing `path` (plus a date suffix unless rotation is
/// `never`), keeping the current file and `config.backups` rolled ones.
fn appender(path: &Path, config: &LoggingConfig) -> io::Result<RollingFileAppender> {
    let dir = path.parent().filter(|d| !d.as_os_str().is_empty()).unwrap_or(Path::new("."));
    fs::create_dir_all(dir)?;
    let prefix = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "tip_narrator.log".into());

    let rotation = match config.rotation {
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Never => Rotation::NEVER,
    };
    RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(prefix)
        .max_log_files(config.backups as usize + 1)
        .build(dir)
        .map_err(io::Error::other)
}
