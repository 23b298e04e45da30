//! Log file setup for the `qix` binary.
//!
//! Events from the library go to the configured log file, never to stdout,
//! which is reserved for command output.

use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::ResolvedSettings;
use crate::{Error, Result};

const DEFAULT_LOG_FILE_NAME: &str = "qix.log";

/// Install the global subscriber. The returned guard must be held until the
/// process exits so buffered lines are flushed.
pub fn init(settings: &ResolvedSettings) -> Result<WorkerGuard> {
    let path = settings.log_file.value.as_path();
    let (dir, file_name) = split_log_path(path);
    fs::create_dir_all(dir).map_err(|source| Error::IoAt {
        path: dir.to_path_buf(),
        source,
    })?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_new(&settings.log_level.value)
        .map_err(|e| Error::Config(format!("invalid log level: {}", e)))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false).with_target(false))
        .try_init()
        .map_err(|e| Error::Other(format!("failed to install logger: {}", e)))?;

    Ok(guard)
}

fn split_log_path(path: &Path) -> (&Path, &std::ffi::OsStr) {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .unwrap_or_else(|| std::ffi::OsStr::new(DEFAULT_LOG_FILE_NAME));
    (dir, file_name)
}
