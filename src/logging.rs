//! Tracing subscriber setup
//!
//! `RUST_LOG` takes precedence over the configured level. Console output goes
//! to stderr so that command output on stdout stays machine-readable.

use crate::config::LoggingConfig;
use anyhow::{Context, Result};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Which sinks an output mode enables, as `(console, file)`
#[must_use]
pub fn sinks(output: &str) -> (bool, bool) {
    match output {
        "file" => (false, true),
        "both" => (true, true),
        _ => (true, false),
    }
}

/// Split the configured log file path into its directory and file name
pub fn log_file_location(config: &LoggingConfig) -> Result<(PathBuf, OsString)> {
    let path = Path::new(&config.file_path);
    let name = path
        .file_name()
        .with_context(|| format!("Log file path has no file name: {}", config.file_path))?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Ok((dir.to_path_buf(), name.to_os_string()))
}

/// Install the global subscriber
///
/// Returns the file writer guard when file output is enabled; it must be kept
/// alive for buffered lines to be flushed.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("Invalid log level '{}'", config.level))?;
    let json = config.format == "json";
    let (to_console, to_file) = sinks(&config.output);

    let console = to_console.then(|| {
        if json {
            fmt::layer().json().with_writer(io::stderr).boxed()
        } else {
            fmt::layer().with_writer(io::stderr).boxed()
        }
    });

    let mut guard = None;
    let file = if to_file {
        let (dir, name) = log_file_location(config)?;
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
        let (writer, worker) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
        guard = Some(worker);
        Some(if json {
            fmt::layer().json().with_ansi(false).with_writer(writer).boxed()
        } else {
            fmt::layer().with_ansi(false).with_writer(writer).boxed()
        })
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .with(filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("console", (true, false))]
    #[case("file", (false, true))]
    #[case("both", (true, true))]
    fn test_output_modes(#[case] output: &str, #[case] expected: (bool, bool)) {
        assert_eq!(sinks(output), expected);
    }

    #[test]
    fn test_log_file_location() {
        let mut config = LoggingConfig::default();
        config.file_path = "logs/places2go.log".to_string();
        let (dir, name) = log_file_location(&config).unwrap();
        assert_eq!(dir, PathBuf::from("logs"));
        assert_eq!(name, OsString::from("places2go.log"));

        config.file_path = "app.log".to_string();
        let (dir, _) = log_file_location(&config).unwrap();
        assert_eq!(dir, PathBuf::from("."));

        config.file_path = "/".to_string();
        assert!(log_file_location(&config).is_err());
    }
}
