//! Logging initialization and configuration.
//!
//! Uses the `tracing` ecosystem for structured logging with support for
//! both human-readable and JSON output formats.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the logging subsystem.
///
/// # Arguments
///
/// * `verbose` - If true, enables at least DEBUG level logging; otherwise the configured level.
/// * `json_format` - If true, outputs structured JSON logs; otherwise pretty-printed.
/// * `log_file` - When set, every event is also written (without colors) to this file.
///
/// # Notes
///
/// - Log output goes to stderr (stdout is reserved for data output)
/// - The RUST_LOG environment variable can override the log level
pub fn init(level: &str, verbose: bool, json_format: bool, log_file: Option<File>) {
    // Build the filter, respecting RUST_LOG if set
    let default_level = effective_level(level, verbose);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = log_file.map(|file| {
        fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
    });

    if json_format {
        // JSON format for machine parsing
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        // Pretty format for humans
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

/// The default filter directive: `--verbose` raises the level to at least DEBUG,
/// and never lowers a configured TRACE.
fn effective_level(level: &str, verbose: bool) -> &str {
    if verbose && !level.eq_ignore_ascii_case("trace") {
        "debug"
    } else {
        level
    }
}

/// Initialize logging with configuration from Config.
///
/// With `logging.redirect_stdout` set, a copy of the log goes to
/// `<log_dir>/stdout_<unix-seconds>.txt`; the returned path names that file.
pub fn init_from_config(
    config: &pedattr_core::Config,
    verbose_override: bool,
    json_logs_override: bool,
) -> anyhow::Result<Option<PathBuf>> {
    let json_format = json_logs_override || config.logging.format == "json";

    let (file, path) = if config.logging.redirect_stdout {
        let path = redirect_path(config)?;
        (Some(File::create(&path)?), Some(path))
    } else {
        (None, None)
    };

    init(&config.logging.level, verbose_override, json_format, file);
    if let Some(path) = &path {
        tracing::info!("Logging to {}", path.display());
    }
    Ok(path)
}

fn redirect_path(config: &pedattr_core::Config) -> anyhow::Result<PathBuf> {
    let dir = config.log_dir();
    std::fs::create_dir_all(&dir)?;
    let secs = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    Ok(dir.join(format!("stdout_{secs}.txt")))
}
