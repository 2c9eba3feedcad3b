//! Diagnostic logging setup
//!
//! Console output goes to stderr so that the event lines printed on stdout stay readable.
//! An optional JSON file layer keeps a rotating record of every run.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How often the log file is rolled over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    Daily,
    Hourly,
    Never,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Print diagnostics to stderr
    #[serde(default = "default_console")]
    pub console: bool,
    /// JSON log file, disabled when absent
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default = "default_rotation")]
    pub rotation: Rotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            console: default_console(),
            file: None,
            rotation: default_rotation(),
        }
    }
}

fn default_console() -> bool { true }
fn default_rotation() -> Rotation { Rotation::Daily }

/// Map a level name to a tracing level, falling back to INFO.
pub fn parse_level(name: &str) -> Level {
    match name.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Filter used when `RUST_LOG` is not set
fn default_directives(level: Level) -> String {
    format!("save_mirror={level},mirror_sync={level}")
}

/// Install the global subscriber. The returned guard flushes the file writer on drop and must
/// be held for the life of the process.
pub fn initialize_logging(config: &LoggingConfig, level: &str) -> Result<Option<WorkerGuard>> {
    let level = parse_level(level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let console_layer = config.console.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
    });

    let (file_layer, guard) = match &config.file {
        Some(log_path) => {
            let directory = log_path.parent().unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(directory)?;
            let file_name = log_path
                .file_name()
                .unwrap_or_else(|| std::ffi::OsStr::new("save-mirror.log"));

            let appender = match config.rotation {
                Rotation::Daily => rolling::daily(directory, file_name),
                Rotation::Hourly => rolling::hourly(directory, file_name),
                Rotation::Never => rolling::never(directory, file_name),
            };

            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .json()
                .with_current_span(true)
                .with_span_list(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}
