//! Structured logging and tracing for the poller
//!
//! Console output (plain or JSON) plus optional daily-rotated log files, with
//! a small component-scoped logger used by the client, coordinator and runtime.

mod level;
mod state;
mod structured;

pub use level::{min_level, parse_log_level};
pub use structured::{LogContext, StructuredLogger, get_logger, get_logger_with_context};

use crate::config::LoggingConfig;
use crate::error::{LocalvoltsError, Result};
use state::{INIT_ERROR, INIT_ONCE, LOG_GUARD};
use std::path::Path;
use tracing::{Level, info};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Set to skip the file layer regardless of configuration
pub const DISABLE_FILE_LOG_ENV: &str = "LOCALVOLTS_DISABLE_FILE_LOG";

type BoxedLayer = Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync>;

/// Initialize logging system based on configuration
///
/// Only the first call installs a subscriber; later calls report the outcome
/// of that first attempt.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    INIT_ONCE.call_once(|| {
        if let Err(e) = install(config) {
            let _ = INIT_ERROR.set(e.to_string());
        }
    });

    if let Some(err) = INIT_ERROR.get() {
        return Err(LocalvoltsError::config(err.clone()));
    }
    Ok(())
}

fn install(config: &LoggingConfig) -> Result<()> {
    let base_level = parse_log_level(&config.level)?;
    let console_level = override_level(config.console_level.as_deref(), base_level);
    let file_level = override_level(config.file_level.as_deref(), base_level);

    let directory = config
        .directory
        .as_deref()
        .filter(|_| !should_use_console_only());

    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut most_verbose = console_level;

    if config.console_output || directory.is_none() {
        layers.push(fmt_layer(std::io::stdout, config.json_format, console_level));
    }

    if let Some(dir) = directory {
        let appender = rolling::Builder::new()
            .rotation(rolling::Rotation::DAILY)
            .filename_prefix("localvolts")
            .filename_suffix("log")
            .max_log_files(config.backup_count.max(1) as usize)
            .build(Path::new(dir))
            .map_err(|e| LocalvoltsError::io(format!("Failed to create log file appender: {}", e)))?;
        let (writer, guard) = non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        layers.push(fmt_layer(writer, config.json_format, file_level));
        most_verbose = min_level(most_verbose, file_level);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(build_env_filter(most_verbose))
        .try_init()
        .map_err(|e| LocalvoltsError::config(format!("Failed to install subscriber: {}", e)))?;

    info!(
        "Logging initialized - console_level: {:?}, file_level: {:?}, directory: {}",
        console_level,
        file_level,
        directory.unwrap_or("-")
    );
    Ok(())
}

fn fmt_layer<W>(writer: W, json: bool, level: Level) -> BoxedLayer
where
    W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let base = fmt::layer()
        .with_writer(writer)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);
    if json {
        base.json()
            .with_filter(LevelFilter::from_level(level))
            .boxed()
    } else {
        base.with_filter(LevelFilter::from_level(level)).boxed()
    }
}

fn override_level(level: Option<&str>, fallback: Level) -> Level {
    level
        .and_then(|s| parse_log_level(s).ok())
        .unwrap_or(fallback)
}

fn build_env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("localvolts={},reqwest=warn,hyper=warn", level.as_str().to_lowercase()).into()
    })
}

fn should_use_console_only() -> bool {
    cfg!(test) || std::env::var_os(DISABLE_FILE_LOG_ENV).is_some()
}
