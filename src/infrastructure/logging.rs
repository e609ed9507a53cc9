//! Centralized file-based logging system
//!
//! Writes logs to files under the log directory, separated by log type:
//! - main/  - all application logs (JSON)
//! - error/ - warnings and errors only
//! - poll/  - poll scheduler and feed logs
//! - api/   - autocomplete relay logs

use std::fs;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

const LOG_TYPES: [&str; 4] = ["main", "error", "poll", "api"];

/// Initialize file and console logging
///
/// Returns the appender guards, which must be kept alive for the duration
/// of the program. Filter comes from `RUST_LOG`, defaulting to `info`.
pub fn init_logging(logs_dir: &Path) -> io::Result<Vec<WorkerGuard>> {
    for log_type in LOG_TYPES {
        fs::create_dir_all(logs_dir.join(log_type))?;
    }

    let mut guards = Vec::new();

    let (main_appender, main_guard) = create_appender(logs_dir, "main");
    guards.push(main_guard);

    let (error_appender, error_guard) = create_appender(logs_dir, "error");
    guards.push(error_guard);

    let (poll_appender, poll_guard) = create_appender(logs_dir, "poll");
    guards.push(poll_guard);

    let (api_appender, api_guard) = create_appender(logs_dir, "api");
    guards.push(api_guard);

    let main_layer = tracing_subscriber::fmt::layer()
        .with_writer(main_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_thread_names(true)
        .json();

    let error_layer = tracing_subscriber::fmt::layer()
        .with_writer(error_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(tracing_subscriber::filter::LevelFilter::WARN);

    let poll_layer = tracing_subscriber::fmt::layer()
        .with_writer(poll_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
            is_poll_target(metadata.target())
        }));

    let api_layer = tracing_subscriber::fmt::layer()
        .with_writer(api_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
            is_api_target(metadata.target())
        }));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(main_layer)
        .with(error_layer)
        .with(poll_layer)
        .with(api_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    tracing::info!("Logging system initialized. Log files in {}", logs_dir.display());

    Ok(guards)
}

fn is_poll_target(target: &str) -> bool {
    target.contains("poll") || target.contains("feed") || target.contains("sync")
}

fn is_api_target(target: &str) -> bool {
    target.contains("api") || target.contains("server")
}

/// Create a daily rolling file appender
fn create_appender(logs_dir: &Path, name: &str) -> (NonBlocking, WorkerGuard) {
    let appender = RollingFileAppender::new(Rotation::DAILY, logs_dir.join(name), name);
    tracing_appender::non_blocking(appender)
}

/// Log macro helpers for specific log types
#[macro_export]
macro_rules! log_poll {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "poll", $level, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_feed {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "feed", $level, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_api {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "api", $level, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_main {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "main", $level, $($arg)+)
    };
}
