//! Tracing setup for the CLI and for test binaries
//!
//! The console shows fixture progress on stderr. A log directory adds a daily
//! file, optionally as JSON lines. Forwarded container output is emitted
//! under the [`CONTAINER_TARGET`] target and has its own level, so it can be
//! silenced without hiding lifecycle events.

use anyhow::{Context, Result};
use std::cmp::Reverse;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::time::SystemTime;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Target of forwarded container stdout/stderr lines
pub const CONTAINER_TARGET: &str = "mysql_fixture::container";

const LOG_FILE_PREFIX: &str = "mysql-fixture";

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory for log files; console only when `None`
    pub log_directory: Option<PathBuf>,
    pub console_level: Level,
    pub file_level: Level,
    /// Level applied to [`CONTAINER_TARGET`] on every output
    pub container_level: Level,
    /// Write the log file as JSON lines
    pub json_file: bool,
    /// Log files kept after rotation
    pub max_files: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_directory: None,
            console_level: Level::INFO,
            file_level: Level::DEBUG,
            container_level: Level::INFO,
            json_file: false,
            max_files: 10,
        }
    }
}

impl LoggingConfig {
    pub fn verbose(mut self, verbose: bool) -> Self {
        if verbose {
            self.console_level = Level::DEBUG;
        }
        self
    }

    pub fn with_log_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_directory = Some(dir.into());
        self
    }

    pub fn with_container_level(mut self, level: Level) -> Self {
        self.container_level = level;
        self
    }

    pub fn json_file(mut self, json: bool) -> Self {
        self.json_file = json;
        self
    }

    /// Filter directives for a layer at `level`
    fn directives(&self, level: Level) -> String {
        format!(
            "warn,mysql_fixture={},{}={}",
            level, CONTAINER_TARGET, self.container_level
        )
    }
}

/// Parse a level name, falling back to INFO
pub fn parse_level(level: &str) -> Level {
    level.trim().parse().unwrap_or(Level::INFO)
}

/// Install the global subscriber.
///
/// Keep the returned guard alive until exit; dropping it flushes the file
/// writer.
pub fn init_logging(config: &LoggingConfig) -> Result<LogGuard> {
    let Some(ref dir) = config.log_directory else {
        tracing_subscriber::registry()
            .with(console_layer(config))
            .init();
        return Ok(LogGuard { _file_guard: None });
    };

    let log_dir = crate::config::expand_tilde(dir);
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {:?}", log_dir))?;

    let appender = RollingFileAppender::new(
        Rotation::DAILY,
        &log_dir,
        format!("{}.log", LOG_FILE_PREFIX),
    );
    let (writer, file_guard) = tracing_appender::non_blocking(appender);
    let file_filter = env_or(config.directives(config.file_level));

    let file_layer = if config.json_file {
        fmt::layer()
            .json()
            .with_writer(writer)
            .with_filter(file_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true)
            .with_filter(file_filter)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer(config))
        .init();

    prune_log_files(&log_dir, config.max_files)?;

    Ok(LogGuard {
        _file_guard: Some(file_guard),
    })
}

/// Route fixture logs into the test harness's captured output. Every test
/// may call this; only the first call installs a subscriber.
pub fn init_test_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_or("mysql_fixture=debug".to_string()))
            .with_test_writer()
            .try_init();
    });
}

fn console_layer<S>(config: &LoggingConfig) -> impl Layer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(env_or(config.directives(config.console_level)))
}

/// `RUST_LOG` when set, otherwise `directives`
fn env_or(directives: String) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives))
}

/// Delete all but the `keep` most recently modified log files
fn prune_log_files(log_dir: &Path, keep: u32) -> Result<()> {
    let mut files: Vec<(SystemTime, PathBuf)> = fs::read_dir(log_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(LOG_FILE_PREFIX) && name.contains(".log"))
        })
        .map(|entry| {
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, entry.path())
        })
        .collect();

    files.sort_by_key(|(modified, _)| Reverse(*modified));

    for (_, path) in files.into_iter().skip(keep as usize) {
        match fs::remove_file(&path) {
            Ok(()) => tracing::debug!("Removed old log file {:?}", path),
            Err(e) => tracing::warn!("Failed to remove old log file {:?}: {}", path, e),
        }
    }

    Ok(())
}

/// Keeps the file writer alive; flushes on drop
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}
