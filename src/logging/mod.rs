//! Logging infrastructure - structured tracing for native transitions
//!
//! Design: Uses `tracing` for structured, contextual logging with:
//! - Configurable log levels, `RUST_LOG` taking precedence
//! - Zero-cost when disabled
//! - Console or file output, human-readable or JSON

use crate::callback::CallbackError;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::io;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Global logging state
static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Flushes the file writer; lives as long as the process
static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Log level as written in configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default log level
    pub level: LogLevel,
    /// Enable file logging
    pub file_output: bool,
    /// Log file path (if file_output enabled)
    pub log_path: Option<String>,
    /// Enable JSON format (vs human-readable)
    pub json_format: bool,
    /// Show span events (enter/exit)
    pub show_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file_output: false,
            log_path: None,
            json_format: false,
            show_spans: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Overlay environment variables on top of this config
    pub fn apply_env(&mut self) {
        // NATIVECALL_LOG_LEVEL: trace, debug, info, warn, error
        if let Ok(level) = std::env::var("NATIVECALL_LOG_LEVEL") {
            self.level = LogLevel::parse(&level).unwrap_or(LogLevel::Info);
        }

        // NATIVECALL_LOG_FILE: path to log file
        if let Ok(path) = std::env::var("NATIVECALL_LOG_FILE") {
            self.file_output = true;
            self.log_path = Some(path);
        }

        if std::env::var("NATIVECALL_LOG_JSON").is_ok() {
            self.json_format = true;
        }

        if std::env::var("NATIVECALL_LOG_SPANS").is_ok() {
            self.show_spans = true;
        }
    }

    /// Create debug config (verbose logging)
    pub fn debug() -> Self {
        Self {
            level: LogLevel::Trace,
            file_output: true,
            log_path: Some("nativecall.log".to_string()),
            json_format: false,
            show_spans: true,
        }
    }
}

/// Initialize logging with configuration from the environment
pub fn init() {
    init_with_config(LogConfig::from_env());
}

/// Initialize logging with custom configuration
///
/// Only the first call installs a subscriber. An already installed global
/// subscriber (e.g. the embedding application's) is left in place.
pub fn init_with_config(config: LogConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "nativecall={}",
                Level::from(config.level).as_str().to_lowercase()
            ))
        });

        let span_events = if config.show_spans {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let (file, unusable) = match (&config.log_path, config.file_output) {
            (Some(path), true) => match log_file_location(Path::new(path)) {
                Ok(location) => (Some(location), None),
                Err(err) => (None, Some((path.clone(), err))),
            },
            _ => (None, None),
        };

        match file {
            Some((directory, file_name)) => {
                let appender = tracing_appender::rolling::never(directory, file_name);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let _ = FILE_GUARD.set(guard);

                let layer: BoxedLayer = if config.json_format {
                    fmt::layer()
                        .with_writer(writer)
                        .json()
                        .with_span_events(span_events)
                        .with_filter(filter)
                        .boxed()
                } else {
                    fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_span_events(span_events)
                        .with_target(true)
                        .with_filter(filter)
                        .boxed()
                };
                let _ = tracing_subscriber::registry().with(layer).try_init();
            }
            None => {
                let layer: BoxedLayer = if config.json_format {
                    fmt::layer()
                        .with_writer(io::stderr)
                        .json()
                        .with_span_events(span_events)
                        .with_filter(filter)
                        .boxed()
                } else {
                    fmt::layer()
                        .with_writer(io::stderr)
                        .with_span_events(span_events)
                        .with_target(true)
                        .with_thread_ids(cfg!(debug_assertions))
                        .with_line_number(cfg!(debug_assertions))
                        .with_filter(filter)
                        .boxed()
                };
                let _ = tracing_subscriber::registry().with(layer).try_init();
            }
        }

        if let Some((path, err)) = unusable {
            tracing::warn!(
                event = "log_file_unusable",
                path = %path,
                error = %err,
                "Logging to stderr instead"
            );
        }
    });
}

/// Directory and file name for file output, creating the directory
fn log_file_location(path: &Path) -> io::Result<(PathBuf, PathBuf)> {
    let directory = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("nativecall.log"));

    fs::create_dir_all(directory)?;
    Ok((directory.to_path_buf(), file_name))
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

// ============================================================================
// Gateway and loader events
// ============================================================================

/// Log a transition into native code
#[inline]
pub fn log_native_call(function: usize) {
    use tracing::trace;
    trace!(
        event = "native_call",
        function = function,
        "Calling native function"
    );
}

/// Log the return from native code
#[inline]
pub fn log_native_return(function: usize, r1: usize, err: usize) {
    use tracing::trace;
    trace!(
        event = "native_return",
        function = function,
        r1 = r1,
        err = err,
        "Native function returned"
    );
}

/// Log a loaded library
pub fn log_library_loaded(name: &str) {
    use tracing::debug;
    debug!(event = "library_loaded", library = name, "Library loaded");
}

/// Log a resolved symbol
pub fn log_symbol_resolved(library: &str, symbol: &str, address: usize) {
    use tracing::debug;
    debug!(
        event = "symbol_resolved",
        library = library,
        symbol = symbol,
        address = address,
        "Symbol resolved"
    );
}

// ============================================================================
// Callback events
// ============================================================================

/// Log a new callback registration
pub fn log_callback_registered(slot: usize, address: usize) {
    use tracing::debug;
    debug!(
        event = "callback_registered",
        slot = slot,
        address = address,
        "Callback registered"
    );
}

/// Log a released callback slot
pub fn log_callback_released(slot: usize, address: usize) {
    use tracing::debug;
    debug!(
        event = "callback_released",
        slot = slot,
        address = address,
        "Callback released"
    );
}

/// Log a registration answered from the dedup cache
pub fn log_callback_deduplicated(address: usize) {
    use tracing::trace;
    trace!(
        event = "callback_deduplicated",
        address = address,
        "Callback already registered"
    );
}

/// Log a rejected callback signature
pub fn log_callback_rejected(error: &CallbackError) {
    use tracing::warn;
    warn!(
        event = "callback_rejected",
        error = %error,
        "Callback registration rejected"
    );
}

/// Log a callback fired by native code
#[inline]
pub fn log_callback_invoked(slot: usize) {
    use tracing::trace;
    trace!(event = "callback_invoked", slot = slot, "Callback invoked");
}

/// Log a result produced by a callback declared without one
pub fn log_callback_result_dropped(kind: &str) {
    use tracing::warn;
    warn!(
        event = "callback_result_dropped",
        kind = kind,
        "Callback returned a value its signature does not declare"
    );
}

/// Log a full callback table
pub fn log_capacity_exhausted(capacity: usize) {
    use tracing::warn;
    warn!(
        event = "capacity_exhausted",
        capacity = capacity,
        "Callback table is full"
    );
}

/// Log a host registration
pub fn log_host_callback_registered(address: usize) {
    use tracing::debug;
    debug!(
        event = "host_callback_registered",
        address = address,
        "Callback registered with host"
    );
}

/// Log a host release
pub fn log_host_callback_released(address: usize) {
    use tracing::debug;
    debug!(
        event = "host_callback_released",
        address = address,
        "Callback released by host"
    );
}

/// Log the process-wide backend selection
pub fn log_backend_installed(capacity: usize) {
    use tracing::info;
    info!(
        event = "backend_installed",
        capacity = capacity,
        "Callback backend installed"
    );
}

/// Log a trampoline that could not be dispatched
pub fn log_dispatch_failed(error: &CallbackError) {
    use tracing::error;
    error!(
        event = "dispatch_failed",
        error = %error,
        "Native code called an unusable trampoline"
    );
}

/// Log an internal invariant violation right before panicking
#[cold]
pub fn log_invariant_violation(what: &str, detail: &str) {
    use tracing::error;
    error!(
        event = "invariant_violation",
        what = what,
        detail = detail,
        "Internal invariant violated"
    );
}
