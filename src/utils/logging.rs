//! Logging Module
//!
//! Structured logging setup using the `tracing` crate.

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::utils::error::{MusaError, Result};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: LogLevel,
    /// Whether to include target (module path)
    pub include_target: bool,
    /// Whether to include thread IDs
    pub include_thread_ids: bool,
    /// Whether to use ANSI colors
    pub ansi_colors: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            include_target: false,
            include_thread_ids: false,
            ansi_colors: true,
        }
    }
}

impl LogConfig {
    /// Verbose logging for debugging, including per-stage timings
    pub fn verbose() -> Self {
        Self {
            level: LogLevel::Debug,
            include_target: true,
            include_thread_ids: true,
            ansi_colors: true,
        }
    }

    /// Production logging: info level, no colors
    pub fn production() -> Self {
        Self {
            level: LogLevel::Info,
            include_target: false,
            include_thread_ids: true,
            ansi_colors: false,
        }
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }
}

/// Log level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Convert to tracing Level
    pub fn to_tracing_level(&self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }

    /// Parse a level name, falling back to `Info` for anything unrecognised
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Install a global compact `fmt` subscriber.
///
/// Fails if a global subscriber has already been set.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.level.to_tracing_level())
        .with_ansi(config.ansi_colors)
        .with_target(config.include_target)
        .with_thread_ids(config.include_thread_ids)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| MusaError::Config(format!("Failed to initialize logging: {}", e)))
}
