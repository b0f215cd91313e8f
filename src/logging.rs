//! Structured diagnostics for a test run
//!
//! Every logger created by one [`LoggerFactory`] tags its entries with the
//! same session id. Entries are one readable line per event by default and
//! one JSON object per event under `--debug`. Everything goes to stderr so
//! the results table on stdout stays clean.

use crate::error::AppError;
use crate::models::{AppConfig, TestResult};
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, Write};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Per-stage progress of each proxy
    Debug,
    Info,
    /// Something was skipped but the run continues
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    fn colored_label(&self) -> String {
        let label = format!("{:>5}", self.as_str());
        match self {
            LogLevel::Debug => label.cyan().to_string(),
            LogLevel::Info => label.green().to_string(),
            LogLevel::Warn => label.yellow().to_string(),
            LogLevel::Error => label.red().bold().to_string(),
        }
    }
}

/// One event as written by a [`Logger`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    /// Component that wrote the entry, e.g. `REGISTRY`
    pub logger: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Console,
    Json,
}

/// Leveled logger for one component
#[derive(Debug, Clone)]
pub struct Logger {
    name: String,
    min_level: LogLevel,
    format: LogFormat,
    use_color: bool,
    session_id: Option<String>,
}

impl Logger {
    pub fn new(name: String) -> Self {
        Self {
            name,
            min_level: LogLevel::Info,
            format: LogFormat::Console,
            use_color: false,
            session_id: None,
        }
    }

    /// Warnings only by default, `--verbose` adds info, `--debug` switches to
    /// JSON with per-stage detail
    pub fn with_config(name: String, config: &AppConfig) -> Self {
        let min_level = if config.debug {
            LogLevel::Debug
        } else if config.verbose {
            LogLevel::Info
        } else {
            LogLevel::Warn
        };

        Self {
            name,
            min_level,
            format: if config.debug { LogFormat::Json } else { LogFormat::Console },
            use_color: config.enable_color,
            session_id: None,
        }
    }

    /// Errors only, for library callers that did not configure logging
    pub fn quiet(name: String) -> Self {
        Self {
            min_level: LogLevel::Error,
            ..Self::new(name)
        }
    }

    pub fn with_session_id(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn debug(&self, message: &str) -> LogEntryBuilder<'_> {
        self.entry(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> LogEntryBuilder<'_> {
        self.entry(LogLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> LogEntryBuilder<'_> {
        self.entry(LogLevel::Warn, message)
    }

    pub fn error(&self, message: &str) -> LogEntryBuilder<'_> {
        self.entry(LogLevel::Error, message)
    }

    fn entry(&self, level: LogLevel, message: &str) -> LogEntryBuilder<'_> {
        LogEntryBuilder {
            logger: self,
            entry: LogEntry {
                timestamp: Utc::now(),
                level,
                logger: self.name.clone(),
                message: message.to_string(),
                session_id: self.session_id.clone(),
                fields: BTreeMap::new(),
            },
        }
    }

    fn write(&self, entry: &LogEntry) {
        if entry.level < self.min_level {
            return;
        }
        let _ = writeln!(io::stderr(), "{}", self.render(entry));
    }

    fn render(&self, entry: &LogEntry) -> String {
        match self.format {
            LogFormat::Console => self.render_console(entry),
            LogFormat::Json => serde_json::to_string(entry).unwrap_or_else(|_| entry.message.clone()),
        }
    }

    fn render_console(&self, entry: &LogEntry) -> String {
        let level = if self.use_color {
            entry.level.colored_label()
        } else {
            format!("{:>5}", entry.level.as_str())
        };

        let mut line = format!(
            "{} {} [{}] {}",
            entry.timestamp.format("%H:%M:%S%.3f"),
            level,
            entry.logger,
            entry.message
        );

        if !entry.fields.is_empty() {
            let fields: Vec<String> = entry.fields.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            line.push_str(&format!(" {{{}}}", fields.join(", ")));
        }

        line
    }
}

/// Collects fields for one entry; nothing is written until [`log`](Self::log)
pub struct LogEntryBuilder<'a> {
    logger: &'a Logger,
    entry: LogEntry,
}

impl<'a> LogEntryBuilder<'a> {
    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.entry.fields.insert(key.to_string(), json_value);
        }
        self
    }

    /// The measured values of a proxy test
    pub fn result(self, result: &TestResult) -> Self {
        self.field("proxy", &result.proxy_name)
            .field("proxy_type", &result.proxy_type)
            .field("latency_ms", result.latency.map(|d| d.as_secs_f64() * 1000.0))
            .field("jitter_ms", result.jitter.as_secs_f64() * 1000.0)
            .field("packet_loss", result.packet_loss)
            .field("download_bps", result.download_speed)
            .field("upload_bps", result.upload_speed)
    }

    pub fn error_info(self, error: &AppError) -> Self {
        self.field("error_category", error.category())
            .field("error_recoverable", error.is_recoverable())
    }

    pub fn log(self) {
        self.logger.write(&self.entry);
    }
}

/// Creates loggers that share one session id
pub struct LoggerFactory {
    config: AppConfig,
    session_id: String,
}

impl LoggerFactory {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            session_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn create_logger(&self, name: &str) -> Logger {
        Logger::with_config(name.to_string(), &self.config).with_session_id(&self.session_id)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $logger.debug(&format!($($arg)*)).log()
    };
}

#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)*) => {
        $logger.info(&format!($($arg)*)).log()
    };
}

#[macro_export]
macro_rules! log_warn {
    ($logger:expr, $($arg:tt)*) => {
        $logger.warn(&format!($($arg)*)).log()
    };
}

#[macro_export]
macro_rules! log_error {
    ($logger:expr, $($arg:tt)*) => {
        $logger.error(&format!($($arg)*)).log()
    };
}
