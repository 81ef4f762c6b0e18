//! Operator-facing narration for a sign-in run.
//!
//! Every stage reports progress through a [`FlowLogger`]. Records carry a
//! category (`credentials`, `2fa`, `handoff`, `flow`) and go either to the
//! default console printer or to an external callback, which is how tests
//! observe what an operator would have seen. Low-level diagnostics that are
//! not meant for the operator use the `log` macros instead.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CATEGORY_CREDENTIALS: &str = "credentials";
pub const CATEGORY_TWO_FACTOR: &str = "2fa";
pub const CATEGORY_HANDOFF: &str = "handoff";
pub const CATEGORY_FLOW: &str = "flow";

/// Convenience alias for external logging callbacks.
pub type LogCallback = Arc<dyn Fn(&FlowLogRecord) + Send + Sync + 'static>;

/// How much narration reaches the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Detailed,
}

impl Verbosity {
    /// Map a repeated `-v` flag count onto a verbosity.
    pub fn from_occurrences(count: u8) -> Self {
        match count {
            0 => Verbosity::Normal,
            _ => Verbosity::Detailed,
        }
    }

    /// Errors always get through; the rest depends on the verbosity.
    pub fn admits(self, level: LogLevel) -> bool {
        match (self, level) {
            (_, LogLevel::Error) | (Verbosity::Detailed, _) => true,
            (Verbosity::Normal, LogLevel::Info) => true,
            (Verbosity::Normal, LogLevel::Debug) | (Verbosity::Quiet, _) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Info,
    Debug,
}

impl LogLevel {
    pub fn label(self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }
}

/// Structured log entry shared with external callbacks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlowLogRecord {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub level: LogLevel,
    pub category: String,
}

impl FlowLogRecord {
    pub fn new(message: impl Into<String>, level: LogLevel, category: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
            level,
            category: category.to_string(),
        }
    }
}

/// Default console printer used when no external logger is configured.
///
/// Everything goes to stdout, errors included: only fatal conditions are
/// written to stderr, and those are reported by the binary itself.
pub fn default_log_handler(record: &FlowLogRecord) {
    let timestamp = record
        .timestamp
        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    println!(
        "[{}] {:<5} [{}] {}",
        timestamp,
        record.level.label(),
        record.category,
        record.message
    );
}

pub struct FlowLogger {
    verbosity: Verbosity,
    external_logger: Option<LogCallback>,
}

impl fmt::Debug for FlowLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowLogger")
            .field("verbosity", &self.verbosity)
            .field("external_logger", &self.external_logger.is_some())
            .finish()
    }
}

impl FlowLogger {
    pub fn new(verbosity: Verbosity) -> Self {
        FlowLogger {
            verbosity,
            external_logger: None,
        }
    }

    /// Route records to `logger` instead of stdout; `None` restores stdout.
    pub fn set_external_logger(&mut self, logger: Option<LogCallback>) {
        self.external_logger = logger;
    }

    pub fn log(&self, message: impl Into<String>, level: LogLevel, category: &str) {
        if !self.verbosity.admits(level) {
            return;
        }
        let record = FlowLogRecord::new(message, level, category);
        match &self.external_logger {
            Some(callback) => callback(&record),
            None => default_log_handler(&record),
        }
    }

    pub fn error(&self, message: impl Into<String>, category: &str) {
        self.log(message, LogLevel::Error, category);
    }

    pub fn info(&self, message: impl Into<String>, category: &str) {
        self.log(message, LogLevel::Info, category);
    }

    pub fn debug(&self, message: impl Into<String>, category: &str) {
        self.log(message, LogLevel::Debug, category);
    }
}
