//! Time and Logging Abstractions
//!
//! Provides an injectable time source (used for consent timestamps) and the
//! sink through which structured logs reach the host console.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::Result;

/// Time source trait
///
/// Abstracts wall-clock time so persisted records get deterministic
/// timestamps under test.
pub trait Clock: Send + Sync {
    /// Get current UTC time
    fn now(&self) -> DateTime<Utc>;

    /// Get current Unix timestamp in milliseconds
    fn unix_timestamp_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// System clock implementation using actual system time
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Structured log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    /// Target module/component
    pub target: String,
    pub message: String,
    /// Structured fields
    pub fields: HashMap<String, String>,
    /// Name of the innermost active span, if any
    pub span: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            target: target.into(),
            message: message.into(),
            fields: HashMap::new(),
            span: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_span(mut self, span: impl Into<String>) -> Self {
        self.span = Some(span.into());
        self
    }
}

/// Logger sink trait
///
/// Forwards structured logs from the core to the host's logging pipeline
/// (browser console, desktop log file).
///
/// # Security
///
/// Implementations should ensure no consent-identifying or personal data is
/// written beyond what the host's privacy policy allows.
#[async_trait::async_trait]
pub trait LoggerSink: Send + Sync {
    /// Forward a log entry to the host logging system
    async fn log(&self, entry: LogEntry) -> Result<()>;

    /// Flush any buffered logs
    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Entries below this level are dropped before reaching the sink.
    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

/// Console logger implementation for development
#[derive(Debug, Clone)]
pub struct ConsoleLogger {
    pub min_level: LogLevel,
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
        }
    }
}

#[async_trait::async_trait]
impl LoggerSink for ConsoleLogger {
    async fn log(&self, entry: LogEntry) -> Result<()> {
        if entry.level < self.min_level {
            return Ok(());
        }

        let mut line = format!(
            "[{}] {} {}: {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            entry.level.as_directive().to_uppercase(),
            entry.target,
            entry.message
        );

        let mut fields: Vec<_> = entry.fields.iter().collect();
        fields.sort();
        for (key, value) in fields {
            line.push_str(&format!(" {}={}", key, value));
        }

        println!("{}", line);
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }
}
