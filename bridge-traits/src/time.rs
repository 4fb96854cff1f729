//! Clock and Host Log Sink

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;

/// Injectable time source
///
/// Sync records stamp `created_at`/`updated_at` from this clock, so tests can
/// pin or step it.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn unix_timestamp(&self) -> i64 {
        self.now().timestamp()
    }

    fn unix_timestamp_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Severity, ordered from most to least verbose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

/// One event as handed to the host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    /// Emitting module, e.g. `core_sync::coordinator`
    pub target: String,
    pub message: String,
    pub fields: HashMap<String, String>,
    /// Name of the innermost active span
    pub span_id: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            target: target.into(),
            message: message.into(),
            fields: HashMap::new(),
            span_id: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_span_id(mut self, span_id: impl Into<String>) -> Self {
        self.span_id = Some(span_id.into());
        self
    }

    /// `LEVEL target: message key=value ...` with fields in key order
    pub fn to_line(&self) -> String {
        let mut keys: Vec<&String> = self.fields.keys().collect();
        keys.sort();

        let mut line = format!("{} {}: {}", self.level.as_str(), self.target, self.message);
        for key in keys {
            line.push(' ');
            line.push_str(key);
            line.push('=');
            line.push_str(&self.fields[key]);
        }
        line
    }
}

/// Host logging pipeline (Logcat on Android, a console or file on desktop)
///
/// Field values that carry session cookies are redacted before they reach
/// the sink when redaction is enabled in the logging config.
#[async_trait::async_trait]
pub trait LoggerSink: Send + Sync {
    async fn log(&self, entry: LogEntry) -> Result<()>;

    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Entries below this level are dropped before `log` is called
    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

/// Writes one line per entry to stderr
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
        if entry.level >= self.min_level {
            eprintln!(
                "{} {}",
                entry.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                entry.to_line()
            );
        }
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_agree_with_seconds() {
        let clock = SystemClock;
        let millis = clock.unix_timestamp_millis();
        let seconds = clock.unix_timestamp();

        assert!((millis / 1000 - seconds).abs() <= 1);
    }

    #[test]
    fn test_levels_are_ordered() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Warn < LogLevel::Error);
    }

    #[test]
    fn test_entry_line_sorts_fields() {
        let entry = LogEntry::new(LogLevel::Warn, "core_sync", "Upload failed")
            .with_field("record_id", "12")
            .with_field("attempt", "3")
            .with_span_id("upload_pending");

        assert_eq!(
            entry.to_line(),
            "WARN core_sync: Upload failed attempt=3 record_id=12"
        );
        assert_eq!(entry.span_id.as_deref(), Some("upload_pending"));
    }

    #[test]
    fn test_level_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&LogLevel::Info).unwrap(), "\"info\"");
    }

    #[tokio::test]
    async fn test_console_logger_accepts_entries() {
        let logger = ConsoleLogger {
            min_level: LogLevel::Debug,
        };
        assert_eq!(logger.min_level(), LogLevel::Debug);
        logger
            .log(LogEntry::new(LogLevel::Info, "test", "hello"))
            .await
            .unwrap();
    }
}
