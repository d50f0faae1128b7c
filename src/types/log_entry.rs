//! Log entry types and utilities
//!
//! The shipping pipeline is generic over any `Serialize` record; `LogEntry`
//! is the ready-made record most applications ship.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Type alias for structured log fields
pub type LogFields = BTreeMap<String, serde_json::Value>;

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Diagnostic detail
    Debug,
    /// Informational messages
    Info,
    /// Something unexpected but recoverable
    Warn,
    /// Error conditions
    Error,
    /// The application cannot continue
    Fatal,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
            LogLevel::Fatal => write!(f, "fatal"),
        }
    }
}

/// A structured log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unique identifier for this log entry
    pub id: Uuid,

    /// Timestamp when the entry was created
    pub timestamp: DateTime<Utc>,

    /// Log severity level
    pub level: LogLevel,

    /// Name of the service or component that produced the entry
    pub source: String,

    /// Primary log message
    pub message: String,

    /// Additional structured fields
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: LogFields,

    /// Process ID that generated the entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,

    /// Hostname where the entry was generated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

impl LogEntry {
    /// Create a new log entry with required fields
    pub fn new(level: LogLevel, source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            level,
            source: source.into(),
            message: message.into(),
            fields: BTreeMap::new(),
            pid: None,
            hostname: None,
        }
    }

    /// Attach a structured field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Stamp the entry with the current process ID and hostname
    pub fn with_process_metadata(mut self) -> Self {
        self.pid = Some(std::process::id());
        self.hostname = Some(gethostname::gethostname().to_string_lossy().to_string());
        self
    }
}
