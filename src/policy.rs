//! Error policy applied to connection-level failures
//!
//! The policy only decides how a failure is surfaced. Retry timing and
//! reconnection belong to the [connection manager](crate::connection).

use crate::ShipperError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;

/// How errors connecting to and delivering logs are handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorHandling {
    /// Escalate: the background task stops and reports the error as fatal
    Abort,
    /// Write the error to the diagnostic stream and keep going
    #[default]
    Log,
    /// Drop the error silently. Logs may go undelivered without notice.
    Ignore,
}

impl fmt::Display for ErrorHandling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorHandling::Abort => write!(f, "abort"),
            ErrorHandling::Log => write!(f, "log"),
            ErrorHandling::Ignore => write!(f, "ignore"),
        }
    }
}

impl FromStr for ErrorHandling {
    type Err = ShipperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "abort" | "panic" => Ok(ErrorHandling::Abort),
            "log" => Ok(ErrorHandling::Log),
            "ignore" => Ok(ErrorHandling::Ignore),
            other => Err(ShipperError::Config(format!(
                "Unknown error handling mode '{}', expected abort, log or ignore",
                other
            ))),
        }
    }
}

/// Outcome of routing an error through the policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Carry on; the connection manager decides what happens next
    Continue,
    /// Stop the background task and report the error as fatal
    Abort,
}

/// Destination for diagnostics emitted in [`ErrorHandling::Log`] mode
///
/// Diagnostics must not be routed back into the shipping handler itself,
/// otherwise a broken connection would feed its own queue.
pub trait DiagnosticSink: Send + Sync {
    /// Emit one diagnostic line
    fn emit(&self, message: &str);
}

/// Writes diagnostics to standard error
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn emit(&self, message: &str) {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "logship: {}", message);
    }
}

/// Keeps diagnostics in memory, for embedding applications and tests
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Number of diagnostics emitted so far
    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    /// Whether nothing has been emitted
    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&self, message: &str) {
        self.lines.lock().push(message.to_string());
    }
}

/// Maps a configured [`ErrorHandling`] mode and an error to its effect
#[derive(Clone)]
pub struct ErrorPolicy {
    mode: ErrorHandling,
    sink: Arc<dyn DiagnosticSink>,
}

impl ErrorPolicy {
    /// Policy writing diagnostics to standard error
    pub fn new(mode: ErrorHandling) -> Self {
        Self::with_sink(mode, Arc::new(StderrSink))
    }

    /// Policy writing diagnostics to a custom sink
    pub fn with_sink(mode: ErrorHandling, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { mode, sink }
    }

    /// Configured mode
    pub fn mode(&self) -> ErrorHandling {
        self.mode
    }

    /// Apply the policy to an error
    pub fn handle(&self, err: &ShipperError) -> Verdict {
        match self.mode {
            ErrorHandling::Abort => Verdict::Abort,
            ErrorHandling::Log => {
                self.sink.emit(&err.to_string());
                Verdict::Continue
            }
            ErrorHandling::Ignore => Verdict::Continue,
        }
    }
}

impl fmt::Debug for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorPolicy").field("mode", &self.mode).finish()
    }
}
