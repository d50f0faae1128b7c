//! # logship - Resilient Log Shipping
//!
//! logship accepts structured log records from any number of threads or tasks,
//! buffers them in a bounded queue and streams them to a remote ingestion
//! endpoint over a persistent TCP (optionally TLS) connection, reconnecting
//! automatically when the connection fails.
//!
//! ## Features
//!
//! - **Non-blocking submit**: callers never wait on the network
//! - **Bounded queue**: fixed capacity with a discard-or-fatal overflow policy
//! - **Automatic reconnection**: fixed backoff, interruptible by shutdown
//! - **Configurable error policy**: abort, log to a diagnostic stream, or ignore
//! - **Token-prefixed JSON lines**: `<token> <json>\n` per record
//!
//! ## Quick Start
//!
//! ```no_run
//! use logship::config::ShipperConfig;
//! use logship::handler::Handler;
//! use logship::types::{LogEntry, LogLevel};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ShipperConfig::new("2bfbea1e-10c3-4419-bdad-7e6435882e1f");
//!     let handler: Handler<LogEntry> = Handler::new(config)?;
//!
//!     handler.submit(LogEntry::new(LogLevel::Info, "api", "service started"))?;
//!
//!     handler.join().await?;
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod connection;
pub mod encoder;
pub mod handler;
pub mod policy;
pub mod stats;
pub mod transport;
pub mod types;

#[cfg(test)]
mod test_support;

/// Common error types used throughout logship
pub mod error {
    use thiserror::Error;

    /// Errors raised while shipping records
    ///
    /// Everything except [`ShipperError::Config`] is internal to the
    /// connection manager: it is routed through the configured
    /// [`ErrorPolicy`](crate::policy::ErrorPolicy) and never returned from
    /// [`Handler::submit`](crate::handler::Handler::submit).
    #[derive(Debug, Error)]
    pub enum ShipperError {
        /// Configuration was rejected
        #[error("Configuration error: {0}")]
        Config(String),
        /// Opening the transport failed or timed out
        #[error("Dial error: {0}")]
        Dial(#[source] std::io::Error),
        /// Writing a record to the transport failed or timed out
        #[error("Write error: {0}")]
        Write(#[source] std::io::Error),
        /// A record could not be serialized
        #[error("Encode error: {0}")]
        Encode(#[from] serde_json::Error),
        /// Closing the transport failed during teardown
        #[error("Close error: {0}")]
        Close(#[source] std::io::Error),
        /// The error policy escalated an error; the background task stopped
        #[error("Fatal error: {0}")]
        Fatal(Box<ShipperError>),
        /// The background task panicked or was cancelled
        #[error("Background task failed: {0}")]
        Task(String),
    }

    /// Required by the `tokio_util::codec::Encoder::Error` bound on
    /// [`RecordEncoder`](crate::encoder::RecordEncoder); call sites wrap io
    /// errors explicitly as Dial/Write/Close.
    impl From<std::io::Error> for ShipperError {
        fn from(e: std::io::Error) -> Self {
            ShipperError::Write(e)
        }
    }

    /// Producer-visible errors returned from
    /// [`Handler::submit`](crate::handler::Handler::submit)
    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    pub enum SubmitError {
        /// The queue is full and the handler discards on overflow.
        /// The record was dropped; nothing else changed.
        #[error("queue full")]
        QueueFull,
        /// The queue is full and the handler does not discard on overflow.
        ///
        /// This is unrecoverable for the submitting context: the record was
        /// not accepted and the configuration promised it would never be
        /// dropped silently. The caller decides how to escalate (exit,
        /// restart under a supervisor, ...).
        #[error("fatal: queue full with {capacity} records and discard disabled")]
        Fatal {
            /// Capacity of the exhausted queue
            capacity: usize,
        },
        /// The background task has terminated and no longer accepts records
        #[error("handler closed")]
        Closed,
    }

    impl SubmitError {
        /// Whether the caller must treat this error as fatal
        pub fn is_fatal(&self) -> bool {
            matches!(self, SubmitError::Fatal { .. })
        }
    }

    /// Result type alias for logship operations
    pub type Result<T> = std::result::Result<T, ShipperError>;
}

pub use error::{Result, ShipperError, SubmitError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::ShipperConfig;
    pub use crate::handler::Handler;
    pub use crate::policy::{ErrorHandling, ErrorPolicy};
    pub use crate::types::{LogEntry, LogFields, LogLevel};
    pub use crate::{Result, ShipperError, SubmitError};
}
