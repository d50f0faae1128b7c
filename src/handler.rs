//! Caller-facing handler: bounded ingestion queue plus the lifetime of the
//! background connection manager

use crate::config::ShipperConfig;
use crate::connection::{ConnectionManager, ConnectionState, Timeouts};
use crate::encoder::RecordEncoder;
use crate::policy::ErrorPolicy;
use crate::stats::{ShipperStats, StatsSnapshot};
use crate::transport::{Dialer, TcpDialer};
use crate::{Result, ShipperError, SubmitError};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

/// Ships records of type `R` to a remote ingestion endpoint
///
/// `submit` never blocks and may be called from any number of threads or
/// tasks. One background task per handler owns the connection.
pub struct Handler<R> {
    sender: mpsc::Sender<R>,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_requested: AtomicBool,
    discard_on_full: bool,
    capacity: usize,
    stats: Arc<ShipperStats>,
    state: watch::Receiver<ConnectionState>,
    task: Option<JoinHandle<Result<()>>>,
}

impl<R> Handler<R>
where
    R: Serialize + Send + 'static,
{
    /// Create a handler dialing the configured TCP/TLS endpoint.
    ///
    /// Must be called from within a tokio runtime; the connection manager
    /// starts connecting immediately.
    pub fn new(config: ShipperConfig) -> Result<Self> {
        config.validate()?;
        let dialer = TcpDialer::from_config(&config)?;
        Self::with_dialer(config, dialer)
    }

    /// Create a handler using a custom dialer
    pub fn with_dialer<D: Dialer>(config: ShipperConfig, dialer: D) -> Result<Self> {
        let policy = ErrorPolicy::new(config.error_handling);
        Self::with_parts(config, dialer, policy)
    }

    /// Create a handler using a custom dialer and error policy
    pub fn with_parts<D: Dialer>(
        config: ShipperConfig,
        dialer: D,
        policy: ErrorPolicy,
    ) -> Result<Self> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            ShipperError::Config("Handler must be created inside a tokio runtime".to_string())
        })?;

        let capacity = config.effective_capacity();
        let (sender, receiver) = mpsc::channel(capacity);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let (state_tx, state) = watch::channel(ConnectionState::Disconnected);
        let stats = Arc::new(ShipperStats::default());

        let manager = ConnectionManager::new(
            receiver,
            shutdown_rx,
            dialer,
            RecordEncoder::new(&config.token),
            policy,
            Timeouts::from(&config),
            Arc::clone(&stats),
            state_tx,
        );
        let task = runtime.spawn(manager.run());

        debug!(
            capacity,
            discard_on_full = config.discard_on_full,
            error_handling = %config.error_handling,
            "handler started"
        );

        Ok(Self {
            sender,
            shutdown_tx,
            shutdown_requested: AtomicBool::new(false),
            discard_on_full: config.discard_on_full,
            capacity,
            stats,
            state,
            task: Some(task),
        })
    }

    /// Enqueue a record without blocking.
    ///
    /// Records are delivered in submission order. When the queue is full
    /// the record is refused with [`SubmitError::QueueFull`] if the handler
    /// discards on overflow, or with [`SubmitError::Fatal`] otherwise.
    /// After shutdown every record is refused with [`SubmitError::Closed`].
    pub fn submit(&self, record: R) -> std::result::Result<(), SubmitError> {
        if self.shutdown_requested.load(Ordering::Acquire) {
            return Err(SubmitError::Closed);
        }

        match self.sender.try_send(record) {
            Ok(()) => {
                self.stats.record_submitted();
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.stats.record_rejected();
                if self.discard_on_full {
                    Err(SubmitError::QueueFull)
                } else {
                    Err(SubmitError::Fatal {
                        capacity: self.capacity,
                    })
                }
            }
            Err(TrySendError::Closed(_)) => Err(SubmitError::Closed),
        }
    }
}

impl<R> Handler<R> {
    /// Signal the background task to stop. Idempotent and non-blocking;
    /// records still queued are not delivered.
    pub fn shutdown(&self) {
        if self.shutdown_requested.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(queued = self.len(), "handler shutdown requested");
        let _ = self.shutdown_tx.send(());
    }

    /// Signal shutdown and wait for the background task to finish.
    ///
    /// Returns the escalated error if the error policy aborted the task.
    pub async fn join(mut self) -> Result<()> {
        self.shutdown();
        match self.task.take() {
            Some(task) => task
                .await
                .map_err(|e| ShipperError::Task(e.to_string()))?,
            None => Ok(()),
        }
    }

    /// Whether the background task has stopped accepting records
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Current state of the connection manager
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Delivery counters
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Fixed queue capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records currently waiting in the queue
    pub fn len(&self) -> usize {
        self.capacity - self.sender.capacity()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R> Drop for Handler<R> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<R> std::fmt::Debug for Handler<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("capacity", &self.capacity)
            .field("discard_on_full", &self.discard_on_full)
            .field("state", &self.state())
            .field("shutdown_requested", &self.shutdown_requested.load(Ordering::Relaxed))
            .finish()
    }
}
