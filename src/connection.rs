//! Connection lifecycle: dial, stream, fail, back off, retry, terminate
//!
//! A single [`ConnectionManager`] runs per handler as a background task and
//! is the only owner of the transport. Its states and transitions are an
//! explicit table ([`ConnectionState::next`]); the async driver in
//! [`ConnectionManager::run`] only produces [`Event`]s.
//!
//! Delivery is at-most-once: a record that fails to encode or write is
//! dropped, the connection is closed and the manager reconnects after a
//! fixed backoff. Shutdown wins every race and never drains the queue.

use crate::config::ShipperConfig;
use crate::encoder::RecordEncoder;
use crate::policy::{ErrorPolicy, Verdict};
use crate::stats::ShipperStats;
use crate::transport::Dialer;
use crate::{Result, ShipperError};
use bytes::BytesMut;
use serde::Serialize;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{sleep, timeout};
use tokio_util::codec::Encoder;
use tracing::{debug, trace};

/// Lifecycle states of the connection manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport, loop not yet started
    Disconnected,
    /// Dialing the endpoint
    Connecting,
    /// Transport open, forwarding queued records
    Streaming,
    /// Waiting out the backoff after a failure
    RetryWait,
    /// Stopped for good
    Terminated,
}

/// Inputs driving [`ConnectionState`] transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The loop was entered
    Start,
    /// A dial succeeded
    Dialed,
    /// A dial failed or timed out
    DialFailed,
    /// A record was written
    Delivered,
    /// Encoding or writing a record failed
    WriteFailed,
    /// The backoff interval passed
    BackoffElapsed,
    /// Shutdown was signaled or every producer went away
    Shutdown,
    /// The error policy escalated a failure
    Fatal,
}

impl ConnectionState {
    /// Transition table. Shutdown and fatal errors win from every state;
    /// `Terminated` absorbs everything; events that do not apply to the
    /// current state leave it unchanged.
    pub fn next(self, event: Event) -> ConnectionState {
        use ConnectionState::*;

        match (self, event) {
            (Terminated, _) => Terminated,
            (_, Event::Shutdown) | (_, Event::Fatal) => Terminated,
            (Disconnected, Event::Start) => Connecting,
            (Connecting, Event::Dialed) => Streaming,
            (Connecting, Event::DialFailed) => RetryWait,
            (Streaming, Event::Delivered) => Streaming,
            (Streaming, Event::WriteFailed) => RetryWait,
            (RetryWait, Event::BackoffElapsed) => Connecting,
            (state, _) => state,
        }
    }

    /// Whether the manager has stopped
    pub fn is_terminal(self) -> bool {
        self == ConnectionState::Terminated
    }
}

/// Timing knobs taken from the configuration
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// Upper bound on a dial, TLS handshake included
    pub dial: Duration,
    /// Upper bound on writing and flushing one record, and on closing
    pub write: Duration,
    /// Fixed pause between a failure and the next dial
    pub retry_delay: Duration,
}

impl From<&ShipperConfig> for Timeouts {
    fn from(config: &ShipperConfig) -> Self {
        Self {
            dial: config.dial_timeout(),
            write: config.write_timeout(),
            retry_delay: config.retry_delay(),
        }
    }
}

/// Drives one handler's transport
pub struct ConnectionManager<R, D: Dialer> {
    records: mpsc::Receiver<R>,
    shutdown: broadcast::Receiver<()>,
    dialer: D,
    encoder: RecordEncoder,
    policy: ErrorPolicy,
    timeouts: Timeouts,
    stats: Arc<ShipperStats>,
    state: watch::Sender<ConnectionState>,
    connection: Option<D::Stream>,
    buffer: BytesMut,
    fatal: Option<ShipperError>,
}

impl<R, D> ConnectionManager<R, D>
where
    R: Serialize + Send + 'static,
    D: Dialer,
{
    /// Assemble a manager; nothing happens until [`run`](Self::run)
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        records: mpsc::Receiver<R>,
        shutdown: broadcast::Receiver<()>,
        dialer: D,
        encoder: RecordEncoder,
        policy: ErrorPolicy,
        timeouts: Timeouts,
        stats: Arc<ShipperStats>,
        state: watch::Sender<ConnectionState>,
    ) -> Self {
        Self {
            records,
            shutdown,
            dialer,
            encoder,
            policy,
            timeouts,
            stats,
            state,
            connection: None,
            buffer: BytesMut::with_capacity(1024),
            fatal: None,
        }
    }

    /// Run until shutdown or until the error policy aborts.
    ///
    /// Returns [`ShipperError::Fatal`] carrying the escalated error in the
    /// latter case.
    pub async fn run(mut self) -> Result<()> {
        debug!(endpoint = %self.dialer.endpoint(), "connection manager started");

        let mut current = ConnectionState::Disconnected;
        while !current.is_terminal() {
            let event = match current {
                ConnectionState::Disconnected => Event::Start,
                ConnectionState::Connecting => self.connect().await,
                ConnectionState::Streaming => self.stream_next().await,
                ConnectionState::RetryWait => self.wait_retry().await,
                ConnectionState::Terminated => break,
            };

            let next = current.next(event);
            if next != current {
                trace!(from = ?current, to = ?next, ?event, "connection state change");
                self.state.send_replace(next);
            }
            current = next;
        }

        self.close().await;
        debug!("connection manager terminated");

        match self.fatal.take() {
            Some(err) => Err(ShipperError::Fatal(Box::new(err))),
            None => Ok(()),
        }
    }

    fn shutdown_signaled(&mut self) -> bool {
        !matches!(
            self.shutdown.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        )
    }

    /// Route an error through the policy; `otherwise` is the event to
    /// report when the policy lets processing continue
    fn route(&mut self, err: ShipperError, otherwise: Event) -> Event {
        match self.policy.handle(&err) {
            Verdict::Continue => otherwise,
            Verdict::Abort => {
                self.fatal = Some(err);
                Event::Fatal
            }
        }
    }

    async fn connect(&mut self) -> Event {
        if self.shutdown_signaled() {
            return Event::Shutdown;
        }

        self.stats.record_dial_attempt();
        let dialed = tokio::select! {
            biased;
            _ = self.shutdown.recv() => None,
            result = timeout(self.timeouts.dial, self.dialer.dial()) => Some(result),
        };

        match dialed {
            None => Event::Shutdown,
            Some(Ok(Ok(stream))) => {
                debug!(endpoint = %self.dialer.endpoint(), "connected");
                self.connection = Some(stream);
                Event::Dialed
            }
            Some(Ok(Err(e))) => {
                self.stats.record_dial_failure();
                debug!(error = %e, "dial failed");
                self.route(ShipperError::Dial(e), Event::DialFailed)
            }
            Some(Err(_)) => {
                self.stats.record_dial_failure();
                debug!("dial timed out");
                let err = io::Error::new(io::ErrorKind::TimedOut, "dial timed out");
                self.route(ShipperError::Dial(err), Event::DialFailed)
            }
        }
    }

    async fn stream_next(&mut self) -> Event {
        let next = tokio::select! {
            biased;
            _ = self.shutdown.recv() => None,
            record = self.records.recv() => record,
        };

        // `None` from the queue means every producer is gone
        let Some(record) = next else {
            return Event::Shutdown;
        };

        // encode synchronously so the record is never held across an await
        let delivered = match self.encode(record) {
            Ok(()) => self.write_frame().await,
            Err(err) => Err(err),
        };

        match delivered {
            Ok(()) => {
                self.stats.record_delivered();
                Event::Delivered
            }
            Err(err) => {
                self.stats.record_dropped();
                debug!(error = %err, "record dropped, reconnecting");
                // dropping the stream closes it
                self.connection = None;
                self.route(err, Event::WriteFailed)
            }
        }
    }

    fn encode(&mut self, record: R) -> Result<()> {
        self.buffer.clear();
        self.encoder.encode(&record, &mut self.buffer)
    }

    async fn write_frame(&mut self) -> Result<()> {
        let frame = &self.buffer;
        let conn = self.connection.as_mut().ok_or_else(|| {
            ShipperError::Write(io::Error::new(
                io::ErrorKind::NotConnected,
                "no active connection",
            ))
        })?;

        let write = async {
            conn.write_all(frame).await?;
            conn.flush().await
        };

        match timeout(self.timeouts.write, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ShipperError::Write(e)),
            Err(_) => Err(ShipperError::Write(io::Error::new(
                io::ErrorKind::TimedOut,
                "write timed out",
            ))),
        }
    }

    async fn wait_retry(&mut self) -> Event {
        tokio::select! {
            biased;
            _ = self.shutdown.recv() => Event::Shutdown,
            _ = sleep(self.timeouts.retry_delay) => Event::BackoffElapsed,
        }
    }

    /// Close the transport if one is open. Close errors go through the
    /// policy but never delay termination past the write timeout.
    async fn close(&mut self) {
        let Some(mut conn) = self.connection.take() else {
            return;
        };

        let err = match timeout(self.timeouts.write, conn.shutdown()).await {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e,
            Err(_) => io::Error::new(io::ErrorKind::TimedOut, "close timed out"),
        };

        let err = ShipperError::Close(err);
        if self.policy.handle(&err) == Verdict::Abort && self.fatal.is_none() {
            self.fatal = Some(err);
        }
    }
}
