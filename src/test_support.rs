//! Scripted dialers and in-memory streams shared by the unit tests.

use crate::transport::Dialer;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::io::AsyncWrite;

/// How a [`MemoryStream`] misbehaves.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
enum Fault {
    #[default]
    None,
    FailWrites,
    StallWrites,
    FailShutdown,
}

/// Stream that keeps every byte written to it, unless told to fail.
#[derive(Clone, Default)]
pub struct MemoryStream {
    written: Arc<Mutex<Vec<u8>>>,
    fault: Fault,
}

impl MemoryStream {
    fn with_fault(fault: Fault) -> Self {
        Self {
            fault,
            ..Default::default()
        }
    }

    /// Every write fails with a broken pipe.
    pub fn failing() -> Self {
        Self::with_fault(Fault::FailWrites)
    }

    /// Every write stays pending forever.
    pub fn stalled() -> Self {
        Self::with_fault(Fault::StallWrites)
    }

    /// Writes succeed, closing fails.
    pub fn failing_shutdown() -> Self {
        Self::with_fault(Fault::FailShutdown)
    }

    pub fn contents(&self) -> Vec<u8> {
        self.written.lock().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        String::from_utf8(self.contents())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl AsyncWrite for MemoryStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.fault {
            Fault::FailWrites => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "peer went away",
            ))),
            Fault::StallWrites => Poll::Pending,
            _ => {
                self.written.lock().extend_from_slice(buf);
                Poll::Ready(Ok(buf.len()))
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if self.fault == Fault::FailShutdown {
            return Poll::Ready(Err(io::Error::other("close boom")));
        }
        Poll::Ready(Ok(()))
    }
}

/// What the next dial attempt does.
#[derive(Clone)]
pub enum DialStep {
    Refuse,
    Hang,
    Connect(MemoryStream),
}

/// Dialer replaying a script of outcomes; once the script runs out every
/// attempt connects to `fallback`.
#[derive(Clone)]
pub struct ScriptedDialer {
    script: Arc<Mutex<VecDeque<DialStep>>>,
    attempts: Arc<Mutex<Vec<Instant>>>,
    fallback: MemoryStream,
}

impl ScriptedDialer {
    pub fn new(steps: impl IntoIterator<Item = DialStep>, fallback: MemoryStream) -> Self {
        Self {
            script: Arc::new(Mutex::new(steps.into_iter().collect())),
            attempts: Arc::new(Mutex::new(Vec::new())),
            fallback,
        }
    }

    /// Refuse the first `failures` dials, then connect to `stream`.
    pub fn failing_first(failures: usize, stream: MemoryStream) -> Self {
        Self::new(std::iter::repeat(DialStep::Refuse).take(failures), stream)
    }

    pub fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().clone()
    }
}

#[async_trait]
impl Dialer for ScriptedDialer {
    type Stream = MemoryStream;

    async fn dial(&self) -> io::Result<MemoryStream> {
        self.attempts.lock().push(Instant::now());
        let step = self.script.lock().pop_front();
        match step {
            Some(DialStep::Refuse) => Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            )),
            Some(DialStep::Hang) => std::future::pending().await,
            Some(DialStep::Connect(stream)) => Ok(stream),
            None => Ok(self.fallback.clone()),
        }
    }

    fn endpoint(&self) -> String {
        "scripted".to_string()
    }
}
