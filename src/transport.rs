//! Transport dialing for the connection manager

use crate::config::ShipperConfig;
use crate::{Result, ShipperError};
use async_trait::async_trait;
use socket2::{SockRef, TcpKeepalive};
use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::net::TcpStream;
use tokio_native_tls::TlsStream;

/// Opens byte-stream connections to the ingestion endpoint
///
/// The connection manager bounds every dial with its own timeout, so
/// implementations do not need to.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    /// Stream produced by a successful dial
    type Stream: AsyncWrite + Unpin + Send + 'static;

    /// Open a new connection
    async fn dial(&self) -> io::Result<Self::Stream>;

    /// Human-readable endpoint, used in diagnostics
    fn endpoint(&self) -> String;
}

/// An open connection, plain or encrypted
pub enum Connection {
    /// Unencrypted TCP
    Plain(TcpStream),
    /// TLS over TCP
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncWrite for Connection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Connection::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Connection::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Connection::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Connection::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Connection::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Connection::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connection::Plain(_) => write!(f, "Connection::Plain"),
            Connection::Tls(_) => write!(f, "Connection::Tls"),
        }
    }
}

struct TlsSettings {
    connector: tokio_native_tls::TlsConnector,
    domain: String,
}

/// Dials TCP, optionally wrapped in TLS
pub struct TcpDialer {
    address: String,
    keepalive: Option<Duration>,
    tls: Option<TlsSettings>,
}

impl TcpDialer {
    /// Build a dialer from the handler configuration
    pub fn from_config(config: &ShipperConfig) -> Result<Self> {
        let tls = if config.use_tls {
            let connector = match &config.tls_connector {
                Some(connector) => connector.clone(),
                None => native_tls::TlsConnector::new().map_err(|e| {
                    ShipperError::Config(format!("Failed to build TLS connector: {}", e))
                })?,
            };
            Some(TlsSettings {
                connector: tokio_native_tls::TlsConnector::from(connector),
                domain: config.resolved_tls_domain(),
            })
        } else {
            None
        };

        Ok(Self {
            address: config.resolved_address(),
            keepalive: config.keepalive(),
            tls,
        })
    }

    /// Whether connections are encrypted
    pub fn uses_tls(&self) -> bool {
        self.tls.is_some()
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    type Stream = Connection;

    async fn dial(&self) -> io::Result<Connection> {
        let stream = TcpStream::connect(self.address.as_str()).await?;
        stream.set_nodelay(true)?;

        if let Some(idle) = self.keepalive {
            let keepalive = TcpKeepalive::new().with_time(idle).with_interval(idle);
            SockRef::from(&stream).set_tcp_keepalive(&keepalive)?;
        }

        match &self.tls {
            Some(tls) => {
                let stream = tls
                    .connector
                    .connect(&tls.domain, stream)
                    .await
                    .map_err(io::Error::other)?;
                Ok(Connection::Tls(Box::new(stream)))
            }
            None => Ok(Connection::Plain(stream)),
        }
    }

    fn endpoint(&self) -> String {
        self.address.clone()
    }
}

impl fmt::Debug for TcpDialer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpDialer")
            .field("address", &self.address)
            .field("keepalive", &self.keepalive)
            .field("tls_domain", &self.tls.as_ref().map(|tls| tls.domain.as_str()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_plain_dial_and_write() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let reader = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            stream.read_to_end(&mut received).await.unwrap();
            received
        });

        let config = ShipperConfig::new("t").with_tls(false).with_address(address.clone());
        let dialer = TcpDialer::from_config(&config).unwrap();
        assert!(!dialer.uses_tls());
        assert_eq!(dialer.endpoint(), address);

        let mut conn = dialer.dial().await.unwrap();
        assert!(matches!(conn, Connection::Plain(_)));
        conn.write_all(b"t {}\n").await.unwrap();
        conn.shutdown().await.unwrap();

        assert_eq!(reader.await.unwrap(), b"t {}\n");
    }

    #[tokio::test]
    async fn test_dial_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let config = ShipperConfig::new("t").with_tls(false).with_address(address);
        let dialer = TcpDialer::from_config(&config).unwrap();
        assert!(dialer.dial().await.is_err());
    }

    #[tokio::test]
    async fn test_dial_without_keepalive() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let config = ShipperConfig::new("t")
            .with_tls(false)
            .with_keepalive(None)
            .with_address(address);
        let dialer = TcpDialer::from_config(&config).unwrap();
        assert!(dialer.dial().await.is_ok());
    }

    #[tokio::test]
    async fn test_tls_handshake_failure_is_an_io_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        // accepts and hangs up without speaking TLS
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let config = ShipperConfig::new("t").with_tls(true).with_address(address);
        let dialer = TcpDialer::from_config(&config).unwrap();
        assert!(dialer.uses_tls());
        assert!(dialer.dial().await.is_err());
    }
}
