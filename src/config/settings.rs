//! Configuration structures for logship

use crate::policy::ErrorHandling;
use crate::{Result, ShipperError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Queue capacity used when none (or zero) is configured
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
/// Time allowed for a dial, including the TLS handshake
pub const DEFAULT_DIAL_TIMEOUT_MS: u64 = 10_000;
/// Time allowed for writing one record
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 10_000;
/// Pause between reconnection attempts. Keep it small.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;
/// TCP keep-alive idle time
pub const DEFAULT_KEEPALIVE_MS: u64 = 30_000;

/// Ingestion endpoint used when no address is configured
pub fn default_address(use_tls: bool) -> &'static str {
    if use_tls {
        "data.logentries.com:443"
    } else {
        "data.logentries.com:80"
    }
}

/// Handler configuration, immutable once the handler is built
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShipperConfig {
    /// Account token prefixed to every record
    pub token: String,
    /// Encrypt the transport with TLS
    pub use_tls: bool,
    /// `host:port` override; derived from `use_tls` when unset
    pub address: Option<String>,
    /// Name verified during the TLS handshake; the address host when unset
    pub tls_domain: Option<String>,
    /// Pre-built TLS connector passed through to the transport
    #[serde(skip)]
    pub tls_connector: Option<native_tls::TlsConnector>,
    /// Bounded queue length; zero selects [`DEFAULT_QUEUE_CAPACITY`]
    pub queue_capacity: usize,
    /// Reject records with a recoverable error when the queue is full
    /// instead of reporting a fatal condition
    pub discard_on_full: bool,
    /// How connection-level failures are surfaced
    pub error_handling: ErrorHandling,
    /// Dial timeout in milliseconds
    pub dial_timeout_ms: u64,
    /// Per-record write timeout in milliseconds
    pub write_timeout_ms: u64,
    /// Fixed backoff between reconnection attempts in milliseconds
    pub retry_delay_ms: u64,
    /// TCP keep-alive idle time in milliseconds; `None` disables keep-alive
    pub keepalive_ms: Option<u64>,
}

impl Default for ShipperConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            use_tls: true,
            address: None,
            tls_domain: None,
            tls_connector: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            discard_on_full: true,
            error_handling: ErrorHandling::default(),
            dial_timeout_ms: DEFAULT_DIAL_TIMEOUT_MS,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            keepalive_ms: Some(DEFAULT_KEEPALIVE_MS),
        }
    }
}

impl fmt::Debug for ShipperConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShipperConfig")
            .field("token", &"<redacted>")
            .field("use_tls", &self.use_tls)
            .field("address", &self.resolved_address())
            .field("tls_domain", &self.tls_domain)
            .field("tls_connector", &self.tls_connector.is_some())
            .field("queue_capacity", &self.queue_capacity)
            .field("discard_on_full", &self.discard_on_full)
            .field("error_handling", &self.error_handling)
            .field("dial_timeout_ms", &self.dial_timeout_ms)
            .field("write_timeout_ms", &self.write_timeout_ms)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("keepalive_ms", &self.keepalive_ms)
            .finish()
    }
}

impl ShipperConfig {
    /// Configuration for the given token with defaults everywhere else
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Default::default()
        }
    }

    /// Load configuration from a file (TOML, JSON or YAML by extension),
    /// with `LOGSHIP_*` environment variables taking precedence
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path.as_ref()))
            .add_source(::config::Environment::with_prefix("LOGSHIP").try_parsing(true))
            .build()
            .map_err(|e| ShipperError::Config(format!("Failed to read config file: {}", e)))?;

        let config: ShipperConfig = settings
            .try_deserialize()
            .map_err(|e| ShipperError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Render the serializable part of the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ShipperError::Config(format!("Failed to render config: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.token.is_empty() {
            return Err(ShipperError::Config("Token cannot be empty".to_string()));
        }
        if self.token.chars().any(char::is_whitespace) {
            return Err(ShipperError::Config(
                "Token cannot contain whitespace".to_string(),
            ));
        }
        if let Some(address) = &self.address {
            match address.rsplit_once(':') {
                Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {}
                _ => {
                    return Err(ShipperError::Config(format!(
                        "Address '{}' must be host:port",
                        address
                    )))
                }
            }
        }
        if self.dial_timeout_ms == 0 || self.write_timeout_ms == 0 {
            return Err(ShipperError::Config(
                "Dial and write timeouts must be positive".to_string(),
            ));
        }
        if self.retry_delay_ms == 0 {
            return Err(ShipperError::Config(
                "Retry delay must be positive".to_string(),
            ));
        }
        if self.keepalive_ms == Some(0) {
            return Err(ShipperError::Config(
                "Keep-alive interval must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Address to dial
    pub fn resolved_address(&self) -> String {
        self.address
            .clone()
            .unwrap_or_else(|| default_address(self.use_tls).to_string())
    }

    /// Domain verified during the TLS handshake
    pub fn resolved_tls_domain(&self) -> String {
        if let Some(domain) = &self.tls_domain {
            return domain.clone();
        }
        let address = self.resolved_address();
        match address.rsplit_once(':') {
            Some((host, _)) => host.trim_start_matches('[').trim_end_matches(']').to_string(),
            None => address,
        }
    }

    /// Queue capacity with the default applied
    pub fn effective_capacity(&self) -> usize {
        if self.queue_capacity == 0 {
            DEFAULT_QUEUE_CAPACITY
        } else {
            self.queue_capacity
        }
    }

    /// Dial timeout
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }

    /// Write timeout
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Backoff between reconnection attempts
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// TCP keep-alive idle time
    pub fn keepalive(&self) -> Option<Duration> {
        self.keepalive_ms.map(Duration::from_millis)
    }

    /// Override the endpoint address
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Enable or disable TLS
    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    /// Supply the TLS connector used for the handshake
    pub fn with_tls_connector(mut self, connector: native_tls::TlsConnector) -> Self {
        self.tls_connector = Some(connector);
        self
    }

    /// Set the queue capacity
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Choose between discarding and fatal overflow
    pub fn with_discard_on_full(mut self, discard: bool) -> Self {
        self.discard_on_full = discard;
        self
    }

    /// Set the error handling mode
    pub fn with_error_handling(mut self, mode: ErrorHandling) -> Self {
        self.error_handling = mode;
        self
    }

    /// Set the dial timeout
    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the write timeout
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the reconnection backoff
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Set or disable TCP keep-alive
    pub fn with_keepalive(mut self, keepalive: Option<Duration>) -> Self {
        self.keepalive_ms = keepalive.map(|d| d.as_millis() as u64);
        self
    }
}
