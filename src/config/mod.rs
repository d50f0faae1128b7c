//! Configuration management for logship

pub mod settings;

pub use settings::{
    default_address, ShipperConfig, DEFAULT_DIAL_TIMEOUT_MS, DEFAULT_KEEPALIVE_MS,
    DEFAULT_QUEUE_CAPACITY, DEFAULT_RETRY_DELAY_MS, DEFAULT_WRITE_TIMEOUT_MS,
};
