//! Record types shipped by the demo binary, tests and benchmarks

pub mod log_entry;

pub use log_entry::{LogEntry, LogFields, LogLevel};
