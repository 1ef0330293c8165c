//! dropwatch library
//!
//! The `dropwatch` binary is a thin wrapper over [`cli::run`]; everything it
//! wires together is exposed here for integration tests.

pub mod cli;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod metrics;

pub use config::{TargetConfig, WatchConfig};
pub use errors::{ConfigError, DiscoveryError};
