//! # docmigrate-core
//!
//! Shared foundation for the docmigrate crates: configuration resolved from
//! the environment and process-wide logging setup.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{LogFormat, MigrateConfig, DEFAULT_DATABASE, DEFAULT_LEDGER_COLLECTION};
pub use error::{ConfigError, ConfigResult};
pub use logging::{init_logging, LoggingConfig};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
