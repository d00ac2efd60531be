//! # Console Logging
//!
//! Process-wide `tracing` subscriber setup. Library code only ever emits
//! events through the `tracing` macros; binaries call [`init_logging`] once
//! at startup. Events emitted before that are dropped by tracing's no-op
//! default dispatcher.

use std::io;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, MigrateConfig};

/// Logging configuration for docmigrate binaries
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "warn")
    pub level: String,
    /// Enable JSON structured logging (vs plain text)
    pub json_format: bool,
    /// Environment filter (supports filters like "docmigrate=debug,mongodb=warn")
    pub env_filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            env_filter: None,
        }
    }
}

impl LoggingConfig {
    /// Set environment filter
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Filter directive actually handed to the subscriber
    pub fn directive(&self) -> String {
        match &self.env_filter {
            Some(filter) => filter.clone(),
            None => normalize_level(&self.level).to_string(),
        }
    }
}

impl From<&MigrateConfig> for LoggingConfig {
    fn from(config: &MigrateConfig) -> Self {
        Self {
            level: config.log_level.clone(),
            json_format: config.log_format == LogFormat::Json,
            env_filter: None,
        }
    }
}

/// `verbose` is accepted as an alias for `debug`
fn normalize_level(level: &str) -> &str {
    match level {
        "verbose" | "VERBOSE" => "debug",
        other => other,
    }
}

/// Initialize console logging for the process.
///
/// Returns an error instead of panicking when a global subscriber is already
/// installed.
pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(config.directive()))?;

    if config.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(io::stdout).json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(io::stdout).with_target(false))
            .try_init()?;
    }

    tracing::debug!(
        target: "docmigrate::logging",
        "Logging initialized (level: {}, format: {})",
        config.level,
        if config.json_format { "JSON" } else { "text" }
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_migrate_config() {
        let config = MigrateConfig {
            log_level: "warn".to_string(),
            log_format: LogFormat::Json,
            ..MigrateConfig::default()
        };
        let logging = LoggingConfig::from(&config);
        assert_eq!(logging.level, "warn");
        assert!(logging.json_format);
    }

    #[test]
    fn test_verbose_maps_to_debug() {
        let logging = LoggingConfig {
            level: "verbose".to_string(),
            ..LoggingConfig::default()
        };
        assert_eq!(logging.directive(), "debug");

        let logging = logging.with_env_filter("docmigrate=trace");
        assert_eq!(logging.directive(), "docmigrate=trace");
    }

    #[test]
    fn test_second_initialization_is_an_error() {
        let first = init_logging(LoggingConfig::default());
        let second = init_logging(LoggingConfig::default());
        // Another test binary may already own the global subscriber, so only
        // the second call is guaranteed to fail.
        let _ = first;
        assert!(second.is_err());
    }
}
