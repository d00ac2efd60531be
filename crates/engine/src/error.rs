//! Error types for unit loading and the executors
//!
//! [`UnitError`] covers anything a single unit can fail with: reading or
//! parsing its artifact, or its own operation failing. [`MigrateError`] is what
//! an executor run can abort with.

use std::io;
use std::path::PathBuf;

use docmigrate_store::StoreError;
use thiserror::Error;

/// Result type for unit operations
pub type UnitResult<T> = Result<T, UnitError>;

/// Result type for executor runs
pub type MigrateResult<T> = Result<T, MigrateError>;

/// Failure of a single migration or seed unit
#[derive(Debug, Error)]
pub enum UnitError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("Failed to parse unit {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid unit {}: {reason}", .path.display())]
    InvalidUnit { path: PathBuf, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Failure raised by a hand-written unit
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl UnitError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Conditions that abort an executor run
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("Unable to get list of migrations: {0}")]
    Discovery(#[source] UnitError),

    #[error("Failed to create migrations collection: {0}")]
    LedgerProvision(#[source] StoreError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] StoreError),

    #[error("Failed to migrate down {filename}: {source}")]
    Revert { filename: String, source: UnitError },

    #[error("Failed to find seeder directory: {}", .path.display())]
    SeedDirectory { path: PathBuf },

    #[error("Invalid migration name '{name}'")]
    InvalidName { name: String },

    #[error("Failed to create migration file {}: {source}", .path.display())]
    Scaffold { path: PathBuf, source: io::Error },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_error_messages() {
        let err = UnitError::InvalidUnit {
            path: PathBuf::from("migrations/1_users.json"),
            reason: "empty".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid unit migrations/1_users.json: empty");

        let err: UnitError = anyhow::anyhow!("boom").into();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_revert_error_keeps_filename() {
        let err = MigrateError::Revert {
            filename: "1591998925_users.json".to_string(),
            source: UnitError::Store(StoreError::backend("timeout")),
        };
        assert!(err.to_string().contains("1591998925_users.json"));
        assert!(err.to_string().contains("timeout"));
    }
}
