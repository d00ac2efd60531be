//! Migration and seed units.
//!
//! A unit is anything that resolves, at run time, to an object exposing the
//! operations below: either a compiled implementation registered in a
//! [`crate::UnitRegistry`] or a JSON unit script read from disk.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use docmigrate_store::DocumentStore;

use crate::error::UnitResult;

/// File extension of loadable units
pub const UNIT_EXTENSION: &str = "json";

/// A reversible schema or data change
#[async_trait]
pub trait Migration: Send + Sync {
    /// Apply the change
    async fn up(&self, store: &dyn DocumentStore) -> UnitResult<()>;

    /// Undo what `up` did
    async fn down(&self, store: &dyn DocumentStore) -> UnitResult<()>;
}

/// A one-directional data population step.
///
/// Seeds are not tracked; running one twice runs it twice. Upsert-style
/// idempotence is up to the seed.
#[async_trait]
pub trait Seeder: Send + Sync {
    async fn run(&self, store: &dyn DocumentStore) -> UnitResult<()>;
}

/// A discovered migration, owned by the loader for one engine run
#[derive(Clone)]
pub struct MigrationUnit {
    /// File name, the unit's identity in the ledger
    pub filename: String,
    /// Directory the unit was found in
    pub directory: PathBuf,
    pub migration: Arc<dyn Migration>,
}

impl MigrationUnit {
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.filename)
    }
}

impl fmt::Debug for MigrationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationUnit")
            .field("filename", &self.filename)
            .field("directory", &self.directory)
            .finish_non_exhaustive()
    }
}
