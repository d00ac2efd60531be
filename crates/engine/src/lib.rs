//! # docmigrate
//!
//! Migration and seed runner for document databases.
//!
//! - [`UnitLoader`] discovers migration units in a directory, sorted by file name
//! - [`Ledger`] records which migrations are applied
//! - [`Migrator`] applies pending migrations (`up`) or reverts the latest one (`down`)
//! - [`SeedRunner`] applies seeds by name or from the default manifest
//!
//! Units are JSON scripts on disk, or compiled implementations registered in a
//! [`UnitRegistry`] under the file name they replace.
//!
//! ```no_run
//! use docmigrate::{Migrator, UnitRegistry};
//! use docmigrate_store::MemoryStore;
//!
//! # async fn run() -> Result<(), docmigrate::MigrateError> {
//! let store = MemoryStore::new();
//! let registry = UnitRegistry::new();
//! let report = Migrator::new(&store, &registry, "database/migrations").up().await?;
//! println!("applied {} migrations", report.applied.len());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod ledger;
pub mod loader;
pub mod migrator;
pub mod rebuild;
pub mod registry;
pub mod scaffold;
pub mod script;
pub mod seeder;
pub mod unit;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use error::{MigrateError, MigrateResult, UnitError, UnitResult};
pub use ledger::{Ledger, LedgerEntry};
pub use loader::UnitLoader;
pub use migrator::{DownReport, FailedUnit, MigrationStatus, Migrator, UpReport};
pub use rebuild::{rebuild, RebuildReport};
pub use registry::UnitRegistry;
pub use scaffold::new_migration;
pub use script::{Command, MigrationScript, SeedScript};
pub use seeder::{resolve_seed_path, verify_seed_dir, SeedOutcome, SeedRequest, SeedRunner};
pub use unit::{Migration, MigrationUnit, Seeder, UNIT_EXTENSION};
