//! Migration Executor - applies and reverts migrations against the store
//!
//! `up` applies every pending unit in filename order, best effort: a failing
//! unit is logged and recorded, and the run moves on to the next one. `down`
//! reverts exactly one unit, the most recent applied one, and any failure
//! while reverting aborts the run.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use docmigrate_store::DocumentStore;
use tracing::{debug, error, info};

use crate::error::{MigrateError, MigrateResult, UnitError};
use crate::ledger::Ledger;
use crate::loader::UnitLoader;
use crate::registry::UnitRegistry;
use crate::unit::MigrationUnit;

/// A unit whose `up` (or ledger write) failed during an up run
#[derive(Debug)]
pub struct FailedUnit {
    pub filename: String,
    pub error: UnitError,
}

/// Outcome of [`Migrator::up`]
#[derive(Debug, Default)]
pub struct UpReport {
    /// Units applied by this run, in order
    pub applied: Vec<String>,
    /// Units already in the ledger
    pub skipped: Vec<String>,
    pub failed: Vec<FailedUnit>,
}

impl UpReport {
    /// Number of units the run looked at
    pub fn processed(&self) -> usize {
        self.applied.len() + self.skipped.len() + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Outcome of [`Migrator::down`]
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DownReport {
    /// The unit reverted, or `None` when nothing was applied
    pub reverted: Option<String>,
}

/// Ledger state of one discovered unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub filename: String,
    pub applied: bool,
    /// When the ledger entry carries a usable timestamp
    pub applied_at: Option<DateTime<Utc>>,
}

impl MigrationStatus {
    pub fn is_applied(&self) -> bool {
        self.applied
    }
}

/// Runs the migrations found in one directory against one ledger
pub struct Migrator<'a> {
    store: &'a dyn DocumentStore,
    registry: &'a UnitRegistry,
    directory: PathBuf,
    ledger: Ledger<'a>,
}

impl<'a> Migrator<'a> {
    pub fn new(
        store: &'a dyn DocumentStore,
        registry: &'a UnitRegistry,
        directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            registry,
            directory: directory.into(),
            ledger: Ledger::new(store),
        }
    }

    /// Track applied state in `database.collection` instead of the default ledger
    pub fn with_ledger(mut self, database: impl Into<String>, collection: impl Into<String>) -> Self {
        self.ledger = Ledger::with_namespace(self.store, database, collection);
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn ledger(&self) -> &Ledger<'a> {
        &self.ledger
    }

    /// Discover units, then make sure the ledger exists. Both are fatal.
    async fn prepare(&self) -> MigrateResult<Vec<MigrationUnit>> {
        let units = UnitLoader::new(self.registry)
            .load_migrations(&self.directory)
            .map_err(|e| {
                error!(error = %e, "Unable to get list of migrations!");
                MigrateError::Discovery(e)
            })?;

        self.ledger.ensure_collection().await.map_err(|e| {
            error!(error = %e, collection = %self.ledger.namespace(), "Failed to create migrations collection!");
            MigrateError::LedgerProvision(e)
        })?;

        Ok(units)
    }

    async fn apply(&self, unit: &MigrationUnit) -> Result<bool, UnitError> {
        if self.ledger.is_applied(&unit.filename).await? {
            return Ok(false);
        }
        unit.migration.up(self.store).await?;
        self.ledger.mark_applied(&unit.filename).await?;
        Ok(true)
    }

    /// Apply every pending migration, continuing past failed units
    pub async fn up(&self) -> MigrateResult<UpReport> {
        let units = self.prepare().await?;
        let mut report = UpReport::default();

        debug!("Applying migrations...");
        for unit in &units {
            match self.apply(unit).await {
                Ok(true) => {
                    debug!("-- successfully applied migration: {}", unit.filename);
                    report.applied.push(unit.filename.clone());
                }
                Ok(false) => {
                    debug!("-- already applied: {}", unit.filename);
                    report.skipped.push(unit.filename.clone());
                }
                Err(e) => {
                    error!(
                        file = %unit.filename,
                        path = %unit.path().display(),
                        error = %e,
                        "Unable to apply migration!"
                    );
                    report.failed.push(FailedUnit {
                        filename: unit.filename.clone(),
                        error: e,
                    });
                }
            }
        }

        info!(
            applied = report.applied.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Finished migrating up {} migrations!",
            report.processed()
        );
        Ok(report)
    }

    /// Revert the most recently applied migration, if any
    pub async fn down(&self) -> MigrateResult<DownReport> {
        let units = self.prepare().await?;
        let mut report = DownReport::default();

        debug!("Migrating down...");
        for unit in units.iter().rev() {
            if !self.ledger.is_applied(&unit.filename).await? {
                continue;
            }

            self.revert(unit).await.map_err(|source| {
                error!(
                    file = %unit.filename,
                    path = %unit.path().display(),
                    error = %source,
                    "Failed to migrate down!"
                );
                MigrateError::Revert {
                    filename: unit.filename.clone(),
                    source,
                }
            })?;

            info!("-- successfully migrated down: {}", unit.filename);
            report.reverted = Some(unit.filename.clone());
            break;
        }

        info!("Finished migrating down!");
        Ok(report)
    }

    async fn revert(&self, unit: &MigrationUnit) -> Result<(), UnitError> {
        unit.migration.down(self.store).await?;
        self.ledger.mark_removed(&unit.filename).await?;
        Ok(())
    }

    /// Applied state of every discovered unit, in filename order
    pub async fn status(&self) -> MigrateResult<Vec<MigrationStatus>> {
        let units = self.prepare().await?;
        let mut statuses = Vec::with_capacity(units.len());
        for unit in units {
            let entry = self.ledger.entry(&unit.filename).await?;
            statuses.push(MigrationStatus {
                filename: unit.filename,
                applied: entry.is_some(),
                applied_at: entry.and_then(|entry| entry.applied_at()),
            });
        }
        Ok(statuses)
    }
}
