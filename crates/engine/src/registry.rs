use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::unit::{Migration, Seeder};

/// Explicit registration table for compiled units.
///
/// Entries are keyed by the unit's file name (extension included). When the
/// loader finds a file whose name is registered, it uses the registered
/// implementation instead of parsing the file as a unit script.
#[derive(Clone, Default)]
pub struct UnitRegistry {
    migrations: HashMap<String, Arc<dyn Migration>>,
    seeders: HashMap<String, Arc<dyn Seeder>>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a migration implementation for `filename`
    pub fn register_migration<M>(&mut self, filename: impl Into<String>, migration: M) -> &mut Self
    where
        M: Migration + 'static,
    {
        self.migrations.insert(filename.into(), Arc::new(migration));
        self
    }

    /// Register a seeder implementation for `filename`
    pub fn register_seeder<S>(&mut self, filename: impl Into<String>, seeder: S) -> &mut Self
    where
        S: Seeder + 'static,
    {
        self.seeders.insert(filename.into(), Arc::new(seeder));
        self
    }

    pub fn with_migration<M>(mut self, filename: impl Into<String>, migration: M) -> Self
    where
        M: Migration + 'static,
    {
        self.register_migration(filename, migration);
        self
    }

    pub fn with_seeder<S>(mut self, filename: impl Into<String>, seeder: S) -> Self
    where
        S: Seeder + 'static,
    {
        self.register_seeder(filename, seeder);
        self
    }

    pub fn migration(&self, filename: &str) -> Option<Arc<dyn Migration>> {
        self.migrations.get(filename).cloned()
    }

    pub fn seeder(&self, filename: &str) -> Option<Arc<dyn Seeder>> {
        self.seeders.get(filename).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty() && self.seeders.is_empty()
    }
}

impl fmt::Debug for UnitRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut migrations: Vec<_> = self.migrations.keys().collect();
        let mut seeders: Vec<_> = self.seeders.keys().collect();
        migrations.sort();
        seeders.sort();
        f.debug_struct("UnitRegistry")
            .field("migrations", &migrations)
            .field("seeders", &seeders)
            .finish()
    }
}
