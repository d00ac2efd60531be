//! Unit Loader - discovers migration and seed units on disk
//!
//! Scans the top level of a directory (no recursion) for regular files with
//! the unit extension and resolves each to a runnable unit. Units come back
//! sorted by file name, so timestamp-prefixed names apply oldest first no
//! matter what order the filesystem lists them in.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{UnitError, UnitResult};
use crate::registry::UnitRegistry;
use crate::script::{MigrationScript, SeedScript};
use crate::unit::{MigrationUnit, Seeder, UNIT_EXTENSION};

/// Whether `path` is a loadable unit: a regular file (symlinks are not
/// followed) carrying the unit extension
pub fn is_unit_file(path: &Path) -> bool {
    let has_extension = path
        .extension()
        .map_or(false, |extension| extension == UNIT_EXTENSION);

    has_extension
        && fs::symlink_metadata(path)
            .map(|metadata| metadata.is_file())
            .unwrap_or(false)
}

/// Resolves on-disk artifacts to units, consulting a registry first
#[derive(Debug, Clone, Copy)]
pub struct UnitLoader<'r> {
    registry: &'r UnitRegistry,
}

impl<'r> UnitLoader<'r> {
    pub fn new(registry: &'r UnitRegistry) -> Self {
        Self { registry }
    }

    /// Load every migration in `directory`, sorted by file name.
    ///
    /// A missing directory is not an error: it logs a warning and yields no
    /// units. Any unit that cannot be read or parsed fails the whole load.
    pub fn load_migrations(&self, directory: &Path) -> UnitResult<Vec<MigrationUnit>> {
        debug!("Searching for migrations in \"{}\"...", directory.display());

        if !directory.exists() {
            warn!(base_path = %directory.display(), "Unable to find migration directory!");
            return Ok(Vec::new());
        }

        let mut filenames = Vec::new();
        let entries = fs::read_dir(directory).map_err(|e| UnitError::io(directory, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| UnitError::io(directory, e))?;
            if !is_unit_file(&entry.path()) {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(filename) => filenames.push(filename),
                Err(raw) => warn!(file = ?raw, "Skipping unit with a non UTF-8 file name"),
            }
        }
        filenames.sort();

        let mut units = Vec::with_capacity(filenames.len());
        for filename in filenames {
            let path = directory.join(&filename);
            debug!("-- found: \"{}\"", path.display());

            let migration = match self.registry.migration(&filename) {
                Some(migration) => migration,
                None => Arc::new(MigrationScript::from_path(&path)?),
            };

            units.push(MigrationUnit {
                filename,
                directory: directory.to_path_buf(),
                migration,
            });
        }

        Ok(units)
    }

    /// Load the seed unit at `path`, which must already be known to exist
    pub fn load_seeder(&self, path: &Path) -> UnitResult<Arc<dyn Seeder>> {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| UnitError::InvalidUnit {
                path: path.to_path_buf(),
                reason: "seed path has no usable file name".to_string(),
            })?;

        if let Some(seeder) = self.registry.seeder(filename) {
            return Ok(seeder);
        }
        Ok(Arc::new(SeedScript::from_path(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Journal, RecordingMigration};
    use std::fs;
    use tempfile::TempDir;

    const EMPTY_MIGRATION: &str = r#"{"up": [], "down": []}"#;

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let registry = UnitRegistry::new();
        let units = UnitLoader::new(&registry)
            .load_migrations(&dir.path().join("migrations"))
            .unwrap();
        assert!(units.is_empty());
    }

    #[test]
    fn test_directory_without_units_is_empty() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("README.md"), "# notes").unwrap();
        fs::write(dir.path().join("1591998925_users.ts"), "export {}").unwrap();
        fs::create_dir(dir.path().join("nested.json")).unwrap();

        let registry = UnitRegistry::new();
        let units = UnitLoader::new(&registry).load_migrations(dir.path()).unwrap();
        assert!(units.is_empty());
    }

    #[test]
    fn test_units_are_sorted_by_filename() {
        let dir = TempDir::new().unwrap();
        for name in ["1600000000_c.json", "1500000000_a.json", "1550000000_b.json"] {
            fs::write(dir.path().join(name), EMPTY_MIGRATION).unwrap();
        }

        let registry = UnitRegistry::new();
        let units = UnitLoader::new(&registry).load_migrations(dir.path()).unwrap();
        let names: Vec<_> = units.iter().map(|unit| unit.filename.as_str()).collect();

        assert_eq!(
            names,
            vec!["1500000000_a.json", "1550000000_b.json", "1600000000_c.json"]
        );
        assert_eq!(units[0].directory, dir.path());
        assert_eq!(units[0].path(), dir.path().join("1500000000_a.json"));
    }

    #[test]
    fn test_subdirectories_are_not_scanned() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("archive");
        fs::create_dir(&nested).unwrap();
        fs::write(nested.join("1_old.json"), EMPTY_MIGRATION).unwrap();

        let registry = UnitRegistry::new();
        let units = UnitLoader::new(&registry).load_migrations(dir.path()).unwrap();
        assert!(units.is_empty());
    }

    #[test]
    fn test_malformed_unit_fails_the_load() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("1_good.json"), EMPTY_MIGRATION).unwrap();
        fs::write(dir.path().join("2_bad.json"), r#"{"up": "nope"}"#).unwrap();

        let registry = UnitRegistry::new();
        let err = UnitLoader::new(&registry).load_migrations(dir.path()).unwrap_err();
        assert!(matches!(err, UnitError::Parse { ref path, .. } if path.ends_with("2_bad.json")));
    }

    #[test]
    fn test_registered_unit_takes_precedence() {
        let dir = TempDir::new().unwrap();
        // Content is never parsed for registered units.
        fs::write(dir.path().join("1_compiled.json"), "not a script").unwrap();

        let journal = Journal::default();
        let registry = UnitRegistry::new()
            .with_migration("1_compiled.json", RecordingMigration::new("1_compiled", &journal));

        let units = UnitLoader::new(&registry).load_migrations(dir.path()).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].filename, "1_compiled.json");
    }

    #[test]
    fn test_load_seeder_from_script_and_registry() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("user_seeder.json");
        fs::write(&script, r#"{"run": []}"#).unwrap();

        let registry = UnitRegistry::new();
        assert!(UnitLoader::new(&registry).load_seeder(&script).is_ok());

        fs::write(&script, r#"{"up": [], "down": []}"#).unwrap();
        assert!(UnitLoader::new(&registry).load_seeder(&script).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_units_are_skipped() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("real.txt");
        fs::write(&target, EMPTY_MIGRATION).unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("1_link.json")).unwrap();

        assert!(!is_unit_file(&dir.path().join("1_link.json")));
        let registry = UnitRegistry::new();
        let units = UnitLoader::new(&registry).load_migrations(dir.path()).unwrap();
        assert!(units.is_empty());
    }
}
