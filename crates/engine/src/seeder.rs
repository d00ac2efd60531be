//! Seed Executor
//!
//! Applies seed units by name, or the default batch listed in a manifest.
//! Seeds are not tracked: every request re-runs the unit. Nothing a single
//! seed does (missing file, bad script, failing run) stops the others.

use std::fs;
use std::path::{Path, PathBuf};

use docmigrate_store::DocumentStore;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::error::{MigrateError, MigrateResult};
use crate::loader::UnitLoader;
use crate::registry::UnitRegistry;
use crate::unit::UNIT_EXTENSION;

/// Path of the seed called `name` under `seed_dir`.
///
/// A bare name gets the unit extension appended; a name that already has an
/// extension is used as given.
pub fn resolve_seed_path(name: &str, seed_dir: &Path) -> PathBuf {
    if Path::new(name).extension().is_none() {
        seed_dir.join(format!("{}.{}", name, UNIT_EXTENSION))
    } else {
        seed_dir.join(name)
    }
}

/// Fail unless `path` is an existing directory. Symlinks are not followed.
pub fn verify_seed_dir(path: &Path) -> MigrateResult<()> {
    let is_dir = fs::symlink_metadata(path)
        .map(|metadata| metadata.is_dir())
        .unwrap_or(false);

    if !is_dir {
        error!(path = %path.display(), "Failed to find seeder directory!");
        return Err(MigrateError::SeedDirectory {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// What happened to one seed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Applied,
    /// No regular file (symlinks excluded) at the resolved path
    Missing,
    /// The unit could not be loaded or its run failed
    Failed,
}

/// Why a default manifest was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
enum ManifestRejection {
    NotFound,
    Unreadable(String),
    Malformed(&'static str),
}

/// Parse manifest text into its ordered seed names
fn parse_manifest(content: &str) -> Result<Vec<String>, ManifestRejection> {
    let value: Value = serde_json::from_str(content)
        .map_err(|_| ManifestRejection::Malformed("JSON parse error"))?;

    const BAD_SEEDERS: ManifestRejection =
        ManifestRejection::Malformed("Missing or malformed 'seeders' property");

    let seeders = value
        .get("seeders")
        .and_then(Value::as_array)
        .ok_or(BAD_SEEDERS)?;

    seeders
        .iter()
        .map(|seeder| seeder.as_str().map(str::to_string).ok_or(BAD_SEEDERS))
        .collect()
}

fn read_manifest(path: &Path) -> Result<Vec<String>, ManifestRejection> {
    let is_file = fs::symlink_metadata(path)
        .map(|metadata| metadata.is_file())
        .unwrap_or(false);
    if !is_file {
        return Err(ManifestRejection::NotFound);
    }

    let content =
        fs::read_to_string(path).map_err(|e| ManifestRejection::Unreadable(e.to_string()))?;
    parse_manifest(&content)
}

/// A seed invocation: the default batch and/or explicit names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedRequest {
    pub use_default: bool,
    pub names: Vec<String>,
}

impl SeedRequest {
    pub fn defaults() -> Self {
        Self {
            use_default: true,
            names: Vec::new(),
        }
    }

    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            use_default: false,
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

/// Applies seeds against one store
pub struct SeedRunner<'a> {
    store: &'a dyn DocumentStore,
    registry: &'a UnitRegistry,
    manifest_path: PathBuf,
}

impl<'a> SeedRunner<'a> {
    pub fn new(
        store: &'a dyn DocumentStore,
        registry: &'a UnitRegistry,
        manifest_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            registry,
            manifest_path: manifest_path.into(),
        }
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Resolve and run one seed. Never fails: problems are logged and
    /// reported through the outcome.
    pub async fn apply_seeder(&self, name: &str, seed_dir: &Path) -> SeedOutcome {
        let path = resolve_seed_path(name, seed_dir);

        let is_file = fs::symlink_metadata(&path)
            .map(|metadata| metadata.is_file())
            .unwrap_or(false);
        if !is_file {
            warn!(seeder = name, file = %path.display(), "Unable to find seeder!");
            return SeedOutcome::Missing;
        }

        let seeder = match UnitLoader::new(self.registry).load_seeder(&path) {
            Ok(seeder) => seeder,
            Err(e) => {
                error!(seeder = name, file = %path.display(), error = %e, "Unable to apply seeder!");
                return SeedOutcome::Failed;
            }
        };

        match seeder.run(self.store).await {
            Ok(()) => {
                debug!("-- successfully applied seeder: {}", name);
                SeedOutcome::Applied
            }
            Err(e) => {
                error!(seeder = name, file = %path.display(), error = %e, "Unable to apply seeder!");
                SeedOutcome::Failed
            }
        }
    }

    /// Apply the seeds listed in the default manifest, in order.
    ///
    /// Returns the manifest length, or `None` when the manifest was rejected.
    /// A rejected manifest logs exactly one warning and runs nothing.
    pub async fn run_default(&self, seed_dir: &Path) -> Option<usize> {
        let manifest = self.manifest_path.display().to_string();
        let seeders = match read_manifest(&self.manifest_path) {
            Ok(seeders) => seeders,
            Err(ManifestRejection::NotFound) => {
                warn!(file = %manifest, "Unable to find default file!");
                return None;
            }
            Err(ManifestRejection::Unreadable(reason)) => {
                warn!(file = %manifest, reason = %reason, "Unable to read default file!");
                return None;
            }
            Err(ManifestRejection::Malformed(reason)) => {
                warn!(file = %manifest, reason, "Malformed default file!");
                return None;
            }
        };

        debug!("Using default seeders...");
        for seeder in &seeders {
            self.apply_seeder(seeder, seed_dir).await;
        }

        info!("Finished running {} default seeders!", seeders.len());
        Some(seeders.len())
    }

    /// Run a full seed request against `seed_dir`.
    ///
    /// A missing seed directory aborts before anything runs. Returns the
    /// number of named seeds attempted.
    pub async fn run(&self, request: &SeedRequest, seed_dir: &Path) -> MigrateResult<usize> {
        verify_seed_dir(seed_dir)?;

        if request.use_default {
            self.run_default(seed_dir).await;
        }

        for name in &request.names {
            self.apply_seeder(name, seed_dir).await;
        }

        info!("Finished running {} seeders!", request.names.len());
        Ok(request.names.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_seed_path() {
        let dir = Path::new("database/seeders");
        assert_eq!(
            resolve_seed_path("user_seeder", dir),
            dir.join("user_seeder.json")
        );
        assert_eq!(
            resolve_seed_path("user_seeder.json", dir),
            resolve_seed_path("user_seeder", dir)
        );
        // Any extension is taken literally.
        assert_eq!(resolve_seed_path("users.v2", dir), dir.join("users.v2"));
    }

    #[test]
    fn test_parse_manifest() {
        assert_eq!(
            parse_manifest(r#"{"seeders": ["a", "b"]}"#).unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );
        assert!(parse_manifest(r#"{"seeders": []}"#).unwrap().is_empty());

        assert_eq!(
            parse_manifest("not json").unwrap_err(),
            ManifestRejection::Malformed("JSON parse error")
        );
        for malformed in [r#"{"test": {}}"#, r#"{"seeders": "a"}"#, r#"{"seeders": [1]}"#, "[]"] {
            assert_eq!(
                parse_manifest(malformed).unwrap_err(),
                ManifestRejection::Malformed("Missing or malformed 'seeders' property"),
                "{}",
                malformed
            );
        }
    }

    #[test]
    fn test_read_manifest_requires_a_file() {
        let dir = tempfile::TempDir::new().unwrap();
        assert_eq!(
            read_manifest(&dir.path().join("default.json")).unwrap_err(),
            ManifestRejection::NotFound
        );
        assert_eq!(read_manifest(dir.path()).unwrap_err(), ManifestRejection::NotFound);
    }

    #[test]
    fn test_verify_seed_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(verify_seed_dir(dir.path()).is_ok());

        let file = dir.path().join("user_seeder.json");
        fs::write(&file, "{}").unwrap();
        assert!(matches!(
            verify_seed_dir(&file),
            Err(MigrateError::SeedDirectory { .. })
        ));
        assert!(verify_seed_dir(&dir.path().join("missing")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_not_followed() {
        use std::os::unix::fs::symlink;

        let dir = tempfile::TempDir::new().unwrap();
        let real_dir = dir.path().join("real_seeders");
        fs::create_dir(&real_dir).unwrap();
        let linked_dir = dir.path().join("seeders");
        symlink(&real_dir, &linked_dir).unwrap();
        assert!(verify_seed_dir(&real_dir).is_ok());
        assert!(matches!(
            verify_seed_dir(&linked_dir),
            Err(MigrateError::SeedDirectory { .. })
        ));

        let real_manifest = dir.path().join("manifest.txt");
        fs::write(&real_manifest, r#"{"seeders": ["a"]}"#).unwrap();
        let linked_manifest = dir.path().join("default.json");
        symlink(&real_manifest, &linked_manifest).unwrap();
        assert!(read_manifest(&real_manifest).is_ok());
        assert_eq!(read_manifest(&linked_manifest).unwrap_err(), ManifestRejection::NotFound);
    }

    #[test]
    fn test_seed_request_builders() {
        assert!(SeedRequest::defaults().use_default);
        let request = SeedRequest::named(["a", "b"]);
        assert!(!request.use_default);
        assert_eq!(request.names, vec!["a", "b"]);
    }
}
