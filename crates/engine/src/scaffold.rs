use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::info;

use crate::error::{MigrateError, MigrateResult};
use crate::script::MigrationScript;
use crate::unit::UNIT_EXTENSION;

/// Lowercase `name`, collapsing every run of non-alphanumerics to one `_`
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') && !slug.is_empty() {
            slug.push('_');
        }
    }
    slug.trim_end_matches('_').to_string()
}

/// Write an empty migration script named `<unix-seconds>_<slug>.json` into
/// `directory`, creating the directory if needed. Returns the new file's path.
///
/// An existing file with the same name is never overwritten.
pub fn new_migration(directory: &Path, name: &str) -> MigrateResult<PathBuf> {
    write_migration(directory, name, Utc::now().timestamp())
}

fn write_migration(directory: &Path, name: &str, timestamp: i64) -> MigrateResult<PathBuf> {
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(MigrateError::InvalidName {
            name: name.to_string(),
        });
    }

    let filename = format!("{}_{}.{}", timestamp, slug, UNIT_EXTENSION);
    let path = directory.join(filename);
    let scaffold_err = |source: io::Error| MigrateError::Scaffold {
        path: path.clone(),
        source,
    };

    fs::create_dir_all(directory).map_err(scaffold_err)?;

    let body = serde_json::to_string_pretty(&MigrationScript::default())
        .map_err(|e| scaffold_err(e.into()))?;
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(scaffold_err)?;
    writeln!(file, "{}", body).map_err(scaffold_err)?;

    info!(file = %path.display(), "Created migration");
    Ok(path)
}
