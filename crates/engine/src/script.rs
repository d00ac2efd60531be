//! JSON unit scripts.
//!
//! A script is a list of primitive store commands. Migrations carry an `up`
//! and a `down` list, seeds a single `run` list:
//!
//! ```json
//! {
//!   "up": [
//!     { "op": "createCollection", "collection": "users", "uniqueIndex": "email" }
//!   ],
//!   "down": [
//!     { "op": "dropCollection", "collection": "users" }
//!   ]
//! }
//! ```
//!
//! Commands run in order and stop at the first failure.

use std::fs;
use std::path::Path;

use async_trait::async_trait;
use docmigrate_core::DEFAULT_DATABASE;
use docmigrate_store::{CollectionOptions, Document, DocumentStore, Namespace, StoreResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{UnitError, UnitResult};
use crate::unit::{Migration, Seeder};

/// One primitive store operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Command {
    CreateCollection {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        database: Option<String>,
        collection: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        validator: Option<Value>,
        #[serde(default, rename = "uniqueIndex", skip_serializing_if = "Option::is_none")]
        unique_index: Option<String>,
    },
    DropCollection {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        database: Option<String>,
        collection: String,
    },
    CreateIndex {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        database: Option<String>,
        collection: String,
        field: String,
        #[serde(default)]
        unique: bool,
    },
    InsertOne {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        database: Option<String>,
        collection: String,
        document: Document,
    },
    UpdateOne {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        database: Option<String>,
        collection: String,
        filter: Document,
        update: Document,
        #[serde(default)]
        upsert: bool,
    },
    DeleteOne {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        database: Option<String>,
        collection: String,
        filter: Document,
    },
}

fn namespace(database: &Option<String>, collection: &str) -> Namespace {
    Namespace::new(database.as_deref().unwrap_or(DEFAULT_DATABASE), collection)
}

impl Command {
    /// Namespace the command targets
    pub fn namespace(&self) -> Namespace {
        match self {
            Command::CreateCollection { database, collection, .. }
            | Command::DropCollection { database, collection }
            | Command::CreateIndex { database, collection, .. }
            | Command::InsertOne { database, collection, .. }
            | Command::UpdateOne { database, collection, .. }
            | Command::DeleteOne { database, collection, .. } => namespace(database, collection),
        }
    }

    pub async fn execute(&self, store: &dyn DocumentStore) -> StoreResult<()> {
        let target = self.namespace();
        match self {
            Command::CreateCollection {
                validator,
                unique_index,
                ..
            } => {
                let options = CollectionOptions {
                    validator: validator.clone(),
                    unique_index: unique_index.clone(),
                };
                store.create_collection(&target, options).await
            }
            Command::DropCollection { .. } => {
                if !store.drop_collection(&target).await? {
                    tracing::debug!(collection = %target, "collection did not exist");
                }
                Ok(())
            }
            Command::CreateIndex { field, unique, .. } => {
                store.create_index(&target, field, *unique).await
            }
            Command::InsertOne { document, .. } => store.insert_one(&target, document.clone()).await,
            Command::UpdateOne {
                filter,
                update,
                upsert,
                ..
            } => {
                store.update_one(&target, filter, update, *upsert).await?;
                Ok(())
            }
            Command::DeleteOne { filter, .. } => {
                store.delete_one(&target, filter).await?;
                Ok(())
            }
        }
    }
}

async fn run_commands(commands: &[Command], store: &dyn DocumentStore) -> UnitResult<()> {
    for command in commands {
        command.execute(store).await?;
    }
    Ok(())
}

fn read_script<T: DeserializeOwned>(path: &Path) -> UnitResult<T> {
    let content = fs::read_to_string(path).map_err(|e| UnitError::io(path, e))?;
    serde_json::from_str(&content).map_err(|source| UnitError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// On-disk body of a migration unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationScript {
    pub up: Vec<Command>,
    pub down: Vec<Command>,
}

impl MigrationScript {
    pub fn from_path(path: &Path) -> UnitResult<Self> {
        read_script(path)
    }
}

#[async_trait]
impl Migration for MigrationScript {
    async fn up(&self, store: &dyn DocumentStore) -> UnitResult<()> {
        run_commands(&self.up, store).await
    }

    async fn down(&self, store: &dyn DocumentStore) -> UnitResult<()> {
        run_commands(&self.down, store).await
    }
}

/// On-disk body of a seed unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedScript {
    pub run: Vec<Command>,
}

impl SeedScript {
    pub fn from_path(path: &Path) -> UnitResult<Self> {
        read_script(path)
    }
}

#[async_trait]
impl Seeder for SeedScript {
    async fn run(&self, store: &dyn DocumentStore) -> UnitResult<()> {
        run_commands(&self.run, store).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmigrate_store::MemoryStore;
    use serde_json::json;
    use tempfile::TempDir;

    fn users() -> Namespace {
        Namespace::new("datastore", "users")
    }

    fn users_migration() -> MigrationScript {
        serde_json::from_value(json!({
            "up": [
                {
                    "op": "createCollection",
                    "collection": "users",
                    "validator": {"$jsonSchema": {"required": ["email"]}},
                    "uniqueIndex": "email"
                }
            ],
            "down": [
                {"op": "dropCollection", "collection": "users"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_command_defaults_database() {
        let command: Command = serde_json::from_value(json!({
            "op": "insertOne",
            "collection": "users",
            "document": {"email": "a@b.c"}
        }))
        .unwrap();
        assert_eq!(command.namespace(), users());

        let command: Command = serde_json::from_value(json!({
            "op": "dropCollection",
            "database": "archive",
            "collection": "users"
        }))
        .unwrap();
        assert_eq!(command.namespace(), Namespace::new("archive", "users"));
    }

    #[test]
    fn test_unknown_op_is_rejected() {
        let result: Result<Command, _> =
            serde_json::from_value(json!({"op": "renameCollection", "collection": "users"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_migration_script_requires_both_directions() {
        let result: Result<MigrationScript, _> = serde_json::from_value(json!({"up": []}));
        assert!(result.is_err());

        let result: Result<MigrationScript, _> = serde_json::from_value(json!({"run": []}));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_migration_script_up_and_down() {
        let store = MemoryStore::new();
        let migration = users_migration();

        migration.up(&store).await.unwrap();
        assert!(store.has_collection(&users()));
        assert_eq!(store.unique_fields(&users()), vec!["email".to_string()]);

        migration.down(&store).await.unwrap();
        assert!(!store.has_collection(&users()));
    }

    #[tokio::test]
    async fn test_failing_command_surfaces_store_error() {
        let store = MemoryStore::new();
        let migration = users_migration();
        migration.up(&store).await.unwrap();

        let err = migration.up(&store).await.unwrap_err();
        assert!(matches!(err, UnitError::Store(_)));
    }

    #[tokio::test]
    async fn test_seed_script_upserts() {
        let store = MemoryStore::new();
        let seed: SeedScript = serde_json::from_value(json!({
            "run": [{
                "op": "updateOne",
                "collection": "users",
                "filter": {"email": "test@gmail.com"},
                "update": {"$set": {"name": "Mocky Mockery"}},
                "upsert": true
            }]
        }))
        .unwrap();

        seed.run(&store).await.unwrap();
        seed.run(&store).await.unwrap();
        assert_eq!(store.documents(&users()).len(), 1);
    }

    #[test]
    fn test_from_path_reports_parse_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("1_broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = MigrationScript::from_path(&path).unwrap_err();
        assert!(matches!(err, UnitError::Parse { .. }));

        let err = MigrationScript::from_path(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, UnitError::Io { .. }));
    }
}
