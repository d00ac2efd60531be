//! Core Document Store Trait
//!
//! The primitive operations the migration engine issues against a document
//! database. Backends map each one onto their native driver call; nothing
//! above this trait knows which backend is in use.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::document::Document;
use crate::error::StoreResult;

/// A `database.collection` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub database: String,
    pub collection: String,
}

impl Namespace {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Options for [`DocumentStore::create_collection`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionOptions {
    /// Schema validator, e.g. `{"$jsonSchema": {"required": ["email"]}}`
    pub validator: Option<Value>,
    /// Field to guard with a unique index right after creation
    pub unique_index: Option<String>,
}

impl CollectionOptions {
    pub fn with_validator(mut self, validator: Value) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_unique_index(mut self, field: impl Into<String>) -> Self {
        self.unique_index = Some(field.into());
        self
    }
}

/// What an `update_one` call did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
    pub upserted: bool,
}

/// Abstract document database connection.
///
/// One handle is created per process and shared by reference; no component
/// closes or replaces it mid-run. Every call completes before returning.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Names of the collections in `database`
    async fn list_collection_names(&self, database: &str) -> StoreResult<Vec<String>>;

    /// Create a collection, failing if it already exists
    async fn create_collection(&self, namespace: &Namespace, options: CollectionOptions) -> StoreResult<()>;

    /// Create a single-field ascending index
    async fn create_index(&self, namespace: &Namespace, field: &str, unique: bool) -> StoreResult<()>;

    /// Drop a collection. Returns `false` when there was nothing to drop.
    async fn drop_collection(&self, namespace: &Namespace) -> StoreResult<bool>;

    /// First document matching `filter`
    async fn find_one(&self, namespace: &Namespace, filter: &Document) -> StoreResult<Option<Document>>;

    async fn insert_one(&self, namespace: &Namespace, document: Document) -> StoreResult<()>;

    async fn update_one(
        &self,
        namespace: &Namespace,
        filter: &Document,
        update: &Document,
        upsert: bool,
    ) -> StoreResult<UpdateOutcome>;

    /// Delete the first document matching `filter`. Returns the number deleted.
    async fn delete_one(&self, namespace: &Namespace, filter: &Document) -> StoreResult<u64>;
}
