//! Applied-State Ledger
//!
//! A collection recording which migrations are currently applied. An entry
//! exists for a filename exactly while that migration's `up` has run and its
//! `down` has not.

use chrono::{DateTime, TimeZone, Utc};
use docmigrate_core::{DEFAULT_DATABASE, DEFAULT_LEDGER_COLLECTION};
use docmigrate_store::{
    to_document, CollectionOptions, Document, DocumentStore, Namespace, StoreError, StoreResult,
};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// One persisted ledger document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub filename: String,
    /// Epoch milliseconds. Absent on entries written without a timestamp.
    #[serde(rename = "ranAt")]
    pub ran_at: Option<i64>,
}

impl LedgerEntry {
    pub fn new(filename: impl Into<String>, applied_at: DateTime<Utc>) -> Self {
        Self {
            filename: filename.into(),
            ran_at: Some(applied_at.timestamp_millis()),
        }
    }

    /// Read an entry back from its stored document.
    ///
    /// `ranAt` may be stored as an integer or a double; anything else is
    /// treated as missing.
    pub fn from_document(filename: &str, document: &Document) -> Self {
        let ran_at = document.get("ranAt").and_then(|value| {
            value
                .as_i64()
                .or_else(|| value.as_f64().map(|millis| millis as i64))
        });

        Self {
            filename: document
                .get("filename")
                .and_then(Value::as_str)
                .unwrap_or(filename)
                .to_string(),
            ran_at,
        }
    }

    pub fn applied_at(&self) -> Option<DateTime<Utc>> {
        self.ran_at
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
    }
}

fn filename_filter(filename: &str) -> Document {
    let mut filter = Document::new();
    filter.insert("filename".to_string(), Value::String(filename.to_string()));
    filter
}

/// Handle on the ledger collection of one store
#[derive(Clone)]
pub struct Ledger<'a> {
    store: &'a dyn DocumentStore,
    namespace: Namespace,
}

impl<'a> Ledger<'a> {
    /// Ledger at the default `datastore` / `config.migrations` location
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self::with_namespace(store, DEFAULT_DATABASE, DEFAULT_LEDGER_COLLECTION)
    }

    pub fn with_namespace(
        store: &'a dyn DocumentStore,
        database: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            store,
            namespace: Namespace::new(database, collection),
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Provision the ledger collection with a unique index on `filename`.
    ///
    /// A no-op once the collection exists. Losing a creation race to another
    /// process also counts as provisioned.
    pub async fn ensure_collection(&self) -> StoreResult<()> {
        let names = self
            .store
            .list_collection_names(&self.namespace.database)
            .await?;
        if names.iter().any(|name| *name == self.namespace.collection) {
            return Ok(());
        }

        debug!(collection = %self.namespace, "Creating migrations collection");
        let options = CollectionOptions::default().with_unique_index("filename");
        match self.store.create_collection(&self.namespace, options).await {
            Ok(()) | Err(StoreError::CollectionExists { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Whether an entry exists for `filename`
    pub async fn is_applied(&self, filename: &str) -> StoreResult<bool> {
        let found = self
            .store
            .find_one(&self.namespace, &filename_filter(filename))
            .await?;
        Ok(found.is_some())
    }

    /// The stored entry for `filename`, if any
    pub async fn entry(&self, filename: &str) -> StoreResult<Option<LedgerEntry>> {
        let found = self
            .store
            .find_one(&self.namespace, &filename_filter(filename))
            .await?;
        Ok(found.map(|document| LedgerEntry::from_document(filename, &document)))
    }

    /// Record `filename` as applied now. Fails on an existing entry.
    pub async fn mark_applied(&self, filename: &str) -> StoreResult<()> {
        let entry = LedgerEntry::new(filename, Utc::now());
        let document = to_document(serde_json::to_value(&entry)?)?;
        self.store.insert_one(&self.namespace, document).await
    }

    /// Drop the entry for `filename`; absent entries are ignored
    pub async fn mark_removed(&self, filename: &str) -> StoreResult<()> {
        let deleted = self
            .store
            .delete_one(&self.namespace, &filename_filter(filename))
            .await?;
        if deleted == 0 {
            debug!(file = filename, "No ledger entry to remove");
        }
        Ok(())
    }
}
