//! MongoDB backend.
//!
//! Thin mapping from [`DocumentStore`] onto the official driver. Documents
//! cross the boundary as relaxed extended JSON.

use async_trait::async_trait;
use mongodb::bson::{self, doc, Bson, Document as BsonDocument};
use mongodb::error::{Error as DriverError, ErrorKind, WriteFailure};
use mongodb::options::{CreateCollectionOptions, IndexOptions, ReplaceOptions, UpdateOptions};
use mongodb::{Client, Collection, IndexModel};
use serde_json::Value;

use crate::backend::{CollectionOptions, DocumentStore, Namespace, UpdateOutcome};
use crate::document::{is_operator_update, to_document, Document};
use crate::error::{StoreError, StoreResult};

const DUPLICATE_KEY: i32 = 11000;
const NAMESPACE_EXISTS: i32 = 48;
const NAMESPACE_NOT_FOUND: i32 = 26;

/// Document store backed by a MongoDB deployment
#[derive(Debug, Clone)]
pub struct MongoStore {
    client: Client,
}

impl MongoStore {
    /// Connect and verify the deployment answers a `ping`.
    ///
    /// The driver connects lazily, so the ping is what surfaces a bad URL or
    /// an unreachable server at startup instead of on the first unit.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = Client::with_uri_str(url)
            .await
            .map_err(|e| StoreError::connection(e.to_string()))?;

        client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| StoreError::connection(e.to_string()))?;

        tracing::info!("Successfully connected to MongoDB database!");
        Ok(Self { client })
    }

    /// Wrap an already configured client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn collection(&self, namespace: &Namespace) -> Collection<BsonDocument> {
        self.client
            .database(&namespace.database)
            .collection(&namespace.collection)
    }
}

fn to_bson(document: &Document) -> StoreResult<BsonDocument> {
    bson::to_document(document).map_err(|e| StoreError::serialization(e.to_string()))
}

fn from_bson(document: BsonDocument) -> StoreResult<Document> {
    to_document(Bson::Document(document).into_relaxed_extjson())
}

/// How an update document is sent to the server
#[derive(Debug, PartialEq)]
enum UpdateBody {
    /// `$set`, `$unset`, ... go through `update_one`
    Modifiers(BsonDocument),
    /// A whole new document goes through `replace_one`
    Replacement(BsonDocument),
}

fn update_body(update: &Document) -> StoreResult<UpdateBody> {
    let body = to_bson(update)?;
    if is_operator_update(update) {
        Ok(UpdateBody::Modifiers(body))
    } else {
        Ok(UpdateBody::Replacement(body))
    }
}

fn index_keys(field: &str) -> BsonDocument {
    let mut keys = BsonDocument::new();
    keys.insert(field, 1);
    keys
}

fn server_code(err: &DriverError) -> Option<i32> {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => Some(write_error.code),
        ErrorKind::Command(command_error) => Some(command_error.code),
        _ => None,
    }
}

fn map_driver_error(namespace: &Namespace, err: DriverError) -> StoreError {
    match server_code(&err) {
        Some(DUPLICATE_KEY) => StoreError::DuplicateKey {
            namespace: namespace.to_string(),
            field: "index".to_string(),
            value: err.to_string(),
        },
        Some(NAMESPACE_EXISTS) => StoreError::CollectionExists {
            namespace: namespace.to_string(),
        },
        _ => StoreError::backend(err.to_string()),
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn list_collection_names(&self, database: &str) -> StoreResult<Vec<String>> {
        self.client
            .database(database)
            .list_collection_names(None)
            .await
            .map_err(|e| StoreError::backend(e.to_string()))
    }

    async fn create_collection(&self, namespace: &Namespace, options: CollectionOptions) -> StoreResult<()> {
        let mut create_options = CreateCollectionOptions::default();
        if let Some(validator) = &options.validator {
            let validator = match validator {
                Value::Object(map) => to_bson(map)?,
                _ => return Err(StoreError::serialization("validator must be a JSON object")),
            };
            create_options.validator = Some(validator);
        }

        self.client
            .database(&namespace.database)
            .create_collection(&namespace.collection, create_options)
            .await
            .map_err(|e| map_driver_error(namespace, e))?;

        if let Some(field) = &options.unique_index {
            self.create_index(namespace, field, true).await?;
        }
        Ok(())
    }

    async fn create_index(&self, namespace: &Namespace, field: &str, unique: bool) -> StoreResult<()> {
        let model = IndexModel::builder()
            .keys(index_keys(field))
            .options(IndexOptions::builder().unique(unique).build())
            .build();

        self.collection(namespace)
            .create_index(model, None)
            .await
            .map_err(|e| map_driver_error(namespace, e))?;
        Ok(())
    }

    async fn drop_collection(&self, namespace: &Namespace) -> StoreResult<bool> {
        match self.collection(namespace).drop(None).await {
            Ok(()) => Ok(true),
            Err(e) if server_code(&e) == Some(NAMESPACE_NOT_FOUND) => Ok(false),
            Err(e) => Err(map_driver_error(namespace, e)),
        }
    }

    async fn find_one(&self, namespace: &Namespace, filter: &Document) -> StoreResult<Option<Document>> {
        let found = self
            .collection(namespace)
            .find_one(to_bson(filter)?, None)
            .await
            .map_err(|e| map_driver_error(namespace, e))?;

        found.map(from_bson).transpose()
    }

    async fn insert_one(&self, namespace: &Namespace, document: Document) -> StoreResult<()> {
        self.collection(namespace)
            .insert_one(to_bson(&document)?, None)
            .await
            .map_err(|e| map_driver_error(namespace, e))?;
        Ok(())
    }

    async fn update_one(
        &self,
        namespace: &Namespace,
        filter: &Document,
        update: &Document,
        upsert: bool,
    ) -> StoreResult<UpdateOutcome> {
        let collection = self.collection(namespace);
        let filter = to_bson(filter)?;
        let result = match update_body(update)? {
            UpdateBody::Modifiers(modifiers) => {
                let options = UpdateOptions::builder().upsert(upsert).build();
                collection.update_one(filter, modifiers, options).await
            }
            UpdateBody::Replacement(replacement) => {
                let options = ReplaceOptions::builder().upsert(upsert).build();
                collection.replace_one(filter, replacement, options).await
            }
        }
        .map_err(|e| map_driver_error(namespace, e))?;

        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
            upserted: result.upserted_id.is_some(),
        })
    }

    async fn delete_one(&self, namespace: &Namespace, filter: &Document) -> StoreResult<u64> {
        let result = self
            .collection(namespace)
            .delete_one(to_bson(filter)?, None)
            .await
            .map_err(|e| map_driver_error(namespace, e))?;
        Ok(result.deleted_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(value: Value) -> Document {
        to_document(value).unwrap()
    }

    #[test]
    fn test_operator_updates_use_modifiers() {
        let body = update_body(&document(json!({"$set": {"name": "Mocky Mockery"}}))).unwrap();
        assert_eq!(
            body,
            UpdateBody::Modifiers(doc! { "$set": { "name": "Mocky Mockery" } })
        );
    }

    #[test]
    fn test_plain_documents_are_replacements() {
        let body = update_body(&document(json!({"email": "test@gmail.com", "name": "x"}))).unwrap();
        assert_eq!(
            body,
            UpdateBody::Replacement(doc! { "email": "test@gmail.com", "name": "x" })
        );
    }

    #[test]
    fn test_index_keys_are_ascending() {
        assert_eq!(index_keys("filename"), doc! { "filename": 1 });
    }
}
