//! In-process document store.
//!
//! Mirrors the document-database semantics the engine relies on: implicit
//! collection creation on first write, unique single-field indexes (a missing
//! field indexes as `null`), and `$jsonSchema` validators limited to
//! `required` and `properties.*.bsonType`.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::backend::{CollectionOptions, DocumentStore, Namespace, UpdateOutcome};
use crate::document::{self, Document};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone, Default)]
struct SchemaValidator {
    required: Vec<String>,
    types: Vec<(String, Vec<String>)>,
}

impl SchemaValidator {
    fn parse(validator: &Value) -> StoreResult<Self> {
        let schema = validator.get("$jsonSchema").unwrap_or(validator);
        if !schema.is_object() {
            return Err(StoreError::serialization("validator must be a JSON object"));
        }

        let required = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let mut types = Vec::new();
        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            for (field, property) in properties {
                let expected: Vec<String> = match property.get("bsonType") {
                    Some(Value::String(name)) => vec![name.clone()],
                    Some(Value::Array(names)) => names
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect(),
                    _ => continue,
                };
                types.push((field.clone(), expected));
            }
        }

        Ok(Self { required, types })
    }

    fn check(&self, document: &Document) -> Result<(), String> {
        for field in &self.required {
            if !document.contains_key(field) {
                return Err(format!("missing required field '{}'", field));
            }
        }

        for (field, expected) in &self.types {
            if let Some(value) = document.get(field) {
                if !expected.iter().any(|name| bson_type_matches(name, value)) {
                    return Err(format!(
                        "field '{}' is {}, expected {}",
                        field,
                        document::type_name(value),
                        expected.join(" or ")
                    ));
                }
            }
        }

        Ok(())
    }
}

fn bson_type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "int" | "long" => value.is_i64() || value.is_u64(),
        "double" | "decimal" | "number" => value.is_number(),
        "bool" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

#[derive(Debug, Clone, Default)]
struct MemoryCollection {
    documents: Vec<Document>,
    unique_fields: Vec<String>,
    validator: Option<SchemaValidator>,
}

impl MemoryCollection {
    fn validate(&self, namespace: &Namespace, candidate: &Document) -> StoreResult<()> {
        if let Some(validator) = &self.validator {
            validator
                .check(candidate)
                .map_err(|message| StoreError::Validation {
                    namespace: namespace.to_string(),
                    message,
                })?;
        }
        Ok(())
    }

    /// Reject `candidate` if it collides on any unique field, ignoring the document at `skip`
    fn check_unique(&self, namespace: &Namespace, candidate: &Document, skip: Option<usize>) -> StoreResult<()> {
        for field in &self.unique_fields {
            let value = candidate.get(field).unwrap_or(&Value::Null);
            let collides = self
                .documents
                .iter()
                .enumerate()
                .filter(|(index, _)| Some(*index) != skip)
                .any(|(_, other)| other.get(field).unwrap_or(&Value::Null) == value);

            if collides {
                return Err(StoreError::DuplicateKey {
                    namespace: namespace.to_string(),
                    field: field.clone(),
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }

    fn add_unique_field(&mut self, namespace: &Namespace, field: &str) -> StoreResult<()> {
        if self.unique_fields.iter().any(|existing| existing == field) {
            return Ok(());
        }

        let mut seen = Vec::with_capacity(self.documents.len());
        for doc in &self.documents {
            let value = doc.get(field).unwrap_or(&Value::Null);
            if seen.contains(&value) {
                return Err(StoreError::DuplicateKey {
                    namespace: namespace.to_string(),
                    field: field.to_string(),
                    value: value.to_string(),
                });
            }
            seen.push(value);
        }

        self.unique_fields.push(field.to_string());
        Ok(())
    }
}

/// Document store held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    databases: Mutex<HashMap<String, BTreeMap<String, MemoryCollection>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every document in a collection
    pub fn documents(&self, namespace: &Namespace) -> Vec<Document> {
        let databases = self.databases.lock();
        databases
            .get(&namespace.database)
            .and_then(|collections| collections.get(&namespace.collection))
            .map(|collection| collection.documents.clone())
            .unwrap_or_default()
    }

    pub fn has_collection(&self, namespace: &Namespace) -> bool {
        let databases = self.databases.lock();
        databases
            .get(&namespace.database)
            .map_or(false, |collections| collections.contains_key(&namespace.collection))
    }

    /// Unique fields indexed on a collection
    pub fn unique_fields(&self, namespace: &Namespace) -> Vec<String> {
        let databases = self.databases.lock();
        databases
            .get(&namespace.database)
            .and_then(|collections| collections.get(&namespace.collection))
            .map(|collection| collection.unique_fields.clone())
            .unwrap_or_default()
    }

    fn with_collection<R>(
        &self,
        namespace: &Namespace,
        f: impl FnOnce(&mut MemoryCollection) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let mut databases = self.databases.lock();
        let collection = databases
            .entry(namespace.database.clone())
            .or_default()
            .entry(namespace.collection.clone())
            .or_default();
        f(collection)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_collection_names(&self, database: &str) -> StoreResult<Vec<String>> {
        let databases = self.databases.lock();
        Ok(databases
            .get(database)
            .map(|collections| collections.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn create_collection(&self, namespace: &Namespace, options: CollectionOptions) -> StoreResult<()> {
        let validator = options
            .validator
            .as_ref()
            .map(SchemaValidator::parse)
            .transpose()?;

        let mut databases = self.databases.lock();
        let collections = databases.entry(namespace.database.clone()).or_default();
        if collections.contains_key(&namespace.collection) {
            return Err(StoreError::CollectionExists {
                namespace: namespace.to_string(),
            });
        }

        let mut collection = MemoryCollection {
            validator,
            ..MemoryCollection::default()
        };
        if let Some(field) = &options.unique_index {
            collection.add_unique_field(namespace, field)?;
        }
        collections.insert(namespace.collection.clone(), collection);

        tracing::trace!(namespace = %namespace, "created collection");
        Ok(())
    }

    async fn create_index(&self, namespace: &Namespace, field: &str, unique: bool) -> StoreResult<()> {
        self.with_collection(namespace, |collection| {
            if unique {
                collection.add_unique_field(namespace, field)?;
            }
            Ok(())
        })
    }

    async fn drop_collection(&self, namespace: &Namespace) -> StoreResult<bool> {
        let mut databases = self.databases.lock();
        Ok(databases
            .get_mut(&namespace.database)
            .and_then(|collections| collections.remove(&namespace.collection))
            .is_some())
    }

    async fn find_one(&self, namespace: &Namespace, filter: &Document) -> StoreResult<Option<Document>> {
        let databases = self.databases.lock();
        Ok(databases
            .get(&namespace.database)
            .and_then(|collections| collections.get(&namespace.collection))
            .and_then(|collection| {
                collection
                    .documents
                    .iter()
                    .find(|doc| document::matches(doc, filter))
                    .cloned()
            }))
    }

    async fn insert_one(&self, namespace: &Namespace, document: Document) -> StoreResult<()> {
        self.with_collection(namespace, |collection| {
            collection.validate(namespace, &document)?;
            collection.check_unique(namespace, &document, None)?;
            collection.documents.push(document);
            Ok(())
        })
    }

    async fn update_one(
        &self,
        namespace: &Namespace,
        filter: &Document,
        update: &Document,
        upsert: bool,
    ) -> StoreResult<UpdateOutcome> {
        self.with_collection(namespace, |collection| {
            let position = collection
                .documents
                .iter()
                .position(|doc| document::matches(doc, filter));

            match position {
                Some(index) => {
                    let mut updated = collection.documents[index].clone();
                    document::apply_update(&mut updated, update)?;
                    collection.validate(namespace, &updated)?;
                    collection.check_unique(namespace, &updated, Some(index))?;

                    let modified = updated != collection.documents[index];
                    collection.documents[index] = updated;
                    Ok(UpdateOutcome {
                        matched: 1,
                        modified: u64::from(modified),
                        upserted: false,
                    })
                }
                None if upsert => {
                    let mut created = if document::is_operator_update(update) {
                        document::upsert_seed(filter)
                    } else {
                        Document::new()
                    };
                    document::apply_update(&mut created, update)?;
                    collection.validate(namespace, &created)?;
                    collection.check_unique(namespace, &created, None)?;
                    collection.documents.push(created);
                    Ok(UpdateOutcome {
                        matched: 0,
                        modified: 0,
                        upserted: true,
                    })
                }
                None => Ok(UpdateOutcome::default()),
            }
        })
    }

    async fn delete_one(&self, namespace: &Namespace, filter: &Document) -> StoreResult<u64> {
        let mut databases = self.databases.lock();
        let Some(collection) = databases
            .get_mut(&namespace.database)
            .and_then(|collections| collections.get_mut(&namespace.collection))
        else {
            return Ok(0);
        };

        match collection
            .documents
            .iter()
            .position(|doc| document::matches(doc, filter))
        {
            Some(index) => {
                collection.documents.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }
}
