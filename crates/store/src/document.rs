//! Document model shared by every backend.
//!
//! Documents are JSON objects. Filters match on top-level field equality and
//! updates are either `$set`/`$unset` operator documents or full replacements.

use serde_json::Value;

use crate::error::{StoreError, StoreResult};

/// A single stored document
pub type Document = serde_json::Map<String, Value>;

/// Convert a JSON value into a [`Document`], rejecting non-objects
pub fn to_document(value: Value) -> StoreResult<Document> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::serialization(format!(
            "expected a JSON object, found {}",
            type_name(&other)
        ))),
    }
}

/// Whether `document` satisfies every equality clause in `filter`.
///
/// A `null` clause matches a missing field.
pub fn matches(document: &Document, filter: &Document) -> bool {
    filter.iter().all(|(field, expected)| match document.get(field) {
        Some(actual) => actual == expected,
        None => expected.is_null(),
    })
}

/// Whether `update` is an operator document (`{"$set": …}`) rather than a replacement
pub fn is_operator_update(update: &Document) -> bool {
    update.keys().any(|key| key.starts_with('$'))
}

/// Apply `update` to `document` in place
pub fn apply_update(document: &mut Document, update: &Document) -> StoreResult<()> {
    if !is_operator_update(update) {
        *document = update.clone();
        return Ok(());
    }

    for (operator, fields) in update {
        let fields = fields.as_object().ok_or_else(|| {
            StoreError::serialization(format!("operand of {} must be an object", operator))
        })?;

        match operator.as_str() {
            "$set" => {
                for (field, value) in fields {
                    document.insert(field.clone(), value.clone());
                }
            }
            "$unset" => {
                for field in fields.keys() {
                    document.remove(field);
                }
            }
            other => {
                return Err(StoreError::backend(format!(
                    "unsupported update operator '{}'",
                    other
                )))
            }
        }
    }

    Ok(())
}

/// Starting document for an upsert: the filter's plain equality fields
pub fn upsert_seed(filter: &Document) -> Document {
    filter
        .iter()
        .filter(|(field, _)| !field.starts_with('$'))
        .map(|(field, value)| (field.clone(), value.clone()))
        .collect()
}

/// JSON-schema style type name, as used by `bsonType`
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_i64() || n.is_u64() => "long",
        Value::Number(_) => "double",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
