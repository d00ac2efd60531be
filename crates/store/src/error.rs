use thiserror::Error;

/// Result type for document store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by a [`crate::DocumentStore`]
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection error: {message}")]
    Connection { message: String },

    #[error("Duplicate key in {namespace}: {field} = {value}")]
    DuplicateKey {
        namespace: String,
        field: String,
        value: String,
    },

    #[error("Collection already exists: {namespace}")]
    CollectionExists { namespace: String },

    #[error("Document failed validation for {namespace}: {message}")]
    Validation { namespace: String, message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Backend error: {message}")]
    Backend { message: String },
}

impl StoreError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Whether this error is a uniqueness-constraint violation
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, StoreError::DuplicateKey { .. })
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::serialization(err.to_string())
    }
}
