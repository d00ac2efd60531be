//! # docmigrate-store
//!
//! The document database collaborator used by the migration engine: an async
//! [`DocumentStore`] trait, an in-process [`MemoryStore`], and a MongoDB
//! backend behind the `mongodb` feature.

pub mod backend;
pub mod document;
pub mod error;
pub mod memory;

#[cfg(feature = "mongodb")]
pub mod mongo;

pub use backend::{CollectionOptions, DocumentStore, Namespace, UpdateOutcome};
pub use document::{to_document, Document};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;

#[cfg(feature = "mongodb")]
pub use mongo::MongoStore;
