//! Document storage.
//!
//! The service keeps its state in a schemaless document store organised as
//! collections of JSON objects keyed by id:
//!
//! - `shops`: one [`ShopRecord`] per installed shop, keyed by shop domain
//! - `shops/{shop}/products`: mirrored product nodes
//! - `logs`: diagnostic events (see [`crate::diagnostics`])
//!
//! [`DocumentStore`] is the backend seam. [`SqliteStore`] keeps documents in
//! a SQLite database and is what the binary uses when `DATABASE_URL` is set;
//! [`MemoryStore`] is the in-process implementation. [`ShopRepository`]
//! layers the typed shop operations on top of any backend.

mod memory;
mod shop;
mod sqlite;

pub use memory::MemoryStore;
pub use shop::{products_collection, ShopRecord, ShopRepository, SHOPS_COLLECTION};
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{Map, Value};
use thiserror::Error;

const GENERATED_ID_LEN: usize = 20;

/// A stored document: a JSON object.
pub type Document = Map<String, Value>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The document does not exist.
    #[error("Document {collection}/{id} not found")]
    NotFound {
        /// Collection path.
        collection: String,
        /// Document id.
        id: String,
    },

    /// A document could not be converted to or from its typed form.
    #[error("Invalid document: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Concurrent writers kept changing the document.
    #[error("Too many concurrent writes to {collection}/{id}")]
    Contention {
        /// Collection path.
        collection: String,
        /// Document id.
        id: String,
    },

    /// The database rejected a query or could not be reached.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The database schema could not be applied.
    #[error("Database migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The backend failed.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Schemaless document store.
///
/// Writes are merges: fields present in the update replace the stored ones
/// and a `null` value removes the field. Each call is atomic per document.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads one document.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Merges `fields` into the document, creating it if absent.
    async fn merge_set(&self, collection: &str, id: &str, fields: Document)
        -> Result<(), StoreError>;

    /// Merges `fields` into an existing document.
    ///
    /// Fails with [`StoreError::NotFound`] when the document is absent.
    async fn update(&self, collection: &str, id: &str, fields: Document) -> Result<(), StoreError>;

    /// Merges `fields` only if `field` currently equals `expected`.
    ///
    /// An absent document or field compares as `null`. Returns whether the
    /// write happened. Comparison and write are one atomic step.
    async fn merge_if(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        expected: &Value,
        fields: Document,
    ) -> Result<bool, StoreError>;

    /// Adds a document under a generated id and returns the id.
    async fn add(&self, collection: &str, fields: Document) -> Result<String, StoreError>;

    /// Lists every document of a collection, ordered by id.
    async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError>;
}

/// Random id for [`DocumentStore::add`].
pub(crate) fn generate_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_ID_LEN)
        .map(char::from)
        .collect()
}

/// Applies merge semantics: `null` removes a field, anything else replaces it.
pub(crate) fn merge_into(target: &mut Document, fields: Document) {
    for (key, value) in fields {
        if value.is_null() {
            target.remove(&key);
        } else {
            target.insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_merge_into_replaces_and_removes() {
        let mut target = doc(json!({"a": 1, "b": 2, "c": 3}));
        merge_into(&mut target, doc(json!({"a": 10, "b": null, "d": 4})));
        assert_eq!(Value::Object(target), json!({"a": 10, "c": 3, "d": 4}));
    }

    #[test]
    fn test_store_error_messages() {
        let error = StoreError::NotFound {
            collection: "shops".to_string(),
            id: "foo.myshopify.com".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Document shops/foo.myshopify.com not found"
        );
    }
}
