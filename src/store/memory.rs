//! In-memory document store.
//!
//! Uses `DashMap` for concurrent access. Every write goes through the map's
//! entry API, so the shard lock covers the read-compare-write of
//! [`DocumentStore::merge_if`].
//!
//! Data is lost on restart and is not shared between processes. Use
//! [`super::SqliteStore`] when records must survive a restart.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;

use super::{generate_id, merge_into, Document, DocumentStore, StoreError};

#[derive(Debug, Default)]
struct Collection {
    docs: DashMap<String, Document>,
    /// Ids created by `add`, oldest first. Only kept for capped collections.
    added: Mutex<VecDeque<String>>,
    max_documents: Option<usize>,
}

/// In-memory [`DocumentStore`].
#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<DashMap<String, Arc<Collection>>>,
    limits: Arc<DashMap<String, usize>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the number of documents [`DocumentStore::add`] keeps in
    /// `collection`. The oldest added document is dropped first.
    ///
    /// Must be set before the collection is first used.
    #[must_use]
    pub fn with_max_documents(self, collection: impl Into<String>, max: usize) -> Self {
        self.limits.insert(collection.into(), max.max(1));
        self
    }

    fn collection(&self, name: &str) -> Arc<Collection> {
        let collection = self
            .collections
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(Collection {
                    max_documents: self.limits.get(name).map(|max| *max),
                    ..Collection::default()
                })
            });
        Arc::clone(collection.value())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("collections", &self.collections.len())
            .finish()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self.collection(collection).docs.get(id).map(|d| d.clone()))
    }

    async fn merge_set(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
    ) -> Result<(), StoreError> {
        let docs = self.collection(collection);
        let mut entry = docs.docs.entry(id.to_string()).or_default();
        merge_into(entry.value_mut(), fields);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Document) -> Result<(), StoreError> {
        let docs = self.collection(collection);
        let result = match docs.docs.entry(id.to_string()) {
            Entry::Occupied(mut entry) => {
                merge_into(entry.get_mut(), fields);
                Ok(())
            }
            Entry::Vacant(_) => Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            }),
        };
        result
    }

    async fn merge_if(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        expected: &Value,
        fields: Document,
    ) -> Result<bool, StoreError> {
        let docs = self.collection(collection);
        let wrote = match docs.docs.entry(id.to_string()) {
            Entry::Occupied(mut entry) => {
                let current = entry.get().get(field).unwrap_or(&Value::Null);
                if current == expected {
                    merge_into(entry.get_mut(), fields);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(entry) => {
                if expected.is_null() {
                    let mut doc = Document::new();
                    merge_into(&mut doc, fields);
                    entry.insert(doc);
                    true
                } else {
                    false
                }
            }
        };
        Ok(wrote)
    }

    async fn add(&self, collection: &str, fields: Document) -> Result<String, StoreError> {
        let docs = self.collection(collection);
        let id = loop {
            let id = generate_id();
            if let Entry::Vacant(entry) = docs.docs.entry(id.clone()) {
                let mut doc = Document::new();
                merge_into(&mut doc, fields);
                entry.insert(doc);
                break id;
            }
        };

        if let Some(max) = docs.max_documents {
            let mut added = docs.added.lock();
            added.push_back(id.clone());
            while added.len() > max {
                if let Some(oldest) = added.pop_front() {
                    docs.docs.remove(&oldest);
                }
            }
        }
        Ok(id)
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError> {
        let mut docs: Vec<(String, Document)> = self
            .collection(collection)
            .docs
            .iter()
            .map(|d| (d.key().clone(), d.value().clone()))
            .collect();
        docs.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        Ok(docs)
    }
}
