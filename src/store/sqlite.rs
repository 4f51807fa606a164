//! SQLite document store.
//!
//! Documents live in a single `documents` table keyed by
//! `(collection, id)`, with the JSON object in `body` and a `version`
//! counter. Writes are compare-and-swap on `version`: a write that races
//! another one affects no row, re-reads and tries again. That makes
//! [`DocumentStore::merge_if`] a conditional `UPDATE` without holding a
//! transaction open across the comparison.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use super::{generate_id, merge_into, Document, DocumentStore, StoreError};

const MAX_CONNECTIONS: u32 = 5;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_WRITE_ATTEMPTS: usize = 16;

/// [`DocumentStore`] backed by SQLite through `sqlx`.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `url` and runs migrations.
    ///
    /// `url` is a `sqlite:` URL such as `sqlite://data/snapify.db`, or
    /// `sqlite::memory:` for a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the URL is invalid or the database
    /// cannot be opened, [`StoreError::Migration`] if the schema cannot be
    /// applied.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);
        let options = if in_memory {
            options
        } else {
            options.journal_mode(SqliteJournalMode::Wal)
        };

        // An in-memory database lives as long as its single connection
        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(MAX_CONNECTIONS)
                .connect_with(options)
                .await?
        };

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::debug!(in_memory, "SQLite document store ready");

        Ok(Self { pool })
    }

    async fn load(&self, collection: &str, id: &str) -> Result<Option<(Document, i64)>, StoreError> {
        let row = sqlx::query("SELECT body, version FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| -> Result<(Document, i64), StoreError> {
            let body: String = row.try_get("body")?;
            let version: i64 = row.try_get("version")?;
            Ok((serde_json::from_str(&body)?, version))
        })
        .transpose()
    }

    /// Applies `change` to the stored document.
    ///
    /// `change` gets the current document (if any) and returns the new one,
    /// or `None` to leave it untouched. Returns whether a write happened.
    async fn modify<F>(&self, collection: &str, id: &str, mut change: F) -> Result<bool, StoreError>
    where
        F: FnMut(Option<&Document>) -> Result<Option<Document>, StoreError> + Send,
    {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let current = self.load(collection, id).await?;
            let Some(next) = change(current.as_ref().map(|(doc, _)| doc))? else {
                return Ok(false);
            };
            let body = serde_json::to_string(&next)?;

            let written = match current {
                Some((_, version)) => sqlx::query(
                    "UPDATE documents SET body = ?, version = version + 1
                     WHERE collection = ? AND id = ? AND version = ?",
                )
                .bind(body.as_str())
                .bind(collection)
                .bind(id)
                .bind(version)
                .execute(&self.pool)
                .await?
                .rows_affected(),
                None => sqlx::query(
                    "INSERT INTO documents (collection, id, body) VALUES (?, ?, ?)
                     ON CONFLICT (collection, id) DO NOTHING",
                )
                .bind(collection)
                .bind(id)
                .bind(body.as_str())
                .execute(&self.pool)
                .await?
                .rows_affected(),
            };
            if written == 1 {
                return Ok(true);
            }
            tracing::debug!(collection, id, "Concurrent write detected, retrying");
        }

        Err(StoreError::Contention {
            collection: collection.to_string(),
            id: id.to_string(),
        })
    }
}

fn merged(current: Option<&Document>, fields: &Document) -> Document {
    let mut doc = current.cloned().unwrap_or_default();
    merge_into(&mut doc, fields.clone());
    doc
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self.load(collection, id).await?.map(|(doc, _)| doc))
    }

    async fn merge_set(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
    ) -> Result<(), StoreError> {
        self.modify(collection, id, |current| Ok(Some(merged(current, &fields))))
            .await?;
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Document) -> Result<(), StoreError> {
        self.modify(collection, id, |current| match current {
            Some(doc) => Ok(Some(merged(Some(doc), &fields))),
            None => Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            }),
        })
        .await?;
        Ok(())
    }

    async fn merge_if(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        expected: &Value,
        fields: Document,
    ) -> Result<bool, StoreError> {
        self.modify(collection, id, |current| {
            let value = current.and_then(|doc| doc.get(field)).unwrap_or(&Value::Null);
            if value == expected {
                Ok(Some(merged(current, &fields)))
            } else {
                Ok(None)
            }
        })
        .await
    }

    async fn add(&self, collection: &str, fields: Document) -> Result<String, StoreError> {
        let mut doc = Document::new();
        merge_into(&mut doc, fields);
        let body = serde_json::to_string(&doc)?;

        for _ in 0..MAX_WRITE_ATTEMPTS {
            let id = generate_id();
            let written = sqlx::query(
                "INSERT INTO documents (collection, id, body) VALUES (?, ?, ?)
                 ON CONFLICT (collection, id) DO NOTHING",
            )
            .bind(collection)
            .bind(id.as_str())
            .bind(body.as_str())
            .execute(&self.pool)
            .await?
            .rows_affected();
            if written == 1 {
                return Ok(id);
            }
        }

        Err(StoreError::Contention {
            collection: collection.to_string(),
            id: "<generated>".to_string(),
        })
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError> {
        let rows = sqlx::query("SELECT id, body FROM documents WHERE collection = ? ORDER BY id")
            .bind(collection)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<(String, Document), StoreError> {
                let id: String = row.try_get("id")?;
                let body: String = row.try_get("body")?;
                Ok((id, serde_json::from_str(&body)?))
            })
            .collect()
    }
}
