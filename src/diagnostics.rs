//! Durable diagnostic events.
//!
//! Failures of the install flow and the product mirror are recorded as
//! [`LogEvent`]s in addition to the process log, so they can be inspected
//! per shop after the fact. Appending never fails from the caller's point of
//! view; a sink that cannot write reports the problem through `tracing`.
//!
//! Events often carry request input, so every string in an event is clipped
//! to [`MAX_FIELD_LEN`] bytes.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::store::DocumentStore;

/// Collection that receives log events.
pub const LOGS_COLLECTION: &str = "logs";

/// Longest string stored in a [`LogEvent`], in bytes.
pub const MAX_FIELD_LEN: usize = 1024;

/// Point of the flow an event was emitted from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Install initiation without app credentials.
    AuthStartConfig,
    /// Install initiation could not persist the nonce.
    AuthStartStore,
    /// Callback without app credentials.
    CallbackConfig,
    /// Callback signature did not verify.
    CallbackHmacFailed,
    /// Callback `state` did not match the pending nonce.
    CallbackStateMismatch,
    /// Callback could not read or update the shop record.
    CallbackStoreRead,
    /// The authorization code exchange failed.
    CallbackTokenExchange,
    /// The token could not be persisted.
    CallbackStoreWrite,
    /// Product sync failed.
    ProductSync,
    /// Product listing failed.
    ProductList,
}

impl Stage {
    /// Returns the stored name of the stage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthStartConfig => "auth_start_config",
            Self::AuthStartStore => "auth_start_store",
            Self::CallbackConfig => "callback_config",
            Self::CallbackHmacFailed => "callback_hmac_failed",
            Self::CallbackStateMismatch => "callback_state_mismatch",
            Self::CallbackStoreRead => "callback_store_read",
            Self::CallbackTokenExchange => "callback_token_exchange",
            Self::CallbackStoreWrite => "callback_store_write",
            Self::ProductSync => "product_sync",
            Self::ProductList => "product_list",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a [`LogEvent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    /// Rejected request that may indicate tampering.
    Warn,
    /// Failure of the service or a collaborator.
    Error,
}

/// One diagnostic event.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LogEvent {
    /// When the event was created.
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Shop the event concerns, or `unknown`.
    pub shop: String,
    /// Emitting stage.
    pub stage: Stage,
    /// Severity.
    pub level: Level,
    /// Human-readable summary. Never contains secrets.
    pub message: String,
    /// Extra context such as an upstream response body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

fn serialize_timestamp<S>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

impl LogEvent {
    /// Creates an `ERROR` event stamped now.
    #[must_use]
    pub fn error(shop: impl Into<String>, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            shop: clip(shop.into()),
            stage,
            level: Level::Error,
            message: clip(message.into()),
            detail: None,
        }
    }

    /// Creates a `WARN` event stamped now.
    #[must_use]
    pub fn warn(shop: impl Into<String>, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            level: Level::Warn,
            ..Self::error(shop, stage, message)
        }
    }

    /// Attaches extra context.
    #[must_use]
    pub fn with_detail(mut self, mut detail: serde_json::Value) -> Self {
        clip_strings(&mut detail);
        self.detail = Some(detail);
        self
    }
}

fn clip(mut value: String) -> String {
    if value.len() > MAX_FIELD_LEN {
        let mut end = MAX_FIELD_LEN;
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        value.truncate(end);
    }
    value
}

fn clip_strings(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::String(s) => *s = clip(std::mem::take(s)),
        serde_json::Value::Array(items) => items.iter_mut().for_each(clip_strings),
        serde_json::Value::Object(fields) => fields.values_mut().for_each(clip_strings),
        _ => {}
    }
}

/// Destination for [`LogEvent`]s.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Records an event. Never fails.
    async fn append(&self, event: LogEvent);
}

/// [`LogSink`] that adds events to the `logs` collection.
#[derive(Clone)]
pub struct StoreLogSink {
    store: Arc<dyn DocumentStore>,
}

impl StoreLogSink {
    /// Creates a sink writing to `store`.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

impl std::fmt::Debug for StoreLogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreLogSink").finish_non_exhaustive()
    }
}

#[async_trait]
impl LogSink for StoreLogSink {
    async fn append(&self, event: LogEvent) {
        let fields = match serde_json::to_value(&event) {
            Ok(serde_json::Value::Object(fields)) => fields,
            Ok(_) => return,
            Err(e) => {
                tracing::error!(error = %e, stage = %event.stage, "Failed to encode log event");
                return;
            }
        };

        if let Err(e) = self.store.add(LOGS_COLLECTION, fields).await {
            tracing::error!(
                error = %e,
                shop = %event.shop,
                stage = %event.stage,
                message = %event.message,
                "Failed to write log event"
            );
        }
    }
}
