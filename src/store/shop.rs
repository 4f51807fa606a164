//! Shop records and their repository.
//!
//! A [`ShopRecord`] is created by the first installation attempt and only
//! ever merged afterwards. Field names are stored in camelCase.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{Document, DocumentStore, StoreError};
use crate::auth::oauth::Nonce;
use crate::auth::{AccessToken, AccessTokenResponse};
use crate::config::ShopDomain;

/// Collection holding one record per shop.
pub const SHOPS_COLLECTION: &str = "shops";

/// Collection holding the mirrored products of `shop`.
#[must_use]
pub fn products_collection(shop: &ShopDomain) -> String {
    format!("{SHOPS_COLLECTION}/{shop}/products")
}

/// Persistent state of one shop.
///
/// `Debug` output never contains the access token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopRecord {
    /// Shop domain, also the document id.
    pub shop_domain: ShopDomain,
    /// Nonce of the installation in progress.
    #[serde(default)]
    pub pending_nonce: Option<String>,
    /// Base64 embedding context captured at initiation.
    #[serde(default)]
    pub host: Option<String>,
    /// Offline Admin API token.
    #[serde(default)]
    pub access_token: Option<AccessToken>,
    /// Scopes granted with the token.
    #[serde(default)]
    pub scopes: Option<String>,
    /// `true` once a token is stored.
    #[serde(default)]
    pub is_active: bool,
    /// First successful installation.
    #[serde(default)]
    pub installed_at: Option<DateTime<Utc>>,
    /// Last successful installation.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Last successful product sync.
    #[serde(default)]
    pub products_synced_at: Option<DateTime<Utc>>,
}

impl ShopRecord {
    /// Returns the access token of an active shop.
    #[must_use]
    pub fn active_token(&self) -> Option<&AccessToken> {
        self.access_token
            .as_ref()
            .filter(|token| self.is_active && !token.is_empty())
    }
}

fn timestamp(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn document(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}

/// Typed access to the `shops` collection and the documents under it.
#[derive(Clone)]
pub struct ShopRepository {
    store: Arc<dyn DocumentStore>,
}

impl ShopRepository {
    /// Creates a repository over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Loads the record of `shop`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails or the document is malformed.
    pub async fn get(&self, shop: &ShopDomain) -> Result<Option<ShopRecord>, StoreError> {
        self.store
            .get(SHOPS_COLLECTION, shop.as_ref())
            .await?
            .map(|doc| serde_json::from_value(Value::Object(doc)).map_err(StoreError::from))
            .transpose()
    }

    /// Stores the nonce and embedding context of a new installation attempt.
    ///
    /// Overwrites any previous pending nonce.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    pub async fn save_pending_nonce(
        &self,
        shop: &ShopDomain,
        nonce: &Nonce,
        host: &str,
    ) -> Result<(), StoreError> {
        let fields = document(json!({
            "shopDomain": shop.as_ref(),
            "pendingNonce": nonce.as_ref(),
            "host": host,
        }));
        self.store
            .merge_set(SHOPS_COLLECTION, shop.as_ref(), fields)
            .await
    }

    /// Clears the pending nonce if it still equals `nonce`.
    ///
    /// Returns `false` when another request consumed or replaced it first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    pub async fn consume_nonce(&self, shop: &ShopDomain, nonce: &Nonce) -> Result<bool, StoreError> {
        self.store
            .merge_if(
                SHOPS_COLLECTION,
                shop.as_ref(),
                "pendingNonce",
                &Value::String(nonce.as_ref().to_string()),
                document(json!({ "pendingNonce": null })),
            )
            .await
    }

    /// Persists a freshly exchanged token.
    ///
    /// `installedAt` is only written when it is not set yet.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a write fails.
    pub async fn store_access_token(
        &self,
        shop: &ShopDomain,
        token: &AccessTokenResponse,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let fields = document(json!({
            "shopDomain": shop.as_ref(),
            "accessToken": token.access_token,
            "scopes": token.scope,
            "isActive": true,
            "updatedAt": timestamp(now),
        }));
        self.store
            .merge_set(SHOPS_COLLECTION, shop.as_ref(), fields)
            .await?;

        let first_install = self
            .store
            .merge_if(
                SHOPS_COLLECTION,
                shop.as_ref(),
                "installedAt",
                &Value::Null,
                document(json!({ "installedAt": timestamp(now) })),
            )
            .await?;

        if first_install {
            tracing::info!(shop = %shop, "First installation recorded");
        }
        Ok(())
    }

    /// Stamps `productsSyncedAt` on an existing record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the shop has no record.
    pub async fn mark_products_synced(
        &self,
        shop: &ShopDomain,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.store
            .update(
                SHOPS_COLLECTION,
                shop.as_ref(),
                document(json!({ "productsSyncedAt": timestamp(now) })),
            )
            .await
    }

    /// Merges one product document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    pub async fn save_product(
        &self,
        shop: &ShopDomain,
        product_id: &str,
        product: Document,
    ) -> Result<(), StoreError> {
        self.store
            .merge_set(&products_collection(shop), product_id, product)
            .await
    }

    /// Lists the mirrored products of `shop`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    pub async fn list_products(
        &self,
        shop: &ShopDomain,
    ) -> Result<Vec<(String, Document)>, StoreError> {
        self.store.list(&products_collection(shop)).await
    }
}

impl std::fmt::Debug for ShopRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopRepository").finish_non_exhaustive()
    }
}
