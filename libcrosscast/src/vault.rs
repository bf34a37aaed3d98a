//! Credential vault for Crosscast
//!
//! A read/write façade over [`DocumentStore`] restricted to per-provider
//! credential kinds. The OAuth flows are the only writers; the target
//! adapters only read. "No credential configured" is a first-class `None`,
//! not an error, so adapters can fail their precondition check without
//! touching the network.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CrosscastError, Result, StoreError};
use crate::store::DocumentStore;
use crate::types::{AuthStatus, Document, DocumentOrder, Tag};

/// Document kind (and fixed search key) for the Twitter OAuth1.0a bundle.
pub const TWITTER_TOKEN_KIND: &str = "twitter-oauth-token";
/// Document kind for the Threads OAuth2 bundle.
pub const THREADS_TOKEN_KIND: &str = "threads-oauth-token";
/// Document kind for the LinkedIn OAuth2 bundle.
pub const LINKEDIN_TOKEN_KIND: &str = "linkedin-oauth-token";

/// Tag namespace marking credential documents.
pub const KEY_TAG_KIND: &str = "key";

#[derive(Clone)]
pub struct CredentialVault {
    store: DocumentStore,
}

impl CredentialVault {
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    /// Store (or overwrite in place) the credential for a provider.
    ///
    /// The search key is the provider kind itself, so repeated writes keep
    /// the same document uuid. The credential is tagged
    /// `(name=<kind>, kind="key")` for lookup by purpose.
    pub async fn put<T: Serialize>(&self, kind: &str, secret: &T) -> Result<Document> {
        let payload = serde_json::to_string(secret)
            .map_err(|e| CrosscastError::Storage(StoreError::PayloadError(e)))?;
        let tags = [Tag::new(kind, KEY_TAG_KIND)];
        self.store
            .create_or_update(kind, &payload, Some(kind), &tags)
            .await
    }

    /// The most recent credential document for a provider, if any.
    pub async fn get(&self, kind: &str) -> Result<Option<Document>> {
        let mut documents = self.store.get_all(kind, DocumentOrder::CreatedAtDesc).await?;
        if documents.is_empty() {
            return Ok(None);
        }
        Ok(Some(documents.remove(0)))
    }

    /// Deserialize the stored secret bundle for a provider.
    pub async fn get_secret<T: DeserializeOwned>(&self, kind: &str) -> Result<Option<T>> {
        match self.get(kind).await? {
            Some(document) => {
                let secret = serde_json::from_str(&document.payload)
                    .map_err(|e| CrosscastError::Storage(StoreError::PayloadError(e)))?;
                Ok(Some(secret))
            }
            None => Ok(None),
        }
    }

    /// Whether a credential exists and when it was created, without
    /// exposing the secret material.
    pub async fn status(&self, kind: &str) -> Result<AuthStatus> {
        Ok(match self.get(kind).await? {
            Some(document) => AuthStatus {
                has_authorization: true,
                created_at: Some(document.created_at * 1000),
            },
            None => AuthStatus {
                has_authorization: false,
                created_at: None,
            },
        })
    }
}
