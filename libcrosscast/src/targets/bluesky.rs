//! Bluesky publish target
//!
//! Talks to the atproto XRPC surface directly: a fresh session per post,
//! blob uploads for images, then a `app.bsky.feed.post` record.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

use crate::error::{CrosscastError, Result};
use crate::targets::{compose_text, fetch_image, read_success_json, TargetAdapter};
use crate::types::{NormalizedPost, PublishOutcome, ResolvedImage, Target};

pub const DEFAULT_SERVICE_URL: &str = "https://bsky.social";

pub struct BlueskyTarget {
    service_url: String,
    identifier: String,
    app_password: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Session {
    access_jwt: String,
    did: String,
}

#[derive(Debug, Deserialize)]
struct BlobResponse {
    blob: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RecordResponse {
    uri: String,
    cid: String,
}

impl BlueskyTarget {
    pub fn new(
        service_url: &str,
        identifier: &str,
        app_password: &str,
        http: reqwest::Client,
    ) -> Self {
        Self {
            service_url: service_url.trim_end_matches('/').to_string(),
            identifier: identifier.to_string(),
            app_password: app_password.to_string(),
            http,
        }
    }

    fn xrpc_url(&self, method: &str) -> String {
        format!("{}/xrpc/{}", self.service_url, method)
    }

    async fn create_session(&self) -> Result<Session> {
        let response = self
            .http
            .post(self.xrpc_url("com.atproto.server.createSession"))
            .json(&serde_json::json!({
                "identifier": self.identifier,
                "password": self.app_password,
            }))
            .send()
            .await
            .map_err(|e| CrosscastError::caught("bluesky", e))?;

        let body = read_success_json("bluesky", response).await?;
        serde_json::from_value(body).map_err(|e| CrosscastError::caught("bluesky", e))
    }

    async fn upload_blob(&self, session: &Session, image: &ResolvedImage) -> Result<serde_json::Value> {
        let (bytes, mime) = fetch_image("bluesky", &self.http, &image.url).await?;

        let response = self
            .http
            .post(self.xrpc_url("com.atproto.repo.uploadBlob"))
            .bearer_auth(&session.access_jwt)
            .header(reqwest::header::CONTENT_TYPE, mime)
            .body(bytes)
            .send()
            .await
            .map_err(|e| CrosscastError::caught("bluesky", e))?;

        let body = read_success_json("bluesky", response).await?;
        let blob: BlobResponse =
            serde_json::from_value(body).map_err(|e| CrosscastError::caught("bluesky", e))?;
        Ok(blob.blob)
    }
}

#[async_trait]
impl TargetAdapter for BlueskyTarget {
    fn name(&self) -> &str {
        "bluesky"
    }

    fn character_limit(&self) -> Option<usize> {
        Target::Bluesky.character_limit()
    }

    async fn create_post(&self, post: &NormalizedPost) -> Result<PublishOutcome> {
        let session = self.create_session().await?;

        let mut record = serde_json::json!({
            "$type": "app.bsky.feed.post",
            "text": compose_text(post),
            "createdAt": Utc::now().to_rfc3339(),
        });
        if let Some(language) = &post.language {
            record["langs"] = serde_json::json!([language]);
        }

        if !post.images.is_empty() {
            let mut embedded = Vec::with_capacity(post.images.len());
            for image in &post.images {
                let blob = self.upload_blob(&session, image).await?;
                embedded.push(serde_json::json!({
                    "image": blob,
                    "alt": image.alt_text.clone().unwrap_or_default(),
                }));
            }
            record["embed"] = serde_json::json!({
                "$type": "app.bsky.embed.images",
                "images": embedded,
            });
        }

        let response = self
            .http
            .post(self.xrpc_url("com.atproto.repo.createRecord"))
            .bearer_auth(&session.access_jwt)
            .json(&serde_json::json!({
                "repo": session.did,
                "collection": "app.bsky.feed.post",
                "record": record,
            }))
            .send()
            .await
            .map_err(|e| CrosscastError::caught("bluesky", e))?;

        let body = read_success_json("bluesky", response).await?;
        let created: RecordResponse =
            serde_json::from_value(body).map_err(|e| CrosscastError::caught("bluesky", e))?;

        debug!(uri = %created.uri, "bluesky record created");
        Ok(PublishOutcome::Bluesky {
            uri: created.uri,
            cid: created.cid,
        })
    }
}
