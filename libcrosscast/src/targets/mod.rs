//! Publish target adapters
//!
//! One adapter per destination, each exposing the same `create_post`
//! capability. Adapters check their own preconditions (credential present)
//! before any network call, and convert every non-2xx upstream response and
//! every transport failure into a typed error carrying the module name, so
//! the orchestrator can aggregate coherent per-target results.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{CrosscastError, Result};
use crate::types::{NormalizedPost, PublishOutcome};

pub mod bluesky;
pub mod feed;
pub mod linkedin;
pub mod mastodon;
pub mod mock;
pub mod threads;
pub mod twitter;

/// Per-upstream-call timeout. Nothing in the fan-out waits forever.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Uniform publish capability of every destination.
#[async_trait]
pub trait TargetAdapter: Send + Sync {
    /// Module name used in outcomes and error aggregation.
    fn name(&self) -> &str;

    /// Platform character ceiling, `None` for the local feed.
    fn character_limit(&self) -> Option<usize>;

    /// Publish one normalized post and return the platform identifiers.
    async fn create_post(&self, post: &NormalizedPost) -> Result<PublishOutcome>;
}

/// Shared HTTP client for adapters and OAuth flows.
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(UPSTREAM_TIMEOUT)
        .build()
        .map_err(|e| CrosscastError::caught("http", e))
}

/// Text actually sent to a platform: content plus the optional link,
/// separated by a blank line (the two separator characters of the budget).
pub fn compose_text(post: &NormalizedPost) -> String {
    match &post.link {
        Some(link) => format!("{}\n\n{}", post.text, link),
        None => post.text.clone(),
    }
}

/// Read the body and fail with the upstream status unless it was a 2xx.
pub(crate) async fn read_success_body(
    module: &str,
    response: reqwest::Response,
) -> Result<String> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| CrosscastError::caught(module, e))?;
    if !status.is_success() {
        return Err(CrosscastError::Request {
            module: module.to_string(),
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

/// Like [`read_success_body`] but parses the body as JSON.
pub(crate) async fn read_success_json(
    module: &str,
    response: reqwest::Response,
) -> Result<serde_json::Value> {
    let body = read_success_body(module, response).await?;
    serde_json::from_str(&body).map_err(|e| CrosscastError::caught(module, e))
}

/// Download an already-resolved image URL, returning bytes and MIME type.
pub(crate) async fn fetch_image(
    module: &str,
    http: &reqwest::Client,
    url: &str,
) -> Result<(Vec<u8>, String)> {
    let response = http
        .get(url)
        .send()
        .await
        .map_err(|e| CrosscastError::caught(module, e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CrosscastError::Request {
            module: module.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    let mime = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("image/jpeg")
        .to_string();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| CrosscastError::caught(module, e))?;

    Ok((bytes.to_vec(), mime))
}
