//! Mastodon publish target
//!
//! Authenticates with the static access token from configuration. Images
//! are downloaded from their resolved URLs and re-uploaded through the
//! media endpoint before the status is created.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{CrosscastError, Result};
use crate::targets::{compose_text, fetch_image, read_success_json, TargetAdapter};
use crate::types::{NormalizedPost, PublishOutcome, Target};

pub struct MastodonTarget {
    instance_url: String,
    access_token: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct MediaResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    id: String,
    url: Option<String>,
}

impl MastodonTarget {
    pub fn new(instance: &str, access_token: &str, http: reqwest::Client) -> Self {
        let instance_url = if instance.starts_with("http://") || instance.starts_with("https://") {
            instance.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", instance.trim_end_matches('/'))
        };
        Self {
            instance_url,
            access_token: access_token.to_string(),
            http,
        }
    }

    pub fn instance_url(&self) -> &str {
        &self.instance_url
    }

    async fn upload_media(&self, url: &str, alt_text: Option<&str>) -> Result<String> {
        let (bytes, mime) = fetch_image("mastodon", &self.http, url).await?;

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name("image")
            .mime_str(&mime)
            .map_err(|e| CrosscastError::caught("mastodon", e))?;
        let mut form = reqwest::multipart::Form::new().part("file", part);
        if let Some(alt) = alt_text {
            form = form.text("description", alt.to_string());
        }

        let response = self
            .http
            .post(format!("{}/api/v2/media", self.instance_url))
            .bearer_auth(&self.access_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| CrosscastError::caught("mastodon", e))?;

        let body = read_success_json("mastodon", response).await?;
        let media: MediaResponse =
            serde_json::from_value(body).map_err(|e| CrosscastError::caught("mastodon", e))?;
        Ok(media.id)
    }
}

#[async_trait]
impl TargetAdapter for MastodonTarget {
    fn name(&self) -> &str {
        "mastodon"
    }

    fn character_limit(&self) -> Option<usize> {
        Target::Mastodon.character_limit()
    }

    async fn create_post(&self, post: &NormalizedPost) -> Result<PublishOutcome> {
        let mut media_ids = Vec::with_capacity(post.images.len());
        for image in &post.images {
            media_ids
                .push(self.upload_media(&image.url, image.alt_text.as_deref()).await?);
        }

        let mut body = serde_json::json!({ "status": compose_text(post) });
        if let Some(language) = &post.language {
            body["language"] = serde_json::Value::String(language.clone());
        }
        if !media_ids.is_empty() {
            body["media_ids"] = serde_json::json!(media_ids);
        }

        let response = self
            .http
            .post(format!("{}/api/v1/statuses", self.instance_url))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| CrosscastError::caught("mastodon", e))?;

        let body = read_success_json("mastodon", response).await?;
        let status: StatusResponse =
            serde_json::from_value(body).map_err(|e| CrosscastError::caught("mastodon", e))?;

        debug!(id = %status.id, "mastodon status created");
        Ok(PublishOutcome::Mastodon {
            id: status.id,
            url: status.url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_hostname_gets_https_scheme() {
        let target = MastodonTarget::new("fosstodon.org", "tok", reqwest::Client::new());
        assert_eq!(target.instance_url(), "https://fosstodon.org");
    }

    #[test]
    fn test_explicit_scheme_and_trailing_slash_preserved() {
        let target =
            MastodonTarget::new("https://mastodon.social/", "tok", reqwest::Client::new());
        assert_eq!(target.instance_url(), "https://mastodon.social");
    }

    #[test]
    fn test_name_and_limit() {
        let target = MastodonTarget::new("mastodon.social", "tok", reqwest::Client::new());
        assert_eq!(target.name(), "mastodon");
        assert_eq!(target.character_limit(), Some(500));
    }
}
