//! LinkedIn publish target
//!
//! Creates a UGC share as the authorized member, using the OAuth2
//! credential stored by the authorization flow. The credential must carry
//! the member id captured during the token exchange.

use async_trait::async_trait;
use tracing::debug;

use crate::error::{CrosscastError, Result};
use crate::oauth::OAuth2Credential;
use crate::targets::{read_success_body, TargetAdapter};
use crate::types::{NormalizedPost, PublishOutcome, Target};
use crate::vault::{CredentialVault, LINKEDIN_TOKEN_KIND};

const UGC_POSTS_URL: &str = "https://api.linkedin.com/v2/ugcPosts";

pub struct LinkedinTarget {
    vault: CredentialVault,
    http: reqwest::Client,
    ugc_posts_url: String,
}

impl LinkedinTarget {
    pub fn new(vault: CredentialVault, http: reqwest::Client) -> Self {
        Self {
            vault,
            http,
            ugc_posts_url: UGC_POSTS_URL.to_string(),
        }
    }

    async fn credential(&self) -> Result<(OAuth2Credential, String)> {
        let credential = self
            .vault
            .get_secret::<OAuth2Credential>(LINKEDIN_TOKEN_KIND)
            .await?
            .ok_or_else(|| {
                CrosscastError::Unauthorized(
                    "no linkedin credential stored; complete the authorization flow first"
                        .to_string(),
                )
            })?;
        let user_id = credential.user_id.clone().ok_or_else(|| {
            CrosscastError::Unauthorized(
                "linkedin credential is missing the member id; re-authorize".to_string(),
            )
        })?;
        Ok((credential, user_id))
    }

    fn share_body(post: &NormalizedPost, author: &str) -> serde_json::Value {
        let mut share_content = serde_json::json!({
            "shareCommentary": { "text": post.text },
            "shareMediaCategory": "NONE",
        });
        if let Some(link) = &post.link {
            share_content["shareMediaCategory"] = serde_json::json!("ARTICLE");
            share_content["media"] = serde_json::json!([{
                "status": "READY",
                "originalUrl": link,
            }]);
        }

        serde_json::json!({
            "author": author,
            "lifecycleState": "PUBLISHED",
            "specificContent": {
                "com.linkedin.ugc.ShareContent": share_content,
            },
            "visibility": {
                "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC",
            },
        })
    }
}

#[async_trait]
impl TargetAdapter for LinkedinTarget {
    fn name(&self) -> &str {
        "linkedin"
    }

    fn character_limit(&self) -> Option<usize> {
        Target::Linkedin.character_limit()
    }

    async fn create_post(&self, post: &NormalizedPost) -> Result<PublishOutcome> {
        let (credential, user_id) = self.credential().await?;
        let author = format!("urn:li:person:{user_id}");

        let response = self
            .http
            .post(&self.ugc_posts_url)
            .bearer_auth(&credential.access_token)
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(&Self::share_body(post, &author))
            .send()
            .await
            .map_err(|e| CrosscastError::caught("linkedin", e))?;

        // The share id comes back in the X-RestLi-Id header; the body also
        // repeats it under "id".
        let header_id = response
            .headers()
            .get("x-restli-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let body = read_success_body("linkedin", response).await?;
        let id = match header_id {
            Some(id) => id,
            None => serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v["id"].as_str().map(String::from))
                .ok_or_else(|| {
                    CrosscastError::caught("linkedin", "share created but no id returned")
                })?,
        };

        debug!(id = %id, "linkedin share created");
        Ok(PublishOutcome::Linkedin { id })
    }
}
