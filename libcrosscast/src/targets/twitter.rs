//! Twitter publish target
//!
//! Posts through the v2 tweet endpoint, signed per-request with the
//! OAuth1.0a user credential stored by the authorization flow.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{CrosscastError, Result};
use crate::oauth::{OAuth1Signer, TwitterCredential};
use crate::targets::{compose_text, read_success_json, TargetAdapter};
use crate::types::{NormalizedPost, PublishOutcome, Target};
use crate::vault::{CredentialVault, TWITTER_TOKEN_KIND};

const TWEETS_URL: &str = "https://api.twitter.com/2/tweets";

pub struct TwitterTarget {
    signer: OAuth1Signer,
    vault: CredentialVault,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TweetResponse {
    data: TweetData,
}

#[derive(Debug, Deserialize)]
struct TweetData {
    id: String,
}

impl TwitterTarget {
    pub fn new(signer: OAuth1Signer, vault: CredentialVault, http: reqwest::Client) -> Self {
        Self {
            signer,
            vault,
            http,
        }
    }

    async fn credential(&self) -> Result<TwitterCredential> {
        self.vault
            .get_secret::<TwitterCredential>(TWITTER_TOKEN_KIND)
            .await?
            .ok_or_else(|| {
                CrosscastError::Unauthorized(
                    "no twitter credential stored; complete the authorization flow first"
                        .to_string(),
                )
            })
    }
}

#[async_trait]
impl TargetAdapter for TwitterTarget {
    fn name(&self) -> &str {
        "twitter"
    }

    fn character_limit(&self) -> Option<usize> {
        Target::Twitter.character_limit()
    }

    async fn create_post(&self, post: &NormalizedPost) -> Result<PublishOutcome> {
        let credential = self.credential().await?;

        // The JSON body is not part of the OAuth1.0a signature base string.
        let authorization = self.signer.auth_header(
            "POST",
            TWEETS_URL,
            &BTreeMap::new(),
            Some(&credential.token),
            Some(&credential.token_secret),
        )?;

        let response = self
            .http
            .post(TWEETS_URL)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .json(&serde_json::json!({ "text": compose_text(post) }))
            .send()
            .await
            .map_err(|e| CrosscastError::caught("twitter", e))?;

        let body = read_success_json("twitter", response).await?;
        let tweet: TweetResponse =
            serde_json::from_value(body).map_err(|e| CrosscastError::caught("twitter", e))?;

        debug!(id = %tweet.data.id, "tweet created");
        Ok(PublishOutcome::Twitter { id: tweet.data.id })
    }
}
