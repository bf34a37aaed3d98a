//! Threads publish target
//!
//! Uses the two-phase Graph API protocol: create one or more media
//! containers, then publish. A single image rides on its own container;
//! multiple images become carousel items under a carousel container.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{CrosscastError, Result};
use crate::oauth::OAuth2Credential;
use crate::targets::{compose_text, read_success_json, TargetAdapter};
use crate::types::{NormalizedPost, PublishOutcome, Target};
use crate::vault::{CredentialVault, THREADS_TOKEN_KIND};

const GRAPH_URL: &str = "https://graph.threads.net/v1.0";

pub struct ThreadsTarget {
    vault: CredentialVault,
    http: reqwest::Client,
    graph_url: String,
}

#[derive(Debug, Deserialize)]
struct ContainerResponse {
    id: String,
}

impl ThreadsTarget {
    pub fn new(vault: CredentialVault, http: reqwest::Client) -> Self {
        Self {
            vault,
            http,
            graph_url: GRAPH_URL.to_string(),
        }
    }

    async fn credential(&self) -> Result<(OAuth2Credential, String)> {
        let credential = self
            .vault
            .get_secret::<OAuth2Credential>(THREADS_TOKEN_KIND)
            .await?
            .ok_or_else(|| {
                CrosscastError::Unauthorized(
                    "no threads credential stored; complete the authorization flow first"
                        .to_string(),
                )
            })?;
        let user_id = credential.user_id.clone().ok_or_else(|| {
            CrosscastError::Unauthorized(
                "threads credential is missing the user id; re-authorize".to_string(),
            )
        })?;
        Ok((credential, user_id))
    }

    async fn create_container(
        &self,
        user_id: &str,
        access_token: &str,
        params: &[(&str, &str)],
    ) -> Result<String> {
        let mut form: Vec<(&str, &str)> = params.to_vec();
        form.push(("access_token", access_token));

        let response = self
            .http
            .post(format!("{}/{}/threads", self.graph_url, user_id))
            .form(&form)
            .send()
            .await
            .map_err(|e| CrosscastError::caught("threads", e))?;

        let body = read_success_json("threads", response).await?;
        let container: ContainerResponse =
            serde_json::from_value(body).map_err(|e| CrosscastError::caught("threads", e))?;
        Ok(container.id)
    }

    async fn publish_container(
        &self,
        user_id: &str,
        access_token: &str,
        creation_id: &str,
    ) -> Result<String> {
        let response = self
            .http
            .post(format!("{}/{}/threads_publish", self.graph_url, user_id))
            .form(&[("creation_id", creation_id), ("access_token", access_token)])
            .send()
            .await
            .map_err(|e| CrosscastError::caught("threads", e))?;

        let body = read_success_json("threads", response).await?;
        let published: ContainerResponse =
            serde_json::from_value(body).map_err(|e| CrosscastError::caught("threads", e))?;
        Ok(published.id)
    }
}

#[async_trait]
impl TargetAdapter for ThreadsTarget {
    fn name(&self) -> &str {
        "threads"
    }

    fn character_limit(&self) -> Option<usize> {
        Target::Threads.character_limit()
    }

    async fn create_post(&self, post: &NormalizedPost) -> Result<PublishOutcome> {
        let (credential, user_id) = self.credential().await?;
        let token = credential.access_token.as_str();
        let text = compose_text(post);

        let creation_id = match post.images.len() {
            0 => {
                self.create_container(
                    &user_id,
                    token,
                    &[("media_type", "TEXT"), ("text", &text)],
                )
                .await?
            }
            1 => {
                self.create_container(
                    &user_id,
                    token,
                    &[
                        ("media_type", "IMAGE"),
                        ("image_url", &post.images[0].url),
                        ("text", &text),
                    ],
                )
                .await?
            }
            _ => {
                let mut children = Vec::with_capacity(post.images.len());
                for image in &post.images {
                    let child = self
                        .create_container(
                            &user_id,
                            token,
                            &[
                                ("media_type", "IMAGE"),
                                ("image_url", &image.url),
                                ("is_carousel_item", "true"),
                            ],
                        )
                        .await?;
                    children.push(child);
                }
                let children = children.join(",");
                self.create_container(
                    &user_id,
                    token,
                    &[
                        ("media_type", "CAROUSEL"),
                        ("children", &children),
                        ("text", &text),
                    ],
                )
                .await?
            }
        };

        let id = self
            .publish_container(&user_id, token, &creation_id)
            .await?;

        debug!(id = %id, "threads post published");
        Ok(PublishOutcome::Threads { id })
    }
}
