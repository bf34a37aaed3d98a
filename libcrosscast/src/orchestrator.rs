//! Publish orchestrator
//!
//! Validates and normalizes one piece of content, writes it to the local
//! feed, then fans it out concurrently to every requested platform. The
//! feed write happens before any remote call so an accepted post always has
//! a durable local record. Platform calls run to completion regardless of
//! sibling failures; failures are aggregated into a single error carrying
//! the highest upstream status and the names of every failed module.

use futures::future::join_all;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::content::{cleanup_html, max_characters, used_characters, MAX_CONTENT_LENGTH};
use crate::error::{CrosscastError, Result};
use crate::oauth::OAuth1Signer;
use crate::store::DocumentStore;
use crate::targets::bluesky::BlueskyTarget;
use crate::targets::feed::FeedTarget;
use crate::targets::linkedin::LinkedinTarget;
use crate::targets::mastodon::MastodonTarget;
use crate::targets::threads::ThreadsTarget;
use crate::targets::twitter::TwitterTarget;
use crate::targets::{http_client, TargetAdapter};
use crate::types::{NormalizedPost, PublishOutcome, PublishRequest, ResolvedImage, Target};
use crate::vault::CredentialVault;

/// Resolves uploaded-file references to fetchable URLs. Provided by the
/// file storage collaborator.
pub trait ImageResolver: Send + Sync {
    fn resolve(&self, reference: &str) -> Result<ResolvedImage>;
}

pub struct Orchestrator {
    feed: FeedTarget,
    adapters: HashMap<String, Arc<dyn TargetAdapter>>,
    resolver: Option<Arc<dyn ImageResolver>>,
}

impl Orchestrator {
    /// Build the orchestrator with adapters for every provider present in
    /// the configuration. Unconfigured providers get no adapter; requesting
    /// one fails that target with a credential error during fan-out.
    pub fn from_config(
        config: &Config,
        store: Arc<DocumentStore>,
        vault: CredentialVault,
    ) -> Result<Self> {
        let http = http_client()?;
        let feed = FeedTarget::new(store, &config.feed.base_url);

        let mut adapters: HashMap<String, Arc<dyn TargetAdapter>> = HashMap::new();
        if let Some(twitter) = &config.twitter {
            let signer = OAuth1Signer::new(&twitter.consumer_key, &twitter.consumer_secret);
            adapters.insert(
                "twitter".to_string(),
                Arc::new(TwitterTarget::new(signer, vault.clone(), http.clone())),
            );
        }
        if let Some(mastodon) = &config.mastodon {
            adapters.insert(
                "mastodon".to_string(),
                Arc::new(MastodonTarget::new(
                    &mastodon.instance,
                    &mastodon.access_token,
                    http.clone(),
                )),
            );
        }
        if let Some(bluesky) = &config.bluesky {
            adapters.insert(
                "bluesky".to_string(),
                Arc::new(BlueskyTarget::new(
                    &bluesky.service_url,
                    &bluesky.identifier,
                    &bluesky.app_password,
                    http.clone(),
                )),
            );
        }
        if config.linkedin.is_some() {
            adapters.insert(
                "linkedin".to_string(),
                Arc::new(LinkedinTarget::new(vault.clone(), http.clone())),
            );
        }
        if config.threads.is_some() {
            adapters.insert(
                "threads".to_string(),
                Arc::new(ThreadsTarget::new(vault, http)),
            );
        }

        Ok(Self {
            feed,
            adapters,
            resolver: None,
        })
    }

    /// Build from explicit adapters. Used by tests with mock targets.
    pub fn with_adapters(
        feed: FeedTarget,
        adapters: Vec<Arc<dyn TargetAdapter>>,
    ) -> Self {
        let adapters = adapters
            .into_iter()
            .map(|a| (a.name().to_string(), a))
            .collect();
        Self {
            feed,
            adapters,
            resolver: None,
        }
    }

    pub fn with_image_resolver(mut self, resolver: Arc<dyn ImageResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Publish one post to the local feed and every requested platform.
    ///
    /// On success the map holds one outcome per destination, keyed by
    /// module name ("rss" plus each platform). Any platform failure fails
    /// the whole call after all siblings have finished; the feed entry is
    /// kept either way.
    pub async fn publish(
        &self,
        request: &PublishRequest,
    ) -> Result<BTreeMap<String, PublishOutcome>> {
        let post = self.normalize(request)?;

        info!(
            targets = %request
                .targets
                .iter()
                .map(Target::name)
                .collect::<Vec<_>>()
                .join(","),
            characters = post.text.chars().count(),
            images = post.images.len(),
            "publishing post"
        );

        let mut outcomes = BTreeMap::new();

        // The feed is written first so the post survives locally even when
        // every remote platform rejects it.
        let feed_outcome = self.feed.create_post(&post).await?;
        outcomes.insert("rss".to_string(), feed_outcome);

        let platforms: Vec<&Target> = request
            .targets
            .iter()
            .filter(|t| **t != Target::Rss)
            .collect();

        let calls = platforms.iter().map(|target| {
            let name = target.name();
            let post = &post;
            async move {
                let result = match self.adapters.get(name) {
                    Some(adapter) => adapter.create_post(post).await,
                    None => Err(CrosscastError::Unauthorized(format!(
                        "{name} is not configured"
                    ))),
                };
                (name, result)
            }
        });
        let results = join_all(calls).await;

        let mut failures: Vec<(&str, CrosscastError)> = Vec::new();
        for (name, result) in results {
            match result {
                Ok(outcome) => {
                    outcomes.insert(name.to_string(), outcome);
                }
                Err(error) => {
                    warn!(module = name, status = error.status(), %error, "platform publish failed");
                    failures.push((name, error));
                }
            }
        }

        if !failures.is_empty() {
            let status = failures
                .iter()
                .map(|(_, e)| e.status())
                .max()
                .unwrap_or(500);
            let modules = failures.iter().map(|(n, _)| n.to_string()).collect();
            return Err(CrosscastError::Fanout { status, modules });
        }

        info!(destinations = outcomes.len(), "post published");
        Ok(outcomes)
    }

    /// Validate the request and produce the platform-agnostic post.
    fn normalize(&self, request: &PublishRequest) -> Result<NormalizedPost> {
        let raw_length = request.content.chars().count();
        if request.content.trim().is_empty() {
            return Err(CrosscastError::Validation(
                "Content cannot be empty".to_string(),
            ));
        }
        if raw_length > MAX_CONTENT_LENGTH {
            return Err(CrosscastError::Validation(format!(
                "Content exceeds {MAX_CONTENT_LENGTH} character limit (got {raw_length} characters)"
            )));
        }

        let text = if request.cleanup_html {
            cleanup_html(&request.content).trim().to_string()
        } else {
            request.content.trim().to_string()
        };
        if text.is_empty() {
            return Err(CrosscastError::Validation(
                "Content cannot be empty".to_string(),
            ));
        }

        let used = used_characters(&text, request.link.as_deref());
        let max = max_characters(&request.targets);
        if used > max {
            return Err(CrosscastError::Validation(format!(
                "Content exceeds {max} character limit for the selected targets (got {used} characters)"
            )));
        }

        let images = self.resolve_images(&request.images)?;

        Ok(NormalizedPost {
            text,
            link: request.link.clone(),
            language: request.language.clone(),
            images,
        })
    }

    fn resolve_images(&self, references: &[String]) -> Result<Vec<ResolvedImage>> {
        if references.is_empty() {
            return Ok(Vec::new());
        }
        let resolver = self.resolver.as_ref().ok_or_else(|| {
            CrosscastError::Validation(
                "image references supplied but no image resolver is configured".to_string(),
            )
        })?;

        references.iter().map(|r| resolver.resolve(r)).collect()
    }
}
