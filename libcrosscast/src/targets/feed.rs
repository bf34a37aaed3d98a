//! Local RSS feed target
//!
//! The feed is always written, before any remote platform is contacted, so
//! every accepted post has a durable local record even when every remote
//! call fails. Entries are stored as tagged documents; hashtags become tags
//! so the feed can later be filtered by topic.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::content::extract_hashtags;
use crate::error::Result;
use crate::store::DocumentStore;
use crate::targets::TargetAdapter;
use crate::types::{now_timestamp, FeedEntry, NormalizedPost, PublishOutcome, Tag};

/// Document kind under which feed entries are persisted.
pub const POST_KIND: &str = "post";

/// Tag kind attached to extracted hashtags.
pub const HASHTAG_TAG_KIND: &str = "hashtag";

pub struct FeedTarget {
    store: Arc<DocumentStore>,
    base_url: String,
}

impl FeedTarget {
    pub fn new(store: Arc<DocumentStore>, base_url: &str) -> Self {
        Self {
            store,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Public URI of a feed entry.
    pub fn entry_uri(&self, uuid: &str) -> String {
        format!("{}/rss/{}", self.base_url, uuid)
    }

    /// All persisted feed entries, newest first.
    pub async fn entries(&self) -> Result<Vec<FeedEntry>> {
        let documents = self
            .store
            .get_all(POST_KIND, crate::types::DocumentOrder::CreatedAtDesc)
            .await?;

        let mut entries = Vec::with_capacity(documents.len());
        for document in documents {
            entries.push(serde_json::from_str(&document.payload)?);
        }
        Ok(entries)
    }
}

#[async_trait]
impl TargetAdapter for FeedTarget {
    fn name(&self) -> &str {
        "rss"
    }

    fn character_limit(&self) -> Option<usize> {
        None
    }

    async fn create_post(&self, post: &NormalizedPost) -> Result<PublishOutcome> {
        let hashtags = extract_hashtags(&post.text);
        let entry = FeedEntry {
            content: post.text.clone(),
            link: post.link.clone(),
            language: post.language.clone(),
            hashtags: hashtags.clone(),
            images: post.images.clone(),
            created_at: now_timestamp(),
        };
        let payload = serde_json::to_string(&entry)?;

        let tags: Vec<Tag> = hashtags
            .iter()
            .map(|h| Tag::new(h, HASHTAG_TAG_KIND))
            .collect();

        let document = self
            .store
            .create_or_update(POST_KIND, &payload, None, &tags)
            .await?;

        debug!(uuid = %document.uuid, hashtags = hashtags.len(), "feed entry persisted");

        Ok(PublishOutcome::Rss {
            uri: self.entry_uri(&document.uuid),
            uuid: document.uuid,
        })
    }
}
