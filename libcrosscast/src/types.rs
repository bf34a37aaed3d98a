//! Core types for Crosscast

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The single persistence primitive.
///
/// Posts, uploaded-file metadata and OAuth credentials are all documents;
/// the `kind` discriminator and the tag index tell them apart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub uuid: String,
    /// Globally unique lookup key. Defaults to `"<kind>:<uuid>"`.
    pub search_key: String,
    pub kind: String,
    pub payload: String,
    pub tags: Vec<Tag>,
    pub created_at: i64,
}

/// A `(name, kind)` entry in the secondary index. The tag kind is a
/// namespace ("key", "hashtag"), unrelated to `Document::kind`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tag {
    pub name: String,
    pub kind: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
        }
    }
}

/// Ordering for `get_all` queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentOrder {
    CreatedAtDesc,
    CreatedAtAsc,
}

/// Default search key for a document that did not supply one.
pub fn default_search_key(kind: &str, uuid: &str) -> String {
    format!("{}:{}", kind, uuid)
}

/// A publish destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Rss,
    Twitter,
    Mastodon,
    Bluesky,
    Linkedin,
    Threads,
}

impl Target {
    /// Fixed per-platform character ceiling. The local feed has none.
    pub fn character_limit(&self) -> Option<usize> {
        match self {
            Target::Rss => None,
            Target::Twitter => Some(280),
            Target::Bluesky => Some(300),
            Target::Mastodon => Some(500),
            Target::Threads => Some(500),
            Target::Linkedin => Some(2000),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Target::Rss => "rss",
            Target::Twitter => "twitter",
            Target::Mastodon => "mastodon",
            Target::Bluesky => "bluesky",
            Target::Linkedin => "linkedin",
            Target::Threads => "threads",
        }
    }
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rss" => Ok(Target::Rss),
            "twitter" => Ok(Target::Twitter),
            "mastodon" => Ok(Target::Mastodon),
            "bluesky" => Ok(Target::Bluesky),
            "linkedin" => Ok(Target::Linkedin),
            "threads" => Ok(Target::Threads),
            _ => Err(format!("Unknown target: '{}'", s)),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One publish request as handed to the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishRequest {
    pub content: String,
    /// Requested destinations. The local feed is always included.
    #[serde(default)]
    pub targets: BTreeSet<Target>,
    pub link: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub cleanup_html: bool,
    /// References to previously uploaded files, resolved to URLs before
    /// the adapters run.
    #[serde(default)]
    pub images: Vec<String>,
}

impl PublishRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            targets: BTreeSet::new(),
            link: None,
            language: None,
            cleanup_html: false,
            images: Vec::new(),
        }
    }

    pub fn with_targets(mut self, targets: impl IntoIterator<Item = Target>) -> Self {
        self.targets = targets.into_iter().collect();
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

/// An image reference resolved through the external files collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolvedImage {
    pub url: String,
    pub alt_text: Option<String>,
}

/// Platform-agnostic content bundle, already fitted to the tightest
/// character budget among the requested targets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedPost {
    pub text: String,
    pub link: Option<String>,
    pub language: Option<String>,
    pub images: Vec<ResolvedImage>,
}

/// The payload persisted for the local feed, later consumed by the RSS
/// renderer (an external collaborator).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedEntry {
    pub content: String,
    pub link: Option<String>,
    pub language: Option<String>,
    pub hashtags: Vec<String>,
    pub images: Vec<ResolvedImage>,
    pub created_at: i64,
}

/// Per-target success payload, discriminated by the originating module.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "module", rename_all = "lowercase")]
pub enum PublishOutcome {
    Rss { uri: String, uuid: String },
    Twitter { id: String },
    Mastodon { id: String, url: Option<String> },
    Bluesky { uri: String, cid: String },
    Linkedin { id: String },
    Threads { id: String },
}

impl PublishOutcome {
    pub fn module(&self) -> &'static str {
        match self {
            PublishOutcome::Rss { .. } => "rss",
            PublishOutcome::Twitter { .. } => "twitter",
            PublishOutcome::Mastodon { .. } => "mastodon",
            PublishOutcome::Bluesky { .. } => "bluesky",
            PublishOutcome::Linkedin { .. } => "linkedin",
            PublishOutcome::Threads { .. } => "threads",
        }
    }
}

/// Credential lifecycle report, without secret material.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    pub has_authorization: bool,
    /// Creation time of the stored credential in epoch milliseconds.
    pub created_at: Option<i64>,
}

pub fn new_uuid() -> String {
    Uuid::new_v4().to_string()
}

pub fn now_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_search_key_format() {
        assert_eq!(default_search_key("post", "abc-123"), "post:abc-123");
    }

    #[test]
    fn test_target_parse_roundtrip() {
        for name in ["rss", "twitter", "mastodon", "bluesky", "linkedin", "threads"] {
            let target: Target = name.parse().unwrap();
            assert_eq!(target.name(), name);
        }
        assert!("myspace".parse::<Target>().is_err());
    }

    #[test]
    fn test_target_parse_case_insensitive() {
        assert_eq!("Twitter".parse::<Target>().unwrap(), Target::Twitter);
    }

    #[test]
    fn test_character_limits() {
        assert_eq!(Target::Twitter.character_limit(), Some(280));
        assert_eq!(Target::Bluesky.character_limit(), Some(300));
        assert_eq!(Target::Mastodon.character_limit(), Some(500));
        assert_eq!(Target::Linkedin.character_limit(), Some(2000));
        assert_eq!(Target::Rss.character_limit(), None);
    }

    #[test]
    fn test_outcome_serialization_carries_discriminant() {
        let outcome = PublishOutcome::Rss {
            uri: "https://example.org/rss/abc".to_string(),
            uuid: "abc".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["module"], "rss");
        assert_eq!(json["uri"], "https://example.org/rss/abc");

        let back: PublishOutcome = serde_json::from_value(json).unwrap();
        assert_eq!(back, outcome);
    }

    #[test]
    fn test_outcome_module_names() {
        let outcome = PublishOutcome::Twitter {
            id: "1".to_string(),
        };
        assert_eq!(outcome.module(), "twitter");
        let outcome = PublishOutcome::Bluesky {
            uri: "at://did/app.bsky.feed.post/xyz".to_string(),
            cid: "bafy".to_string(),
        };
        assert_eq!(outcome.module(), "bluesky");
    }

    #[test]
    fn test_publish_request_defaults() {
        let request: PublishRequest = serde_json::from_str(r#"{"content":"Hello"}"#).unwrap();
        assert_eq!(request.content, "Hello");
        assert!(request.targets.is_empty());
        assert!(!request.cleanup_html);
        assert!(request.images.is_empty());
    }

    #[test]
    fn test_auth_status_serialization() {
        let status = AuthStatus {
            has_authorization: true,
            created_at: Some(1_700_000_000_000),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["hasAuthorization"], true);
        assert_eq!(json["createdAt"], 1_700_000_000_000i64);
    }
}
