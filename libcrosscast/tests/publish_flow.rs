//! End-to-end publish workflow tests
//!
//! These tests verify complete workflows including:
//! - Publishing to the feed plus several platforms
//! - Partial failures and the aggregated error they produce
//! - Feed durability when every remote platform fails
//! - Credential storage driving adapter preconditions

use anyhow::Result;
use std::sync::Arc;

use libcrosscast::error::CrosscastError;
use libcrosscast::store::DocumentStore;
use libcrosscast::targets::feed::{FeedTarget, POST_KIND};
use libcrosscast::targets::mock::MockTarget;
use libcrosscast::types::{
    DocumentOrder, FeedEntry, PublishOutcome, PublishRequest, Target,
};
use libcrosscast::Orchestrator;

async fn test_store() -> Result<Arc<DocumentStore>> {
    Ok(Arc::new(DocumentStore::in_memory().await?))
}

fn request(content: &str, targets: &[Target]) -> PublishRequest {
    PublishRequest::new(content).with_targets(targets.iter().copied())
}

#[tokio::test]
async fn test_publish_to_feed_and_two_platforms() -> Result<()> {
    let store = test_store().await?;
    let feed = FeedTarget::new(store.clone(), "https://feed.example.org");

    let orchestrator = Orchestrator::with_adapters(
        feed,
        vec![
            Arc::new(MockTarget::success("twitter")),
            Arc::new(MockTarget::success("mastodon")),
        ],
    );

    let outcomes = orchestrator
        .publish(&request(
            "Hello from everywhere!",
            &[Target::Twitter, Target::Mastodon],
        ))
        .await?;

    assert_eq!(outcomes.len(), 3);
    let Some(PublishOutcome::Rss { uri, uuid }) = outcomes.get("rss") else {
        panic!("missing rss outcome");
    };
    assert_eq!(*uri, format!("https://feed.example.org/rss/{uuid}"));
    assert!(matches!(
        outcomes.get("twitter"),
        Some(PublishOutcome::Twitter { .. })
    ));
    assert!(matches!(
        outcomes.get("mastodon"),
        Some(PublishOutcome::Mastodon { .. })
    ));

    // The feed entry is queryable afterwards.
    let documents = store.get_all(POST_KIND, DocumentOrder::CreatedAtDesc).await?;
    assert_eq!(documents.len(), 1);
    let entry: FeedEntry = serde_json::from_str(&documents[0].payload)?;
    assert_eq!(entry.content, "Hello from everywhere!");

    Ok(())
}

#[tokio::test]
async fn test_partial_failure_names_failed_module_and_keeps_feed_entry() -> Result<()> {
    let store = test_store().await?;
    let feed = FeedTarget::new(store.clone(), "https://feed.example.org");

    let orchestrator = Orchestrator::with_adapters(
        feed,
        vec![
            Arc::new(MockTarget::success("mastodon")),
            Arc::new(MockTarget::unauthorized("twitter", "no credential stored")),
        ],
    );

    let error = orchestrator
        .publish(&request("Partial", &[Target::Twitter, Target::Mastodon]))
        .await
        .unwrap_err();

    match &error {
        CrosscastError::Fanout { status, modules } => {
            assert_eq!(*status, 401);
            assert_eq!(modules, &vec!["twitter".to_string()]);
        }
        other => panic!("expected fanout error, got {other}"),
    }
    assert_eq!(
        error.to_string(),
        "Failed to create post via twitter"
    );

    // The feed write happened before the fan-out and is retained.
    let documents = store.get_all(POST_KIND, DocumentOrder::CreatedAtDesc).await?;
    assert_eq!(documents.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_all_platforms_failing_reports_highest_status() -> Result<()> {
    let store = test_store().await?;
    let feed = FeedTarget::new(store.clone(), "https://feed.example.org");

    let orchestrator = Orchestrator::with_adapters(
        feed,
        vec![
            Arc::new(MockTarget::unauthorized("twitter", "no credential")),
            Arc::new(MockTarget::request_failure("mastodon", 422, "bad status")),
            Arc::new(MockTarget::caught_failure("bluesky", "connection reset")),
        ],
    );

    let error = orchestrator
        .publish(&request(
            "Nobody wants this",
            &[Target::Twitter, Target::Mastodon, Target::Bluesky],
        ))
        .await
        .unwrap_err();

    match error {
        CrosscastError::Fanout { status, modules } => {
            assert_eq!(status, 500);
            assert_eq!(modules.len(), 3);
            assert!(modules.contains(&"twitter".to_string()));
            assert!(modules.contains(&"mastodon".to_string()));
            assert!(modules.contains(&"bluesky".to_string()));
        }
        other => panic!("expected fanout error, got {other}"),
    }

    Ok(())
}

#[tokio::test]
async fn test_rss_only_publish() -> Result<()> {
    let store = test_store().await?;
    let feed = FeedTarget::new(store.clone(), "https://feed.example.org");
    let orchestrator = Orchestrator::with_adapters(feed, vec![]);

    let outcomes = orchestrator
        .publish(&request("Feed only", &[Target::Rss]))
        .await?;

    assert_eq!(outcomes.len(), 1);
    assert!(outcomes.contains_key("rss"));

    Ok(())
}

#[tokio::test]
async fn test_hashtags_indexed_for_feed_filtering() -> Result<()> {
    let store = test_store().await?;
    let feed = FeedTarget::new(store.clone(), "https://feed.example.org");
    let orchestrator = Orchestrator::with_adapters(feed, vec![]);

    orchestrator
        .publish(&request("Released #crosscast v0.2 today", &[]))
        .await?;
    orchestrator
        .publish(&request("Unrelated note", &[]))
        .await?;

    let tagged = store.find_by_tag("crosscast", "hashtag").await?;
    assert_eq!(tagged.len(), 1);
    let entry: FeedEntry = serde_json::from_str(&tagged[0].payload)?;
    assert_eq!(entry.hashtags, vec!["crosscast".to_string()]);

    Ok(())
}

#[tokio::test]
async fn test_link_is_delivered_to_platforms_and_feed() -> Result<()> {
    let store = test_store().await?;
    let feed = FeedTarget::new(store.clone(), "https://feed.example.org");

    let twitter = MockTarget::success("twitter");
    let (_, posted) = twitter.handles();
    let orchestrator = Orchestrator::with_adapters(feed, vec![Arc::new(twitter)]);

    let request = PublishRequest::new("Read the announcement")
        .with_targets([Target::Twitter])
        .with_link("https://example.org/announcement");
    orchestrator.publish(&request).await?;

    let posted = posted.lock().unwrap().clone();
    assert_eq!(
        posted,
        vec!["Read the announcement\n\nhttps://example.org/announcement".to_string()]
    );

    let documents = store.get_all(POST_KIND, DocumentOrder::CreatedAtDesc).await?;
    let entry: FeedEntry = serde_json::from_str(&documents[0].payload)?;
    // The feed keeps the link structured, not glued onto the text.
    assert_eq!(entry.content, "Read the announcement");
    assert_eq!(entry.link.as_deref(), Some("https://example.org/announcement"));

    Ok(())
}

#[tokio::test]
async fn test_outcome_map_serializes_with_module_discriminants() -> Result<()> {
    let store = test_store().await?;
    let feed = FeedTarget::new(store.clone(), "https://feed.example.org");
    let orchestrator = Orchestrator::with_adapters(
        feed,
        vec![Arc::new(MockTarget::success("twitter"))],
    );

    let outcomes = orchestrator
        .publish(&request("Serialize me", &[Target::Twitter]))
        .await?;

    let json = serde_json::to_value(&outcomes)?;
    assert_eq!(json["rss"]["module"], "rss");
    assert_eq!(json["twitter"]["module"], "twitter");
    assert!(json["rss"]["uri"].is_string());
    assert!(json["twitter"]["id"].is_string());

    Ok(())
}
