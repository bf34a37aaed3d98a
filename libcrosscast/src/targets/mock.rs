//! Mock target adapter for testing
//!
//! A configurable adapter that can simulate successes, typed failures, and
//! delays. Used by the orchestrator tests to exercise fan-out aggregation
//! without credentials or network access.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{CrosscastError, Result};
use crate::targets::{compose_text, TargetAdapter};
use crate::types::{NormalizedPost, PublishOutcome};

/// Failure mode the mock returns when posting is configured to fail.
#[derive(Debug, Clone)]
pub enum MockFailure {
    /// Missing credential; surfaces as a 401.
    Unauthorized(String),
    /// Upstream rejection with an explicit status and body.
    Request { status: u16, body: String },
    /// Local fault; surfaces as a 500.
    Caught(String),
}

/// Configuration for mock target behavior.
#[derive(Debug, Clone)]
pub struct MockTargetConfig {
    /// Module name (e.g. "twitter", "mastodon").
    pub name: String,

    /// Failure to return instead of succeeding, if any.
    pub failure: Option<MockFailure>,

    /// Delay before completing (simulates network latency).
    pub delay: Duration,

    /// Character limit reported to the budget calculation.
    pub character_limit: Option<usize>,

    /// Number of times `create_post` has been called.
    pub call_count: Arc<Mutex<usize>>,

    /// Composed text of every successful post (for verification).
    pub posted_content: Arc<Mutex<Vec<String>>>,
}

impl MockTargetConfig {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            failure: None,
            delay: Duration::from_millis(0),
            character_limit: None,
            call_count: Arc::new(Mutex::new(0)),
            posted_content: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// Mock target for testing.
pub struct MockTarget {
    config: MockTargetConfig,
}

impl MockTarget {
    pub fn new(config: MockTargetConfig) -> Self {
        Self { config }
    }

    /// A mock that always succeeds.
    pub fn success(name: &str) -> Self {
        Self::new(MockTargetConfig::new(name))
    }

    /// A mock that fails with a missing-credential error.
    pub fn unauthorized(name: &str, message: &str) -> Self {
        Self::new(MockTargetConfig {
            failure: Some(MockFailure::Unauthorized(message.to_string())),
            ..MockTargetConfig::new(name)
        })
    }

    /// A mock that fails like an upstream rejection.
    pub fn request_failure(name: &str, status: u16, body: &str) -> Self {
        Self::new(MockTargetConfig {
            failure: Some(MockFailure::Request {
                status,
                body: body.to_string(),
            }),
            ..MockTargetConfig::new(name)
        })
    }

    /// A mock that fails with a local fault.
    pub fn caught_failure(name: &str, message: &str) -> Self {
        Self::new(MockTargetConfig {
            failure: Some(MockFailure::Caught(message.to_string())),
            ..MockTargetConfig::new(name)
        })
    }

    /// A successful mock with simulated latency.
    pub fn with_delay(name: &str, delay: Duration) -> Self {
        Self::new(MockTargetConfig {
            delay,
            ..MockTargetConfig::new(name)
        })
    }

    /// A successful mock advertising a character limit.
    pub fn with_limit(name: &str, limit: usize) -> Self {
        Self::new(MockTargetConfig {
            character_limit: Some(limit),
            ..MockTargetConfig::new(name)
        })
    }

    pub fn call_count(&self) -> usize {
        *self.config.call_count.lock().unwrap()
    }

    pub fn posted_content(&self) -> Vec<String> {
        self.config.posted_content.lock().unwrap().clone()
    }

    /// Shared handles for asserting after the mock has been moved into an
    /// orchestrator.
    pub fn handles(&self) -> (Arc<Mutex<usize>>, Arc<Mutex<Vec<String>>>) {
        (
            self.config.call_count.clone(),
            self.config.posted_content.clone(),
        )
    }
}

#[async_trait]
impl TargetAdapter for MockTarget {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn character_limit(&self) -> Option<usize> {
        self.config.character_limit
    }

    async fn create_post(&self, post: &NormalizedPost) -> Result<PublishOutcome> {
        *self.config.call_count.lock().unwrap() += 1;

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        match &self.config.failure {
            Some(MockFailure::Unauthorized(message)) => {
                Err(CrosscastError::Unauthorized(message.clone()))
            }
            Some(MockFailure::Request { status, body }) => Err(CrosscastError::Request {
                module: self.config.name.clone(),
                status: *status,
                body: body.clone(),
            }),
            Some(MockFailure::Caught(message)) => Err(CrosscastError::Caught {
                module: self.config.name.clone(),
                message: message.clone(),
            }),
            None => {
                self.config
                    .posted_content
                    .lock()
                    .unwrap()
                    .push(compose_text(post));

                Ok(match self.config.name.as_str() {
                    "mastodon" => PublishOutcome::Mastodon {
                        id: format!("mock-{}", uuid::Uuid::new_v4()),
                        url: None,
                    },
                    "bluesky" => PublishOutcome::Bluesky {
                        uri: format!("at://mock/{}", uuid::Uuid::new_v4()),
                        cid: "bafymock".to_string(),
                    },
                    "linkedin" => PublishOutcome::Linkedin {
                        id: format!("urn:li:share:mock-{}", uuid::Uuid::new_v4()),
                    },
                    "threads" => PublishOutcome::Threads {
                        id: format!("mock-{}", uuid::Uuid::new_v4()),
                    },
                    _ => PublishOutcome::Twitter {
                        id: format!("mock-{}", uuid::Uuid::new_v4()),
                    },
                })
            }
        }
    }
}
