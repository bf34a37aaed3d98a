//! Crosscast - publish once, everywhere
//!
//! This library lets a single operator publish one piece of content to a
//! local RSS feed and several social platforms (Twitter, Mastodon, Bluesky,
//! LinkedIn, Threads) in one call, on top of a tag-indexed SQLite document
//! store that also holds the OAuth credentials.

pub mod config;
pub mod content;
pub mod error;
pub mod logging;
pub mod oauth;
pub mod orchestrator;
pub mod store;
pub mod targets;
pub mod types;
pub mod vault;

// Re-export commonly used types
pub use config::Config;
pub use error::{CrosscastError, Result};
pub use orchestrator::{ImageResolver, Orchestrator};
pub use store::DocumentStore;
pub use types::{Document, PublishOutcome, PublishRequest, Tag, Target};
pub use vault::CredentialVault;
