//! OAuth authorization flows
//!
//! Two handshake shapes share the pending-authorization registry: the
//! three-legged OAuth1.0a flow (Twitter) and the authorization-code OAuth2
//! flow with periodic refresh (Threads, LinkedIn). The flows are the sole
//! writers of credential documents; the target adapters only read them
//! through [`crate::vault::CredentialVault`].

pub mod oauth1;
pub mod oauth2;
pub mod pending;

pub use oauth1::{OAuth1Config, OAuth1Signer, TwitterCredential, TwitterOAuthFlow};
pub use oauth2::{OAuth2Credential, OAuth2Flow, OAuth2Provider, RefreshGrant};
pub use pending::{PendingAuthorization, PendingStore};
