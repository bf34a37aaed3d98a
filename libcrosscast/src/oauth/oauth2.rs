//! Authorization-code OAuth2 flow with periodic refresh
//!
//! Used by the Threads and LinkedIn providers. The authorize redirect
//! carries a random CSRF `state` value remembered in the pending registry;
//! the callback must present the same bytes or nothing is exchanged or
//! persisted. Refresh re-submits the stored token and only overwrites the
//! credential document on success.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CrosscastError, Result};
use crate::oauth::pending::PendingStore;
use crate::types::AuthStatus;
use crate::vault::{CredentialVault, LINKEDIN_TOKEN_KIND, THREADS_TOKEN_KIND};

/// How a provider expects its refresh call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshGrant {
    /// Standard `grant_type=refresh_token` with the stored refresh token.
    RefreshToken,
    /// Re-submit the long-lived access token itself under a provider
    /// specific grant type (Threads' `th_refresh_token`).
    AccessToken(String),
}

/// Static provider registration.
#[derive(Debug, Clone)]
pub struct OAuth2Provider {
    /// Module name used in errors and pending records.
    pub name: &'static str,
    /// Credential document kind (and fixed search key).
    pub credential_kind: &'static str,
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: String,
    pub token_url: String,
    pub refresh_url: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub refresh_grant: RefreshGrant,
}

impl OAuth2Provider {
    pub fn threads(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            name: "threads",
            credential_kind: THREADS_TOKEN_KIND,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            authorize_url: "https://threads.net/oauth/authorize".to_string(),
            token_url: "https://graph.threads.net/oauth/access_token".to_string(),
            refresh_url: "https://graph.threads.net/refresh_access_token".to_string(),
            redirect_uri: redirect_uri.into(),
            scopes: vec![
                "threads_basic".to_string(),
                "threads_content_publish".to_string(),
            ],
            refresh_grant: RefreshGrant::AccessToken("th_refresh_token".to_string()),
        }
    }

    pub fn linkedin(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            name: "linkedin",
            credential_kind: LINKEDIN_TOKEN_KIND,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            authorize_url: "https://www.linkedin.com/oauth/v2/authorization".to_string(),
            token_url: "https://www.linkedin.com/oauth/v2/accessToken".to_string(),
            refresh_url: "https://www.linkedin.com/oauth/v2/accessToken".to_string(),
            redirect_uri: redirect_uri.into(),
            scopes: vec!["w_member_social".to_string()],
            refresh_grant: RefreshGrant::RefreshToken,
        }
    }
}

/// The secret bundle persisted for an OAuth2 provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OAuth2Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Expiry as epoch seconds, when the provider reported one.
    pub expires_at: Option<i64>,
    /// Provider-side account id (Threads user id, LinkedIn member URN).
    pub user_id: Option<String>,
}

/// Standard OAuth2 token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    user_id: Option<serde_json::Value>,
}

impl TokenResponse {
    fn into_credential(self, previous: Option<&OAuth2Credential>) -> OAuth2Credential {
        let expires_at = self
            .expires_in
            .map(|seconds| chrono::Utc::now().timestamp() + seconds);
        // Providers often omit the refresh token and account id on refresh;
        // carry the stored values forward.
        let refresh_token = self
            .refresh_token
            .or_else(|| previous.and_then(|p| p.refresh_token.clone()));
        let user_id = self
            .user_id
            .map(|v| match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .or_else(|| previous.and_then(|p| p.user_id.clone()));

        OAuth2Credential {
            access_token: self.access_token,
            refresh_token,
            expires_at,
            user_id,
        }
    }
}

/// State machine for one OAuth2 provider.
pub struct OAuth2Flow {
    provider: OAuth2Provider,
    vault: CredentialVault,
    pending: PendingStore,
    http: reqwest::Client,
}

impl OAuth2Flow {
    pub fn new(
        provider: OAuth2Provider,
        vault: CredentialVault,
        pending: PendingStore,
        http: reqwest::Client,
    ) -> Self {
        Self {
            provider,
            vault,
            pending,
            http,
        }
    }

    /// Mint a CSRF `state` value, remember it, and build the authorize URL.
    pub fn authorization_url(&self) -> Result<String> {
        let state = generate_state();
        self.pending.issue(&state, self.provider.name, None);

        let mut url = Url::parse(&self.provider.authorize_url)
            .map_err(|e| CrosscastError::caught(self.provider.name, e))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.provider.client_id)
            .append_pair("redirect_uri", &self.provider.redirect_uri)
            .append_pair("scope", &self.provider.scopes.join(","))
            .append_pair("state", &state);

        Ok(url.to_string())
    }

    /// Complete the handshake from the provider callback.
    ///
    /// The presented `state` must byte-for-byte match an outstanding value;
    /// otherwise the pending record is discarded and nothing is exchanged
    /// or persisted.
    pub async fn handle_callback(&self, code: &str, state: &str) -> Result<OAuth2Credential> {
        let entry = self.pending.consume(state).ok_or_else(|| {
            CrosscastError::Unauthorized("unknown or expired state value".to_string())
        })?;
        if entry.provider != self.provider.name {
            return Err(CrosscastError::Unauthorized(
                "state was issued for a different provider".to_string(),
            ));
        }

        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.provider.redirect_uri.as_str()),
            ("client_id", self.provider.client_id.as_str()),
            ("client_secret", self.provider.client_secret.as_str()),
        ];

        let token_response = self.token_request(&self.provider.token_url, &form).await?;
        let credential = token_response.into_credential(None);
        self.vault
            .put(self.provider.credential_kind, &credential)
            .await?;

        tracing::info!(provider = self.provider.name, "oauth2 authorization completed");
        Ok(credential)
    }

    /// Re-submit the stored token to the refresh endpoint.
    ///
    /// On success the credential document is overwritten in place. On any
    /// failure the stored credential is left untouched; the old token may
    /// still be valid until its own expiry.
    pub async fn refresh(&self) -> Result<OAuth2Credential> {
        let stored: OAuth2Credential = self
            .vault
            .get_secret(self.provider.credential_kind)
            .await?
            .ok_or_else(|| {
                CrosscastError::NotFound(format!(
                    "no {} credential stored",
                    self.provider.credential_kind
                ))
            })?;

        let form: Vec<(&str, String)> = match &self.provider.refresh_grant {
            RefreshGrant::RefreshToken => {
                let refresh_token = stored.refresh_token.clone().ok_or_else(|| {
                    CrosscastError::caught(
                        self.provider.name,
                        "stored credential has no refresh token",
                    )
                })?;
                vec![
                    ("grant_type", "refresh_token".to_string()),
                    ("refresh_token", refresh_token),
                    ("client_id", self.provider.client_id.clone()),
                    ("client_secret", self.provider.client_secret.clone()),
                ]
            }
            RefreshGrant::AccessToken(grant_type) => vec![
                ("grant_type", grant_type.clone()),
                ("access_token", stored.access_token.clone()),
            ],
        };

        let form_refs: Vec<(&str, &str)> =
            form.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let token_response = self
            .token_request(&self.provider.refresh_url, &form_refs)
            .await?;

        let credential = token_response.into_credential(Some(&stored));
        self.vault
            .put(self.provider.credential_kind, &credential)
            .await?;

        tracing::info!(provider = self.provider.name, "oauth2 credential refreshed");
        Ok(credential)
    }

    /// Whether a credential exists and when it was created.
    pub async fn auth_status(&self) -> Result<AuthStatus> {
        self.vault.status(self.provider.credential_kind).await
    }

    async fn token_request(&self, url: &str, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self
            .http
            .post(url)
            .header("Accept", "application/json")
            .form(form)
            .send()
            .await
            .map_err(|e| CrosscastError::caught(self.provider.name, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CrosscastError::caught(self.provider.name, e))?;
        if !status.is_success() {
            return Err(CrosscastError::Request {
                module: self.provider.name.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| CrosscastError::caught(self.provider.name, e))
    }
}

/// 32 random bytes, URL-safe base64: unguessable and redirect-safe.
fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
