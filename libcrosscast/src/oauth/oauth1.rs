//! Three-legged OAuth 1.0a flow (Twitter)
//!
//! Drives the request-token / user-authorize / verifier-exchange handshake
//! and signs API requests with HMAC-SHA1. The exchanged access token is
//! written through the credential vault; this flow is the only writer of
//! the `twitter-oauth-token` document.

use std::collections::{BTreeMap, HashMap};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use url::Url;

use crate::error::{CrosscastError, Result};
use crate::oauth::pending::PendingStore;
use crate::types::AuthStatus;
use crate::vault::{CredentialVault, TWITTER_TOKEN_KIND};

const MODULE: &str = "twitter";

const REQUEST_TOKEN_URL: &str = "https://api.twitter.com/oauth/request_token";
const AUTHORIZE_URL: &str = "https://api.twitter.com/oauth/authorize";
const ACCESS_TOKEN_URL: &str = "https://api.twitter.com/oauth/access_token";

/// Consumer registration plus the redirect endpoint the provider calls back.
#[derive(Debug, Clone)]
pub struct OAuth1Config {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub callback_url: String,
    pub request_token_url: String,
    pub authorize_url: String,
    pub access_token_url: String,
}

impl OAuth1Config {
    /// Twitter endpoints with the given consumer registration.
    pub fn twitter(
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        callback_url: impl Into<String>,
    ) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            callback_url: callback_url.into(),
            request_token_url: REQUEST_TOKEN_URL.to_string(),
            authorize_url: AUTHORIZE_URL.to_string(),
            access_token_url: ACCESS_TOKEN_URL.to_string(),
        }
    }
}

/// The long-lived secret bundle persisted after a successful exchange.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TwitterCredential {
    pub token: String,
    pub token_secret: String,
    pub user_id: Option<String>,
    pub screen_name: Option<String>,
}

/// HMAC-SHA1 request signer shared by the flow and the twitter adapter.
#[derive(Debug, Clone)]
pub struct OAuth1Signer {
    consumer_key: String,
    consumer_secret: String,
}

impl OAuth1Signer {
    pub fn new(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
        }
    }

    /// Build the `Authorization: OAuth ...` header for a request.
    ///
    /// `extra_params` take part in the signature base string but are not
    /// emitted in the header (they travel in the query or form body).
    pub fn auth_header(
        &self,
        method: &str,
        url: &str,
        extra_params: &BTreeMap<String, String>,
        token: Option<&str>,
        token_secret: Option<&str>,
    ) -> Result<String> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs().to_string())
            .unwrap_or_else(|_| "0".to_string());

        let mut oauth_params: BTreeMap<String, String> = BTreeMap::new();
        oauth_params.insert("oauth_consumer_key".to_string(), self.consumer_key.clone());
        oauth_params.insert("oauth_nonce".to_string(), generate_nonce());
        oauth_params.insert("oauth_signature_method".to_string(), "HMAC-SHA1".to_string());
        oauth_params.insert("oauth_timestamp".to_string(), timestamp);
        oauth_params.insert("oauth_version".to_string(), "1.0".to_string());
        if let Some(t) = token {
            oauth_params.insert("oauth_token".to_string(), t.to_string());
        }
        for (k, v) in extra_params {
            oauth_params.insert(k.clone(), v.clone());
        }

        let signature =
            self.signature(method, url, &oauth_params, token_secret.unwrap_or(""))?;
        oauth_params.insert("oauth_signature".to_string(), signature);

        // Only oauth_* parameters belong in the header.
        oauth_params.retain(|k, _| k.starts_with("oauth_"));

        let header_parts: Vec<String> = oauth_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect();

        Ok(format!("OAuth {}", header_parts.join(", ")))
    }

    /// HMAC-SHA1 over the RFC 5849 signature base string.
    fn signature(
        &self,
        method: &str,
        url: &str,
        params: &BTreeMap<String, String>,
        token_secret: &str,
    ) -> Result<String> {
        let parsed = Url::parse(url).map_err(|e| CrosscastError::caught(MODULE, e))?;
        let base_url = format!(
            "{}://{}{}",
            parsed.scheme(),
            parsed.host_str().unwrap_or(""),
            parsed.path()
        );

        // Query parameters join the signature set, sorted by the BTreeMap.
        let mut all_params = params.clone();
        for (k, v) in parsed.query_pairs() {
            all_params.insert(k.to_string(), v.to_string());
        }

        let param_string: String = all_params
            .iter()
            .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let signature_base = format!(
            "{}&{}&{}",
            method.to_uppercase(),
            percent_encode(&base_url),
            percent_encode(&param_string)
        );

        let signing_key = format!(
            "{}&{}",
            percent_encode(&self.consumer_secret),
            percent_encode(token_secret)
        );

        let mut mac = Hmac::<Sha1>::new_from_slice(signing_key.as_bytes())
            .map_err(|e| CrosscastError::caught(MODULE, e))?;
        mac.update(signature_base.as_bytes());

        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

/// State machine for the Twitter authorization handshake.
pub struct TwitterOAuthFlow {
    config: OAuth1Config,
    signer: OAuth1Signer,
    vault: CredentialVault,
    pending: PendingStore,
    http: reqwest::Client,
}

impl TwitterOAuthFlow {
    pub fn new(
        config: OAuth1Config,
        vault: CredentialVault,
        pending: PendingStore,
        http: reqwest::Client,
    ) -> Self {
        let signer = OAuth1Signer::new(&config.consumer_key, &config.consumer_secret);
        Self {
            config,
            signer,
            vault,
            pending,
            http,
        }
    }

    /// Start the handshake: obtain a request token and hand the caller the
    /// provider authorize URL to redirect the user to.
    pub async fn authorization_url(&self) -> Result<String> {
        let mut params = BTreeMap::new();
        params.insert("oauth_callback".to_string(), self.config.callback_url.clone());
        params.insert("x_auth_access_type".to_string(), "write".to_string());

        let auth_header = self.signer.auth_header(
            "POST",
            &self.config.request_token_url,
            &params,
            None,
            None,
        )?;

        let response = self
            .http
            .post(&self.config.request_token_url)
            .header("Authorization", auth_header)
            .form(&[
                ("oauth_callback", self.config.callback_url.as_str()),
                ("x_auth_access_type", "write"),
            ])
            .send()
            .await
            .map_err(|e| CrosscastError::caught(MODULE, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CrosscastError::caught(MODULE, e))?;
        if !status.is_success() {
            return Err(CrosscastError::Request {
                module: MODULE.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let (token, token_secret) = parse_token_pair(&body)?;
        self.pending.issue(&token, MODULE, Some(token_secret));

        tracing::debug!(token = %token, "issued twitter request token");
        Ok(format!(
            "{}?oauth_token={}",
            self.config.authorize_url, token
        ))
    }

    /// Complete the handshake from the provider callback.
    ///
    /// The token must match an outstanding request token; a token this flow
    /// did not issue (or one already redeemed) is refused without any
    /// exchange attempt.
    pub async fn handle_callback(
        &self,
        oauth_token: &str,
        oauth_verifier: &str,
    ) -> Result<TwitterCredential> {
        let entry = self.pending.consume(oauth_token).ok_or_else(|| {
            CrosscastError::Unauthorized("unknown or expired oauth_token".to_string())
        })?;
        let request_secret = entry.secret.unwrap_or_default();

        let mut params = BTreeMap::new();
        params.insert("oauth_verifier".to_string(), oauth_verifier.to_string());

        let auth_header = self.signer.auth_header(
            "POST",
            &self.config.access_token_url,
            &params,
            Some(oauth_token),
            Some(&request_secret),
        )?;

        let response = self
            .http
            .post(&self.config.access_token_url)
            .header("Authorization", auth_header)
            .form(&[("oauth_verifier", oauth_verifier)])
            .send()
            .await
            .map_err(|e| CrosscastError::caught(MODULE, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CrosscastError::caught(MODULE, e))?;
        if !status.is_success() {
            return Err(CrosscastError::Request {
                module: MODULE.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let credential = parse_access_token(&body)?;
        self.vault.put(TWITTER_TOKEN_KIND, &credential).await?;

        tracing::info!(screen_name = ?credential.screen_name, "twitter authorization completed");
        Ok(credential)
    }

    /// Whether a credential exists and when it was created.
    pub async fn auth_status(&self) -> Result<AuthStatus> {
        self.vault.status(TWITTER_TOKEN_KIND).await
    }
}

fn parse_form_body(body: &str) -> Result<HashMap<String, String>> {
    serde_urlencoded::from_str(body).map_err(|e| CrosscastError::caught(MODULE, e))
}

fn extract_token_pair(params: &HashMap<String, String>) -> Result<(String, String)> {
    let token = params
        .get("oauth_token")
        .cloned()
        .ok_or_else(|| CrosscastError::caught(MODULE, "missing oauth_token in response"))?;
    let secret = params
        .get("oauth_token_secret")
        .cloned()
        .ok_or_else(|| CrosscastError::caught(MODULE, "missing oauth_token_secret in response"))?;
    Ok((token, secret))
}

fn parse_token_pair(body: &str) -> Result<(String, String)> {
    extract_token_pair(&parse_form_body(body)?)
}

fn parse_access_token(body: &str) -> Result<TwitterCredential> {
    let params = parse_form_body(body)?;
    let (token, token_secret) = extract_token_pair(&params)?;
    Ok(TwitterCredential {
        token,
        token_secret,
        user_id: params.get("user_id").cloned(),
        screen_name: params.get("screen_name").cloned(),
    })
}

fn generate_nonce() -> String {
    let bytes: Vec<u8> = (0..32).map(|_| rand::random()).collect();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Percent-encode per RFC 3986 (unreserved characters pass through).
pub(crate) fn percent_encode(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for byte in s.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            result.push(byte as char);
        } else {
            result.push_str(&format!("%{:02X}", byte));
        }
    }
    result
}
