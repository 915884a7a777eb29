//! Google's OAuth 2.0 token endpoint: authorization-code exchange and
//! refresh-token grants.
//!
//! Both calls are single form-encoded POSTs with a bounded timeout and are
//! never retried here. An `invalid_grant` answer is reported as
//! [`OAuthError::InvalidGrant`] so callers can tell "the user must
//! re-authorize" apart from a transient failure.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use worldsync_shared::types::server_config::GoogleConfig;

use crate::BoxFuture;

use super::truncate_error_body;

#[derive(Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Result of a code exchange. Google only returns a refresh token when the
/// user was shown the consent screen.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    pub access_token: String,
}

impl std::fmt::Debug for RefreshedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RefreshedToken(<redacted>)")
    }
}

#[derive(Debug, Error)]
pub enum OAuthError {
    /// The code or refresh token was revoked, expired or already used.
    #[error("authorization server rejected the grant (invalid_grant)")]
    InvalidGrant,

    #[error("authorization server returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("token request failed: {0}")]
    Network(String),

    #[error("token request timed out")]
    Timeout,

    #[error("invalid token response: {0}")]
    InvalidResponse(String),
}

impl OAuthError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(e.to_string())
        }
    }
}

pub trait OAuthExchangeClient: Send + Sync {
    /// Trade a one-time authorization code for a token pair.
    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
        credentials: &'a OAuthCredentials,
        redirect_uri: &'a str,
    ) -> BoxFuture<'a, Result<TokenPair, OAuthError>>;

    /// Get a fresh access token for a stored refresh token.
    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
        credentials: &'a OAuthCredentials,
    ) -> BoxFuture<'a, Result<RefreshedToken, OAuthError>>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct TokenErrorBody {
    error: String,
}

#[derive(Debug, Clone)]
pub struct GoogleOAuthClient {
    http: reqwest::Client,
    token_url: String,
}

impl GoogleOAuthClient {
    pub fn new(token_url: impl Into<String>, timeout: Duration) -> Result<Self, OAuthError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OAuthError::Network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            token_url: token_url.into(),
        })
    }

    pub fn from_config(config: &GoogleConfig) -> Result<Self, OAuthError> {
        Self::new(
            config.token_url.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    async fn post_token_form(&self, params: &[(&str, &str)]) -> Result<TokenResponse, OAuthError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(params)
            .send()
            .await
            .map_err(OAuthError::from_reqwest)?;

        let status = response.status();
        let body = response.text().await.map_err(OAuthError::from_reqwest)?;

        if !status.is_success() {
            return Err(classify_failure(status.as_u16(), body));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| OAuthError::InvalidResponse(e.to_string()))?;

        if token.access_token.trim().is_empty() {
            return Err(OAuthError::InvalidResponse(
                "empty access_token".to_string(),
            ));
        }
        Ok(token)
    }
}

fn classify_failure(status: u16, body: String) -> OAuthError {
    if let Ok(parsed) = serde_json::from_str::<TokenErrorBody>(&body) {
        if parsed.error == "invalid_grant" {
            return OAuthError::InvalidGrant;
        }
    }

    OAuthError::Rejected {
        status,
        body: truncate_error_body(body),
    }
}

impl OAuthExchangeClient for GoogleOAuthClient {
    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
        credentials: &'a OAuthCredentials,
        redirect_uri: &'a str,
    ) -> BoxFuture<'a, Result<TokenPair, OAuthError>> {
        Box::pin(async move {
            let params = [
                ("code", code),
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ];

            let token = self.post_token_form(&params).await.inspect_err(|e| {
                warn!("Authorization code exchange failed: {}", e);
            })?;

            info!(
                "Exchanged authorization code (refresh token {})",
                if token.refresh_token.is_some() {
                    "included"
                } else {
                    "omitted"
                }
            );

            Ok(TokenPair {
                access_token: token.access_token,
                refresh_token: token.refresh_token.filter(|r| !r.trim().is_empty()),
            })
        })
    }

    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
        credentials: &'a OAuthCredentials,
    ) -> BoxFuture<'a, Result<RefreshedToken, OAuthError>> {
        Box::pin(async move {
            let params = [
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ];

            let token = self.post_token_form(&params).await?;
            debug!("Refreshed access token (expires_in={:?})", token.expires_in);

            Ok(RefreshedToken {
                access_token: token.access_token,
            })
        })
    }
}

/// Build the consent-page URL the browser is sent to.
///
/// `access_type=offline` together with `prompt=consent` makes Google return
/// a refresh token on every authorization, not just the first one.
pub fn build_authorization_url(
    auth_url: &str,
    client_id: &str,
    redirect_uri: &str,
    scopes: &[String],
    state: &str,
) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", &scopes.join(" "))
        .append_pair("state", state)
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent")
        .finish();

    let separator = if auth_url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", auth_url, separator, query)
}
