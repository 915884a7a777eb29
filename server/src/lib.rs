//! WorldSync auth server.
//!
//! Two concerns live here:
//!
//! * first-party identity: a stateless HS256 bearer token minted at login
//!   ([`auth::TokenCodec`]) and checked once per request by the identity gate
//!   ([`auth::IdentityGate`], mounted as a tower layer);
//! * the per-user Google OAuth credential: stored on the user row
//!   ([`database::credentials`]), obtained and refreshed through
//!   [`google::oauth`], and used by [`google::invoker`] which owns the
//!   refresh-and-retry-once protocol around every Calendar call.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use sqlx::SqlitePool;
use worldsync_shared::types::server_config::AppConfig;

pub mod app;
pub mod auth;
pub mod database;
pub mod google;
pub mod handlers;
pub mod tower_middle;

#[cfg(test)]
pub(crate) mod test_support;

use auth::TokenCodec;
use database::credentials::SqliteCredentialStore;
use google::calendar::GoogleCalendarClient;
use google::oauth::{GoogleOAuthClient, OAuthCredentials};
use google::pending::PendingAuthorizations;

/// A boxed, sendable future, for async methods on object-safe traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Everything a request handler may need, cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: SqlitePool,
    pub codec: Arc<TokenCodec>,
    pub credentials: SqliteCredentialStore,
    pub oauth: Arc<GoogleOAuthClient>,
    pub oauth_credentials: OAuthCredentials,
    pub calendar: Arc<GoogleCalendarClient>,
    pub pending: PendingAuthorizations,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("bind", &self.config.server.addr())
            .field("oauth", &self.oauth)
            .finish_non_exhaustive()
    }
}
