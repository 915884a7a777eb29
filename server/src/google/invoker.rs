//! Refresh-and-retry-once around calls that use a user's Google access token.
//!
//! Google access tokens expire after about an hour and we never learn the
//! expiry up front; the first sign is a 401 from the resource server. The
//! protocol is:
//!
//! ```text
//! Idle ──Start──▶ Invoking ──CallSucceeded──▶ Succeeded
//!                    │  └──────CallFailed────▶ Failed
//!                    └─CallUnauthorized─▶ Refreshing ──NoRefreshToken / RefreshDenied──▶ Failed
//!                                            └─RefreshSucceeded─▶ RetryInvoking ──CallSucceeded──▶ Succeeded
//!                                                                     └──CallFailed / CallUnauthorized──▶ Failed
//! ```
//!
//! [`transition`] is the whole table; [`ResilientInvoker::invoke`] performs
//! the side effects for each state and feeds the outcome back as an event.
//! There is at most one refresh and at most one retry per invocation.

use std::future::Future;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::database::credentials::{CredentialStore, StoreError};

use super::calendar::CalendarError;
use super::oauth::{OAuthCredentials, OAuthError, OAuthExchangeClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeState {
    Idle,
    Invoking,
    Refreshing,
    RetryInvoking,
    Succeeded,
    Failed,
}

impl InvokeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeEvent {
    Start,
    CallSucceeded,
    /// The resource server answered 401.
    CallUnauthorized,
    /// Any other failure: non-401 status, network error, timeout.
    CallFailed,
    NoRefreshToken,
    RefreshSucceeded,
    RefreshDenied,
}

/// Next state for `event` in `state`.
///
/// Terminal states absorb every event. An event that has no meaning in the
/// current state fails the invocation.
pub fn transition(state: InvokeState, event: InvokeEvent) -> InvokeState {
    use InvokeEvent as E;
    use InvokeState as S;

    match (state, event) {
        (S::Succeeded, _) => S::Succeeded,
        (S::Failed, _) => S::Failed,

        (S::Idle, E::Start) => S::Invoking,

        (S::Invoking, E::CallSucceeded) => S::Succeeded,
        (S::Invoking, E::CallUnauthorized) => S::Refreshing,
        (S::Invoking, E::CallFailed) => S::Failed,

        (S::Refreshing, E::RefreshSucceeded) => S::RetryInvoking,
        (S::Refreshing, E::NoRefreshToken | E::RefreshDenied) => S::Failed,

        (S::RetryInvoking, E::CallSucceeded) => S::Succeeded,
        (S::RetryInvoking, E::CallUnauthorized | E::CallFailed) => S::Failed,

        _ => S::Failed,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectReason {
    /// We hold no refresh token for the user.
    NoRefreshToken,
    /// Google answered `invalid_grant`: revoked, expired or reused.
    Revoked,
    /// The refresh request failed for another reason.
    RefreshFailed(String),
}

impl std::fmt::Display for ReconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoRefreshToken => f.write_str("no refresh token stored"),
            Self::Revoked => f.write_str("refresh token revoked"),
            Self::RefreshFailed(detail) => write!(f, "refresh failed: {}", detail),
        }
    }
}

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("no Google credential stored for this user")]
    NotConnected,

    #[error("Google access cannot be renewed ({reason}); the user must reconnect")]
    ReconnectRequired { reason: ReconnectReason },

    #[error("calendar call failed: {0}")]
    Upstream(#[source] CalendarError),

    #[error("credential store failed: {0}")]
    Store(#[from] StoreError),

    #[error("invoker stopped in state {0:?}")]
    Stalled(InvokeState),
}

/// Runs one calendar operation for one user with the refresh protocol above.
pub struct ResilientInvoker<'a, S: ?Sized, O: ?Sized> {
    store: &'a S,
    oauth: &'a O,
    credentials: &'a OAuthCredentials,
}

impl<'a, S, O> ResilientInvoker<'a, S, O>
where
    S: CredentialStore + ?Sized,
    O: OAuthExchangeClient + ?Sized,
{
    pub fn new(store: &'a S, oauth: &'a O, credentials: &'a OAuthCredentials) -> Self {
        Self {
            store,
            oauth,
            credentials,
        }
    }

    /// Call `op` with the stored access token, refreshing and retrying once
    /// on a 401.
    pub async fn invoke<T, F, Fut>(&self, owner_id: i64, op: F) -> Result<T, InvokeError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, CalendarError>>,
    {
        let credential = self
            .store
            .get(owner_id)
            .await?
            .ok_or(InvokeError::NotConnected)?;

        let mut access_token = credential.access_token;
        let mut state = transition(InvokeState::Idle, InvokeEvent::Start);

        loop {
            match state {
                InvokeState::Invoking | InvokeState::RetryInvoking => {
                    let result = op(access_token.clone()).await;
                    let event = match &result {
                        Ok(_) => InvokeEvent::CallSucceeded,
                        Err(e) if e.is_unauthorized() => InvokeEvent::CallUnauthorized,
                        Err(_) => InvokeEvent::CallFailed,
                    };
                    let next = transition(state, event);
                    debug!("Invoker for user {}: {:?} --{:?}--> {:?}", owner_id, state, event, next);
                    state = next;

                    if state.is_terminal() {
                        return result.map_err(InvokeError::Upstream);
                    }
                }

                InvokeState::Refreshing => match self.refresh(owner_id).await? {
                    Ok(fresh) => {
                        access_token = fresh;
                        state = transition(state, InvokeEvent::RefreshSucceeded);
                    }
                    Err(reason) => {
                        let event = match &reason {
                            ReconnectReason::NoRefreshToken => InvokeEvent::NoRefreshToken,
                            _ => InvokeEvent::RefreshDenied,
                        };
                        debug!(
                            "Invoker for user {}: {:?} --{:?}--> {:?}",
                            owner_id,
                            state,
                            event,
                            transition(state, event)
                        );
                        warn!("User {} must reconnect Google: {}", owner_id, reason);
                        return Err(InvokeError::ReconnectRequired { reason });
                    }
                },

                InvokeState::Idle | InvokeState::Succeeded | InvokeState::Failed => {
                    return Err(InvokeError::Stalled(state));
                }
            }
        }
    }

    /// Exchange the stored refresh token for a new access token and persist
    /// it. The outer error is a store failure; the inner one says why the
    /// user has to reconnect.
    async fn refresh(&self, owner_id: i64) -> Result<Result<String, ReconnectReason>, StoreError> {
        let refresh_token = self
            .store
            .get(owner_id)
            .await?
            .and_then(|c| c.refresh_token)
            .filter(|r| !r.trim().is_empty());

        let Some(refresh_token) = refresh_token else {
            return Ok(Err(ReconnectReason::NoRefreshToken));
        };

        let fresh = match self.oauth.refresh(&refresh_token, self.credentials).await {
            Ok(fresh) => fresh,
            Err(OAuthError::InvalidGrant) => return Ok(Err(ReconnectReason::Revoked)),
            Err(e) => return Ok(Err(ReconnectReason::RefreshFailed(e.to_string()))),
        };

        // A disconnect can land while the refresh is in flight. The rotation
        // only writes while a refresh token is still stored, so it never
        // brings a cleared row back.
        match self.store.rotate_access(owner_id, &fresh.access_token).await {
            Ok(true) => info!("Refreshed Google access token for user {}", owner_id),
            Ok(false) => {
                info!("User {} disconnected Google during refresh", owner_id);
                return Ok(Err(ReconnectReason::NoRefreshToken));
            }
            Err(e) => warn!(
                "Could not persist refreshed access token for user {}: {}; retrying with it anyway",
                owner_id, e
            ),
        }

        Ok(Ok(fresh.access_token))
    }
}
