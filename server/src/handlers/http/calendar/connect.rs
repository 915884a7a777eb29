//! Connecting and disconnecting a user's Google account.
//!
//! `handle_authorize` mints a single-use state bound to the caller and sends
//! the browser to Google. Google sends it back to `handle_callback` without
//! our bearer token, so the callback trusts nothing but that state value.

use std::convert::Infallible;

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::{Request, Response, StatusCode};
use tracing::{info, warn};

use worldsync_shared::types::calendar::AuthorizationUrl;

use crate::AppState;
use crate::auth::Principal;
use crate::database::credentials::CredentialStore;
use crate::google::oauth::{OAuthExchangeClient, build_authorization_url};
use crate::handlers::http::routes::unauthorized;
use crate::handlers::http::utils::{
    deliver_error_json, deliver_redirect, deliver_serialized_json, deliver_success_json,
    get_query_param,
};

use super::resolve_user_id;

/// `GET /api/google/calendar/auth[?mode=json]`
pub async fn handle_authorize(
    req: Request<hyper::body::Incoming>,
    state: AppState,
    principal: Principal,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let Some(user_id) = resolve_user_id(&state, &principal).await? else {
        return unauthorized();
    };

    let oauth_state = state.pending.issue(user_id).await;
    let google = &state.config.google;
    let url = build_authorization_url(
        &google.auth_url,
        &google.client_id,
        &google.redirect_uri,
        &google.scopes,
        &oauth_state,
    );

    info!("Starting Google authorization for user {}", user_id);

    if get_query_param(req.uri(), "mode").as_deref() == Some("json") {
        deliver_serialized_json(&AuthorizationUrl { url }, StatusCode::OK)
    } else {
        deliver_redirect(&url)
    }
}

/// `GET /api/google/calendar/callback?code=..&state=..`
pub async fn handle_callback(
    req: Request<hyper::body::Incoming>,
    state: AppState,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let uri = req.uri();

    if let Some(reason) = get_query_param(uri, "error") {
        warn!("Google authorization was declined: {}", reason);
        // The state is spent either way.
        if let Some(oauth_state) = get_query_param(uri, "state") {
            state.pending.take(&oauth_state).await;
        }
        return deliver_error_json(
            "GOOGLE_AUTH_DENIED",
            "Google authorization was not granted",
            StatusCode::BAD_REQUEST,
        );
    }

    let (Some(code), Some(oauth_state)) = (get_query_param(uri, "code"), get_query_param(uri, "state"))
    else {
        return deliver_error_json(
            "MISSING_PARAMETER",
            "Both code and state are required",
            StatusCode::BAD_REQUEST,
        );
    };

    let Some(user_id) = state.pending.take(&oauth_state).await else {
        return deliver_error_json(
            "INVALID_STATE",
            "Authorization request is unknown or has expired. Please try again.",
            StatusCode::BAD_REQUEST,
        );
    };

    let pair = match state
        .oauth
        .exchange_code(&code, &state.oauth_credentials, &state.config.google.redirect_uri)
        .await
    {
        Ok(pair) => pair,
        Err(e) => {
            warn!("Code exchange for user {} failed: {}", user_id, e);
            return deliver_error_json(
                "GOOGLE_EXCHANGE_FAILED",
                "Could not complete Google authorization. Please try again.",
                StatusCode::BAD_GATEWAY,
            );
        }
    };

    state
        .credentials
        .put(user_id, &pair.access_token, pair.refresh_token.as_deref())
        .await
        .context("Failed to store Google credential")?;

    info!("Google Calendar connected for user {}", user_id);
    deliver_success_json(Some(serde_json::json!({ "connected": true })))
}

/// `DELETE /api/google/calendar`
pub async fn handle_disconnect(
    _req: Request<hyper::body::Incoming>,
    state: AppState,
    principal: Principal,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let Some(user_id) = resolve_user_id(&state, &principal).await? else {
        return unauthorized();
    };

    state
        .credentials
        .clear(user_id)
        .await
        .context("Failed to clear Google credential")?;

    info!("Google Calendar disconnected for user {}", user_id);
    deliver_success_json(Some(serde_json::json!({ "connected": false })))
}
