pub mod check;
pub mod connect;
pub mod events;

use std::convert::Infallible;

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::{Response, StatusCode};
use tracing::{error, warn};

use crate::AppState;
use crate::auth::Principal;
use crate::database::users::get_user_id;
use crate::google::InvokeError;
use crate::handlers::http::utils::deliver_error_json;

/// Map the token subject to the user row id. `None` when the user has been
/// deleted since the token was issued.
pub(crate) async fn resolve_user_id(state: &AppState, principal: &Principal) -> Result<Option<i64>> {
    let user_id = get_user_id(&state.db, &principal.subject)
        .await
        .context("Failed to resolve token subject")?;

    if user_id.is_none() {
        warn!("Token subject {} has no user row", principal.subject);
    }
    Ok(user_id)
}

pub(crate) fn invoke_error_status(err: &InvokeError) -> (StatusCode, &'static str, &'static str) {
    match err {
        InvokeError::NotConnected => (
            StatusCode::BAD_REQUEST,
            "GOOGLE_NOT_CONNECTED",
            "Google Calendar is not connected. Connect your Google account first.",
        ),
        InvokeError::ReconnectRequired { .. } => (
            StatusCode::UNAUTHORIZED,
            "GOOGLE_RECONNECT_REQUIRED",
            "Google Calendar access has expired. Please reconnect your Google account.",
        ),
        InvokeError::Upstream(_) => (
            StatusCode::BAD_GATEWAY,
            "GOOGLE_API_ERROR",
            "Google Calendar request failed. Please try again later.",
        ),
        InvokeError::Store(_) | InvokeError::Stalled(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "An internal error occurred",
        ),
    }
}

pub(crate) fn deliver_invoke_error(
    user_id: i64,
    err: &InvokeError,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let (status, code, message) = invoke_error_status(err);
    if status.is_server_error() {
        error!("Calendar call for user {} failed: {}", user_id, err);
    } else {
        warn!("Calendar call for user {} failed: {}", user_id, err);
    }
    deliver_error_json(code, message, status)
}
