use std::convert::Infallible;

use anyhow::Result;
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::{Request, Response, StatusCode};
use tracing::debug;

use worldsync_shared::types::calendar::{CalendarCheckResponse, CalendarStatus};

use crate::AppState;
use crate::auth::Principal;
use crate::google::{CalendarApi, InvokeError, ResilientInvoker};
use crate::handlers::http::routes::unauthorized;
use crate::handlers::http::utils::deliver_serialized_json;

use super::{deliver_invoke_error, resolve_user_id};

/// `GET /api/google/calendar/check`
///
/// Calls the calendar with the stored token, refreshing it if needed, and
/// reports whether the connection is usable. `expired` is sent with a 401 so
/// clients can branch on the status alone.
pub async fn handle_check(
    _req: Request<hyper::body::Incoming>,
    state: AppState,
    principal: Principal,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let Some(user_id) = resolve_user_id(&state, &principal).await? else {
        return unauthorized();
    };

    let calendar = state.calendar.as_ref();
    let invoker = ResilientInvoker::new(
        &state.credentials,
        state.oauth.as_ref(),
        &state.oauth_credentials,
    );

    let result = invoker
        .invoke(user_id, |token| async move { calendar.check_access(&token).await })
        .await;

    let token_status = match status_for(result) {
        Ok(status) => status,
        Err(e) => return deliver_invoke_error(user_id, &e),
    };

    debug!("Calendar status for user {}: {:?}", user_id, token_status);
    let status = match token_status {
        CalendarStatus::Expired => StatusCode::UNAUTHORIZED,
        CalendarStatus::NoToken | CalendarStatus::Valid => StatusCode::OK,
    };
    deliver_serialized_json(&CalendarCheckResponse { token_status }, status)
}

/// Hands back the errors that say nothing about the token itself.
fn status_for(result: Result<(), InvokeError>) -> Result<CalendarStatus, InvokeError> {
    match result {
        Ok(()) => Ok(CalendarStatus::Valid),
        Err(InvokeError::NotConnected) => Ok(CalendarStatus::NoToken),
        Err(InvokeError::ReconnectRequired { .. }) => Ok(CalendarStatus::Expired),
        Err(InvokeError::Upstream(e)) if e.is_unauthorized() => Ok(CalendarStatus::Expired),
        Err(e) => Err(e),
    }
}
