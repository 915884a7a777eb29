use std::convert::Infallible;

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::{Request, Response, StatusCode};
use tracing::warn;

use worldsync_shared::types::login::UserProfile;

use crate::AppState;
use crate::auth::Principal;
use crate::database::users::get_user_by_username;
use crate::handlers::http::routes::unauthorized;
use crate::handlers::http::utils::deliver_serialized_json;

/// `GET /api/auth/me`
pub async fn handle_me(
    _req: Request<hyper::body::Incoming>,
    state: AppState,
    principal: Principal,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let user = get_user_by_username(&state.db, &principal.subject)
        .await
        .context("Failed to load user profile")?;

    // A valid token for a user that no longer exists.
    let Some(user) = user else {
        warn!("Token subject {} has no user row", principal.subject);
        return unauthorized();
    };

    let profile = UserProfile {
        id: user.id,
        google_connected: user.google_connected(),
        username: user.username,
        email: user.email,
    };
    deliver_serialized_json(&profile, StatusCode::OK)
}
