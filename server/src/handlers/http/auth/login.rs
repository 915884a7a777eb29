use std::convert::Infallible;

use anyhow::Result;
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::{Request, Response, StatusCode};
use tracing::{error, info, warn};

use worldsync_shared::types::login::{LoginData, LoginError, LoginResponse};

use crate::AppState;
use crate::database::users::{get_user_auth, update_last_login};
use crate::database::utils::{sanitize_string, verify_password};
use crate::handlers::http::utils::{deliver_serialized_json, read_json};

/// `POST /api/auth/login`: check the password and mint a bearer token.
pub async fn handle_login(
    req: Request<hyper::body::Incoming>,
    state: AppState,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    info!("Processing login request");

    let login_data = match read_json::<LoginData, _>(req).await {
        Ok(data) => data,
        Err(e) => {
            warn!("Login body rejected: {}", e);
            return deliver_login_error(LoginError::MalformedBody);
        }
    };

    let login_data = match validate_login(login_data) {
        Ok(data) => data,
        Err(login_error) => {
            warn!("Login validation failed: {}", login_error.to_code());
            return deliver_login_error(login_error);
        }
    };

    match attempt_login(&login_data, &state).await {
        Ok(response) => {
            info!("User logged in successfully: {}", login_data.username);
            deliver_serialized_json(&response, StatusCode::OK)
        }
        Err(login_error) => {
            warn!(
                "Login failed for {}: {}",
                login_data.username,
                login_error.to_code()
            );
            deliver_login_error(login_error)
        }
    }
}

fn login_status(login_error: &LoginError) -> StatusCode {
    match login_error {
        LoginError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        LoginError::MissingField(_) | LoginError::MalformedBody => StatusCode::BAD_REQUEST,
        LoginError::DatabaseError | LoginError::InternalError => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn deliver_login_error(login_error: LoginError) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    deliver_serialized_json(&login_error.to_response(), login_status(&login_error))
}

/// Trim the username and require both fields.
fn validate_login(data: LoginData) -> Result<LoginData, LoginError> {
    let username = sanitize_string(&data.username);
    if username.is_empty() {
        return Err(LoginError::MissingField("username".to_string()));
    }

    if data.password.is_empty() {
        return Err(LoginError::MissingField("password".to_string()));
    }

    Ok(LoginData {
        username,
        password: data.password,
    })
}

async fn attempt_login(data: &LoginData, state: &AppState) -> Result<LoginResponse, LoginError> {
    let user = get_user_auth(&state.db, &data.username)
        .await
        .map_err(|e| {
            error!("Database error during login: {}", e);
            LoginError::DatabaseError
        })?
        .ok_or(LoginError::InvalidCredentials)?;

    let valid = verify_password(&user.password_hash, &data.password).map_err(|e| {
        error!("Password verification error for user {}: {}", user.id, e);
        LoginError::InternalError
    })?;

    if !valid {
        return Err(LoginError::InvalidCredentials);
    }

    if let Err(e) = update_last_login(&state.db, user.id).await {
        warn!("Failed to record last login for user {}: {}", user.id, e);
    }

    let token = state.codec.issue(&user.username).map_err(|e| {
        error!("Failed to issue token for user {}: {}", user.id, e);
        LoginError::InternalError
    })?;

    Ok(LoginResponse::Success {
        username: user.username,
        token: token.into_string(),
        token_type: "Bearer".to_string(),
        expires_in: state.codec.ttl().as_secs(),
    })
}
