use std::convert::Infallible;

use anyhow::Result;
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::{Request, Response, StatusCode};
use tracing::{error, info, warn};

use worldsync_shared::types::register::{
    RegistrationData, RegistrationError, RegistrationResponse,
};

use crate::AppState;
use crate::database::users::{NewUser, create_user, email_exists, username_exists};
use crate::database::utils::{
    hash_password, is_strong_password, is_valid_email, is_valid_username, sanitize_string,
};
use crate::handlers::http::utils::{deliver_serialized_json, read_json};

/// `POST /api/auth/register`
pub async fn handle_register(
    req: Request<hyper::body::Incoming>,
    state: AppState,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    info!("Processing registration request");

    let data = match read_json::<RegistrationData, _>(req).await {
        Ok(data) => data,
        Err(e) => {
            warn!("Registration body rejected: {}", e);
            return deliver_registration_error(RegistrationError::MalformedBody);
        }
    };

    let data = match validate_registration(data) {
        Ok(data) => data,
        Err(reg_error) => {
            warn!("Registration validation failed: {}", reg_error.to_code());
            return deliver_registration_error(reg_error);
        }
    };

    match attempt_registration(&data, &state).await {
        Ok(user_id) => {
            info!("User registered: {} (ID: {})", data.username, user_id);
            let response = RegistrationResponse::Success {
                user_id,
                username: data.username,
                message: "Registration successful".to_string(),
            };
            deliver_serialized_json(&response, StatusCode::CREATED)
        }
        Err(reg_error) => {
            warn!(
                "Registration failed for {}: {}",
                data.username,
                reg_error.to_code()
            );
            deliver_registration_error(reg_error)
        }
    }
}

fn registration_status(reg_error: &RegistrationError) -> StatusCode {
    match reg_error {
        RegistrationError::DatabaseError | RegistrationError::InternalError => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        _ => StatusCode::BAD_REQUEST,
    }
}

fn deliver_registration_error(
    reg_error: RegistrationError,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    deliver_serialized_json(&reg_error.to_response(), registration_status(&reg_error))
}

/// Normalise and validate the submitted fields.
fn validate_registration(data: RegistrationData) -> Result<RegistrationData, RegistrationError> {
    let username = sanitize_string(&data.username);
    let email = sanitize_string(&data.email).to_lowercase();

    if username.is_empty() {
        return Err(RegistrationError::MissingField("username".to_string()));
    }
    if email.is_empty() {
        return Err(RegistrationError::MissingField("email".to_string()));
    }
    if data.password.is_empty() {
        return Err(RegistrationError::MissingField("password".to_string()));
    }

    if !is_valid_username(&username) {
        return Err(RegistrationError::InvalidUsername);
    }
    if !is_valid_email(&email) {
        return Err(RegistrationError::InvalidEmail);
    }
    if !is_strong_password(&data.password) {
        return Err(RegistrationError::InvalidPassword);
    }

    Ok(RegistrationData {
        username,
        email,
        password: data.password,
    })
}

async fn attempt_registration(
    data: &RegistrationData,
    state: &AppState,
) -> Result<i64, RegistrationError> {
    let db_error = |e: sqlx::Error| {
        error!("Database error during registration: {}", e);
        RegistrationError::DatabaseError
    };

    if username_exists(&state.db, &data.username)
        .await
        .map_err(db_error)?
    {
        return Err(RegistrationError::UsernameTaken);
    }
    if email_exists(&state.db, &data.email).await.map_err(db_error)? {
        return Err(RegistrationError::EmailTaken);
    }

    let password_hash = hash_password(&data.password).map_err(|e| {
        error!("Password hashing failed: {}", e);
        RegistrationError::InternalError
    })?;

    let new_user = NewUser {
        username: data.username.clone(),
        email: data.email.clone(),
        password_hash,
    };

    // The UNIQUE constraints catch a concurrent registration that slipped
    // past the checks above.
    create_user(&state.db, &new_user).await.map_err(|e| {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return if db.message().contains("users.email") {
                    RegistrationError::EmailTaken
                } else {
                    RegistrationError::UsernameTaken
                };
            }
        }
        db_error(e)
    })
}
