use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationData {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Registration response codes
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegistrationResponse {
    Success {
        user_id: i64,
        username: String,
        message: String,
    },
    Error {
        code: String,
        message: String,
    },
}

/// Error codes for registration
#[derive(Debug)]
pub enum RegistrationError {
    UsernameTaken,
    EmailTaken,
    InvalidUsername,
    InvalidPassword,
    InvalidEmail,
    MissingField(String),
    MalformedBody,
    DatabaseError,
    InternalError,
}

impl RegistrationError {
    pub fn to_code(&self) -> &'static str {
        match self {
            Self::UsernameTaken => "USERNAME_TAKEN",
            Self::EmailTaken => "EMAIL_TAKEN",
            Self::InvalidUsername => "INVALID_USERNAME",
            Self::InvalidPassword => "INVALID_PASSWORD",
            Self::InvalidEmail => "INVALID_EMAIL",
            Self::MissingField(_) => "MISSING_FIELD",
            Self::MalformedBody => "MALFORMED_BODY",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    pub fn to_message(&self) -> String {
        match self {
            Self::UsernameTaken => "Username is already taken.".to_string(),
            Self::EmailTaken => "Email is already in use.".to_string(),
            Self::InvalidUsername => {
                "Username must be 3-20 characters, alphanumeric or underscores only".to_string()
            }
            Self::InvalidPassword => {
                "Password must be at least 8 characters with at least one letter and one number"
                    .to_string()
            }
            Self::InvalidEmail => "Invalid email format".to_string(),
            Self::MissingField(field) => format!("Missing required field: {}", field),
            Self::MalformedBody => "Request body must be a JSON object".to_string(),
            Self::DatabaseError => "Database error occurred".to_string(),
            Self::InternalError => "Registration failed. Please try again.".to_string(),
        }
    }

    pub fn to_response(&self) -> RegistrationResponse {
        RegistrationResponse::Error {
            code: self.to_code().to_string(),
            message: self.to_message(),
        }
    }
}
