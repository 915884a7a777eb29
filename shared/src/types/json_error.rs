use serde::{Deserialize, Serialize};

/// Body of every non-2xx JSON response the server produces.
///
/// `code` is the stable, machine-readable part (`UNAUTHORIZED`,
/// `GOOGLE_RECONNECT_REQUIRED`, ...); `message` is for humans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.code == code
    }
}
