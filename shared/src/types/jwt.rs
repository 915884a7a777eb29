use serde::{Deserialize, Serialize};

/// Claims embedded in every bearer token issued by the server.
///
/// The token is stateless: the server never stores it, and verification is a
/// signature check plus an expiry comparison. There is no revocation handle,
/// so a token stays valid until `exp` even after the user logs out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Standard JWT subject, set to the username.
    pub sub: String,

    /// Issued-at (Unix timestamp, seconds).
    pub iat: u64,

    /// Standard JWT expiry (Unix timestamp, seconds).
    pub exp: u64,
}
