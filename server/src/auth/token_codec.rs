use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;
use tracing::debug;

use worldsync_shared::types::jwt::JwtClaims;

use super::clock::{Clock, SystemClock};
use super::signing_key::SigningKey;

/// Bearer tokens live exactly this long and are never extended.
pub const TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// The verified identity carried by a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
    pub issued_at: u64,
    pub expires_at: u64,
}

impl From<JwtClaims> for Principal {
    fn from(claims: JwtClaims) -> Self {
        Self {
            subject: claims.sub,
            issued_at: claims.iat,
            expires_at: claims.exp,
        }
    }
}

/// A signed `header.payload.signature` string.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

#[derive(Debug, Error)]
#[error("failed to sign bearer token: {0}")]
pub struct TokenError(#[from] jsonwebtoken::errors::Error);

/// Why a presented token was not accepted.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum VerificationError {
    #[error("token expired")]
    Expired,
    #[error("token malformed")]
    Malformed,
    #[error("token signature invalid")]
    BadSignature,
}

pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    pub fn new(key: &SigningKey) -> Self {
        Self::with_clock(key, Arc::new(SystemClock))
    }

    pub fn with_clock(key: &SigningKey, clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against our own clock below, with no leeway.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.required_spec_claims = HashSet::from(["exp".to_string(), "sub".to_string()]);

        Self {
            encoding: key.encoding_key(),
            decoding: key.decoding_key(),
            validation,
            ttl: TOKEN_TTL,
            clock,
        }
    }

    /// Override the lifetime of newly issued tokens.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, subject: &str) -> Result<BearerToken, TokenError> {
        let now = self.clock.now();
        let claims = JwtClaims {
            sub: subject.to_string(),
            iat: now,
            exp: now + self.ttl.as_secs(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!("Issued bearer token for {} (exp={})", subject, claims.exp);
        Ok(BearerToken(token))
    }

    /// Check the signature, then that `exp` is still in the future.
    pub fn parse_and_verify(&self, token: &str) -> Result<Principal, VerificationError> {
        let data = decode::<JwtClaims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => VerificationError::BadSignature,
                ErrorKind::ExpiredSignature => VerificationError::Expired,
                _ => VerificationError::Malformed,
            }
        })?;

        let claims = data.claims;
        if claims.exp <= self.clock.now() {
            return Err(VerificationError::Expired);
        }

        Ok(claims.into())
    }

    pub fn extract_subject(&self, token: &str) -> Option<String> {
        self.parse_and_verify(token).ok().map(|p| p.subject)
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
