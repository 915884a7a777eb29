//! The process-wide HMAC key for bearer tokens.
//!
//! The key is provisioned as base64 text by a [`SecretSource`] and decoded
//! once at startup. A missing, blank, undecodable or short key is a
//! [`KeyError`] and `main` refuses to start. The key bytes never leave this
//! module except as `jsonwebtoken` keys, and `Debug` is redacted.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use jsonwebtoken::{DecodingKey, EncodingKey};
use thiserror::Error;
use tracing::info;

use worldsync_shared::types::server_config::AuthConfig;

/// HS256 needs at least 256 bits of key material.
pub const MIN_KEY_BYTES: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("signing key `{0}` is not set")]
    Missing(String),

    #[error("signing key `{0}` is blank")]
    Blank(String),

    #[error("signing key `{0}` is not valid base64")]
    NotBase64(String),

    #[error("signing key `{name}` decodes to {len} bytes, need at least {MIN_KEY_BYTES}")]
    TooShort { name: String, len: usize },
}

/// Where secrets come from.
pub trait SecretSource: Send + Sync {
    /// Look up a secret by name. `None` means "not provisioned".
    fn secret(&self, name: &str) -> Option<String>;
}

/// Environment variable first, then the value from the config file.
#[derive(Clone)]
pub struct EnvOrConfigSecret {
    fallback: Option<String>,
}

impl EnvOrConfigSecret {
    pub fn new(fallback: Option<String>) -> Self {
        Self { fallback }
    }

    pub fn from_auth_config(auth: &AuthConfig) -> Self {
        Self::new(auth.signing_key.clone())
    }
}

impl SecretSource for EnvOrConfigSecret {
    fn secret(&self, name: &str) -> Option<String> {
        std::env::var(name)
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| self.fallback.clone())
    }
}

#[derive(Clone)]
pub struct SigningKey {
    bytes: Vec<u8>,
}

impl SigningKey {
    /// Fetch `name` from `source` and decode it.
    pub fn load(source: &dyn SecretSource, name: &str) -> Result<Self, KeyError> {
        let raw = source
            .secret(name)
            .ok_or_else(|| KeyError::Missing(name.to_string()))?;

        let key = Self::from_base64(name, &raw)?;
        info!("Signing key `{}` loaded ({} bytes)", name, key.bytes.len());
        Ok(key)
    }

    fn from_base64(name: &str, raw: &str) -> Result<Self, KeyError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(KeyError::Blank(name.to_string()));
        }

        let bytes = STANDARD
            .decode(trimmed)
            .map_err(|_| KeyError::NotBase64(name.to_string()))?;

        Self::from_bytes(name, bytes)
    }

    fn from_bytes(name: &str, bytes: Vec<u8>) -> Result<Self, KeyError> {
        if bytes.len() < MIN_KEY_BYTES {
            return Err(KeyError::TooShort {
                name: name.to_string(),
                len: bytes.len(),
            });
        }
        Ok(Self { bytes })
    }

    /// Build a key from raw bytes; used by tests and tooling.
    pub fn from_raw(bytes: impl Into<Vec<u8>>) -> Result<Self, KeyError> {
        Self::from_bytes("raw", bytes.into())
    }

    pub(crate) fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(&self.bytes)
    }

    pub(crate) fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(&self.bytes)
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningKey(<{} bytes redacted>)", self.bytes.len())
    }
}
