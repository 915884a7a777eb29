use std::sync::Arc;

use hyper::Request;
use hyper::header::{AUTHORIZATION, HeaderMap};
use tracing::debug;

use super::token_codec::{Principal, TokenCodec};

const BEARER_PREFIX: &str = "Bearer ";

/// Establishes who is calling, once per request.
///
/// The gate never rejects anything. A missing header, a header without the
/// `Bearer ` prefix, or a token that fails verification all leave the request
/// without a [`Principal`]; the router decides what that means for the route.
#[derive(Debug, Clone)]
pub struct IdentityGate {
    codec: Arc<TokenCodec>,
}

impl IdentityGate {
    pub fn new(codec: Arc<TokenCodec>) -> Self {
        Self { codec }
    }

    pub fn identify(&self, headers: &HeaderMap) -> Option<Principal> {
        let token = bearer_token(headers)?;
        match self.codec.parse_and_verify(token) {
            Ok(principal) => Some(principal),
            Err(reason) => {
                debug!("Ignoring bearer token: {}", reason);
                None
            }
        }
    }

    /// Attach the caller's identity to the request extensions.
    ///
    /// Any `Principal` already present is dropped first, so only a token
    /// verified here can produce an identity.
    pub fn apply<B>(&self, req: &mut Request<B>) {
        req.extensions_mut().remove::<Principal>();
        if let Some(principal) = self.identify(req.headers()) {
            req.extensions_mut().insert(principal);
        }
    }
}

/// The token after `Bearer `, if the header is present and well-formed.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
