use std::sync::Arc;
use std::task::{Context, Poll};

use hyper::Request;
use tower::{Layer, Service};

use crate::auth::{IdentityGate, TokenCodec};

/// Tower layer that attaches a verified [`Principal`](crate::auth::Principal)
/// to each request carrying a good bearer token.
///
/// The layer never rejects anything. Protected routes check the extension
/// and answer 401 themselves, so open routes work with or without a token.
#[derive(Clone)]
pub struct IdentityLayer {
    gate: IdentityGate,
}

impl IdentityLayer {
    pub fn new(codec: Arc<TokenCodec>) -> Self {
        Self {
            gate: IdentityGate::new(codec),
        }
    }
}

impl<S> Layer<S> for IdentityLayer {
    type Service = IdentityService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        IdentityService {
            inner,
            gate: self.gate.clone(),
        }
    }
}

#[derive(Clone)]
pub struct IdentityService<S> {
    inner: S,
    gate: IdentityGate,
}

impl<S, ReqBody> Service<Request<ReqBody>> for IdentityService<S>
where
    S: Service<Request<ReqBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        self.gate.apply(&mut req);
        self.inner.call(req)
    }
}
