use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::{Method, Request, Response, StatusCode};
use tracing::{debug, warn};

use crate::AppState;
use crate::auth::Principal;
use crate::handlers::http::auth::{login, me, register};
use crate::handlers::http::calendar::{check, connect, events};
use crate::handlers::http::utils::*;

// ---------------------------------------------------------------------------
// Handler type aliases
// ---------------------------------------------------------------------------
//
// Two tiers:
//
//   RouteHandler     : no identity required.  Receives (req, state).
//                      Use for: /login, /register, /health, the OAuth callback.
//
//   ProtectedHandler : the identity layer must have attached a Principal.
//                      Receives (req, state, principal).
//
// The identity layer never rejects a request; this router is the only place
// that turns "no Principal" into a 401.

type HandlerFuture =
    Pin<Box<dyn Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send>>;

type RouteHandler =
    Box<dyn Fn(Request<hyper::body::Incoming>, AppState) -> HandlerFuture + Send + Sync>;

type ProtectedHandler =
    Box<dyn Fn(Request<hyper::body::Incoming>, AppState, Principal) -> HandlerFuture + Send + Sync>;

enum RouteKind {
    Open(RouteHandler),
    Protected(ProtectedHandler),
}

struct Route {
    method: Method,
    path: String,
    kind: RouteKind,
}

pub struct Router {
    routes: Vec<Route>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes_count", &self.routes.len())
            .finish()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    fn open<F, Fut>(mut self, method: Method, path: &str, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.routes.push(Route {
            method,
            path: path.to_string(),
            kind: RouteKind::Open(Box::new(move |req, state| Box::pin(handler(req, state)))),
        });
        self
    }

    fn protected<F, Fut>(mut self, method: Method, path: &str, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState, Principal) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.routes.push(Route {
            method,
            path: path.to_string(),
            kind: RouteKind::Protected(Box::new(move |req, state, principal| {
                Box::pin(handler(req, state, principal))
            })),
        });
        self
    }

    // ── Open ──────────────────────────────────────────────────────────────────

    pub fn get<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.open(Method::GET, path, handler)
    }

    pub fn post<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.open(Method::POST, path, handler)
    }

    // ── Protected ─────────────────────────────────────────────────────────────

    pub fn get_auth<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState, Principal) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.protected(Method::GET, path, handler)
    }

    pub fn post_auth<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState, Principal) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.protected(Method::POST, path, handler)
    }

    pub fn delete_auth<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState, Principal) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.protected(Method::DELETE, path, handler)
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    pub async fn route(
        &self,
        req: Request<hyper::body::Incoming>,
        state: AppState,
    ) -> Result<Response<BoxBody<Bytes, Infallible>>> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let mut path_known = false;
        for route in &self.routes {
            if !Self::path_matches(&route.path, &path) {
                continue;
            }
            path_known = true;
            if route.method != method {
                continue;
            }

            return match &route.kind {
                RouteKind::Open(h) => h(req, state).await,

                RouteKind::Protected(h) => match req.extensions().get::<Principal>().cloned() {
                    Some(principal) => {
                        debug!("{} {} as {}", method, path, principal.subject);
                        h(req, state, principal).await
                    }
                    None => {
                        warn!("Rejected unauthenticated {} {}", method, path);
                        unauthorized()
                    }
                },
            };
        }

        if path_known {
            return deliver_error_json(
                "METHOD_NOT_ALLOWED",
                "Method not allowed",
                StatusCode::METHOD_NOT_ALLOWED,
            )
            .context("Failed to deliver 405 response");
        }

        deliver_error_json("NOT_FOUND", "Endpoint not found", StatusCode::NOT_FOUND)
            .context("Failed to deliver 404 response")
    }

    // ── Path matching ─────────────────────────────────────────────────────────

    pub fn path_matches(route_path: &str, request_path: &str) -> bool {
        // Strip query string from incoming request path before comparing.
        let clean = request_path.split('?').next().unwrap_or(request_path);

        if route_path == clean {
            return true;
        }

        // Segment-by-segment matching for `:param` wildcards.
        let route_segs: Vec<&str> = route_path.split('/').collect();
        let path_segs: Vec<&str> = clean.split('/').collect();

        if route_segs.len() != path_segs.len() {
            return false;
        }

        route_segs
            .iter()
            .zip(path_segs.iter())
            .all(|(r, p)| r.starts_with(':') || r == p)
    }
}

pub fn unauthorized() -> Result<Response<BoxBody<Bytes, Infallible>>> {
    deliver_error_json(
        "UNAUTHORIZED",
        "Authentication required",
        StatusCode::UNAUTHORIZED,
    )
    .context("Failed to deliver 401 response")
}

// ---------------------------------------------------------------------------
// API router
//
//   .get / .post            → Open:      handler gets (req, state)
//   .get_auth / .post_auth  → Protected: handler gets (req, state, principal)
//   .delete_auth            → Protected
// ---------------------------------------------------------------------------

pub fn build_api_router() -> Router {
    Router::new()
        // ── Open ─────────────────────────────────────────────────────────────
        .get("/health", |_req, _state| async move {
            deliver_serialized_json(&serde_json::json!({"status": "ok"}), StatusCode::OK)
        })
        .post("/api/auth/register", |req, state| async move {
            register::handle_register(req, state)
                .await
                .context("Registration failed")
        })
        .post("/api/auth/login", |req, state| async move {
            login::handle_login(req, state).await.context("Login failed")
        })
        // Google sends the browser back here without our bearer token; the
        // single-use `state` parameter identifies the user instead.
        .get("/api/google/calendar/callback", |req, state| async move {
            connect::handle_callback(req, state)
                .await
                .context("OAuth callback failed")
        })
        // ── Protected ────────────────────────────────────────────────────────
        .get_auth("/api/auth/me", |req, state, principal| async move {
            me::handle_me(req, state, principal)
                .await
                .context("Profile lookup failed")
        })
        .get_auth("/api/google/calendar/auth", |req, state, principal| async move {
            connect::handle_authorize(req, state, principal)
                .await
                .context("Starting Google authorization failed")
        })
        .delete_auth("/api/google/calendar", |req, state, principal| async move {
            connect::handle_disconnect(req, state, principal)
                .await
                .context("Disconnecting Google failed")
        })
        .post_auth("/api/google/calendar/event", |req, state, principal| async move {
            events::handle_create_event(req, state, principal)
                .await
                .context("Creating calendar event failed")
        })
        .post_auth(
            "/api/google/calendar/event/game",
            |req, state, principal| async move {
                events::handle_create_game_event(req, state, principal)
                    .await
                    .context("Creating game event failed")
            },
        )
        .get_auth("/api/google/calendar/check", |req, state, principal| async move {
            check::handle_check(req, state, principal)
                .await
                .context("Calendar check failed")
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
