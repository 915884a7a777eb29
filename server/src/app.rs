//! Wiring: building [`AppState`] from config and serving the router behind
//! the tower middleware stack.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use hyper::body::Incoming;
use hyper::header::{self, HeaderValue};
use hyper::server::conn::http1;
use hyper::{Method, Request};
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::service::TowerToHyperService;
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, error, info, warn};

use worldsync_shared::types::server_config::AppConfig;

use crate::AppState;
use crate::auth::{SigningKey, TokenCodec};
use crate::database::credentials::SqliteCredentialStore;
use crate::google::calendar::GoogleCalendarClient;
use crate::google::oauth::{GoogleOAuthClient, OAuthCredentials};
use crate::google::pending::PendingAuthorizations;
use crate::handlers::http::build_api_router;
use crate::handlers::http::utils::internal_error;
use crate::tower_middle::{IdentityLayer, TimeoutLayer};

/// Assemble the shared state. Fails if the Google clients cannot be built or
/// no client secret is provisioned.
pub fn build_state(config: AppConfig, key: &SigningKey, db: SqlitePool) -> Result<AppState> {
    let client_secret = config
        .google
        .resolved_client_secret()
        .context("Google client secret is not set (GOOGLE_CLIENT_SECRET or google.client_secret)")?;

    let oauth = GoogleOAuthClient::from_config(&config.google)
        .context("Failed to build Google OAuth client")?;
    let calendar = GoogleCalendarClient::from_config(&config.google)
        .context("Failed to build Google Calendar client")?;

    let oauth_credentials = OAuthCredentials {
        client_id: config.google.client_id.clone(),
        client_secret,
    };

    Ok(AppState {
        codec: Arc::new(TokenCodec::new(key)),
        credentials: SqliteCredentialStore::new(db.clone()),
        oauth: Arc::new(oauth),
        oauth_credentials,
        calendar: Arc::new(calendar),
        pending: PendingAuthorizations::new(),
        config: Arc::new(config),
        db,
    })
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Accept connections on `listener` until the task is dropped.
///
/// Middleware order, outermost first: CORS, request timeout, identity.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let router = Arc::new(build_api_router());
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    let service = ServiceBuilder::new()
        .layer(cors_layer(&state.config.server.allowed_origins))
        .layer(TimeoutLayer::new(timeout))
        .layer(IdentityLayer::new(state.codec.clone()))
        .service(tower::service_fn(move |req: Request<Incoming>| {
            let router = router.clone();
            let state = state.clone();
            async move {
                match router.route(req, state).await {
                    Ok(response) => Ok::<_, Infallible>(response),
                    Err(e) => {
                        error!("Request handler failed: {:#}", e);
                        Ok(internal_error())
                    }
                }
            }
        }));

    let addr = listener
        .local_addr()
        .context("Failed to read listener address")?;
    info!("Listening on http://{}", addr);

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Failed to accept connection: {}", e);
                continue;
            }
        };

        let io = TokioIo::new(stream);
        let service = TowerToHyperService::new(service.clone());

        tokio::task::spawn(async move {
            debug!("Connection from {}", peer);
            if let Err(err) = http1::Builder::new()
                .timer(TokioTimer::new())
                .serve_connection(io, service)
                .await
            {
                debug!("Error serving connection from {}: {:?}", peer, err);
            }
        });
    }
}

