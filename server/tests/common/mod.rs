//! Boots the real server on an ephemeral port against a temporary SQLite
//! file, with Google's token and Calendar endpoints replaced by a local
//! stub.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use server::app;
use server::auth::SigningKey;
use server::database;
use worldsync_shared::config::parse_config;

pub const STALE_ACCESS_TOKEN: &str = "ya29.first";
pub const FRESH_ACCESS_TOKEN: &str = "ya29.refreshed";
pub const REFRESH_TOKEN: &str = "1//refresh";
pub const GOOD_CODE: &str = "4/good-code";

/// What the fake Google saw, by endpoint.
#[derive(Debug, Default, Clone)]
pub struct GoogleHits {
    pub code_exchanges: usize,
    pub refreshes: usize,
    pub calendar_calls: Vec<String>,
}

/// Fake Google.
///
/// * `POST /token` trades [`GOOD_CODE`] for [`STALE_ACCESS_TOKEN`] plus a
///   refresh token, and the refresh grant for [`FRESH_ACCESS_TOKEN`].
/// * `/calendar/v3/calendars/primary/events` only accepts
///   [`FRESH_ACCESS_TOKEN`], so the first calendar call after connecting
///   always walks the refresh path.
pub struct FakeGoogle {
    pub addr: SocketAddr,
    hits: Arc<Mutex<GoogleHits>>,
    handle: JoinHandle<()>,
}

impl FakeGoogle {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(Mutex::new(GoogleHits::default()));

        let shared = hits.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let hits = shared.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let hits = hits.clone();
                        async move { Ok::<_, Infallible>(answer(req, &hits).await) }
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        Self { addr, hits, handle }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn hits(&self) -> GoogleHits {
        self.hits.lock().unwrap().clone()
    }
}

impl Drop for FakeGoogle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn answer(req: Request<Incoming>, hits: &Mutex<GoogleHits>) -> Response<Full<Bytes>> {
    let path = req.uri().path().to_string();
    let bearer = req
        .headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);
    let body = req.into_body().collect().await.unwrap().to_bytes();
    let form: Vec<(String, String)> = form_urlencoded::parse(&body).into_owned().collect();
    let field = |key: &str| form.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str());

    let (status, reply) = if path == "/token" {
        match field("grant_type") {
            Some("authorization_code") => {
                hits.lock().unwrap().code_exchanges += 1;
                if field("code") == Some(GOOD_CODE) {
                    (
                        StatusCode::OK,
                        format!(
                            r#"{{"access_token":"{}","refresh_token":"{}","expires_in":3599,"token_type":"Bearer"}}"#,
                            STALE_ACCESS_TOKEN, REFRESH_TOKEN
                        ),
                    )
                } else {
                    (StatusCode::BAD_REQUEST, r#"{"error":"invalid_grant"}"#.to_string())
                }
            }
            Some("refresh_token") => {
                hits.lock().unwrap().refreshes += 1;
                if field("refresh_token") == Some(REFRESH_TOKEN) {
                    (
                        StatusCode::OK,
                        format!(r#"{{"access_token":"{}","expires_in":3599}}"#, FRESH_ACCESS_TOKEN),
                    )
                } else {
                    (StatusCode::BAD_REQUEST, r#"{"error":"invalid_grant"}"#.to_string())
                }
            }
            _ => (StatusCode::BAD_REQUEST, r#"{"error":"unsupported_grant_type"}"#.to_string()),
        }
    } else if path == "/calendar/v3/calendars/primary/events" {
        let token = bearer.unwrap_or_default();
        hits.lock().unwrap().calendar_calls.push(token.clone());
        if token == FRESH_ACCESS_TOKEN {
            (
                StatusCode::OK,
                r#"{"id":"evt-1","htmlLink":"https://calendar.google.com/event?eid=evt-1","status":"confirmed","items":[]}"#
                    .to_string(),
            )
        } else {
            (StatusCode::UNAUTHORIZED, r#"{"error":{"code":401}}"#.to_string())
        }
    } else {
        (StatusCode::NOT_FOUND, "{}".to_string())
    };

    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(reply)))
        .unwrap()
}

pub struct TestApp {
    pub base: String,
    pub client: reqwest::Client,
    pub google: FakeGoogle,
    server: JoinHandle<anyhow::Result<()>>,
    _dir: TempDir,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let google = FakeGoogle::start().await;
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("worldsync.db");

        let config = parse_config(&format!(
            r#"
[server]
bind = "127.0.0.1"
port = 0
request_timeout_secs = 20

[database]
url = "sqlite://{db}?mode=rwc"

[google]
client_id = "test-client"
client_secret = "test-secret"
redirect_uri = "http://localhost:8080/api/google/calendar/callback"
auth_url = "https://accounts.example.test/o/oauth2/v2/auth"
token_url = "{token}"
calendar_api_base = "{calendar}"
timeout_secs = 5
"#,
            db = db_path.display(),
            token = google.url("/token"),
            calendar = google.url("/calendar/v3"),
        ))
        .unwrap();

        let pool = database::connect(&config.database.url).await.unwrap();
        database::create_tables(&pool).await.unwrap();

        let key = SigningKey::from_raw(vec![42u8; 32]).unwrap();
        let state = app::build_state(config, &key, pool).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(app::serve(listener, state));

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();

        Self {
            base: format!("http://{}", addr),
            client,
            google,
            server,
            _dir: dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub async fn register(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/auth/register"))
            .json(&serde_json::json!({
                "username": username,
                "email": format!("{}@example.com", username),
                "password": password,
            }))
            .send()
            .await
            .unwrap()
    }

    pub async fn login(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/auth/login"))
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await
            .unwrap()
    }

    /// Register and log in, returning the bearer token.
    pub async fn signed_in(&self, username: &str) -> String {
        assert_eq!(self.register(username, "password1").await.status(), 201);
        let body: serde_json::Value = self.login(username, "password1").await.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.server.abort();
    }
}
