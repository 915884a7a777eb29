//! End-to-end tests against a running server: first-party auth, the
//! identity gate on protected routes, and the Google connect, refresh and
//! disconnect lifecycle against a fake Google.

mod common;

use common::{FRESH_ACCESS_TOKEN, GOOD_CODE, STALE_ACCESS_TOKEN, TestApp};
use serde_json::{Value, json};

fn game_event() -> Value {
    json!({
        "summary": "Mets @ Braves",
        "startDateTime": "2025-04-01T19:05:00-04:00",
        "endDateTime": "2025-04-01T22:05:00-04:00"
    })
}

/// Start authorization and pull the `state` value out of the consent URL.
async fn begin_connect(app: &TestApp, token: &str) -> String {
    let res = app
        .client
        .get(app.url("/api/google/calendar/auth?mode=json"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let body: Value = res.json().await.unwrap();
    let url = reqwest::Url::parse(body["url"].as_str().unwrap()).unwrap();
    url.query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap()
}

async fn callback(app: &TestApp, code: &str, state: &str) -> reqwest::Response {
    app.client
        .get(app.url("/api/google/calendar/callback"))
        .query(&[("code", code), ("state", state)])
        .send()
        .await
        .unwrap()
}

async fn check_status(app: &TestApp, token: &str) -> String {
    let body: Value = app
        .client
        .get(app.url("/api/google/calendar/check"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body["token_status"].as_str().unwrap().to_string()
}

// ---------------------------------------------------------------------------
// First-party auth
// ---------------------------------------------------------------------------

#[tokio::test]
async fn register_login_and_profile() {
    let app = TestApp::spawn().await;

    let res = app.register("alice", "password1").await;
    assert_eq!(res.status(), 201);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["username"], "alice");

    let res = app.register("alice", "password1").await;
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], "USERNAME_TAKEN");

    let res = app.login("alice", "wrong-password1").await;
    assert_eq!(res.status(), 401);

    let res = app.login("alice", "password1").await;
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 86_400);
    let token = body["token"].as_str().unwrap();

    let res = app
        .client
        .get(app.url("/api/auth/me"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let profile: Value = res.json().await.unwrap();
    assert_eq!(profile["username"], "alice");
    assert_eq!(profile["email"], "alice@example.com");
    assert_eq!(profile["google_connected"], false);
}

#[tokio::test]
async fn malformed_login_body_is_400() {
    let app = TestApp::spawn().await;

    let res = app
        .client
        .post(app.url("/api/auth/login"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], "MALFORMED_BODY");
}

// ---------------------------------------------------------------------------
// Identity gate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn protected_routes_reject_missing_or_bad_tokens() {
    let app = TestApp::spawn().await;

    let routes = [
        (reqwest::Method::GET, "/api/auth/me"),
        (reqwest::Method::GET, "/api/google/calendar/auth"),
        (reqwest::Method::GET, "/api/google/calendar/check"),
        (reqwest::Method::POST, "/api/google/calendar/event"),
        (reqwest::Method::POST, "/api/google/calendar/event/game"),
        (reqwest::Method::DELETE, "/api/google/calendar"),
    ];

    for (method, path) in routes {
        let res = app
            .client
            .request(method.clone(), app.url(path))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 401, "{} {} without token", method, path);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["code"], "UNAUTHORIZED");

        let res = app
            .client
            .request(method.clone(), app.url(path))
            .bearer_auth("eyJhbGciOiJIUzI1NiJ9.garbage.garbage")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 401, "{} {} with bad token", method, path);
    }

    assert_eq!(app.google.hits().calendar_calls.len(), 0);
}

#[tokio::test]
async fn unknown_path_is_404_and_wrong_method_is_405() {
    let app = TestApp::spawn().await;

    let res = app.client.get(app.url("/api/nope")).send().await.unwrap();
    assert_eq!(res.status(), 404);

    let res = app.client.get(app.url("/api/auth/login")).send().await.unwrap();
    assert_eq!(res.status(), 405);

    let res = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), 200);
}

// ---------------------------------------------------------------------------
// Google lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn authorize_redirects_to_consent_screen() {
    let app = TestApp::spawn().await;
    let token = app.signed_in("alice").await;

    let res = app
        .client
        .get(app.url("/api/google/calendar/auth"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 302);

    let location = res.headers()["location"].to_str().unwrap();
    assert!(location.starts_with("https://accounts.example.test/o/oauth2/v2/auth?"));
    assert!(location.contains("access_type=offline"));
    assert!(location.contains("prompt=consent"));
    assert!(location.contains("client_id=test-client"));
}

#[tokio::test]
async fn calendar_calls_before_connecting() {
    let app = TestApp::spawn().await;
    let token = app.signed_in("alice").await;

    assert_eq!(check_status(&app, &token).await, "no_token");

    let res = app
        .client
        .post(app.url("/api/google/calendar/event/game"))
        .bearer_auth(&token)
        .json(&game_event())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], "GOOGLE_NOT_CONNECTED");
}

#[tokio::test]
async fn connect_refresh_and_disconnect() {
    let app = TestApp::spawn().await;
    let token = app.signed_in("alice").await;

    let state = begin_connect(&app, &token).await;
    let res = callback(&app, GOOD_CODE, &state).await;
    assert_eq!(res.status(), 200);
    assert_eq!(app.google.hits().code_exchanges, 1);

    // The state is single use.
    let res = callback(&app, GOOD_CODE, &state).await;
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_STATE");
    assert_eq!(app.google.hits().code_exchanges, 1);

    let profile: Value = app
        .client
        .get(app.url("/api/auth/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(profile["google_connected"], true);

    // The stored access token is stale: 401, one refresh, one retry.
    assert_eq!(check_status(&app, &token).await, "valid");
    let hits = app.google.hits();
    assert_eq!(hits.refreshes, 1);
    assert_eq!(hits.calendar_calls, vec![STALE_ACCESS_TOKEN, FRESH_ACCESS_TOKEN]);

    // The refreshed token was persisted, so no further refresh.
    let res = app
        .client
        .post(app.url("/api/google/calendar/event/game"))
        .bearer_auth(&token)
        .json(&game_event())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let created: Value = res.json().await.unwrap();
    assert_eq!(created["id"], "evt-1");
    assert_eq!(app.google.hits().refreshes, 1);
    assert_eq!(app.google.hits().calendar_calls.len(), 3);

    let res = app
        .client
        .delete(app.url("/api/google/calendar"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(check_status(&app, &token).await, "no_token");
}

#[tokio::test]
async fn callback_rejects_unknown_state_without_calling_google() {
    let app = TestApp::spawn().await;

    let res = callback(&app, GOOD_CODE, "never-issued").await;
    assert_eq!(res.status(), 400);
    assert_eq!(app.google.hits().code_exchanges, 0);

    let res = app
        .client
        .get(app.url("/api/google/calendar/callback?state=abc"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
}

#[tokio::test]
async fn failed_exchange_is_502_and_stores_nothing() {
    let app = TestApp::spawn().await;
    let token = app.signed_in("alice").await;

    let state = begin_connect(&app, &token).await;
    let res = callback(&app, "4/bad-code", &state).await;
    assert_eq!(res.status(), 502);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], "GOOGLE_EXCHANGE_FAILED");

    assert_eq!(check_status(&app, &token).await, "no_token");
}

#[tokio::test]
async fn invalid_event_is_rejected_before_google() {
    let app = TestApp::spawn().await;
    let token = app.signed_in("alice").await;

    let res = app
        .client
        .post(app.url("/api/google/calendar/event"))
        .bearer_auth(&token)
        .json(&json!({
            "summary": "Backwards",
            "start": { "dateTime": "2025-04-01T22:00:00Z" },
            "end": { "dateTime": "2025-04-01T19:00:00Z" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_EVENT");
    assert!(app.google.hits().calendar_calls.is_empty());
}
