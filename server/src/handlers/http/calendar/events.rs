use std::convert::Infallible;

use anyhow::Result;
use bytes::Bytes;
use chrono::DateTime;
use http_body_util::combinators::BoxBody;
use hyper::{Request, Response, StatusCode};
use tracing::{info, warn};

use worldsync_shared::types::calendar::{CalendarEvent, GameEventRequest};

use crate::AppState;
use crate::auth::Principal;
use crate::google::{CalendarApi, ResilientInvoker};
use crate::handlers::http::routes::unauthorized;
use crate::handlers::http::utils::{deliver_error_json, deliver_serialized_json, read_json};

use super::{deliver_invoke_error, resolve_user_id};

/// `POST /api/google/calendar/event` with a Google-shaped event body.
pub async fn handle_create_event(
    req: Request<hyper::body::Incoming>,
    state: AppState,
    principal: Principal,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let event = match read_json::<CalendarEvent, _>(req).await {
        Ok(event) => event,
        Err(e) => {
            warn!("Event body rejected: {}", e);
            return invalid_event("Request body must be a calendar event");
        }
    };

    insert_event(&state, &principal, event).await
}

/// `POST /api/google/calendar/event/game` with the flat schedule-page body.
pub async fn handle_create_game_event(
    req: Request<hyper::body::Incoming>,
    state: AppState,
    principal: Principal,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let game = match read_json::<GameEventRequest, _>(req).await {
        Ok(game) => game,
        Err(e) => {
            warn!("Game event body rejected: {}", e);
            return invalid_event("Request body must include summary, startDateTime and endDateTime");
        }
    };

    insert_event(&state, &principal, CalendarEvent::from(game)).await
}

async fn insert_event(
    state: &AppState,
    principal: &Principal,
    event: CalendarEvent,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    if let Err(message) = validate_event(&event) {
        return invalid_event(message);
    }

    let Some(user_id) = resolve_user_id(state, principal).await? else {
        return unauthorized();
    };

    let calendar = state.calendar.as_ref();
    let invoker = ResilientInvoker::new(
        &state.credentials,
        state.oauth.as_ref(),
        &state.oauth_credentials,
    );

    let result = invoker
        .invoke(user_id, |token| {
            let event = &event;
            async move { calendar.insert_event(&token, event).await }
        })
        .await;

    match result {
        Ok(created) => {
            info!(
                "Inserted calendar event for user {}: {}",
                user_id,
                created.id.as_deref().unwrap_or("<no id>")
            );
            deliver_serialized_json(&created, StatusCode::OK)
        }
        Err(e) => deliver_invoke_error(user_id, &e),
    }
}

fn invalid_event(message: &str) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    deliver_error_json("INVALID_EVENT", message, StatusCode::BAD_REQUEST)
}

/// Non-empty summary, RFC 3339 start and end, end strictly after start.
fn validate_event(event: &CalendarEvent) -> Result<(), &'static str> {
    if event.summary.trim().is_empty() {
        return Err("Event summary is required");
    }

    let start = DateTime::parse_from_rfc3339(event.start.date_time.trim())
        .map_err(|_| "start.dateTime must be an RFC 3339 timestamp")?;
    let end = DateTime::parse_from_rfc3339(event.end.date_time.trim())
        .map_err(|_| "end.dateTime must be an RFC 3339 timestamp")?;

    if end <= start {
        return Err("Event must end after it starts");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use worldsync_shared::types::calendar::EventTime;

    fn event(summary: &str, start: &str, end: &str) -> CalendarEvent {
        CalendarEvent {
            summary: summary.into(),
            description: None,
            start: EventTime {
                date_time: start.into(),
            },
            end: EventTime {
                date_time: end.into(),
            },
        }
    }

    #[test]
    fn accepts_offsets_across_zones() {
        // 19:05 in New York is 23:05 UTC.
        let ok = event(
            "Mets vs Braves",
            "2025-04-01T19:05:00-04:00",
            "2025-04-01T23:06:00Z",
        );
        assert!(validate_event(&ok).is_ok());
    }

    #[test]
    fn rejects_bad_events() {
        let cases = [
            event("  ", "2025-04-01T19:05:00Z", "2025-04-01T22:05:00Z"),
            event("Game", "April 1st", "2025-04-01T22:05:00Z"),
            event("Game", "2025-04-01T19:05:00Z", "2025-04-01"),
            event("Game", "2025-04-01T19:05:00Z", "2025-04-01T19:05:00Z"),
            event("Game", "2025-04-01T22:05:00Z", "2025-04-01T19:05:00Z"),
        ];
        for case in cases {
            assert!(validate_event(&case).is_err(), "{:?} should fail", case);
        }
    }

    #[test]
    fn game_request_converts() {
        let game: GameEventRequest = serde_json::from_str(
            r#"{"summary":"Cubs @ Cardinals","startDateTime":"2025-05-02T20:15:00-05:00","endDateTime":"2025-05-02T23:15:00-05:00"}"#,
        )
        .unwrap();
        let event = CalendarEvent::from(game);
        assert_eq!(event.start.date_time, "2025-05-02T20:15:00-05:00");
        assert!(validate_event(&event).is_ok());
    }
}
