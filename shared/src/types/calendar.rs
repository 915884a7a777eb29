use serde::{Deserialize, Serialize};

/// A point in time as Google Calendar encodes it (`{"dateTime": "..."}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTime {
    /// RFC 3339 timestamp with offset, e.g. `2025-04-01T19:05:00-04:00`.
    #[serde(rename = "dateTime")]
    pub date_time: String,
}

/// Calendar event body.
///
/// The inbound `/event` payload and the outbound Google `events.insert` body
/// share this shape, so one type serves both directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: EventTime,
    pub end: EventTime,
}

/// Flat payload sent by the schedule page's "add game to calendar" button.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEventRequest {
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_date_time: String,
    pub end_date_time: String,
}

impl From<GameEventRequest> for CalendarEvent {
    fn from(game: GameEventRequest) -> Self {
        Self {
            summary: game.summary,
            description: game.description,
            start: EventTime {
                date_time: game.start_date_time,
            },
            end: EventTime {
                date_time: game.end_date_time,
            },
        }
    }
}

/// Result of `/api/google/calendar/check`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarStatus {
    /// Nothing stored for the user.
    NoToken,
    /// The stored (possibly just refreshed) access token works.
    Valid,
    /// The stored credential cannot be recovered; the user must reconnect.
    Expired,
}

/// Body returned by `/api/google/calendar/auth?mode=json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationUrl {
    pub url: String,
}

/// Body returned by `/api/google/calendar/check`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarCheckResponse {
    pub token_status: CalendarStatus,
}

/// The fields of Google's `Event` resource that we hand back to the client
/// after a successful insert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub html_link: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}
