//! Google Calendar v3 client.
//!
//! Every call takes the access token explicitly; the token lifecycle lives in
//! [`super::invoker`]. A 401 is surfaced as [`CalendarError::Unauthorized`]
//! and is the only error the invoker reacts to.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, warn};

use worldsync_shared::types::calendar::{CalendarEvent, CreatedEvent};
use worldsync_shared::types::server_config::GoogleConfig;

use crate::BoxFuture;

use super::truncate_error_body;

const PRIMARY_CALENDAR: &str = "primary";

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("calendar API rejected the access token")]
    Unauthorized,

    #[error("calendar API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("calendar request failed: {0}")]
    Network(String),

    #[error("calendar request timed out")]
    Timeout,

    #[error("invalid calendar response: {0}")]
    InvalidResponse(String),
}

impl CalendarError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// The calls we make against the user's calendar.
pub trait CalendarApi: Send + Sync {
    fn insert_event<'a>(
        &'a self,
        access_token: &'a str,
        event: &'a CalendarEvent,
    ) -> BoxFuture<'a, Result<CreatedEvent, CalendarError>>;

    /// Cheapest authenticated call available: list at most one event.
    fn check_access<'a>(&'a self, access_token: &'a str) -> BoxFuture<'a, Result<(), CalendarError>>;
}

#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    http: reqwest::Client,
    api_base: String,
}

impl GoogleCalendarClient {
    pub fn new(api_base: impl Into<String>, timeout: Duration) -> Result<Self, CalendarError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CalendarError::Network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &GoogleConfig) -> Result<Self, CalendarError> {
        Self::new(
            config.calendar_api_base.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn events_url(&self) -> String {
        format!("{}/calendars/{}/events", self.api_base, PRIMARY_CALENDAR)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, CalendarError> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!("Calendar API returned 401");
            return Err(CalendarError::Unauthorized);
        }
        if !status.is_success() {
            let body = truncate_error_body(response.text().await.unwrap_or_default());
            warn!("Calendar API returned {}", status);
            return Err(CalendarError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

impl CalendarApi for GoogleCalendarClient {
    fn insert_event<'a>(
        &'a self,
        access_token: &'a str,
        event: &'a CalendarEvent,
    ) -> BoxFuture<'a, Result<CreatedEvent, CalendarError>> {
        Box::pin(async move {
            let response = self
                .http
                .post(self.events_url())
                .bearer_auth(access_token)
                .json(event)
                .send()
                .await
                .map_err(CalendarError::from_reqwest)?;

            let response = Self::check_status(response).await?;
            let created: CreatedEvent = response
                .json()
                .await
                .map_err(|e| CalendarError::InvalidResponse(e.to_string()))?;

            debug!("Inserted calendar event {:?}", created.id);
            Ok(created)
        })
    }

    fn check_access<'a>(&'a self, access_token: &'a str) -> BoxFuture<'a, Result<(), CalendarError>> {
        Box::pin(async move {
            let response = self
                .http
                .get(self.events_url())
                .bearer_auth(access_token)
                .query(&[("maxResults", "1")])
                .send()
                .await
                .map_err(CalendarError::from_reqwest)?;

            Self::check_status(response).await?;
            Ok(())
        })
    }
}
