//! Google Calendar v3 REST client.

use super::{CalendarEvent, CalendarSource};
use crate::config::Config;
use crate::error::{CalendarError, Result};

use async_trait::async_trait;
use serde::Deserialize;

const API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// How requests are authenticated.
#[derive(Clone)]
enum Credentials {
    ApiKey(String),
    AccessToken(String),
}

/// Read-only client for one Google calendar.
pub struct GoogleCalendar {
    client: reqwest::Client,
    calendar_id: String,
    credentials: Option<Credentials>,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    items: Vec<CalendarEvent>,
}

impl GoogleCalendar {
    pub fn new(calendar_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            calendar_id: calendar_id.into(),
            credentials: None,
            base_url: API_BASE.to_string(),
        }
    }

    /// Build a client from config. An access token wins over an API key.
    pub fn from_config(config: &Config) -> Self {
        let calendar = Self::new(config.google_calendar_id.clone().unwrap_or_default());
        match (&config.google_access_token, &config.google_api_key) {
            (Some(token), _) => calendar.with_access_token(token.clone()),
            (None, Some(key)) => calendar.with_api_key(key.clone()),
            (None, None) => {
                tracing::warn!("no Google Calendar credentials configured, calendar commands will fail");
                calendar
            }
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::ApiKey(key.into()));
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::AccessToken(token.into()));
        self
    }

    /// Point the client at another API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(&self.calendar_id)
        )
    }
}

#[async_trait]
impl CalendarSource for GoogleCalendar {
    async fn get_events(&self, time_min: &str, time_max: &str) -> Result<Vec<CalendarEvent>> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(CalendarError::MissingCredentials)?;

        let mut request = self.client.get(self.events_url()).query(&[
            ("timeMin", time_min),
            ("timeMax", time_max),
            ("singleEvents", "true"),
            ("orderBy", "startTime"),
        ]);
        request = match credentials {
            Credentials::ApiKey(key) => request.query(&[("key", key.as_str())]),
            Credentials::AccessToken(token) => request.bearer_auth(token),
        };

        let response = request.send().await.map_err(CalendarError::from)?;
        let status = response.status();
        let body = response.text().await.map_err(CalendarError::from)?;

        if !status.is_success() {
            return Err(CalendarError::Api {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let parsed: EventsResponse = serde_json::from_str(&body).map_err(CalendarError::from)?;
        tracing::debug!(count = parsed.items.len(), time_min, time_max, "fetched calendar events");
        Ok(parsed.items)
    }
}
