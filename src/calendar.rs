//! Calendar data source and event formatting.

pub mod format;
pub mod google;

pub use google::GoogleCalendar;

use crate::error::Result;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Deserialize;

/// Start or end of a calendar event.
///
/// Timed events carry `date_time`; all-day events only carry `date`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    pub date_time: Option<DateTime<FixedOffset>>,
    pub date: Option<NaiveDate>,
}

impl EventTime {
    pub fn at(date_time: DateTime<FixedOffset>) -> Self {
        Self {
            date_time: Some(date_time),
            date: None,
        }
    }

    pub fn all_day(date: NaiveDate) -> Self {
        Self {
            date_time: None,
            date: Some(date),
        }
    }
}

/// A single calendar entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CalendarEvent {
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: Option<EventTime>,
    pub end: Option<EventTime>,
}

/// Source of calendar events for a time window.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// Events between two ISO-8601 instants, ordered by start time.
    async fn get_events(&self, time_min: &str, time_max: &str) -> Result<Vec<CalendarEvent>>;
}
