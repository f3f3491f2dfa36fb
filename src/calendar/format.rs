//! French labels and Discord markdown for calendar events.

use super::CalendarEvent;

use chrono::{Datelike, NaiveDate, Weekday};
use chrono_tz::Tz;
use regex::Regex;

use std::sync::LazyLock;

const MONTH_NAMES: [&str; 12] = [
    "Janvier", "Février", "Mars", "Avril", "Mai", "Juin", "Juillet", "Août", "Septembre",
    "Octobre", "Novembre", "Décembre",
];

static BREAK_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("hardcoded regex"));

static LINK_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a\s+href=["']([^"']+)["'][^>]*>([^<]+)</a>"#).expect("hardcoded regex")
});

static ANY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("hardcoded regex"));

pub fn day_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Lundi",
        Weekday::Tue => "Mardi",
        Weekday::Wed => "Mercredi",
        Weekday::Thu => "Jeudi",
        Weekday::Fri => "Vendredi",
        Weekday::Sat => "Samedi",
        Weekday::Sun => "Dimanche",
    }
}

/// French month name for a 1-based month number.
pub fn month_name(month: u32) -> &'static str {
    MONTH_NAMES[(month.clamp(1, 12) - 1) as usize]
}

/// `"3 Juin"`.
pub fn short_date(date: NaiveDate) -> String {
    format!("{} {}", date.day(), month_name(date.month()))
}

/// Turn Google's HTML description into Discord markdown.
pub fn format_description(description: &str) -> String {
    let text = BREAK_TAG.replace_all(description, "\n");
    let text = LINK_TAG.replace_all(&text, "[$2]($1)");
    let text = ANY_TAG.replace_all(&text, "");
    text.trim().to_string()
}

/// Google Maps search link for a free-form location.
pub fn maps_url(location: &str) -> String {
    format!(
        "https://www.google.com/maps/search/?api=1&query={}",
        urlencoding::encode(location)
    )
}

/// Start time line used by the day commands.
pub fn time_info(event: &CalendarEvent, timezone: Tz) -> Option<String> {
    let start = event.start.as_ref()?;
    if let Some(date_time) = start.date_time {
        let local = date_time.with_timezone(&timezone);
        Some(format!("🕐 {}", local.format("%H:%M")))
    } else {
        start.date.map(|_| "📅 Toute la journée".to_string())
    }
}

/// Start day and time line used by the agenda.
pub fn agenda_time_info(event: &CalendarEvent, timezone: Tz) -> Option<String> {
    let start = event.start.as_ref()?;
    if let Some(date_time) = start.date_time {
        let local = date_time.with_timezone(&timezone);
        Some(format!(
            "📅 **{} {}** à **{}**",
            day_name(local.weekday()),
            short_date(local.date_naive()),
            local.format("%H:%M")
        ))
    } else {
        start.date.map(|date| {
            format!(
                "📅 **{} {}** (Toute la journée)",
                day_name(date.weekday()),
                short_date(date)
            )
        })
    }
}

/// Location line with an itinerary link.
pub fn location_info(event: &CalendarEvent) -> Option<String> {
    let location = event.location.as_deref().filter(|location| !location.is_empty())?;
    Some(format!("📍 {location} \n[🗺️ Itinéraire]({})", maps_url(location)))
}
