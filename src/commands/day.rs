//! `/mardi` and `/jeudi`: events of the next Tuesday or Thursday.

use super::agenda::{day_window, error_details};
use super::{
    CommandCandidate, CommandContext, CommandData, CommandHandler, add_event_fields, truncate_chars,
};
use crate::calendar::{CalendarEvent, format};
use crate::error::{Error, Result};
use crate::interaction::{Embed, Interaction, Reply, colors};

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Days, NaiveDate, Timelike, Utc, Weekday};
use chrono_tz::Tz;

const MAX_DESCRIPTION_CHARS: usize = 500;

/// From this hour on, the current day no longer counts as the next occurrence.
const LATE_HOUR: u32 = 23;

/// Shows the events of one fixed weekday.
pub struct DayCommand {
    weekday: Weekday,
}

pub fn mardi_candidate() -> CommandCandidate {
    CommandCandidate::new(
        CommandData::new("mardi", "Affiche les événements du prochain mardi"),
        DayCommand {
            weekday: Weekday::Tue,
        },
    )
}

pub fn jeudi_candidate() -> CommandCandidate {
    CommandCandidate::new(
        CommandData::new("jeudi", "Affiche les événements du prochain jeudi"),
        DayCommand {
            weekday: Weekday::Thu,
        },
    )
}

/// Next occurrence of `weekday` as seen from `now`.
pub fn target_date(now: DateTime<Tz>, weekday: Weekday) -> NaiveDate {
    let today = now.date_naive();
    let ahead = (7 + weekday.num_days_from_monday() - today.weekday().num_days_from_monday()) % 7;
    let ahead = if ahead == 0 && now.hour() >= LATE_HOUR {
        7
    } else {
        ahead
    };
    today + Days::new(u64::from(ahead))
}

impl DayCommand {
    fn event_field(&self, event: &CalendarEvent, timezone: Tz) -> (String, String) {
        let description = event
            .description
            .as_deref()
            .map(format::format_description)
            .filter(|description| !description.is_empty())
            .map(|description| format!("💬 {}", truncate_chars(&description, MAX_DESCRIPTION_CHARS)));

        let lines: Vec<String> = [
            format::time_info(event, timezone),
            format::location_info(event),
            description,
        ]
        .into_iter()
        .flatten()
        .collect();

        let title = event
            .summary
            .as_deref()
            .filter(|summary| !summary.is_empty())
            .unwrap_or("Événement");

        (format!("🔔 {title}"), lines.join("\n"))
    }

    fn day_embed(
        &self,
        events: &[CalendarEvent],
        target: NaiveDate,
        today: NaiveDate,
        timezone: Tz,
    ) -> Embed {
        let heading = format!(
            "{} {}",
            format::day_name(self.weekday),
            format::short_date(target)
        );
        let when = if target == today {
            "aujourd'hui"
        } else {
            "ce jour-ci"
        };

        if events.is_empty() {
            return Embed::new()
                .title(format!("😴 {heading}"))
                .description(format!("Rien de prévu {when} ! 🌟"))
                .color(colors::GREY)
                .timestamp_now();
        }

        add_event_fields(
            Embed::new()
                .title(format!("✨ {heading}"))
                .description(format!("Voici ce qui vous attend {when} !"))
                .color(colors::CALENDAR_BLUE)
                .timestamp_now(),
            events
                .iter()
                .map(|event| self.event_field(event, timezone))
                .collect(),
        )
    }
}

fn error_embed(error: &Error) -> Embed {
    Embed::new()
        .title("😅 Oups !")
        .description("Je n'arrive pas à récupérer votre agenda pour le moment. Réessayez plus tard !")
        .color(colors::SOFT_RED)
        .field("Détails de l'erreur", format!("```{}```", error_details(error)), false)
        .timestamp_now()
}

#[async_trait]
impl CommandHandler for DayCommand {
    async fn execute(&self, ctx: &CommandContext, interaction: &dyn Interaction) -> Result<()> {
        interaction.defer().await?;

        let now = Utc::now().with_timezone(&ctx.timezone);
        let target = target_date(now, self.weekday);
        let (time_min, time_max) = day_window(target, target);

        let embed = match ctx.calendar.get_events(&time_min, &time_max).await {
            Ok(events) => self.day_embed(&events, target, now.date_naive(), ctx.timezone),
            Err(error) => {
                tracing::error!(%error, weekday = %self.weekday, "failed to fetch calendar events");
                error_embed(&error)
            }
        };

        interaction.edit_reply(Reply::embed(embed)).await
    }
}
