//! `/agenda`: a week of calendar events.

use super::{
    CommandCandidate, CommandContext, CommandData, CommandHandler, CommandOption, OptionChoice,
    add_event_fields, truncate_chars,
};
use crate::calendar::{CalendarEvent, format};
use crate::error::{CalendarError, Error, Result};
use crate::interaction::{Embed, Interaction, Reply, colors};

use async_trait::async_trait;
use chrono::{Datelike, Days, NaiveDate, Utc};
use chrono_tz::Tz;

const WEEK_OPTION: &str = "semaine";
const WEEKS_OFFERED: u64 = 5;
const MAX_DESCRIPTION_CHARS: usize = 300;
/// Leaves room for the code fence inside a 1024-character field value.
const MAX_ERROR_DETAILS_CHARS: usize = 1000;
const FOOTER: &str = "Google Calendar API";

pub struct AgendaCommand;

pub fn candidate(timezone: Tz) -> CommandCandidate {
    let today = Utc::now().with_timezone(&timezone).date_naive();
    let option = week_options(today).into_iter().fold(
        CommandOption::string(WEEK_OPTION, "Choisissez la semaine à afficher"),
        |option, choice| option.choice(choice.name, choice.value),
    );

    CommandCandidate::new(
        CommandData::new(
            "agenda",
            "Récupère les événements à venir depuis Google Calendar",
        )
        .option(option),
        AgendaCommand,
    )
}

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.weekday().num_days_from_monday()))
}

/// The current week and the four following, Monday to Sunday.
pub fn week_options(today: NaiveDate) -> Vec<OptionChoice> {
    let monday = week_start(today);
    (0..WEEKS_OFFERED)
        .map(|offset| {
            let start = monday + Days::new(offset * 7);
            let end = start + Days::new(6);
            let suffix = match offset {
                0 => " (actuelle)",
                1 => " (prochaine)",
                _ => "",
            };
            OptionChoice {
                name: format!("Semaine du {}{suffix}", format::short_date(start)),
                value: format!("{}_{}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d")),
            }
        })
        .collect()
}

/// `timeMin` / `timeMax` for a `YYYY-MM-DD_YYYY-MM-DD` selection.
fn window_from_selection(selection: &str) -> Option<(String, String)> {
    let (start, end) = selection.split_once('_')?;
    let start = NaiveDate::parse_from_str(start, "%Y-%m-%d").ok()?;
    let end = NaiveDate::parse_from_str(end, "%Y-%m-%d").ok()?;
    Some(day_window(start, end))
}

pub(crate) fn day_window(start: NaiveDate, end: NaiveDate) -> (String, String) {
    (
        format!("{}T00:00:00.000Z", start.format("%Y-%m-%d")),
        format!("{}T23:59:59.999Z", end.format("%Y-%m-%d")),
    )
}

fn current_week_window(timezone: Tz) -> (String, String) {
    let monday = week_start(Utc::now().with_timezone(&timezone).date_naive());
    day_window(monday, monday + Days::new(6))
}

/// French explanation of a calendar failure, shown in error embeds.
pub(crate) fn error_details(error: &Error) -> String {
    let details = match error {
        Error::Calendar(CalendarError::MissingCredentials) => {
            "Configuration de l'API Google Calendar manquante. Veuillez configurer les identifiants."
                .to_string()
        }
        Error::Calendar(CalendarError::Api { status: 401 | 403, .. }) => {
            "Identifiants Google Calendar refusés. Veuillez vérifier la clé API ou le jeton d'accès."
                .to_string()
        }
        other => other.to_string(),
    };
    truncate_chars(&details, MAX_ERROR_DETAILS_CHARS)
}

fn event_field(event: &CalendarEvent, timezone: Tz) -> (String, String) {
    let description = event
        .description
        .as_deref()
        .map(format::format_description)
        .filter(|description| !description.is_empty())
        .map(|description| format!("📝 {}", truncate_chars(&description, MAX_DESCRIPTION_CHARS)));

    let lines: Vec<String> = [
        format::agenda_time_info(event, timezone),
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
        .unwrap_or("Événement sans titre");

    (format!("🔸 {title}"), lines.join("\n"))
}

fn agenda_embed(events: &[CalendarEvent], timezone: Tz) -> Embed {
    if events.is_empty() {
        return Embed::new()
            .title("📅 Agenda - Aucun événement trouvé")
            .description("Aucun événement à venir trouvé dans la période spécifiée.")
            .color(colors::ORANGE)
            .timestamp_now()
            .footer(FOOTER);
    }

    add_event_fields(
        Embed::new()
            .title(format!("📅 Agenda - Événements à venir ({})", events.len()))
            .color(colors::GOOGLE_BLUE)
            .timestamp_now()
            .footer(FOOTER),
        events
            .iter()
            .map(|event| event_field(event, timezone))
            .collect(),
    )
}

fn error_embed(error: &Error) -> Embed {
    Embed::new()
        .title("❌ Erreur Agenda")
        .description(
            "Impossible de récupérer les événements du calendrier. Veuillez vérifier votre configuration Google Calendar.",
        )
        .color(colors::RED)
        .field("Détails de l'erreur", format!("```{}```", error_details(error)), false)
        .timestamp_now()
        .footer(FOOTER)
}

#[async_trait]
impl CommandHandler for AgendaCommand {
    async fn execute(&self, ctx: &CommandContext, interaction: &dyn Interaction) -> Result<()> {
        interaction.defer().await?;

        let (time_min, time_max) = match interaction.option_str(WEEK_OPTION) {
            Some(selection) => window_from_selection(selection).ok_or_else(|| Error::Command {
                name: "agenda".into(),
                reason: format!("invalid week selection '{selection}'"),
            })?,
            None => current_week_window(ctx.timezone),
        };

        let embed = match ctx.calendar.get_events(&time_min, &time_max).await {
            Ok(events) => {
                tracing::debug!(count = events.len(), %time_min, %time_max, "agenda events fetched");
                agenda_embed(&events, ctx.timezone)
            }
            Err(error) => {
                tracing::error!(%error, "failed to fetch calendar events");
                error_embed(&error)
            }
        };

        interaction.edit_reply(Reply::embed(embed)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::EventTime;
    use crate::commands::CommandRegistry;
    use crate::commands::testing::{RecordingReports, StaticCalendar, context_with};
    use crate::interaction::limits;
    use crate::interaction::testing::{Call, MockInteraction};

    use chrono::DateTime;

    use std::sync::Arc;

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("valid date")
    }

    fn event(summary: &str, start: &str) -> CalendarEvent {
        CalendarEvent {
            summary: Some(summary.into()),
            start: Some(EventTime::at(
                DateTime::parse_from_rfc3339(start).expect("valid timestamp"),
            )),
            ..CalendarEvent::default()
        }
    }

    async fn run(calendar: StaticCalendar, interaction: &MockInteraction) -> Arc<StaticCalendar> {
        let calendar = Arc::new(calendar);
        let ctx = context_with(
            CommandRegistry::new(),
            calendar.clone(),
            Arc::new(RecordingReports::default()),
        );
        AgendaCommand
            .execute(&ctx, interaction)
            .await
            .expect("agenda should succeed");
        calendar
    }

    #[test]
    fn week_options_start_on_monday() {
        let options = week_options(date("2025-06-05"));

        assert_eq!(options.len(), 5);
        assert_eq!(options[0].name, "Semaine du 2 Juin (actuelle)");
        assert_eq!(options[0].value, "2025-06-02_2025-06-08");
        assert_eq!(options[1].name, "Semaine du 9 Juin (prochaine)");
        assert_eq!(options[4].name, "Semaine du 30 Juin");
        assert_eq!(options[4].value, "2025-06-30_2025-07-06");
    }

    #[test]
    fn sunday_belongs_to_the_previous_monday() {
        assert_eq!(week_start(date("2025-06-08")), date("2025-06-02"));
        assert_eq!(week_start(date("2025-06-02")), date("2025-06-02"));
    }

    #[test]
    fn selection_covers_whole_days() {
        assert_eq!(
            window_from_selection("2025-06-02_2025-06-08"),
            Some((
                "2025-06-02T00:00:00.000Z".to_string(),
                "2025-06-08T23:59:59.999Z".to_string()
            ))
        );
        assert_eq!(window_from_selection("next-week"), None);
    }

    #[test]
    fn candidate_offers_week_choices() {
        let candidate = candidate(chrono_tz::Europe::Paris);
        let data = candidate.data.expect("metadata");

        assert_eq!(data.options.len(), 1);
        assert_eq!(data.options[0].name, "semaine");
        assert!(!data.options[0].required);
        assert_eq!(data.options[0].choices.len(), 5);
    }

    #[tokio::test]
    async fn selected_week_is_queried_and_rendered() {
        let interaction =
            MockInteraction::new("agenda").with_option("semaine", "2025-06-02_2025-06-08");
        let calendar = run(
            StaticCalendar {
                events: vec![event("Atelier Lego", "2025-06-03T12:30:00Z")],
                ..StaticCalendar::default()
            },
            &interaction,
        )
        .await;

        assert_eq!(
            calendar.requests.lock().as_slice(),
            [(
                "2025-06-02T00:00:00.000Z".to_string(),
                "2025-06-08T23:59:59.999Z".to_string()
            )]
        );
        assert_eq!(interaction.calls()[0], Call::Defer);
        let embed = &interaction.last_payload().expect("a reply").embeds[0];
        assert_eq!(embed.title.as_deref(), Some("📅 Agenda - Événements à venir (1)"));
        assert_eq!(embed.fields[0].name, "🔸 Atelier Lego");
        assert_eq!(embed.fields[0].value, "📅 **Mardi 3 Juin** à **14:30**");
    }

    #[tokio::test]
    async fn fields_are_capped() {
        let events = (0..30)
            .map(|index| event(&format!("Séance {index}"), "2025-06-03T12:30:00Z"))
            .collect();
        let interaction = MockInteraction::new("agenda");
        run(
            StaticCalendar {
                events,
                ..StaticCalendar::default()
            },
            &interaction,
        )
        .await;

        let embed = &interaction.last_payload().expect("a reply").embeds[0];
        assert_eq!(embed.fields.len(), limits::MAX_FIELDS);
        assert_eq!(embed.fields[24].name, "➕ +6 autres événements");
        assert_eq!(embed.title.as_deref(), Some("📅 Agenda - Événements à venir (30)"));
    }

    #[test]
    fn busy_week_stays_within_embed_size() {
        let events: Vec<CalendarEvent> = (0..14)
            .map(|index| CalendarEvent {
                description: Some("Construction libre et démonstration. ".repeat(11)),
                location: Some("Maison des associations, 72 rue Royale, 59000 Lille".into()),
                ..event(&format!("Atelier {index}"), "2025-06-03T12:30:00Z")
            })
            .collect();

        let embed = agenda_embed(&events, chrono_tz::Europe::Paris);

        assert!(embed.char_count() <= limits::MAX_TOTAL_CHARS);
        assert!(embed.fields.len() < events.len());
        let last = embed.fields.last().expect("overflow field");
        assert!(last.name.ends_with("autres événements"));
        assert_eq!(embed.title.as_deref(), Some("📅 Agenda - Événements à venir (14)"));
    }

    #[test]
    fn long_api_errors_fit_in_one_field() {
        let error = Error::Calendar(CalendarError::Api {
            status: 500,
            body: "x".repeat(2000),
        });

        let embed = error_embed(&error);

        let value = &embed.fields[0].value;
        assert!(value.chars().count() <= limits::MAX_FIELD_VALUE_CHARS);
        assert!(value.starts_with("```") && value.ends_with("...```"));
    }

    #[tokio::test]
    async fn empty_week_shows_empty_state() {
        let interaction = MockInteraction::new("agenda");
        run(StaticCalendar::default(), &interaction).await;

        let embed = &interaction.last_payload().expect("a reply").embeds[0];
        assert_eq!(embed.title.as_deref(), Some("📅 Agenda - Aucun événement trouvé"));
        assert_eq!(embed.color, Some(colors::ORANGE));
    }

    #[tokio::test]
    async fn calendar_failure_becomes_error_embed() {
        let interaction = MockInteraction::new("agenda");
        run(
            StaticCalendar {
                fail: true,
                ..StaticCalendar::default()
            },
            &interaction,
        )
        .await;

        let embed = &interaction.last_payload().expect("a reply").embeds[0];
        assert_eq!(embed.title.as_deref(), Some("❌ Erreur Agenda"));
        assert!(embed.fields[0].value.contains("Configuration de l'API Google Calendar manquante"));
    }

    #[test]
    fn long_descriptions_are_truncated() {
        let event = CalendarEvent {
            description: Some("a".repeat(400)),
            ..CalendarEvent::default()
        };

        let (name, value) = event_field(&event, chrono_tz::Europe::Paris);

        assert_eq!(name, "🔸 Événement sans titre");
        assert_eq!(value, format!("📝 {}...", "a".repeat(300)));
    }
}
