//! Slash commands, their registry, and the dispatcher.
//!
//! Every command is a [`CommandCandidate`] built in code and handed to the
//! [`CommandRegistry`] at startup. The registry only accepts candidates that
//! carry both metadata and a handler. Once built, it is wrapped in an `Arc`
//! and never mutated again.

pub mod agenda;
pub mod day;
pub mod dispatch;
pub mod help;
pub mod info;
pub mod ping;
pub mod rapport;
pub mod registry;

pub use dispatch::{CommandDispatcher, DispatchOutcome};
pub use registry::CommandRegistry;

use crate::calendar::CalendarSource;
use crate::error::Result;
use crate::interaction::{Embed, Interaction, limits};
use crate::readiness::{ColdStartGuard, ReadinessGate};
use crate::report::ReportGenerator;

use async_trait::async_trait;
use chrono_tz::Tz;

use std::sync::Arc;

/// Generic message shown when a command fails.
pub const COMMAND_FAILED_MESSAGE: &str = "There was an error while executing this command!";

/// Executable body of a slash command.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn execute(&self, ctx: &CommandContext, interaction: &dyn Interaction) -> Result<()>;
}

/// Shared resources handed to every command invocation.
pub struct CommandContext {
    pub registry: Arc<CommandRegistry>,
    pub calendar: Arc<dyn CalendarSource>,
    pub reports: Arc<dyn ReportGenerator>,
    pub readiness: ReadinessGate,
    pub timezone: Tz,
}

/// A selectable value for a string option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionChoice {
    pub name: String,
    pub value: String,
}

/// A string option exposed by a slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOption {
    pub name: String,
    pub description: String,
    pub required: bool,
    pub choices: Vec<OptionChoice>,
}

impl CommandOption {
    pub fn string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required: false,
            choices: Vec::new(),
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn choice(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.choices.push(OptionChoice {
            name: name.into(),
            value: value.into(),
        });
        self
    }
}

/// Descriptive metadata of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandData {
    pub name: String,
    pub description: String,
    pub options: Vec<CommandOption>,
}

impl CommandData {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            options: Vec::new(),
        }
    }

    pub fn option(mut self, option: CommandOption) -> Self {
        self.options.push(option);
        self
    }
}

/// A command definition offered to the registry, possibly incomplete.
#[derive(Clone, Default)]
pub struct CommandCandidate {
    pub data: Option<CommandData>,
    pub handler: Option<Arc<dyn CommandHandler>>,
}

impl CommandCandidate {
    pub fn new(data: CommandData, handler: impl CommandHandler + 'static) -> Self {
        Self {
            data: Some(data),
            handler: Some(Arc::new(handler)),
        }
    }
}

/// A validated, immutable command.
#[derive(Clone)]
pub struct Command {
    pub name: String,
    pub description: String,
    pub options: Vec<CommandOption>,
    pub handler: Arc<dyn CommandHandler>,
}

impl Command {
    /// Wrap the handler so invocations during cold start wait for readiness.
    pub fn with_cold_start_guard(self, gate: &ReadinessGate) -> Self {
        let handler = ColdStartGuard::new(self.name.clone(), self.handler, gate.clone());
        Self {
            handler: Arc::new(handler),
            ..self
        }
    }

    pub fn data(&self) -> CommandData {
        CommandData {
            name: self.name.clone(),
            description: self.description.clone(),
            options: self.options.clone(),
        }
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("options", &self.options.len())
            .finish_non_exhaustive()
    }
}

/// Every command the bot ships with.
pub fn all(timezone: Tz) -> Vec<CommandCandidate> {
    vec![
        ping::candidate(),
        info::candidate(),
        help::help_candidate(),
        help::aide_candidate(),
        agenda::candidate(timezone),
        day::mardi_candidate(),
        day::jeudi_candidate(),
        rapport::candidate(),
    ]
}

/// Cut `text` to at most `max_chars` characters, appending `...` when cut.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}...", &text[..byte_index]),
        None => text.to_string(),
    }
}

/// Room kept for the overflow field while earlier fields are added.
const OVERFLOW_RESERVE_CHARS: usize = 128;

/// Append one field per event while the embed stays within Discord's limits.
///
/// Events that no longer fit are summarised in a final "+N autres événements"
/// field.
pub(crate) fn add_event_fields(mut embed: Embed, fields: Vec<(String, String)>) -> Embed {
    let total = fields.len();
    for (index, (name, value)) in fields.into_iter().enumerate() {
        let name = truncate_chars(&name, limits::MAX_FIELD_NAME_CHARS - 3);
        let value = truncate_chars(&value, limits::MAX_FIELD_VALUE_CHARS - 3);

        let (slots, reserve) = if index + 1 == total {
            (1, 0)
        } else {
            (2, OVERFLOW_RESERVE_CHARS)
        };
        let size = name.chars().count() + value.chars().count();
        if embed.fields.len() + slots > limits::MAX_FIELDS
            || embed.char_count() + size + reserve > limits::MAX_TOTAL_CHARS
        {
            let hidden = total - index;
            tracing::debug!(shown = index, hidden, "embed full, summarising remaining events");
            return embed.field(
                format!("➕ +{hidden} autres événements"),
                "Consultez Google Calendar pour la liste complète.",
                false,
            );
        }
        embed = embed.field(name, value, false);
    }
    embed
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_commands_have_unique_names() {
        let candidates = all(chrono_tz::Europe::Paris);
        let mut names: Vec<_> = candidates
            .iter()
            .filter_map(|candidate| candidate.data.as_ref().map(|data| data.name.clone()))
            .collect();
        let total = names.len();
        names.sort();
        names.dedup();

        assert_eq!(total, candidates.len());
        assert_eq!(names.len(), total);
    }

    #[test]
    fn truncate_chars_respects_multibyte_boundaries() {
        assert_eq!(truncate_chars("événement", 3), "évé...");
        assert_eq!(truncate_chars("court", 10), "court");
    }

    fn long_fields(count: usize, value_chars: usize) -> Vec<(String, String)> {
        (0..count)
            .map(|index| (format!("🔸 Séance {index}"), "é".repeat(value_chars)))
            .collect()
    }

    #[test]
    fn event_fields_fit_when_small() {
        let embed = add_event_fields(Embed::new().title("Agenda"), long_fields(3, 40));

        assert_eq!(embed.fields.len(), 3);
        assert_eq!(embed.fields[2].name, "🔸 Séance 2");
    }

    #[test]
    fn event_fields_stop_at_the_character_budget() {
        let embed = add_event_fields(
            Embed::new().title("Agenda").footer("Google Calendar API"),
            long_fields(14, 500),
        );

        assert!(embed.char_count() <= limits::MAX_TOTAL_CHARS);
        assert!(embed.fields.len() < 14);
        let last = embed.fields.last().expect("overflow field");
        let shown = embed.fields.len() - 1;
        assert_eq!(last.name, format!("➕ +{} autres événements", 14 - shown));
    }

    #[test]
    fn event_fields_stop_at_the_field_cap() {
        let embed = add_event_fields(Embed::new(), long_fields(40, 10));

        assert_eq!(embed.fields.len(), limits::MAX_FIELDS);
        assert_eq!(embed.fields[24].name, "➕ +16 autres événements");
    }

    #[test]
    fn exactly_full_embed_needs_no_overflow_field() {
        let embed = add_event_fields(Embed::new(), long_fields(limits::MAX_FIELDS, 10));

        assert_eq!(embed.fields.len(), limits::MAX_FIELDS);
        assert_eq!(embed.fields[24].name, "🔸 Séance 24");
    }

    #[test]
    fn oversized_field_values_are_cut() {
        let embed = add_event_fields(Embed::new(), long_fields(1, 2000));

        assert_eq!(embed.fields[0].value.chars().count(), limits::MAX_FIELD_VALUE_CHARS);
    }
}
