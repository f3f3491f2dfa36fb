//! Platform-neutral interaction surface.
//!
//! Command handlers, the readiness gate, and the dispatcher only ever see an
//! [`Interaction`]. The Discord adapter implements it over serenity; tests
//! implement it with a recording mock.

use crate::error::Result;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use std::time::Duration;

/// Embed colours used across commands.
pub mod colors {
    pub const BLUE: u32 = 0x0099FF;
    pub const GOOGLE_BLUE: u32 = 0x4285F4;
    pub const CALENDAR_BLUE: u32 = 0x3498DB;
    pub const ORANGE: u32 = 0xFFA500;
    pub const GREEN: u32 = 0x00FF00;
    pub const RED: u32 = 0xFF0000;
    pub const SOFT_RED: u32 = 0xE74C3C;
    pub const GREY: u32 = 0x95A5A6;
}

/// Discord's per-embed size limits.
pub mod limits {
    pub const MAX_FIELDS: usize = 25;
    pub const MAX_FIELD_NAME_CHARS: usize = 256;
    pub const MAX_FIELD_VALUE_CHARS: usize = 1024;
    /// Title, description, field names and values, and footer combined.
    pub const MAX_TOTAL_CHARS: usize = 6000;
}

/// A single field inside an embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Rich embed payload, converted to the platform's builder at send time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Embed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub color: Option<u32>,
    pub fields: Vec<EmbedField>,
    pub footer: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub thumbnail: Option<String>,
}

impl Embed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    pub fn footer(mut self, text: impl Into<String>) -> Self {
        self.footer = Some(text.into());
        self
    }

    /// Stamp the embed with the current time.
    pub fn timestamp_now(mut self) -> Self {
        self.timestamp = Some(Utc::now());
        self
    }

    pub fn thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail = Some(url.into());
        self
    }

    /// Characters counted against [`limits::MAX_TOTAL_CHARS`].
    pub fn char_count(&self) -> usize {
        let text = |value: &Option<String>| value.as_deref().map_or(0, |text| text.chars().count());
        text(&self.title)
            + text(&self.description)
            + text(&self.footer)
            + self
                .fields
                .iter()
                .map(|field| field.name.chars().count() + field.value.chars().count())
                .sum::<usize>()
    }
}

/// Response payload for an interaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub content: Option<String>,
    pub embeds: Vec<Embed>,
    /// Only visible to the invoking user.
    pub ephemeral: bool,
}

impl Reply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn embed(embed: Embed) -> Self {
        Self {
            embeds: vec![embed],
            ..Self::default()
        }
    }

    pub fn ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }
}

/// Snapshot of gateway-level statistics for informational commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformStats {
    pub guilds: usize,
    pub users: usize,
    /// Last measured gateway heartbeat round trip.
    pub gateway_latency: Option<Duration>,
}

/// One inbound slash-command invocation.
///
/// `reply` on an interaction that has already been acknowledged posts a
/// follow-up instead, and `defer` becomes a no-op. Command bodies can therefore
/// run unchanged after the readiness gate has sent its own acknowledgement.
#[async_trait]
pub trait Interaction: Send + Sync {
    /// Name of the invoked command.
    fn command_name(&self) -> &str;

    /// String value of a user-supplied option.
    fn option_str(&self, name: &str) -> Option<&str>;

    /// Display tag of the invoking user.
    fn user_tag(&self) -> String;

    /// When the platform created the interaction.
    fn created_at(&self) -> DateTime<Utc>;

    async fn platform_stats(&self) -> PlatformStats;

    fn is_replied(&self) -> bool;

    fn is_deferred(&self) -> bool;

    /// Send the initial response.
    async fn reply(&self, reply: Reply) -> Result<()>;

    /// Acknowledge now and respond later with `edit_reply`.
    async fn defer(&self) -> Result<()>;

    /// Replace the initial response.
    async fn edit_reply(&self, reply: Reply) -> Result<()>;

    /// Send an additional message after the initial response.
    async fn follow_up(&self, reply: Reply) -> Result<()>;
}
