//! Top-level error types for the bot.

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error enum wrapping domain-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Calendar(#[from] CalendarError),

    #[error(transparent)]
    Discord(#[from] DiscordError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("command {name} failed: {reason}")]
    Command { name: String, reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingKeys(Vec<String>),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

/// Calendar API errors.
#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error("Google Calendar credentials are not configured")]
    MissingCredentials,

    #[error("calendar request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("calendar API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to parse calendar response: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Discord gateway and REST errors.
#[derive(Debug, thiserror::Error)]
pub enum DiscordError {
    #[error("discord API error: {0}")]
    Serenity(#[from] serenity::Error),

    #[error("invalid snowflake for {key}: {value}")]
    InvalidId { key: &'static str, value: String },
}

/// Analytics report generation errors.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("analytics report is not configured: missing {0}")]
    NotConfigured(&'static str),

    #[error("unknown report period: {0}")]
    UnknownPeriod(String),

    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("browser automation failed: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),

    #[error("timed out waiting for {selector}")]
    ElementTimeout { selector: String },
}
