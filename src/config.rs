//! Configuration loading and validation.

use crate::error::ConfigError;

use chrono_tz::Tz;

/// Keys that must be present before the bot can start.
const REQUIRED_KEYS: &[&str] = &["DISCORD_TOKEN", "CLIENT_ID", "GUILD_ID", "GOOGLE_CALENDAR_ID"];

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_TIMEZONE: &str = "Europe/Paris";

/// Bot configuration, read once from the process environment.
#[derive(Clone)]
pub struct Config {
    /// Discord bot token.
    pub token: Option<String>,

    /// Discord application id.
    pub client_id: Option<String>,

    /// Primary guild that receives guild-scoped slash commands.
    pub guild_id: Option<String>,

    /// Secondary guild used for testing new commands.
    pub dev_guild_id: Option<String>,

    /// Calendar read by the agenda and day commands.
    pub google_calendar_id: Option<String>,

    /// API key for public calendars.
    pub google_api_key: Option<String>,

    /// OAuth access token, preferred over the API key when both are set.
    pub google_access_token: Option<String>,

    /// Port for the health endpoint.
    pub port: u16,

    /// URL pinged by the keep-alive task. Disabled when absent.
    pub health_check_url: Option<String>,

    /// WordPress dashboard scraped by `/rapport`.
    pub wordpress: WordpressConfig,

    /// Explicit Chrome/Chromium binary for the report scraper.
    pub chrome_path: Option<std::path::PathBuf>,

    /// Timezone used for every date shown to users.
    pub timezone: Tz,
}

/// WordPress credentials for the analytics report.
#[derive(Clone, Default)]
pub struct WordpressConfig {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Config {
    /// Load configuration from `.env` (if present) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Empty values count as absent.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = match get("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|error| ConfigError::Invalid {
                key: "PORT".into(),
                reason: error.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let timezone_name = get("BOT_TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.into());
        let timezone = timezone_name
            .trim()
            .parse::<Tz>()
            .map_err(|error| ConfigError::Invalid {
                key: "BOT_TIMEZONE".into(),
                reason: error.to_string(),
            })?;

        Ok(Self {
            token: get("DISCORD_TOKEN"),
            client_id: get("CLIENT_ID"),
            guild_id: get("GUILD_ID"),
            dev_guild_id: get("DEV_GUILD_ID"),
            google_calendar_id: get("GOOGLE_CALENDAR_ID"),
            google_api_key: get("GOOGLE_API_KEY"),
            google_access_token: get("GOOGLE_ACCESS_TOKEN"),
            port,
            health_check_url: get("HEALTH_CHECK_URL"),
            wordpress: WordpressConfig {
                url: get("WORDPRESS_URL"),
                username: get("WORDPRESS_USERNAME"),
                password: get("WORDPRESS_PASSWORD"),
            },
            chrome_path: get("CHROME_PATH").map(std::path::PathBuf::from),
            timezone,
        })
    }

    /// Check that every required key is set, reporting all missing keys at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing: Vec<String> = REQUIRED_KEYS
            .iter()
            .filter(|key| self.value_for(key).is_none())
            .map(|key| key.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingKeys(missing))
        }
    }

    /// Discord token, or a `MissingKeys` error naming it.
    pub fn require_token(&self) -> Result<&str, ConfigError> {
        self.token
            .as_deref()
            .ok_or_else(|| ConfigError::MissingKeys(vec!["DISCORD_TOKEN".into()]))
    }

    fn value_for(&self, key: &str) -> Option<&str> {
        match key {
            "DISCORD_TOKEN" => self.token.as_deref(),
            "CLIENT_ID" => self.client_id.as_deref(),
            "GUILD_ID" => self.guild_id.as_deref(),
            "DEV_GUILD_ID" => self.dev_guild_id.as_deref(),
            "GOOGLE_CALENDAR_ID" => self.google_calendar_id.as_deref(),
            _ => None,
        }
    }
}

fn redact(value: &Option<String>) -> &'static str {
    if value.is_some() { "[set]" } else { "[unset]" }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("token", &redact(&self.token))
            .field("client_id", &self.client_id)
            .field("guild_id", &self.guild_id)
            .field("dev_guild_id", &self.dev_guild_id)
            .field("google_calendar_id", &self.google_calendar_id)
            .field("google_api_key", &redact(&self.google_api_key))
            .field("google_access_token", &redact(&self.google_access_token))
            .field("port", &self.port)
            .field("health_check_url", &self.health_check_url)
            .field("wordpress", &self.wordpress)
            .field("chrome_path", &self.chrome_path)
            .field("timezone", &self.timezone)
            .finish()
    }
}

impl std::fmt::Debug for WordpressConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WordpressConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .finish()
    }
}
