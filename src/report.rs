//! WordPress analytics report, scraped through a headless browser.

use crate::config::{Config, WordpressConfig};
use crate::error::{ReportError, Result};

use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt as _;
use tokio::time::{Duration, Instant};

use std::path::PathBuf;
use std::str::FromStr;

/// How long to wait for a selector to appear.
const ELEMENT_TIMEOUT: Duration = Duration::from_secs(30);
const ELEMENT_POLL: Duration = Duration::from_millis(250);

/// Relative date ranges offered by the analytics dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportPeriod {
    Today,
    Yesterday,
    ThisWeek,
    LastWeek,
    LastSeven,
    LastThirty,
    LastSixty,
    LastNinety,
    ThisMonth,
    LastMonth,
    LastThreeMonths,
    LastSixMonths,
    LastTwelveMonths,
    ThisYear,
    LastYear,
    AllTime,
}

impl ReportPeriod {
    pub const ALL: [ReportPeriod; 16] = [
        ReportPeriod::Today,
        ReportPeriod::Yesterday,
        ReportPeriod::ThisWeek,
        ReportPeriod::LastWeek,
        ReportPeriod::LastSeven,
        ReportPeriod::LastThirty,
        ReportPeriod::LastSixty,
        ReportPeriod::LastNinety,
        ReportPeriod::ThisMonth,
        ReportPeriod::LastMonth,
        ReportPeriod::LastThreeMonths,
        ReportPeriod::LastSixMonths,
        ReportPeriod::LastTwelveMonths,
        ReportPeriod::ThisYear,
        ReportPeriod::LastYear,
        ReportPeriod::AllTime,
    ];

    /// Identifier used by the dashboard's `data-relative-range-id` attribute.
    pub fn id(self) -> &'static str {
        match self {
            ReportPeriod::Today => "TODAY",
            ReportPeriod::Yesterday => "YESTERDAY",
            ReportPeriod::ThisWeek => "THIS_WEEK",
            ReportPeriod::LastWeek => "LAST_WEEK",
            ReportPeriod::LastSeven => "LAST_SEVEN",
            ReportPeriod::LastThirty => "LAST_THIRTY",
            ReportPeriod::LastSixty => "LAST_SIXTY",
            ReportPeriod::LastNinety => "LAST_NINETY",
            ReportPeriod::ThisMonth => "THIS_MONTH",
            ReportPeriod::LastMonth => "LAST_MONTH",
            ReportPeriod::LastThreeMonths => "LAST_THREE_MONTHS",
            ReportPeriod::LastSixMonths => "LAST_SIX_MONTHS",
            ReportPeriod::LastTwelveMonths => "LAST_TWELVE_MONTHS",
            ReportPeriod::ThisYear => "THIS_YEAR",
            ReportPeriod::LastYear => "LAST_YEAR",
            ReportPeriod::AllTime => "ALL_TIME",
        }
    }

    /// Label shown in the slash-command choice list.
    pub fn label(self) -> &'static str {
        match self {
            ReportPeriod::Today => "Aujourd'hui",
            ReportPeriod::Yesterday => "Hier",
            ReportPeriod::ThisWeek => "Cette semaine",
            ReportPeriod::LastWeek => "Semaine dernière",
            ReportPeriod::LastSeven => "7 derniers jours",
            ReportPeriod::LastThirty => "30 derniers jours",
            ReportPeriod::LastSixty => "60 derniers jours",
            ReportPeriod::LastNinety => "90 derniers jours",
            ReportPeriod::ThisMonth => "Ce mois-ci",
            ReportPeriod::LastMonth => "Dernier mois",
            ReportPeriod::LastThreeMonths => "3 derniers mois",
            ReportPeriod::LastSixMonths => "6 derniers mois",
            ReportPeriod::LastTwelveMonths => "12 derniers mois",
            ReportPeriod::ThisYear => "Cette année",
            ReportPeriod::LastYear => "Année dernière",
            ReportPeriod::AllTime => "Depuis le début",
        }
    }
}

impl FromStr for ReportPeriod {
    type Err = ReportError;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        ReportPeriod::ALL
            .into_iter()
            .find(|period| period.id() == raw)
            .ok_or_else(|| ReportError::UnknownPeriod(raw.to_string()))
    }
}

impl std::fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Produces an analytics report for a period.
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    async fn generate(&self, period: ReportPeriod) -> Result<()>;
}

/// Resolved WordPress login.
struct Credentials<'a> {
    url: &'a str,
    username: &'a str,
    password: &'a str,
}

/// Drives the Independent Analytics dashboard with Chromium over CDP.
pub struct BrowserReportGenerator {
    wordpress: WordpressConfig,
    chrome_path: Option<PathBuf>,
}

impl BrowserReportGenerator {
    pub fn new(wordpress: WordpressConfig, chrome_path: Option<PathBuf>) -> Self {
        Self {
            wordpress,
            chrome_path,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.wordpress.clone(), config.chrome_path.clone())
    }

    fn credentials(&self) -> std::result::Result<Credentials<'_>, ReportError> {
        Ok(Credentials {
            url: self
                .wordpress
                .url
                .as_deref()
                .ok_or(ReportError::NotConfigured("WORDPRESS_URL"))?,
            username: self
                .wordpress
                .username
                .as_deref()
                .ok_or(ReportError::NotConfigured("WORDPRESS_USERNAME"))?,
            password: self
                .wordpress
                .password
                .as_deref()
                .ok_or(ReportError::NotConfigured("WORDPRESS_PASSWORD"))?,
        })
    }

    async fn launch(&self) -> std::result::Result<(Browser, tokio::task::JoinHandle<()>), ReportError> {
        let mut builder = BrowserConfig::builder()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-sandbox");

        if let Some(path) = &self.chrome_path {
            builder = builder.chrome_executable(path);
        }

        let config = builder
            .build()
            .map_err(|error| ReportError::Launch(format!("failed to build browser config: {error}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|error| ReportError::Launch(error.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(error) = event {
                    tracing::debug!(%error, "browser handler event error");
                }
            }
        });

        Ok((browser, handler_task))
    }

    async fn run_steps(
        &self,
        page: &Page,
        credentials: &Credentials<'_>,
        period: ReportPeriod,
    ) -> std::result::Result<(), ReportError> {
        wait_for(page, "#user_login").await?.type_str(credentials.username).await?;
        wait_for(page, "#user_pass").await?.type_str(credentials.password).await?;
        wait_for(page, "#wp-submit").await?.click().await?;
        page.wait_for_navigation().await?;
        tracing::debug!("logged into WordPress");

        wait_for(page, "#toplevel_page_independent-analytics").await?.click().await?;
        page.wait_for_navigation().await?;

        wait_for(page, "#dates-button").await?.click().await?;
        let range = format!("[data-relative-range-id=\"{}\"]", period.id());
        wait_for(page, &range).await?.click().await?;
        wait_for(page, "#apply-date").await?.click().await?;

        wait_for(page, "#download-options").await?.click().await?;
        Ok(())
    }
}

#[async_trait]
impl ReportGenerator for BrowserReportGenerator {
    async fn generate(&self, period: ReportPeriod) -> Result<()> {
        let credentials = self.credentials()?;
        tracing::info!(%period, "generating analytics report");

        let (mut browser, handler_task) = self.launch().await?;

        let outcome = match browser.new_page(credentials.url).await {
            Ok(page) => self.run_steps(&page, &credentials, period).await,
            Err(error) => Err(error.into()),
        };

        if let Err(error) = browser.close().await {
            tracing::warn!(%error, "failed to close browser");
        }
        if let Err(error) = browser.wait().await {
            tracing::debug!(%error, "browser process did not exit cleanly");
        }
        handler_task.abort();

        outcome?;
        tracing::info!(%period, "analytics report generated");
        Ok(())
    }
}

/// Poll for `selector` until it exists or the timeout elapses.
async fn wait_for(
    page: &Page,
    selector: &str,
) -> std::result::Result<chromiumoxide::element::Element, ReportError> {
    let deadline = Instant::now() + ELEMENT_TIMEOUT;
    loop {
        match page.find_element(selector).await {
            Ok(element) => return Ok(element),
            Err(error) if Instant::now() >= deadline => {
                tracing::debug!(%error, selector, "element never appeared");
                return Err(ReportError::ElementTimeout {
                    selector: selector.to_string(),
                });
            }
            Err(_) => tokio::time::sleep(ELEMENT_POLL).await,
        }
    }
}
