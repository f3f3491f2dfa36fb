//! Lillego Bot CLI entry point.

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lillego_bot::api;
use lillego_bot::calendar::GoogleCalendar;
use lillego_bot::commands::{self, CommandContext, CommandDispatcher, CommandRegistry};
use lillego_bot::config::Config;
use lillego_bot::events::EventRouter;
use lillego_bot::keepalive;
use lillego_bot::messaging::discord;
use lillego_bot::readiness::ReadinessGate;
use lillego_bot::report::BrowserReportGenerator;

use std::sync::Arc;

#[derive(Parser)]
#[command(name = "lillego-bot")]
#[command(about = "Discord slash-command bot for the Lillego community calendar")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Connect to Discord and serve slash commands (default)
    Run,
    /// Register every slash command with Discord
    DeployCommands,
    /// Remove every registered slash command
    ClearCommands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    install_panic_hook();

    let config = Config::load().context("failed to load configuration from environment")?;
    if let Err(error) = config.validate() {
        tracing::error!(%error, "invalid configuration");
        anyhow::bail!(error);
    }
    tracing::debug!(?config, "configuration loaded");

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::DeployCommands => {
            let registry = CommandRegistry::from_candidates(commands::all(config.timezone));
            discord::deploy_commands(&config, &registry)
                .await
                .context("failed to deploy slash commands")?;
            tracing::info!(count = registry.len(), "slash commands deployed");
            Ok(())
        }
        Command::ClearCommands => {
            discord::clear_commands(&config)
                .await
                .context("failed to clear slash commands")?;
            tracing::info!("slash commands cleared");
            Ok(())
        }
    }
}

/// Log panics through tracing before the default hook prints them.
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!(panic = %info, "panic");
        default_hook(info);
    }));
}

async fn run(config: Config) -> anyhow::Result<()> {
    tracing::info!("starting Lillego Bot");

    let gate = ReadinessGate::new();
    let registry =
        CommandRegistry::from_candidates(commands::all(config.timezone)).with_cold_start_guard(&gate);

    let context = Arc::new(CommandContext {
        registry: Arc::new(registry),
        calendar: Arc::new(GoogleCalendar::from_config(&config)),
        reports: Arc::new(BrowserReportGenerator::from_config(&config)),
        readiness: gate.clone(),
        timezone: config.timezone,
    });
    let dispatcher = Arc::new(CommandDispatcher::new(context));
    let router = Arc::new(EventRouter::with_default_listeners(gate.clone(), dispatcher));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let http_handle = api::start_http_server(config.port, gate.clone(), shutdown_rx.clone())
        .await
        .with_context(|| format!("failed to start HTTP server on port {}", config.port))?;

    let keepalive_handle = keepalive::spawn(
        config.health_check_url.clone(),
        keepalive::KEEP_ALIVE_INTERVAL,
        shutdown_rx.clone(),
    );

    let token = config.require_token()?;
    let client = discord::connect(token, router.clone())
        .await
        .context("failed to build Discord client")?;
    let mut gateway = tokio::spawn(discord::run(client, router, shutdown_rx));

    tracing::info!("bot is starting up");

    let outcome = tokio::select! {
        result = &mut gateway => match result {
            Ok(result) => result.context("Discord connection failed"),
            Err(error) => Err(anyhow::anyhow!(error).context("Discord task panicked")),
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
            Ok(())
        }
    };

    let _ = shutdown_tx.send(true);
    if !gateway.is_finished() {
        let _ = gateway.await;
    }
    let _ = http_handle.await;
    if let Some(handle) = keepalive_handle {
        let _ = handle.await;
    }

    tracing::info!("Lillego Bot stopped");
    outcome
}
