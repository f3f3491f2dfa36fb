//! Discord adapter over serenity.
//!
//! Gateway callbacks are translated into [`BotEvent`]s for the
//! [`EventRouter`]; slash-command interactions are wrapped in a
//! [`DiscordInteraction`] so the rest of the bot never touches serenity types.

use crate::commands::{CommandData, CommandRegistry};
use crate::config::Config;
use crate::error::{DiscordError, Result};
use crate::events::{BotEvent, EventRouter, ReadyInfo};
use crate::interaction::{Embed, Interaction, PlatformStats, Reply};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serenity::all::{
    ApplicationId, Client, Command, CommandInteraction, CommandOptionType, Context,
    CreateCommand, CreateCommandOption, CreateEmbed, CreateEmbedFooter,
    CreateInteractionResponse, CreateInteractionResponseFollowup,
    CreateInteractionResponseMessage, EditInteractionResponse, EventHandler, GatewayIntents,
    GuildId, Http, Interaction as GatewayInteraction, Ready, ShardManager, Timestamp,
};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Milliseconds between the Unix epoch and the Discord epoch.
const DISCORD_EPOCH_MS: u64 = 1_420_070_400_000;

/// Gateway intents the bot connects with.
pub fn intents() -> GatewayIntents {
    GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES
}

/// Serenity event handler feeding the event router.
pub struct DiscordHandler {
    router: Arc<EventRouter>,
    shard_manager: Arc<OnceLock<Arc<ShardManager>>>,
}

#[serenity::async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        self.router.emit(BotEvent::Ready(ReadyInfo {
            user_tag: ready.user.tag(),
            guild_count: ready.guilds.len(),
        }));
    }

    async fn interaction_create(&self, ctx: Context, interaction: GatewayInteraction) {
        let GatewayInteraction::Command(command) = interaction else {
            return;
        };

        tracing::debug!(
            command = %command.data.name,
            user = %command.user.tag(),
            "slash command received"
        );

        let interaction = DiscordInteraction {
            command,
            ctx,
            shard_manager: self.shard_manager.get().cloned(),
            replied: AtomicBool::new(false),
            deferred: AtomicBool::new(false),
        };
        self.router
            .emit(BotEvent::InteractionCreate(Arc::new(interaction)));
    }
}

/// Build a gateway client wired to `router`.
pub async fn connect(token: &str, router: Arc<EventRouter>) -> Result<Client> {
    let shard_manager = Arc::new(OnceLock::new());
    let handler = DiscordHandler {
        router,
        shard_manager: shard_manager.clone(),
    };

    let client = Client::builder(token, intents())
        .event_handler(handler)
        .await
        .map_err(DiscordError::from)?;

    // Only ever set here, before the client starts.
    let _ = shard_manager.set(client.shard_manager.clone());
    Ok(client)
}

/// Run the gateway connection until it fails or `shutdown_rx` flips.
///
/// A connection failure is reported to the router as [`BotEvent::Error`]
/// before being returned.
pub async fn run(
    mut client: Client,
    router: Arc<EventRouter>,
    mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
) -> Result<()> {
    let shard_manager = client.shard_manager.clone();

    tokio::select! {
        result = client.start() => {
            if let Err(error) = result {
                for handle in router.emit(BotEvent::Error(error.to_string())) {
                    let _ = handle.await;
                }
                return Err(DiscordError::from(error).into());
            }
            Ok(())
        }
        _ = async { let _ = shutdown_rx.wait_for(|stop| *stop).await; } => {
            tracing::info!("shutting down Discord shards");
            shard_manager.shutdown_all().await;
            Ok(())
        }
    }
}

/// A slash-command invocation received over the gateway.
pub struct DiscordInteraction {
    command: CommandInteraction,
    ctx: Context,
    shard_manager: Option<Arc<ShardManager>>,
    replied: AtomicBool,
    deferred: AtomicBool,
}

impl DiscordInteraction {
    fn acknowledged(&self) -> bool {
        self.is_replied() || self.is_deferred()
    }
}

#[async_trait]
impl Interaction for DiscordInteraction {
    fn command_name(&self) -> &str {
        &self.command.data.name
    }

    fn option_str(&self, name: &str) -> Option<&str> {
        self.command
            .data
            .options
            .iter()
            .find(|option| option.name == name)
            .and_then(|option| option.value.as_str())
    }

    fn user_tag(&self) -> String {
        self.command.user.tag()
    }

    fn created_at(&self) -> DateTime<Utc> {
        snowflake_time(self.command.id.get())
    }

    async fn platform_stats(&self) -> PlatformStats {
        let gateway_latency = match &self.shard_manager {
            Some(manager) => manager
                .runners
                .lock()
                .await
                .get(&self.ctx.shard_id)
                .and_then(|runner| runner.latency),
            None => None,
        };

        PlatformStats {
            guilds: self.ctx.cache.guild_count(),
            users: self.ctx.cache.user_count(),
            gateway_latency,
        }
    }

    fn is_replied(&self) -> bool {
        self.replied.load(Ordering::SeqCst)
    }

    fn is_deferred(&self) -> bool {
        self.deferred.load(Ordering::SeqCst)
    }

    async fn reply(&self, reply: Reply) -> Result<()> {
        if self.acknowledged() {
            return self.follow_up(reply).await;
        }

        let mut message = CreateInteractionResponseMessage::new()
            .embeds(reply.embeds.iter().map(build_embed).collect())
            .ephemeral(reply.ephemeral);
        if let Some(content) = reply.content {
            message = message.content(content);
        }

        self.command
            .create_response(&self.ctx, CreateInteractionResponse::Message(message))
            .await
            .map_err(DiscordError::from)?;
        self.replied.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn defer(&self) -> Result<()> {
        if self.acknowledged() {
            return Ok(());
        }

        self.command
            .defer(&self.ctx)
            .await
            .map_err(DiscordError::from)?;
        self.deferred.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn edit_reply(&self, reply: Reply) -> Result<()> {
        let edit = EditInteractionResponse::new()
            .content(reply.content.unwrap_or_default())
            .embeds(reply.embeds.iter().map(build_embed).collect());

        self.command
            .edit_response(&self.ctx, edit)
            .await
            .map_err(DiscordError::from)?;
        Ok(())
    }

    async fn follow_up(&self, reply: Reply) -> Result<()> {
        let mut followup = CreateInteractionResponseFollowup::new()
            .embeds(reply.embeds.iter().map(build_embed).collect())
            .ephemeral(reply.ephemeral);
        if let Some(content) = reply.content {
            followup = followup.content(content);
        }

        self.command
            .create_followup(&self.ctx, followup)
            .await
            .map_err(DiscordError::from)?;
        Ok(())
    }
}

/// Creation time encoded in a Discord snowflake.
fn snowflake_time(id: u64) -> DateTime<Utc> {
    let millis = (id >> 22) + DISCORD_EPOCH_MS;
    i64::try_from(millis)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_else(Utc::now)
}

/// Convert a platform-neutral embed into serenity's builder.
pub fn build_embed(embed: &Embed) -> CreateEmbed {
    let mut builder = CreateEmbed::new();

    if let Some(title) = &embed.title {
        builder = builder.title(title);
    }
    if let Some(description) = &embed.description {
        builder = builder.description(description);
    }
    if let Some(color) = embed.color {
        builder = builder.colour(color);
    }
    for field in &embed.fields {
        builder = builder.field(&field.name, &field.value, field.inline);
    }
    if let Some(footer) = &embed.footer {
        builder = builder.footer(CreateEmbedFooter::new(footer));
    }
    if let Some(timestamp) = embed
        .timestamp
        .and_then(|at| Timestamp::from_unix_timestamp(at.timestamp()).ok())
    {
        builder = builder.timestamp(timestamp);
    }
    if let Some(thumbnail) = &embed.thumbnail {
        builder = builder.thumbnail(thumbnail);
    }

    builder
}

/// Convert registry metadata into a slash-command registration payload.
pub fn build_command(data: &CommandData) -> CreateCommand {
    data.options.iter().fold(
        CreateCommand::new(&data.name).description(&data.description),
        |command, option| {
            let built = option.choices.iter().fold(
                CreateCommandOption::new(CommandOptionType::String, &option.name, &option.description)
                    .required(option.required),
                |built, choice| built.add_string_choice(&choice.name, &choice.value),
            );
            command.add_option(built)
        },
    )
}

fn parse_id(key: &'static str, value: Option<&str>) -> std::result::Result<u64, DiscordError> {
    let invalid = || DiscordError::InvalidId {
        key,
        value: value.unwrap_or_default().to_string(),
    };
    value
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .filter(|id| *id != 0)
        .ok_or_else(invalid)
}

/// Where slash commands get registered.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Scope {
    Guilds(Vec<u64>),
    Global,
}

fn scope(config: &Config) -> std::result::Result<Scope, DiscordError> {
    let Some(guild) = config.guild_id.as_deref() else {
        return Ok(Scope::Global);
    };

    let mut guilds = vec![parse_id("GUILD_ID", Some(guild))?];
    if let Some(dev_guild) = config.dev_guild_id.as_deref() {
        guilds.push(parse_id("DEV_GUILD_ID", Some(dev_guild))?);
    }
    Ok(Scope::Guilds(guilds))
}

fn rest_client(config: &Config) -> Result<Http> {
    let http = Http::new(config.require_token()?);
    let application_id = parse_id("CLIENT_ID", config.client_id.as_deref())?;
    http.set_application_id(ApplicationId::new(application_id));
    Ok(http)
}

async fn push_commands(http: &Http, scope: &Scope, commands: Vec<CreateCommand>) -> Result<()> {
    match scope {
        Scope::Guilds(guilds) => {
            for guild in guilds {
                let registered = GuildId::new(*guild)
                    .set_commands(http, commands.clone())
                    .await
                    .map_err(DiscordError::from)?;
                tracing::info!(guild, count = registered.len(), "guild commands replaced");
            }
        }
        Scope::Global => {
            let registered = Command::set_global_commands(http, commands)
                .await
                .map_err(DiscordError::from)?;
            tracing::info!(count = registered.len(), "global commands replaced");
        }
    }
    Ok(())
}

/// Replace the registered slash commands with the registry's definitions.
pub async fn deploy_commands(config: &Config, registry: &CommandRegistry) -> Result<()> {
    let http = rest_client(config)?;
    let scope = scope(config)?;
    let commands: Vec<CreateCommand> = registry.definitions().iter().map(build_command).collect();

    tracing::info!(count = commands.len(), ?scope, "deploying slash commands");
    push_commands(&http, &scope, commands).await
}

/// Remove every registered slash command.
pub async fn clear_commands(config: &Config) -> Result<()> {
    let http = rest_client(config)?;
    let scope = scope(config)?;

    tracing::info!(?scope, "clearing slash commands");
    push_commands(&http, &scope, Vec::new()).await
}
