//! `/info`: bot statistics.

use super::{CommandCandidate, CommandContext, CommandData, CommandHandler};
use crate::error::Result;
use crate::interaction::{Embed, Interaction, Reply, colors};

use async_trait::async_trait;

pub struct InfoCommand;

pub fn candidate() -> CommandCandidate {
    CommandCandidate::new(
        CommandData::new("info", "Get information about the bot"),
        InfoCommand,
    )
}

#[async_trait]
impl CommandHandler for InfoCommand {
    async fn execute(&self, ctx: &CommandContext, interaction: &dyn Interaction) -> Result<()> {
        let stats = interaction.platform_stats().await;

        let embed = Embed::new()
            .title("🤖 Lillego Bot Information")
            .description("A Discord bot built with Rust and serenity")
            .field("📊 Servers", stats.guilds.to_string(), true)
            .field("👥 Users", stats.users.to_string(), true)
            .field("⚡ Commands", ctx.registry.len().to_string(), true)
            .field("🕒 Uptime", format!("{} seconds", ctx.readiness.uptime().as_secs()), true)
            .field("📦 Version", env!("CARGO_PKG_VERSION"), true)
            .field("🔌 Status", ctx.readiness.state().to_string(), true)
            .color(colors::BLUE)
            .timestamp_now()
            .footer("Lillego Bot");

        interaction.reply(Reply::embed(embed)).await
    }
}
