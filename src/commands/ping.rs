//! `/ping`: round-trip and gateway latency.

use super::{CommandCandidate, CommandContext, CommandData, CommandHandler};
use crate::error::Result;
use crate::interaction::{Interaction, Reply};

use async_trait::async_trait;

pub struct PingCommand;

pub fn candidate() -> CommandCandidate {
    CommandCandidate::new(CommandData::new("ping", "Replies with Pong!"), PingCommand)
}

#[async_trait]
impl CommandHandler for PingCommand {
    async fn execute(&self, _ctx: &CommandContext, interaction: &dyn Interaction) -> Result<()> {
        // Behind the cold-start guard the acknowledgement already exists, and the
        // pong is edited into it instead of posting a separate placeholder.
        if !interaction.is_replied() && !interaction.is_deferred() {
            interaction.reply(Reply::text("Pinging...")).await?;
        }

        let roundtrip = chrono::Utc::now()
            .signed_duration_since(interaction.created_at())
            .num_milliseconds()
            .max(0);
        let heartbeat = interaction
            .platform_stats()
            .await
            .gateway_latency
            .map(|latency| format!("{}ms", latency.as_millis()))
            .unwrap_or_else(|| "n/a".to_string());

        interaction
            .edit_reply(Reply::text(format!(
                "🏓 Pong!\n📡 Roundtrip latency: {roundtrip}ms\n💓 WebSocket heartbeat: {heartbeat}"
            )))
            .await
    }
}
