//! `/help` and `/aide`: list registered commands.

use super::{CommandCandidate, CommandContext, CommandData, CommandHandler, CommandRegistry};
use crate::error::Result;
use crate::interaction::{Embed, Interaction, Reply, colors};

use async_trait::async_trait;

/// Wording for one language of the help listing.
struct HelpText {
    title: &'static str,
    description: &'static str,
    empty_name: &'static str,
    empty_value: &'static str,
    category: &'static str,
    usage_name: &'static str,
    usage_value: &'static str,
}

const ENGLISH: HelpText = HelpText {
    title: "🤖 Lillego Bot - Available Commands",
    description: "Here are all the commands you can use:",
    empty_name: "⚠️ No Commands Found",
    empty_value: "There are currently no commands available.",
    category: "General",
    usage_name: "💡 How to Use",
    usage_value: "Type `/` in the chat to see all available slash commands, or use `/help` to see this list anytime!",
};

const FRENCH: HelpText = HelpText {
    title: "Commandes Disponibles",
    description: "Voici toutes les commandes que vous pouvez utiliser :",
    empty_name: "⚠️ Aucune Commande Trouvée",
    empty_value: "Il n'y a actuellement aucune commande disponible.",
    category: "Général",
    usage_name: "💡 Comment utiliser",
    usage_value: "Tapez `/` dans le chat pour voir toutes les commandes, ou utilisez `/aide` pour revoir cette liste !",
};

pub struct HelpCommand {
    text: &'static HelpText,
}

pub fn help_candidate() -> CommandCandidate {
    CommandCandidate::new(
        CommandData::new("help", "List all available commands"),
        HelpCommand { text: &ENGLISH },
    )
}

pub fn aide_candidate() -> CommandCandidate {
    CommandCandidate::new(
        CommandData::new("aide", "Liste toutes les commandes disponibles"),
        HelpCommand { text: &FRENCH },
    )
}

fn listing(text: &HelpText, registry: &CommandRegistry) -> Embed {
    let embed = Embed::new()
        .title(text.title)
        .description(text.description)
        .color(colors::BLUE)
        .timestamp_now()
        .footer("Lillego Bot");

    let embed = if registry.is_empty() {
        embed.field(text.empty_name, text.empty_value, false)
    } else {
        let lines: Vec<String> = registry
            .iter()
            .map(|command| format!("**/{}** - {}", command.name, command.description))
            .collect();
        embed.field(format!("📁 {}", text.category), lines.join("\n"), false)
    };

    embed.field(text.usage_name, text.usage_value, false)
}

#[async_trait]
impl CommandHandler for HelpCommand {
    async fn execute(&self, ctx: &CommandContext, interaction: &dyn Interaction) -> Result<()> {
        interaction
            .reply(Reply::embed(listing(self.text, &ctx.registry)))
            .await
    }
}
