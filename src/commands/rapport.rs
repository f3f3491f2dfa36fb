//! `/rapport`: generate the analytics report for a period.

use super::{CommandCandidate, CommandContext, CommandData, CommandHandler, CommandOption};
use crate::error::{Error, Result};
use crate::interaction::{Interaction, Reply};
use crate::report::ReportPeriod;

use async_trait::async_trait;

const PERIOD_OPTION: &str = "période";

pub struct RapportCommand;

pub fn candidate() -> CommandCandidate {
    let option = ReportPeriod::ALL.into_iter().fold(
        CommandOption::string(PERIOD_OPTION, "Choisissez la période pour le rapport").required(true),
        |option, period| option.choice(period.label(), period.id()),
    );

    CommandCandidate::new(
        CommandData::new("rapport", "Récupère le rapport d'une periode definie").option(option),
        RapportCommand,
    )
}

#[async_trait]
impl CommandHandler for RapportCommand {
    async fn execute(&self, ctx: &CommandContext, interaction: &dyn Interaction) -> Result<()> {
        interaction.defer().await?;

        let raw = interaction.option_str(PERIOD_OPTION).ok_or_else(|| Error::Command {
            name: "rapport".into(),
            reason: format!("missing required option '{PERIOD_OPTION}'"),
        })?;

        let outcome = match raw.parse::<ReportPeriod>() {
            Ok(period) => ctx.reports.generate(period).await.map(|()| period),
            Err(error) => Err(error.into()),
        };

        let message = match outcome {
            Ok(period) => format!("Rapport généré pour la période: {period}"),
            Err(error) => {
                tracing::error!(%error, period = raw, "failed to generate report");
                "Erreur lors de la génération du rapport. Veuillez réessayer.".to_string()
            }
        };

        interaction.edit_reply(Reply::text(message)).await
    }
}
