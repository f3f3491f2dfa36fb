//! Routes inbound interactions to their command handler.

use super::{COMMAND_FAILED_MESSAGE, CommandContext};
use crate::interaction::{Interaction, Reply};

use futures::FutureExt as _;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// What happened to a dispatched interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No command is registered under the interaction's name.
    Unmatched,
    Completed,
    /// The handler failed and the user was sent the generic failure message.
    Failed,
}

/// Looks up commands by name and runs them inside a failure boundary.
pub struct CommandDispatcher {
    context: Arc<CommandContext>,
}

impl CommandDispatcher {
    pub fn new(context: Arc<CommandContext>) -> Self {
        Self { context }
    }

    /// Run the command named by `interaction`.
    ///
    /// Neither an error nor a panic inside the handler escapes this call.
    pub async fn dispatch(&self, interaction: Arc<dyn Interaction>) -> DispatchOutcome {
        let name = interaction.command_name().to_string();

        let Some(command) = self.context.registry.get(&name) else {
            tracing::warn!(command = %name, "no command matching the interaction was found");
            return DispatchOutcome::Unmatched;
        };

        tracing::debug!(command = %name, user = %interaction.user_tag(), "dispatching command");

        let execution = command.handler.execute(&self.context, interaction.as_ref());
        let failure = match AssertUnwindSafe(execution).catch_unwind().await {
            Ok(Ok(())) => return DispatchOutcome::Completed,
            Ok(Err(error)) => error.to_string(),
            Err(panic) => panic_message(panic.as_ref()),
        };

        tracing::error!(command = %name, error = %failure, "error executing command");
        send_failure_message(interaction.as_ref(), &name).await;
        DispatchOutcome::Failed
    }
}

/// Send exactly one generic failure message through whichever path is still open.
async fn send_failure_message(interaction: &dyn Interaction, command: &str) {
    let message = Reply::text(COMMAND_FAILED_MESSAGE).ephemeral();

    let result = if interaction.is_replied() || interaction.is_deferred() {
        interaction.follow_up(message).await
    } else {
        interaction.reply(message).await
    };

    if let Err(error) = result {
        tracing::error!(%error, command, "failed to deliver the failure message");
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("handler panicked: {message}")
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{RecordingReports, StaticCalendar, context_with};
    use crate::commands::{CommandCandidate, CommandData, CommandHandler, CommandRegistry};
    use crate::error::{Error, Result};
    use crate::interaction::testing::{Call, MockInteraction};
    use crate::readiness::{FOOTER_READY, FOOTER_STARTING, ReadinessGate};

    use async_trait::async_trait;

    use std::time::Duration;

    struct Echo;

    #[async_trait]
    impl CommandHandler for Echo {
        async fn execute(&self, _ctx: &CommandContext, interaction: &dyn Interaction) -> Result<()> {
            interaction.reply(Reply::text("echo")).await
        }
    }

    struct FailsBeforeReply;

    #[async_trait]
    impl CommandHandler for FailsBeforeReply {
        async fn execute(&self, _ctx: &CommandContext, _interaction: &dyn Interaction) -> Result<()> {
            Err(Error::Command {
                name: "broken".into(),
                reason: "calendar unavailable".into(),
            })
        }
    }

    struct FailsAfterDefer;

    #[async_trait]
    impl CommandHandler for FailsAfterDefer {
        async fn execute(&self, _ctx: &CommandContext, interaction: &dyn Interaction) -> Result<()> {
            interaction.defer().await?;
            Err(anyhow::anyhow!("lost connection").into())
        }
    }

    struct Panics;

    #[async_trait]
    impl CommandHandler for Panics {
        async fn execute(&self, _ctx: &CommandContext, _interaction: &dyn Interaction) -> Result<()> {
            panic!("unexpected state");
        }
    }

    fn dispatcher() -> CommandDispatcher {
        let registry = CommandRegistry::from_candidates(vec![
            CommandCandidate::new(CommandData::new("echo", "echo"), Echo),
            CommandCandidate::new(CommandData::new("broken", "fails"), FailsBeforeReply),
            CommandCandidate::new(CommandData::new("deferred", "fails late"), FailsAfterDefer),
            CommandCandidate::new(CommandData::new("panics", "panics"), Panics),
        ]);
        let context = context_with(
            registry,
            Arc::new(StaticCalendar::default()),
            Arc::new(RecordingReports::default()),
        );
        CommandDispatcher::new(Arc::new(context))
    }

    fn failure_message() -> Reply {
        Reply::text(COMMAND_FAILED_MESSAGE).ephemeral()
    }

    #[tokio::test]
    async fn unmatched_command_is_ignored_silently() {
        let dispatcher = dispatcher();
        let interaction = Arc::new(MockInteraction::new("missing"));

        let outcome = dispatcher.dispatch(interaction.clone()).await;

        assert_eq!(outcome, DispatchOutcome::Unmatched);
        assert!(interaction.calls().is_empty());
    }

    #[tokio::test]
    async fn failure_before_reply_sends_one_reply() {
        let dispatcher = dispatcher();
        let interaction = Arc::new(MockInteraction::new("broken"));

        let outcome = dispatcher.dispatch(interaction.clone()).await;

        assert_eq!(outcome, DispatchOutcome::Failed);
        assert_eq!(interaction.calls(), vec![Call::Reply(failure_message())]);
    }

    #[tokio::test]
    async fn failure_after_defer_sends_one_follow_up() {
        let dispatcher = dispatcher();
        let interaction = Arc::new(MockInteraction::new("deferred"));

        let outcome = dispatcher.dispatch(interaction.clone()).await;

        assert_eq!(outcome, DispatchOutcome::Failed);
        assert_eq!(
            interaction.calls(),
            vec![Call::Defer, Call::FollowUp(failure_message())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn guarded_failure_during_cold_start_follows_up_once() {
        let gate = ReadinessGate::new();
        let registry = CommandRegistry::from_candidates(vec![CommandCandidate::new(
            CommandData::new("broken", "fails"),
            FailsBeforeReply,
        )])
        .with_cold_start_guard(&gate);
        let context = context_with(
            registry,
            Arc::new(StaticCalendar::default()),
            Arc::new(RecordingReports::default()),
        );
        let dispatcher = CommandDispatcher::new(Arc::new(context));
        let interaction = Arc::new(MockInteraction::new("broken"));

        let opener = gate.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            opener.mark_ready();
        });

        let outcome = dispatcher.dispatch(interaction.clone()).await;

        assert_eq!(outcome, DispatchOutcome::Failed);
        let calls = interaction.calls();
        assert_eq!(calls.len(), 3);
        assert!(matches!(
            &calls[0],
            Call::Reply(reply) if reply.ephemeral
                && reply.embeds[0].footer.as_deref() == Some(FOOTER_STARTING)
        ));
        assert!(matches!(
            &calls[1],
            Call::EditReply(reply) if reply.embeds[0].footer.as_deref() == Some(FOOTER_READY)
        ));
        assert_eq!(calls[2], Call::FollowUp(failure_message()));
    }

    #[tokio::test]
    async fn panicking_handler_is_contained_and_later_commands_still_run() {
        let dispatcher = dispatcher();
        let panicking = Arc::new(MockInteraction::new("panics"));

        assert_eq!(dispatcher.dispatch(panicking.clone()).await, DispatchOutcome::Failed);
        assert_eq!(panicking.calls(), vec![Call::Reply(failure_message())]);

        let next = Arc::new(MockInteraction::new("echo"));
        assert_eq!(dispatcher.dispatch(next.clone()).await, DispatchOutcome::Completed);
        assert_eq!(next.calls(), vec![Call::Reply(Reply::text("echo"))]);
    }

    #[test]
    fn panic_messages_are_extracted() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "handler panicked: boom");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "handler panicked");
    }
}
