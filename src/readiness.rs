//! Readiness gate: defers command execution until the gateway handshake completes.
//!
//! The gate starts in [`ReadinessState::Starting`] and flips to
//! [`ReadinessState::Ready`] exactly once, when the gateway delivers its
//! `ready` event. It never flips back.
//!
//! Every command handler is wrapped in a [`ColdStartGuard`]. While the gate is
//! starting, the guard acknowledges the interaction immediately (so the
//! platform's response deadline is met), polls the gate once per second for up
//! to sixty seconds, and only then runs the real handler. Once the gate is
//! ready the guard is a plain pass-through.

use crate::commands::{CommandContext, CommandHandler};
use crate::error::Result;
use crate::interaction::{Embed, Interaction, Reply, colors};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// How often a waiting invocation re-checks readiness.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How long a waiting invocation polls before giving up.
pub const READY_TIMEOUT: Duration = Duration::from_secs(60);

pub(crate) const FOOTER_STARTING: &str = "Render Free Tier - Cold Start";
pub(crate) const FOOTER_READY: &str = "Render Free Tier - Ready";
pub(crate) const FOOTER_TIMEOUT: &str = "Render Free Tier - Timeout";

/// Connection readiness as reported to users and the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessState {
    Starting,
    Ready,
}

impl ReadinessState {
    pub fn as_str(self) -> &'static str {
        match self {
            ReadinessState::Starting => "starting",
            ReadinessState::Ready => "ready",
        }
    }
}

impl std::fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

struct GateInner {
    ready: AtomicBool,
    started_at: Instant,
    started_at_utc: DateTime<Utc>,
    poll_interval: Duration,
    timeout: Duration,
}

/// Process-wide readiness handle. Clones share the same state.
#[derive(Clone)]
pub struct ReadinessGate {
    inner: Arc<GateInner>,
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self::with_timing(POLL_INTERVAL, READY_TIMEOUT)
    }

    /// Gate with non-default polling, for tests.
    pub fn with_timing(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(GateInner {
                ready: AtomicBool::new(false),
                started_at: Instant::now(),
                started_at_utc: Utc::now(),
                poll_interval,
                timeout,
            }),
        }
    }

    /// Transition to ready. Returns `true` only for the call that performed it.
    pub fn mark_ready(&self) -> bool {
        let transitioned = !self.inner.ready.swap(true, Ordering::AcqRel);
        if transitioned {
            tracing::info!(
                elapsed_ms = self.inner.started_at.elapsed().as_millis() as u64,
                "readiness gate opened"
            );
        }
        transitioned
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::Acquire)
    }

    pub fn state(&self) -> ReadinessState {
        if self.is_ready() {
            ReadinessState::Ready
        } else {
            ReadinessState::Starting
        }
    }

    /// Time since the gate was created (process start).
    pub fn uptime(&self) -> Duration {
        self.inner.started_at.elapsed()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.inner.started_at_utc
    }

    /// Poll until ready or until the timeout elapses. Returns whether the gate opened.
    pub async fn wait_until_ready(&self) -> bool {
        let deadline = Instant::now() + self.inner.timeout;
        loop {
            if self.is_ready() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(self.inner.poll_interval).await;
        }
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReadinessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessGate")
            .field("state", &self.state())
            .field("uptime", &self.uptime())
            .finish()
    }
}

/// Handler wrapper that holds invocations until the gate is ready.
pub struct ColdStartGuard {
    command: String,
    inner: Arc<dyn CommandHandler>,
    gate: ReadinessGate,
}

impl ColdStartGuard {
    pub fn new(command: String, inner: Arc<dyn CommandHandler>, gate: ReadinessGate) -> Self {
        Self {
            command,
            inner,
            gate,
        }
    }
}

#[async_trait]
impl CommandHandler for ColdStartGuard {
    async fn execute(&self, ctx: &CommandContext, interaction: &dyn Interaction) -> Result<()> {
        if self.gate.is_ready() {
            return self.inner.execute(ctx, interaction).await;
        }

        tracing::info!(command = %self.command, "cold start detected, holding command");

        if let Err(error) = interaction.reply(starting_reply()).await {
            tracing::error!(%error, command = %self.command, "failed to send cold start message");
            return Ok(());
        }

        if !self.gate.wait_until_ready().await {
            tracing::warn!(command = %self.command, "gave up waiting for readiness");
            if let Err(error) = interaction.edit_reply(timeout_reply()).await {
                tracing::error!(%error, command = %self.command, "failed to send timeout message");
            }
            return Ok(());
        }

        if let Err(error) = interaction.edit_reply(ready_reply()).await {
            tracing::error!(%error, command = %self.command, "failed to send ready message");
        }

        self.inner.execute(ctx, interaction).await
    }
}

fn starting_reply() -> Reply {
    Reply::embed(
        Embed::new()
            .title("🔄 Bot en cours de démarrage...")
            .description("Le bot est en train de se réveiller. Veuillez patienter quelques instants...")
            .color(colors::ORANGE)
            .timestamp_now()
            .footer(FOOTER_STARTING),
    )
    .ephemeral()
}

fn ready_reply() -> Reply {
    Reply::embed(
        Embed::new()
            .title("✅ Bot prêt!")
            .description("Le bot est maintenant actif. Exécution de votre commande...")
            .color(colors::GREEN)
            .timestamp_now()
            .footer(FOOTER_READY),
    )
}

fn timeout_reply() -> Reply {
    Reply::embed(
        Embed::new()
            .title("⏰ Timeout")
            .description("Le bot met trop de temps à démarrer. Veuillez réessayer dans quelques instants.")
            .color(colors::RED)
            .timestamp_now()
            .footer(FOOTER_TIMEOUT),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::empty_context;
    use crate::interaction::testing::{Call, MockInteraction};

    use std::sync::atomic::AtomicUsize;

    /// Handler that counts runs and answers with a plain reply.
    struct Counting(Arc<AtomicUsize>);

    #[async_trait]
    impl CommandHandler for Counting {
        async fn execute(&self, _ctx: &CommandContext, interaction: &dyn Interaction) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            interaction.reply(Reply::text("done")).await
        }
    }

    fn guarded(gate: &ReadinessGate) -> (ColdStartGuard, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let guard = ColdStartGuard::new("ping".into(), Arc::new(Counting(runs.clone())), gate.clone());
        (guard, runs)
    }

    fn footer_of(call: &Call) -> Option<String> {
        match call {
            Call::Reply(reply) | Call::EditReply(reply) | Call::FollowUp(reply) => {
                reply.embeds.first().and_then(|embed| embed.footer.clone())
            }
            Call::Defer => None,
        }
    }

    #[test]
    fn ready_is_sticky_and_transitions_once() {
        let gate = ReadinessGate::new();
        assert_eq!(gate.state(), ReadinessState::Starting);

        assert!(gate.mark_ready());
        assert!(!gate.mark_ready());
        assert!(gate.clone().is_ready());
        assert_eq!(gate.state(), ReadinessState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn ready_gate_passes_through_without_extra_acknowledgement() {
        let gate = ReadinessGate::new();
        gate.mark_ready();
        let (guard, runs) = guarded(&gate);
        let interaction = MockInteraction::new("ping");

        guard.execute(&empty_context(), &interaction).await.expect("handler should succeed");

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(interaction.calls(), vec![Call::Reply(Reply::text("done"))]);
    }

    #[tokio::test(start_paused = true)]
    async fn starting_gate_acknowledges_then_runs_after_readiness() {
        let gate = ReadinessGate::new();
        let (guard, runs) = guarded(&gate);
        let interaction = MockInteraction::new("ping");

        let opener = gate.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            opener.mark_ready();
        });

        guard.execute(&empty_context(), &interaction).await.expect("handler should succeed");

        let calls = interaction.calls();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(calls.len(), 3);
        assert!(matches!(&calls[0], Call::Reply(reply) if reply.ephemeral));
        assert_eq!(footer_of(&calls[0]).as_deref(), Some(FOOTER_STARTING));
        assert!(matches!(&calls[1], Call::EditReply(_)));
        assert_eq!(footer_of(&calls[1]).as_deref(), Some(FOOTER_READY));
        // The handler's own reply lands as a follow-up since the guard already replied.
        assert_eq!(calls[2], Call::FollowUp(Reply::text("done")));
    }

    #[tokio::test(start_paused = true)]
    async fn starting_gate_times_out_without_running_handler() {
        let gate = ReadinessGate::new();
        let (guard, runs) = guarded(&gate);
        let interaction = MockInteraction::new("ping");

        let started = Instant::now();
        guard.execute(&empty_context(), &interaction).await.expect("timeout is not an error");

        assert!(started.elapsed() >= READY_TIMEOUT);
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        let calls = interaction.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(footer_of(&calls[0]).as_deref(), Some(FOOTER_STARTING));
        assert_eq!(footer_of(calls.last().expect("a final call")).as_deref(), Some(FOOTER_TIMEOUT));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_acknowledgement_stops_the_invocation() {
        let gate = ReadinessGate::new();
        let (guard, runs) = guarded(&gate);
        let interaction = MockInteraction::new("ping").failing_replies();

        guard.execute(&empty_context(), &interaction).await.expect("failure is logged, not raised");

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(interaction.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_until_ready_polls_on_the_interval() {
        let gate = ReadinessGate::with_timing(Duration::from_secs(1), Duration::from_secs(10));
        let opener = gate.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            opener.mark_ready();
        });

        let started = Instant::now();
        assert!(gate.wait_until_ready().await);
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn uptime_is_monotonic() {
        let gate = ReadinessGate::new();
        let first = gate.uptime();
        tokio::time::advance(Duration::from_millis(10)).await;
        assert!(gate.uptime() >= first);
    }
}
