//! Gateway event routing.
//!
//! The Discord adapter turns gateway callbacks into [`BotEvent`]s and hands
//! them to the [`EventRouter`]. Every listener subscribed to the event's kind
//! runs in its own task, so a slow or failing listener never holds up the
//! others. Listeners marked `once` fire on the first matching event only.

use crate::commands::CommandDispatcher;
use crate::error::Result;
use crate::interaction::Interaction;
use crate::readiness::ReadinessGate;

use async_trait::async_trait;
use futures::FutureExt as _;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Ready,
    InteractionCreate,
    Error,
}

/// Identity of the connected bot, delivered with the ready event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyInfo {
    pub user_tag: String,
    pub guild_count: usize,
}

#[derive(Clone)]
pub enum BotEvent {
    Ready(ReadyInfo),
    InteractionCreate(Arc<dyn Interaction>),
    /// Client-level failure reported by the gateway connection.
    Error(String),
}

impl BotEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            BotEvent::Ready(_) => EventKind::Ready,
            BotEvent::InteractionCreate(_) => EventKind::InteractionCreate,
            BotEvent::Error(_) => EventKind::Error,
        }
    }
}

impl std::fmt::Debug for BotEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BotEvent::Ready(info) => f.debug_tuple("Ready").field(info).finish(),
            BotEvent::InteractionCreate(interaction) => f
                .debug_tuple("InteractionCreate")
                .field(&interaction.command_name())
                .finish(),
            BotEvent::Error(message) => f.debug_tuple("Error").field(message).finish(),
        }
    }
}

/// Reacts to one kind of gateway event.
#[async_trait]
pub trait EventListener: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> EventKind;

    /// Fire on the first matching event only.
    fn once(&self) -> bool {
        false
    }

    async fn handle(&self, event: BotEvent) -> Result<()>;
}

struct Subscription {
    listener: Arc<dyn EventListener>,
    fired: AtomicBool,
}

/// Fans gateway events out to subscribed listeners.
#[derive(Default)]
pub struct EventRouter {
    subscriptions: Vec<Subscription>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Router wired with the ready, interaction, and error listeners.
    pub fn with_default_listeners(gate: ReadinessGate, dispatcher: Arc<CommandDispatcher>) -> Self {
        let mut router = Self::new();
        router.subscribe(ReadyListener { gate });
        router.subscribe(InteractionListener { dispatcher });
        router.subscribe(ErrorListener);
        router
    }

    pub fn subscribe(&mut self, listener: impl EventListener + 'static) {
        tracing::debug!(
            listener = listener.name(),
            kind = ?listener.kind(),
            once = listener.once(),
            "event listener subscribed"
        );
        self.subscriptions.push(Subscription {
            listener: Arc::new(listener),
            fired: AtomicBool::new(false),
        });
    }

    /// Start every listener interested in `event`, each in its own task.
    pub fn emit(&self, event: BotEvent) -> Vec<tokio::task::JoinHandle<()>> {
        let kind = event.kind();
        self.subscriptions
            .iter()
            .filter(|subscription| subscription.listener.kind() == kind)
            .filter(|subscription| {
                !(subscription.listener.once() && subscription.fired.swap(true, Ordering::SeqCst))
            })
            .map(|subscription| {
                let listener = subscription.listener.clone();
                let event = event.clone();
                tokio::spawn(async move {
                    let outcome = AssertUnwindSafe(listener.handle(event)).catch_unwind().await;
                    match outcome {
                        Ok(Ok(())) => {}
                        Ok(Err(error)) => {
                            tracing::error!(listener = listener.name(), ?kind, %error, "event listener failed");
                        }
                        Err(_) => {
                            tracing::error!(listener = listener.name(), ?kind, "event listener panicked");
                        }
                    }
                })
            })
            .collect()
    }
}

/// Marks the bot ready when the gateway handshake completes.
pub struct ReadyListener {
    gate: ReadinessGate,
}

#[async_trait]
impl EventListener for ReadyListener {
    fn name(&self) -> &str {
        "ready"
    }

    fn kind(&self) -> EventKind {
        EventKind::Ready
    }

    fn once(&self) -> bool {
        true
    }

    async fn handle(&self, event: BotEvent) -> Result<()> {
        if let BotEvent::Ready(info) = event {
            tracing::info!(user = %info.user_tag, guilds = info.guild_count, "logged in to Discord");
            self.gate.mark_ready();
        }
        Ok(())
    }
}

/// Hands slash-command interactions to the dispatcher.
pub struct InteractionListener {
    dispatcher: Arc<CommandDispatcher>,
}

#[async_trait]
impl EventListener for InteractionListener {
    fn name(&self) -> &str {
        "interaction_create"
    }

    fn kind(&self) -> EventKind {
        EventKind::InteractionCreate
    }

    async fn handle(&self, event: BotEvent) -> Result<()> {
        if let BotEvent::InteractionCreate(interaction) = event {
            self.dispatcher.dispatch(interaction).await;
        }
        Ok(())
    }
}

pub struct ErrorListener;

#[async_trait]
impl EventListener for ErrorListener {
    fn name(&self) -> &str {
        "error"
    }

    fn kind(&self) -> EventKind {
        EventKind::Error
    }

    async fn handle(&self, event: BotEvent) -> Result<()> {
        if let BotEvent::Error(message) = event {
            tracing::error!(error = %message, "Discord client error");
        }
        Ok(())
    }
}
