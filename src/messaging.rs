//! Chat platform adapters.

pub mod discord;

pub use discord::{DiscordHandler, DiscordInteraction};
