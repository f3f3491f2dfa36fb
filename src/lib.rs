//! Lillego Bot: a Discord slash-command bot for a community calendar.

pub mod api;
pub mod calendar;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod interaction;
pub mod keepalive;
pub mod messaging;
pub mod readiness;
pub mod report;

pub use error::{Error, Result};
