//! Name → command mapping built once at startup.

use super::{Command, CommandCandidate, CommandData};
use crate::readiness::ReadinessGate;

use std::collections::HashMap;

/// Read-only lookup table of validated commands.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Command>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from candidates, skipping malformed ones.
    pub fn from_candidates(candidates: impl IntoIterator<Item = CommandCandidate>) -> Self {
        let mut registry = Self::new();
        for candidate in candidates {
            registry.register(candidate);
        }
        tracing::info!(count = registry.len(), "commands registered");
        registry
    }

    /// Validate and insert a candidate. Returns whether it was accepted.
    ///
    /// A later candidate with the same name replaces the earlier one.
    pub fn register(&mut self, candidate: CommandCandidate) -> bool {
        let CommandCandidate { data, handler } = candidate;

        let (data, handler) = match (data, handler) {
            (Some(data), Some(handler)) => (data, handler),
            (data, _) => {
                tracing::warn!(
                    command = data.as_ref().map(|data| data.name.as_str()).unwrap_or("<unnamed>"),
                    "command is missing its metadata or execute handler, skipping"
                );
                return false;
            }
        };

        let CommandData {
            name,
            description,
            options,
        } = data;

        if name.trim().is_empty() {
            tracing::warn!("command has an empty name, skipping");
            return false;
        }

        let command = Command {
            name: name.clone(),
            description,
            options,
            handler,
        };

        if self.commands.insert(name.clone(), command).is_some() {
            tracing::debug!(command = %name, "command registered twice, keeping the latest");
        } else {
            tracing::debug!(command = %name, "loaded command");
        }
        true
    }

    /// Wrap every handler in a cold-start guard bound to `gate`.
    pub fn with_cold_start_guard(self, gate: &ReadinessGate) -> Self {
        let commands = self
            .commands
            .into_iter()
            .map(|(name, command)| (name, command.with_cold_start_guard(gate)))
            .collect();
        Self { commands }
    }

    pub fn get(&self, name: &str) -> Option<&Command> {
        self.commands.get(name)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Commands sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        let mut commands: Vec<&Command> = self.commands.values().collect();
        commands.sort_by(|a, b| a.name.cmp(&b.name));
        commands.into_iter()
    }

    /// Metadata of every command, sorted by name, for deployment.
    pub fn definitions(&self) -> Vec<CommandData> {
        self.iter().map(Command::data).collect()
    }
}
