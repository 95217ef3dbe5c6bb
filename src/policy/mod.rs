//! Decision policies and the per-firing command bundle
//!
//! A policy is a pure function of a snapshot. Whatever it returns is
//! filtered down to at most one command per category before anything is
//! sent; the rest is dropped, never carried into the next firing.

pub mod chase;

pub use chase::ChaseBallPolicy;

use crate::protocol::command::{Command, CommandCategory};
use crate::world::snapshot::WorldSnapshot;

/// Strategy consulted once per actuation firing
pub trait DecisionPolicy: Send + Sync {
    fn decide(&self, snapshot: &WorldSnapshot) -> Vec<Command>;
}

impl<F> DecisionPolicy for F
where
    F: Fn(&WorldSnapshot) -> Vec<Command> + Send + Sync,
{
    fn decide(&self, snapshot: &WorldSnapshot) -> Vec<Command> {
        self(snapshot)
    }
}

/// Policy that never acts
#[derive(Debug, Clone, Copy, Default)]
pub struct IdlePolicy;

impl DecisionPolicy for IdlePolicy {
    fn decide(&self, _snapshot: &WorldSnapshot) -> Vec<Command> {
        Vec::new()
    }
}

/// At most one command per category, in the order the policy produced them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandBundle {
    commands: Vec<Command>,
    dropped: usize,
}

impl CommandBundle {
    /// Keep the first command of each category
    ///
    /// Session-control commands (`bye`, `init`) are not the policy's to send
    /// and count as dropped.
    pub fn collect(candidates: impl IntoIterator<Item = Command>) -> Self {
        let mut bundle = Self::default();
        let mut taken: Vec<CommandCategory> = Vec::with_capacity(3);

        for command in candidates {
            match command.category() {
                Some(category) if !taken.contains(&category) => {
                    taken.push(category);
                    bundle.commands.push(command);
                }
                Some(category) => {
                    tracing::trace!(%category, command = command.name(), "extra command dropped");
                    bundle.dropped += 1;
                }
                None => {
                    tracing::debug!(command = command.name(), "control command from policy dropped");
                    bundle.dropped += 1;
                }
            }
        }
        bundle
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl IntoIterator for CommandBundle {
    type Item = Command;
    type IntoIter = std::vec::IntoIter<Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.into_iter()
    }
}
