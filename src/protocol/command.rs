//! Agent → server commands

use serde::Serialize;

use crate::core::error::EncodeError;

/// Slot a command occupies in one actuation firing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, derive_more::Display)]
pub enum CommandCategory {
    #[display(fmt = "movement")]
    Movement,
    #[display(fmt = "turn")]
    Turn,
    #[display(fmt = "kick")]
    Kick,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Command {
    Dash { power: f64, direction: Option<f64> },
    Kick { power: f64, direction: f64 },
    Turn { moment: f64 },
    Bye,
    Init { team: String, version: f64 },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Dash { .. } => "dash",
            Command::Kick { .. } => "kick",
            Command::Turn { .. } => "turn",
            Command::Bye => "bye",
            Command::Init { .. } => "init",
        }
    }

    /// Session-control commands have no category and are never sent by a policy
    pub fn category(&self) -> Option<CommandCategory> {
        match self {
            Command::Dash { .. } => Some(CommandCategory::Movement),
            Command::Turn { .. } => Some(CommandCategory::Turn),
            Command::Kick { .. } => Some(CommandCategory::Kick),
            Command::Bye | Command::Init { .. } => None,
        }
    }

    /// Render to protocol text
    pub fn encode(&self) -> Result<String, EncodeError> {
        let name = self.name();
        let finite = |field: &'static str, v: f64| {
            if v.is_finite() {
                Ok(v)
            } else {
                Err(EncodeError::NonFinite {
                    command: name,
                    field,
                })
            }
        };

        let text = match self {
            Command::Dash {
                power,
                direction: None,
            } => format!("(dash {})", finite("power", *power)?),
            Command::Dash {
                power,
                direction: Some(direction),
            } => format!(
                "(dash {} {})",
                finite("power", *power)?,
                finite("direction", *direction)?
            ),
            Command::Kick { power, direction } => format!(
                "(kick {} {})",
                finite("power", *power)?,
                finite("direction", *direction)?
            ),
            Command::Turn { moment } => format!("(turn {})", finite("moment", *moment)?),
            Command::Bye => "(bye)".to_string(),
            Command::Init { team, version } => {
                if team.is_empty()
                    || team
                        .chars()
                        .any(|c| c.is_whitespace() || c == '(' || c == ')' || c == '"')
                {
                    return Err(EncodeError::InvalidTeamName(team.clone()));
                }
                format!("(init {} (version {}))", team, finite("version", *version)?)
            }
        };

        Ok(text)
    }
}
