//! Agent configuration with documented constants
//!
//! The configuration is built once (defaults, optional TOML file, CLI
//! overrides), validated, and then shared read-only behind an `Arc`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::ConfigError;

/// Complete agent configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub server: ServerConfig,
    pub schedule: ScheduleConfig,
    pub decay: DecayConfig,
    pub field: FieldGeometry,
}

/// Where the simulation server lives and how we introduce ourselves
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,

    /// Port the init handshake is sent to; the server answers from a
    /// per-player port which is used afterwards
    pub port: u16,

    pub team_name: String,

    /// Protocol version announced in `(init TEAM (version V))`
    pub protocol_version: f64,

    /// How long to wait for the init reply before giving up (ms)
    pub handshake_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 6000,
            team_name: "rcss-agent".into(),
            protocol_version: 15.0,
            handshake_timeout_ms: 2000,
        }
    }
}

/// Timing of the decide/act loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Period of the actuation task (ms). One server cycle is 100 ms.
    pub cycle_ms: u64,

    /// Firings without fresh perception before snapshots are flagged stale
    pub stale_after_cycles: u32,

    /// Pause after a failed receive before reading again (ms)
    pub recv_error_backoff_ms: u64,

    /// Send `(bye)` while shutting down
    pub send_bye_on_stop: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cycle_ms: 100,
            stale_after_cycles: 10,
            recv_error_backoff_ms: 10,
            send_bye_on_stop: true,
        }
    }
}

impl ScheduleConfig {
    pub fn cycle(&self) -> Duration {
        Duration::from_millis(self.cycle_ms)
    }

    pub fn recv_error_backoff(&self) -> Duration {
        Duration::from_millis(self.recv_error_backoff_ms)
    }
}

/// Decay constants for the hyperbolic confidence law
///
/// `confidence(t) = c0 * k / (k + |t - t0|)`; a smaller `k` forgets faster.
/// With k = 5, a reading is worth half its initial confidence after 5 cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayConfig {
    pub position_k: f64,
    pub direction_k: f64,
    pub distance_k: f64,

    /// Confidence assigned to a direct sighting
    pub observation_confidence: f64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            position_k: 3.0,
            direction_k: 5.0,
            distance_k: 5.0,
            observation_confidence: 1.0,
        }
    }
}

/// Pitch dimensions used to seed landmark positions (metres)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldGeometry {
    pub length: f64,
    pub width: f64,
    pub goal_width: f64,
    pub penalty_area_length: f64,
    pub penalty_area_width: f64,

    /// Distance of the boundary flags outside the touchlines and goal lines
    pub boundary_offset: f64,
}

impl Default for FieldGeometry {
    fn default() -> Self {
        Self {
            length: 105.0,
            width: 68.0,
            goal_width: 14.02,
            penalty_area_length: 16.5,
            penalty_area_width: 40.32,
            boundary_offset: 5.0,
        }
    }
}

impl AgentConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AgentConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        let team = &self.server.team_name;
        if team.is_empty()
            || team
                .chars()
                .any(|c| c.is_whitespace() || c == '(' || c == ')' || c == '"')
        {
            return invalid(format!("team_name {:?} must be a single bare token", team));
        }

        if self.schedule.cycle_ms == 0 {
            return invalid("cycle_ms must be positive".into());
        }

        let d = &self.decay;
        for (name, k) in [
            ("position_k", d.position_k),
            ("direction_k", d.direction_k),
            ("distance_k", d.distance_k),
        ] {
            if !(k.is_finite() && k > 0.0) {
                return invalid(format!("{} ({}) must be positive", name, k));
            }
        }
        if !(d.observation_confidence > 0.0 && d.observation_confidence <= 1.0) {
            return invalid(format!(
                "observation_confidence ({}) must be in (0, 1]",
                d.observation_confidence
            ));
        }

        let f = &self.field;
        if !(f.length > 0.0 && f.width > 0.0 && f.boundary_offset >= 0.0) {
            return invalid("field dimensions must be positive".into());
        }
        if f.goal_width <= 0.0 || f.goal_width >= f.width {
            return invalid(format!(
                "goal_width ({}) must fit inside width ({})",
                f.goal_width, f.width
            ));
        }
        if f.penalty_area_width >= f.width || f.penalty_area_length * 2.0 >= f.length {
            return invalid("penalty area does not fit inside the pitch".into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(AgentConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AgentConfig::from_toml_str(
            r#"
            [server]
            team_name = "Robots"

            [decay]
            direction_k = 8.0
            "#,
        )
        .unwrap();
        assert_eq!(config.server.team_name, "Robots");
        assert_eq!(config.server.port, 6000);
        assert_eq!(config.decay.direction_k, 8.0);
        assert_eq!(config.decay.position_k, 3.0);
        assert_eq!(config.field.length, 105.0);
    }

    #[test]
    fn test_rejects_team_name_with_space() {
        let mut config = AgentConfig::default();
        config.server.team_name = "two words".into();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_zero_decay() {
        let mut config = AgentConfig::default();
        config.decay.position_k = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_oversized_goal() {
        let mut config = AgentConfig::default();
        config.field.goal_width = 80.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_toml_is_error() {
        assert!(matches!(
            AgentConfig::from_toml_str("[server\nport = 1"),
            Err(ConfigError::Toml(_))
        ));
    }
}
