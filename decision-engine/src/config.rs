//! Engine configuration
//!
//! Defaults come from the environment; a TOML file may override any field.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::events::DEFAULT_CHANNEL_CAPACITY;
use crate::params::{DEFAULT_MAX_SUGGESTED_K, MAX_PARTICIPANTS};

/// Default per-turn time budget
pub const DEFAULT_TURN_TIMEOUT_MINUTES: u32 = 60;

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Tunables for [`DecisionService`](crate::service::DecisionService).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Turn budget used when a session does not name one
    pub turn_timeout_minutes: u32,
    /// Fixed RNG seed for reproducible orders and draws
    pub rng_seed: Option<u64>,
    /// Broadcast buffer per subscriber
    pub event_capacity: usize,
    pub max_participants: u32,
    /// Largest K the parameter suggester tries
    pub max_suggested_k: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            // DECISION_TURN_TIMEOUT_MINUTES: per-turn budget
            turn_timeout_minutes: std::env::var("DECISION_TURN_TIMEOUT_MINUTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TURN_TIMEOUT_MINUTES),
            // DECISION_RNG_SEED: unset means seed from entropy
            rng_seed: std::env::var("DECISION_RNG_SEED")
                .ok()
                .and_then(|s| s.parse().ok()),
            // DECISION_EVENT_CAPACITY: broadcast buffer
            event_capacity: std::env::var("DECISION_EVENT_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_CHANNEL_CAPACITY),
            max_participants: MAX_PARTICIPANTS,
            max_suggested_k: DEFAULT_MAX_SUGGESTED_K,
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn with_turn_timeout(mut self, minutes: u32) -> Self {
        self.turn_timeout_minutes = minutes;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.turn_timeout_minutes == 0 {
            return Err(ConfigError::Invalid(
                "turn_timeout_minutes must be at least 1".to_string(),
            ));
        }
        if self.max_participants == 0 || self.max_participants > MAX_PARTICIPANTS {
            return Err(ConfigError::Invalid(format!(
                "max_participants must be 1..={MAX_PARTICIPANTS}"
            )));
        }
        if self.max_suggested_k == 0 {
            return Err(ConfigError::Invalid(
                "max_suggested_k must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
