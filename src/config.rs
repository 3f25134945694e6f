//! Engine configuration
//!
//! All fields have defaults matching the bedside deployment (a reading every
//! three seconds, five minutes of rolling history), so a config file only
//! needs to name what it changes.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};

/// Default rolling window: 100 readings = 5 minutes at 3-second intervals
pub const DEFAULT_WINDOW_SIZE: usize = 100;

/// Default number of consecutive low readings that raise the stress alert
pub const DEFAULT_STRESS_THRESHOLD: u32 = 2;

/// What to do when a session is started while another one is active
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartPolicy {
    /// Discard the in-progress session and start over
    #[default]
    Restart,
    /// Refuse the start and keep the active session
    Reject,
}

/// Tunable engine parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Ticks between generated readings
    pub signal_period_ticks: u64,
    /// Ticks between playback progress updates
    pub playback_period_ticks: u64,
    /// Ticks between session duration updates
    pub session_period_ticks: u64,
    /// Logical seconds represented by one tick
    pub tick_seconds: u64,
    /// Maximum readings kept in the rolling window
    pub window_size: usize,
    /// Consecutive low readings that raise the stress alert
    pub stress_threshold: u32,
    /// Initial player volume (0-100)
    pub initial_volume: u8,
    /// Pain score assumed before the patient reports one (0-10)
    pub default_pain_score: u8,
    /// Seed for the signal generator; `None` seeds from the OS
    pub seed: Option<u64>,
    pub restart_policy: RestartPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            signal_period_ticks: 3,
            playback_period_ticks: 1,
            session_period_ticks: 1,
            tick_seconds: 1,
            window_size: DEFAULT_WINDOW_SIZE,
            stress_threshold: DEFAULT_STRESS_THRESHOLD,
            initial_volume: 70,
            default_pain_score: 5,
            seed: None,
            restart_policy: RestartPolicy::Restart,
        }
    }
}

impl EngineConfig {
    /// Default configuration with a fixed generator seed
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    /// Load and validate a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Check that every parameter is usable
    pub fn validate(&self) -> Result<(), EngineError> {
        let periods = [
            ("signal_period_ticks", self.signal_period_ticks),
            ("playback_period_ticks", self.playback_period_ticks),
            ("session_period_ticks", self.session_period_ticks),
            ("tick_seconds", self.tick_seconds),
        ];
        for (name, value) in periods {
            if value == 0 {
                return Err(EngineError::InvalidConfig(format!("{name} must be positive")));
            }
        }
        if self.window_size == 0 {
            return Err(EngineError::InvalidConfig(
                "window_size must be positive".to_string(),
            ));
        }
        if self.stress_threshold == 0 {
            return Err(EngineError::InvalidConfig(
                "stress_threshold must be positive".to_string(),
            ));
        }
        if self.initial_volume > 100 {
            return Err(EngineError::InvalidConfig(format!(
                "initial_volume {} exceeds 100",
                self.initial_volume
            )));
        }
        if self.default_pain_score > 10 {
            return Err(EngineError::InvalidConfig(format!(
                "default_pain_score {} exceeds 10",
                self.default_pain_score
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json(r#"{"signal_period_ticks": 5, "seed": 7}"#).unwrap();
        assert_eq!(config.signal_period_ticks, 5);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.window_size, DEFAULT_WINDOW_SIZE);
        assert_eq!(config.restart_policy, RestartPolicy::Restart);
    }

    #[test]
    fn test_restart_policy_names() {
        let config = EngineConfig::from_json(r#"{"restart_policy": "reject"}"#).unwrap();
        assert_eq!(config.restart_policy, RestartPolicy::Reject);
    }

    #[test]
    fn test_rejects_zero_period() {
        let result = EngineConfig::from_json(r#"{"playback_period_ticks": 0}"#);
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_out_of_range_defaults() {
        let config = EngineConfig {
            default_pain_score: 11,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());

        let config = EngineConfig {
            initial_volume: 101,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_round_trip() {
        let config = EngineConfig::seeded(42);
        let loaded = EngineConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            EngineConfig::from_json("not json"),
            Err(EngineError::JsonError(_))
        ));
    }
}
