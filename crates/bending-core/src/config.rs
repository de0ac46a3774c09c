//! Engine configuration.
//!
//! Every section has defaults, so an empty JSON object is a valid
//! configuration:
//!
//! ```
//! use bending_core::BendingConfig;
//!
//! let config = BendingConfig::from_json(r#"{ "sequence": { "capacity": 8 } }"#).unwrap();
//! assert_eq!(config.sequence.capacity, 8);
//! assert_eq!(config.tick_millis, 50);
//! ```

use serde::{Deserialize, Serialize};

use crate::ability::AbilityKey;
use crate::error::{BendingError, Result};
use crate::sequence::MAX_STEPS;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BendingConfig {
    /// Milliseconds per engine tick
    pub tick_millis: u64,
    /// Seed for per-world random number generators
    pub seed: u64,
    /// Temporary-state limits
    pub temporal: TemporalConfig,
    /// Combo input settings
    pub sequence: SequenceConfig,
    /// Collision pass settings
    pub collision: CollisionConfig,
    /// Temporary light settings
    pub light: LightConfig,
    /// Ability keys (`namespace:name` or bare `name`) that cannot be activated
    pub disabled_abilities: Vec<String>,
}

impl Default for BendingConfig {
    fn default() -> Self {
        Self {
            tick_millis: 50,
            seed: 0,
            temporal: TemporalConfig::default(),
            sequence: SequenceConfig::default(),
            collision: CollisionConfig::default(),
            light: LightConfig::default(),
            disabled_abilities: Vec::new(),
        }
    }
}

/// Upper bounds on temporary-state lifetimes, in ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalConfig {
    /// Longest temporary block lifetime (also used for zero durations)
    pub max_block_ticks: u32,
    /// Longest temporary entity lifetime
    pub max_entity_ticks: u32,
    /// Longest temporary light lifetime
    pub max_light_ticks: u32,
    /// Longest action limiter lifetime
    pub max_limiter_ticks: u32,
    /// How long blocks broken out of fragile structures stay broken
    pub earth_revert_millis: u64,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            max_block_ticks: 72_000,
            max_entity_ticks: 600,
            max_light_ticks: 600,
            max_limiter_ticks: 600,
            earth_revert_millis: 1_000,
        }
    }
}

/// Combo input buffer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// Steps kept per user
    pub capacity: usize,
    /// Idle time after which a user's buffer is cleared
    pub expiry_millis: u64,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            capacity: MAX_STEPS,
            expiry_millis: 10_000,
        }
    }
}

/// Collision pass settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    /// Run the collision pass every N ticks
    pub interval_ticks: u64,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self { interval_ticks: 1 }
    }
}

/// Temporary light settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    /// Whether abilities may emit temporary lights
    pub enabled: bool,
    /// Default fade per revert step
    pub rate: u8,
    /// Default time before fading starts
    pub duration_millis: u64,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rate: 3,
            duration_millis: 100,
        }
    }
}

impl BendingConfig {
    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BendingError::ConfigParse`] on malformed JSON and
    /// [`BendingError::InvalidConfig`] on out-of-range values.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`BendingError::ConfigParse`] if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`BendingError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.tick_millis == 0 {
            return Err(BendingError::InvalidConfig("tick_millis must be positive".into()));
        }
        if self.sequence.capacity == 0 {
            return Err(BendingError::InvalidConfig(
                "sequence.capacity must be positive".into(),
            ));
        }
        if self.collision.interval_ticks == 0 {
            return Err(BendingError::InvalidConfig(
                "collision.interval_ticks must be positive".into(),
            ));
        }
        if self.light.rate == 0 {
            return Err(BendingError::InvalidConfig("light.rate must be positive".into()));
        }
        let temporal = &self.temporal;
        if [
            temporal.max_block_ticks,
            temporal.max_entity_ticks,
            temporal.max_light_ticks,
            temporal.max_limiter_ticks,
        ]
        .contains(&0)
        {
            return Err(BendingError::InvalidConfig(
                "temporal limits must be positive".into(),
            ));
        }
        for key in &self.disabled_abilities {
            if AbilityKey::parse(key).is_none() {
                return Err(BendingError::InvalidConfig(format!(
                    "invalid ability key {key:?}"
                )));
            }
        }
        Ok(())
    }

    /// Parsed disabled ability keys. Invalid entries are skipped.
    #[must_use]
    pub fn disabled_keys(&self) -> Vec<AbilityKey> {
        self.disabled_abilities
            .iter()
            .filter_map(|key| AbilityKey::parse(key))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let config = BendingConfig::from_json("{}").unwrap();
        assert_eq!(config, BendingConfig::default());
    }

    #[test]
    fn round_trips_through_json() {
        let mut config = BendingConfig::default();
        config.seed = 99;
        config.disabled_abilities.push("bending:firewall".into());
        let json = config.to_json_pretty().unwrap();
        assert_eq!(BendingConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn rejects_zero_tick_length() {
        let err = BendingConfig::from_json(r#"{ "tick_millis": 0 }"#).unwrap_err();
        assert!(matches!(err, BendingError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = BendingConfig::from_json("{ nope").unwrap_err();
        assert!(matches!(err, BendingError::ConfigParse(_)));
    }

    #[test]
    fn rejects_bad_ability_keys() {
        let err = BendingConfig::from_json(r#"{ "disabled_abilities": ["a:b:c"] }"#).unwrap_err();
        assert!(matches!(err, BendingError::InvalidConfig(_)));
    }

    #[test]
    fn disabled_keys_default_namespace() {
        let config = BendingConfig::from_json(r#"{ "disabled_abilities": ["firewall"] }"#).unwrap();
        assert_eq!(config.disabled_keys(), vec![AbilityKey::bending("firewall")]);
    }
}
