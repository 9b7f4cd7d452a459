//! Tunables for threat tables and perception trackers.
//!
//! Configuration can be loaded from and saved to a TOML file. Every field
//! has a game-tuned default, so partial files are fine.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Default configuration file name.
pub const CONFIG_FILE: &str = "warden.toml";

/// Errors that can occur while loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error.
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// TOML deserialization error.
    #[error("TOML parse error: {0}")]
    TomlDeserialize(#[from] toml::de::Error),

    /// Invalid configuration value.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Threat table parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreatConfig {
    /// Sources farther than this are ignored
    pub aggro_range: f32,
    /// Cap on any single source's threat
    pub max_threat: f32,
    /// Threat lost per second once decay starts
    pub aggro_decay_rate: f32,
    /// Seconds after the last addition before decay starts
    pub aggro_decay_delay: f32,
    /// Challenger must reach incumbent threat times this to take over
    pub switch_threshold: f32,
    /// Minimum seconds between target switches
    pub switch_cooldown: f32,
    /// Threat per point of damage
    pub damage_threat_multiplier: f32,
    /// Threat per point of healing
    pub healing_threat_multiplier: f32,
    /// Taunt adds `max_threat` times this
    pub taunt_multiplier: f32,
    /// Add a proximity bonus when picking the target
    pub prioritize_closest: bool,
    /// Bonus per unit of distance inside `aggro_range`
    pub proximity_threat_multiplier: f32,
}

impl Default for ThreatConfig {
    fn default() -> Self {
        Self {
            aggro_range: 15.0,
            max_threat: 100.0,
            aggro_decay_rate: 5.0,
            aggro_decay_delay: 3.0,
            switch_threshold: 1.2,
            switch_cooldown: 1.0,
            damage_threat_multiplier: 1.0,
            healing_threat_multiplier: 0.5,
            taunt_multiplier: 2.0,
            prioritize_closest: false,
            proximity_threat_multiplier: 1.0,
        }
    }
}

impl ThreatConfig {
    /// Clamp values to sensible ranges.
    pub fn validate(&mut self) {
        self.aggro_range = self.aggro_range.max(0.0);
        self.max_threat = self.max_threat.max(1.0);
        self.aggro_decay_rate = self.aggro_decay_rate.max(0.0);
        self.aggro_decay_delay = self.aggro_decay_delay.max(0.0);
        // A challenger must at least match the incumbent
        self.switch_threshold = self.switch_threshold.max(1.0);
        self.switch_cooldown = self.switch_cooldown.max(0.0);
        self.damage_threat_multiplier = self.damage_threat_multiplier.max(0.0);
        self.healing_threat_multiplier = self.healing_threat_multiplier.max(0.0);
        self.taunt_multiplier = self.taunt_multiplier.max(0.0);
        self.proximity_threat_multiplier = self.proximity_threat_multiplier.max(0.0);
    }
}

/// Perception tracker parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionConfig {
    /// Maximum vision distance
    pub sight_range: f32,
    /// Full opening of the vision cone in degrees
    pub sight_angle: f32,
    /// Inside this distance facing is ignored
    pub peripheral_range: f32,
    /// Height of the observer's eyes above its base
    pub eye_height: f32,
    /// Height above a target's base used for LOS checks
    pub target_center_offset: f32,
    /// Maximum hearing distance
    pub hearing_range: f32,
    /// Minimum effective volume that registers
    pub hearing_threshold: f32,
    /// Awareness gained per second at point-blank range
    pub awareness_gain_rate: f32,
    /// Awareness lost per second while unseen
    pub awareness_decay_rate: f32,
    /// Awareness at which a target becomes suspicious
    pub suspicion_threshold: f32,
    /// Awareness at which a target is fully detected
    pub detection_threshold: f32,
    /// Seconds between vision passes
    pub perception_update_rate: f32,
    /// Seconds spent searching after losing a target
    pub search_duration: f32,
    /// Seconds heard sounds are remembered
    pub memory_duration: f32,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            sight_range: 20.0,
            sight_angle: 110.0,
            peripheral_range: 3.0,
            eye_height: 1.6,
            target_center_offset: 1.0,
            hearing_range: 15.0,
            hearing_threshold: 0.1,
            awareness_gain_rate: 100.0,
            awareness_decay_rate: 10.0,
            suspicion_threshold: 30.0,
            detection_threshold: 100.0,
            perception_update_rate: 0.2,
            search_duration: 10.0,
            memory_duration: 5.0,
        }
    }
}

impl PerceptionConfig {
    /// Clamp values to sensible ranges.
    pub fn validate(&mut self) {
        self.sight_range = self.sight_range.max(0.0);
        self.sight_angle = self.sight_angle.clamp(0.0, 360.0);
        self.peripheral_range = self.peripheral_range.clamp(0.0, self.sight_range);
        self.hearing_range = self.hearing_range.max(0.0);
        self.hearing_threshold = self.hearing_threshold.max(0.0);
        self.awareness_gain_rate = self.awareness_gain_rate.max(0.0);
        self.awareness_decay_rate = self.awareness_decay_rate.max(0.0);
        self.detection_threshold = self.detection_threshold.max(f32::EPSILON);
        self.suspicion_threshold = self.suspicion_threshold.clamp(0.0, self.detection_threshold);
        self.perception_update_rate = self.perception_update_rate.max(0.0);
        self.search_duration = self.search_duration.max(0.0);
        self.memory_duration = self.memory_duration.max(0.0);
    }
}

/// Complete AI configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Threat table parameters
    pub threat: ThreatConfig,
    /// Perception tracker parameters
    pub perception: PerceptionConfig,
}

impl AiConfig {
    /// Parses configuration from a TOML string and clamps it.
    pub fn from_toml(contents: &str) -> ConfigResult<Self> {
        let mut config: Self = toml::from_str(contents)?;
        config.validate();
        Ok(config)
    }

    /// Serializes configuration to a TOML string.
    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Loads configuration from a specific path.
    pub fn load_from<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config = Self::from_toml(&contents)?;
        info!("Loaded AI config from {}", path.display());
        Ok(config)
    }

    /// Loads configuration, falling back to defaults if the file is
    /// missing or invalid.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("Config file {} not found, using defaults", path.display());
            return Self::default();
        }
        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load config file: {e}");
                Self::default()
            },
        }
    }

    /// Saves configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, self.to_toml()?)?;
        info!("Saved AI config to {}", path.display());
        Ok(())
    }

    /// Clamp every section to sensible ranges.
    pub fn validate(&mut self) {
        self.threat.validate();
        self.perception.validate();
    }

    /// Rejects configurations that clamping cannot repair.
    pub fn check(&self) -> ConfigResult<()> {
        let floats = [
            ("threat.aggro_range", self.threat.aggro_range),
            ("threat.max_threat", self.threat.max_threat),
            ("threat.switch_threshold", self.threat.switch_threshold),
            ("perception.sight_range", self.perception.sight_range),
            ("perception.detection_threshold", self.perception.detection_threshold),
            ("perception.hearing_range", self.perception.hearing_range),
        ];
        for (name, value) in floats {
            if !value.is_finite() {
                return Err(ConfigError::InvalidValue(format!("{name} must be finite")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AiConfig::default();
        assert_eq!(config.threat.aggro_range, 15.0);
        assert_eq!(config.threat.max_threat, 100.0);
        assert!((config.threat.switch_threshold - 1.2).abs() < f32::EPSILON);
        assert!(config.perception.suspicion_threshold < config.perception.detection_threshold);
    }

    #[test]
    fn test_config_validation() {
        let mut config = AiConfig::default();
        config.threat.switch_threshold = 0.5;
        config.threat.aggro_decay_rate = -3.0;
        config.perception.sight_angle = 500.0;
        config.perception.peripheral_range = 50.0;
        config.perception.suspicion_threshold = 300.0;

        config.validate();

        assert_eq!(config.threat.switch_threshold, 1.0);
        assert_eq!(config.threat.aggro_decay_rate, 0.0);
        assert_eq!(config.perception.sight_angle, 360.0);
        assert_eq!(config.perception.peripheral_range, config.perception.sight_range);
        assert_eq!(
            config.perception.suspicion_threshold,
            config.perception.detection_threshold
        );
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = AiConfig::from_toml(
            r"
            [threat]
            aggro_range = 30.0

            [perception]
            search_duration = 4.0
            ",
        )
        .expect("valid toml");

        assert_eq!(config.threat.aggro_range, 30.0);
        assert_eq!(config.threat.max_threat, 100.0);
        assert_eq!(config.perception.search_duration, 4.0);
        assert_eq!(config.perception.sight_range, 20.0);
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("nested").join(CONFIG_FILE);

        let mut config = AiConfig::default();
        config.threat.prioritize_closest = true;
        config.perception.sight_angle = 90.0;

        config.save_to(&config_path).expect("Failed to save config");

        let loaded = AiConfig::load_from(&config_path).expect("Failed to load config");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file_errors() {
        let result = AiConfig::load_from("/nonexistent/path/warden.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));

        let config = AiConfig::load_or_default("/nonexistent/path/warden.toml");
        assert_eq!(config, AiConfig::default());
    }

    #[test]
    fn test_load_invalid_toml() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("bad.toml");
        fs::write(&path, "threat = [not toml").expect("write");

        assert!(matches!(
            AiConfig::load_from(&path),
            Err(ConfigError::TomlDeserialize(_))
        ));
        assert_eq!(AiConfig::load_or_default(&path), AiConfig::default());
    }

    #[test]
    fn test_check_rejects_non_finite() {
        let mut config = AiConfig::default();
        assert!(config.check().is_ok());
        config.threat.max_threat = f32::NAN;
        assert!(matches!(config.check(), Err(ConfigError::InvalidValue(_))));
    }
}
