//! Configuration loading for the rumor engine.
//!
//! All tuning knobs are loaded from a TOML file. Every section falls back to
//! its defaults, so partial files are fine.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Default tuning file path
pub const DEFAULT_CONFIG_PATH: &str = "rumors.toml";

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RumorConfig {
    /// Similarity matching for merge decisions
    #[serde(default)]
    pub matching: MatchingConfig,
    /// Content mutation during retelling
    #[serde(default)]
    pub mutation: MutationConfig,
    /// Distance gating
    #[serde(default)]
    pub propagation: PropagationConfig,
    /// Listener belief scoring
    #[serde(default)]
    pub believability: BelievabilityConfig,
    /// Belief decay and forgetting
    #[serde(default)]
    pub decay: DecayConfig,
    /// Demo simulation settings
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl RumorConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: RumorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes this configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Rejects values outside the ranges the engine can work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn unit(name: &str, value: f64) -> Result<(), ConfigError> {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!("{} must be within [0, 1], got {}", name, value)))
            }
        }
        fn non_negative(name: &str, value: f64) -> Result<(), ConfigError> {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!("{} must be >= 0, got {}", name, value)))
            }
        }

        unit("matching.similarity_threshold", self.matching.similarity_threshold)?;
        unit("mutation.default_probability", self.mutation.default_probability)?;
        unit("mutation.max_truth_delta", self.mutation.max_truth_delta)?;
        non_negative("propagation.default_radius", self.propagation.default_radius)?;
        unit("believability.hop_decay", self.believability.hop_decay)?;
        unit("believability.reinforcement_increment", self.believability.reinforcement_increment)?;
        unit("believability.source_carryover", self.believability.source_carryover)?;
        non_negative("decay.decay_rate", self.decay.decay_rate)?;
        unit("decay.forget_threshold", self.decay.forget_threshold)?;
        if self.decay.interval_ticks == 0 {
            return Err(ConfigError::Invalid("decay.interval_ticks must be at least 1".into()));
        }
        unit("simulation.interaction_chance", self.simulation.interaction_chance)?;
        non_negative("simulation.world_size", self.simulation.world_size)?;
        non_negative("simulation.move_step", self.simulation.move_step)?;
        Ok(())
    }
}

/// Similarity matching settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum lexical similarity for two rumors to count as the same
    pub similarity_threshold: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.75,
        }
    }
}

/// Mutation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationConfig {
    /// Chance a retelling mutates when the caller does not say otherwise
    pub default_probability: f64,
    /// Largest truth-value nudge a single mutation may apply, either way
    pub max_truth_delta: f64,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            default_probability: 0.2,
            max_truth_delta: 0.1,
        }
    }
}

/// Propagation gate settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagationConfig {
    /// Radius used when a rumor has no override
    pub default_radius: f64,
    /// Categories that only travel between members of the same faction
    pub faction_guarded_categories: Vec<String>,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            default_radius: 50.0,
            faction_guarded_categories: vec!["secret".to_string()],
        }
    }
}

/// Believability model weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BelievabilityConfig {
    /// Belief before truth, trust, and bias are considered
    pub base: f64,
    /// Weight of the rumor's truth value
    pub truth_weight: f64,
    /// Weight of the listener's trust in the teller (factor in [-1, 1])
    pub relationship_weight: f64,
    /// Weight of the listener's credulity (factor in [-1, 1])
    pub bias_weight: f64,
    /// Multiplier applied per relay hop beyond the first
    pub hop_decay: f64,
    /// Fixed boost when a listener hears a rumor again
    pub reinforcement_increment: f64,
    /// Share of the fresh estimate added on reinforcement
    pub source_carryover: f64,
}

impl Default for BelievabilityConfig {
    fn default() -> Self {
        Self {
            base: 0.3,
            truth_weight: 0.4,
            relationship_weight: 0.3,
            bias_weight: 0.2,
            hop_decay: 0.85,
            reinforcement_increment: 0.2,
            source_carryover: 0.1,
        }
    }
}

/// Decay scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayConfig {
    /// Believability lost per unit of elapsed time
    pub decay_rate: f64,
    /// At or below this, a spread rumor counts as forgotten
    pub forget_threshold: f64,
    /// Ticks between decay passes in the simulation loop
    pub interval_ticks: u64,
    /// Scale decay by severity (trivial rumors fade faster)
    pub severity_weighted: bool,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            decay_rate: 0.05,
            forget_threshold: 0.01,
            interval_ticks: 100,
            severity_weighted: false,
        }
    }
}

/// Demo simulation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of agents to spawn
    pub agent_count: usize,
    /// Side length of the square world
    pub world_size: f64,
    /// Rumors seeded at start
    pub seed_rumors: usize,
    /// Chance per tick that an agent tries to share something
    pub interaction_chance: f64,
    /// Largest distance an agent wanders per tick
    pub move_step: f64,
    /// Number of factions agents are split across
    pub faction_count: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            agent_count: 40,
            world_size: 200.0,
            seed_rumors: 4,
            interaction_chance: 0.3,
            move_step: 5.0,
            faction_count: 3,
        }
    }
}

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading config file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Error parsing TOML config
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Error writing TOML config
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    /// Value outside its permitted range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generates a default configuration file content.
pub fn default_config_toml() -> String {
    r#"# Rumor Engine Configuration

[matching]
similarity_threshold = 0.75

[mutation]
default_probability = 0.2
max_truth_delta = 0.1

[propagation]
default_radius = 50.0
faction_guarded_categories = ["secret"]

[believability]
base = 0.3
truth_weight = 0.4
relationship_weight = 0.3
bias_weight = 0.2
hop_decay = 0.85
reinforcement_increment = 0.2
source_carryover = 0.1

[decay]
decay_rate = 0.05
forget_threshold = 0.01
interval_ticks = 100
severity_weighted = false

[simulation]
agent_count = 40
world_size = 200.0
seed_rumors = 4
interaction_chance = 0.3
move_step = 5.0
faction_count = 3
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RumorConfig::default();

        assert_eq!(config.matching.similarity_threshold, 0.75);
        assert_eq!(config.propagation.default_radius, 50.0);
        assert_eq!(config.decay.decay_rate, 0.05);
        assert!(!config.decay.severity_weighted);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml = r#"
            [decay]
            decay_rate = 0.1
        "#;

        let config = RumorConfig::from_str(toml).unwrap();

        // Specified value
        assert_eq!(config.decay.decay_rate, 0.1);
        // Default values
        assert_eq!(config.decay.forget_threshold, 0.01);
        assert_eq!(config.mutation.default_probability, 0.2);
        assert_eq!(config.simulation.agent_count, 40);
    }

    #[test]
    fn test_default_config_toml_parses() {
        let config = RumorConfig::from_str(&default_config_toml()).unwrap();
        let defaults = RumorConfig::default();

        assert_eq!(config.matching.similarity_threshold, defaults.matching.similarity_threshold);
        assert_eq!(config.believability.hop_decay, defaults.believability.hop_decay);
        assert_eq!(config.decay.interval_ticks, defaults.decay.interval_ticks);
        assert_eq!(
            config.propagation.faction_guarded_categories,
            defaults.propagation.faction_guarded_categories
        );
    }

    #[test]
    fn test_config_to_toml() {
        let toml = RumorConfig::default().to_toml().unwrap();

        assert!(toml.contains("[matching]"));
        assert!(toml.contains("[decay]"));
        assert!(toml.contains("[simulation]"));
        assert!(RumorConfig::from_str(&toml).is_ok());
    }

    #[test]
    fn test_out_of_range_rejected() {
        let toml = r#"
            [matching]
            similarity_threshold = 1.5
        "#;
        assert!(matches!(RumorConfig::from_str(toml), Err(ConfigError::Invalid(_))));

        let toml = r#"
            [decay]
            interval_ticks = 0
        "#;
        assert!(matches!(RumorConfig::from_str(toml), Err(ConfigError::Invalid(_))));

        for bad in [
            "[simulation]\nworld_size = -10.0\n",
            "[simulation]\nworld_size = nan\n",
            "[simulation]\nmove_step = inf\n",
            "[simulation]\nmove_step = -1.0\n",
        ] {
            assert!(
                matches!(RumorConfig::from_str(bad), Err(ConfigError::Invalid(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        assert!(matches!(
            RumorConfig::from_str("[decay\ndecay_rate = "),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = RumorConfig::from_file(Path::new("does/not/exist.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
