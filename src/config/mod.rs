//! Configuration system with YAML schema and validation.
//!
//! Implements Poka-Yoke (mistake-proofing) through:
//! - Type-safe configuration structs
//! - Declarative validation via `validator`
//! - Runtime semantic validation

use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

use crate::error::{SimError, SimResult};

/// Top-level configuration.
///
/// Loaded from YAML files with full schema validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SimConfig {
    /// Schema version for forward compatibility.
    #[validate(length(min = 1))]
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    /// Monte Carlo settings.
    #[validate(nested)]
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Statistics reported for distributions.
    #[validate(nested)]
    #[serde(default)]
    pub statistics: StatisticsConfig,

    /// Power-attack optimizer settings.
    #[validate(nested)]
    #[serde(default)]
    pub power_attack: PowerAttackConfig,

    /// Level progression analyzer settings.
    #[validate(nested)]
    #[serde(default)]
    pub progression: ProgressionConfig,
}

fn default_schema_version() -> String {
    "1.0".to_string()
}

impl SimConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - YAML parsing fails
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string.
    ///
    /// # Errors
    ///
    /// Returns error if parsing or validation fails.
    pub fn from_yaml(yaml: &str) -> SimResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.check()?;
        Ok(config)
    }

    /// Create a builder for configuration.
    #[must_use]
    pub fn builder() -> SimConfigBuilder {
        SimConfigBuilder::default()
    }

    /// Run declarative and semantic validation.
    ///
    /// # Errors
    ///
    /// Returns `Validation` or `Config` errors.
    pub fn check(&self) -> SimResult<()> {
        self.validate()?;
        self.validate_semantic()
    }

    /// Validate semantic constraints beyond schema.
    fn validate_semantic(&self) -> SimResult<()> {
        if let Some(p) = self
            .statistics
            .percentiles
            .iter()
            .find(|p| !p.is_finite() || !(0.0..=100.0).contains(*p))
        {
            return Err(SimError::config(format!(
                "Percentiles must lie in [0, 100], got {p}"
            )));
        }

        self.power_attack.validate_semantic()
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            simulation: SimulationConfig::default(),
            statistics: StatisticsConfig::default(),
            power_attack: PowerAttackConfig::default(),
            progression: ProgressionConfig::default(),
        }
    }
}

/// Configuration builder for programmatic construction.
#[derive(Debug, Default)]
pub struct SimConfigBuilder {
    seed: Option<u32>,
    iterations: Option<usize>,
    progress_interval: Option<usize>,
    confidence: Option<f64>,
    percentiles: Option<Vec<f64>>,
}

impl SimConfigBuilder {
    /// Set the random seed.
    #[must_use]
    pub const fn seed(mut self, seed: u32) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the default iteration count.
    #[must_use]
    pub const fn iterations(mut self, iterations: usize) -> Self {
        self.iterations = Some(iterations);
        self
    }

    /// Set how often progress is reported.
    #[must_use]
    pub const fn progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = Some(interval);
        self
    }

    /// Set the confidence level for intervals.
    #[must_use]
    pub const fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Set the reported percentiles.
    #[must_use]
    pub fn percentiles(mut self, percentiles: Vec<f64>) -> Self {
        self.percentiles = Some(percentiles);
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> SimConfig {
        let mut config = SimConfig::default();

        if let Some(seed) = self.seed {
            config.simulation.seed = seed;
        }
        if let Some(iterations) = self.iterations {
            config.simulation.iterations = iterations;
        }
        if let Some(interval) = self.progress_interval {
            config.simulation.progress_interval = interval;
        }
        if let Some(confidence) = self.confidence {
            config.statistics.confidence = confidence;
        }
        if let Some(percentiles) = self.percentiles {
            config.statistics.percentiles = percentiles;
        }

        config
    }
}

/// Monte Carlo settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    /// Seed for the simulator's generator.
    #[serde(default = "default_seed")]
    pub seed: u32,

    /// Default number of runs.
    #[validate(range(min = 1, max = 10_000_000))]
    #[serde(default = "default_iterations")]
    pub iterations: usize,

    /// Runs between progress reports.
    #[validate(range(min = 1))]
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,

    /// Decisions kept in the bounded history.
    #[validate(range(min = 1, max = 1_000_000))]
    #[serde(default = "default_decision_log_capacity")]
    pub decision_log_capacity: usize,
}

const fn default_seed() -> u32 {
    12345
}

const fn default_iterations() -> usize {
    5000
}

const fn default_progress_interval() -> usize {
    100
}

const fn default_decision_log_capacity() -> usize {
    1024
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            iterations: default_iterations(),
            progress_interval: default_progress_interval(),
            decision_log_capacity: default_decision_log_capacity(),
        }
    }
}

/// Statistics settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct StatisticsConfig {
    /// Confidence level for intervals.
    #[validate(range(min = 0.5, max = 0.999))]
    #[serde(default = "default_confidence")]
    pub confidence: f64,

    /// Percentiles reported in every summary.
    #[serde(default = "default_percentiles")]
    pub percentiles: Vec<f64>,
}

const fn default_confidence() -> f64 {
    0.95
}

fn default_percentiles() -> Vec<f64> {
    vec![5.0, 10.0, 25.0, 50.0, 75.0, 90.0, 95.0]
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            confidence: default_confidence(),
            percentiles: default_percentiles(),
        }
    }
}

/// Power-attack optimizer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PowerAttackConfig {
    /// Attack penalty while power attacking.
    #[validate(range(min = 0.0, max = 20.0))]
    #[serde(default = "default_penalty")]
    pub penalty: f64,

    /// Damage bonus per hit on weapon-sourced damage.
    #[validate(range(min = 0.0, max = 40.0))]
    #[serde(default = "default_damage_bonus")]
    pub damage_bonus: f64,

    /// Minimum DPR gain to recommend power attacking.
    #[serde(default)]
    pub threshold: f64,

    /// Break-even search stops once |delta| is within this.
    #[validate(range(min = 0.0))]
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Break-even search iteration cap.
    #[validate(range(min = 1, max = 200))]
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Lower bound of the break-even search.
    #[serde(default = "default_ac_min")]
    pub ac_min: f64,

    /// Upper bound of the break-even search.
    #[serde(default = "default_ac_max")]
    pub ac_max: f64,
}

const fn default_penalty() -> f64 {
    5.0
}

const fn default_damage_bonus() -> f64 {
    10.0
}

const fn default_tolerance() -> f64 {
    1e-6
}

const fn default_max_iterations() -> u32 {
    50
}

const fn default_ac_min() -> f64 {
    5.0
}

const fn default_ac_max() -> f64 {
    30.0
}

impl Default for PowerAttackConfig {
    fn default() -> Self {
        Self {
            penalty: default_penalty(),
            damage_bonus: default_damage_bonus(),
            threshold: 0.0,
            tolerance: default_tolerance(),
            max_iterations: default_max_iterations(),
            ac_min: default_ac_min(),
            ac_max: default_ac_max(),
        }
    }
}

impl PowerAttackConfig {
    /// Declarative and semantic validation.
    ///
    /// # Errors
    ///
    /// Returns `Validation` or `Config` errors.
    pub fn check(&self) -> SimResult<()> {
        self.validate()?;
        self.validate_semantic()
    }

    fn validate_semantic(&self) -> SimResult<()> {
        if !(self.ac_min.is_finite() && self.ac_max.is_finite()) || self.ac_min >= self.ac_max {
            return Err(SimError::config(format!(
                "Power attack AC range must be finite and increasing, got [{}, {}]",
                self.ac_min, self.ac_max
            )));
        }
        if !self.threshold.is_finite() {
            return Err(SimError::config("Power attack threshold must be finite"));
        }
        Ok(())
    }
}

/// Level progression analyzer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ProgressionConfig {
    /// Chance per round that an enemy provokes an opportunity attack.
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_opportunity_attack_chance")]
    pub opportunity_attack_chance: f64,

    /// Chance per round that a class reaction trigger occurs.
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_reaction_chance")]
    pub reaction_chance: f64,
}

const fn default_opportunity_attack_chance() -> f64 {
    0.25
}

const fn default_reaction_chance() -> f64 {
    0.35
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            opportunity_attack_chance: default_opportunity_attack_chance(),
            reaction_chance: default_reaction_chance(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = SimConfig::default();

        assert_eq!(config.schema_version, "1.0");
        assert_eq!(config.simulation.seed, 12345);
        assert_eq!(config.simulation.iterations, 5000);
        assert!((config.statistics.confidence - 0.95).abs() < f64::EPSILON);
        assert_eq!(config.power_attack.max_iterations, 50);
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = SimConfig::builder()
            .seed(42)
            .iterations(200)
            .progress_interval(10)
            .confidence(0.99)
            .percentiles(vec![50.0])
            .build();

        assert_eq!(config.simulation.seed, 42);
        assert_eq!(config.simulation.iterations, 200);
        assert_eq!(config.simulation.progress_interval, 10);
        assert!((config.statistics.confidence - 0.99).abs() < f64::EPSILON);
        assert_eq!(config.statistics.percentiles, vec![50.0]);
    }

    #[test]
    fn test_config_yaml_parse() {
        let yaml = r"
simulation:
  seed: 42
  iterations: 1000
statistics:
  confidence: 0.9
power_attack:
  threshold: 0.5
";
        let config = SimConfig::from_yaml(yaml);
        assert!(config.is_ok());

        let config = config.ok();
        assert_eq!(config.as_ref().map(|c| c.simulation.seed), Some(42));
        assert_eq!(config.as_ref().map(|c| c.simulation.progress_interval), Some(100));
    }

    #[test]
    fn test_config_rejects_unknown_fields() {
        let yaml = r"
simulation:
  seed: 42
  sneed: 1
";
        assert!(matches!(SimConfig::from_yaml(yaml), Err(SimError::YamlParse(_))));
    }

    #[test]
    fn test_config_validation_fails_zero_iterations() {
        let yaml = r"
simulation:
  iterations: 0
";
        assert!(matches!(SimConfig::from_yaml(yaml), Err(SimError::Validation(_))));
    }

    #[test]
    fn test_config_validation_fails_bad_percentile() {
        let yaml = r"
statistics:
  percentiles: [50, 101]
";
        assert!(matches!(SimConfig::from_yaml(yaml), Err(SimError::Config { .. })));
    }

    #[test]
    fn test_config_validation_fails_inverted_ac_range() {
        let yaml = r"
power_attack:
  ac_min: 25
  ac_max: 10
";
        assert!(matches!(SimConfig::from_yaml(yaml), Err(SimError::Config { .. })));
    }

    #[test]
    fn test_config_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dprsim.yaml");
        std::fs::write(&path, "simulation:\n  seed: 7\n").unwrap();

        let config = SimConfig::load(&path).unwrap();
        assert_eq!(config.simulation.seed, 7);
    }

    #[test]
    fn test_config_load_missing_file() {
        let result = SimConfig::load("/nonexistent/dprsim.yaml");
        assert!(matches!(result, Err(SimError::Io(_))));
    }

    #[test]
    fn test_config_yaml_roundtrip() {
        let config = SimConfig::builder().seed(9).build();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back = SimConfig::from_yaml(&yaml).unwrap();
        assert_eq!(back, config);
    }
}
