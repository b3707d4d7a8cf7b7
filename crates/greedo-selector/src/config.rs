//! Greedo configuration

use greedo_common::{ConfigError, Result, DEFAULT_KERNEL_HALF_LIFE_S, DEFAULT_KERNEL_THRESHOLD};
use greedo_distance::KernelDistanceConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::transform::DistanceTransform;

/// Replanner selection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKind {
    /// Local search seeded with every positive-gap agent
    UpperBound,
    /// Two coupled local searches anchored at the previous and the empty selection
    TwoPoint,
    /// Largest gaps first, up to the target rate
    Sbayti2007,
    /// Independent coin flip per agent
    Iid,
    /// Nobody replans
    DoNothing,
}

/// Source of the target replanning rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    /// initial_rate · (1 + k)^exponent
    Msa,
    /// Relative gap reduction between the first and second half of the gap history
    TwoBlock,
}

/// Greedo engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GreedoConfig {
    /// Kernel half-life in seconds
    pub kernel_half_life_s: f64,
    /// Minimum kernel value for a usage pair to interact
    pub kernel_threshold: f64,
    /// Factor applied to every resource capacity
    pub flow_capacity_factor: f64,
    /// Include √D2 in the distance transform
    pub use_linear_distance: bool,
    /// Include D2 in the distance transform
    pub use_quadratic_distance: bool,
    /// Selection strategy
    pub selector: SelectorKind,
    /// Target rate schedule
    pub schedule: ScheduleKind,
    /// MSA schedule: rate in the first iteration
    pub initial_relaxation_rate: f64,
    /// MSA schedule: iteration exponent
    pub relaxation_rate_iteration_exponent: f64,
    /// Seed for every randomized decision
    pub seed: u64,
    /// Stop a local search after this many sweeps
    pub max_sweeps: Option<u32>,
    /// Independent local-search restarts (UpperBound only)
    pub restarts: usize,
    /// Recompute the objective aggregates after every accepted flip
    pub check_consistency: bool,
    /// Step between reported gap percentiles
    pub gap_percentile_step: u32,
}

impl Default for GreedoConfig {
    fn default() -> Self {
        Self {
            kernel_half_life_s: DEFAULT_KERNEL_HALF_LIFE_S,
            kernel_threshold: DEFAULT_KERNEL_THRESHOLD,
            flow_capacity_factor: 1.0,
            use_linear_distance: true,
            use_quadratic_distance: false,
            selector: SelectorKind::UpperBound,
            schedule: ScheduleKind::Msa,
            initial_relaxation_rate: 1.0,
            relaxation_rate_iteration_exponent: -1.0,
            seed: crate::DEFAULT_SEED,
            max_sweeps: None,
            restarts: 1,
            check_consistency: false,
            gap_percentile_step: crate::DEFAULT_PERCENTILE_STEP,
        }
    }
}

impl GreedoConfig {
    /// Load configuration from `.env`, an optional `greedo.*` file and `GREEDO_*` variables
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Like [`GreedoConfig::load`], with an explicit configuration file
    pub fn load_from(file: Option<&Path>) -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder();
        builder = match file {
            Some(path) => builder.add_source(config::File::from(path).required(true)),
            None => builder.add_source(config::File::with_name("greedo").required(false)),
        };
        let settings = builder
            .add_source(config::Environment::with_prefix("GREEDO").try_parsing(true))
            .build()
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        let cfg: GreedoConfig = settings
            .try_deserialize()
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject invalid settings before any computation starts
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !(self.kernel_half_life_s > 0.0) || !self.kernel_half_life_s.is_finite() {
            return Err(ConfigError::NonPositiveHalfLife(self.kernel_half_life_s));
        }
        if !(self.kernel_threshold >= 0.0) {
            return Err(ConfigError::NegativeThreshold(self.kernel_threshold));
        }
        if !(self.flow_capacity_factor > 0.0) || !self.flow_capacity_factor.is_finite() {
            return Err(ConfigError::NonPositiveCapacityFactor(self.flow_capacity_factor));
        }
        self.distance_transform()?;
        if !(self.initial_relaxation_rate > 0.0 && self.initial_relaxation_rate <= 1.0) {
            return Err(ConfigError::RateOutOfRange(self.initial_relaxation_rate));
        }
        if !(self.relaxation_rate_iteration_exponent <= 0.0) {
            return Err(ConfigError::PositiveRelaxationExponent(
                self.relaxation_rate_iteration_exponent,
            ));
        }
        if self.restarts == 0 {
            return Err(ConfigError::NoRestarts);
        }
        if self.gap_percentile_step == 0 || 100 % self.gap_percentile_step != 0 {
            return Err(ConfigError::InvalidPercentileStep(self.gap_percentile_step));
        }
        Ok(())
    }

    pub fn distance_transform(&self) -> std::result::Result<DistanceTransform, ConfigError> {
        DistanceTransform::new(self.use_linear_distance, self.use_quadratic_distance)
    }

    pub fn kernel_distance(&self) -> KernelDistanceConfig {
        KernelDistanceConfig {
            half_life_s: self.kernel_half_life_s,
            threshold: self.kernel_threshold,
            flow_capacity_factor: self.flow_capacity_factor,
        }
    }
}
