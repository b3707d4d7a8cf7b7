//! Error types for Greedo
//!
//! Provides a unified error type and domain-specific error variants

use thiserror::Error;

use crate::types::ids::AgentId;

/// Result type alias using GreedoError
pub type Result<T> = std::result::Result<T, GreedoError>;

/// Unified error type for Greedo operations
#[derive(Debug, Error)]
pub enum GreedoError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // Candidate/commit protocol errors
    #[error("Protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    // Input data errors
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    // Metrics registration errors
    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

/// Invalid configuration, detected at construction time
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Kernel half-life must be positive, got {0}")]
    NonPositiveHalfLife(f64),

    #[error("Kernel threshold must be non-negative, got {0}")]
    NegativeThreshold(f64),

    #[error("At least one of linear or quadratic distance must be enabled")]
    NoDistanceTransform,

    #[error("Flow capacity factor must be positive, got {0}")]
    NonPositiveCapacityFactor(f64),

    #[error("Target replanning rate must lie in [0, 1], got {0}")]
    RateOutOfRange(f64),

    #[error("Relaxation rate iteration exponent must not be positive, got {0}")]
    PositiveRelaxationExponent(f64),

    #[error("Number of restarts must be at least one")]
    NoRestarts,

    #[error("Percentile step must divide 100, got {0}")]
    InvalidPercentileStep(u32),

    #[error("Failed to load configuration: {0}")]
    Load(String),
}

/// Violations of the candidate/commit protocol of the objective state.
///
/// These are programming errors; the selection call that hits one is aborted.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Candidate {open} is still pending, cannot open candidate {requested}")]
    CandidateAlreadyOpen { open: AgentId, requested: AgentId },

    #[error("No candidate is pending")]
    NoPendingCandidate,

    #[error("Agent {0} is not part of the population")]
    UnknownAgent(AgentId),

    #[error("Maintained {quantity} = {maintained} deviates from recomputed {recomputed}")]
    InconsistentState {
        quantity: &'static str,
        maintained: f64,
        recomputed: f64,
    },
}

/// Malformed input data
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DataError {
    #[error("Gap of agent {agent} is not finite: {value}")]
    NonFiniteGap { agent: AgentId, value: f64 },

    #[error("Usage time of agent {agent} is not finite: {value}")]
    NonFiniteTime { agent: AgentId, value: f64 },

    #[error("Empty population")]
    EmptyPopulation,
}
