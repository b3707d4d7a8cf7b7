//! # Greedo Selector
//!
//! Chooses, once per simulation iteration, which agents re-optimize their
//! behavior. The local-search strategies maximize the transformed objective
//!
//! ```text
//! Q(S) = (G(S) − γ) / max(ε, transform(D2(S)))
//! ```
//!
//! Where:
//! - G(S): aggregate gap of the replanners S
//! - D2(S): quadratic population distance of S under the interaction matrix
//! - γ: budget, eta · Σ max(0, gap_i) for the target replanning rate eta
//!
//! ## Modules
//!
//! - [`objective`]: incremental G / D2 / Q bookkeeping for single-agent flips
//! - [`selector`]: upper-bound and two-point local search plus baselines
//! - [`schedule`]: target replanning rate schedules
//! - [`engine`]: the per-iteration [`Greedo`] facade

pub mod analysis;
pub mod config;
pub mod engine;
pub mod objective;
pub mod population;
pub mod schedule;
pub mod selector;
pub mod telemetry;
pub mod transform;

pub use analysis::GapSummary;
pub use config::{GreedoConfig, ScheduleKind, SelectorKind};
pub use engine::{Greedo, IterationReport};
pub use objective::{transformed_objective, ObjectiveState};
pub use population::IndexedPopulation;
pub use schedule::{BudgetSchedule, MsaSchedule, TwoBlockStepSize};
pub use selector::{
    PreviousIteration, ReplannerSelector, SearchSettings, SelectionContext, SelectionOutcome,
};
pub use telemetry::GreedoMetrics;
pub use transform::DistanceTransform;

/// Default seed for every randomized decision
pub const DEFAULT_SEED: u64 = 4711;

/// Default step between reported gap percentiles
pub const DEFAULT_PERCENTILE_STEP: u32 = 10;
