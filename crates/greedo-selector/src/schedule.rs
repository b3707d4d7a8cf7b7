//! Target replanning rate schedules
//!
//! A schedule supplies eta for each iteration; the engine feeds the mean gap
//! of every completed iteration back through [`BudgetSchedule::register_gap`].

use greedo_common::DISTANCE_EPSILON;

use crate::config::{GreedoConfig, ScheduleKind};

/// Source of the per-iteration target replanning rate
pub trait BudgetSchedule: Send + Sync + std::fmt::Debug {
    /// eta ∈ [0, 1] for the given (zero-based) iteration
    fn target_rate(&mut self, iteration: u32) -> f64;

    /// Record the mean gap observed in the iteration that just completed
    fn register_gap(&mut self, _gap: f64) {}
}

/// Build the schedule named by the configuration
pub fn from_config(config: &GreedoConfig) -> Box<dyn BudgetSchedule> {
    match config.schedule {
        ScheduleKind::Msa => Box::new(MsaSchedule::new(
            config.initial_relaxation_rate,
            config.relaxation_rate_iteration_exponent,
        )),
        ScheduleKind::TwoBlock => Box::new(TwoBlockStepSize::new()),
    }
}

/// eta(k) = initial · (1 + k)^exponent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MsaSchedule {
    initial_rate: f64,
    exponent: f64,
}

impl MsaSchedule {
    pub fn new(initial_rate: f64, exponent: f64) -> Self {
        Self {
            initial_rate,
            exponent,
        }
    }
}

impl BudgetSchedule for MsaSchedule {
    fn target_rate(&mut self, iteration: u32) -> f64 {
        (self.initial_rate * (1.0 + iteration as f64).powf(self.exponent)).clamp(0.0, 1.0)
    }
}

/// Relative gap reduction between the oldest and the newest half of the gap history
#[derive(Debug, Clone, Default)]
pub struct TwoBlockStepSize {
    gaps: Vec<f64>,
}

impl TwoBlockStepSize {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &[f64] {
        &self.gaps
    }

    /// Unclamped step size; 1 until two gaps are known
    pub fn raw_rate(&self) -> f64 {
        if self.gaps.len() < 2 {
            return 1.0;
        }
        let block = self.gaps.len().div_ceil(2);
        let first: f64 = self.gaps[..block].iter().sum();
        let last: f64 = self.gaps[self.gaps.len() - block..].iter().sum();
        if first.abs() < DISTANCE_EPSILON {
            return 0.0;
        }
        (first - last) / first
    }
}

impl BudgetSchedule for TwoBlockStepSize {
    fn target_rate(&mut self, _iteration: u32) -> f64 {
        self.raw_rate().clamp(0.0, 1.0)
    }

    fn register_gap(&mut self, gap: f64) {
        self.gaps.push(gap);
    }
}
