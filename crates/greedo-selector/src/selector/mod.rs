//! Replanner selection strategies
//!
//! Every strategy maps a gap map and a target replanning rate eta to a set of
//! replanners. The local-search strategies maximize the transformed objective
//! Q by single-agent flips; the baselines ignore the interaction matrix.

pub mod baseline;
pub mod two_point;
pub mod upper_bound;

use greedo_common::{AgentId, ConfigError, GapMap, Result};
use greedo_distance::InteractionMatrix;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::config::{GreedoConfig, SelectorKind};
use crate::objective::transformed_objective;
use crate::transform::DistanceTransform;

pub use baseline::{DoNothingSelector, IidSelector, Sbayti2007Selector};
pub use two_point::TwoPointSelector;
pub use upper_bound::UpperBoundSelector;

/// Local-search settings shared by the search-based strategies
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchSettings {
    pub transform: DistanceTransform,
    pub max_sweeps: Option<u32>,
    pub check_consistency: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            transform: DistanceTransform::default(),
            max_sweeps: None,
            check_consistency: false,
        }
    }
}

/// Anchor of the previous iteration, consumed by the two-point strategy
#[derive(Debug, Clone, Copy)]
pub struct PreviousIteration<'a> {
    pub replanners: &'a BTreeSet<AgentId>,
    pub gaps: &'a GapMap,
    pub matrix: &'a InteractionMatrix,
}

/// Read-only inputs of one selection call besides the gaps
#[derive(Debug, Clone, Copy)]
pub struct SelectionContext<'a> {
    pub matrix: &'a InteractionMatrix,
    pub previous: Option<PreviousIteration<'a>>,
}

impl<'a> SelectionContext<'a> {
    pub fn new(matrix: &'a InteractionMatrix) -> Self {
        Self {
            matrix,
            previous: None,
        }
    }

    pub fn with_previous(mut self, previous: PreviousIteration<'a>) -> Self {
        self.previous = Some(previous);
        self
    }
}

/// Selected replanners plus the values exposed for external logging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionOutcome {
    pub replanners: BTreeSet<AgentId>,
    /// G of the selected set
    pub realized_gap: f64,
    /// D2 of the selected set
    pub realized_d2: f64,
    /// Achieved Q
    pub objective: f64,
    pub gamma: f64,
    pub sweeps: u32,
    pub accepted_flips: u64,
    /// false when the sweep cap stopped the search before a local optimum
    pub converged: bool,
    /// Q at the end of every sweep
    pub sweep_objectives: Vec<f64>,
}

impl SelectionOutcome {
    /// Outcome without any replanner
    pub fn empty(gamma: f64, transform: &DistanceTransform) -> Self {
        Self {
            replanners: BTreeSet::new(),
            realized_gap: 0.0,
            realized_d2: 0.0,
            objective: transformed_objective(0.0, 0.0, gamma, transform),
            gamma,
            sweeps: 0,
            accepted_flips: 0,
            converged: true,
            sweep_objectives: Vec::new(),
        }
    }

    /// Outcome of a strategy that picks replanners without searching
    pub fn evaluated(
        replanners: BTreeSet<AgentId>,
        gaps: &GapMap,
        matrix: &InteractionMatrix,
        gamma: f64,
        transform: &DistanceTransform,
    ) -> Self {
        let realized_gap = gaps.sum_over(&replanners);
        let realized_d2 = matrix.quadratic_form(&replanners).max(0.0);
        Self {
            objective: transformed_objective(realized_gap, realized_d2, gamma, transform),
            replanners,
            realized_gap,
            realized_d2,
            gamma,
            sweeps: 0,
            accepted_flips: 0,
            converged: true,
            sweep_objectives: Vec::new(),
        }
    }

    /// √D2
    pub fn realized_distance(&self) -> f64 {
        self.realized_d2.max(0.0).sqrt()
    }

    pub fn len(&self) -> usize {
        self.replanners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replanners.is_empty()
    }
}

/// Configuration-selected replanner selection strategy
#[derive(Debug, Clone)]
pub enum ReplannerSelector {
    UpperBound(UpperBoundSelector),
    TwoPoint(TwoPointSelector),
    Sbayti2007(Sbayti2007Selector),
    Iid(IidSelector),
    DoNothing(DoNothingSelector),
}

impl ReplannerSelector {
    pub fn from_config(config: &GreedoConfig) -> Result<Self> {
        config.validate()?;
        let settings = SearchSettings {
            transform: config.distance_transform()?,
            max_sweeps: config.max_sweeps,
            check_consistency: config.check_consistency,
        };
        Ok(match config.selector {
            SelectorKind::UpperBound => {
                Self::UpperBound(UpperBoundSelector::new(settings).with_restarts(config.restarts))
            }
            SelectorKind::TwoPoint => Self::TwoPoint(TwoPointSelector::new(settings)),
            SelectorKind::Sbayti2007 => Self::Sbayti2007(Sbayti2007Selector::new(settings.transform)),
            SelectorKind::Iid => Self::Iid(IidSelector::new(settings.transform)),
            SelectorKind::DoNothing => Self::DoNothing(DoNothingSelector::new(settings.transform)),
        })
    }

    pub fn kind(&self) -> SelectorKind {
        match self {
            Self::UpperBound(_) => SelectorKind::UpperBound,
            Self::TwoPoint(_) => SelectorKind::TwoPoint,
            Self::Sbayti2007(_) => SelectorKind::Sbayti2007,
            Self::Iid(_) => SelectorKind::Iid,
            Self::DoNothing(_) => SelectorKind::DoNothing,
        }
    }

    /// Select this iteration's replanners
    pub fn select_replanners(
        &self,
        gaps: &GapMap,
        eta: f64,
        seed: u64,
        ctx: &SelectionContext<'_>,
    ) -> Result<SelectionOutcome> {
        gaps.validate()?;
        if let Some(previous) = ctx.previous {
            previous.gaps.validate()?;
        }
        if !(0.0..=1.0).contains(&eta) {
            return Err(ConfigError::RateOutOfRange(eta).into());
        }

        match self {
            Self::UpperBound(s) => s.select(gaps, eta, seed, ctx.matrix),
            Self::TwoPoint(s) => s.select(gaps, eta, seed, ctx),
            Self::Sbayti2007(s) => Ok(s.select(gaps, eta, ctx.matrix)),
            Self::Iid(s) => Ok(s.select(gaps, eta, seed, ctx.matrix)),
            Self::DoNothing(s) => Ok(s.select(gaps, eta)),
        }
    }
}

/// Independent RNG stream for one search job
pub(crate) fn job_rng(seed: u64, job: usize) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed ^ (job as u64).rotate_left(17))
}
