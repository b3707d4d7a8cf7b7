//! Baseline strategies that ignore agent interaction

use greedo_common::{AgentId, GapMap};
use greedo_distance::InteractionMatrix;
use rand::Rng;
use std::collections::BTreeSet;
use tracing::debug;

use super::{job_rng, SelectionOutcome};
use crate::transform::DistanceTransform;

/// Largest positive gaps first, ⌈eta · N⌉ agents at most
#[derive(Debug, Clone)]
pub struct Sbayti2007Selector {
    transform: DistanceTransform,
}

impl Sbayti2007Selector {
    pub fn new(transform: DistanceTransform) -> Self {
        Self { transform }
    }

    pub fn select(&self, gaps: &GapMap, eta: f64, matrix: &InteractionMatrix) -> SelectionOutcome {
        let quota = (eta * gaps.len() as f64).ceil() as usize;
        let replanners: BTreeSet<AgentId> = gaps
            .ranked_positive()
            .into_iter()
            .take(quota)
            .map(|(agent, _)| agent.clone())
            .collect();
        debug!(quota, selected = replanners.len(), "Gap-ranked selection");
        SelectionOutcome::evaluated(replanners, gaps, matrix, eta * gaps.total_positive(), &self.transform)
    }
}

/// Every agent replans independently with probability eta
#[derive(Debug, Clone)]
pub struct IidSelector {
    transform: DistanceTransform,
}

impl IidSelector {
    pub fn new(transform: DistanceTransform) -> Self {
        Self { transform }
    }

    pub fn select(
        &self,
        gaps: &GapMap,
        eta: f64,
        seed: u64,
        matrix: &InteractionMatrix,
    ) -> SelectionOutcome {
        let mut rng = job_rng(seed, 0);
        let replanners: BTreeSet<AgentId> = gaps
            .agents()
            .filter(|_| rng.gen::<f64>() < eta)
            .cloned()
            .collect();
        debug!(selected = replanners.len(), "Independent random selection");
        SelectionOutcome::evaluated(replanners, gaps, matrix, eta * gaps.total_positive(), &self.transform)
    }
}

/// Nobody replans
#[derive(Debug, Clone)]
pub struct DoNothingSelector {
    transform: DistanceTransform,
}

impl DoNothingSelector {
    pub fn new(transform: DistanceTransform) -> Self {
        Self { transform }
    }

    pub fn select(&self, gaps: &GapMap, eta: f64) -> SelectionOutcome {
        SelectionOutcome::empty(eta * gaps.total_positive(), &self.transform)
    }
}
