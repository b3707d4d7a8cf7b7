//! GapMap - per-agent utility improvement from replanning
//!
//! The gap of an agent is the score improvement it would obtain by switching
//! to its re-optimized plan this iteration. Gaps are finite and may be
//! negative. A fresh map is produced by the surrounding simulation every
//! iteration.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::ids::AgentId;
use crate::error::DataError;

/// Mapping AgentId → gap, iterated in agent order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GapMap {
    gaps: BTreeMap<AgentId, f64>,
}

impl GapMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the gap of an agent
    pub fn insert(&mut self, agent: impl Into<AgentId>, gap: f64) {
        self.gaps.insert(agent.into(), gap);
    }

    /// Gap of an agent, if present
    #[inline]
    pub fn get(&self, agent: &AgentId) -> Option<f64> {
        self.gaps.get(agent).copied()
    }

    /// Gap of an agent, zero if absent
    #[inline]
    pub fn get_or_zero(&self, agent: &AgentId) -> f64 {
        self.get(agent).unwrap_or(0.0)
    }

    pub fn contains(&self, agent: &AgentId) -> bool {
        self.gaps.contains_key(agent)
    }

    /// Iterate (agent, gap) pairs in agent order
    pub fn iter(&self) -> impl Iterator<Item = (&AgentId, f64)> {
        self.gaps.iter().map(|(id, gap)| (id, *gap))
    }

    /// Iterate agents in order
    pub fn agents(&self) -> impl Iterator<Item = &AgentId> {
        self.gaps.keys()
    }

    pub fn len(&self) -> usize {
        self.gaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gaps.is_empty()
    }

    /// Sum of all gaps
    pub fn total(&self) -> f64 {
        self.gaps.values().sum()
    }

    /// Sum of the strictly positive gaps (Gall)
    pub fn total_positive(&self) -> f64 {
        self.gaps.values().map(|g| g.max(0.0)).sum()
    }

    /// Mean gap, zero for an empty map
    pub fn mean(&self) -> f64 {
        if self.gaps.is_empty() {
            return 0.0;
        }
        self.total() / self.gaps.len() as f64
    }

    /// Sum of gaps over a subset of agents; agents without a gap count as zero
    pub fn sum_over<'a>(&self, agents: impl IntoIterator<Item = &'a AgentId>) -> f64 {
        agents.into_iter().map(|id| self.get_or_zero(id)).sum()
    }

    /// Agents with a strictly positive gap
    pub fn positive_agents(&self) -> BTreeSet<AgentId> {
        self.gaps
            .iter()
            .filter(|(_, gap)| **gap > 0.0)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Agents with a strictly positive gap, largest gap first (ties by agent order)
    pub fn ranked_positive(&self) -> Vec<(&AgentId, f64)> {
        let mut ranked: Vec<_> = self.iter().filter(|(_, gap)| *gap > 0.0).collect();
        ranked.sort_by(|a, b| OrderedFloat(b.1).cmp(&OrderedFloat(a.1)).then_with(|| a.0.cmp(b.0)));
        ranked
    }

    /// Check that every gap is finite
    pub fn validate(&self) -> Result<(), DataError> {
        match self.gaps.iter().find(|(_, gap)| !gap.is_finite()) {
            Some((agent, value)) => Err(DataError::NonFiniteGap {
                agent: agent.clone(),
                value: *value,
            }),
            None => Ok(()),
        }
    }
}

impl<A: Into<AgentId>> FromIterator<(A, f64)> for GapMap {
    fn from_iter<I: IntoIterator<Item = (A, f64)>>(iter: I) -> Self {
        Self {
            gaps: iter.into_iter().map(|(a, g)| (a.into(), g)).collect(),
        }
    }
}
