//! Incrementally maintained transformed objective
//!
//! ```text
//! G  = Σ_{i ∈ S} gap_i
//! b_i = Σ_{j ∈ S} (A(j, i) + A(i, j))
//! D2 = ½ Σ_{i ∈ S} b_i
//! Q  = (G − γ) / max(ε, transform(max(D2, 0)))
//! ```
//!
//! A single-agent flip is evaluated in O(1) from b and the self term A(i, i);
//! committing it updates b along the flipped agent's sparse adjacency.
//!
//! Commits clamp G and D2 at zero. The unclamped running sums are kept next
//! to them so that the bookkeeping can still be checked against a fresh
//! recomputation after a clamp has fired.

use greedo_common::{AgentId, ProtocolError, CONSISTENCY_TOLERANCE, DISTANCE_EPSILON};

use crate::population::IndexedPopulation;
use crate::transform::DistanceTransform;

/// Q(G, D2, γ)
#[inline]
pub fn transformed_objective(g: f64, d2: f64, gamma: f64, transform: &DistanceTransform) -> f64 {
    (g - gamma) / transform.apply(d2.max(0.0)).max(DISTANCE_EPSILON)
}

#[derive(Debug, Clone, Copy)]
struct PendingCandidate {
    agent: usize,
    was_member: bool,
    delta_g: f64,
    delta_d2: f64,
}

/// Objective aggregates of one member set; owned by exactly one search
#[derive(Debug, Clone)]
pub struct ObjectiveState<'p> {
    population: &'p IndexedPopulation,
    members: Vec<bool>,
    g: f64,
    d2: f64,
    /// Running sums without the commit clamps
    raw_g: f64,
    raw_d2: f64,
    b: Vec<f64>,
    pending: Option<PendingCandidate>,
}

impl<'p> ObjectiveState<'p> {
    /// Build the aggregates for the initial member flags (one flag per agent)
    pub fn new(population: &'p IndexedPopulation, members: Vec<bool>) -> Self {
        debug_assert_eq!(members.len(), population.len());
        let mut b = vec![0.0; population.len()];
        let mut g = 0.0;
        for j in (0..population.len()).filter(|&j| members[j]) {
            g += population.gap(j);
            for &(k, value) in population.neighbors(j) {
                b[k] += value;
            }
        }
        let d2 = 0.5
            * (0..population.len())
                .filter(|&i| members[i])
                .map(|i| b[i])
                .sum::<f64>();

        Self {
            population,
            members,
            g,
            d2,
            raw_g: g,
            raw_d2: d2,
            b,
            pending: None,
        }
    }

    /// State with no member
    pub fn empty(population: &'p IndexedPopulation) -> Self {
        Self::new(population, vec![false; population.len()])
    }

    pub fn population(&self) -> &'p IndexedPopulation {
        self.population
    }

    #[inline]
    pub fn is_member(&self, agent: usize) -> bool {
        self.members[agent]
    }

    pub fn members(&self) -> &[bool] {
        &self.members
    }

    pub fn member_count(&self) -> usize {
        self.members.iter().filter(|m| **m).count()
    }

    pub fn g(&self) -> f64 {
        self.g
    }

    pub fn d2(&self) -> f64 {
        self.d2
    }

    /// √D2
    pub fn distance(&self) -> f64 {
        self.d2.max(0.0).sqrt()
    }

    pub fn q(&self, gamma: f64, transform: &DistanceTransform) -> f64 {
        transformed_objective(self.g, self.d2, gamma, transform)
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Open a flip candidate with caller-supplied membership and gap
    pub fn begin_candidate(
        &mut self,
        agent: usize,
        is_member: bool,
        gap: f64,
    ) -> Result<(), ProtocolError> {
        if let Some(open) = self.pending {
            return Err(ProtocolError::CandidateAlreadyOpen {
                open: self.population.agent(open.agent).clone(),
                requested: self.population.agent(agent).clone(),
            });
        }
        let a = self.population.self_term(agent);
        let b = self.b[agent];
        let (delta_g, delta_d2) = if is_member {
            (-gap, -b + a)
        } else {
            (gap, b + a)
        };
        self.pending = Some(PendingCandidate {
            agent,
            was_member: is_member,
            delta_g,
            delta_d2,
        });
        Ok(())
    }

    /// [`ObjectiveState::begin_candidate`] addressed by agent id
    pub fn begin_candidate_for(
        &mut self,
        agent: &AgentId,
        is_member: bool,
        gap: f64,
    ) -> Result<(), ProtocolError> {
        let idx = self
            .population
            .index_of(agent)
            .ok_or_else(|| ProtocolError::UnknownAgent(agent.clone()))?;
        self.begin_candidate(idx, is_member, gap)
    }

    /// Open a candidate that flips `agent` relative to this state's own member set
    pub fn begin_flip(&mut self, agent: usize) -> Result<(), ProtocolError> {
        self.begin_candidate(agent, self.members[agent], self.population.gap(agent))
    }

    /// Q after the pending flip minus the current Q
    pub fn evaluate_delta_q(
        &self,
        gamma: f64,
        transform: &DistanceTransform,
    ) -> Result<f64, ProtocolError> {
        let pending = self.pending.ok_or(ProtocolError::NoPendingCandidate)?;
        Ok(transformed_objective(
            self.g + pending.delta_g,
            self.d2 + pending.delta_d2,
            gamma,
            transform,
        ) - self.q(gamma, transform))
    }

    /// Apply (`accept`) or discard the pending candidate; it is closed either way
    pub fn commit(&mut self, accept: bool) -> Result<(), ProtocolError> {
        let pending = self.pending.take().ok_or(ProtocolError::NoPendingCandidate)?;
        if !accept {
            return Ok(());
        }

        self.g = (self.g + pending.delta_g).max(0.0);
        self.d2 = (self.d2 + pending.delta_d2).max(0.0);
        self.raw_g += pending.delta_g;
        self.raw_d2 += pending.delta_d2;

        let sign = if pending.was_member { -1.0 } else { 1.0 };
        for &(k, value) in self.population.neighbors(pending.agent) {
            self.b[k] += sign * value;
        }
        self.members[pending.agent] = !pending.was_member;
        Ok(())
    }

    /// G and D2 recomputed from scratch over the current member set
    pub fn recompute(&self) -> (f64, f64) {
        let mut g = 0.0;
        let mut d2 = 0.0;
        for i in (0..self.population.len()).filter(|&i| self.members[i]) {
            g += self.population.gap(i);
            d2 += self
                .population
                .neighbors(i)
                .iter()
                .filter(|(k, _)| self.members[*k])
                .map(|(_, value)| value)
                .sum::<f64>();
        }
        (g, 0.5 * d2)
    }

    /// Compare the unclamped running sums against [`ObjectiveState::recompute`]
    ///
    /// A commit clamp is not an inconsistency: the clamped G and D2 may
    /// stay above the recomputed values once a clamp has fired.
    pub fn check_consistency(&self) -> Result<(), ProtocolError> {
        let (g, d2) = self.recompute();
        check_close("G", self.raw_g, g)?;
        check_close("D2", self.raw_d2, d2)
    }
}

fn check_close(quantity: &'static str, maintained: f64, recomputed: f64) -> Result<(), ProtocolError> {
    let scale = recomputed.abs().max(1.0);
    if (maintained - recomputed).abs() > CONSISTENCY_TOLERANCE * scale {
        return Err(ProtocolError::InconsistentState {
            quantity,
            maintained,
            recomputed,
        });
    }
    Ok(())
}
