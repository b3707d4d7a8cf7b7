//! Dense, index-addressed view of one selection problem
//!
//! Agents are sorted by [`AgentId`] and addressed by position. The
//! interaction matrix is folded into a symmetrized sparse adjacency so that
//! a committed flip only touches the flipped agent's neighbours.

use greedo_common::{AgentId, GapMap};
use greedo_distance::InteractionMatrix;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone)]
pub struct IndexedPopulation {
    agents: Vec<AgentId>,
    index: HashMap<AgentId, usize>,
    gaps: Vec<f64>,
    self_terms: Vec<f64>,
    /// Row i holds (k, A(i, k) + A(k, i)) for every k with a stored entry, k = i included
    adjacency: Vec<Vec<(usize, f64)>>,
}

impl IndexedPopulation {
    /// Population made of the agents of `gaps`
    pub fn new(gaps: &GapMap, matrix: &InteractionMatrix) -> Self {
        Self::with_universe(gaps.agents().cloned(), gaps, matrix)
    }

    /// Population over an explicit agent universe; agents without a gap get 0
    pub fn with_universe(
        universe: impl IntoIterator<Item = AgentId>,
        gaps: &GapMap,
        matrix: &InteractionMatrix,
    ) -> Self {
        let agents: Vec<AgentId> = universe
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let index: HashMap<AgentId, usize> = agents
            .iter()
            .enumerate()
            .map(|(i, agent)| (agent.clone(), i))
            .collect();

        let gaps_vec = agents.iter().map(|agent| gaps.get_or_zero(agent)).collect();

        let mut self_terms = vec![0.0; agents.len()];
        let mut rows: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); agents.len()];
        // Entries touching agents outside the universe can never join a member set
        for (from, to, value) in matrix.iter() {
            let (Some(&i), Some(&k)) = (index.get(from), index.get(to)) else {
                continue;
            };
            if i == k {
                self_terms[i] += value;
            }
            *rows[i].entry(k).or_insert(0.0) += value;
            *rows[k].entry(i).or_insert(0.0) += value;
        }

        let adjacency = rows
            .into_iter()
            .map(|row| row.into_iter().filter(|(_, v)| *v != 0.0).collect())
            .collect();

        Self {
            agents,
            index,
            gaps: gaps_vec,
            self_terms,
            adjacency,
        }
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Agents in index order
    pub fn agents(&self) -> &[AgentId] {
        &self.agents
    }

    #[inline]
    pub fn agent(&self, idx: usize) -> &AgentId {
        &self.agents[idx]
    }

    pub fn index_of(&self, agent: &AgentId) -> Option<usize> {
        self.index.get(agent).copied()
    }

    #[inline]
    pub fn gap(&self, idx: usize) -> f64 {
        self.gaps[idx]
    }

    /// A(i, i)
    #[inline]
    pub fn self_term(&self, idx: usize) -> f64 {
        self.self_terms[idx]
    }

    /// Symmetrized non-zero coefficients of one agent
    #[inline]
    pub fn neighbors(&self, idx: usize) -> &[(usize, f64)] {
        &self.adjacency[idx]
    }

    /// Gall = Σ max(0, gap) over the whole population
    pub fn total_positive_gap(&self) -> f64 {
        self.gaps.iter().map(|g| g.max(0.0)).sum()
    }

    /// Indices of agents with a strictly positive gap
    pub fn positive_indices(&self) -> Vec<usize> {
        (0..self.len()).filter(|&i| self.gaps[i] > 0.0).collect()
    }

    /// Member flags for a set of agents; unknown agents are returned separately
    pub fn membership<'a>(
        &self,
        members: impl IntoIterator<Item = &'a AgentId>,
    ) -> (Vec<bool>, Vec<AgentId>) {
        let mut flags = vec![false; self.len()];
        let mut unknown = Vec::new();
        for agent in members {
            match self.index_of(agent) {
                Some(i) => flags[i] = true,
                None => unknown.push(agent.clone()),
            }
        }
        (flags, unknown)
    }

    /// Agent ids of the flagged members, in agent order
    pub fn member_ids(&self, flags: &[bool]) -> BTreeSet<AgentId> {
        flags
            .iter()
            .zip(&self.agents)
            .filter(|(member, _)| **member)
            .map(|(_, agent)| agent.clone())
            .collect()
    }
}
