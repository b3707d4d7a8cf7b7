//! Upper-bound local search
//!
//! Starts from every agent with a positive gap and flips single agents in
//! random order while the transformed objective strictly improves. With
//! several restarts the independently seeded searches run in parallel and
//! the best local optimum is kept.

use greedo_common::{GapMap, Result};
use greedo_distance::InteractionMatrix;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use super::{job_rng, SearchSettings, SelectionOutcome};
use crate::objective::ObjectiveState;
use crate::population::IndexedPopulation;

#[derive(Debug, Clone)]
pub struct UpperBoundSelector {
    settings: SearchSettings,
    restarts: usize,
}

/// Result of one local search
#[derive(Debug, Clone)]
struct SearchRun {
    members: Vec<bool>,
    g: f64,
    d2: f64,
    q: f64,
    sweeps: u32,
    accepted_flips: u64,
    converged: bool,
    sweep_objectives: Vec<f64>,
}

impl UpperBoundSelector {
    pub fn new(settings: SearchSettings) -> Self {
        Self {
            settings,
            restarts: 1,
        }
    }

    /// Number of independent searches; at least one
    pub fn with_restarts(mut self, restarts: usize) -> Self {
        self.restarts = restarts.max(1);
        self
    }

    pub fn restarts(&self) -> usize {
        self.restarts
    }

    #[instrument(skip_all, fields(agents = gaps.len(), eta, restarts = self.restarts))]
    pub fn select(
        &self,
        gaps: &GapMap,
        eta: f64,
        seed: u64,
        matrix: &InteractionMatrix,
    ) -> Result<SelectionOutcome> {
        let population = IndexedPopulation::new(gaps, matrix);
        let gamma = eta * population.total_positive_gap();

        let initial: Vec<bool> = (0..population.len())
            .map(|i| population.gap(i) > 0.0)
            .collect();
        if !initial.iter().any(|m| *m) {
            info!("No agent with a positive gap, nobody replans");
            return Ok(SelectionOutcome::empty(gamma, &self.settings.transform));
        }

        let runs = (0..self.restarts)
            .into_par_iter()
            .map(|k| {
                let mut rng = job_rng(seed, k);
                self.search(&population, initial.clone(), gamma, &mut rng)
            })
            .collect::<Result<Vec<_>>>()?;

        // Highest Q wins, ties go to the lowest restart index
        let mut best: Option<(usize, SearchRun)> = None;
        for (k, run) in runs.into_iter().enumerate() {
            if best.as_ref().map_or(true, |(_, b)| run.q > b.q) {
                best = Some((k, run));
            }
        }
        let Some((restart, run)) = best else {
            return Ok(SelectionOutcome::empty(gamma, &self.settings.transform));
        };

        let outcome = SelectionOutcome {
            replanners: population.member_ids(&run.members),
            realized_gap: run.g,
            realized_d2: run.d2,
            objective: run.q,
            gamma,
            sweeps: run.sweeps,
            accepted_flips: run.accepted_flips,
            converged: run.converged,
            sweep_objectives: run.sweep_objectives,
        };

        info!(
            replanners = outcome.replanners.len(),
            restart,
            sweeps = outcome.sweeps,
            flips = outcome.accepted_flips,
            g = outcome.realized_gap,
            distance = outcome.realized_distance(),
            q = outcome.objective,
            "Upper-bound selection finished"
        );
        Ok(outcome)
    }

    fn search(
        &self,
        population: &IndexedPopulation,
        initial: Vec<bool>,
        gamma: f64,
        rng: &mut ChaCha8Rng,
    ) -> Result<SearchRun> {
        let transform = &self.settings.transform;
        let mut state = ObjectiveState::new(population, initial);
        let mut order: Vec<usize> = (0..population.len()).collect();

        let mut sweeps = 0u32;
        let mut accepted_flips = 0u64;
        let mut converged = true;
        let mut sweep_objectives = Vec::new();

        loop {
            if self.settings.max_sweeps.is_some_and(|max| sweeps >= max) {
                warn!(sweeps, "Sweep limit reached before a local optimum");
                converged = false;
                break;
            }
            sweeps += 1;
            order.shuffle(rng);

            let mut improved = false;
            for &agent in &order {
                state.begin_flip(agent)?;
                let accept = state.evaluate_delta_q(gamma, transform)? > 0.0;
                state.commit(accept)?;
                if accept {
                    accepted_flips += 1;
                    improved = true;
                    if self.settings.check_consistency {
                        state.check_consistency()?;
                    }
                }
            }

            let q = state.q(gamma, transform);
            sweep_objectives.push(q);
            debug!(sweep = sweeps, g = state.g(), distance = state.distance(), q, "Sweep done");

            if !improved {
                break;
            }
        }

        Ok(SearchRun {
            q: state.q(gamma, transform),
            g: state.g(),
            d2: state.d2(),
            members: state.members().to_vec(),
            sweeps,
            accepted_flips,
            converged,
            sweep_objectives,
        })
    }
}
