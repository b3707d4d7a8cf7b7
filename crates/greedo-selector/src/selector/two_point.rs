//! Two-point local search
//!
//! Two objective states share one flip sequence. The first is anchored at
//! the previous iteration (its replanners, gaps and interaction matrix), the
//! second at the empty selection over the current gaps and matrix. A flip is
//! accepted when it raises the larger of the two objectives, and then both
//! states apply it.

use greedo_common::{AgentId, GapMap, Result, MAX_DATA_WARNINGS};
use rand::seq::SliceRandom;
use std::collections::BTreeSet;
use tracing::{debug, info, instrument, warn};

use super::{job_rng, SearchSettings, SelectionContext, SelectionOutcome};
use crate::objective::ObjectiveState;
use crate::population::IndexedPopulation;

#[derive(Debug, Clone)]
pub struct TwoPointSelector {
    settings: SearchSettings,
}

/// Budgets of the two anchors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoupledBudget {
    pub gamma1: f64,
    pub gamma2: f64,
}

impl CoupledBudget {
    /// gamma1 = eta · Gall1, gamma2 = max(0, gamma1 + Gall2 − Gall1)
    pub fn new(eta: f64, gall1: f64, gall2: f64) -> Self {
        let gamma1 = eta * gall1;
        Self {
            gamma1,
            gamma2: (gamma1 + (gall2 - gall1)).max(0.0),
        }
    }
}

impl TwoPointSelector {
    pub fn new(settings: SearchSettings) -> Self {
        Self { settings }
    }

    #[instrument(skip_all, fields(agents = gaps.len(), eta, anchored = ctx.previous.is_some()))]
    pub fn select(
        &self,
        gaps: &GapMap,
        eta: f64,
        seed: u64,
        ctx: &SelectionContext<'_>,
    ) -> Result<SelectionOutcome> {
        let transform = &self.settings.transform;
        let empty = BTreeSet::new();
        let (first_gaps, first_matrix, previous_replanners) = match ctx.previous {
            Some(previous) => (previous.gaps, previous.matrix, previous.replanners),
            None => (gaps, ctx.matrix, &empty),
        };

        let universe: BTreeSet<AgentId> = first_gaps.agents().chain(gaps.agents()).cloned().collect();
        let first = IndexedPopulation::with_universe(universe.iter().cloned(), first_gaps, first_matrix);
        let second = IndexedPopulation::with_universe(universe, gaps, ctx.matrix);

        let budget = CoupledBudget::new(eta, first.total_positive_gap(), second.total_positive_gap());
        if first.is_empty() {
            return Ok(SelectionOutcome::empty(budget.gamma1, transform));
        }

        let (initial, unknown) = first.membership(previous_replanners.iter());
        for agent in unknown.iter().take(MAX_DATA_WARNINGS) {
            warn!(%agent, "Previous replanner has no gap, ignoring it");
        }
        if unknown.len() > MAX_DATA_WARNINGS {
            warn!("Suppressing further warnings of this type");
        }

        let mut state1 = ObjectiveState::new(&first, initial);
        let mut state2 = ObjectiveState::empty(&second);
        let coupled_q = |s1: &ObjectiveState<'_>, s2: &ObjectiveState<'_>| {
            s1.q(budget.gamma1, transform).max(s2.q(budget.gamma2, transform))
        };

        let mut rng = job_rng(seed, 0);
        let mut order: Vec<usize> = (0..first.len()).collect();
        let mut sweeps = 0u32;
        let mut accepted_flips = 0u64;
        let mut converged = true;
        let mut sweep_objectives = Vec::new();

        loop {
            if self.settings.max_sweeps.is_some_and(|max| sweeps >= max) {
                warn!(sweeps, "Sweep limit reached before a joint local optimum");
                converged = false;
                break;
            }
            sweeps += 1;
            order.shuffle(&mut rng);

            let mut improved = false;
            for &agent in &order {
                state1.begin_flip(agent)?;
                state2.begin_flip(agent)?;

                let q1 = state1.q(budget.gamma1, transform);
                let q2 = state2.q(budget.gamma2, transform);
                let dq1 = state1.evaluate_delta_q(budget.gamma1, transform)?;
                let dq2 = state2.evaluate_delta_q(budget.gamma2, transform)?;
                let accept = (q1 + dq1).max(q2 + dq2) - q1.max(q2) > 0.0;

                state1.commit(accept)?;
                state2.commit(accept)?;
                if accept {
                    accepted_flips += 1;
                    improved = true;
                    if self.settings.check_consistency {
                        state1.check_consistency()?;
                        state2.check_consistency()?;
                    }
                }
            }

            let q = coupled_q(&state1, &state2);
            sweep_objectives.push(q);
            debug!(
                sweep = sweeps,
                g1 = state1.g(),
                g2 = state2.g(),
                distance1 = state1.distance(),
                distance2 = state2.distance(),
                q,
                "Sweep done"
            );

            if !improved {
                break;
            }
        }

        // Previous replanners that left the population cannot replan now
        let mut replanners = first.member_ids(state1.members());
        let members = replanners.len();
        replanners.retain(|agent| gaps.contains(agent));
        if replanners.len() < members {
            debug!(dropped = members - replanners.len(), "Dropped replanners outside the current population");
        }

        let outcome = SelectionOutcome {
            replanners,
            realized_gap: state1.g(),
            realized_d2: state1.d2(),
            objective: coupled_q(&state1, &state2),
            gamma: budget.gamma1,
            sweeps,
            accepted_flips,
            converged,
            sweep_objectives,
        };

        info!(
            replanners = outcome.replanners.len(),
            sweeps,
            flips = accepted_flips,
            gamma1 = budget.gamma1,
            gamma2 = budget.gamma2,
            q = outcome.objective,
            "Two-point selection finished"
        );
        Ok(outcome)
    }
}
