//! Per-iteration replanning engine
//!
//! [`Greedo`] owns the configuration, the selection strategy, the rate
//! schedule and the anchor of the previous iteration. The surrounding
//! simulation calls [`Greedo::replan`] once per iteration.

use greedo_common::{AgentId, GapMap, ResourceCapacities, Result, UsageSnapshot};
use greedo_distance::{InteractionMatrix, KernelPopulationDistance};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::analysis::GapSummary;
use crate::config::GreedoConfig;
use crate::schedule::{self, BudgetSchedule};
use crate::selector::{PreviousIteration, ReplannerSelector, SelectionContext, SelectionOutcome};
use crate::telemetry::GreedoMetrics;

const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// What one iteration selected, with the values exposed for logging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationReport {
    pub iteration: u32,
    /// eta drawn from the schedule
    pub target_rate: f64,
    pub outcome: SelectionOutcome,
    /// Replanners / agents
    pub realized_rate: f64,
    pub mean_gap: f64,
    pub mean_replanner_gap: f64,
    pub gap_summary: Option<GapSummary>,
    /// Unix millis
    pub completed_at: i64,
}

#[derive(Debug)]
struct Anchor {
    gaps: GapMap,
    matrix: Arc<InteractionMatrix>,
    replanners: BTreeSet<AgentId>,
}

#[derive(Debug)]
pub struct Greedo {
    config: GreedoConfig,
    distance: KernelPopulationDistance,
    selector: ReplannerSelector,
    schedule: Box<dyn BudgetSchedule>,
    metrics: Option<Arc<GreedoMetrics>>,
    iteration: u32,
    previous: Option<Anchor>,
}

impl Greedo {
    pub fn new(config: GreedoConfig) -> Result<Self> {
        config.validate()?;
        let distance = KernelPopulationDistance::new(&config.kernel_distance())?;
        let selector = ReplannerSelector::from_config(&config)?;
        let schedule = schedule::from_config(&config);
        Ok(Self {
            config,
            distance,
            selector,
            schedule,
            metrics: None,
            iteration: 0,
            previous: None,
        })
    }

    /// Replace the configured rate schedule
    pub fn with_schedule(mut self, schedule: Box<dyn BudgetSchedule>) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<GreedoMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &GreedoConfig {
        &self.config
    }

    pub fn selector(&self) -> &ReplannerSelector {
        &self.selector
    }

    /// Number of completed iterations
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Replanners chosen in the last completed iteration
    pub fn previous_replanners(&self) -> Option<&BTreeSet<AgentId>> {
        self.previous.as_ref().map(|anchor| &anchor.replanners)
    }

    /// Interaction matrix between the current and the candidate population state
    pub fn interaction_matrix(
        &self,
        old: &UsageSnapshot,
        new: &UsageSnapshot,
        capacities: &ResourceCapacities,
    ) -> Result<InteractionMatrix> {
        self.distance.compute(old, new, capacities)
    }

    /// Compute the interaction matrix and select this iteration's replanners
    ///
    /// Agents of `gaps` without usage in a snapshot are reported as data warnings.
    pub fn replan(
        &mut self,
        gaps: GapMap,
        old: &UsageSnapshot,
        new: &UsageSnapshot,
        capacities: &ResourceCapacities,
    ) -> Result<IterationReport> {
        let matrix = self
            .distance
            .compute_for_population(gaps.agents(), old, new, capacities)?;
        self.select_replanners(gaps, matrix)
    }

    /// Select replanners for a precomputed interaction matrix
    #[instrument(skip_all, fields(iteration = self.iteration, agents = gaps.len()))]
    pub fn select_replanners(&mut self, gaps: GapMap, matrix: InteractionMatrix) -> Result<IterationReport> {
        let raw_eta = self.schedule.target_rate(self.iteration);
        let eta = if raw_eta.is_finite() {
            raw_eta.clamp(0.0, 1.0)
        } else {
            warn!(raw_eta, "Schedule produced a non-finite rate, nobody replans");
            0.0
        };
        let seed = self
            .config
            .seed
            .wrapping_add(u64::from(self.iteration).wrapping_mul(SEED_STRIDE));

        let matrix = Arc::new(matrix);
        let mut ctx = SelectionContext::new(&matrix);
        if let Some(anchor) = &self.previous {
            ctx = ctx.with_previous(PreviousIteration {
                replanners: &anchor.replanners,
                gaps: &anchor.gaps,
                matrix: &anchor.matrix,
            });
        }
        let outcome = self.selector.select_replanners(&gaps, eta, seed, &ctx)?;

        let mean_gap = gaps.mean();
        let report = IterationReport {
            iteration: self.iteration,
            target_rate: eta,
            realized_rate: if gaps.is_empty() {
                0.0
            } else {
                outcome.len() as f64 / gaps.len() as f64
            },
            mean_gap,
            mean_replanner_gap: if outcome.is_empty() {
                0.0
            } else {
                gaps.sum_over(&outcome.replanners) / outcome.len() as f64
            },
            gap_summary: GapSummary::from_gaps(&gaps, self.config.gap_percentile_step).ok(),
            completed_at: chrono::Utc::now().timestamp_millis(),
            outcome,
        };

        if let Some(metrics) = &self.metrics {
            metrics.record(&report);
        }
        info!(
            iteration = report.iteration,
            selector = ?self.selector.kind(),
            eta,
            replanners = report.outcome.len(),
            realized_rate = report.realized_rate,
            mean_gap,
            "Replanners selected"
        );

        self.schedule.register_gap(mean_gap);
        self.previous = Some(Anchor {
            gaps,
            matrix,
            replanners: report.outcome.replanners.clone(),
        });
        self.iteration += 1;
        Ok(report)
    }
}
