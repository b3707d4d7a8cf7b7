//! Prometheus metrics for replanner selection

use greedo_common::{GreedoError, Result};
use prometheus::{Gauge, Histogram, HistogramOpts, IntCounter, Registry};

use crate::engine::IterationReport;

fn telemetry_error(err: prometheus::Error) -> GreedoError {
    GreedoError::Telemetry(err.to_string())
}

/// Per-iteration selection metrics
#[derive(Debug, Clone)]
pub struct GreedoMetrics {
    pub iterations_total: IntCounter,
    pub accepted_flips_total: IntCounter,
    pub unconverged_total: IntCounter,
    pub sweeps: Histogram,
    pub target_rate: Gauge,
    pub realized_rate: Gauge,
    pub realized_gap: Gauge,
    pub realized_distance: Gauge,
    pub objective: Gauge,
}

impl GreedoMetrics {
    pub fn new() -> Result<Self> {
        Ok(Self {
            iterations_total: IntCounter::new(
                "greedo_iterations_total",
                "Total replanner selections performed",
            )
            .map_err(telemetry_error)?,
            accepted_flips_total: IntCounter::new(
                "greedo_accepted_flips_total",
                "Total accepted single-agent flips",
            )
            .map_err(telemetry_error)?,
            unconverged_total: IntCounter::new(
                "greedo_unconverged_total",
                "Selections stopped by the sweep limit",
            )
            .map_err(telemetry_error)?,
            sweeps: Histogram::with_opts(
                HistogramOpts::new("greedo_sweeps", "Local-search sweeps per selection")
                    .buckets(vec![1.0, 2.0, 3.0, 5.0, 8.0, 13.0, 21.0, 34.0, 55.0]),
            )
            .map_err(telemetry_error)?,
            target_rate: Gauge::new("greedo_target_rate", "Target replanning rate eta")
                .map_err(telemetry_error)?,
            realized_rate: Gauge::new("greedo_realized_rate", "Share of agents selected to replan")
                .map_err(telemetry_error)?,
            realized_gap: Gauge::new("greedo_realized_gap", "Aggregate gap G of the replanners")
                .map_err(telemetry_error)?,
            realized_distance: Gauge::new(
                "greedo_realized_distance",
                "Population distance sqrt(D2) of the replanners",
            )
            .map_err(telemetry_error)?,
            objective: Gauge::new("greedo_objective", "Achieved transformed objective Q")
                .map_err(telemetry_error)?,
        })
    }

    pub fn register(&self, registry: &Registry) -> Result<()> {
        registry
            .register(Box::new(self.iterations_total.clone()))
            .map_err(telemetry_error)?;
        registry
            .register(Box::new(self.accepted_flips_total.clone()))
            .map_err(telemetry_error)?;
        registry
            .register(Box::new(self.unconverged_total.clone()))
            .map_err(telemetry_error)?;
        registry
            .register(Box::new(self.sweeps.clone()))
            .map_err(telemetry_error)?;
        registry
            .register(Box::new(self.target_rate.clone()))
            .map_err(telemetry_error)?;
        registry
            .register(Box::new(self.realized_rate.clone()))
            .map_err(telemetry_error)?;
        registry
            .register(Box::new(self.realized_gap.clone()))
            .map_err(telemetry_error)?;
        registry
            .register(Box::new(self.realized_distance.clone()))
            .map_err(telemetry_error)?;
        registry
            .register(Box::new(self.objective.clone()))
            .map_err(telemetry_error)?;
        Ok(())
    }

    pub fn record(&self, report: &IterationReport) {
        let outcome = &report.outcome;
        self.iterations_total.inc();
        self.accepted_flips_total.inc_by(outcome.accepted_flips);
        if !outcome.converged {
            self.unconverged_total.inc();
        }
        self.sweeps.observe(f64::from(outcome.sweeps));
        self.target_rate.set(report.target_rate);
        self.realized_rate.set(report.realized_rate);
        self.realized_gap.set(outcome.realized_gap);
        self.realized_distance.set(outcome.realized_distance());
        self.objective.set(outcome.objective);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_twice_fails() {
        let registry = Registry::new();
        let metrics = GreedoMetrics::new().unwrap();
        metrics.register(&registry).unwrap();
        assert_eq!(registry.gather().len(), 9);

        let err = metrics.register(&registry).unwrap_err();
        assert!(matches!(err, GreedoError::Telemetry(_)));
    }
}
