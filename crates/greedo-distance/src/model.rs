//! Kernel population distance
//!
//! Computes the interaction matrix between an old and a candidate-new
//! population state without building the per-resource-time feature space:
//!
//! ```text
//! ‖φ(new) − φ(old)‖² = K(old, old) − 2·K(old, new) + K(new, new)
//! ```
//!
//! Each of the three terms is a sum over pairs of usage events on the same
//! resource, weighted by μ / c_r and the time kernel. Resources are processed
//! in parallel; every resource emits its contributions pre-bucketed by the
//! row agent's shard, and the shards are reduced in parallel. Within a row
//! contributions are always added in resource order, so the result does not
//! depend on thread scheduling.

use dashmap::DashMap;
use greedo_common::{
    AgentId, DataError, ResourceCapacities, ResourceId, Result, UsageSnapshot, DEFAULT_KERNEL_HALF_LIFE_S,
    DEFAULT_KERNEL_THRESHOLD, MAX_DATA_WARNINGS,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::{Hash, Hasher};
use tracing::{debug, info, instrument, warn};

use crate::kernel::{ExponentialKernel, KernelWindow};
use crate::matrix::InteractionMatrix;

/// Kernel distance parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelDistanceConfig {
    /// Kernel half-life in seconds
    pub half_life_s: f64,
    /// Minimum kernel value for a usage pair to contribute
    pub threshold: f64,
    /// Factor applied to every resource capacity
    pub flow_capacity_factor: f64,
}

impl Default for KernelDistanceConfig {
    fn default() -> Self {
        Self {
            half_life_s: DEFAULT_KERNEL_HALF_LIFE_S,
            threshold: DEFAULT_KERNEL_THRESHOLD,
            flow_capacity_factor: 1.0,
        }
    }
}

/// One agent's entry into a resource
#[derive(Debug, Clone)]
struct UsageEntry {
    agent: AgentId,
    time_s: f64,
}

/// Usage entries per resource, each list sorted by (time, agent)
type ResourceUsage = BTreeMap<ResourceId, Vec<UsageEntry>>;

/// Contributions of one resource, bucketed by row shard
type ShardedContributions = Vec<Vec<(AgentId, AgentId, f64)>>;

/// Capped data-quality warnings, one budget per snapshot
struct WarningBudget {
    label: &'static str,
    emitted: usize,
}

impl WarningBudget {
    fn new(label: &'static str) -> Self {
        Self { label, emitted: 0 }
    }

    fn warn(&mut self, message: std::fmt::Arguments<'_>) {
        if self.emitted < MAX_DATA_WARNINGS {
            warn!(snapshot = self.label, "{}", message);
            self.emitted += 1;
            if self.emitted == MAX_DATA_WARNINGS {
                warn!(snapshot = self.label, "Suppressing further warnings of this type");
            }
        }
    }
}

/// Kernel-trick population distance model
#[derive(Debug, Clone)]
pub struct KernelPopulationDistance {
    kernel: ExponentialKernel,
    threshold: f64,
    window: KernelWindow,
    flow_capacity_factor: f64,
}

impl KernelPopulationDistance {
    /// Create a distance model; invalid parameters fail here, never mid-computation
    pub fn new(config: &KernelDistanceConfig) -> Result<Self> {
        let kernel = ExponentialKernel::from_half_life(config.half_life_s)?;
        if !(config.threshold >= 0.0) {
            return Err(greedo_common::ConfigError::NegativeThreshold(config.threshold).into());
        }
        if !(config.flow_capacity_factor > 0.0) || !config.flow_capacity_factor.is_finite() {
            return Err(
                greedo_common::ConfigError::NonPositiveCapacityFactor(config.flow_capacity_factor).into(),
            );
        }
        Ok(Self {
            kernel,
            threshold: config.threshold,
            window: kernel.window(config.threshold),
            flow_capacity_factor: config.flow_capacity_factor,
        })
    }

    pub fn kernel(&self) -> &ExponentialKernel {
        &self.kernel
    }

    /// Compute the interaction matrix between two population states
    pub fn compute(
        &self,
        old: &UsageSnapshot,
        new: &UsageSnapshot,
        capacities: &ResourceCapacities,
    ) -> Result<InteractionMatrix> {
        self.compute_with(old, new, capacities, WarningBudget::new("old"), WarningBudget::new("new"))
    }

    /// [`KernelPopulationDistance::compute`] for a known population; agents
    /// absent from a snapshot contribute nothing and are reported as data warnings
    pub fn compute_for_population<'a>(
        &self,
        agents: impl IntoIterator<Item = &'a AgentId>,
        old: &UsageSnapshot,
        new: &UsageSnapshot,
        capacities: &ResourceCapacities,
    ) -> Result<InteractionMatrix> {
        let mut warnings_old = WarningBudget::new("old");
        let mut warnings_new = WarningBudget::new("new");
        for agent in agents {
            if old.events(agent).is_none() {
                warnings_old.warn(format_args!("Agent {} is missing from the snapshot", agent));
            }
            if new.events(agent).is_none() {
                warnings_new.warn(format_args!("Agent {} is missing from the snapshot", agent));
            }
        }
        self.compute_with(old, new, capacities, warnings_old, warnings_new)
    }

    #[instrument(skip_all, fields(old_agents = old.len(), new_agents = new.len()))]
    fn compute_with(
        &self,
        old: &UsageSnapshot,
        new: &UsageSnapshot,
        capacities: &ResourceCapacities,
        mut warnings_old: WarningBudget,
        mut warnings_new: WarningBudget,
    ) -> Result<InteractionMatrix> {
        let usage_old = self.group_by_resource(old, capacities, &mut warnings_old)?;
        let usage_new = self.group_by_resource(new, capacities, &mut warnings_new)?;

        let resources: Vec<&ResourceId> = usage_old
            .keys()
            .chain(usage_new.keys())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let shard_count = rayon::current_num_threads().max(1);
        let empty: Vec<UsageEntry> = Vec::new();

        let partials: Vec<ShardedContributions> = resources
            .par_iter()
            .map(|resource| {
                // Capacity presence was checked while grouping.
                let capacity = capacities.get(resource).unwrap_or(1.0) * self.flow_capacity_factor;
                let entries_old = usage_old.get(*resource).unwrap_or(&empty);
                let entries_new = usage_new.get(*resource).unwrap_or(&empty);
                self.resource_contributions(entries_old, entries_new, capacity, shard_count)
            })
            .collect();

        let shards: Vec<HashMap<AgentId, HashMap<AgentId, f64>>> = (0..shard_count)
            .into_par_iter()
            .map(|shard| {
                let mut rows: HashMap<AgentId, HashMap<AgentId, f64>> = HashMap::new();
                for partial in &partials {
                    for (from, to, value) in &partial[shard] {
                        *rows
                            .entry(from.clone())
                            .or_default()
                            .entry(to.clone())
                            .or_insert(0.0) += value;
                    }
                }
                rows
            })
            .collect();

        let rows: HashMap<AgentId, HashMap<AgentId, f64>> = shards.into_iter().flatten().collect();
        let matrix = InteractionMatrix::from_rows(rows);

        info!(
            resources = resources.len(),
            entries = matrix.len(),
            "Computed kernel population distance"
        );
        Ok(matrix)
    }

    /// Group usage events by resource, dropping events that cannot contribute
    fn group_by_resource(
        &self,
        snapshot: &UsageSnapshot,
        capacities: &ResourceCapacities,
        warnings: &mut WarningBudget,
    ) -> Result<ResourceUsage> {
        let mut usable: Vec<(&AgentId, &ResourceId, f64)> = Vec::with_capacity(snapshot.event_count());

        for (agent, events) in snapshot.iter() {
            if events.is_empty() {
                warnings.warn(format_args!("Agent {} has no usage events", agent));
                continue;
            }
            for event in events {
                if !event.time_s.is_finite() {
                    return Err(DataError::NonFiniteTime {
                        agent: agent.clone(),
                        value: event.time_s,
                    }
                    .into());
                }
                match capacities.get(&event.resource) {
                    Some(capacity) if capacity > 0.0 && capacity.is_finite() => {
                        usable.push((agent, &event.resource, event.time_s));
                    }
                    _ => warnings.warn(format_args!(
                        "Agent {} uses resource {} without a positive capacity",
                        agent, event.resource
                    )),
                }
            }
        }

        let grouped: DashMap<ResourceId, Vec<UsageEntry>> = DashMap::new();
        usable.par_iter().for_each(|(agent, resource, time_s)| {
            grouped.entry((*resource).clone()).or_default().push(UsageEntry {
                agent: (*agent).clone(),
                time_s: *time_s,
            });
        });

        let usage: ResourceUsage = grouped
            .into_iter()
            .map(|(resource, mut entries)| {
                entries.sort_by(|a, b| a.time_s.total_cmp(&b.time_s).then_with(|| a.agent.cmp(&b.agent)));
                (resource, entries)
            })
            .collect();

        debug!(snapshot = warnings.label, resources = usage.len(), events = usable.len(), "Grouped usage");
        Ok(usage)
    }

    /// All three kernel-trick passes for one resource
    fn resource_contributions(
        &self,
        entries_old: &[UsageEntry],
        entries_new: &[UsageEntry],
        capacity: f64,
        shard_count: usize,
    ) -> ShardedContributions {
        let mut out: ShardedContributions = vec![Vec::new(); shard_count];
        let resource_factor = self.kernel.mu() / capacity;

        self.accumulate_pairs(entries_old, entries_old, resource_factor, &mut out); // K(x,x)
        self.accumulate_pairs(entries_old, entries_new, -2.0 * resource_factor, &mut out); // K(x,y)
        self.accumulate_pairs(entries_new, entries_new, resource_factor, &mut out); // K(y,y)
        out
    }

    fn accumulate_pairs(
        &self,
        entries1: &[UsageEntry],
        entries2: &[UsageEntry],
        factor: f64,
        out: &mut ShardedContributions,
    ) {
        if entries1.is_empty() || entries2.is_empty() {
            return;
        }
        let shard_count = out.len();

        for entry1 in entries1 {
            let (lo, hi) = match self.window {
                KernelWindow::Empty => return,
                KernelWindow::Unbounded => (0, entries2.len()),
                KernelWindow::Bounded(bound) => (
                    entries2.partition_point(|e| e.time_s < entry1.time_s - bound),
                    entries2.partition_point(|e| e.time_s <= entry1.time_s + bound),
                ),
            };

            let shard = shard_of(&entry1.agent, shard_count);
            for entry2 in &entries2[lo..hi] {
                let kernel = self.kernel.value(entry1.time_s - entry2.time_s);
                if kernel >= self.threshold {
                    out[shard].push((entry1.agent.clone(), entry2.agent.clone(), factor * kernel));
                }
            }
        }
    }
}

#[inline]
fn shard_of(agent: &AgentId, shard_count: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    agent.hash(&mut hasher);
    (hasher.finish() % shard_count as u64) as usize
}
