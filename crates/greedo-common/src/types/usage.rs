//! Usage snapshots - who uses which resource when
//!
//! A snapshot is derived from the plans of a population state: for every
//! agent, the ordered list of resources it traverses together with the time
//! it enters each of them. Two snapshots (the current and a candidate
//! population state) feed the population distance model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ids::{AgentId, ResourceId};

/// A single (resource, time) usage event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEvent {
    /// Resource being used
    pub resource: ResourceId,
    /// Entry time in seconds
    pub time_s: f64,
}

impl UsageEvent {
    pub fn new(resource: impl Into<ResourceId>, time_s: f64) -> Self {
        Self {
            resource: resource.into(),
            time_s,
        }
    }
}

/// Per-agent usage events of one population state
///
/// An agent may be present with an empty event list (e.g. a plan without a
/// routable leg); such agents contribute nothing to any interaction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageSnapshot {
    agents: BTreeMap<AgentId, Vec<UsageEvent>>,
}

impl UsageSnapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the events of an agent
    pub fn insert(&mut self, agent: impl Into<AgentId>, events: Vec<UsageEvent>) {
        self.agents.insert(agent.into(), events);
    }

    /// Append one event to an agent's list
    pub fn push_event(&mut self, agent: impl Into<AgentId>, resource: impl Into<ResourceId>, time_s: f64) {
        self.agents
            .entry(agent.into())
            .or_default()
            .push(UsageEvent::new(resource, time_s));
    }

    /// Builder-style variant of [`UsageSnapshot::push_event`]
    pub fn with_event(mut self, agent: impl Into<AgentId>, resource: impl Into<ResourceId>, time_s: f64) -> Self {
        self.push_event(agent, resource, time_s);
        self
    }

    /// Events of an agent, if the agent is present
    pub fn events(&self, agent: &AgentId) -> Option<&[UsageEvent]> {
        self.agents.get(agent).map(Vec::as_slice)
    }

    /// Iterate agents and their events in agent order
    pub fn iter(&self) -> impl Iterator<Item = (&AgentId, &[UsageEvent])> {
        self.agents.iter().map(|(id, events)| (id, events.as_slice()))
    }

    /// Number of agents in the snapshot
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Total number of usage events over all agents
    pub fn event_count(&self) -> usize {
        self.agents.values().map(Vec::len).sum()
    }
}

/// Throughput capacity per resource (units per second)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceCapacities {
    capacities: BTreeMap<ResourceId, f64>,
}

impl ResourceCapacities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the capacity of a resource
    pub fn insert(&mut self, resource: impl Into<ResourceId>, capacity: f64) {
        self.capacities.insert(resource.into(), capacity);
    }

    /// Builder-style variant of [`ResourceCapacities::insert`]
    pub fn with(mut self, resource: impl Into<ResourceId>, capacity: f64) -> Self {
        self.insert(resource, capacity);
        self
    }

    /// Capacity of a resource, if known
    pub fn get(&self, resource: &ResourceId) -> Option<f64> {
        self.capacities.get(resource).copied()
    }

    pub fn len(&self) -> usize {
        self.capacities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capacities.is_empty()
    }
}

impl<R: Into<ResourceId>> FromIterator<(R, f64)> for ResourceCapacities {
    fn from_iter<I: IntoIterator<Item = (R, f64)>>(iter: I) -> Self {
        Self {
            capacities: iter.into_iter().map(|(r, c)| (r.into(), c)).collect(),
        }
    }
}
