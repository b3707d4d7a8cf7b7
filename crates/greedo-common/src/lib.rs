//! # Greedo Common
//!
//! Shared types and errors for the Greedo replanner-selection engine.
//!
//! ## Core Types
//!
//! - [`AgentId`]: opaque, ordered identifier of a decision-making agent
//! - [`ResourceId`]: identifier of a shared, capacity-limited resource
//! - [`UsageSnapshot`]: per-agent ordered list of (resource, time) usage events
//! - [`ResourceCapacities`]: per-resource throughput capacity
//! - [`GapMap`]: per-agent utility improvement obtainable by replanning
//!
//! ## Errors
//!
//! - [`GreedoError`]: unified error with configuration, protocol and data variants

pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{ConfigError, DataError, GreedoError, ProtocolError, Result};
pub use types::{
    gap_map::GapMap,
    ids::{AgentId, ResourceId},
    usage::{ResourceCapacities, UsageEvent, UsageSnapshot},
};

/// Greedo version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Floor applied to the transformed distance in the objective denominator
pub const DISTANCE_EPSILON: f64 = 1e-8;

/// Relative tolerance used when checking maintained aggregates against a recomputation
pub const CONSISTENCY_TOLERANCE: f64 = 1e-6;

/// Maximum number of data-quality warnings emitted per snapshot before suppression
pub const MAX_DATA_WARNINGS: usize = 10;

/// Default kernel half-life in seconds
pub const DEFAULT_KERNEL_HALF_LIFE_S: f64 = 300.0;

/// Default kernel threshold (compared against the kernel value, which lies in (0, 1])
pub const DEFAULT_KERNEL_THRESHOLD: f64 = 0.01;
