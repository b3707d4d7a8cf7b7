//! # Greedo Distance
//!
//! Population distance model for the Greedo replanner selection.
//!
//! ## Interaction Coefficients
//!
//! ```text
//! A(i, j) = Σ_r Σ_{(i,t1) ∈ r} Σ_{(j,t2) ∈ r} sign · (μ / c_r) · kernel(|t1 − t2|)
//! ```
//!
//! Where:
//! - r: a shared resource with throughput capacity c_r
//! - μ: ln 2 / kernel half-life
//! - sign: +1 for (old, old), −2 for (old, new), +1 for (new, new) usage pairs
//!
//! Pairs whose kernel value falls below the configured threshold are dropped.

pub mod kernel;
pub mod matrix;
pub mod model;

pub use kernel::{ExponentialKernel, KernelWindow};
pub use matrix::InteractionMatrix;
pub use model::{KernelDistanceConfig, KernelPopulationDistance};
