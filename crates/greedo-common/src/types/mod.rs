//! Core data types for Greedo

pub mod gap_map;
pub mod ids;
pub mod usage;
