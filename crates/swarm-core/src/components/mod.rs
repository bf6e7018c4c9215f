//! ECS Components
//!
//! Per-agent components for the boid population.

pub mod agent;

pub use agent::*;
