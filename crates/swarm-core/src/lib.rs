//! Swarm Epidemic Simulation Library
//!
//! Boid flocking over a uniform spatial grid, with a SIRS epidemic,
//! reproduction and Normal -> Doctor promotion layered on top.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;

pub mod components;
pub mod config;
pub mod output;
pub mod setup;
pub mod simulation;
pub mod spatial;
pub mod systems;

pub use components::*;
pub use config::{BoundaryPolicy, ClassParams, ConfigError, SimConfig, TransmissionPolicy};
pub use output::{
    ClassAggregate, FlockSample, HistoryPoint, PerClass, PopulationHistory, SimStats,
};
pub use setup::AgentSpec;
pub use simulation::{AgentView, SimError, Simulation};
pub use spatial::{EntryFlags, EntryHandle, GridEntry, Neighbor, SpatialGrid};

/// Seeded random number generator resource
#[derive(Resource)]
pub struct SimRng(pub SmallRng);
