//! ECS Systems
//!
//! The per-tick phase pipeline: grid rebuild, steering, movement, aging,
//! infection, cure, reproduction, death and promotion.

use bevy_ecs::prelude::*;
use bevy_ecs::schedule::ExecutorKind;

pub mod epidemic;
pub mod grid;
pub mod lifecycle;
pub mod movement;
pub mod mutations;
pub mod reproduction;
pub mod steering;

pub use epidemic::{can_transmit, cure_infections, cured_state, resolve_deaths, spread_infection};
pub use grid::rebuild_grid;
pub use lifecycle::{age_agents, cleanup_dead, promote_doctors};
pub use movement::{apply_boundary, clamp_speed, move_agents};
pub use mutations::{apply_pending_mutations, Mutation, Offspring, PendingMutations, TickTally};
pub use reproduction::{offspring_count, reproduce};
pub use steering::{steer_agents, steering_force};

use crate::output::record_stats;

/// Simulation clock for the tick in progress
#[derive(Resource, Debug, Clone, Copy, PartialEq, Default)]
pub struct TickClock {
    /// Seconds covered by this tick
    pub dt: f32,
    /// 1-based index of the tick being run
    pub tick: u64,
    /// Seconds simulated, including this tick
    pub elapsed: f64,
}

/// Build the fixed-order tick schedule.
///
/// Mutations queued by a phase are applied before the next phase reads state.
pub fn build_tick_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.set_executor_kind(ExecutorKind::SingleThreaded);
    schedule.add_systems(
        (
            cleanup_dead,
            rebuild_grid,
            steer_agents,
            move_agents,
            age_agents,
            spread_infection,
            apply_pending_mutations,
            cure_infections,
            apply_pending_mutations,
            reproduce,
            apply_pending_mutations,
            resolve_deaths,
            apply_pending_mutations,
            promote_doctors,
            apply_pending_mutations,
            record_stats,
        )
            .chain(),
    );
    schedule
}
