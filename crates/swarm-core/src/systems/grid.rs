//! Grid Rebuild System
//!
//! Clears the spatial grid and re-inserts every live agent, once per tick.

use bevy_ecs::prelude::*;

use crate::components::agent::{Alive, EpidemicState, Position, Sex, SwarmClass, Velocity};
use crate::spatial::{EntryFlags, SpatialGrid};

/// Snapshot all live agents into the grid
pub fn rebuild_grid(
    mut grid: ResMut<SpatialGrid>,
    agents: Query<(Entity, &Position, &Velocity, &SwarmClass, &Sex, &EpidemicState), With<Alive>>,
) {
    grid.clear();
    for (entity, position, velocity, class, sex, state) in &agents {
        let flags = EntryFlags::from_state(true, state.is_infected(), sex.is_male());
        grid.insert(
            entity,
            position.x,
            position.y,
            velocity.vx,
            velocity.vy,
            *class,
            flags,
        );
    }
}
