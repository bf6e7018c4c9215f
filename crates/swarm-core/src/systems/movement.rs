//! Movement System
//!
//! Position integration, world boundaries and speed limits.

use bevy_ecs::prelude::*;

use crate::components::agent::{Alive, Heading, Position, Velocity};
use crate::config::{BoundaryPolicy, SimConfig};

use super::TickClock;

/// Below this speed the heading is left unchanged
pub const HEADING_MIN_SPEED: f32 = 0.01;

/// Clamp speed into `[min_speed, max_speed]`.
///
/// The floor is skipped when `min_speed > max_speed`. A stalled agent is
/// relaunched along `heading` at `min_speed`.
pub fn clamp_speed(velocity: Velocity, heading: f32, min_speed: f32, max_speed: f32) -> Velocity {
    let speed = velocity.speed();
    if speed > max_speed {
        let scale = max_speed / speed;
        return Velocity::new(velocity.vx * scale, velocity.vy * scale);
    }
    if min_speed <= max_speed && speed < min_speed {
        if speed <= f32::EPSILON {
            return Velocity::from_angle(heading, min_speed);
        }
        let scale = min_speed / speed;
        return Velocity::new(velocity.vx * scale, velocity.vy * scale);
    }
    velocity
}

/// Resolve a single coordinate against `[0, extent]`
fn resolve_axis(pos: &mut f32, vel: &mut f32, extent: f32, policy: BoundaryPolicy) {
    match policy {
        BoundaryPolicy::Wrap => {
            if *pos < 0.0 || *pos >= extent {
                *pos = pos.rem_euclid(extent);
                // rem_euclid can round up to the extent for tiny negatives
                if *pos >= extent {
                    *pos = 0.0;
                }
            }
        }
        BoundaryPolicy::Bounce => {
            if *pos < 0.0 {
                *pos = -*pos;
                *vel = vel.abs();
            } else if *pos > extent {
                *pos = 2.0 * extent - *pos;
                *vel = -vel.abs();
            }
            // Overshoot by more than a whole world width
            *pos = pos.clamp(0.0, extent);
        }
    }
}

/// Apply the boundary policy to one agent
pub fn apply_boundary(
    position: &mut Position,
    velocity: &mut Velocity,
    policy: BoundaryPolicy,
    world_width: f32,
    world_height: f32,
) {
    resolve_axis(&mut position.x, &mut velocity.vx, world_width, policy);
    resolve_axis(&mut position.y, &mut velocity.vy, world_height, policy);
}

/// Move every live agent one step
pub fn move_agents(
    config: Res<SimConfig>,
    clock: Res<TickClock>,
    mut agents: Query<(&mut Position, &mut Velocity, &mut Heading), With<Alive>>,
) {
    let dt = clock.dt;
    for (mut position, mut velocity, mut heading) in &mut agents {
        position.x += velocity.vx * dt;
        position.y += velocity.vy * dt;
        apply_boundary(
            &mut position,
            &mut velocity,
            config.boundary,
            config.world_width,
            config.world_height,
        );

        *velocity = clamp_speed(*velocity, heading.angle, config.min_speed, config.max_speed);
        if velocity.speed() > HEADING_MIN_SPEED {
            heading.angle = velocity.vy.atan2(velocity.vx);
        }
    }
}
