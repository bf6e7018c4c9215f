//! Steering System
//!
//! Reynolds-style separation, alignment and cohesion, plus antivax agents
//! steering away from doctors. Neighbor data comes from the grid snapshot.

use bevy_ecs::prelude::*;

use crate::components::agent::{Alive, Position, SwarmClass, Velocity};
use crate::config::SimConfig;
use crate::spatial::{GridEntry, Neighbor, SpatialGrid};

use super::TickClock;

/// Neighbors closer than this (squared) are ignored
const MIN_NEIGHBOR_DIST_SQ: f32 = 1e-6;

/// Shortest accumulated vector that still defines a direction
const MIN_DIRECTION_LEN: f32 = 1e-6;

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    sum_x: f32,
    sum_y: f32,
    count: u32,
}

impl Accumulator {
    fn add(&mut self, x: f32, y: f32) {
        self.sum_x += x;
        self.sum_y += y;
        self.count += 1;
    }

    fn mean(&self) -> Option<(f32, f32)> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f32;
        Some((self.sum_x / n, self.sum_y / n))
    }
}

/// Shorten `(x, y)` to at most `max_len`
pub fn truncate(x: f32, y: f32, max_len: f32) -> (f32, f32) {
    let len_sq = x * x + y * y;
    if len_sq > max_len * max_len && len_sq > 0.0 {
        let scale = max_len / len_sq.sqrt();
        (x * scale, y * scale)
    } else {
        (x, y)
    }
}

/// Steering force toward `direction` at full speed, capped at `max_force`.
///
/// A direction too short to normalize yields no force.
pub fn steer_toward(
    direction: (f32, f32),
    velocity: Velocity,
    max_speed: f32,
    max_force: f32,
) -> (f32, f32) {
    let (dx, dy) = direction;
    let len = (dx * dx + dy * dy).sqrt();
    if len < MIN_DIRECTION_LEN {
        return (0.0, 0.0);
    }
    let desired_x = dx / len * max_speed;
    let desired_y = dy / len * max_speed;
    truncate(desired_x - velocity.vx, desired_y - velocity.vy, max_force)
}

/// Radius an agent of `class` needs to see every neighbor it reacts to
pub fn perception_radius(config: &SimConfig, class: SwarmClass) -> f32 {
    let flocking = config
        .separation_radius
        .max(config.alignment_radius)
        .max(config.cohesion_radius);
    if class == SwarmClass::Antivax {
        flocking.max(config.antivax_repulsion_radius)
    } else {
        flocking
    }
}

/// Net weighted steering force for one agent.
///
/// `neighbors` may include the agent itself; it is skipped along with any
/// neighbor at (near) zero distance.
pub fn steering_force<'a>(
    config: &SimConfig,
    entity: Entity,
    position: Position,
    velocity: Velocity,
    class: SwarmClass,
    neighbors: impl IntoIterator<Item = (&'a GridEntry, f32)>,
) -> (f32, f32) {
    let separation_sq = config.separation_radius * config.separation_radius;
    let alignment_sq = config.alignment_radius * config.alignment_radius;
    let cohesion_sq = config.cohesion_radius * config.cohesion_radius;
    let repulsion_sq = config.antivax_repulsion_radius * config.antivax_repulsion_radius;
    let avoids_doctors = class == SwarmClass::Antivax;

    let mut separation = Accumulator::default();
    let mut alignment = Accumulator::default();
    let mut cohesion = Accumulator::default();
    let mut avoidance = Accumulator::default();

    for (entry, dist_sq) in neighbors {
        if entry.entity == entity || dist_sq < MIN_NEIGHBOR_DIST_SQ {
            continue;
        }
        let away_x = position.x - entry.x;
        let away_y = position.y - entry.y;

        if dist_sq <= separation_sq {
            separation.add(away_x / dist_sq, away_y / dist_sq);
        }
        if entry.class == class {
            if dist_sq <= alignment_sq {
                alignment.add(entry.vx, entry.vy);
            }
            if dist_sq <= cohesion_sq {
                cohesion.add(entry.x, entry.y);
            }
        }
        if avoids_doctors && entry.class == SwarmClass::Doctor && dist_sq <= repulsion_sq {
            avoidance.add(away_x / dist_sq, away_y / dist_sq);
        }
    }

    let steer = |direction| steer_toward(direction, velocity, config.max_speed, config.max_force);
    let mut force = (0.0, 0.0);
    let mut apply = |direction: Option<(f32, f32)>, weight: f32| {
        if let Some(direction) = direction {
            let (fx, fy) = steer(direction);
            force.0 += fx * weight;
            force.1 += fy * weight;
        }
    };

    apply(separation.mean(), config.separation_weight);
    apply(alignment.mean(), config.alignment_weight);
    apply(
        cohesion
            .mean()
            .map(|(cx, cy)| (cx - position.x, cy - position.y)),
        config.cohesion_weight,
    );
    apply(avoidance.mean(), config.antivax_repulsion_weight);

    force
}

/// Integrate steering forces into velocities
pub fn steer_agents(
    config: Res<SimConfig>,
    clock: Res<TickClock>,
    grid: Res<SpatialGrid>,
    mut agents: Query<(Entity, &Position, &mut Velocity, &SwarmClass), With<Alive>>,
    mut scratch: Local<Vec<Neighbor>>,
) {
    let dt = clock.dt;
    for (entity, position, mut velocity, class) in &mut agents {
        let radius = perception_radius(&config, *class);
        match config.fov_half_angle {
            Some(half_angle) => grid.query_neighbors_fov(
                position.x,
                position.y,
                radius,
                &mut scratch,
                half_angle,
                velocity.vx,
                velocity.vy,
            ),
            None => grid.query_neighbors(position.x, position.y, radius, &mut scratch),
        }

        let (fx, fy) = steering_force(
            &config,
            entity,
            *position,
            *velocity,
            *class,
            scratch
                .iter()
                .map(|hit| (grid.entry(hit.handle), hit.dist_sq)),
        );

        let (vx, vy) = truncate(
            velocity.vx + fx * dt,
            velocity.vy + fy * dt,
            config.max_speed,
        );
        velocity.vx = vx;
        velocity.vy = vy;
    }
}
