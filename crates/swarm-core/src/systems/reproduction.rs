//! Reproduction System
//!
//! Same-class, opposite-sex pairs that are both off cooldown may mate.
//! The first successful partner found in grid order wins.

use std::collections::HashSet;
use std::f32::consts::TAU;

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::components::agent::{
    Alive, EpidemicState, Position, ReproductionCooldown, Sex, SwarmClass, Velocity,
};
use crate::config::SimConfig;
use crate::spatial::{Neighbor, SpatialGrid};
use crate::SimRng;

use super::mutations::{Mutation, Offspring, PendingMutations};

/// Litter size drawn from `Normal(mean, stddev)`, rounded and floored at zero
pub fn offspring_count(rng: &mut SmallRng, mean: f32, stddev: f32) -> u32 {
    let raw = if stddev > 0.0 {
        match Normal::new(mean, stddev) {
            Ok(dist) => dist.sample(rng),
            Err(_) => mean,
        }
    } else {
        mean
    };
    raw.round().max(0.0) as u32
}

fn random_sex(rng: &mut SmallRng) -> Sex {
    if rng.gen_bool(0.5) {
        Sex::Male
    } else {
        Sex::Female
    }
}

fn newborn_velocity(rng: &mut SmallRng, min_speed: f32, max_speed: f32) -> Velocity {
    let angle = rng.gen_range(0.0..TAU);
    let speed = if min_speed < max_speed {
        rng.gen_range(min_speed..=max_speed)
    } else {
        max_speed
    };
    Velocity::from_angle(angle, speed)
}

type Mate<'a> = (
    Entity,
    &'a Position,
    &'a SwarmClass,
    &'a Sex,
    &'a EpidemicState,
    &'a ReproductionCooldown,
);

/// Pair up eligible neighbors and queue their offspring
pub fn reproduce(
    config: Res<SimConfig>,
    grid: Res<SpatialGrid>,
    mut rng: ResMut<SimRng>,
    mut pending: ResMut<PendingMutations>,
    agents: Query<Mate<'_>, With<Alive>>,
    mut scratch: Local<Vec<Neighbor>>,
    mut mated: Local<HashSet<Entity>>,
) {
    mated.clear();
    let rng = &mut rng.0;

    for (entity, position, class, sex, state, cooldown) in &agents {
        if !cooldown.is_ready() || mated.contains(&entity) {
            continue;
        }
        let infected = state.is_infected();
        let params = config.class_params(*class);

        let radius = params.interaction_radius(infected);
        grid.query_neighbors(position.x, position.y, radius, &mut scratch);
        for hit in scratch.iter() {
            let candidate = grid.entry(hit.handle);
            if candidate.entity == entity || candidate.class != *class {
                continue;
            }
            let Ok((partner, partner_pos, _, partner_sex, partner_state, partner_cooldown)) =
                agents.get(candidate.entity)
            else {
                continue;
            };
            if *partner_sex == *sex || !partner_cooldown.is_ready() || mated.contains(&partner) {
                continue;
            }

            if rng.gen::<f32>() >= params.offspring_probability(infected) {
                continue;
            }
            let count = offspring_count(rng, params.offspring_mean, params.offspring_stddev);
            if count == 0 {
                continue;
            }

            // One contagion draw covers the whole litter
            let litter_infected =
                infected && partner_state.is_infected() && rng.gen::<f32>() < params.p_infect;

            let midpoint = Position::new(
                (position.x + partner_pos.x) * 0.5,
                (position.y + partner_pos.y) * 0.5,
            );
            for _ in 0..count {
                let velocity = newborn_velocity(rng, config.min_speed, config.max_speed);
                let child_sex = random_sex(rng);
                pending.push(Mutation::Spawn(Offspring {
                    position: midpoint,
                    velocity,
                    class: *class,
                    sex: child_sex,
                    infected: litter_infected,
                    cooldown: config.reproduction_cooldown,
                }));
            }

            for parent in [entity, partner] {
                pending.push(Mutation::SetCooldown {
                    target: parent,
                    seconds: config.reproduction_cooldown,
                });
                mated.insert(parent);
            }
            break;
        }
    }
}
