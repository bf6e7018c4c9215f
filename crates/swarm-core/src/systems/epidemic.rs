//! Epidemic Systems
//!
//! Proximity-gated infection and cure, plus resolution of expired infections.
//! Every state change is queued in `PendingMutations`.

use bevy_ecs::prelude::*;
use rand::Rng;

use crate::components::agent::{
    Alive, EpidemicState, Health, Immunity, Newborn, Position, SwarmClass,
};
use crate::config::{SimConfig, TransmissionPolicy};
use crate::spatial::{Neighbor, SpatialGrid};
use crate::SimRng;

use super::mutations::{Mutation, PendingMutations};

/// State an agent moves to when a doctor cures it
pub fn cured_state(config: &SimConfig) -> EpidemicState {
    if config.immunity_enabled && config.cure_immunity_level > 0.0 {
        EpidemicState::Recovered(Immunity::new(config.cure_immunity_level))
    } else {
        EpidemicState::Susceptible
    }
}

/// Whether a spreader of class `from` may infect an agent of class `to`
pub fn can_transmit(policy: TransmissionPolicy, from: SwarmClass, to: SwarmClass) -> bool {
    match policy {
        TransmissionPolicy::SameClass => from == to,
        TransmissionPolicy::AnyClass => true,
    }
}

/// Infected agents try to infect susceptible neighbors
pub fn spread_infection(
    config: Res<SimConfig>,
    grid: Res<SpatialGrid>,
    mut rng: ResMut<SimRng>,
    mut pending: ResMut<PendingMutations>,
    agents: Query<(Entity, &Position, &SwarmClass, &EpidemicState), With<Alive>>,
    mut scratch: Local<Vec<Neighbor>>,
) {
    for (entity, position, class, state) in &agents {
        if !state.is_infected() {
            continue;
        }
        let params = config.class_params(*class);
        let radius = params.interaction_radius(true);
        let p_infect = params.infect_probability(true);

        grid.query_neighbors(position.x, position.y, radius, &mut scratch);
        for hit in scratch.iter() {
            let target = grid.entry(hit.handle);
            if target.entity == entity || !can_transmit(config.transmission, *class, target.class) {
                continue;
            }
            let Ok((_, _, _, target_state)) = agents.get(target.entity) else {
                continue;
            };
            let susceptibility = target_state.susceptibility();
            if susceptibility <= 0.0 {
                continue;
            }
            if rng.0.gen::<f32>() < p_infect * susceptibility {
                pending.push(Mutation::Infect(target.entity));
            }
        }
    }
}

/// Doctors try to cure infected neighbors other than themselves
pub fn cure_infections(
    config: Res<SimConfig>,
    grid: Res<SpatialGrid>,
    mut rng: ResMut<SimRng>,
    mut pending: ResMut<PendingMutations>,
    agents: Query<(Entity, &Position, &SwarmClass, &EpidemicState), With<Alive>>,
    mut scratch: Local<Vec<Neighbor>>,
) {
    let next = cured_state(&config);
    for (entity, position, class, state) in &agents {
        if *class != SwarmClass::Doctor {
            continue;
        }
        let sick = state.is_infected();
        let radius = config.class_params(SwarmClass::Doctor).interaction_radius(sick);
        let p_cure = config.cure_probability(sick);

        grid.query_neighbors(position.x, position.y, radius, &mut scratch);
        for hit in scratch.iter() {
            let target = grid.entry(hit.handle).entity;
            if target == entity {
                continue;
            }
            let Ok((_, _, _, target_state)) = agents.get(target) else {
                continue;
            };
            if !target_state.is_infected() {
                continue;
            }
            if rng.0.gen::<f32>() < p_cure {
                pending.push(Mutation::Cure { target, next });
            }
        }
    }
}

/// Expired infections kill or leave full immunity; old age kills when enabled
pub fn resolve_deaths(
    config: Res<SimConfig>,
    mut rng: ResMut<SimRng>,
    mut pending: ResMut<PendingMutations>,
    agents: Query<(Entity, &Health, &EpidemicState), (With<Alive>, Without<Newborn>)>,
) {
    for (entity, health, state) in &agents {
        if let Some(infection) = state.infection() {
            if infection.expired() {
                if !config.immunity_enabled || rng.0.gen::<f32>() < config.p_death_infected {
                    pending.push(Mutation::Kill(entity));
                } else {
                    pending.push(Mutation::Recover {
                        target: entity,
                        next: EpidemicState::Recovered(Immunity::new(1.0)),
                    });
                }
                continue;
            }
        }
        if config.die_of_old_age && health.age >= health.lifespan {
            pending.push(Mutation::Kill(entity));
        }
    }
}
