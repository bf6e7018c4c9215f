//! Lifecycle Systems
//!
//! Aging, per-agent timers, Normal -> Doctor promotion and removal of the dead.

use bevy_ecs::prelude::*;
use rand::Rng;

use crate::components::agent::{
    Alive, EpidemicState, Health, Newborn, ReproductionCooldown, SwarmClass,
};
use crate::config::SimConfig;
use crate::SimRng;

use super::mutations::{Mutation, PendingMutations};
use super::TickClock;

/// Advance age, reproduction cooldown, infection timer and immunity decay.
///
/// Only an agent's own state changes here, so nothing is deferred.
pub fn age_agents(
    config: Res<SimConfig>,
    clock: Res<TickClock>,
    mut agents: Query<(&mut Health, &mut ReproductionCooldown, &mut EpidemicState), With<Alive>>,
) {
    let dt = clock.dt;
    for (mut health, mut cooldown, mut state) in &mut agents {
        health.age += dt;
        if !cooldown.is_ready() {
            cooldown.tick(dt);
        }

        let lapsed = match &mut *state {
            EpidemicState::Infected(infection) => {
                infection.time_infected += dt;
                false
            }
            EpidemicState::Recovered(immunity) => !immunity.decay(dt, config.t_immunity),
            EpidemicState::Susceptible => false,
        };
        if lapsed {
            *state = EpidemicState::Susceptible;
        }
    }
}

/// Adult Normal agents may become doctors
pub fn promote_doctors(
    config: Res<SimConfig>,
    mut rng: ResMut<SimRng>,
    mut pending: ResMut<PendingMutations>,
    agents: Query<(Entity, &Health, &SwarmClass), (With<Alive>, Without<Newborn>)>,
) {
    for (entity, health, class) in &agents {
        if *class != SwarmClass::Normal || health.age < config.t_adult {
            continue;
        }
        if rng.0.gen::<f32>() < config.p_become_doctor {
            pending.push(Mutation::Promote(entity));
        }
    }
}

/// Despawn agents that died last tick, after their final statistics pass,
/// and let last tick's newborns join in.
pub fn cleanup_dead(
    mut commands: Commands,
    dead: Query<Entity, (With<SwarmClass>, Without<Alive>)>,
    newborns: Query<Entity, (With<Newborn>, With<Alive>)>,
) {
    for entity in &dead {
        commands.entity(entity).despawn();
    }
    for entity in &newborns {
        commands.entity(entity).remove::<Newborn>();
    }
}
