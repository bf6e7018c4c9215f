//! Deferred Mutations
//!
//! Phase systems only read other agents and queue their intent here. The
//! queue is drained by `apply_pending_mutations` at every phase boundary.

use bevy_ecs::prelude::*;
use bevy_ecs::world::EntityWorldMut;

use crate::components::agent::{
    Alive, BoidBundle, EpidemicState, Heading, Health, Infection, Newborn, Position,
    ReproductionCooldown, Sex, SwarmClass, Velocity,
};
use crate::config::SimConfig;

/// A child waiting to be spawned at the end of the reproduction phase
#[derive(Debug, Clone, PartialEq)]
pub struct Offspring {
    pub position: Position,
    pub velocity: Velocity,
    pub class: SwarmClass,
    pub sex: Sex,
    pub infected: bool,
    pub cooldown: f32,
}

/// A queued state change
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Infect(Entity),
    Cure { target: Entity, next: EpidemicState },
    Recover { target: Entity, next: EpidemicState },
    Kill(Entity),
    Promote(Entity),
    SetCooldown { target: Entity, seconds: f32 },
    Spawn(Offspring),
}

/// Write buffer flushed between phases
#[derive(Resource, Debug, Default)]
pub struct PendingMutations {
    queue: Vec<Mutation>,
}

impl PendingMutations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mutation: Mutation) {
        self.queue.push(mutation);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn take(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.queue)
    }
}

/// What actually got applied during the current tick
#[derive(Resource, Debug, Clone, Copy, PartialEq, Default)]
pub struct TickTally {
    pub infections: u32,
    pub cures: u32,
    pub recoveries: u32,
    pub promotions: u32,
    /// Indexed by `SwarmClass::index()`
    pub deaths: [u32; 3],
    pub births: [u32; 3],
}

impl TickTally {
    pub fn total_deaths(&self) -> u32 {
        self.deaths.iter().sum()
    }

    pub fn total_births(&self) -> u32 {
        self.births.iter().sum()
    }

    fn merge(&mut self, other: &TickTally) {
        self.infections += other.infections;
        self.cures += other.cures;
        self.recoveries += other.recoveries;
        self.promotions += other.promotions;
        for i in 0..3 {
            self.deaths[i] += other.deaths[i];
            self.births[i] += other.births[i];
        }
    }
}

/// Drain the buffer, skipping any intent that went stale earlier in the batch.
pub fn apply_pending_mutations(world: &mut World) {
    let mutations = world.resource_mut::<PendingMutations>().take();
    if mutations.is_empty() {
        return;
    }

    let (t_death, lifespan) = {
        let config = world.resource::<SimConfig>();
        (config.t_death, config.lifespan)
    };

    let mut tally = TickTally::default();
    for mutation in mutations {
        apply_mutation(world, mutation, t_death, lifespan, &mut tally);
    }
    world.resource_mut::<TickTally>().merge(&tally);
}

fn live_agent(world: &mut World, entity: Entity) -> Option<EntityWorldMut<'_>> {
    world
        .get_entity_mut(entity)
        .filter(|agent| agent.contains::<Alive>())
}

fn apply_mutation(
    world: &mut World,
    mutation: Mutation,
    t_death: f32,
    lifespan: f32,
    tally: &mut TickTally,
) {
    match mutation {
        Mutation::Infect(target) => {
            let Some(mut agent) = live_agent(world, target) else {
                return;
            };
            if let Some(mut state) = agent.get_mut::<EpidemicState>() {
                if !state.is_infected() {
                    *state = EpidemicState::Infected(Infection::new(t_death));
                    tally.infections += 1;
                    tracing::trace!(?target, "infected");
                }
            }
        }
        Mutation::Cure { target, next } => clear_infection(world, target, next, true, tally),
        Mutation::Recover { target, next } => {
            clear_infection(world, target, next, false, tally)
        }
        Mutation::Kill(target) => {
            let Some(mut agent) = live_agent(world, target) else {
                return;
            };
            let class = agent.get::<SwarmClass>().copied().unwrap_or_default();
            agent.remove::<Alive>();
            tally.deaths[class.index()] += 1;
            tracing::trace!(?target, class = class.name(), "died");
        }
        Mutation::Promote(target) => {
            let Some(mut agent) = live_agent(world, target) else {
                return;
            };
            if let Some(mut class) = agent.get_mut::<SwarmClass>() {
                if *class == SwarmClass::Normal {
                    *class = SwarmClass::Doctor;
                    tally.promotions += 1;
                    tracing::trace!(?target, "promoted to doctor");
                }
            }
        }
        Mutation::SetCooldown { target, seconds } => {
            let Some(mut agent) = live_agent(world, target) else {
                return;
            };
            if let Some(mut cooldown) = agent.get_mut::<ReproductionCooldown>() {
                cooldown.0 = seconds.max(0.0);
            }
        }
        Mutation::Spawn(child) => {
            let epidemic = if child.infected {
                tally.infections += 1;
                EpidemicState::Infected(Infection::new(t_death))
            } else {
                EpidemicState::Susceptible
            };
            let entity = world
                .spawn((
                    BoidBundle {
                        alive: Alive,
                        position: child.position,
                        velocity: child.velocity,
                        heading: Heading {
                            angle: child.velocity.vy.atan2(child.velocity.vx),
                        },
                        class: child.class,
                        sex: child.sex,
                        health: Health {
                            age: 0.0,
                            lifespan,
                        },
                        epidemic,
                        cooldown: ReproductionCooldown(child.cooldown.max(0.0)),
                    },
                    Newborn,
                ))
                .id();
            tally.births[child.class.index()] += 1;
            tracing::trace!(?entity, class = child.class.name(), "born");
        }
    }
}

fn clear_infection(
    world: &mut World,
    target: Entity,
    next: EpidemicState,
    cured: bool,
    tally: &mut TickTally,
) {
    let Some(mut agent) = live_agent(world, target) else {
        return;
    };
    if let Some(mut state) = agent.get_mut::<EpidemicState>() {
        if state.is_infected() {
            *state = next;
            if cured {
                tally.cures += 1;
            } else {
                tally.recoveries += 1;
            }
            tracing::trace!(?target, cured, "infection cleared");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::agent::Immunity;

    fn test_world() -> World {
        let mut world = World::new();
        world.insert_resource(SimConfig::default());
        world.insert_resource(PendingMutations::new());
        world.insert_resource(TickTally::default());
        world
    }

    fn spawn(world: &mut World, class: SwarmClass, epidemic: EpidemicState) -> Entity {
        world
            .spawn(BoidBundle {
                alive: Alive,
                position: Position::new(10.0, 10.0),
                velocity: Velocity::new(1.0, 0.0),
                heading: Heading::default(),
                class,
                sex: Sex::Female,
                health: Health {
                    age: 0.0,
                    lifespan: 60.0,
                },
                epidemic,
                cooldown: ReproductionCooldown(0.0),
            })
            .id()
    }

    fn queue(world: &mut World, mutations: Vec<Mutation>) {
        let mut pending = world.resource_mut::<PendingMutations>();
        for mutation in mutations {
            pending.push(mutation);
        }
    }

    #[test]
    fn test_double_infection_applies_once() {
        let mut world = test_world();
        let target = spawn(&mut world, SwarmClass::Normal, EpidemicState::Susceptible);
        queue(&mut world, vec![Mutation::Infect(target), Mutation::Infect(target)]);

        apply_pending_mutations(&mut world);

        assert!(world.get::<EpidemicState>(target).is_some_and(|s| s.is_infected()));
        assert_eq!(world.resource::<TickTally>().infections, 1);
        assert!(world.resource::<PendingMutations>().is_empty());
    }

    #[test]
    fn test_cure_skips_healthy_target() {
        let mut world = test_world();
        let target = spawn(&mut world, SwarmClass::Normal, EpidemicState::Susceptible);
        let next = EpidemicState::Recovered(Immunity::new(1.0));
        queue(&mut world, vec![Mutation::Cure { target, next }]);

        apply_pending_mutations(&mut world);

        assert_eq!(
            world.get::<EpidemicState>(target),
            Some(&EpidemicState::Susceptible)
        );
        assert_eq!(world.resource::<TickTally>().cures, 0);
    }

    #[test]
    fn test_kill_clears_alive_and_blocks_later_intent() {
        let mut world = test_world();
        let target = spawn(&mut world, SwarmClass::Normal, EpidemicState::Susceptible);
        queue(
            &mut world,
            vec![
                Mutation::Kill(target),
                Mutation::Promote(target),
                Mutation::Kill(target),
            ],
        );

        apply_pending_mutations(&mut world);

        assert!(!world.entity(target).contains::<Alive>());
        assert_eq!(world.get::<SwarmClass>(target), Some(&SwarmClass::Normal));
        let tally = world.resource::<TickTally>();
        assert_eq!(tally.deaths, [1, 0, 0]);
        assert_eq!(tally.promotions, 0);
    }

    #[test]
    fn test_promote_only_normal() {
        let mut world = test_world();
        let normal = spawn(&mut world, SwarmClass::Normal, EpidemicState::Susceptible);
        let antivax = spawn(&mut world, SwarmClass::Antivax, EpidemicState::Susceptible);
        queue(
            &mut world,
            vec![Mutation::Promote(normal), Mutation::Promote(antivax)],
        );

        apply_pending_mutations(&mut world);

        assert_eq!(world.get::<SwarmClass>(normal), Some(&SwarmClass::Doctor));
        assert_eq!(world.get::<SwarmClass>(antivax), Some(&SwarmClass::Antivax));
    }

    #[test]
    fn test_spawn_creates_live_child() {
        let mut world = test_world();
        queue(
            &mut world,
            vec![Mutation::Spawn(Offspring {
                position: Position::new(5.0, 6.0),
                velocity: Velocity::new(0.0, 2.0),
                class: SwarmClass::Doctor,
                sex: Sex::Male,
                infected: true,
                cooldown: 5.0,
            })],
        );

        apply_pending_mutations(&mut world);

        let mut children = world.query_filtered::<
            (&SwarmClass, &EpidemicState, &ReproductionCooldown, &Heading),
            With<Newborn>,
        >();
        let (class, state, cooldown, heading) = children.single(&world);
        assert_eq!(*class, SwarmClass::Doctor);
        assert!(state.is_infected());
        assert_eq!(cooldown.0, 5.0);
        assert!((heading.angle - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        assert_eq!(world.resource::<TickTally>().births, [0, 1, 0]);
    }
}
