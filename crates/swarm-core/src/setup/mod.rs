//! Population Setup
//!
//! Spawning of the initial population and of individually specified agents.

use std::f32::consts::TAU;

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;
use rand::Rng;

use crate::components::agent::{
    Alive, BoidBundle, EpidemicState, Heading, Health, Infection, Position, ReproductionCooldown,
    Sex, SwarmClass, Velocity,
};
use crate::config::SimConfig;

/// Everything needed to place one specific agent
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSpec {
    pub position: Position,
    pub velocity: Velocity,
    pub class: SwarmClass,
    pub sex: Sex,
    pub epidemic: EpidemicState,
    pub age: f32,
    pub cooldown: f32,
}

impl AgentSpec {
    /// A stationary, healthy newborn at `(x, y)`
    pub fn new(class: SwarmClass, sex: Sex, x: f32, y: f32) -> Self {
        Self {
            position: Position::new(x, y),
            velocity: Velocity::default(),
            class,
            sex,
            epidemic: EpidemicState::Susceptible,
            age: 0.0,
            cooldown: 0.0,
        }
    }

    pub fn with_velocity(mut self, vx: f32, vy: f32) -> Self {
        self.velocity = Velocity::new(vx, vy);
        self
    }

    pub fn with_epidemic(mut self, epidemic: EpidemicState) -> Self {
        self.epidemic = epidemic;
        self
    }

    /// Freshly infected, resolving after `time_to_death` seconds
    pub fn infected(self, time_to_death: f32) -> Self {
        self.with_epidemic(EpidemicState::Infected(Infection::new(time_to_death)))
    }

    pub fn with_age(mut self, age: f32) -> Self {
        self.age = age;
        self
    }

    pub fn with_cooldown(mut self, cooldown: f32) -> Self {
        self.cooldown = cooldown;
        self
    }

    fn into_bundle(self, lifespan: f32) -> BoidBundle {
        let angle = if self.velocity.speed() > 0.0 {
            self.velocity.vy.atan2(self.velocity.vx)
        } else {
            0.0
        };
        BoidBundle {
            alive: Alive,
            position: self.position,
            velocity: self.velocity,
            heading: Heading { angle },
            class: self.class,
            sex: self.sex,
            health: Health {
                age: self.age,
                lifespan,
            },
            epidemic: self.epidemic,
            cooldown: ReproductionCooldown(self.cooldown.max(0.0)),
        }
    }
}

/// Head count of a spawn pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpawnSummary {
    pub normal: u32,
    pub doctor: u32,
    pub antivax: u32,
    pub infected: u32,
}

impl SpawnSummary {
    pub fn total(&self) -> u32 {
        self.normal + self.doctor + self.antivax
    }

    fn record(&mut self, class: SwarmClass, infected: bool) {
        match class {
            SwarmClass::Normal => self.normal += 1,
            SwarmClass::Doctor => self.doctor += 1,
            SwarmClass::Antivax => self.antivax += 1,
        }
        if infected {
            self.infected += 1;
        }
    }
}

/// Spawn one agent exactly as described
pub fn spawn_agent(world: &mut World, spec: AgentSpec, lifespan: f32) -> Entity {
    world.spawn(spec.into_bundle(lifespan)).id()
}

fn random_spec(rng: &mut SmallRng, config: &SimConfig, class: SwarmClass) -> AgentSpec {
    let x = rng.gen_range(0.0..config.world_width);
    let y = rng.gen_range(0.0..config.world_height);
    let angle = rng.gen_range(0.0..TAU);
    let sex = if rng.gen_bool(0.5) { Sex::Male } else { Sex::Female };
    let p_initial_infect = match class {
        SwarmClass::Doctor => config.p_initial_infect_doctor,
        SwarmClass::Normal | SwarmClass::Antivax => config.p_initial_infect_normal,
    };

    let mut spec = AgentSpec::new(class, sex, x, y);
    spec.velocity = Velocity::from_angle(angle, config.max_speed);
    if rng.gen::<f32>() < p_initial_infect {
        spec = spec.infected(config.t_death);
    }
    spec
}

/// Spawn the configured starting population.
///
/// Each of the `initial_normal_count` agents turns antivax with probability
/// `p_antivax`; `initial_antivax_count` more are antivax outright.
pub fn spawn_initial_population(
    world: &mut World,
    rng: &mut SmallRng,
    config: &SimConfig,
) -> SpawnSummary {
    let mut classes = Vec::new();
    for _ in 0..config.initial_normal_count {
        let class = if rng.gen::<f32>() < config.p_antivax {
            SwarmClass::Antivax
        } else {
            SwarmClass::Normal
        };
        classes.push(class);
    }
    classes.extend((0..config.initial_antivax_count).map(|_| SwarmClass::Antivax));
    classes.extend((0..config.initial_doctor_count).map(|_| SwarmClass::Doctor));

    let mut summary = SpawnSummary::default();
    for class in classes {
        let spec = random_spec(rng, config, class);
        summary.record(class, spec.epidemic.is_infected());
        spawn_agent(world, spec, config.lifespan);
    }
    summary
}
