//! Agent Components
//!
//! Components for individual boids: kinematics, caste, sex, age and epidemic state.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Marker component for a living agent.
///
/// Removed on death; the entity lingers for one statistics pass and is
/// despawned at the start of the next tick.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Alive;

/// Marks an agent spawned during the current tick. Later phases of that
/// tick skip it; the marker is cleared when the next tick starts.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Newborn;

/// World position
#[derive(Component, Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Velocity in world units per second
#[derive(Component, Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub vx: f32,
    pub vy: f32,
}

impl Velocity {
    pub fn new(vx: f32, vy: f32) -> Self {
        Self { vx, vy }
    }

    pub fn from_angle(angle: f32, speed: f32) -> Self {
        Self {
            vx: speed * angle.cos(),
            vy: speed * angle.sin(),
        }
    }

    pub fn speed(&self) -> f32 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }
}

/// Facing angle in radians
#[derive(Component, Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Heading {
    pub angle: f32,
}

/// Swarm caste. Exactly one per agent; only Normal -> Doctor may change.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SwarmClass {
    #[default]
    Normal,
    Doctor,
    Antivax,
}

impl SwarmClass {
    pub const ALL: [SwarmClass; 3] = [SwarmClass::Normal, SwarmClass::Doctor, SwarmClass::Antivax];

    pub fn index(self) -> usize {
        match self {
            SwarmClass::Normal => 0,
            SwarmClass::Doctor => 1,
            SwarmClass::Antivax => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SwarmClass::Normal => "normal",
            SwarmClass::Doctor => "doctor",
            SwarmClass::Antivax => "antivax",
        }
    }
}

/// Biological sex, fixed at spawn
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub fn is_male(self) -> bool {
        matches!(self, Sex::Male)
    }
}

/// Age and expected lifespan in seconds
#[derive(Component, Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Health {
    pub age: f32,
    pub lifespan: f32,
}

/// An active infection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Infection {
    /// Seconds since infection
    pub time_infected: f32,
    /// Seconds after which the infection resolves
    pub time_to_death: f32,
}

impl Infection {
    pub fn new(time_to_death: f32) -> Self {
        Self {
            time_infected: 0.0,
            time_to_death,
        }
    }

    pub fn expired(&self) -> bool {
        self.time_infected >= self.time_to_death
    }
}

/// Post-infection immunity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Immunity {
    /// Protection in [0, 1]; decays linearly to zero
    pub level: f32,
    pub time_since_recovery: f32,
}

impl Immunity {
    pub fn new(level: f32) -> Self {
        Self {
            level: level.clamp(0.0, 1.0),
            time_since_recovery: 0.0,
        }
    }

    /// Advance the decay clock. Returns false once the immunity has run out.
    ///
    /// Decay is linear from the level granted at recovery, reaching zero
    /// exactly `t_immunity` seconds after recovery for full immunity.
    pub fn decay(&mut self, dt: f32, t_immunity: f32) -> bool {
        self.time_since_recovery += dt;
        if t_immunity <= 0.0 {
            self.level = 0.0;
            return false;
        }
        let next = (1.0 - self.time_since_recovery / t_immunity).max(0.0);
        self.level = self.level.min(next);
        self.level > 0.0
    }
}

/// Epidemic state of an agent.
///
/// Infection and immunity are exclusive by construction.
#[derive(Component, Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum EpidemicState {
    #[default]
    Susceptible,
    Infected(Infection),
    Recovered(Immunity),
}

impl EpidemicState {
    pub fn is_infected(&self) -> bool {
        matches!(self, EpidemicState::Infected(_))
    }

    pub fn infection(&self) -> Option<&Infection> {
        match self {
            EpidemicState::Infected(infection) => Some(infection),
            _ => None,
        }
    }

    pub fn immunity(&self) -> Option<&Immunity> {
        match self {
            EpidemicState::Recovered(immunity) => Some(immunity),
            _ => None,
        }
    }

    /// Fraction of an infection attempt that gets through: 0 for an already
    /// infected agent, `1 - level` for partial immunity, 1 otherwise.
    pub fn susceptibility(&self) -> f32 {
        match self {
            EpidemicState::Susceptible => 1.0,
            EpidemicState::Infected(_) => 0.0,
            EpidemicState::Recovered(immunity) => (1.0 - immunity.level).clamp(0.0, 1.0),
        }
    }
}

/// Seconds remaining before the agent may reproduce again
#[derive(Component, Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ReproductionCooldown(pub f32);

impl ReproductionCooldown {
    pub fn is_ready(&self) -> bool {
        self.0 <= 0.0
    }

    pub fn tick(&mut self, dt: f32) {
        self.0 = (self.0 - dt).max(0.0);
    }
}

/// Everything needed to spawn one agent
#[derive(Bundle, Debug, Clone)]
pub struct BoidBundle {
    pub alive: Alive,
    pub position: Position,
    pub velocity: Velocity,
    pub heading: Heading,
    pub class: SwarmClass,
    pub sex: Sex,
    pub health: Health,
    pub epidemic: EpidemicState,
    pub cooldown: ReproductionCooldown,
}
