//! Configuration System
//!
//! Loads tuning parameters from a TOML file. Every field has a default, so a
//! tuning file only needs to list the values it overrides.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::components::SwarmClass;

/// Default tuning file path
pub const DEFAULT_TUNING_PATH: &str = "swarm.toml";

/// World boundary behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Toroidal world: leaving one edge re-enters from the opposite edge
    Wrap,
    /// Reflect off the walls and negate the offending velocity component
    #[default]
    Bounce,
}

/// Which neighbors an infected agent can pass the infection to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransmissionPolicy {
    /// Only agents of the spreader's own swarm class
    #[default]
    SameClass,
    /// Any living agent regardless of swarm class
    AnyClass,
}

/// All tunable simulation parameters.
///
/// Read-only during a tick. Times are in seconds, radii and extents in world
/// units, speeds in world units per second.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Seed for the shared simulation RNG
    pub seed: u64,

    // Initial infection probabilities
    pub p_initial_infect_normal: f32,
    pub p_initial_infect_doctor: f32,

    // Interaction infection probabilities
    pub p_infect_normal: f32,
    pub p_infect_doctor: f32,
    pub transmission: TransmissionPolicy,

    // Reproduction
    pub p_offspring_normal: f32,
    pub p_offspring_doctor: f32,
    pub offspring_mean_normal: f32,
    pub offspring_stddev_normal: f32,
    pub offspring_mean_doctor: f32,
    pub offspring_stddev_doctor: f32,
    pub reproduction_cooldown: f32,

    // Cure and caste transitions
    pub p_cure: f32,
    pub p_become_doctor: f32,
    pub p_antivax: f32,

    // Interaction radii
    pub r_interact_normal: f32,
    pub r_interact_doctor: f32,

    // Time parameters
    pub t_death: f32,
    pub t_adult: f32,
    pub lifespan: f32,
    pub die_of_old_age: bool,

    // SIRS immunity extension
    pub immunity_enabled: bool,
    pub p_death_infected: f32,
    pub t_immunity: f32,
    pub cure_immunity_level: f32,

    // World
    pub world_width: f32,
    pub world_height: f32,
    pub boundary: BoundaryPolicy,

    // Initial population
    pub initial_normal_count: u32,
    pub initial_doctor_count: u32,
    pub initial_antivax_count: u32,

    // Flocking
    pub max_speed: f32,
    pub max_force: f32,
    pub min_speed: f32,
    pub separation_weight: f32,
    pub alignment_weight: f32,
    pub cohesion_weight: f32,
    pub separation_radius: f32,
    pub alignment_radius: f32,
    pub cohesion_radius: f32,
    /// Half of the perception cone in radians; `None` perceives all around
    pub fov_half_angle: Option<f32>,

    // Debuffs applied while the acting agent is itself infected
    pub debuff_p_cure_infected: f32,
    pub debuff_r_interact_doctor_infected: f32,
    pub debuff_p_offspring_doctor_infected: f32,
    pub debuff_p_infect_doctor_infected: f32,
    pub debuff_r_interact_normal_infected: f32,
    pub debuff_p_offspring_normal_infected: f32,
    pub debuff_p_infect_normal_infected: f32,

    // Antivax avoidance
    pub antivax_repulsion_radius: f32,
    pub antivax_repulsion_weight: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            p_initial_infect_normal: 0.05,
            p_initial_infect_doctor: 0.02,
            p_infect_normal: 0.5,
            p_infect_doctor: 0.5,
            transmission: TransmissionPolicy::SameClass,
            p_offspring_normal: 0.4,
            p_offspring_doctor: 0.05,
            offspring_mean_normal: 2.0,
            offspring_stddev_normal: 1.0,
            offspring_mean_doctor: 1.0,
            offspring_stddev_doctor: 1.0,
            reproduction_cooldown: 5.0,
            p_cure: 0.8,
            p_become_doctor: 0.05,
            p_antivax: 0.1,
            r_interact_normal: 30.0,
            r_interact_doctor: 40.0,
            t_death: 5.0,
            t_adult: 8.33,
            lifespan: 60.0,
            die_of_old_age: false,
            immunity_enabled: true,
            p_death_infected: 0.5,
            t_immunity: 10.0,
            cure_immunity_level: 1.0,
            world_width: 1920.0,
            world_height: 1080.0,
            boundary: BoundaryPolicy::Bounce,
            initial_normal_count: 200,
            initial_doctor_count: 10,
            initial_antivax_count: 0,
            max_speed: 180.0,
            max_force: 180.0,
            min_speed: 54.0,
            separation_weight: 1.5,
            alignment_weight: 1.0,
            cohesion_weight: 1.0,
            separation_radius: 25.0,
            alignment_radius: 50.0,
            cohesion_radius: 50.0,
            fov_half_angle: None,
            debuff_p_cure_infected: 0.5,
            debuff_r_interact_doctor_infected: 0.7,
            debuff_p_offspring_doctor_infected: 0.5,
            debuff_p_infect_doctor_infected: 1.0,
            debuff_r_interact_normal_infected: 0.8,
            debuff_p_offspring_normal_infected: 0.5,
            debuff_p_infect_normal_infected: 1.0,
            antivax_repulsion_radius: 100.0,
            antivax_repulsion_weight: 3.0,
        }
    }
}

/// Interaction parameters resolved for one swarm class.
///
/// Antivax agents share the normal parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassParams {
    pub r_interact: f32,
    pub debuff_r_interact_infected: f32,
    pub p_infect: f32,
    pub debuff_p_infect_infected: f32,
    pub p_offspring: f32,
    pub debuff_p_offspring_infected: f32,
    pub offspring_mean: f32,
    pub offspring_stddev: f32,
}

impl ClassParams {
    /// Interaction radius, shrunk while the agent is infected
    pub fn interaction_radius(&self, infected: bool) -> f32 {
        if infected {
            self.r_interact * self.debuff_r_interact_infected
        } else {
            self.r_interact
        }
    }

    /// Probability of passing the infection on, reduced while sick
    pub fn infect_probability(&self, infected: bool) -> f32 {
        if infected {
            self.p_infect * self.debuff_p_infect_infected
        } else {
            self.p_infect
        }
    }

    /// Probability of a successful mating, reduced while sick
    pub fn offspring_probability(&self, infected: bool) -> f32 {
        if infected {
            self.p_offspring * self.debuff_p_offspring_infected
        } else {
            self.p_offspring
        }
    }
}

impl SimConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `path`, or use defaults if it cannot be loaded
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Could not load {}: {}. Using defaults.", path.display(), e);
            Self::default()
        })
    }

    /// Serialize to a TOML document
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Parameters for the given swarm class
    pub fn class_params(&self, class: SwarmClass) -> ClassParams {
        match class {
            SwarmClass::Doctor => ClassParams {
                r_interact: self.r_interact_doctor,
                debuff_r_interact_infected: self.debuff_r_interact_doctor_infected,
                p_infect: self.p_infect_doctor,
                debuff_p_infect_infected: self.debuff_p_infect_doctor_infected,
                p_offspring: self.p_offspring_doctor,
                debuff_p_offspring_infected: self.debuff_p_offspring_doctor_infected,
                offspring_mean: self.offspring_mean_doctor,
                offspring_stddev: self.offspring_stddev_doctor,
            },
            SwarmClass::Normal | SwarmClass::Antivax => ClassParams {
                r_interact: self.r_interact_normal,
                debuff_r_interact_infected: self.debuff_r_interact_normal_infected,
                p_infect: self.p_infect_normal,
                debuff_p_infect_infected: self.debuff_p_infect_normal_infected,
                p_offspring: self.p_offspring_normal,
                debuff_p_offspring_infected: self.debuff_p_offspring_normal_infected,
                offspring_mean: self.offspring_mean_normal,
                offspring_stddev: self.offspring_stddev_normal,
            },
        }
    }

    /// Grid cell edge: the largest interaction radius in use
    pub fn grid_cell_size(&self) -> f32 {
        self.r_interact_normal.max(self.r_interact_doctor)
    }

    /// Cure probability for a doctor, reduced while the doctor is infected
    pub fn cure_probability(&self, doctor_infected: bool) -> f32 {
        if doctor_infected {
            self.p_cure * self.debuff_p_cure_infected
        } else {
            self.p_cure
        }
    }

    /// Reject configurations the tick pipeline cannot run.
    ///
    /// Ticks never re-check these; this is the only gate.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let probabilities = [
            ("p_initial_infect_normal", self.p_initial_infect_normal),
            ("p_initial_infect_doctor", self.p_initial_infect_doctor),
            ("p_infect_normal", self.p_infect_normal),
            ("p_infect_doctor", self.p_infect_doctor),
            ("p_offspring_normal", self.p_offspring_normal),
            ("p_offspring_doctor", self.p_offspring_doctor),
            ("p_cure", self.p_cure),
            ("p_become_doctor", self.p_become_doctor),
            ("p_antivax", self.p_antivax),
            ("p_death_infected", self.p_death_infected),
            ("cure_immunity_level", self.cure_immunity_level),
            ("debuff_p_cure_infected", self.debuff_p_cure_infected),
            ("debuff_p_offspring_doctor_infected", self.debuff_p_offspring_doctor_infected),
            ("debuff_p_offspring_normal_infected", self.debuff_p_offspring_normal_infected),
            ("debuff_p_infect_doctor_infected", self.debuff_p_infect_doctor_infected),
            ("debuff_p_infect_normal_infected", self.debuff_p_infect_normal_infected),
        ];
        for (field, value) in probabilities {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::invalid(field, "must be a probability in [0, 1]"));
            }
        }

        let positive = [
            ("world_width", self.world_width),
            ("world_height", self.world_height),
            ("r_interact_normal", self.r_interact_normal),
            ("r_interact_doctor", self.r_interact_doctor),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::invalid(field, "must be finite and greater than zero"));
            }
        }

        let non_negative = [
            ("offspring_mean_normal", self.offspring_mean_normal),
            ("offspring_stddev_normal", self.offspring_stddev_normal),
            ("offspring_mean_doctor", self.offspring_mean_doctor),
            ("offspring_stddev_doctor", self.offspring_stddev_doctor),
            ("reproduction_cooldown", self.reproduction_cooldown),
            ("t_death", self.t_death),
            ("t_adult", self.t_adult),
            ("lifespan", self.lifespan),
            ("t_immunity", self.t_immunity),
            ("max_speed", self.max_speed),
            ("max_force", self.max_force),
            ("min_speed", self.min_speed),
            ("separation_weight", self.separation_weight),
            ("alignment_weight", self.alignment_weight),
            ("cohesion_weight", self.cohesion_weight),
            ("separation_radius", self.separation_radius),
            ("alignment_radius", self.alignment_radius),
            ("cohesion_radius", self.cohesion_radius),
            ("debuff_r_interact_doctor_infected", self.debuff_r_interact_doctor_infected),
            ("debuff_r_interact_normal_infected", self.debuff_r_interact_normal_infected),
            ("antivax_repulsion_radius", self.antivax_repulsion_radius),
            ("antivax_repulsion_weight", self.antivax_repulsion_weight),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::invalid(field, "must be finite and non-negative"));
            }
        }

        if let Some(half_angle) = self.fov_half_angle {
            if !half_angle.is_finite() || half_angle <= 0.0 {
                return Err(ConfigError::invalid(
                    "fov_half_angle",
                    "must be finite and greater than zero",
                ));
            }
        }

        Ok(())
    }
}

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: &'static str) -> Self {
        ConfigError::Invalid { field, reason }
    }
}
