//! Tick Orchestrator
//!
//! `Simulation` owns the ECS world and the fixed-order tick schedule. It is
//! the only entry point a host loop needs.

use bevy_ecs::prelude::*;
use bevy_ecs::world::EntityRef;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::components::agent::{
    Alive, EpidemicState, Heading, Health, Position, ReproductionCooldown, Sex, SwarmClass,
    Velocity,
};
use crate::config::{ConfigError, SimConfig};
use crate::output::{PopulationHistory, SimStats};
use crate::setup::{spawn_agent, spawn_initial_population, AgentSpec};
use crate::spatial::SpatialGrid;
use crate::systems::{build_tick_schedule, PendingMutations, TickClock, TickTally};
use crate::SimRng;

/// Errors surfaced to the host
#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to write snapshot: {0}")]
    SnapshotIo(#[from] std::io::Error),

    #[error("failed to encode snapshot: {0}")]
    SnapshotEncode(#[from] serde_json::Error),
}

/// Read-only copy of one agent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentView {
    #[serde(skip)]
    pub entity: Entity,
    pub alive: bool,
    pub position: Position,
    pub velocity: Velocity,
    pub heading: f32,
    pub class: SwarmClass,
    pub sex: Sex,
    pub age: f32,
    pub epidemic: EpidemicState,
    pub cooldown: f32,
}

impl AgentView {
    fn from_entity(agent: EntityRef<'_>) -> Option<Self> {
        Some(Self {
            entity: agent.id(),
            alive: agent.contains::<Alive>(),
            position: *agent.get::<Position>()?,
            velocity: *agent.get::<Velocity>()?,
            heading: agent.get::<Heading>().map(|h| h.angle).unwrap_or_default(),
            class: *agent.get::<SwarmClass>()?,
            sex: *agent.get::<Sex>()?,
            age: agent.get::<Health>().map(|h| h.age).unwrap_or_default(),
            epidemic: *agent.get::<EpidemicState>()?,
            cooldown: agent
                .get::<ReproductionCooldown>()
                .map(|c| c.0)
                .unwrap_or_default(),
        })
    }
}

pub struct Simulation {
    world: World,
    schedule: Schedule,
}

impl Simulation {
    /// Validate `config`, seed the RNG and spawn the initial population
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;
        let mut sim = Self {
            world: World::new(),
            schedule: build_tick_schedule(),
        };
        sim.world.insert_resource(config);
        sim.populate();
        Ok(sim)
    }

    /// Start over from the current config: same seed, fresh population
    pub fn reset(&mut self) {
        let agents: Vec<Entity> = self
            .world
            .iter_entities()
            .filter(|agent| agent.contains::<SwarmClass>())
            .map(|agent| agent.id())
            .collect();
        for entity in agents {
            self.world.despawn(entity);
        }
        self.populate();
    }

    /// Install fresh per-run resources and spawn the starting agents
    fn populate(&mut self) {
        let config = self.world.resource::<SimConfig>().clone();
        let grid = SpatialGrid::new(
            config.world_width,
            config.world_height,
            config.grid_cell_size(),
        );
        let (cols, rows) = (grid.cols(), grid.rows());

        self.world.insert_resource(grid);
        self.world.insert_resource(TickClock::default());
        self.world.insert_resource(PendingMutations::new());
        self.world.insert_resource(TickTally::default());
        self.world.insert_resource(SimStats::default());
        self.world.insert_resource(PopulationHistory::new());

        let mut rng = SmallRng::seed_from_u64(config.seed);
        let summary = spawn_initial_population(&mut self.world, &mut rng, &config);
        self.world.insert_resource(SimRng(rng));

        info!(
            seed = config.seed,
            normal = summary.normal,
            doctor = summary.doctor,
            antivax = summary.antivax,
            infected = summary.infected,
            grid_cols = cols,
            grid_rows = rows,
            "Spawned initial population"
        );
    }

    /// Run the whole phase pipeline once.
    ///
    /// A non-finite or non-positive `dt` leaves the world untouched.
    pub fn advance_tick(&mut self, dt: f32) -> &SimStats {
        if !dt.is_finite() || dt <= 0.0 {
            warn!(dt, "Ignoring tick with invalid dt");
            return self.stats();
        }

        {
            let mut clock = self.world.resource_mut::<TickClock>();
            clock.dt = dt;
            clock.tick += 1;
            clock.elapsed += dt as f64;
        }
        self.schedule.run(&mut self.world);

        let stats = self.world.resource::<SimStats>();
        debug!(
            tick = stats.tick,
            population = stats.population(),
            infected = stats.infected,
            births = stats.born_this_tick,
            deaths = stats.dead_this_tick,
            "Tick complete"
        );
        stats
    }

    /// Place a specific agent; it takes part from the next tick on
    pub fn spawn_agent(&mut self, spec: AgentSpec) -> Entity {
        let lifespan = self.world.resource::<SimConfig>().lifespan;
        spawn_agent(&mut self.world, spec, lifespan)
    }

    /// Swap in a new config between ticks. The grid is rebuilt when its
    /// geometry changes; the RNG and population are kept.
    pub fn set_config(&mut self, config: SimConfig) -> Result<(), SimError> {
        config.validate()?;
        let cell_size = config.grid_cell_size();
        let stale = !self.world.resource::<SpatialGrid>().matches(
            config.world_width,
            config.world_height,
            cell_size,
        );
        if stale {
            self.world.insert_resource(SpatialGrid::new(
                config.world_width,
                config.world_height,
                cell_size,
            ));
            debug!(cell_size, "Rebuilt spatial grid for new config");
        }
        self.world.insert_resource(config);
        Ok(())
    }

    pub fn config(&self) -> &SimConfig {
        self.world.resource::<SimConfig>()
    }

    pub fn stats(&self) -> &SimStats {
        self.world.resource::<SimStats>()
    }

    pub fn history(&self) -> &PopulationHistory {
        self.world.resource::<PopulationHistory>()
    }

    pub fn grid(&self) -> &SpatialGrid {
        self.world.resource::<SpatialGrid>()
    }

    /// Number of ticks run since construction or the last reset
    pub fn tick(&self) -> u64 {
        self.world.resource::<TickClock>().tick
    }

    pub fn elapsed(&self) -> f64 {
        self.world.resource::<TickClock>().elapsed
    }

    /// Live agents right now
    pub fn population(&self) -> usize {
        self.world
            .iter_entities()
            .filter(|agent| agent.contains::<Alive>())
            .count()
    }

    /// Every agent still in the world, including those that died this tick
    pub fn agents(&self) -> Vec<AgentView> {
        self.world
            .iter_entities()
            .filter_map(AgentView::from_entity)
            .collect()
    }

    pub fn agent(&self, entity: Entity) -> Option<AgentView> {
        self.world.get_entity(entity).and_then(AgentView::from_entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_config() -> SimConfig {
        SimConfig {
            initial_normal_count: 0,
            initial_doctor_count: 0,
            ..SimConfig::default()
        }
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = SimConfig {
            p_cure: 2.0,
            ..SimConfig::default()
        };
        assert!(matches!(
            Simulation::new(config),
            Err(SimError::Config(ConfigError::Invalid { field: "p_cure", .. }))
        ));
    }

    #[test]
    fn test_invalid_dt_is_noop() {
        let mut sim = Simulation::new(SimConfig::default()).unwrap();
        let before = sim.agents();
        sim.advance_tick(f32::NAN);
        sim.advance_tick(0.0);
        sim.advance_tick(-1.0);
        assert_eq!(sim.tick(), 0);
        assert_eq!(sim.agents(), before);
    }

    #[test]
    fn test_clock_advances() {
        let mut sim = Simulation::new(empty_config()).unwrap();
        sim.advance_tick(0.5);
        sim.advance_tick(0.25);
        assert_eq!(sim.tick(), 2);
        assert!((sim.elapsed() - 0.75).abs() < 1e-9);
        assert_eq!(sim.stats().tick, 2);
        assert_eq!(sim.history().len(), 2);
    }

    #[test]
    fn test_set_config_rebuilds_grid() {
        let mut sim = Simulation::new(empty_config()).unwrap();
        assert_eq!(sim.grid().cell_size(), 40.0);

        let bigger = SimConfig {
            r_interact_doctor: 100.0,
            ..empty_config()
        };
        sim.set_config(bigger).unwrap();
        assert_eq!(sim.grid().cell_size(), 100.0);

        let bad = SimConfig {
            world_width: -1.0,
            ..empty_config()
        };
        assert!(sim.set_config(bad).is_err());
        assert_eq!(sim.config().r_interact_doctor, 100.0);
    }

    #[test]
    fn test_spawned_agent_is_visible() {
        let mut sim = Simulation::new(empty_config()).unwrap();
        let entity = sim.spawn_agent(AgentSpec::new(SwarmClass::Doctor, Sex::Female, 10.0, 20.0));
        let view = sim.agent(entity).unwrap();
        assert!(view.alive);
        assert_eq!(view.class, SwarmClass::Doctor);
        assert_eq!(view.position, Position::new(10.0, 20.0));
        assert_eq!(sim.population(), 1);
    }
}
