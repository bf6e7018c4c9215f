//! Statistics
//!
//! Per-tick population counts, per-class flock aggregates and a bounded
//! population history.

use std::collections::VecDeque;

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::agent::{Alive, EpidemicState, Position, SwarmClass, Velocity};
use crate::systems::{TickClock, TickTally};

/// Number of ticks kept in `PopulationHistory`
pub const HISTORY_CAPACITY: usize = 500;

/// Velocities shorter than this have no direction for divergence purposes
const MIN_DIRECTION_SPEED: f32 = 1e-4;

/// One value per swarm class
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerClass<T> {
    pub normal: T,
    pub doctor: T,
    pub antivax: T,
}

impl<T> PerClass<T> {
    pub fn get(&self, class: SwarmClass) -> &T {
        match class {
            SwarmClass::Normal => &self.normal,
            SwarmClass::Doctor => &self.doctor,
            SwarmClass::Antivax => &self.antivax,
        }
    }

    pub fn get_mut(&mut self, class: SwarmClass) -> &mut T {
        match class {
            SwarmClass::Normal => &mut self.normal,
            SwarmClass::Doctor => &mut self.doctor,
            SwarmClass::Antivax => &mut self.antivax,
        }
    }
}

impl PerClass<u64> {
    pub fn total(&self) -> u64 {
        self.normal + self.doctor + self.antivax
    }
}

/// Flock shape of one class
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassAggregate {
    pub count: u32,
    pub centroid: [f32; 2],
    pub mean_velocity: [f32; 2],
    /// Mean absolute angle (radians) between each velocity and the mean velocity
    pub heading_divergence: f32,
    /// Root mean square pairwise distance
    pub rms_separation: f32,
    /// Root mean square distance to the centroid
    pub rms_spread: f32,
}

#[derive(Debug, Clone, Copy, Default)]
struct AggregateAccumulator {
    count: u32,
    sum_x: f64,
    sum_y: f64,
    sum_sq: f64,
    sum_vx: f64,
    sum_vy: f64,
}

impl AggregateAccumulator {
    fn add(&mut self, position: &Position, velocity: &Velocity) {
        let (x, y) = (position.x as f64, position.y as f64);
        self.count += 1;
        self.sum_x += x;
        self.sum_y += y;
        self.sum_sq += x * x + y * y;
        self.sum_vx += velocity.vx as f64;
        self.sum_vy += velocity.vy as f64;
    }

    fn finish(&self) -> ClassAggregate {
        if self.count == 0 {
            return ClassAggregate::default();
        }
        let n = self.count as f64;
        let (cx, cy) = (self.sum_x / n, self.sum_y / n);
        // Huygens-Steiner: mean |p_i - p_j|^2 = 2 (E|p|^2 - |E p|^2)
        let spread = (self.sum_sq / n - (cx * cx + cy * cy)).max(0.0);
        ClassAggregate {
            count: self.count,
            centroid: [cx as f32, cy as f32],
            mean_velocity: [(self.sum_vx / n) as f32, (self.sum_vy / n) as f32],
            heading_divergence: 0.0,
            rms_separation: (2.0 * spread).sqrt() as f32,
            rms_spread: spread.sqrt() as f32,
        }
    }
}

/// Absolute angle between two vectors, or None if either has no direction
fn angle_between(ax: f32, ay: f32, bx: f32, by: f32) -> Option<f32> {
    let a_len = (ax * ax + ay * ay).sqrt();
    let b_len = (bx * bx + by * by).sqrt();
    if a_len < MIN_DIRECTION_SPEED || b_len < MIN_DIRECTION_SPEED {
        return None;
    }
    let cross = ax * by - ay * bx;
    let dot = ax * bx + ay * by;
    Some(cross.atan2(dot).abs())
}

/// Aggregates for every class from `(position, velocity, class)` samples
pub fn class_aggregates(samples: &[(Position, Velocity, SwarmClass)]) -> PerClass<ClassAggregate> {
    let mut accumulators = PerClass::<AggregateAccumulator>::default();
    for (position, velocity, class) in samples {
        accumulators.get_mut(*class).add(position, velocity);
    }

    let mut aggregates = PerClass {
        normal: accumulators.normal.finish(),
        doctor: accumulators.doctor.finish(),
        antivax: accumulators.antivax.finish(),
    };

    let mut divergence = PerClass::<(f32, u32)>::default();
    for (_, velocity, class) in samples {
        let [mx, my] = aggregates.get(*class).mean_velocity;
        if let Some(angle) = angle_between(velocity.vx, velocity.vy, mx, my) {
            let slot = divergence.get_mut(*class);
            slot.0 += angle;
            slot.1 += 1;
        }
    }
    for class in SwarmClass::ALL {
        let (sum, count) = *divergence.get(class);
        if count > 0 {
            aggregates.get_mut(class).heading_divergence = sum / count as f32;
        }
    }
    aggregates
}

/// Snapshot of the population after the most recent tick
#[derive(Resource, Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SimStats {
    pub tick: u64,
    pub elapsed: f64,
    pub alive: PerClass<u64>,
    pub infected: u64,
    pub recovered: u64,
    pub dead_this_tick: u64,
    pub born_this_tick: u64,
    pub total_deaths: PerClass<u64>,
    pub total_births: PerClass<u64>,
    pub total_cures: u64,
    pub total_infections: u64,
    pub total_recoveries: u64,
    pub total_promotions: u64,
    pub aggregates: PerClass<ClassAggregate>,
}

impl SimStats {
    pub fn population(&self) -> u64 {
        self.alive.total()
    }
}

/// Flock shape of one class at one tick
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FlockSample {
    /// RMS distance to the class centroid
    pub cohesion: f32,
    /// Mean heading divergence, radians
    pub alignment: f32,
    /// RMS pairwise distance
    pub separation: f32,
}

impl From<&ClassAggregate> for FlockSample {
    fn from(aggregate: &ClassAggregate) -> Self {
        Self {
            cohesion: aggregate.rms_spread,
            alignment: aggregate.heading_divergence,
            separation: aggregate.rms_separation,
        }
    }
}

/// One history sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub tick: u64,
    pub normal: u64,
    pub doctor: u64,
    pub antivax: u64,
    pub infected: u64,
    pub flock: PerClass<FlockSample>,
}

/// Ring buffer of recent population samples, oldest evicted first
#[derive(Resource, Debug, Clone, Default)]
pub struct PopulationHistory {
    points: VecDeque<HistoryPoint>,
}

impl PopulationHistory {
    pub fn new() -> Self {
        Self {
            points: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    pub fn push(&mut self, point: HistoryPoint) {
        if self.points.len() == HISTORY_CAPACITY {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest(&self) -> Option<&HistoryPoint> {
        self.points.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryPoint> {
        self.points.iter()
    }
}

/// Final statistics pass of the tick. Agents killed this tick are counted
/// as deaths here and despawned at the start of the next tick.
pub fn record_stats(
    clock: Res<TickClock>,
    mut stats: ResMut<SimStats>,
    mut history: ResMut<PopulationHistory>,
    mut tally: ResMut<TickTally>,
    agents: Query<(&Position, &Velocity, &SwarmClass, &EpidemicState), With<Alive>>,
) {
    let mut alive = PerClass::<u64>::default();
    let mut infected = 0;
    let mut recovered = 0;
    let mut samples = Vec::new();
    for (position, velocity, class, state) in &agents {
        *alive.get_mut(*class) += 1;
        samples.push((*position, *velocity, *class));
        match state {
            EpidemicState::Infected(_) => infected += 1,
            EpidemicState::Recovered(_) => recovered += 1,
            EpidemicState::Susceptible => {}
        }
    }

    let applied = std::mem::take(&mut *tally);
    for class in SwarmClass::ALL {
        *stats.total_deaths.get_mut(class) += applied.deaths[class.index()] as u64;
        *stats.total_births.get_mut(class) += applied.births[class.index()] as u64;
    }
    stats.total_cures += applied.cures as u64;
    stats.total_infections += applied.infections as u64;
    stats.total_recoveries += applied.recoveries as u64;
    stats.total_promotions += applied.promotions as u64;

    stats.tick = clock.tick;
    stats.elapsed = clock.elapsed;
    stats.alive = alive;
    stats.infected = infected;
    stats.recovered = recovered;
    stats.dead_this_tick = applied.total_deaths() as u64;
    stats.born_this_tick = applied.total_births() as u64;
    let aggregates = class_aggregates(&samples);
    let flock = PerClass {
        normal: FlockSample::from(&aggregates.normal),
        doctor: FlockSample::from(&aggregates.doctor),
        antivax: FlockSample::from(&aggregates.antivax),
    };
    stats.aggregates = aggregates;

    history.push(HistoryPoint {
        tick: clock.tick,
        normal: alive.normal,
        doctor: alive.doctor,
        antivax: alive.antivax,
        infected,
        flock,
    });
}
