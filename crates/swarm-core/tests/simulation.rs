//! Whole-pipeline behavior: accounting, reset, boundaries and promotion

use swarm_core::{AgentSpec, BoundaryPolicy, Sex, SimConfig, Simulation, SwarmClass};

fn busy_config(boundary: BoundaryPolicy) -> SimConfig {
    SimConfig {
        seed: 3,
        world_width: 500.0,
        world_height: 400.0,
        initial_normal_count: 80,
        initial_doctor_count: 8,
        initial_antivax_count: 5,
        boundary,
        ..SimConfig::default()
    }
}

#[test]
fn test_stats_match_population() {
    let mut sim = Simulation::new(busy_config(BoundaryPolicy::Bounce)).unwrap();
    for _ in 0..200 {
        let stats = sim.advance_tick(1.0 / 30.0).clone();
        assert_eq!(stats.population() as usize, sim.population());

        let agents = sim.agents();
        let infected = agents
            .iter()
            .filter(|a| a.alive && a.epidemic.is_infected())
            .count();
        assert_eq!(stats.infected as usize, infected);
        for class in SwarmClass::ALL {
            let alive = agents.iter().filter(|a| a.alive && a.class == class).count();
            assert_eq!(*stats.alive.get(class) as usize, alive);
            assert_eq!(stats.aggregates.get(class).count as usize, alive);
        }

        let latest = sim.history().latest().copied();
        let flock = latest.map(|point| point.flock.normal);
        assert_eq!(flock.map(|f| f.separation), Some(stats.aggregates.normal.rms_separation));
    }
    assert_eq!(sim.history().len(), 200);
}

#[test]
fn test_history_is_bounded() {
    let mut sim = Simulation::new(SimConfig {
        initial_normal_count: 5,
        initial_doctor_count: 0,
        ..SimConfig::default()
    })
    .unwrap();
    for _ in 0..600 {
        sim.advance_tick(0.01);
    }
    let history = sim.history();
    assert_eq!(history.len(), 500);
    assert_eq!(history.iter().next().map(|p| p.tick), Some(101));
    assert_eq!(history.latest().map(|p| p.tick), Some(600));
}

#[test]
fn test_bounce_keeps_agents_inside() {
    let config = busy_config(BoundaryPolicy::Bounce);
    let (width, height) = (config.world_width, config.world_height);
    let mut sim = Simulation::new(config).unwrap();
    for _ in 0..300 {
        sim.advance_tick(1.0 / 30.0);
        for agent in sim.agents() {
            assert!((0.0..=width).contains(&agent.position.x), "{:?}", agent.position);
            assert!((0.0..=height).contains(&agent.position.y), "{:?}", agent.position);
        }
    }
}

#[test]
fn test_wrap_keeps_agents_inside() {
    let config = busy_config(BoundaryPolicy::Wrap);
    let (width, height) = (config.world_width, config.world_height);
    let mut sim = Simulation::new(config).unwrap();
    for _ in 0..300 {
        sim.advance_tick(1.0 / 30.0);
        for agent in sim.agents() {
            assert!(agent.position.x >= 0.0 && agent.position.x < width);
            assert!(agent.position.y >= 0.0 && agent.position.y < height);
        }
    }
}

#[test]
fn test_speeds_stay_within_limits() {
    let config = busy_config(BoundaryPolicy::Bounce);
    let (min_speed, max_speed) = (config.min_speed, config.max_speed);
    let mut sim = Simulation::new(config).unwrap();
    for _ in 0..100 {
        sim.advance_tick(1.0 / 30.0);
    }
    for agent in sim.agents().iter().filter(|a| a.alive && a.age > 0.0) {
        let speed = agent.velocity.speed();
        assert!(speed >= min_speed - 1e-2 && speed <= max_speed + 1e-2, "speed {speed}");
    }
}

#[test]
fn test_reset_restores_initial_state() {
    let mut sim = Simulation::new(busy_config(BoundaryPolicy::Bounce)).unwrap();
    let initial_population = sim.population();
    for _ in 0..50 {
        sim.advance_tick(1.0 / 30.0);
    }

    sim.reset();

    assert_eq!(sim.tick(), 0);
    assert_eq!(sim.elapsed(), 0.0);
    assert_eq!(sim.population(), initial_population);
    assert_eq!(sim.stats().total_births.total(), 0);
    assert!(sim.history().is_empty());
    assert!(sim.agents().iter().all(|a| a.alive && a.age == 0.0));
}

#[test]
fn test_adult_normal_promoted_to_doctor() {
    let mut sim = Simulation::new(SimConfig {
        initial_normal_count: 0,
        initial_doctor_count: 0,
        p_become_doctor: 1.0,
        ..SimConfig::default()
    })
    .unwrap();
    let adult =
        sim.spawn_agent(AgentSpec::new(SwarmClass::Normal, Sex::Male, 50.0, 50.0).with_age(20.0));
    let young = sim.spawn_agent(AgentSpec::new(SwarmClass::Normal, Sex::Male, 400.0, 400.0));

    sim.advance_tick(0.1);

    assert_eq!(sim.agent(adult).map(|a| a.class), Some(SwarmClass::Doctor));
    assert_eq!(sim.agent(young).map(|a| a.class), Some(SwarmClass::Normal));
    assert_eq!(sim.stats().alive.doctor, 1);
    assert_eq!(sim.stats().total_promotions, 1);
}

#[test]
fn test_fov_limited_perception_runs() {
    let mut sim = Simulation::new(SimConfig {
        fov_half_angle: Some(std::f32::consts::FRAC_PI_2),
        ..busy_config(BoundaryPolicy::Wrap)
    })
    .unwrap();
    for _ in 0..60 {
        sim.advance_tick(1.0 / 30.0);
    }
    assert_eq!(sim.tick(), 60);
    assert!(sim.population() > 0);
}
