//! Epidemic scenarios run through the full tick pipeline

use swarm_core::{
    AgentSpec, EpidemicState, Immunity, Sex, SimConfig, Simulation, SwarmClass,
    TransmissionPolicy,
};

const DT: f32 = 0.125;

/// No initial population and no births or promotions
fn quiet_config() -> SimConfig {
    SimConfig {
        initial_normal_count: 0,
        initial_doctor_count: 0,
        p_offspring_normal: 0.0,
        p_offspring_doctor: 0.0,
        p_become_doctor: 0.0,
        ..SimConfig::default()
    }
}

fn state_of(sim: &Simulation, entity: bevy_ecs::entity::Entity) -> Option<EpidemicState> {
    sim.agent(entity).map(|view| view.epidemic)
}

#[test]
fn test_doctor_cannot_cure_itself() {
    let mut sim = Simulation::new(SimConfig {
        p_cure: 1.0,
        debuff_p_cure_infected: 1.0,
        ..quiet_config()
    })
    .unwrap();
    let doctor = sim.spawn_agent(
        AgentSpec::new(SwarmClass::Doctor, Sex::Female, 200.0, 200.0).infected(1000.0),
    );

    for _ in 0..40 {
        sim.advance_tick(DT);
    }

    assert!(state_of(&sim, doctor).is_some_and(|s| s.is_infected()));
    assert_eq!(sim.stats().total_cures, 0);
}

#[test]
fn test_nearby_doctor_cures_within_one_tick() {
    let mut sim = Simulation::new(SimConfig {
        p_cure: 1.0,
        debuff_p_cure_infected: 1.0,
        p_infect_doctor: 0.0,
        cure_immunity_level: 0.8,
        ..quiet_config()
    })
    .unwrap();
    let sick = sim.spawn_agent(
        AgentSpec::new(SwarmClass::Doctor, Sex::Female, 100.0, 100.0).infected(1000.0),
    );
    let healthy = sim.spawn_agent(AgentSpec::new(SwarmClass::Doctor, Sex::Female, 110.0, 100.0));

    sim.advance_tick(0.01);

    match state_of(&sim, sick) {
        Some(EpidemicState::Recovered(immunity)) => {
            assert!((immunity.level - 0.8).abs() < 1e-6);
        }
        other => panic!("expected recovered, got {other:?}"),
    }
    assert_eq!(state_of(&sim, healthy), Some(EpidemicState::Susceptible));
    assert_eq!(sim.stats().total_cures, 1);
}

#[test]
fn test_cure_without_immunity_returns_to_susceptible() {
    let mut sim = Simulation::new(SimConfig {
        p_cure: 1.0,
        p_infect_normal: 0.0,
        immunity_enabled: false,
        ..quiet_config()
    })
    .unwrap();
    let patient = sim.spawn_agent(
        AgentSpec::new(SwarmClass::Normal, Sex::Male, 100.0, 100.0).infected(1000.0),
    );
    sim.spawn_agent(AgentSpec::new(SwarmClass::Doctor, Sex::Female, 110.0, 100.0));

    sim.advance_tick(0.01);

    assert_eq!(state_of(&sim, patient), Some(EpidemicState::Susceptible));
}

#[test]
fn test_cure_with_zero_immunity_level_is_not_recovered() {
    let mut sim = Simulation::new(SimConfig {
        p_cure: 1.0,
        p_infect_normal: 0.0,
        cure_immunity_level: 0.0,
        ..quiet_config()
    })
    .unwrap();
    let patient = sim.spawn_agent(
        AgentSpec::new(SwarmClass::Normal, Sex::Male, 100.0, 100.0).infected(1000.0),
    );
    sim.spawn_agent(AgentSpec::new(SwarmClass::Doctor, Sex::Female, 110.0, 100.0));

    sim.advance_tick(0.01);

    assert_eq!(state_of(&sim, patient), Some(EpidemicState::Susceptible));
    assert_eq!(sim.stats().total_cures, 1);
    assert_eq!(sim.stats().recovered, 0);
}

#[test]
fn test_same_class_policy_blocks_cross_class_infection() {
    let mut sim = Simulation::new(SimConfig {
        p_infect_normal: 1.0,
        p_cure: 0.0,
        transmission: TransmissionPolicy::SameClass,
        ..quiet_config()
    })
    .unwrap();
    sim.spawn_agent(AgentSpec::new(SwarmClass::Normal, Sex::Male, 100.0, 100.0).infected(1000.0));
    let doctor = sim.spawn_agent(AgentSpec::new(SwarmClass::Doctor, Sex::Female, 105.0, 100.0));
    let antivax = sim.spawn_agent(AgentSpec::new(SwarmClass::Antivax, Sex::Female, 100.0, 105.0));

    for _ in 0..5 {
        sim.advance_tick(0.01);
    }

    assert_eq!(state_of(&sim, doctor), Some(EpidemicState::Susceptible));
    assert_eq!(state_of(&sim, antivax), Some(EpidemicState::Susceptible));
    assert_eq!(sim.stats().total_infections, 0);
}

#[test]
fn test_any_class_policy_crosses_classes() {
    let mut sim = Simulation::new(SimConfig {
        p_infect_normal: 1.0,
        p_cure: 0.0,
        transmission: TransmissionPolicy::AnyClass,
        ..quiet_config()
    })
    .unwrap();
    sim.spawn_agent(AgentSpec::new(SwarmClass::Normal, Sex::Male, 100.0, 100.0).infected(1000.0));
    let doctor = sim.spawn_agent(AgentSpec::new(SwarmClass::Doctor, Sex::Female, 105.0, 100.0));

    sim.advance_tick(0.01);

    assert!(state_of(&sim, doctor).is_some_and(|s| s.is_infected()));
    assert_eq!(sim.stats().total_infections, 1);
}

#[test]
fn test_immunity_decays_monotonically_to_susceptible() {
    let mut sim = Simulation::new(SimConfig {
        t_immunity: 2.0,
        ..quiet_config()
    })
    .unwrap();
    let agent = sim.spawn_agent(
        AgentSpec::new(SwarmClass::Normal, Sex::Male, 100.0, 100.0)
            .with_epidemic(EpidemicState::Recovered(Immunity::new(1.0))),
    );

    let mut last = 1.0;
    for tick in 1..=15 {
        sim.advance_tick(DT);
        let level = match state_of(&sim, agent) {
            Some(EpidemicState::Recovered(immunity)) => immunity.level,
            other => panic!("tick {tick}: expected immunity, got {other:?}"),
        };
        assert!(level <= last);
        assert!(level > 0.0);
        last = level;
    }

    // 16 * 0.125 = t_immunity
    sim.advance_tick(DT);
    assert_eq!(state_of(&sim, agent), Some(EpidemicState::Susceptible));
}

#[test]
fn test_fatal_infection_counted_then_removed() {
    let mut sim = Simulation::new(SimConfig {
        p_death_infected: 1.0,
        ..quiet_config()
    })
    .unwrap();
    let victim = sim.spawn_agent(
        AgentSpec::new(SwarmClass::Doctor, Sex::Male, 100.0, 100.0).infected(0.5),
    );

    for _ in 0..3 {
        sim.advance_tick(DT);
        assert!(sim.agent(victim).is_some_and(|view| view.alive));
    }

    sim.advance_tick(DT);
    let view = sim.agent(victim).unwrap();
    assert!(!view.alive);
    assert_eq!(sim.stats().dead_this_tick, 1);
    assert_eq!(sim.stats().total_deaths.doctor, 1);
    assert_eq!(sim.stats().alive.doctor, 0);
    assert_eq!(sim.population(), 0);

    sim.advance_tick(DT);
    assert!(sim.agent(victim).is_none());
    assert_eq!(sim.stats().dead_this_tick, 0);
}

#[test]
fn test_survivor_gains_full_immunity() {
    let mut sim = Simulation::new(SimConfig {
        p_death_infected: 0.0,
        ..quiet_config()
    })
    .unwrap();
    let survivor = sim.spawn_agent(
        AgentSpec::new(SwarmClass::Normal, Sex::Female, 100.0, 100.0).infected(0.25),
    );

    sim.advance_tick(DT);
    sim.advance_tick(DT);

    assert_eq!(
        state_of(&sim, survivor),
        Some(EpidemicState::Recovered(Immunity::new(1.0)))
    );
    assert_eq!(sim.stats().total_recoveries, 1);
}

#[test]
fn test_expiry_without_immunity_always_kills() {
    let mut sim = Simulation::new(SimConfig {
        immunity_enabled: false,
        p_death_infected: 0.0,
        ..quiet_config()
    })
    .unwrap();
    let victim = sim.spawn_agent(
        AgentSpec::new(SwarmClass::Normal, Sex::Female, 100.0, 100.0).infected(0.25),
    );

    sim.advance_tick(DT);
    sim.advance_tick(DT);

    assert!(sim.agent(victim).is_some_and(|view| !view.alive));
}
