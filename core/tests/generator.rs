//! Synthetic day generator: deterministic per seed and always loadable.

use irop_core::{
    baseline::Baseline,
    config::EngineConfig,
    generator::{generate_day, generate_file, GeneratorParams},
    snapshot::OpsSnapshot,
};

fn small() -> GeneratorParams {
    GeneratorParams { flight_count: 60, tail_count: 12, pnr_count: 300, ..GeneratorParams::default() }
}

#[test]
fn same_seed_same_day() {
    assert_eq!(generate_file(42, &small()), generate_file(42, &small()));
}

#[test]
fn different_seeds_differ() {
    assert_ne!(generate_file(1, &small()), generate_file(2, &small()));
}

#[test]
fn generated_days_build_valid_baselines() {
    let config = EngineConfig::default();
    for seed in [1u64, 7, 42, 1234, 98765] {
        let snapshot = generate_day(seed, &small()).expect("snapshot loads");
        assert_eq!(snapshot.flight_count(), 60);
        let baseline = Baseline::build(1, snapshot, &config).expect("rotation links are valid");
        assert_eq!(baseline.records().count(), 60);
        assert_eq!(baseline.graph().chains().len(), 12);
    }
}

#[test]
fn every_flight_has_a_tail_and_a_duty() {
    let snapshot = generate_day(7, &small()).unwrap();
    for flight in snapshot.flights() {
        assert!(flight.tail_number.is_some(), "{} has no tail", flight.flight_key);
        assert!(snapshot.duty_for_flight(&flight.flight_key).is_some(), "{} has no duty", flight.flight_key);
    }
}

#[test]
fn widebodies_are_etops_capable() {
    let file = generate_file(3, &small());
    let etops = file.aircraft.iter().filter(|a| a.etops_capable).count();
    assert_eq!(etops, 3, "every fourth of 12 tails");
}

#[test]
fn generated_day_round_trips_through_json() {
    let file = generate_file(11, &small());
    let json = serde_json::to_string(&file).unwrap();
    let snapshot = OpsSnapshot::from_json(&json).unwrap();
    assert_eq!(snapshot.flight_count(), file.flights.len());
    assert_eq!(snapshot.to_file().flights.len(), file.flights.len());
}
