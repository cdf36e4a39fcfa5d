//! What-if simulations: delay injection, reserve crew, tail swap.
//! All of them must leave the published baseline untouched.

mod common;

use common::*;
use irop_core::{
    command::{SimulationOutcome, SimulationRequest},
    error::EngineError,
    overlay::{OpsView, ScenarioView},
    simulation::{ChainOutcome, Feasibility, TailSwapVerdict},
};

#[test]
fn delay_raises_origin_risk() {
    let engine = engine(day());
    let sim = engine.simulate_delay("F1", 90).unwrap();

    assert_eq!(sim.verdict, Feasibility::Feasible);
    assert!(sim.origin.score_after > sim.origin.score_before);
    assert!(sim.origin.misconnect_pax_after >= sim.origin.misconnect_pax_before);
    assert_eq!(sim.impact.origin_delay_minutes, 90.0);
    assert!(!sim.impact.hops.is_empty());
}

/// Total downstream misconnect delta never shrinks as the injected delay grows.
#[test]
fn delay_impact_is_monotonic() {
    let mut file = day();
    flight_mut(&mut file, "F2").turn_buffer_minutes = 15;
    flight_mut(&mut file, "F3").turn_buffer_minutes = 5;
    let engine = engine(file);

    let mut previous = 0.0;
    for minutes in (0..=300).step_by(15) {
        let sim = engine.simulate_delay("F1", minutes).unwrap();
        let total = sim.impact.total_misconnect_pax_delta;
        assert!(
            total >= previous - 1e-9,
            "delta fell from {previous} to {total} at +{minutes}m"
        );
        previous = total;
    }
    assert!(previous > 0.0);
}

#[test]
fn delay_rejects_bad_requests() {
    let engine = engine(day());
    assert!(matches!(engine.simulate_delay("NOPE", 10), Err(EngineError::NotFound { .. })));
    assert!(matches!(engine.simulate_delay("F1", -10), Err(EngineError::InvalidRequest(_))));
}

/// Reserve crew on a duty within 30 minutes of its limit clears the
/// fdp-timeout flag on every leg and leaves the other components alone.
#[test]
fn reserve_crew_clears_fdp_flag() {
    let mut file = day();
    file.crew_duties[0].fdp_used_minutes = 580;
    let engine = engine(file);

    let sim = engine.simulate_reserve_crew("D1").unwrap();
    assert_eq!(sim.verdict, Feasibility::Feasible);
    assert_eq!(sim.reserve_eta_minutes, Some(45));
    assert_eq!(sim.flights.len(), 2);

    for f in &sim.flights {
        assert!(f.flags_before.fdp_timeout_risk, "{} should start flagged", f.flight_key);
        assert!(!f.flags_after.fdp_timeout_risk, "{} should be cleared", f.flight_key);
        assert!(f.components_after.crew_legality < f.components_before.crew_legality);

        assert_eq!(f.components_after.airport_environment, f.components_before.airport_environment);
        assert_eq!(f.components_after.passenger, f.components_before.passenger);
        assert_eq!(f.components_after.maintenance, f.components_before.maintenance);
        assert_eq!(f.score_after, f.score_before);
    }
}

#[test]
fn reserve_crew_unavailable_is_infeasible() {
    let engine = engine(day());
    let sim = engine.simulate_reserve_crew("D2").unwrap();
    assert!(matches!(sim.verdict, Feasibility::Infeasible { ref reasons } if !reasons.is_empty()));
    assert!(sim.flights.is_empty());

    assert!(matches!(
        engine.simulate_reserve_crew("NOPE"),
        Err(EngineError::NotFound { .. })
    ));
}

#[test]
fn tail_swap_is_symmetric() {
    let mut file = day();
    flight_mut(&mut file, "F2").current_delay_arrival = 70;
    flight_mut(&mut file, "G1").current_delay_arrival = 10;
    let engine = engine(file);

    let ab = engine.simulate_tail_swap("F2", "G1").unwrap();
    let ba = engine.simulate_tail_swap("G1", "F2").unwrap();

    assert!(matches!(ab.verdict, TailSwapVerdict::Feasible { .. }));
    assert!(matches!(ba.verdict, TailSwapVerdict::Feasible { .. }));
    assert_eq!(ab.first, ba.second);
    assert_eq!(ab.second, ba.first);

    let f2 = ab.first.as_ref().unwrap();
    assert_eq!(f2.tail_before, "N101");
    assert_eq!(f2.tail_after, "N202");
    // F2's 70 minutes now flow into G2 (buffer 20) instead of F3 (buffer 30).
    assert_eq!(f2.impact_after.hops[0].flight_key, "G2");
    assert_eq!(f2.impact_after.hops[0].carried_delay_minutes, 50.0);
    assert_eq!(f2.outcome, ChainOutcome::Worsens);
}

#[test]
fn tail_swap_unchanged_when_nothing_is_late() {
    let engine = engine(day());
    let sim = engine.simulate_tail_swap("F3", "G3").unwrap();
    assert_eq!(
        sim.verdict,
        TailSwapVerdict::Feasible { first: ChainOutcome::Unchanged, second: ChainOutcome::Unchanged }
    );
    assert_eq!(sim.verdict.summary(), "no net change");
}

#[test]
fn tail_swap_requires_etops_capable_aircraft() {
    let mut file = day();
    // G2 becomes a transatlantic leg; N101 is not ETOPS-capable.
    flight_mut(&mut file, "G2").arrival_station = "LHR".into();
    let engine = engine(file);

    let ab = engine.simulate_tail_swap("F3", "G2").unwrap();
    let ba = engine.simulate_tail_swap("G2", "F3").unwrap();

    let TailSwapVerdict::Infeasible { reasons } = &ab.verdict else {
        panic!("expected infeasible, got {:?}", ab.verdict);
    };
    assert!(reasons.iter().any(|r| r.contains("ETOPS") && r.contains("N101")));
    assert_eq!(ab.verdict, ba.verdict);
    assert!(ab.first.is_none() && ab.second.is_none());
}

#[test]
fn tail_swap_long_block_needs_etops() {
    let mut file = day();
    flight_mut(&mut file, "G3").block_time_minutes = 400;
    let engine = engine(file);
    let sim = engine.simulate_tail_swap("F4", "G3").unwrap();
    assert!(matches!(sim.verdict, TailSwapVerdict::Infeasible { .. }));
}

#[test]
fn tail_swap_rejects_same_tail_and_unknown_flights() {
    let engine = engine(day());
    assert!(matches!(
        engine.simulate_tail_swap("F1", "F3"),
        Err(EngineError::InvalidRequest(_))
    ));
    assert!(matches!(
        engine.simulate_tail_swap("F1", "NOPE"),
        Err(EngineError::NotFound { .. })
    ));
}

#[test]
fn tail_swap_rejects_unassigned_leg() {
    let mut file = day();
    file.flights.push(flight("U1", "ATL", "BOS", 18, "N999", 30));
    let engine = engine(file);
    assert!(matches!(
        engine.simulate_tail_swap("F1", "U1"),
        Err(EngineError::InvalidRequest(_))
    ));
}

#[test]
fn identical_requests_give_identical_reports() {
    let mut file = day();
    flight_mut(&mut file, "F2").current_delay_arrival = 40;
    file.crew_duties[0].fdp_used_minutes = 590;
    let engine = engine(file);

    let requests = [
        SimulationRequest::Delay { flight_key: "F1".into(), delay_minutes: 75 },
        SimulationRequest::ReserveCrew { duty_id: "D1".into() },
        SimulationRequest::TailSwap { first_flight: "F2".into(), second_flight: "G2".into() },
    ];
    for request in &requests {
        let first = engine.simulate(request).unwrap();
        let second = engine.simulate(request).unwrap();
        assert_eq!(first, second, "{} is not idempotent", request.kind());
    }
}

#[test]
fn simulations_do_not_mutate_baseline() {
    let engine = engine(day());
    let before: Vec<_> = engine.baseline().records().cloned().collect();

    engine.simulate_delay("F1", 120).unwrap();
    engine.simulate_reserve_crew("D1").unwrap();
    engine.simulate_tail_swap("F2", "G2").unwrap();

    let after: Vec<_> = engine.baseline().records().cloned().collect();
    assert_eq!(before, after);
    assert_eq!(engine.generation(), 1);
}

#[test]
fn request_round_trips_through_json() {
    let json = r#"{"cmd":"tail_swap","first_flight":"F2","second_flight":"G2"}"#;
    let request: SimulationRequest = serde_json::from_str(json).unwrap();
    assert_eq!(
        request,
        SimulationRequest::TailSwap { first_flight: "F2".into(), second_flight: "G2".into() }
    );

    let engine = engine(day());
    let outcome = engine.simulate(&request).unwrap();
    assert!(matches!(outcome, SimulationOutcome::TailSwap(_)));
    assert!(outcome.is_feasible());
}

#[test]
fn swapped_leg_takes_receiving_fleet_type() {
    let engine = engine(day());
    let baseline = engine.baseline();
    let (chain_a, chain_b) = baseline.graph().exchange_legs("F2", "G1").unwrap();

    let mut view = ScenarioView::new(baseline.view(), &engine.config().signals);
    view.override_chain(chain_a);
    view.override_chain(chain_b);

    let f2 = view.flight("F2").unwrap();
    assert_eq!(f2.tail_number.as_deref(), Some("N202"));
    assert_eq!(f2.fleet_type, "A330-300");
    let g1 = view.flight("G1").unwrap();
    assert_eq!(g1.tail_number.as_deref(), Some("N101"));
    assert_eq!(g1.fleet_type, "A321neo");
}
