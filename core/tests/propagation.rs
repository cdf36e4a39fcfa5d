//! Delay propagation: buffer absorption, decay, containment and the
//! network criticality signal.

mod common;

use common::*;
use irop_core::{
    config::{CriticalityConfig, CriticalityMode, DecayModel, EngineConfig},
    error::EngineError,
    propagation::{propagated_criticality, resolve_criticality, Perturbation},
    risk_scorer::{CriticalitySource, RiskBand},
};

fn geometric_half() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.propagation.decay = DecayModel::Geometric { factor: 0.5 };
    config.propagation.max_depth = 3;
    config
}

/// Buffer 40 at hop 1 absorbs 40 of 60 minutes; hop 2 sees 20 * 0.5 = 10
/// and its 10-minute buffer contains the chain.
#[test]
fn buffer_absorbs_and_decay_contains() {
    let mut file = day();
    flight_mut(&mut file, "F2").turn_buffer_minutes = 40;
    flight_mut(&mut file, "F3").turn_buffer_minutes = 10;
    let engine = engine_with(file, geometric_half());

    let report = engine
        .impact_report("F1", Perturbation::AddedDelay { minutes: 60 })
        .unwrap();

    assert_eq!(report.origin_delay_minutes, 60.0);
    assert_eq!(report.hops.len(), 1);
    let hop1 = &report.hops[0];
    assert_eq!(hop1.flight_key, "F2");
    assert_eq!(hop1.incoming_delay_minutes, 60.0);
    assert_eq!(hop1.carried_delay_minutes, 20.0);
    assert_eq!(report.contained_at_hop, Some(2));

    // Totals reflect hop 1 only.
    assert!(hop1.misconnect_pax_delta > 0.0);
    assert_eq!(report.total_misconnect_pax_delta, hop1.misconnect_pax_delta);
    assert_eq!(report.total_revenue_delta_usd, hop1.revenue_delta_usd);
}

#[test]
fn hop_deltas_follow_misconnect_curve() {
    let mut file = day();
    flight_mut(&mut file, "F2").turn_buffer_minutes = 40;
    let engine = engine_with(file, geometric_half());

    let report = engine
        .impact_report("F1", Perturbation::AddedDelay { minutes: 60 })
        .unwrap();
    let hop1 = &report.hops[0];

    // 0.25 + 0.5 * 20 / 45
    let expected_after = 0.25 + 0.5 * 20.0 / 45.0;
    assert!((hop1.misconnect_prob_after - expected_after).abs() < 1e-9);
    // 50 connecting pax
    let expected_pax = 50.0 * (expected_after - 0.25);
    assert!((hop1.misconnect_pax_delta - expected_pax).abs() < 1e-9);
    // 200 USD per pax
    assert!((hop1.revenue_delta_usd - expected_pax * 200.0).abs() < 1e-6);
    // PNR1 connects through F2 with a 400 USD voucher.
    assert!((hop1.voucher_delta_usd - 400.0 * (expected_after - 0.25)).abs() < 1e-9);
}

#[test]
fn walk_stops_at_max_depth() {
    let mut file = day();
    for key in ["F2", "F3", "F4"] {
        flight_mut(&mut file, key).turn_buffer_minutes = 0;
    }
    let mut config = geometric_half();
    config.propagation.max_depth = 2;
    let engine = engine_with(file, config);

    let report = engine
        .impact_report("F1", Perturbation::AddedDelay { minutes: 120 })
        .unwrap();
    assert_eq!(report.hops.len(), 2);
    assert_eq!(report.contained_at_hop, None);
    assert_eq!(report.hops[1].flight_key, "F3");
    assert_eq!(report.hops[1].incoming_delay_minutes, 60.0);
}

#[test]
fn linear_decay_shrinks_each_hop() {
    let mut file = day();
    for key in ["F2", "F3", "F4"] {
        flight_mut(&mut file, key).turn_buffer_minutes = 0;
    }
    let engine = engine(file);

    let report = engine
        .impact_report("F1", Perturbation::AddedDelay { minutes: 100 })
        .unwrap();
    let carried: Vec<f64> = report.hops.iter().map(|h| h.carried_delay_minutes).collect();
    // 100, 100 * 0.75, 75 * 0.5
    assert_eq!(carried, vec![100.0, 75.0, 37.5]);
}

#[test]
fn current_delay_perturbation_uses_arrival_delay() {
    let mut file = day();
    flight_mut(&mut file, "F1").current_delay_arrival = 45;
    let engine = engine(file);

    let report = engine.impact_report("F1", Perturbation::CurrentDelay).unwrap();
    assert_eq!(report.origin_delay_minutes, 45.0);
    // F2 buffer 30 leaves 15.
    assert_eq!(report.hops[0].carried_delay_minutes, 15.0);

    let chain = engine.downstream_chain("F1").unwrap();
    let keys: Vec<&str> = chain.iter().map(|l| l.flight_key.as_str()).collect();
    assert_eq!(keys, vec!["F2", "F3", "F4"]);
    assert_eq!(chain[0].hop, 1);
    assert_eq!(chain[0].carried_delay_minutes, 15.0);
    assert_eq!(chain[2].carried_delay_minutes, 0.0);
}

#[test]
fn zero_delay_affects_nothing() {
    let engine = engine(day());
    let report = engine
        .impact_report("F1", Perturbation::AddedDelay { minutes: 0 })
        .unwrap();
    assert!(report.hops.is_empty());
    assert_eq!(report.contained_at_hop, Some(1));
    assert_eq!(report.total_misconnect_pax_delta, 0.0);
}

#[test]
fn last_leg_has_no_downstream() {
    let engine = engine(day());
    let report = engine
        .impact_report("F4", Perturbation::AddedDelay { minutes: 90 })
        .unwrap();
    assert!(report.hops.is_empty());
    assert_eq!(report.contained_at_hop, None);
}

#[test]
fn rejects_unknown_flight_and_negative_delay() {
    let engine = engine(day());
    assert!(matches!(
        engine.impact_report("NOPE", Perturbation::CurrentDelay),
        Err(EngineError::NotFound { .. })
    ));
    assert!(matches!(
        engine.impact_report("F1", Perturbation::AddedDelay { minutes: -5 }),
        Err(EngineError::InvalidRequest(_))
    ));
}

#[test]
fn criticality_from_downstream_bands() {
    let cfg = CriticalityConfig::default();
    assert_eq!(propagated_criticality(&[], &cfg, 3), 0.0);
    assert_eq!(propagated_criticality(&[RiskBand::Low; 3], &cfg, 3), 0.0);
    assert!((propagated_criticality(&[RiskBand::High; 3], &cfg, 3) - 100.0).abs() < 1e-9);

    // Nearer legs weigh more.
    let near = propagated_criticality(&[RiskBand::High, RiskBand::Low, RiskBand::Low], &cfg, 3);
    let far = propagated_criticality(&[RiskBand::Low, RiskBand::Low, RiskBand::High], &cfg, 3);
    assert!(near > far);

    let medium = propagated_criticality(&[RiskBand::Medium], &cfg, 3);
    let high = propagated_criticality(&[RiskBand::High], &cfg, 3);
    assert!(medium > 0.0 && medium < high);
}

#[test]
fn criticality_modes() {
    let blended = CriticalityMode::Blended { external_weight: 0.5 };
    assert_eq!(
        resolve_criticality(40.0, Some(80.0), blended),
        (60.0, CriticalitySource::Blended, false)
    );
    assert_eq!(
        resolve_criticality(40.0, Some(80.0), CriticalityMode::External),
        (80.0, CriticalitySource::External, false)
    );
    assert_eq!(
        resolve_criticality(40.0, Some(80.0), CriticalityMode::Propagated),
        (40.0, CriticalitySource::Propagated, false)
    );
    // Missing external signal falls back to the propagated value.
    assert_eq!(
        resolve_criticality(40.0, None, blended),
        (40.0, CriticalitySource::Propagated, true)
    );
}

#[test]
fn downstream_legs_affected_tracks_current_delay() {
    let mut file = day();
    flight_mut(&mut file, "G1").current_delay_arrival = 90;
    let engine = engine(file);

    // 90 - 20 = 70 into G2, 70 * 0.75 - 20 = 32.5 into G3.
    assert_eq!(engine.risk_record("G1").unwrap().downstream_legs_affected, 2);
    assert_eq!(engine.risk_record("F1").unwrap().downstream_legs_affected, 0);
}
