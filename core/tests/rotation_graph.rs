//! Rotation graph: chain construction, integrity errors and depth-limited walks.

mod common;

use common::*;
use irop_core::{
    baseline::Baseline,
    config::EngineConfig,
    entity::RotationLink,
    error::{DataIntegrityError, EngineError},
    rotation_graph::RotationGraph,
    snapshot::OpsSnapshot,
};

fn link(tail: &str, key: &str, pos: u32, prev: Option<&str>, next: Option<&str>) -> RotationLink {
    RotationLink {
        tail_number:       tail.into(),
        flight_key:        key.into(),
        sequence_position: pos,
        prev_flight_key:   prev.map(Into::into),
        next_flight_key:   next.map(Into::into),
    }
}

#[test]
fn builds_ordered_chains_regardless_of_input_order() {
    let mut links = chain("N1", &["A", "B", "C", "D"]);
    links.reverse();
    links.extend(chain("N2", &["X", "Y"]));

    let graph = RotationGraph::build(&links).unwrap();
    assert_eq!(graph.chains().len(), 2);
    assert_eq!(graph.leg_count(), 6);
    assert_eq!(graph.chain_of("C").unwrap().legs, vec!["A", "B", "C", "D"]);
    assert_eq!(graph.tail_of("Y").map(String::as_str), Some("N2"));
    assert_eq!(graph.predecessor("B").map(String::as_str), Some("A"));
    assert_eq!(graph.predecessor("A"), None);
}

#[test]
fn successors_respect_depth_limit() {
    let links = chain("N1", &["A", "B", "C", "D", "E", "F"]);
    let graph = RotationGraph::build(&links).unwrap();

    assert_eq!(graph.successors("A", 3), vec!["B", "C", "D"]);
    assert_eq!(graph.successors("D", 3), vec!["E", "F"]);
    assert!(graph.successors("F", 3).is_empty());
    assert!(graph.successors("A", 0).is_empty());
    assert!(graph.successors("unknown", 3).is_empty());
}

#[test]
fn duplicate_sequence_rejected() {
    let links = vec![
        link("N1", "A", 1, None, Some("B")),
        link("N1", "B", 1, Some("A"), None),
    ];
    assert_eq!(
        RotationGraph::build(&links).unwrap_err(),
        DataIntegrityError::DuplicateSequence { tail: "N1".into(), position: 1 }
    );
}

#[test]
fn duplicate_flight_rejected() {
    let mut links = chain("N1", &["A", "B"]);
    links.extend(chain("N2", &["B", "C"]));
    assert!(matches!(
        RotationGraph::build(&links),
        Err(DataIntegrityError::DuplicateFlight { flight_key }) if flight_key == "B"
    ));
}

#[test]
fn dangling_pointer_rejected() {
    let links = vec![
        link("N1", "A", 1, None, Some("B")),
        link("N1", "B", 2, Some("A"), Some("GHOST")),
    ];
    assert!(matches!(
        RotationGraph::build(&links),
        Err(DataIntegrityError::DanglingPointer { to, .. }) if to == "GHOST"
    ));
}

#[test]
fn cycle_rejected() {
    let links = vec![
        link("N1", "A", 1, Some("C"), Some("B")),
        link("N1", "B", 2, Some("A"), Some("C")),
        link("N1", "C", 3, Some("B"), Some("A")),
    ];
    assert!(matches!(
        RotationGraph::build(&links),
        Err(DataIntegrityError::Cycle { tail, .. }) if tail == "N1"
    ));
}

#[test]
fn pointer_order_mismatch_rejected() {
    let links = vec![
        link("N1", "A", 1, None, Some("C")),
        link("N1", "B", 2, Some("A"), Some("C")),
        link("N1", "C", 3, Some("B"), None),
    ];
    assert!(matches!(
        RotationGraph::build(&links),
        Err(DataIntegrityError::ChainMismatch { flight_key, .. }) if flight_key == "A"
    ));
}

#[test]
fn baseline_build_surfaces_integrity_error() {
    let mut file = day();
    file.rotations[1].next_flight_key = Some("F1".into());
    let result = Baseline::build(1, snapshot(file), &EngineConfig::default());
    assert!(matches!(result, Err(EngineError::DataIntegrity(_))));
}

#[test]
fn rotation_leg_without_flight_record_rejected() {
    let mut file = day();
    file.rotations.retain(|l| l.tail_number != "N101");
    file.rotations.extend(chain("N101", &["F1", "GHOST", "F2", "F3", "F4"]));
    for f in &mut file.flights {
        f.turn_buffer_minutes = 0;
    }

    let result = Baseline::build(1, snapshot(file), &EngineConfig::default());
    assert!(matches!(
        result,
        Err(EngineError::DataIntegrity(DataIntegrityError::UnknownFlight { tail, flight_key }))
            if tail == "N101" && flight_key == "GHOST"
    ));
}

#[test]
fn duplicate_flight_record_rejected() {
    let mut file = day();
    let copy = flight_mut(&mut file, "F3").clone();
    file.flights.push(copy);

    assert!(matches!(
        OpsSnapshot::from_file(file),
        Err(EngineError::DataIntegrity(DataIntegrityError::DuplicateFlightRecord { flight_key }))
            if flight_key == "F3"
    ));
}

#[test]
fn exchange_legs_swaps_positions() {
    let mut links = chain("N1", &["A", "B", "C"]);
    links.extend(chain("N2", &["X", "Y", "Z"]));
    let graph = RotationGraph::build(&links).unwrap();

    let (first, second) = graph.exchange_legs("B", "Y").unwrap();
    assert_eq!(first.tail_number, "N1");
    assert_eq!(first.legs, vec!["A", "Y", "C"]);
    assert_eq!(second.legs, vec!["X", "B", "Z"]);
    assert!(graph.exchange_legs("A", "C").is_none(), "same tail");

    // The graph itself is untouched.
    assert_eq!(graph.successors("A", 3), vec!["B", "C"]);
}
