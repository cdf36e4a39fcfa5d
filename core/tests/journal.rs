//! Audit journal: baselines, risk records and simulation events land in
//! SQLite without changing any result.

mod common;

use common::*;
use irop_core::{
    engine::IropEngine,
    event::EngineEvent,
    risk_scorer::MissingSignal,
    snapshot::SnapshotFile,
    store::EngineStore,
};

fn journaled(file: SnapshotFile) -> IropEngine {
    let store = EngineStore::in_memory().expect("in-memory store");
    engine(file).with_journal(store).expect("journal attaches")
}

fn events(engine: &IropEngine, generation: u64) -> Vec<EngineEvent> {
    engine
        .with_store(|store| store.events_for_generation(generation))
        .expect("read events")
        .into_iter()
        .map(|e| e.decode().expect("decode event"))
        .collect()
}

#[test]
fn baseline_and_records_are_journaled() {
    let engine = journaled(day());

    let count = engine.with_store(|s| s.risk_record_count(1)).unwrap();
    assert_eq!(count, 7);

    let stored = engine
        .with_store(|s| s.risk_record(1, "F2"))
        .unwrap()
        .expect("F2 stored");
    let live = engine.risk_record("F2").unwrap();
    assert_eq!(stored.flight_key, live.flight_key);
    assert_eq!(stored.risk_band, live.risk_band);
    assert!((stored.risk_score - live.risk_score).abs() < 1e-9);

    let log = events(&engine, 1);
    assert!(matches!(
        log.first(),
        Some(EngineEvent::BaselinePublished { generation: 1, flight_count: 7, tail_count: 2, .. })
    ));
}

#[test]
fn missing_signals_are_journaled() {
    let mut file = day();
    flight_mut(&mut file, "G3").external_criticality = None;
    let engine = journaled(file);

    let log = events(&engine, 1);
    assert!(log.iter().any(|e| matches!(
        e,
        EngineEvent::MissingSignal { flight_key, signal: MissingSignal::ExternalCriticality, .. }
            if flight_key == "G3"
    )));
}

#[test]
fn simulations_are_journaled_with_request_ids() {
    let engine = journaled(day());

    engine.simulate_delay("F1", 30).unwrap();
    assert!(engine.simulate_delay("NOPE", 30).is_err());

    let log = events(&engine, 1);
    let completed: Vec<&String> = log
        .iter()
        .filter_map(|e| match e {
            EngineEvent::SimulationCompleted { request_id, kind, feasible: true, .. } if kind == "delay" => {
                Some(request_id)
            }
            _ => None,
        })
        .collect();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].len(), 36, "uuid v4 string");

    assert!(log.iter().any(|e| matches!(
        e,
        EngineEvent::SimulationRejected { kind, reason, .. } if kind == "delay" && reason.contains("NOPE")
    )));
}

#[test]
fn refresh_journals_next_generation() {
    let engine = journaled(day());
    engine.refresh(snapshot(day())).unwrap();

    assert_eq!(engine.with_store(|s| s.risk_record_count(2)).unwrap(), 7);
    assert!(matches!(
        events(&engine, 2).first(),
        Some(EngineEvent::BaselinePublished { generation: 2, .. })
    ));
}

#[test]
fn store_reads_need_a_journal() {
    assert!(engine(day()).with_store(|s| s.risk_record_count(1)).is_err());
}

#[test]
fn journal_does_not_change_results() {
    let plain = engine(day());
    let journaled = journaled(day());
    assert_eq!(
        plain.simulate_delay("F1", 45).unwrap(),
        journaled.simulate_delay("F1", 45).unwrap()
    );
}

#[test]
fn file_journal_opens_in_wal_mode() {
    let path = std::env::temp_dir().join(format!("irop-journal-{}.db", std::process::id()));
    let path_str = path.to_str().unwrap().to_string();
    {
        let store = EngineStore::open(&path_str).expect("file store opens");
        let engine = engine(day()).with_journal(store).expect("journal attaches");
        assert_eq!(engine.with_store(|s| s.risk_record_count(1)).unwrap(), 7);
    }
    for suffix in ["", "-wal", "-shm"] {
        std::fs::remove_file(format!("{path_str}{suffix}")).ok();
    }
}
