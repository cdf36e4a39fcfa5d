//! Baseline — the immutable scoring result for one snapshot.
//!
//! BUILD ORDER (fixed):
//!   1. Rotation graph from the snapshot's links. Integrity errors abort,
//!      including chain legs with no flight record.
//!   2. Preliminary pass: every flight scored with only its external
//!      criticality, to get a band per leg.
//!   3. Final pass: propagated criticality from the preliminary bands of
//!      each leg's successors, resolved against the configured mode, plus
//!      the current-delay cascade; every flight re-scored in full.
//!
//! A Baseline is never modified after build. Refresh builds a new one.

use crate::{
    config::EngineConfig,
    entity::Flight,
    error::{DataIntegrityError, EngineError, EngineResult},
    overlay::{BaseView, OpsView},
    propagation::{propagate, propagated_criticality, resolve_criticality, Perturbation},
    risk_scorer::{score, MissingSignal, NetworkSignal, RiskBand, RiskRecord, ScoringContext},
    rotation_graph::RotationGraph,
    snapshot::OpsSnapshot,
    types::{FlightKey, Generation},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BandCounts {
    pub low:    usize,
    pub medium: usize,
    pub high:   usize,
}

#[derive(Debug)]
pub struct Baseline {
    generation:        Generation,
    snapshot:          OpsSnapshot,
    graph:             RotationGraph,
    preliminary_bands: HashMap<FlightKey, RiskBand>,
    records:           BTreeMap<FlightKey, RiskRecord>,
}

impl Baseline {
    pub fn build(
        generation: Generation,
        snapshot: OpsSnapshot,
        config: &EngineConfig,
    ) -> EngineResult<Self> {
        let graph = RotationGraph::build(snapshot.rotations())?;
        for chain in graph.chains() {
            if let Some(missing) = chain.legs.iter().find(|k| snapshot.flight(k).is_none()) {
                return Err(DataIntegrityError::UnknownFlight {
                    tail:       chain.tail_number.clone(),
                    flight_key: missing.clone(),
                }
                .into());
            }
        }

        let (preliminary_bands, records) = {
            let view = BaseView { snapshot: &snapshot, graph: &graph };

            let preliminary_bands: HashMap<FlightKey, RiskBand> = snapshot
                .flights()
                .map(|f| {
                    let provisional = NetworkSignal::provisional(f.external_criticality);
                    let record = score_in_view(&view, f, provisional, config);
                    (f.flight_key.clone(), record.risk_band)
                })
                .collect();

            let mut records = BTreeMap::new();
            for flight in snapshot.flights() {
                let record =
                    score_flight(&view, &flight.flight_key, &preliminary_bands, config)?;
                records.insert(flight.flight_key.clone(), record);
            }
            (preliminary_bands, records)
        };

        let missing_external = records
            .values()
            .filter(|r| r.missing_signals.contains(&MissingSignal::ExternalCriticality))
            .count();
        if missing_external > 0 {
            log::warn!(
                "baseline {generation}: {missing_external} flights lack an external criticality score; using propagated value"
            );
        }

        let baseline = Self { generation, snapshot, graph, preliminary_bands, records };
        let counts = baseline.band_counts();
        log::info!(
            "baseline {generation}: scored {} flights on {} tails (high={}, medium={}, low={})",
            baseline.records.len(),
            baseline.graph.chains().len(),
            counts.high,
            counts.medium,
            counts.low
        );
        Ok(baseline)
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn snapshot(&self) -> &OpsSnapshot {
        &self.snapshot
    }

    pub fn graph(&self) -> &RotationGraph {
        &self.graph
    }

    pub fn view(&self) -> BaseView<'_> {
        BaseView { snapshot: &self.snapshot, graph: &self.graph }
    }

    pub fn preliminary_bands(&self) -> &HashMap<FlightKey, RiskBand> {
        &self.preliminary_bands
    }

    pub fn record(&self, key: &str) -> Option<&RiskRecord> {
        self.records.get(key)
    }

    /// All risk records in flight-key order.
    pub fn records(&self) -> impl Iterator<Item = &RiskRecord> {
        self.records.values()
    }

    pub fn band_counts(&self) -> BandCounts {
        let mut counts = BandCounts::default();
        for r in self.records.values() {
            match r.risk_band {
                RiskBand::Low    => counts.low += 1,
                RiskBand::Medium => counts.medium += 1,
                RiskBand::High   => counts.high += 1,
            }
        }
        counts
    }

    /// Highest scores first; ties broken by flight key.
    pub fn top_risks(&self, n: usize) -> Vec<&RiskRecord> {
        let mut ranked: Vec<&RiskRecord> = self.records.values().collect();
        ranked.sort_by(|a, b| {
            b.risk_score
                .total_cmp(&a.risk_score)
                .then_with(|| a.flight_key.cmp(&b.flight_key))
        });
        ranked.truncate(n);
        ranked
    }
}

/// Score one flight as seen through `view`, including its network signal.
pub fn score_flight<V: OpsView + ?Sized>(
    view: &V,
    key: &str,
    preliminary_bands: &HashMap<FlightKey, RiskBand>,
    config: &EngineConfig,
) -> EngineResult<RiskRecord> {
    let flight = view
        .flight(key)
        .ok_or_else(|| EngineError::flight_not_found(key))?;
    let network = network_signal(view, &flight, preliminary_bands, config)?;
    Ok(score_in_view(view, &flight, network, config))
}

pub fn network_signal<V: OpsView + ?Sized>(
    view: &V,
    flight: &Flight,
    preliminary_bands: &HashMap<FlightKey, RiskBand>,
    config: &EngineConfig,
) -> EngineResult<NetworkSignal> {
    let depth = config.propagation.max_depth;
    let downstream: Vec<RiskBand> = view
        .successors(&flight.flight_key, depth)
        .iter()
        .map(|k| preliminary_bands.get(k).copied().unwrap_or(RiskBand::Low))
        .collect();
    let propagated = propagated_criticality(&downstream, &config.criticality, depth);
    let (criticality, source, external_missing) =
        resolve_criticality(propagated, flight.external_criticality, config.criticality.mode);
    if external_missing {
        log::debug!("criticality: {} has no external score", flight.flight_key);
    }

    let cascade = propagate(view, &flight.flight_key, Perturbation::CurrentDelay, config, depth)?;
    Ok(NetworkSignal {
        criticality,
        source,
        external_missing,
        downstream_legs_affected: cascade.legs_affected(),
    })
}

/// Join a flight with its context from `view` and run the scorer.
pub fn score_in_view<V: OpsView + ?Sized>(
    view: &V,
    flight: &Flight,
    network: NetworkSignal,
    config: &EngineConfig,
) -> RiskRecord {
    let duty = view.duty_for_flight(&flight.flight_key);
    let ctx = ScoringContext {
        flight,
        departure:         view.airport(&flight.departure_station),
        arrival:           view.airport(&flight.arrival_station),
        crew_duty:         duty.as_deref(),
        departure_weather: view.weather_at(&flight.departure_station, flight.projected_departure()),
        arrival_weather:   view.weather_at(&flight.arrival_station, flight.projected_arrival()),
        aircraft:          view.aircraft_for(&flight.flight_key),
        network,
    };
    score(&ctx, config)
}
