//! The IROP engine — query and simulation entry point.
//!
//! LIFECYCLE:
//!   1. `new` validates the config and builds generation 1 from a snapshot.
//!   2. Queries and simulations read whichever baseline is current when
//!      they start, and keep that `Arc` until they finish.
//!   3. `refresh` builds the next generation off to the side and publishes
//!      it in one swap. Readers never see a half-built baseline.
//!
//! RULES:
//!   - Scoring, propagation and simulation never touch the journal.
//!   - Journal failures are logged and swallowed; they never change a result.
//!   - No request mutates a published baseline.

use crate::{
    baseline::{BandCounts, Baseline},
    command::{SimulationOutcome, SimulationRequest},
    config::EngineConfig,
    error::{EngineError, EngineResult},
    event::{EngineEvent, EventLogEntry},
    propagation::{propagate, ImpactReport, Perturbation},
    risk_scorer::{RiskBand, RiskRecord},
    simulation::{DelaySimulation, ReserveCrewSimulation, SimulationService, TailSwapSimulation},
    snapshot::OpsSnapshot,
    store::EngineStore,
    types::{FlightKey, Generation, Minutes, StationCode},
};
use serde::{Deserialize, Serialize};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, PoisonError, RwLock,
};
use uuid::Uuid;

// ── Publisher ────────────────────────────────────────────────────────────────

/// Holds the current baseline. Publishing replaces the whole `Arc` at once.
pub struct BaselinePublisher {
    current: RwLock<Arc<Baseline>>,
}

impl BaselinePublisher {
    pub fn new(initial: Baseline) -> Self {
        Self { current: RwLock::new(Arc::new(initial)) }
    }

    pub fn current(&self) -> Arc<Baseline> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap in `next` if it is newer than the current baseline. Returns
    /// whichever baseline is current once the lock is released.
    pub fn publish(&self, next: Baseline) -> Arc<Baseline> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if next.generation() <= guard.generation() {
            log::warn!(
                "publisher: dropped baseline {} (baseline {} already published)",
                next.generation(),
                guard.generation()
            );
            return Arc::clone(&guard);
        }
        let next = Arc::new(next);
        let previous = std::mem::replace(&mut *guard, Arc::clone(&next));
        log::info!(
            "publisher: published baseline {} (replaced {})",
            next.generation(),
            previous.generation()
        );
        next
    }
}

// ── Query results ────────────────────────────────────────────────────────────

/// One leg in a downstream-chain listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChainLegSummary {
    pub hop:                    usize,
    pub flight_key:             FlightKey,
    pub flight_number:          String,
    pub departure_station:      StationCode,
    pub arrival_station:        StationCode,
    pub risk_score:             f64,
    pub risk_band:              RiskBand,
    pub misconnect_pax_at_risk: u32,
    /// Current delay carried into this leg; 0 once the chain is contained.
    pub carried_delay_minutes:  f64,
}

// ── Engine ───────────────────────────────────────────────────────────────────

pub struct IropEngine {
    config:          EngineConfig,
    publisher:       BaselinePublisher,
    next_generation: AtomicU64,
    journal:         Option<Mutex<EngineStore>>,
}

impl IropEngine {
    pub fn new(config: EngineConfig, snapshot: OpsSnapshot) -> EngineResult<Self> {
        config.validate()?;
        let baseline = Baseline::build(1, snapshot, &config)?;
        Ok(Self {
            config,
            publisher:       BaselinePublisher::new(baseline),
            next_generation: AtomicU64::new(2),
            journal:         None,
        })
    }

    /// Attach an audit journal. The current baseline is journaled at once.
    pub fn with_journal(mut self, store: EngineStore) -> EngineResult<Self> {
        store.migrate()?;
        self.journal = Some(Mutex::new(store));
        let current = self.baseline();
        self.journal_baseline(&current);
        Ok(self)
    }

    /// Run a read against the attached journal.
    pub fn with_store<R>(&self, f: impl FnOnce(&EngineStore) -> EngineResult<R>) -> EngineResult<R> {
        let journal = self
            .journal
            .as_ref()
            .ok_or_else(|| EngineError::InvalidRequest("no journal attached".into()))?;
        let store = journal.lock().unwrap_or_else(PoisonError::into_inner);
        f(&store)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The baseline current at the time of the call.
    pub fn baseline(&self) -> Arc<Baseline> {
        self.publisher.current()
    }

    pub fn generation(&self) -> Generation {
        self.baseline().generation()
    }

    /// Build a baseline from a fresh snapshot and publish it.
    /// On error the current baseline stays published. A build overtaken by
    /// a newer concurrent refresh is dropped and the newer one is returned.
    pub fn refresh(&self, snapshot: OpsSnapshot) -> EngineResult<Arc<Baseline>> {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let baseline = Baseline::build(generation, snapshot, &self.config)?;
        let current = self.publisher.publish(baseline);
        if current.generation() == generation {
            self.journal_baseline(&current);
        }
        Ok(current)
    }

    // ── Queries ────────────────────────────────────────────────

    pub fn risk_record(&self, flight_key: &str) -> EngineResult<RiskRecord> {
        self.baseline()
            .record(flight_key)
            .cloned()
            .ok_or_else(|| EngineError::flight_not_found(flight_key))
    }

    pub fn top_risks(&self, n: usize) -> Vec<RiskRecord> {
        self.baseline().top_risks(n).into_iter().cloned().collect()
    }

    pub fn band_counts(&self) -> BandCounts {
        self.baseline().band_counts()
    }

    pub fn impact_report(&self, flight_key: &str, perturbation: Perturbation) -> EngineResult<ImpactReport> {
        let baseline = self.baseline();
        propagate(
            &baseline.view(),
            flight_key,
            perturbation,
            &self.config,
            self.config.propagation.max_depth,
        )
    }

    /// Legs after `flight_key` on its tail within the depth limit, with the
    /// current delay each one carries.
    pub fn downstream_chain(&self, flight_key: &str) -> EngineResult<Vec<ChainLegSummary>> {
        let baseline = self.baseline();
        let depth = self.config.propagation.max_depth;
        let cascade = propagate(&baseline.view(), flight_key, Perturbation::CurrentDelay, &self.config, depth)?;

        let mut legs = Vec::new();
        for (i, key) in baseline.graph().successors(flight_key, depth).into_iter().enumerate() {
            let (Some(flight), Some(record)) = (baseline.snapshot().flight(&key), baseline.record(&key)) else {
                log::warn!("engine: chain leg {key} missing from baseline");
                continue;
            };
            let carried = cascade
                .hops
                .iter()
                .find(|h| h.flight_key == key)
                .map(|h| h.carried_delay_minutes)
                .unwrap_or(0.0);
            legs.push(ChainLegSummary {
                hop:                    i + 1,
                flight_key:             key.clone(),
                flight_number:          flight.flight_number.clone(),
                departure_station:      flight.departure_station.clone(),
                arrival_station:        flight.arrival_station.clone(),
                risk_score:             record.risk_score,
                risk_band:              record.risk_band,
                misconnect_pax_at_risk: record.misconnect_pax_at_risk,
                carried_delay_minutes:  carried,
            });
        }
        Ok(legs)
    }

    // ── Simulation ─────────────────────────────────────────────

    /// Run one what-if against the current baseline.
    pub fn simulate(&self, request: &SimulationRequest) -> EngineResult<SimulationOutcome> {
        let baseline = self.baseline();
        let request_id = Uuid::new_v4().to_string();
        let service = SimulationService::new(&baseline, &self.config);

        let result = match request {
            SimulationRequest::Delay { flight_key, delay_minutes } => service
                .simulate_delay(flight_key, *delay_minutes)
                .map(SimulationOutcome::Delay),
            SimulationRequest::ReserveCrew { duty_id } => service
                .simulate_reserve_crew(duty_id)
                .map(SimulationOutcome::ReserveCrew),
            SimulationRequest::TailSwap { first_flight, second_flight } => service
                .simulate_tail_swap(first_flight, second_flight)
                .map(SimulationOutcome::TailSwap),
        };

        let event = match &result {
            Ok(outcome) => EngineEvent::SimulationCompleted {
                generation: baseline.generation(),
                request_id,
                kind:       request.kind().to_string(),
                feasible:   outcome.is_feasible(),
                request:    serde_json::to_value(request).unwrap_or(serde_json::Value::Null),
            },
            Err(e) => {
                log::warn!("engine: {} request rejected: {e}", request.kind());
                EngineEvent::SimulationRejected {
                    generation: baseline.generation(),
                    request_id,
                    kind:       request.kind().to_string(),
                    reason:     e.to_string(),
                }
            }
        };
        self.journal_events(std::slice::from_ref(&event));
        result
    }

    pub fn simulate_delay(&self, flight_key: &str, delay_minutes: Minutes) -> EngineResult<DelaySimulation> {
        let request = SimulationRequest::Delay { flight_key: flight_key.to_string(), delay_minutes };
        match self.simulate(&request)? {
            SimulationOutcome::Delay(d) => Ok(d),
            other => Err(unexpected_outcome(&request, &other)),
        }
    }

    pub fn simulate_reserve_crew(&self, duty_id: &str) -> EngineResult<ReserveCrewSimulation> {
        let request = SimulationRequest::ReserveCrew { duty_id: duty_id.to_string() };
        match self.simulate(&request)? {
            SimulationOutcome::ReserveCrew(r) => Ok(r),
            other => Err(unexpected_outcome(&request, &other)),
        }
    }

    pub fn simulate_tail_swap(&self, first: &str, second: &str) -> EngineResult<TailSwapSimulation> {
        let request = SimulationRequest::TailSwap {
            first_flight:  first.to_string(),
            second_flight: second.to_string(),
        };
        match self.simulate(&request)? {
            SimulationOutcome::TailSwap(t) => Ok(t),
            other => Err(unexpected_outcome(&request, &other)),
        }
    }

    // ── Journal ────────────────────────────────────────────────

    fn journal_baseline(&self, baseline: &Baseline) {
        let Some(journal) = &self.journal else { return };
        let mut events = vec![EngineEvent::BaselinePublished {
            generation:   baseline.generation(),
            flight_count: baseline.snapshot().flight_count(),
            tail_count:   baseline.graph().chains().len(),
            bands:        baseline.band_counts(),
        }];
        for record in baseline.records() {
            for signal in &record.missing_signals {
                events.push(EngineEvent::MissingSignal {
                    generation: baseline.generation(),
                    flight_key: record.flight_key.clone(),
                    signal:     *signal,
                });
            }
        }

        let result = (|| -> EngineResult<()> {
            let mut store = journal.lock().unwrap_or_else(PoisonError::into_inner);
            store.insert_baseline(baseline, &serde_json::to_string(&self.config)?)?;
            store.save_risk_records(baseline.generation(), baseline.records())?;
            Ok(())
        })();
        if let Err(e) = result {
            log::warn!("journal: baseline {} not recorded: {e}", baseline.generation());
        }
        self.journal_events(&events);
    }

    fn journal_events(&self, events: &[EngineEvent]) {
        let Some(journal) = &self.journal else { return };
        let store = journal.lock().unwrap_or_else(PoisonError::into_inner);
        for event in events {
            let written = EventLogEntry::from_event(event)
                .map_err(EngineError::from)
                .and_then(|entry| store.append_event(&entry));
            if let Err(e) = written {
                log::warn!("journal: {} event not recorded: {e}", event.type_name());
            }
        }
    }
}

fn unexpected_outcome(request: &SimulationRequest, outcome: &SimulationOutcome) -> EngineError {
    EngineError::Other(anyhow::anyhow!(
        "{} request produced a mismatched outcome: {outcome:?}",
        request.kind()
    ))
}
