//! Read views over a baseline, with an optional copy-on-write overlay.
//!
//! RULE: scorer and propagation code reads entities only through
//! `OpsView`. A `ScenarioView` consults its small patch maps first and
//! falls back to the shared baseline, so a simulation never copies the
//! entity store and never writes to it.

use crate::{
    config::SignalConfig,
    entity::{Aircraft, Airport, CrewDuty, Flight, PnrTrip, WeatherRecord},
    risk_scorer::apply_added_delay,
    rotation_graph::{RotationGraph, TailChain},
    snapshot::OpsSnapshot,
    types::{DutyId, FlightKey, Minutes},
};
use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

pub trait OpsView {
    fn snapshot(&self) -> &OpsSnapshot;

    fn flight(&self, key: &str) -> Option<Cow<'_, Flight>>;

    fn duty_for_flight(&self, key: &str) -> Option<Cow<'_, CrewDuty>>;

    fn tail_of(&self, key: &str) -> Option<&str>;

    /// Legs after `key` on its tail, nearest first, at most `max_depth`.
    fn successors(&self, key: &str, max_depth: usize) -> Vec<FlightKey>;

    fn airport(&self, code: &str) -> Option<&Airport> {
        self.snapshot().airport(code)
    }

    fn aircraft_for(&self, key: &str) -> Option<&Aircraft> {
        let tail = self.tail_of(key)?;
        self.snapshot().aircraft(tail)
    }

    fn weather_at(&self, station: &str, at: DateTime<Utc>) -> Option<&WeatherRecord> {
        self.snapshot().weather_at(station, at)
    }

    fn pnrs_for_flight(&self, key: &str) -> Vec<&PnrTrip> {
        self.snapshot().pnrs_for_flight(key).collect()
    }
}

// ── Baseline view ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct BaseView<'a> {
    pub snapshot: &'a OpsSnapshot,
    pub graph:    &'a RotationGraph,
}

impl<'a> OpsView for BaseView<'a> {
    fn snapshot(&self) -> &OpsSnapshot {
        self.snapshot
    }

    fn flight(&self, key: &str) -> Option<Cow<'_, Flight>> {
        self.snapshot.flight(key).map(Cow::Borrowed)
    }

    fn duty_for_flight(&self, key: &str) -> Option<Cow<'_, CrewDuty>> {
        self.snapshot.duty_for_flight(key).map(Cow::Borrowed)
    }

    fn tail_of(&self, key: &str) -> Option<&str> {
        self.graph.tail_of(key).map(|t| t.as_str())
    }

    fn successors(&self, key: &str, max_depth: usize) -> Vec<FlightKey> {
        self.graph.successors(key, max_depth)
    }
}

// ── Scenario overlay ─────────────────────────────────────────────────────────

/// Replacement crew state for one duty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DutyPatch {
    pub fdp_used_minutes:     Minutes,
    pub time_zone_span_hours: f64,
}

pub struct ScenarioView<'a> {
    base:           BaseView<'a>,
    signals:        &'a SignalConfig,
    added_delay:    BTreeMap<FlightKey, Minutes>,
    duty_patches:   BTreeMap<DutyId, DutyPatch>,
    chains:         Vec<TailChain>,
    chain_index:    HashMap<FlightKey, (usize, usize)>,
}

impl<'a> ScenarioView<'a> {
    pub fn new(base: BaseView<'a>, signals: &'a SignalConfig) -> Self {
        Self {
            base,
            signals,
            added_delay:  BTreeMap::new(),
            duty_patches: BTreeMap::new(),
            chains:       Vec::new(),
            chain_index:  HashMap::new(),
        }
    }

    pub fn base(&self) -> BaseView<'a> {
        self.base
    }

    /// Add extra departure/arrival delay to one flight.
    pub fn add_delay(&mut self, key: &str, minutes: Minutes) {
        *self.added_delay.entry(key.to_string()).or_insert(0) += minutes.max(0);
    }

    pub fn patch_duty(&mut self, duty_id: &str, patch: DutyPatch) {
        self.duty_patches.insert(duty_id.to_string(), patch);
    }

    /// Replace whole tail chains. Legs listed here take their tail and
    /// successors from the override instead of the baseline graph.
    pub fn override_chain(&mut self, chain: TailChain) {
        let idx = self.chains.len();
        for (position, key) in chain.legs.iter().enumerate() {
            self.chain_index.insert(key.clone(), (idx, position));
        }
        self.chains.push(chain);
    }
}

impl<'a> OpsView for ScenarioView<'a> {
    fn snapshot(&self) -> &OpsSnapshot {
        self.base.snapshot
    }

    fn flight(&self, key: &str) -> Option<Cow<'_, Flight>> {
        let base = self.base.snapshot.flight(key)?;
        let added = self.added_delay.get(key).copied().unwrap_or(0);
        let new_tail = self
            .chain_index
            .get(key)
            .map(|&(idx, _)| &self.chains[idx].tail_number)
            .filter(|t| base.tail_number.as_ref() != Some(*t));

        if added == 0 && new_tail.is_none() {
            return Some(Cow::Borrowed(base));
        }
        let mut flight = base.clone();
        apply_added_delay(&mut flight, added, self.signals);
        if let Some(tail) = new_tail {
            if let Some(aircraft) = self.base.snapshot.aircraft(tail) {
                flight.fleet_type = aircraft.fleet_type.clone();
            }
            flight.tail_number = Some(tail.clone());
        }
        Some(Cow::Owned(flight))
    }

    fn duty_for_flight(&self, key: &str) -> Option<Cow<'_, CrewDuty>> {
        let duty = self.base.snapshot.duty_for_flight(key)?;
        match self.duty_patches.get(&duty.duty_id) {
            Some(patch) => {
                let mut patched = duty.clone();
                patched.fdp_used_minutes = patch.fdp_used_minutes;
                patched.time_zone_span_hours = patch.time_zone_span_hours;
                Some(Cow::Owned(patched))
            }
            None => Some(Cow::Borrowed(duty)),
        }
    }

    fn tail_of(&self, key: &str) -> Option<&str> {
        match self.chain_index.get(key) {
            Some(&(idx, _)) => Some(self.chains[idx].tail_number.as_str()),
            None => self.base.tail_of(key),
        }
    }

    fn successors(&self, key: &str, max_depth: usize) -> Vec<FlightKey> {
        match self.chain_index.get(key) {
            Some(&(idx, position)) => self.chains[idx].walk_from(position, max_depth),
            None => self.base.successors(key, max_depth),
        }
    }
}
