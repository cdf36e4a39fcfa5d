//! Simulation service — what-if runs against an immutable baseline.
//!
//! Every operation:
//!   1. Validates its request against the baseline (NotFound / InvalidRequest).
//!   2. Builds a private `ScenarioView` holding only the patches it needs.
//!   3. Re-scores and re-propagates through that view.
//!   4. Returns deltas against the baseline plus a feasibility verdict.
//!
//! Nothing here writes to the baseline. Dropping a request half-way leaves
//! nothing to clean up.

use crate::{
    baseline::{score_flight, Baseline},
    config::EngineConfig,
    entity::{Aircraft, Flight},
    error::{EngineError, EngineResult},
    overlay::{DutyPatch, ScenarioView},
    propagation::{propagate, ImpactReport, Perturbation},
    risk_scorer::{RiskBand, RiskComponents, RiskFlags, RiskRecord},
    types::{DutyId, FlightKey, Minutes, TailNumber},
};
use serde::{Deserialize, Serialize};

/// Deltas smaller than this are treated as no change.
const CHANGE_EPSILON: f64 = 1e-9;

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Feasibility {
    Feasible,
    Infeasible { reasons: Vec<String> },
}

impl Feasibility {
    pub fn is_feasible(&self) -> bool {
        matches!(self, Self::Feasible)
    }
}

/// One flight's risk before and after a scenario.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlightRiskDelta {
    pub flight_key:        FlightKey,
    pub score_before:      f64,
    pub score_after:       f64,
    pub band_before:       RiskBand,
    pub band_after:        RiskBand,
    pub components_before: RiskComponents,
    pub components_after:  RiskComponents,
    pub flags_before:      RiskFlags,
    pub flags_after:       RiskFlags,
    pub misconnect_pax_before: u32,
    pub misconnect_pax_after:  u32,
    pub revenue_at_risk_before: f64,
    pub revenue_at_risk_after:  f64,
}

impl FlightRiskDelta {
    pub fn between(before: &RiskRecord, after: &RiskRecord) -> Self {
        Self {
            flight_key:        before.flight_key.clone(),
            score_before:      before.risk_score,
            score_after:       after.risk_score,
            band_before:       before.risk_band,
            band_after:        after.risk_band,
            components_before: before.components,
            components_after:  after.components,
            flags_before:      before.flags,
            flags_after:       after.flags,
            misconnect_pax_before: before.misconnect_pax_at_risk,
            misconnect_pax_after:  after.misconnect_pax_at_risk,
            revenue_at_risk_before: before.revenue_at_risk_usd,
            revenue_at_risk_after:  after.revenue_at_risk_usd,
        }
    }

    pub fn score_delta(&self) -> f64 {
        self.score_after - self.score_before
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DelaySimulation {
    pub flight_key:    FlightKey,
    pub delay_minutes: Minutes,
    pub verdict:       Feasibility,
    pub origin:        FlightRiskDelta,
    /// Downstream cascade of the injected delay.
    pub impact:        ImpactReport,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReserveCrewSimulation {
    pub duty_id:             DutyId,
    pub reserve_eta_minutes: Option<Minutes>,
    pub verdict:             Feasibility,
    /// One entry per flight on the duty, in duty order. Empty when infeasible.
    pub flights:             Vec<FlightRiskDelta>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChainOutcome {
    Improves,
    Worsens,
    Unchanged,
}

/// Net change for one swapped leg and the chain it now heads into.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChainDelta {
    pub flight_key:           FlightKey,
    pub tail_before:          TailNumber,
    pub tail_after:           TailNumber,
    pub risk:                 FlightRiskDelta,
    pub impact_before:        ImpactReport,
    pub impact_after:         ImpactReport,
    pub misconnect_pax_delta: f64,
    pub revenue_delta_usd:    f64,
    pub outcome:              ChainOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum TailSwapVerdict {
    Feasible { first: ChainOutcome, second: ChainOutcome },
    Infeasible { reasons: Vec<String> },
}

impl TailSwapVerdict {
    pub fn summary(&self) -> String {
        use ChainOutcome::*;
        match self {
            Self::Infeasible { .. } => "infeasible".into(),
            Self::Feasible { first, second } => match (first, second) {
                (Improves, Improves)   => "improves both chains".into(),
                (Worsens, Worsens)     => "worsens both chains".into(),
                (Unchanged, Unchanged) => "no net change".into(),
                (a, b) => format!("{} A, {} B", outcome_word(*a), outcome_word(*b)),
            },
        }
    }
}

fn outcome_word(outcome: ChainOutcome) -> &'static str {
    match outcome {
        ChainOutcome::Improves  => "improves",
        ChainOutcome::Worsens   => "worsens",
        ChainOutcome::Unchanged => "leaves unchanged",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TailSwapSimulation {
    pub first_flight:  FlightKey,
    pub second_flight: FlightKey,
    pub verdict:       TailSwapVerdict,
    pub first:         Option<ChainDelta>,
    pub second:        Option<ChainDelta>,
}

// ── Service ──────────────────────────────────────────────────────────────────

pub struct SimulationService<'a> {
    baseline: &'a Baseline,
    config:   &'a EngineConfig,
}

impl<'a> SimulationService<'a> {
    pub fn new(baseline: &'a Baseline, config: &'a EngineConfig) -> Self {
        Self { baseline, config }
    }

    fn baseline_record(&self, key: &str) -> EngineResult<&'a RiskRecord> {
        self.baseline
            .record(key)
            .ok_or_else(|| EngineError::flight_not_found(key))
    }

    fn rescore(&self, view: &ScenarioView<'_>, key: &str) -> EngineResult<RiskRecord> {
        score_flight(view, key, self.baseline.preliminary_bands(), self.config)
    }

    /// Inject `delay_minutes` at one flight and cascade it downstream.
    pub fn simulate_delay(&self, flight_key: &str, delay_minutes: Minutes) -> EngineResult<DelaySimulation> {
        let before = self.baseline_record(flight_key)?;
        if delay_minutes < 0 {
            return Err(EngineError::InvalidRequest(format!(
                "delay_minutes must be >= 0, got {delay_minutes}"
            )));
        }

        let mut view = ScenarioView::new(self.baseline.view(), &self.config.signals);
        view.add_delay(flight_key, delay_minutes);

        let after = self.rescore(&view, flight_key)?;
        let impact = propagate(
            &view,
            flight_key,
            Perturbation::AddedDelay { minutes: delay_minutes },
            self.config,
            self.config.propagation.max_depth,
        )?;

        log::debug!(
            "simulate_delay: {flight_key} +{delay_minutes}m -> score {:.1} -> {:.1}, downstream pax delta {:.2}",
            before.risk_score,
            after.risk_score,
            impact.total_misconnect_pax_delta
        );
        Ok(DelaySimulation {
            flight_key: flight_key.to_string(),
            delay_minutes,
            verdict: Feasibility::Feasible,
            origin: FlightRiskDelta::between(before, &after),
            impact,
        })
    }

    /// Cover the rest of a duty with a fresh reserve crew.
    pub fn simulate_reserve_crew(&self, duty_id: &str) -> EngineResult<ReserveCrewSimulation> {
        let snapshot = self.baseline.snapshot();
        let duty = snapshot
            .duty(duty_id)
            .ok_or_else(|| EngineError::duty_not_found(duty_id))?;

        if !duty.reserve_crew_available {
            log::warn!("simulate_reserve_crew: no reserve crew available for {duty_id}");
            return Ok(ReserveCrewSimulation {
                duty_id:             duty_id.to_string(),
                reserve_eta_minutes: duty.reserve_crew_eta_minutes,
                verdict:             Feasibility::Infeasible {
                    reasons: vec![format!("duty {duty_id} has no reserve crew available")],
                },
                flights:             Vec::new(),
            });
        }

        let mut view = ScenarioView::new(self.baseline.view(), &self.config.signals);
        view.patch_duty(duty_id, DutyPatch { fdp_used_minutes: 0, time_zone_span_hours: 0.0 });

        let mut flights = Vec::new();
        for key in snapshot.flights_for_duty(duty_id) {
            let before = self.baseline_record(key)?;
            let after = self.rescore(&view, key)?;
            flights.push(FlightRiskDelta::between(before, &after));
        }

        log::debug!(
            "simulate_reserve_crew: {duty_id} covers {} flights, {} fdp flags cleared",
            flights.len(),
            flights
                .iter()
                .filter(|f| f.flags_before.fdp_timeout_risk && !f.flags_after.fdp_timeout_risk)
                .count()
        );
        Ok(ReserveCrewSimulation {
            duty_id: duty_id.to_string(),
            reserve_eta_minutes: duty.reserve_crew_eta_minutes,
            verdict: Feasibility::Feasible,
            flights,
        })
    }

    /// Exchange the aircraft of two legs on different tails.
    pub fn simulate_tail_swap(&self, first: &str, second: &str) -> EngineResult<TailSwapSimulation> {
        let snapshot = self.baseline.snapshot();
        let graph = self.baseline.graph();
        let flight_a = snapshot.flight(first).ok_or_else(|| EngineError::flight_not_found(first))?;
        let flight_b = snapshot.flight(second).ok_or_else(|| EngineError::flight_not_found(second))?;

        let tail_a = graph.tail_of(first).ok_or_else(|| {
            EngineError::InvalidRequest(format!("flight {first} has no tail assignment"))
        })?;
        let tail_b = graph.tail_of(second).ok_or_else(|| {
            EngineError::InvalidRequest(format!("flight {second} has no tail assignment"))
        })?;
        if tail_a == tail_b {
            return Err(EngineError::InvalidRequest(format!(
                "flights {first} and {second} are both on tail {tail_a}"
            )));
        }

        let mut reasons = Vec::new();
        reasons.extend(self.capability_gap(flight_a, snapshot.aircraft(tail_b), tail_b));
        reasons.extend(self.capability_gap(flight_b, snapshot.aircraft(tail_a), tail_a));
        reasons.sort();
        if !reasons.is_empty() {
            log::warn!("simulate_tail_swap: {first} <-> {second} infeasible: {}", reasons.join("; "));
            return Ok(TailSwapSimulation {
                first_flight:  first.to_string(),
                second_flight: second.to_string(),
                verdict:       TailSwapVerdict::Infeasible { reasons },
                first:         None,
                second:        None,
            });
        }

        let (chain_a, chain_b) = graph.exchange_legs(first, second).ok_or_else(|| {
            EngineError::InvalidRequest(format!("cannot exchange {first} and {second}"))
        })?;
        let mut view = ScenarioView::new(self.baseline.view(), &self.config.signals);
        view.override_chain(chain_a);
        view.override_chain(chain_b);

        let first_delta = self.chain_delta(&view, first, tail_a, tail_b)?;
        let second_delta = self.chain_delta(&view, second, tail_b, tail_a)?;
        let verdict = TailSwapVerdict::Feasible {
            first:  first_delta.outcome,
            second: second_delta.outcome,
        };
        log::debug!("simulate_tail_swap: {first} <-> {second}: {}", verdict.summary());

        Ok(TailSwapSimulation {
            first_flight:  first.to_string(),
            second_flight: second.to_string(),
            verdict,
            first:         Some(first_delta),
            second:        Some(second_delta),
        })
    }

    /// Why `receiving` cannot legally fly `flight`, if it cannot.
    fn capability_gap(
        &self,
        flight: &Flight,
        receiving: Option<&Aircraft>,
        receiving_tail: &str,
    ) -> Option<String> {
        if !self.requires_etops(flight) {
            return None;
        }
        match receiving {
            Some(aircraft) if aircraft.etops_capable => None,
            Some(aircraft) => Some(format!(
                "{} needs an ETOPS-capable aircraft; {receiving_tail} ({}) is not",
                flight.flight_key, aircraft.fleet_type
            )),
            None => Some(format!(
                "{} needs an ETOPS-capable aircraft; no capability record for {receiving_tail}",
                flight.flight_key
            )),
        }
    }

    fn requires_etops(&self, flight: &Flight) -> bool {
        let snapshot = self.baseline.snapshot();
        let international = match (
            snapshot.airport(&flight.departure_station),
            snapshot.airport(&flight.arrival_station),
        ) {
            (Some(dep), Some(arr)) => dep.country != arr.country,
            _ => false,
        };
        international || flight.block_time_minutes >= self.config.fleet.etops_block_minutes
    }

    fn chain_delta(
        &self,
        view: &ScenarioView<'_>,
        key: &str,
        tail_before: &str,
        tail_after: &str,
    ) -> EngineResult<ChainDelta> {
        let depth = self.config.propagation.max_depth;
        let before = self.baseline_record(key)?;
        let after = self.rescore(view, key)?;
        let impact_before =
            propagate(&self.baseline.view(), key, Perturbation::CurrentDelay, self.config, depth)?;
        let impact_after = propagate(view, key, Perturbation::CurrentDelay, self.config, depth)?;

        let misconnect_pax_delta =
            impact_after.total_misconnect_pax_delta - impact_before.total_misconnect_pax_delta;
        let revenue_delta_usd = (impact_after.total_revenue_delta_usd
            + impact_after.total_voucher_delta_usd)
            - (impact_before.total_revenue_delta_usd + impact_before.total_voucher_delta_usd);
        let risk = FlightRiskDelta::between(before, &after);
        let outcome = classify(misconnect_pax_delta, risk.score_delta());

        Ok(ChainDelta {
            flight_key: key.to_string(),
            tail_before: tail_before.to_string(),
            tail_after: tail_after.to_string(),
            risk,
            impact_before,
            impact_after,
            misconnect_pax_delta,
            revenue_delta_usd,
            outcome,
        })
    }
}

/// Passenger impact decides; the leg's own score breaks ties.
fn classify(misconnect_pax_delta: f64, score_delta: f64) -> ChainOutcome {
    if misconnect_pax_delta < -CHANGE_EPSILON {
        ChainOutcome::Improves
    } else if misconnect_pax_delta > CHANGE_EPSILON {
        ChainOutcome::Worsens
    } else if score_delta < -CHANGE_EPSILON {
        ChainOutcome::Improves
    } else if score_delta > CHANGE_EPSILON {
        ChainOutcome::Worsens
    } else {
        ChainOutcome::Unchanged
    }
}

