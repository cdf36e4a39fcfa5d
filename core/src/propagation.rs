//! Propagation engine — how a delay at one leg cascades down its tail.
//!
//! Walk (hop numbers are 1-based):
//!   1. Hop 1 receives the origin delay.
//!   2. Each hop's own turn buffer absorbs what it can; the remainder is
//!      the delay carried by that leg.
//!   3. Delay entering hop k+1 is carried(k) * decay(k+1).
//!   4. A leg that absorbs everything contains the chain; the walk stops.
//!
//! Every affected hop re-derives its misconnect probability with the
//! carried delay and reports passenger, revenue and voucher deltas.
//! Network criticality is a separate signal computed from the bands of
//! the legs reachable within the depth limit.

use crate::{
    config::{CriticalityConfig, CriticalityMode, EngineConfig},
    error::{EngineError, EngineResult},
    overlay::OpsView,
    risk_scorer::{delayed_signals, CriticalitySource, RiskBand},
    types::{FlightKey, Minutes},
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Perturbation {
    /// Extra delay injected at the origin.
    AddedDelay { minutes: Minutes },
    /// The origin's own current arrival delay.
    CurrentDelay,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HopImpact {
    pub hop:                    usize,
    pub flight_key:             FlightKey,
    pub flight_number:          String,
    pub incoming_delay_minutes: f64,
    pub turn_buffer_minutes:    Minutes,
    pub carried_delay_minutes:  f64,
    pub misconnect_prob_before: f64,
    pub misconnect_prob_after:  f64,
    pub misconnect_pax_delta:   f64,
    pub revenue_delta_usd:      f64,
    pub voucher_delta_usd:      f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImpactReport {
    pub origin_flight_key:         FlightKey,
    pub perturbation:              Perturbation,
    pub origin_delay_minutes:      f64,
    pub max_depth:                 usize,
    /// Legs that carried delay, nearest first.
    pub hops:                      Vec<HopImpact>,
    /// Hop whose buffer absorbed the remaining delay, if any.
    pub contained_at_hop:          Option<usize>,
    pub total_misconnect_pax_delta: f64,
    pub total_revenue_delta_usd:   f64,
    pub total_voucher_delta_usd:   f64,
}

impl ImpactReport {
    pub fn legs_affected(&self) -> u32 {
        self.hops.len() as u32
    }
}

// ── Propagation ──────────────────────────────────────────────────────────────

pub fn propagate<V: OpsView + ?Sized>(
    view: &V,
    origin: &str,
    perturbation: Perturbation,
    config: &EngineConfig,
    max_depth: usize,
) -> EngineResult<ImpactReport> {
    let origin_flight = view
        .flight(origin)
        .ok_or_else(|| EngineError::flight_not_found(origin))?;

    let origin_delay = match perturbation {
        Perturbation::AddedDelay { minutes } => {
            if minutes < 0 {
                return Err(EngineError::InvalidRequest(format!(
                    "injected delay must be non-negative, got {minutes}"
                )));
            }
            minutes as f64
        }
        Perturbation::CurrentDelay => origin_flight.current_delay_arrival.max(0) as f64,
    };

    let mut report = ImpactReport {
        origin_flight_key:          origin.to_string(),
        perturbation,
        origin_delay_minutes:       origin_delay,
        max_depth,
        hops:                       Vec::new(),
        contained_at_hop:           None,
        total_misconnect_pax_delta: 0.0,
        total_revenue_delta_usd:    0.0,
        total_voucher_delta_usd:    0.0,
    };

    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(origin.to_string());

    let mut incoming = origin_delay;
    for (i, key) in view.successors(origin, max_depth).into_iter().enumerate() {
        let hop = i + 1;
        if hop > max_depth || !visited.insert(key.clone()) {
            break;
        }
        incoming *= config.propagation.decay.multiplier(hop);

        let Some(leg) = view.flight(&key) else {
            log::warn!("propagation: {key} is on a rotation but not in the snapshot");
            break;
        };
        let buffer = leg.turn_buffer_minutes.max(0);
        let carried = incoming - buffer as f64;
        if carried <= 0.0 {
            report.contained_at_hop = Some(hop);
            break;
        }

        let after = delayed_signals(&leg, carried, &config.signals);
        let dp = after.misconnect_prob - leg.misconnect_prob;
        let pax_delta = leg.connecting_pax() * dp;
        let voucher_delta: f64 = view
            .pnrs_for_flight(&key)
            .into_iter()
            .filter(|p| p.is_connecting())
            .map(|p| p.voucher_cost_usd * dp)
            .sum();

        let hop_impact = HopImpact {
            hop,
            flight_key:             key.clone(),
            flight_number:          leg.flight_number.clone(),
            incoming_delay_minutes: incoming,
            turn_buffer_minutes:    buffer,
            carried_delay_minutes:  carried,
            misconnect_prob_before: leg.misconnect_prob,
            misconnect_prob_after:  after.misconnect_prob,
            misconnect_pax_delta:   pax_delta,
            revenue_delta_usd:      pax_delta * leg.revenue_per_pax(),
            voucher_delta_usd:      voucher_delta,
        };
        report.total_misconnect_pax_delta += hop_impact.misconnect_pax_delta;
        report.total_revenue_delta_usd += hop_impact.revenue_delta_usd;
        report.total_voucher_delta_usd += hop_impact.voucher_delta_usd;
        report.hops.push(hop_impact);

        incoming = carried;
    }

    log::debug!(
        "propagation: {origin} {:?} -> {} hops, contained at {:?}, pax delta {:.2}",
        perturbation,
        report.hops.len(),
        report.contained_at_hop,
        report.total_misconnect_pax_delta
    );
    Ok(report)
}

// ── Network criticality ──────────────────────────────────────────────────────

/// Criticality from the bands of reachable downstream legs, in [0, 100].
/// `downstream` holds the band of each successor, nearest first.
pub fn propagated_criticality(
    downstream: &[RiskBand],
    cfg: &CriticalityConfig,
    max_depth: usize,
) -> f64 {
    if max_depth == 0 {
        return 0.0;
    }
    let reachable = &downstream[..downstream.len().min(max_depth)];
    let elevated = reachable.iter().filter(|b| **b >= RiskBand::Medium).count();
    let count_share = elevated as f64 / max_depth as f64;

    let severity: f64 = reachable
        .iter()
        .enumerate()
        .map(|(i, band)| {
            let weight = match band {
                RiskBand::High   => cfg.high_severity,
                RiskBand::Medium => cfg.medium_severity,
                RiskBand::Low    => 0.0,
            };
            weight / (i + 1) as f64
        })
        .sum();
    let max_severity: f64 = (1..=max_depth).map(|k| cfg.high_severity / k as f64).sum();
    let severity_share = if max_severity > 0.0 { severity / max_severity } else { 0.0 };

    let count_weight = cfg.count_weight.clamp(0.0, 1.0);
    (100.0 * (count_weight * count_share + (1.0 - count_weight) * severity_share)).clamp(0.0, 100.0)
}

/// Pick the criticality used for scoring under the configured mode.
/// Returns (value, source, external signal missing).
pub fn resolve_criticality(
    propagated: f64,
    external: Option<f64>,
    mode: CriticalityMode,
) -> (f64, CriticalitySource, bool) {
    let external = external.filter(|v| v.is_finite()).map(|v| v.clamp(0.0, 100.0));
    match (mode, external) {
        (CriticalityMode::Propagated, _) => (propagated, CriticalitySource::Propagated, false),
        (CriticalityMode::External, Some(ext)) => (ext, CriticalitySource::External, false),
        (CriticalityMode::Blended { external_weight }, Some(ext)) => (
            external_weight * ext + (1.0 - external_weight) * propagated,
            CriticalitySource::Blended,
            false,
        ),
        (_, None) => (propagated, CriticalitySource::Propagated, true),
    }
}
