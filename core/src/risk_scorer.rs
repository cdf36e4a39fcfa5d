//! Risk scorer — one flight plus its joined context to one `RiskRecord`.
//!
//! Pure and total: a missing input zeroes the component it feeds and is
//! listed in `missing_signals`; scoring never fails.
//!
//! Total score:
//!   delay_risk * w_delay + (1 - turn_success) * 100 * w_turn
//!   + misconnect * 100 * w_misconnect + criticality * w_network
//!
//! The four components are attribution figures. Each is clamped to its
//! ceiling and then scaled by total / sum(ceilings), so together they never
//! exceed the total and each depends only on its own inputs and the total.

use crate::{
    config::{
        ComponentCeilings, CrewConfig, EngineConfig, EnvironmentConfig, MaintenanceConfig,
        SignalConfig,
    },
    entity::{Aircraft, Airport, CrewDuty, Flight, FlightStatus, WeatherRecord},
    types::{FlightKey, Minutes},
};
use chrono::Timelike;
use serde::{Deserialize, Serialize};

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

impl RiskBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low    => "Low",
            Self::Medium => "Medium",
            Self::High   => "High",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct RiskComponents {
    pub crew_legality:       f64,
    pub airport_environment: f64,
    pub passenger:           f64,
    pub maintenance:         f64,
}

impl RiskComponents {
    pub fn sum(&self) -> f64 {
        self.crew_legality + self.airport_environment + self.passenger + self.maintenance
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RiskFlags {
    pub fdp_timeout_risk: bool,
    pub curfew_risk:      bool,
    pub mel_risk:         bool,
    pub turn_risk:        bool,
}

/// Inputs the scorer could not find. Recovered locally, never fatal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MissingSignal {
    DepartureAirport,
    ArrivalAirport,
    CrewDuty,
    Aircraft,
    DepartureWeather,
    ArrivalWeather,
    ExternalCriticality,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CriticalitySource {
    Propagated,
    External,
    Blended,
}

/// Network-level inputs, produced by the propagation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkSignal {
    pub criticality:              f64,
    pub source:                   CriticalitySource,
    pub external_missing:         bool,
    pub downstream_legs_affected: u32,
}

impl NetworkSignal {
    /// Placeholder used before criticality is known.
    pub fn provisional(external: Option<f64>) -> Self {
        Self {
            criticality:              external.unwrap_or(0.0).clamp(0.0, 100.0),
            source:                   CriticalitySource::External,
            external_missing:         false,
            downstream_legs_affected: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskRecord {
    pub flight_key:               FlightKey,
    pub risk_score:               f64,
    pub risk_band:                RiskBand,
    pub network_impact_score:     f64,
    pub network_impact_band:      RiskBand,
    pub components:               RiskComponents,
    pub flags:                    RiskFlags,
    pub downstream_legs_affected: u32,
    pub misconnect_pax_at_risk:   u32,
    pub revenue_at_risk_usd:      f64,
    pub criticality_source:       CriticalitySource,
    pub missing_signals:          Vec<MissingSignal>,
}

/// Everything the scorer reads for one flight.
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub flight:            &'a Flight,
    pub departure:         Option<&'a Airport>,
    pub arrival:           Option<&'a Airport>,
    pub crew_duty:         Option<&'a CrewDuty>,
    pub departure_weather: Option<&'a WeatherRecord>,
    pub arrival_weather:   Option<&'a WeatherRecord>,
    pub aircraft:          Option<&'a Aircraft>,
    pub network:           NetworkSignal,
}

// ── Scoring ──────────────────────────────────────────────────────────────────

pub fn score(ctx: &ScoringContext<'_>, config: &EngineConfig) -> RiskRecord {
    let flight = ctx.flight;
    let mut missing = Vec::new();
    if ctx.departure.is_none()         { missing.push(MissingSignal::DepartureAirport); }
    if ctx.arrival.is_none()           { missing.push(MissingSignal::ArrivalAirport); }
    if ctx.crew_duty.is_none()         { missing.push(MissingSignal::CrewDuty); }
    if ctx.aircraft.is_none()          { missing.push(MissingSignal::Aircraft); }
    if ctx.departure_weather.is_none() { missing.push(MissingSignal::DepartureWeather); }
    if ctx.arrival_weather.is_none()   { missing.push(MissingSignal::ArrivalWeather); }
    if ctx.network.external_missing    { missing.push(MissingSignal::ExternalCriticality); }

    let total = blend_score(flight, ctx.network.criticality, config);

    let (crew_raw, fdp_timeout_risk) = match ctx.crew_duty {
        Some(duty) => crew_legality(flight, duty, &config.crew, &config.ceilings),
        None => (0.0, false),
    };
    let (env_raw, curfew_risk) = airport_environment(ctx, &config.environment, &config.ceilings);
    let pax_raw = passenger(flight, config);
    let (mx_raw, mel_risk) = match ctx.aircraft {
        Some(aircraft) => maintenance(aircraft, &config.maintenance, &config.ceilings),
        None => (0.0, false),
    };

    let scale = total / config.ceilings.total();
    let components = RiskComponents {
        crew_legality:       crew_raw * scale,
        airport_environment: env_raw * scale,
        passenger:           pax_raw * scale,
        maintenance:         mx_raw * scale,
    };

    let flags = RiskFlags {
        fdp_timeout_risk,
        curfew_risk,
        mel_risk,
        turn_risk: flight.turn_success_prob < config.signals.turn_risk_threshold,
    };

    let network_impact_score = ctx.network.criticality.clamp(0.0, 100.0);

    RiskRecord {
        flight_key: flight.flight_key.clone(),
        risk_score: total,
        risk_band: config.bands.classify(total),
        network_impact_score,
        network_impact_band: config.bands.classify(network_impact_score),
        components,
        flags,
        downstream_legs_affected: ctx.network.downstream_legs_affected,
        misconnect_pax_at_risk: misconnect_pax_at_risk(flight),
        revenue_at_risk_usd: revenue_at_risk(flight, &config.signals),
        criticality_source: ctx.network.source,
        missing_signals: missing,
    }
}

/// Weighted blend of the flight's derived signals, clamped to [0, 100].
pub fn blend_score(flight: &Flight, criticality: f64, config: &EngineConfig) -> f64 {
    let w = &config.scoring;
    let raw = flight.delay_risk_score * w.delay_risk
        + (1.0 - flight.turn_success_prob) * 100.0 * w.turn_failure
        + flight.misconnect_prob * 100.0 * w.misconnect
        + criticality * w.network_criticality;
    if raw.is_finite() { raw.clamp(0.0, 100.0) } else { 0.0 }
}

pub fn misconnect_pax_at_risk(flight: &Flight) -> u32 {
    (flight.connecting_pax() * flight.misconnect_prob.clamp(0.0, 1.0)).floor() as u32
}

pub fn revenue_at_risk(flight: &Flight, signals: &SignalConfig) -> f64 {
    let delay = flight.current_delay_departure.max(0) as f64;
    let share = if delay > 0.0 {
        (delay / 60.0 + 0.1).min(1.0)
    } else {
        signals.on_time_revenue_share
    };
    flight.revenue_exposure_usd * share
}

// ── Delay-driven signals ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedSignals {
    pub delay_risk_score:  f64,
    pub turn_success_prob: f64,
    pub misconnect_prob:   f64,
}

/// Signals of `flight` after `added_minutes` of extra delay.
/// Monotonic in the added delay; zero added delay returns the inputs.
pub fn delayed_signals(flight: &Flight, added_minutes: f64, cfg: &SignalConfig) -> DerivedSignals {
    let added = added_minutes.max(0.0);
    let turn_floor = cfg.turn_success_floor.min(flight.turn_success_prob);
    let misconnect_cap = cfg.misconnect_cap.max(flight.misconnect_prob);
    DerivedSignals {
        delay_risk_score: (flight.delay_risk_score + added * cfg.delay_risk_per_minute)
            .min(flight.delay_risk_score.max(100.0)),
        turn_success_prob: (flight.turn_success_prob - added * cfg.turn_success_per_minute)
            .max(turn_floor),
        misconnect_prob: (flight.misconnect_prob
            + flight.connecting_pax_pct * added * cfg.misconnect_per_minute)
            .min(misconnect_cap),
    }
}

/// Push `added` minutes onto a (cloned) flight and re-derive its signals.
pub fn apply_added_delay(flight: &mut Flight, added: Minutes, cfg: &SignalConfig) {
    if added <= 0 {
        return;
    }
    let derived = delayed_signals(flight, added as f64, cfg);
    flight.current_delay_departure += added;
    flight.current_delay_arrival += added;
    flight.delay_risk_score = derived.delay_risk_score;
    flight.turn_success_prob = derived.turn_success_prob;
    flight.misconnect_prob = derived.misconnect_prob;
    if flight.status == FlightStatus::Scheduled {
        flight.status = FlightStatus::Delayed;
    }
}

// ── Components ───────────────────────────────────────────────────────────────

/// Returns (raw component, fdp-timeout flag).
fn crew_legality(
    flight: &Flight,
    duty: &CrewDuty,
    cfg: &CrewConfig,
    ceilings: &ComponentCeilings,
) -> (f64, bool) {
    let limit = duty.fdp_limit_minutes.max(1);
    let delay = flight.current_delay_departure.max(0);
    let projected_release = duty.fdp_used_minutes + delay + cfg.release_allowance_minutes;
    let timeout = projected_release >= limit;

    if timeout {
        return (ceilings.crew_legality, true);
    }

    let used_share = (duty.fdp_used_minutes as f64 / limit as f64).clamp(0.0, 1.0);
    let remaining = (limit - duty.fdp_used_minutes - delay).max(0) as f64;
    let window = cfg.pressure_window_minutes.max(1) as f64;
    // Quadratic ramp: flat while plenty remains, steep near zero.
    let pressure = (1.0 - (remaining / window).min(1.0)).powi(2);
    let mut time_zone = cfg.time_zone_penalty_per_hour * duty.time_zone_span_hours.max(0.0);
    if duty.augmented_crew_flag {
        time_zone *= 0.5;
    }

    let fraction = (0.25 * used_share + 0.75 * pressure + time_zone).clamp(0.0, 1.0);
    (ceilings.crew_legality * fraction, false)
}

fn weather_severity(w: &WeatherRecord) -> f64 {
    (0.5 * w.convective_index + 0.3 * w.visibility.index() + 0.2 * w.icing_index).clamp(0.0, 1.0)
}

/// Returns (raw component, curfew flag).
fn airport_environment(
    ctx: &ScoringContext<'_>,
    cfg: &EnvironmentConfig,
    ceilings: &ComponentCeilings,
) -> (f64, bool) {
    let weather = ctx
        .departure_weather
        .iter()
        .chain(ctx.arrival_weather.iter())
        .map(|w| weather_severity(w))
        .fold(0.0_f64, f64::max);

    let saturation = cfg.edct_saturation_minutes.max(1) as f64;
    let mut edct = 0;
    if let Some(dep) = ctx.departure.filter(|a| a.gdp_active_flag) {
        edct = edct.max(dep.gdp_avg_delay_minutes);
    }
    for w in ctx.departure_weather.iter().chain(ctx.arrival_weather.iter()) {
        if w.flow_program {
            edct = edct.max(w.edct_delay_mean);
        }
    }
    let flow = (edct.max(0) as f64 / saturation).min(1.0);

    let congestion = ctx
        .departure
        .iter()
        .chain(ctx.arrival.iter())
        .map(|a| a.atc_congestion_index)
        .fold(0.0_f64, f64::max)
        .clamp(0.0, 1.0);
    let slot = ctx
        .departure
        .iter()
        .chain(ctx.arrival.iter())
        .any(|a| a.slot_controlled_flag);

    let curfew = ctx
        .arrival
        .map(|arr| curfew_at_risk(arr, ctx.flight, cfg.curfew_buffer_minutes))
        .unwrap_or(false);

    let fraction = cfg.weather_weight * weather
        + cfg.flow_program_weight * flow
        + cfg.congestion_weight * congestion
        + cfg.slot_weight * if slot { 1.0 } else { 0.0 }
        + cfg.curfew_weight * if curfew { 1.0 } else { 0.0 };
    (ceilings.environment * fraction.clamp(0.0, 1.0), curfew)
}

/// True when the projected local arrival lands inside the curfew window or
/// within `buffer` minutes before it opens.
pub fn curfew_at_risk(arrival: &Airport, flight: &Flight, buffer: Minutes) -> bool {
    let Some((start, end)) = arrival.curfew() else {
        return false;
    };
    let local = arrival.to_local(flight.projected_arrival()).time();
    let minute_of_day = |t: chrono::NaiveTime| (t.num_seconds_from_midnight() / 60) as i64;
    let (t, s, e) = (minute_of_day(local), minute_of_day(start), minute_of_day(end));

    let inside = if s <= e { t >= s && t < e } else { t >= s || t < e };
    if inside {
        return true;
    }
    let until_start = (s - t).rem_euclid(24 * 60);
    until_start > 0 && until_start <= buffer
}

fn passenger(flight: &Flight, config: &EngineConfig) -> f64 {
    let cfg = &config.passenger;
    let expected = flight.connecting_pax() * flight.misconnect_prob.clamp(0.0, 1.0);
    let weighted = expected * (1.0 + cfg.elite_weight * flight.elite_share());
    let saturation = cfg.saturation_pax.max(1.0);
    config.ceilings.passenger * (weighted / saturation).min(1.0)
}

/// Returns (raw component, mel flag).
fn maintenance(
    aircraft: &Aircraft,
    cfg: &MaintenanceConfig,
    ceilings: &ComponentCeilings,
) -> (f64, bool) {
    let aog = aircraft.aog_risk_score.clamp(0.0, 1.0);
    let (severity, flagged) = match &aircraft.mel {
        Some(item) => (
            MaintenanceConfig::severity_index(item.severity),
            cfg.mel_risk_severities.contains(&item.severity),
        ),
        None => (0.0, false),
    };
    let fraction = (cfg.severity_weight * severity + cfg.aog_weight * aog).clamp(0.0, 1.0);
    (ceilings.maintenance * fraction, flagged)
}
