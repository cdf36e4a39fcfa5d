//! Operational entities for one day, exactly as ingested.
//!
//! RULE: nothing in the engine mutates these records. Simulations
//! describe their changes as overlay patches (see overlay.rs).

use crate::types::{DutyId, FlightKey, Minutes, StationCode, TailNumber};
use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

// ── Airport ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Airport {
    pub station_code:          StationCode,
    pub hub_flag:              bool,
    pub country:               String,
    #[serde(default)]
    pub region:                String,
    pub gate_count:            u32,
    pub widebody_gate_count:   u32,
    pub mct_dom_dom_minutes:   Minutes,
    pub mct_dom_intl_minutes:  Minutes,
    pub mct_intl_dom_minutes:  Minutes,
    pub curfew_start_local:    Option<NaiveTime>,
    pub curfew_end_local:      Option<NaiveTime>,
    pub timezone_offset_utc:   i32,
    pub slot_controlled_flag:  bool,
    pub gdp_active_flag:       bool,
    pub gdp_avg_delay_minutes: Minutes,
    pub atc_congestion_index:  f64,
    pub airport_disruption_index: f64,
}

impl Airport {
    /// Curfew window as (start, end) local times, when both ends are known.
    pub fn curfew(&self) -> Option<(NaiveTime, NaiveTime)> {
        match (self.curfew_start_local, self.curfew_end_local) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }

    pub fn to_local(&self, at: DateTime<Utc>) -> NaiveDateTime {
        at.naive_utc() + Duration::hours(self.timezone_offset_utc as i64)
    }

    /// Minimum connect time for a connection at this station.
    pub fn min_connect_minutes(&self, inbound_intl: bool, outbound_intl: bool) -> Minutes {
        match (inbound_intl, outbound_intl) {
            (true, _)      => self.mct_intl_dom_minutes,
            (false, true)  => self.mct_dom_intl_minutes,
            (false, false) => self.mct_dom_dom_minutes,
        }
    }
}

// ── Flight ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightStatus {
    Scheduled,
    Delayed,
    Cancelled,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Flight {
    pub flight_key:              FlightKey,
    pub flight_number:           String,
    pub departure_station:       StationCode,
    pub arrival_station:         StationCode,
    pub sched_dep_utc:           DateTime<Utc>,
    pub sched_arr_utc:           DateTime<Utc>,
    pub act_dep_utc:             Option<DateTime<Utc>>,
    pub act_arr_utc:             Option<DateTime<Utc>>,
    pub block_time_minutes:      Minutes,
    /// Slack between the same tail's inbound arrival and this departure.
    pub turn_buffer_minutes:     Minutes,
    pub current_delay_departure: Minutes,
    pub current_delay_arrival:   Minutes,
    pub status:                  FlightStatus,
    pub tail_number:             Option<TailNumber>,
    pub fleet_type:              String,
    pub pax_count:               u32,
    pub connecting_pax_pct:      f64,
    pub elite_pax_count:         u32,
    pub revenue_exposure_usd:    f64,
    // Derived signals fed by upstream models.
    pub delay_risk_score:        f64,
    pub turn_success_prob:       f64,
    pub misconnect_prob:         f64,
    /// Learned criticality, when an external model supplies one.
    #[serde(default)]
    pub external_criticality:    Option<f64>,
}

impl Flight {
    pub fn projected_departure(&self) -> DateTime<Utc> {
        self.sched_dep_utc + Duration::minutes(self.current_delay_departure.max(0))
    }

    pub fn projected_arrival(&self) -> DateTime<Utc> {
        self.sched_arr_utc + Duration::minutes(self.current_delay_arrival.max(0))
    }

    pub fn connecting_pax(&self) -> f64 {
        self.pax_count as f64 * self.connecting_pax_pct
    }

    pub fn revenue_per_pax(&self) -> f64 {
        if self.pax_count == 0 {
            0.0
        } else {
            self.revenue_exposure_usd / self.pax_count as f64
        }
    }

    pub fn elite_share(&self) -> f64 {
        if self.pax_count == 0 {
            0.0
        } else {
            (self.elite_pax_count as f64 / self.pax_count as f64).min(1.0)
        }
    }
}

// ── Aircraft and rotations ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MelSeverity {
    #[serde(rename = "CAT-A")]
    CatA,
    #[serde(rename = "CAT-B")]
    CatB,
    #[serde(rename = "CAT-C")]
    CatC,
    #[serde(rename = "CAT-D")]
    CatD,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MelItem {
    pub item_code:  String,
    pub severity:   MelSeverity,
    pub expiry_utc: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Aircraft {
    pub tail_number:    TailNumber,
    pub fleet_type:     String,
    pub etops_capable:  bool,
    pub mel:            Option<MelItem>,
    pub aog_risk_score: f64,
}

/// One flight-leg-on-tail entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RotationLink {
    pub tail_number:       TailNumber,
    pub flight_key:        FlightKey,
    pub sequence_position: u32,
    pub prev_flight_key:   Option<FlightKey>,
    pub next_flight_key:   Option<FlightKey>,
}

// ── Crew ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrewDuty {
    pub duty_id:                  DutyId,
    pub crew_base:                StationCode,
    pub fdp_limit_minutes:        Minutes,
    pub fdp_used_minutes:         Minutes,
    pub time_zone_span_hours:     f64,
    pub augmented_crew_flag:      bool,
    pub reserve_crew_available:   bool,
    pub reserve_crew_eta_minutes: Option<Minutes>,
}

impl CrewDuty {
    pub fn fdp_remaining_minutes(&self) -> Minutes {
        self.fdp_limit_minutes - self.fdp_used_minutes
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CrewAssignment {
    pub duty_id:              DutyId,
    pub flight_key:           FlightKey,
    pub leg_sequence_in_duty: u32,
}

// ── Passengers ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EliteTier {
    Silver,
    Gold,
    Platinum,
    Diamond,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PnrTrip {
    pub pnr_id:           String,
    pub itinerary:        Vec<FlightKey>,
    pub group_size:       u32,
    pub elite_tier:       Option<EliteTier>,
    pub misconnect_prob:  f64,
    pub voucher_cost_usd: f64,
}

impl PnrTrip {
    pub fn is_connecting(&self) -> bool {
        self.itinerary.len() > 1
    }
}

// ── Weather / ATC ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum VisibilityCategory {
    Vfr,
    Mvfr,
    Ifr,
    Lifr,
}

impl VisibilityCategory {
    /// Visibility as a 0–1 severity index.
    pub fn index(&self) -> f64 {
        match self {
            Self::Vfr  => 0.0,
            Self::Mvfr => 0.3,
            Self::Ifr  => 0.7,
            Self::Lifr => 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherRecord {
    pub record_id:        String,
    pub station_code:     StationCode,
    pub sector_id:        Option<String>,
    pub valid_time_utc:   DateTime<Utc>,
    pub convective_index: f64,
    pub visibility:       VisibilityCategory,
    pub icing_index:      f64,
    pub crosswind_knots:  f64,
    pub flow_program:     bool,
    pub edct_delay_mean:  Minutes,
}
