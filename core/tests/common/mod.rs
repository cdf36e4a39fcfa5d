//! Hand-built operational day shared by the integration tests.
//!
//! Two tails out of ATL:
//!   N101 (narrowbody):  F1 ATL-BOS, F2 BOS-ATL, F3 ATL-MCO, F4 MCO-ATL
//!   N202 (widebody):    G1 ATL-MCO, G2 MCO-ATL, G3 ATL-BOS
//! Duty D1 flies F1..F2, duty D2 flies G1..G3. One PNR connects F2 -> F3.

#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use irop_core::{
    config::EngineConfig,
    engine::IropEngine,
    entity::{
        Aircraft, Airport, CrewAssignment, CrewDuty, Flight, FlightStatus, PnrTrip, RotationLink,
        VisibilityCategory, WeatherRecord,
    },
    snapshot::{OpsSnapshot, SnapshotFile},
};

pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, hour, minute, 0).unwrap()
}

pub fn airport(code: &str, country: &str, tz: i32) -> Airport {
    Airport {
        station_code:          code.to_string(),
        hub_flag:              code == "ATL",
        country:               country.to_string(),
        region:                String::new(),
        gate_count:            100,
        widebody_gate_count:   20,
        mct_dom_dom_minutes:   45,
        mct_dom_intl_minutes:  90,
        mct_intl_dom_minutes:  90,
        curfew_start_local:    None,
        curfew_end_local:      None,
        timezone_offset_utc:   tz,
        slot_controlled_flag:  false,
        gdp_active_flag:       false,
        gdp_avg_delay_minutes: 0,
        atc_congestion_index:  0.2,
        airport_disruption_index: 0.1,
    }
}

pub fn flight(key: &str, dep: &str, arr: &str, dep_hour: u32, tail: &str, buffer: i64) -> Flight {
    Flight {
        flight_key:              key.to_string(),
        flight_number:           format!("DL{}", key),
        departure_station:       dep.to_string(),
        arrival_station:         arr.to_string(),
        sched_dep_utc:           at(dep_hour, 0),
        sched_arr_utc:           at(dep_hour + 2, 0),
        act_dep_utc:             None,
        act_arr_utc:             None,
        block_time_minutes:      120,
        turn_buffer_minutes:     buffer,
        current_delay_departure: 0,
        current_delay_arrival:   0,
        status:                  FlightStatus::Scheduled,
        tail_number:             Some(tail.to_string()),
        fleet_type:              "A321neo".to_string(),
        pax_count:               100,
        connecting_pax_pct:      0.5,
        elite_pax_count:         10,
        revenue_exposure_usd:    20_000.0,
        delay_risk_score:        20.0,
        turn_success_prob:       0.9,
        misconnect_prob:         0.25,
        external_criticality:    Some(50.0),
    }
}

/// Rotation links for `keys` flown in order by `tail`.
pub fn chain(tail: &str, keys: &[&str]) -> Vec<RotationLink> {
    keys.iter()
        .enumerate()
        .map(|(i, key)| RotationLink {
            tail_number:       tail.to_string(),
            flight_key:        key.to_string(),
            sequence_position: i as u32 + 1,
            prev_flight_key:   i.checked_sub(1).map(|p| keys[p].to_string()),
            next_flight_key:   keys.get(i + 1).map(|k| k.to_string()),
        })
        .collect()
}

pub fn aircraft(tail: &str, etops_capable: bool) -> Aircraft {
    Aircraft {
        tail_number:    tail.to_string(),
        fleet_type:     if etops_capable { "A330-300" } else { "A321neo" }.to_string(),
        etops_capable,
        mel:            None,
        aog_risk_score: 0.05,
    }
}

pub fn duty(id: &str, used: i64, limit: i64, reserve: bool) -> CrewDuty {
    CrewDuty {
        duty_id:                  id.to_string(),
        crew_base:                "ATL".to_string(),
        fdp_limit_minutes:        limit,
        fdp_used_minutes:         used,
        time_zone_span_hours:     0.0,
        augmented_crew_flag:      false,
        reserve_crew_available:   reserve,
        reserve_crew_eta_minutes: reserve.then_some(45),
    }
}

pub fn assign(duty_id: &str, keys: &[&str]) -> Vec<CrewAssignment> {
    keys.iter()
        .enumerate()
        .map(|(i, key)| CrewAssignment {
            duty_id:              duty_id.to_string(),
            flight_key:           key.to_string(),
            leg_sequence_in_duty: i as u32 + 1,
        })
        .collect()
}

pub fn weather(station: &str) -> WeatherRecord {
    WeatherRecord {
        record_id:        format!("WX-{station}"),
        station_code:     station.to_string(),
        sector_id:        None,
        valid_time_utc:   at(0, 0),
        convective_index: 0.1,
        visibility:       VisibilityCategory::Vfr,
        icing_index:      0.0,
        crosswind_knots:  5.0,
        flow_program:     false,
        edct_delay_mean:  0,
    }
}

pub fn day() -> SnapshotFile {
    let mut rotations = chain("N101", &["F1", "F2", "F3", "F4"]);
    rotations.extend(chain("N202", &["G1", "G2", "G3"]));

    let mut crew_assignments = assign("D1", &["F1", "F2"]);
    crew_assignments.extend(assign("D2", &["G1", "G2", "G3"]));

    SnapshotFile {
        op_date: NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
        airports: vec![
            airport("ATL", "USA", -5),
            airport("BOS", "USA", -5),
            airport("MCO", "USA", -5),
            airport("LHR", "UK", 0),
        ],
        flights: vec![
            flight("F1", "ATL", "BOS", 8, "N101", 60),
            flight("F2", "BOS", "ATL", 11, "N101", 30),
            flight("F3", "ATL", "MCO", 14, "N101", 30),
            flight("F4", "MCO", "ATL", 17, "N101", 30),
            flight("G1", "ATL", "MCO", 9, "N202", 60),
            flight("G2", "MCO", "ATL", 12, "N202", 20),
            flight("G3", "ATL", "BOS", 15, "N202", 20),
        ],
        rotations,
        aircraft: vec![aircraft("N101", false), aircraft("N202", true)],
        crew_duties: vec![duty("D1", 400, 600, true), duty("D2", 300, 600, false)],
        crew_assignments,
        pnr_trips: vec![PnrTrip {
            pnr_id:           "PNR1".to_string(),
            itinerary:        vec!["F2".to_string(), "F3".to_string()],
            group_size:       2,
            elite_tier:       None,
            misconnect_prob:  0.25,
            voucher_cost_usd: 400.0,
        }],
        weather: ["ATL", "BOS", "MCO", "LHR"].iter().map(|s| weather(s)).collect(),
    }
}

pub fn flight_mut<'a>(file: &'a mut SnapshotFile, key: &str) -> &'a mut Flight {
    file.flights.iter_mut().find(|f| f.flight_key == key).unwrap()
}

pub fn snapshot(file: SnapshotFile) -> OpsSnapshot {
    OpsSnapshot::from_file(file).expect("valid snapshot")
}

pub fn engine_with(file: SnapshotFile, config: EngineConfig) -> IropEngine {
    IropEngine::new(config, snapshot(file)).expect("engine builds")
}

pub fn engine(file: SnapshotFile) -> IropEngine {
    engine_with(file, EngineConfig::default())
}
