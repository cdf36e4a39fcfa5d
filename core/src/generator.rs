//! Synthetic operational day.
//!
//! Builds a complete, internally consistent snapshot from a seed:
//! stations, tail rotations flown hub-and-spoke in departure banks,
//! aircraft (some carrying MEL items), crew duties, connecting PNRs and
//! a weather/flow picture. Same seed and params give the same day.
//!
//! Flights are generated tail-first, so every rotation link is valid by
//! construction and the graph build never rejects a generated day.

use crate::{
    entity::{
        Aircraft, Airport, CrewAssignment, CrewDuty, EliteTier, Flight, FlightStatus, MelItem,
        MelSeverity, PnrTrip, RotationLink, VisibilityCategory, WeatherRecord,
    },
    error::EngineResult,
    rng::{GeneratorStream, ScenarioRng},
    snapshot::{OpsSnapshot, SnapshotFile},
    types::{FlightKey, Minutes},
};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneratorParams {
    pub op_date:      NaiveDate,
    pub flight_count: usize,
    pub tail_count:   usize,
    /// Share of tails carrying an open MEL item.
    pub mel_rate:     f64,
    /// Share of flights with a current delay.
    pub delay_rate:   f64,
    /// Share of flights that carry an external criticality score.
    pub external_criticality_rate: f64,
    pub pnr_count:    usize,
    /// Legs flown by one crew before a new duty starts.
    pub legs_per_duty: usize,
}

impl Default for GeneratorParams {
    fn default() -> Self {
        Self {
            op_date:      NaiveDate::from_ymd_opt(2024, 6, 15).unwrap_or_default(),
            flight_count: 150,
            tail_count:   45,
            mel_rate:     0.08,
            delay_rate:   0.35,
            external_criticality_rate: 0.8,
            pnr_count:    2000,
            legs_per_duty: 3,
        }
    }
}

// ── Stations ─────────────────────────────────────────────────────────────────

struct StationTemplate {
    code:      &'static str,
    hub:       bool,
    intl:      bool,
    country:   &'static str,
    region:    &'static str,
    gates:     u32,
    wb_gates:  u32,
    tz:        i32,
    curfew:    Option<(u32, u32, u32, u32)>, // start h:m, end h:m
    slot_controlled: bool,
}

const fn station(
    code: &'static str, hub: bool, intl: bool, country: &'static str, region: &'static str,
    gates: u32, wb_gates: u32, tz: i32,
) -> StationTemplate {
    StationTemplate { code, hub, intl, country, region, gates, wb_gates, tz, curfew: None, slot_controlled: false }
}

const STATIONS: &[StationTemplate] = &[
    station("ATL", true, false, "USA", "Southeast", 192, 45, -5),
    station("JFK", true, false, "USA", "Northeast", 128, 38, -5),
    station("DTW", true, false, "USA", "Midwest", 129, 22, -5),
    station("LAX", true, false, "USA", "West", 146, 35, -8),
    station("MCO", false, false, "USA", "Southeast", 129, 8, -5),
    station("DFW", false, false, "USA", "Southwest", 165, 20, -6),
    station("SEA", false, false, "USA", "Pacific NW", 91, 15, -8),
    station("SLC", false, false, "USA", "Mountain", 82, 8, -7),
    station("MSP", false, false, "USA", "Midwest", 117, 12, -6),
    station("BOS", false, false, "USA", "Northeast", 102, 18, -5),
    StationTemplate {
        curfew: Some((23, 0, 6, 0)), slot_controlled: true,
        ..station("LHR", false, true, "UK", "Europe", 115, 45, 0)
    },
    StationTemplate {
        curfew: Some((23, 30, 6, 0)), slot_controlled: true,
        ..station("CDG", false, true, "France", "Europe", 120, 40, 1)
    },
    station("FRA", false, true, "Germany", "Europe", 108, 38, 1),
    StationTemplate {
        curfew: Some((23, 0, 6, 0)),
        ..station("NRT", false, true, "Japan", "Asia", 91, 35, 9)
    },
];

const INTL_GATEWAYS: &[&str] = &["ATL", "JFK", "LAX"];
const NARROW_BODY: &[&str] = &["B737-900", "B757-200", "A321neo"];
const WIDE_BODY: &[&str] = &["A330-300", "B767-400", "A350-900"];
const MEL_CODES: &[&str] = &["APU", "PACK", "IFE", "LAVATORY", "GALLEY"];
/// Departure bank start hours, local-agnostic UTC.
const BANKS: &[u32] = &[10, 15, 19, 23];
const MIN_TURN_MINUTES: Minutes = 35;

fn template(code: &str) -> Option<&'static StationTemplate> {
    STATIONS.iter().find(|s| s.code == code)
}

// ── Entry points ─────────────────────────────────────────────────────────────

/// Generate one day as an indexed snapshot.
pub fn generate_day(seed: u64, params: &GeneratorParams) -> EngineResult<OpsSnapshot> {
    OpsSnapshot::from_file(generate_file(seed, params))
}

/// Generate one day in its serialized form.
pub fn generate_file(seed: u64, params: &GeneratorParams) -> SnapshotFile {
    let mut weather_rng = ScenarioRng::for_stream(seed, GeneratorStream::Weather);
    let weather = generate_weather(&mut weather_rng, params.op_date);
    let airports = generate_airports(&mut weather_rng, &weather);

    let mut fleet_rng = ScenarioRng::for_stream(seed, GeneratorStream::Fleet);
    let aircraft = generate_aircraft(&mut fleet_rng, params);

    let mut schedule_rng = ScenarioRng::for_stream(seed, GeneratorStream::Schedule);
    let mut signal_rng = ScenarioRng::for_stream(seed, GeneratorStream::Signals);
    let (flights, rotations) = generate_rotations(&mut schedule_rng, &mut signal_rng, &aircraft, params);

    let mut crew_rng = ScenarioRng::for_stream(seed, GeneratorStream::Crew);
    let (crew_duties, crew_assignments) = generate_crew(&mut crew_rng, &flights, &rotations, params);

    let mut pax_rng = ScenarioRng::for_stream(seed, GeneratorStream::Passengers);
    let pnr_trips = generate_pnrs(&mut pax_rng, &flights, params);

    log::debug!(
        "generator: seed {seed} -> {} flights on {} tails, {} duties, {} pnrs, {} weather records",
        flights.len(),
        aircraft.len(),
        crew_duties.len(),
        pnr_trips.len(),
        weather.len()
    );

    SnapshotFile {
        op_date: params.op_date,
        airports,
        flights,
        rotations,
        aircraft,
        crew_duties,
        crew_assignments,
        pnr_trips,
        weather,
    }
}

// ── Parts ────────────────────────────────────────────────────────────────────

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn generate_airports(rng: &mut ScenarioRng, weather: &[WeatherRecord]) -> Vec<Airport> {
    STATIONS
        .iter()
        .map(|s| {
            let flow: Vec<&WeatherRecord> = weather
                .iter()
                .filter(|w| w.station_code == s.code && w.flow_program)
                .collect();
            let gdp_avg = if flow.is_empty() {
                0
            } else {
                flow.iter().map(|w| w.edct_delay_mean).sum::<Minutes>() / flow.len() as Minutes
            };
            let curfew_time = |h: u32, m: u32| NaiveTime::from_hms_opt(h, m, 0);
            Airport {
                station_code:          s.code.to_string(),
                hub_flag:              s.hub,
                country:               s.country.to_string(),
                region:                s.region.to_string(),
                gate_count:            s.gates,
                widebody_gate_count:   s.wb_gates,
                mct_dom_dom_minutes:   if s.hub { 45 } else { 60 },
                mct_dom_intl_minutes:  90,
                mct_intl_dom_minutes:  if INTL_GATEWAYS.contains(&s.code) { 120 } else { 90 },
                curfew_start_local:    s.curfew.and_then(|(h, m, _, _)| curfew_time(h, m)),
                curfew_end_local:      s.curfew.and_then(|(_, _, h, m)| curfew_time(h, m)),
                timezone_offset_utc:   s.tz,
                slot_controlled_flag:  s.slot_controlled,
                gdp_active_flag:       !flow.is_empty(),
                gdp_avg_delay_minutes: gdp_avg,
                atc_congestion_index:  round2(rng.range_f64(0.2, 0.8)),
                airport_disruption_index: round2(rng.range_f64(0.1, 0.4)),
            }
        })
        .collect()
}

fn generate_aircraft(rng: &mut ScenarioRng, params: &GeneratorParams) -> Vec<Aircraft> {
    let tail_count = params.tail_count.max(1);
    (0..tail_count)
        .map(|i| {
            // Every fourth tail is a widebody that can fly the long-haul legs.
            let widebody = i % 4 == 0;
            let fleet_type = if widebody { *rng.pick(WIDE_BODY) } else { *rng.pick(NARROW_BODY) };
            let mel = rng.chance(params.mel_rate).then(|| MelItem {
                item_code:  rng.pick(MEL_CODES).to_string(),
                severity:   *rng.pick(&[MelSeverity::CatA, MelSeverity::CatB, MelSeverity::CatC, MelSeverity::CatD]),
                expiry_utc: None,
            });
            let aog_risk_score = if mel.is_some() {
                round2(rng.range_f64(0.5, 0.9))
            } else {
                round2(rng.range_f64(0.01, 0.15))
            };
            Aircraft {
                tail_number: format!("N{}DL", 100 + i),
                fleet_type: fleet_type.to_string(),
                etops_capable: widebody,
                mel,
                aog_risk_score,
            }
        })
        .collect()
}

/// Pick the next arrival station for a tail currently at `from`.
fn next_station(rng: &mut ScenarioRng, from: &str, widebody: bool) -> &'static str {
    let hubs: Vec<&'static str> = STATIONS.iter().filter(|s| s.hub).map(|s| s.code).collect();
    let spokes: Vec<&'static str> = STATIONS.iter().filter(|s| !s.hub && !s.intl).map(|s| s.code).collect();
    let intl: Vec<&'static str> = STATIONS.iter().filter(|s| s.intl).map(|s| s.code).collect();

    let at_hub = template(from).is_some_and(|s| s.hub);
    if !at_hub {
        return if template(from).is_some_and(|s| s.intl) {
            *rng.pick(INTL_GATEWAYS)
        } else {
            *rng.pick(&hubs)
        };
    }
    if widebody && INTL_GATEWAYS.contains(&from) && rng.chance(0.5) {
        return *rng.pick(&intl);
    }
    loop {
        let dest = if rng.chance(0.25) { *rng.pick(&hubs) } else { *rng.pick(&spokes) };
        if dest != from {
            return dest;
        }
    }
}

fn generate_rotations(
    rng: &mut ScenarioRng,
    signals: &mut ScenarioRng,
    aircraft: &[Aircraft],
    params: &GeneratorParams,
) -> (Vec<Flight>, Vec<RotationLink>) {
    let tail_count = aircraft.len().max(1);
    let base_legs = params.flight_count / tail_count;
    let extra = params.flight_count % tail_count;
    let day_start = params.op_date.and_time(NaiveTime::MIN).and_utc();
    let hubs: Vec<&'static str> = STATIONS.iter().filter(|s| s.hub).map(|s| s.code).collect();

    let mut flights = Vec::with_capacity(params.flight_count);
    let mut rotations = Vec::with_capacity(params.flight_count);

    for (t, tail) in aircraft.iter().enumerate() {
        let legs = base_legs + usize::from(t < extra);
        if legs == 0 {
            continue;
        }
        let widebody = tail.etops_capable;
        let mut station = if widebody { *rng.pick(INTL_GATEWAYS) } else { *rng.pick(&hubs) };
        let first_bank = *rng.pick(BANKS);
        let mut ready_at: DateTime<Utc> = day_start
            + Duration::hours(first_bank as i64)
            + Duration::minutes(15 * rng.range_i64(0, 3));

        let mut keys: Vec<FlightKey> = Vec::with_capacity(legs);
        for _ in 0..legs {
            let idx = flights.len();
            let dest = next_station(rng, station, widebody);
            let intl = template(dest).is_some_and(|s| s.intl) || template(station).is_some_and(|s| s.intl);

            let turn_buffer = if keys.is_empty() { 60 } else { rng.range_i64(0, 55) };
            let sched_dep = ready_at + Duration::minutes(turn_buffer);
            let block = if intl { rng.range_i64(420, 660) } else { rng.range_i64(75, 270) };
            let sched_arr = sched_dep + Duration::minutes(block);

            let flight = build_flight(
                signals, params, idx, station, dest, intl, tail, sched_dep, sched_arr, block, turn_buffer,
            );
            keys.push(flight.flight_key.clone());
            flights.push(flight);

            ready_at = sched_arr + Duration::minutes(MIN_TURN_MINUTES);
            station = dest;
        }

        for (pos, key) in keys.iter().enumerate() {
            rotations.push(RotationLink {
                tail_number:       tail.tail_number.clone(),
                flight_key:        key.clone(),
                sequence_position: pos as u32 + 1,
                prev_flight_key:   pos.checked_sub(1).map(|p| keys[p].clone()),
                next_flight_key:   keys.get(pos + 1).cloned(),
            });
        }
    }
    (flights, rotations)
}

#[allow(clippy::too_many_arguments)]
fn build_flight(
    rng: &mut ScenarioRng,
    params: &GeneratorParams,
    idx: usize,
    dep: &str,
    arr: &str,
    intl: bool,
    tail: &Aircraft,
    sched_dep: DateTime<Utc>,
    sched_arr: DateTime<Utc>,
    block: Minutes,
    turn_buffer: Minutes,
) -> Flight {
    let flight_number = format!("DL{}", 1000 + idx);
    let flight_key = format!("{flight_number}_{}_{idx:03}", params.op_date.format("%Y%m%d"));

    let (delay_dep, delay_arr) = if rng.chance(params.delay_rate) {
        let dep_delay = *rng.pick(&[5, 10, 15, 20, 25, 30, 45, 60, 90]);
        (dep_delay, (dep_delay + rng.range_i64(-10, 15)).max(0))
    } else {
        (0, 0)
    };
    let status = if delay_dep > 0 { FlightStatus::Delayed } else { FlightStatus::Scheduled };

    let pax = (if tail.etops_capable { rng.range_i64(180, 280) } else { rng.range_i64(120, 180) }) as u32;
    let arr_is_hub = template(arr).is_some_and(|s| s.hub);
    let connecting_pax_pct = round2(if arr_is_hub { rng.range_f64(0.3, 0.7) } else { rng.range_f64(0.1, 0.3) });
    let elite_pax_count = (pax as f64 * rng.range_f64(0.05, 0.15)) as u32;
    let revenue = pax as f64 * rng.range_f64(150.0, if intl { 800.0 } else { 350.0 });

    let delay_risk_score = if delay_dep > 0 { rng.range_f64(10.0, 90.0) } else { rng.range_f64(5.0, 40.0) };
    let turn_success_prob = (1.0 - delay_dep as f64 / 120.0 - rng.range_f64(0.0, 0.2)).max(0.3);
    let misconnect_prob = (connecting_pax_pct * (delay_dep as f64 / 45.0 + 0.1)).min(0.95);
    let external_criticality = rng
        .chance(params.external_criticality_rate)
        .then(|| (rng.range_f64(20.0, 95.0) * 10.0).round() / 10.0);

    Flight {
        flight_key,
        flight_number,
        departure_station:       dep.to_string(),
        arrival_station:         arr.to_string(),
        sched_dep_utc:           sched_dep,
        sched_arr_utc:           sched_arr,
        act_dep_utc:             (delay_dep > 0).then(|| sched_dep + Duration::minutes(delay_dep)),
        act_arr_utc:             (delay_arr > 0).then(|| sched_arr + Duration::minutes(delay_arr)),
        block_time_minutes:      block,
        turn_buffer_minutes:     turn_buffer,
        current_delay_departure: delay_dep,
        current_delay_arrival:   delay_arr,
        status,
        tail_number:             Some(tail.tail_number.clone()),
        fleet_type:              tail.fleet_type.clone(),
        pax_count:               pax,
        connecting_pax_pct,
        elite_pax_count,
        revenue_exposure_usd:    round2(revenue),
        delay_risk_score:        (delay_risk_score * 10.0).round() / 10.0,
        turn_success_prob:       round2(turn_success_prob),
        misconnect_prob:         round2(misconnect_prob),
        external_criticality,
    }
}

fn generate_crew(
    rng: &mut ScenarioRng,
    flights: &[Flight],
    rotations: &[RotationLink],
    params: &GeneratorParams,
) -> (Vec<CrewDuty>, Vec<CrewAssignment>) {
    let by_key: BTreeMap<&str, &Flight> = flights.iter().map(|f| (f.flight_key.as_str(), f)).collect();
    let mut by_tail: BTreeMap<&str, Vec<&RotationLink>> = BTreeMap::new();
    for link in rotations {
        by_tail.entry(link.tail_number.as_str()).or_default().push(link);
    }

    let legs_per_duty = params.legs_per_duty.max(1);
    let mut duties = Vec::new();
    let mut assignments = Vec::new();

    // Crews follow the aircraft: each tail's legs are cut into duties.
    for (tail, links) in &mut by_tail {
        links.sort_by_key(|l| l.sequence_position);
        for (n, group) in links.chunks(legs_per_duty).enumerate() {
            let legs: Vec<&Flight> = group.iter().filter_map(|l| by_key.get(l.flight_key.as_str()).copied()).collect();
            let Some(first) = legs.first() else { continue };

            let fdp_limit = if group.len() <= 3 { 600 } else { 540 };
            let fdp_used = rng.range_i64(300, fdp_limit - 30);
            let tz_span = legs
                .iter()
                .filter_map(|f| Some((template(&f.departure_station)?.tz - template(&f.arrival_station)?.tz).abs()))
                .max()
                .unwrap_or(0) as f64;
            let augmented = tz_span > 3.0 || fdp_used > 480;
            let duty_id = format!("DUTY_{tail}_{}", n + 1);

            duties.push(CrewDuty {
                duty_id:                  duty_id.clone(),
                crew_base:                first.departure_station.clone(),
                fdp_limit_minutes:        fdp_limit,
                fdp_used_minutes:         fdp_used,
                time_zone_span_hours:     tz_span,
                augmented_crew_flag:      augmented,
                reserve_crew_available:   rng.chance(0.6),
                reserve_crew_eta_minutes: rng.chance(0.6).then(|| rng.range_i64(30, 180)),
            });
            for (seq, flight) in legs.iter().enumerate() {
                assignments.push(CrewAssignment {
                    duty_id:              duty_id.clone(),
                    flight_key:           flight.flight_key.clone(),
                    leg_sequence_in_duty: seq as u32 + 1,
                });
            }
        }
    }
    (duties, assignments)
}

fn generate_pnrs(rng: &mut ScenarioRng, flights: &[Flight], params: &GeneratorParams) -> Vec<PnrTrip> {
    if flights.is_empty() {
        return Vec::new();
    }
    let inbound_to_hub: Vec<&Flight> = flights
        .iter()
        .filter(|f| template(&f.arrival_station).is_some_and(|s| s.hub))
        .collect();
    let elite_tiers = [
        (60, None),
        (15, Some(EliteTier::Silver)),
        (12, Some(EliteTier::Gold)),
        (8, Some(EliteTier::Platinum)),
        (5, Some(EliteTier::Diamond)),
    ];
    let group_sizes = [(50, 1), (25, 2), (12, 3), (8, 4), (3, 5), (2, 6)];

    let mut pnrs = Vec::with_capacity(params.pnr_count);
    for i in 0..params.pnr_count {
        let mut itinerary = Vec::new();
        if !inbound_to_hub.is_empty() && rng.chance(0.4) {
            let first = *rng.pick(&inbound_to_hub);
            let onward: Vec<&Flight> = flights
                .iter()
                .filter(|f| f.departure_station == first.arrival_station && f.sched_dep_utc > first.sched_arr_utc)
                .collect();
            if !onward.is_empty() {
                let second = *rng.pick(&onward);
                itinerary = vec![first.flight_key.clone(), second.flight_key.clone()];
            }
        }
        if itinerary.is_empty() {
            itinerary.push(rng.pick(flights).flight_key.clone());
        }

        let group_size = weighted(rng, &group_sizes);
        let elite_tier = weighted(rng, &elite_tiers);
        let misconnect_prob = if itinerary.len() > 1 { round2(rng.range_f64(0.05, 0.45)) } else { 0.0 };
        let voucher_cost_usd = if misconnect_prob > 0.2 {
            round2(rng.range_f64(100.0, 500.0) * group_size as f64)
        } else {
            0.0
        };

        pnrs.push(PnrTrip {
            pnr_id: format!("PNR{i:05}"),
            itinerary,
            group_size,
            elite_tier,
            misconnect_prob,
            voucher_cost_usd,
        });
    }
    pnrs
}

fn weighted<T: Copy>(rng: &mut ScenarioRng, choices: &[(u32, T)]) -> T {
    let total: u32 = choices.iter().map(|(w, _)| *w).sum();
    let mut roll = rng.next_u64_below(total.max(1) as u64) as u32;
    for (w, value) in choices {
        if roll < *w {
            return *value;
        }
        roll -= *w;
    }
    choices[choices.len() - 1].1
}

fn generate_weather(rng: &mut ScenarioRng, op_date: NaiveDate) -> Vec<WeatherRecord> {
    let day_start = op_date.and_time(NaiveTime::MIN).and_utc();
    let mut records = Vec::new();
    for s in STATIONS {
        // Hourly observations.
        for hour in 0..24 {
            let convection = rng.chance(0.15);
            let low_vis = rng.chance(0.1);
            let flow = rng.chance(0.08);
            records.push(WeatherRecord {
                record_id:        format!("WX_{}_{hour:02}", s.code),
                station_code:     s.code.to_string(),
                sector_id:        None,
                valid_time_utc:   day_start + Duration::hours(hour),
                convective_index: round2(if convection { rng.range_f64(0.6, 1.0) } else { rng.range_f64(0.0, 0.3) }),
                visibility:       if low_vis {
                    *rng.pick(&[VisibilityCategory::Ifr, VisibilityCategory::Lifr])
                } else {
                    *rng.pick(&[VisibilityCategory::Vfr, VisibilityCategory::Mvfr])
                },
                icing_index:      round2(if rng.chance(0.05) { rng.range_f64(0.5, 0.9) } else { rng.range_f64(0.0, 0.2) }),
                crosswind_knots:  (rng.range_f64(0.0, 15.0) * 10.0).round() / 10.0,
                flow_program:     flow,
                edct_delay_mean:  if flow { rng.range_i64(15, 60) } else { 0 },
            });
        }
    }
    records
}
