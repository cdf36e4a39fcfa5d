//! Entity store — one operational day, indexed for the scorer.
//!
//! A snapshot is built once per refresh from a `SnapshotFile` and is
//! never modified afterwards. The JSON form of `SnapshotFile` is the
//! ingestion boundary.

use crate::{
    entity::{
        Aircraft, Airport, CrewAssignment, CrewDuty, Flight, PnrTrip, RotationLink,
        WeatherRecord,
    },
    error::{DataIntegrityError, EngineResult},
    types::{DutyId, FlightKey, StationCode, TailNumber},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Serialized form of one operational day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotFile {
    pub op_date:          NaiveDate,
    pub airports:         Vec<Airport>,
    pub flights:          Vec<Flight>,
    pub rotations:        Vec<RotationLink>,
    #[serde(default)]
    pub aircraft:         Vec<Aircraft>,
    #[serde(default)]
    pub crew_duties:      Vec<CrewDuty>,
    #[serde(default)]
    pub crew_assignments: Vec<CrewAssignment>,
    #[serde(default)]
    pub pnr_trips:        Vec<PnrTrip>,
    #[serde(default)]
    pub weather:          Vec<WeatherRecord>,
}

#[derive(Debug, Clone)]
pub struct OpsSnapshot {
    op_date:            NaiveDate,
    airports:           BTreeMap<StationCode, Airport>,
    flights:            BTreeMap<FlightKey, Flight>,
    rotations:          Vec<RotationLink>,
    aircraft:           BTreeMap<TailNumber, Aircraft>,
    duties:             BTreeMap<DutyId, CrewDuty>,
    duty_by_flight:     HashMap<FlightKey, DutyId>,
    flights_by_duty:    BTreeMap<DutyId, Vec<FlightKey>>,
    pnrs:               Vec<PnrTrip>,
    pnrs_by_flight:     HashMap<FlightKey, Vec<usize>>,
    weather_by_station: HashMap<StationCode, Vec<WeatherRecord>>,
}

impl OpsSnapshot {
    pub fn from_file(file: SnapshotFile) -> EngineResult<Self> {
        let mut flights = BTreeMap::new();
        for flight in file.flights {
            let key = flight.flight_key.clone();
            if flights.insert(key.clone(), flight).is_some() {
                return Err(DataIntegrityError::DuplicateFlightRecord { flight_key: key }.into());
            }
        }

        let airports = file
            .airports
            .into_iter()
            .map(|a| (a.station_code.clone(), a))
            .collect();
        let aircraft = file
            .aircraft
            .into_iter()
            .map(|a| (a.tail_number.clone(), a))
            .collect();
        let duties: BTreeMap<DutyId, CrewDuty> = file
            .crew_duties
            .into_iter()
            .map(|d| (d.duty_id.clone(), d))
            .collect();

        let mut assignments = file.crew_assignments;
        assignments.sort_by(|a, b| {
            a.duty_id
                .cmp(&b.duty_id)
                .then(a.leg_sequence_in_duty.cmp(&b.leg_sequence_in_duty))
        });
        let mut duty_by_flight = HashMap::new();
        let mut flights_by_duty: BTreeMap<DutyId, Vec<FlightKey>> = BTreeMap::new();
        for a in assignments {
            if !duties.contains_key(&a.duty_id) {
                log::warn!("snapshot: assignment of {} to unknown duty {}", a.flight_key, a.duty_id);
                continue;
            }
            if let Some(existing) = duty_by_flight.get(&a.flight_key) {
                log::warn!(
                    "snapshot: flight {} already on duty {existing}; ignoring {}",
                    a.flight_key, a.duty_id
                );
                continue;
            }
            duty_by_flight.insert(a.flight_key.clone(), a.duty_id.clone());
            flights_by_duty.entry(a.duty_id).or_default().push(a.flight_key);
        }

        let mut pnrs_by_flight: HashMap<FlightKey, Vec<usize>> = HashMap::new();
        for (idx, pnr) in file.pnr_trips.iter().enumerate() {
            for key in &pnr.itinerary {
                pnrs_by_flight.entry(key.clone()).or_default().push(idx);
            }
        }

        let mut weather_by_station: HashMap<StationCode, Vec<WeatherRecord>> = HashMap::new();
        for w in file.weather {
            weather_by_station.entry(w.station_code.clone()).or_default().push(w);
        }
        for records in weather_by_station.values_mut() {
            records.sort_by(|a, b| {
                a.valid_time_utc
                    .cmp(&b.valid_time_utc)
                    .then_with(|| a.record_id.cmp(&b.record_id))
            });
        }

        Ok(Self {
            op_date: file.op_date,
            airports,
            flights,
            rotations: file.rotations,
            aircraft,
            duties,
            duty_by_flight,
            flights_by_duty,
            pnrs: file.pnr_trips,
            pnrs_by_flight,
            weather_by_station,
        })
    }

    pub fn from_json(content: &str) -> EngineResult<Self> {
        let file: SnapshotFile = serde_json::from_str(content)?;
        Self::from_file(file)
    }

    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        Ok(Self::from_json(&content)?)
    }

    /// Back to the serialized form, in deterministic order.
    pub fn to_file(&self) -> SnapshotFile {
        let mut crew_assignments = Vec::new();
        for (duty_id, keys) in &self.flights_by_duty {
            for (i, key) in keys.iter().enumerate() {
                crew_assignments.push(CrewAssignment {
                    duty_id:              duty_id.clone(),
                    flight_key:           key.clone(),
                    leg_sequence_in_duty: i as u32 + 1,
                });
            }
        }
        let mut weather: Vec<WeatherRecord> =
            self.weather_by_station.values().flatten().cloned().collect();
        weather.sort_by(|a, b| {
            a.valid_time_utc
                .cmp(&b.valid_time_utc)
                .then_with(|| a.record_id.cmp(&b.record_id))
        });
        SnapshotFile {
            op_date:   self.op_date,
            airports:  self.airports.values().cloned().collect(),
            flights:   self.flights.values().cloned().collect(),
            rotations: self.rotations.clone(),
            aircraft:  self.aircraft.values().cloned().collect(),
            crew_duties: self.duties.values().cloned().collect(),
            crew_assignments,
            pnr_trips: self.pnrs.clone(),
            weather,
        }
    }

    // ── Accessors ──────────────────────────────────────────────

    pub fn op_date(&self) -> NaiveDate {
        self.op_date
    }

    pub fn flight(&self, key: &str) -> Option<&Flight> {
        self.flights.get(key)
    }

    /// All flights in key order.
    pub fn flights(&self) -> impl Iterator<Item = &Flight> {
        self.flights.values()
    }

    pub fn flight_count(&self) -> usize {
        self.flights.len()
    }

    pub fn airport(&self, code: &str) -> Option<&Airport> {
        self.airports.get(code)
    }

    pub fn rotations(&self) -> &[RotationLink] {
        &self.rotations
    }

    pub fn aircraft(&self, tail: &str) -> Option<&Aircraft> {
        self.aircraft.get(tail)
    }

    pub fn duty(&self, duty_id: &str) -> Option<&CrewDuty> {
        self.duties.get(duty_id)
    }

    pub fn duty_for_flight(&self, key: &str) -> Option<&CrewDuty> {
        self.duty_by_flight.get(key).and_then(|id| self.duties.get(id))
    }

    /// Flights of a duty in duty sequence order.
    pub fn flights_for_duty(&self, duty_id: &str) -> &[FlightKey] {
        self.flights_by_duty
            .get(duty_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn pnrs_for_flight(&self, key: &str) -> impl Iterator<Item = &PnrTrip> {
        self.pnrs_by_flight
            .get(key)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.pnrs[idx])
    }

    /// Latest record valid at `at`; otherwise the earliest later one.
    pub fn weather_at(&self, station: &str, at: DateTime<Utc>) -> Option<&WeatherRecord> {
        let records = self.weather_by_station.get(station)?;
        let idx = records.partition_point(|w| w.valid_time_utc <= at);
        if idx > 0 {
            records.get(idx - 1)
        } else {
            records.first()
        }
    }
}
