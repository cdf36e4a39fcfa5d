//! Journal events.
//!
//! RULE: events describe what the engine did; they are never read back
//! into scoring. Dropping the journal changes no result.

use crate::{
    baseline::BandCounts,
    risk_scorer::MissingSignal,
    types::{FlightKey, Generation},
};
use serde::{Deserialize, Serialize};

/// Every event the engine journals.
/// Variants are appended, never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    BaselinePublished {
        generation:   Generation,
        flight_count: usize,
        tail_count:   usize,
        bands:        BandCounts,
    },
    MissingSignal {
        generation: Generation,
        flight_key: FlightKey,
        signal:     MissingSignal,
    },
    SimulationCompleted {
        generation: Generation,
        request_id: String,
        kind:       String,
        feasible:   bool,
        request:    serde_json::Value,
    },
    SimulationRejected {
        generation: Generation,
        request_id: String,
        kind:       String,
        reason:     String,
    },
}

impl EngineEvent {
    /// Stable name for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::BaselinePublished { .. }   => "baseline_published",
            Self::MissingSignal { .. }       => "missing_signal",
            Self::SimulationCompleted { .. } => "simulation_completed",
            Self::SimulationRejected { .. }  => "simulation_rejected",
        }
    }

    pub fn generation(&self) -> Generation {
        match self {
            Self::BaselinePublished { generation, .. }
            | Self::MissingSignal { generation, .. }
            | Self::SimulationCompleted { generation, .. }
            | Self::SimulationRejected { generation, .. } => *generation,
        }
    }
}

/// Persisted form of an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id:         Option<i64>,
    pub generation: Generation,
    pub event_type: String,
    pub payload:    String, // JSON-serialized EngineEvent
}

impl EventLogEntry {
    pub fn from_event(event: &EngineEvent) -> serde_json::Result<Self> {
        Ok(Self {
            id:         None,
            generation: event.generation(),
            event_type: event.type_name().to_string(),
            payload:    serde_json::to_string(event)?,
        })
    }

    pub fn decode(&self) -> serde_json::Result<EngineEvent> {
        serde_json::from_str(&self.payload)
    }
}
