use crate::types::{FlightKey, TailNumber};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Rotation data integrity violation: {0}")]
    DataIntegrity(#[from] DataIntegrityError),

    #[error("{kind} '{key}' not found")]
    NotFound { kind: &'static str, key: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    pub fn flight_not_found(key: &str) -> Self {
        Self::NotFound { kind: "flight", key: key.to_string() }
    }

    pub fn duty_not_found(duty_id: &str) -> Self {
        Self::NotFound { kind: "crew duty", key: duty_id.to_string() }
    }
}

/// Malformed rotation chains or flight records. Fatal to the build, never repaired.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataIntegrityError {
    #[error("tail {tail}: sequence position {position} used more than once")]
    DuplicateSequence { tail: TailNumber, position: u32 },

    #[error("flight {flight_key} appears in more than one rotation slot")]
    DuplicateFlight { flight_key: FlightKey },

    #[error("tail {tail}: {from} points to unknown flight {to}")]
    DanglingPointer { tail: TailNumber, from: FlightKey, to: FlightKey },

    #[error("tail {tail}: next-pointer cycle through {flight_key}")]
    Cycle { tail: TailNumber, flight_key: FlightKey },

    #[error("tail {tail}: pointer chain disagrees with sequence order at {flight_key}")]
    ChainMismatch { tail: TailNumber, flight_key: FlightKey },

    #[error("tail {tail}: rotation names flight {flight_key}, which is not in the snapshot")]
    UnknownFlight { tail: TailNumber, flight_key: FlightKey },

    #[error("snapshot lists flight {flight_key} more than once")]
    DuplicateFlightRecord { flight_key: FlightKey },
}

pub type EngineResult<T> = Result<T, EngineError>;
