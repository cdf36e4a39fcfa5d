//! Shared primitive types used across the entire engine.

/// Unique key of one flight leg on one operational day.
pub type FlightKey = String;

/// Aircraft registration (tail number).
pub type TailNumber = String;

/// Identifier of one crew duty period.
pub type DutyId = String;

/// Three-letter station code.
pub type StationCode = String;

/// Signed duration in whole minutes.
pub type Minutes = i64;

/// Monotonic counter identifying one published baseline.
pub type Generation = u64;
