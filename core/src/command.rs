use serde::{Deserialize, Serialize};
use crate::{
    simulation::{DelaySimulation, ReserveCrewSimulation, TailSwapSimulation},
    types::{DutyId, FlightKey, Minutes},
};

/// Every what-if an operator can submit.
/// Variants may be added; existing tags are never renamed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum SimulationRequest {
    Delay {
        flight_key:    FlightKey,
        delay_minutes: Minutes,
    },
    ReserveCrew {
        duty_id: DutyId,
    },
    TailSwap {
        first_flight:  FlightKey,
        second_flight: FlightKey,
    },
}

impl SimulationRequest {
    /// Stable name used in the journal and the runner's output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Delay { .. }       => "delay",
            Self::ReserveCrew { .. } => "reserve_crew",
            Self::TailSwap { .. }    => "tail_swap",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SimulationOutcome {
    Delay(DelaySimulation),
    ReserveCrew(ReserveCrewSimulation),
    TailSwap(TailSwapSimulation),
}

impl SimulationOutcome {
    pub fn is_feasible(&self) -> bool {
        use crate::simulation::TailSwapVerdict;
        match self {
            Self::Delay(d)       => d.verdict.is_feasible(),
            Self::ReserveCrew(r) => r.verdict.is_feasible(),
            Self::TailSwap(t)    => matches!(t.verdict, TailSwapVerdict::Feasible { .. }),
        }
    }
}
