//! irop-core: disruption risk scoring and delay propagation for one
//! operational day, with read-only what-if simulation.

pub mod baseline;
pub mod command;
pub mod config;
pub mod engine;
pub mod entity;
pub mod error;
pub mod event;
pub mod generator;
pub mod overlay;
pub mod propagation;
pub mod risk_scorer;
pub mod rng;
pub mod rotation_graph;
pub mod simulation;
pub mod snapshot;
pub mod store;
pub mod types;
