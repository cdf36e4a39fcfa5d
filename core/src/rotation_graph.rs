//! Rotation graph — the ordered chain of legs each tail flies.
//!
//! Chains are stored as an arena of `TailChain`s (one Vec of flight keys
//! per tail, in sequence order) plus a flight → slot index. The embedded
//! prev/next pointers of the ingested links are only used for validation.

use crate::{
    entity::RotationLink,
    error::DataIntegrityError,
    types::{FlightKey, TailNumber},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TailChain {
    pub tail_number: TailNumber,
    pub legs:        Vec<FlightKey>,
}

impl TailChain {
    pub fn position_of(&self, key: &str) -> Option<usize> {
        self.legs.iter().position(|k| k == key)
    }

    /// Up to `max_depth` legs after `position`, stopping on any revisit.
    pub fn walk_from(&self, position: usize, max_depth: usize) -> Vec<FlightKey> {
        let mut visited: HashSet<&str> = HashSet::new();
        if let Some(origin) = self.legs.get(position) {
            visited.insert(origin.as_str());
        }
        let mut out = Vec::new();
        for key in self.legs.iter().skip(position + 1) {
            if out.len() >= max_depth || !visited.insert(key.as_str()) {
                break;
            }
            out.push(key.clone());
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegSlot {
    pub chain:    usize,
    pub position: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RotationGraph {
    chains: Vec<TailChain>,
    index:  HashMap<FlightKey, LegSlot>,
}

impl RotationGraph {
    /// Validate the links and build the chains. Any violation is returned
    /// as-is; nothing is repaired.
    pub fn build(links: &[RotationLink]) -> Result<Self, DataIntegrityError> {
        let mut by_tail: BTreeMap<&str, Vec<&RotationLink>> = BTreeMap::new();
        let mut seen_flights: HashSet<&str> = HashSet::new();
        for link in links {
            if !seen_flights.insert(link.flight_key.as_str()) {
                return Err(DataIntegrityError::DuplicateFlight {
                    flight_key: link.flight_key.clone(),
                });
            }
            by_tail.entry(link.tail_number.as_str()).or_default().push(link);
        }

        let mut graph = RotationGraph::default();
        for (tail, mut tail_links) in by_tail {
            tail_links.sort_by_key(|l| l.sequence_position);
            validate_chain(tail, &tail_links)?;

            let chain_idx = graph.chains.len();
            let legs: Vec<FlightKey> = tail_links.iter().map(|l| l.flight_key.clone()).collect();
            for (position, key) in legs.iter().enumerate() {
                graph.index.insert(key.clone(), LegSlot { chain: chain_idx, position });
            }
            graph.chains.push(TailChain { tail_number: tail.to_string(), legs });
        }

        log::debug!(
            "rotation graph: {} tails, {} legs",
            graph.chains.len(),
            graph.index.len()
        );
        Ok(graph)
    }

    /// Legs flown after `key` by the same tail, nearest first.
    pub fn successors(&self, key: &str, max_depth: usize) -> Vec<FlightKey> {
        match self.index.get(key) {
            Some(slot) => self.chains[slot.chain].walk_from(slot.position, max_depth),
            None => Vec::new(),
        }
    }

    /// The leg flown immediately before `key` by the same tail.
    pub fn predecessor(&self, key: &str) -> Option<&FlightKey> {
        let slot = self.index.get(key)?;
        let position = slot.position.checked_sub(1)?;
        self.chains[slot.chain].legs.get(position)
    }

    pub fn slot(&self, key: &str) -> Option<LegSlot> {
        self.index.get(key).copied()
    }

    pub fn chain(&self, idx: usize) -> &TailChain {
        &self.chains[idx]
    }

    pub fn chains(&self) -> &[TailChain] {
        &self.chains
    }

    pub fn chain_of(&self, key: &str) -> Option<&TailChain> {
        self.index.get(key).map(|slot| &self.chains[slot.chain])
    }

    pub fn tail_of(&self, key: &str) -> Option<&TailNumber> {
        self.chain_of(key).map(|c| &c.tail_number)
    }

    pub fn leg_count(&self) -> usize {
        self.index.len()
    }

    /// Copies of the two chains holding `a` and `b`, with the two legs
    /// exchanged. `None` when either leg is unknown or both share a tail.
    pub fn exchange_legs(&self, a: &str, b: &str) -> Option<(TailChain, TailChain)> {
        let slot_a = self.slot(a)?;
        let slot_b = self.slot(b)?;
        if slot_a.chain == slot_b.chain {
            return None;
        }
        let mut chain_a = self.chains[slot_a.chain].clone();
        let mut chain_b = self.chains[slot_b.chain].clone();
        chain_a.legs[slot_a.position] = b.to_string();
        chain_b.legs[slot_b.position] = a.to_string();
        Some((chain_a, chain_b))
    }
}

/// Single explicit pass over one tail's links, already sorted by position.
fn validate_chain(tail: &str, links: &[&RotationLink]) -> Result<(), DataIntegrityError> {
    for pair in links.windows(2) {
        if pair[0].sequence_position == pair[1].sequence_position {
            return Err(DataIntegrityError::DuplicateSequence {
                tail:     tail.to_string(),
                position: pair[0].sequence_position,
            });
        }
    }

    let keys: HashSet<&str> = links.iter().map(|l| l.flight_key.as_str()).collect();
    for link in links {
        for target in [&link.next_flight_key, &link.prev_flight_key].into_iter().flatten() {
            if !keys.contains(target.as_str()) {
                return Err(DataIntegrityError::DanglingPointer {
                    tail: tail.to_string(),
                    from: link.flight_key.clone(),
                    to:   target.clone(),
                });
            }
        }
    }

    // Out-degree is at most one, so a walk from each node finds any cycle.
    let next: HashMap<&str, &str> = links
        .iter()
        .filter_map(|l| l.next_flight_key.as_deref().map(|n| (l.flight_key.as_str(), n)))
        .collect();
    let mut acyclic: HashSet<&str> = HashSet::new();
    for link in links {
        let mut path: HashSet<&str> = HashSet::new();
        let mut cursor = Some(link.flight_key.as_str());
        while let Some(key) = cursor {
            if acyclic.contains(key) {
                break;
            }
            if !path.insert(key) {
                return Err(DataIntegrityError::Cycle {
                    tail:       tail.to_string(),
                    flight_key: key.to_string(),
                });
            }
            cursor = next.get(key).copied();
        }
        acyclic.extend(path);
    }

    for (i, link) in links.iter().enumerate() {
        let expected_next = links.get(i + 1).map(|l| l.flight_key.as_str());
        let expected_prev = i.checked_sub(1).map(|p| links[p].flight_key.as_str());
        if link.next_flight_key.as_deref() != expected_next
            || link.prev_flight_key.as_deref() != expected_prev
        {
            return Err(DataIntegrityError::ChainMismatch {
                tail:       tail.to_string(),
                flight_key: link.flight_key.clone(),
            });
        }
    }
    Ok(())
}
