//! Deterministic random number generation for synthetic days.
//!
//! RULE: the generator never calls a platform RNG. Every draw flows
//! through a ScenarioRng derived from the caller's seed.
//!
//! Each part of the day (schedule, fleet, crew, ...) gets its own
//! stream, seeded from (seed XOR stream_index). Adding draws to one
//! stream never shifts another stream's values.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// A named, deterministic RNG for one generator stream.
pub struct ScenarioRng {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl ScenarioRng {
    pub fn new(seed: u64, stream_index: u64) -> Self {
        let derived_seed = seed ^ (stream_index.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        Self {
            name: "unnamed",
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    pub fn for_stream(seed: u64, stream: GeneratorStream) -> Self {
        Self::new(seed, stream as u64).with_name(stream.name())
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Roll a u64 in [0, n).
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }

    /// Integer in [lo, hi], inclusive.
    pub fn range_i64(&mut self, lo: i64, hi: i64) -> i64 {
        if hi <= lo {
            return lo;
        }
        lo + self.next_u64_below((hi - lo + 1) as u64) as i64
    }

    /// Float in [lo, hi).
    pub fn range_f64(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Uniform pick from a non-empty slice.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[self.next_u64_below(items.len() as u64) as usize]
    }
}

/// Stable stream assignments.
/// NEVER reorder or remove entries, only append.
/// Reordering changes every stream's seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum GeneratorStream {
    Schedule = 0,
    Fleet = 1,
    Crew = 2,
    Passengers = 3,
    Weather = 4,
    Signals = 5,
}

impl GeneratorStream {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Schedule => "schedule",
            Self::Fleet => "fleet",
            Self::Crew => "crew",
            Self::Passengers => "passengers",
            Self::Weather => "weather",
            Self::Signals => "signals",
        }
    }
}
