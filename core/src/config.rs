//! Engine configuration.
//!
//! Every weight, threshold and ceiling used by the scorer and the
//! propagation walk lives here. Defaults are starting points for tuning,
//! not validated business rules.

use crate::{entity::MelSeverity, risk_scorer::RiskBand, types::Minutes};
use serde::{Deserialize, Serialize};

// ── Scoring ──────────────────────────────────────────────────────────────────

/// Weights of the composite risk blend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringWeights {
    pub delay_risk:          f64,
    pub turn_failure:        f64,
    pub misconnect:          f64,
    pub network_criticality: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            delay_risk:          0.30,
            turn_failure:        0.25,
            misconnect:          0.25,
            network_criticality: 0.20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BandThresholds {
    pub medium: f64,
    pub high:   f64,
}

impl Default for BandThresholds {
    fn default() -> Self {
        Self { medium: 40.0, high: 70.0 }
    }
}

impl BandThresholds {
    pub fn classify(&self, score: f64) -> RiskBand {
        if score >= self.high {
            RiskBand::High
        } else if score >= self.medium {
            RiskBand::Medium
        } else {
            RiskBand::Low
        }
    }
}

/// Upper bound of each component before it is scaled onto the total.
/// The four ceilings are expected to sum to 100.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ComponentCeilings {
    pub crew_legality: f64,
    pub environment:   f64,
    pub passenger:     f64,
    pub maintenance:   f64,
}

impl Default for ComponentCeilings {
    fn default() -> Self {
        Self {
            crew_legality: 30.0,
            environment:   25.0,
            passenger:     25.0,
            maintenance:   20.0,
        }
    }
}

impl ComponentCeilings {
    pub fn total(&self) -> f64 {
        self.crew_legality + self.environment + self.passenger + self.maintenance
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CrewConfig {
    /// Post-flight time added to FDP when projecting release.
    pub release_allowance_minutes: Minutes,
    /// Remaining-FDP window over which legality pressure ramps up.
    pub pressure_window_minutes:   Minutes,
    pub time_zone_penalty_per_hour: f64,
}

impl Default for CrewConfig {
    fn default() -> Self {
        Self {
            release_allowance_minutes:  30,
            pressure_window_minutes:    120,
            time_zone_penalty_per_hour: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub curfew_buffer_minutes: Minutes,
    pub weather_weight:        f64,
    pub flow_program_weight:   f64,
    pub congestion_weight:     f64,
    pub slot_weight:           f64,
    pub curfew_weight:         f64,
    /// EDCT delay at which flow-program exposure saturates.
    pub edct_saturation_minutes: Minutes,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            curfew_buffer_minutes:   60,
            weather_weight:          0.45,
            flow_program_weight:     0.20,
            congestion_weight:       0.10,
            slot_weight:             0.05,
            curfew_weight:           0.20,
            edct_saturation_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PassengerConfig {
    /// Expected misconnecting passengers at which the component saturates.
    pub saturation_pax: f64,
    /// Extra weight applied per unit of elite share.
    pub elite_weight:   f64,
}

impl Default for PassengerConfig {
    fn default() -> Self {
        Self { saturation_pax: 60.0, elite_weight: 1.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub mel_risk_severities: Vec<MelSeverity>,
    pub severity_weight:     f64,
    pub aog_weight:          f64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            mel_risk_severities: vec![MelSeverity::CatA, MelSeverity::CatB],
            severity_weight:     0.75,
            aog_weight:          0.25,
        }
    }
}

impl MaintenanceConfig {
    pub fn severity_index(severity: MelSeverity) -> f64 {
        match severity {
            MelSeverity::CatA => 1.0,
            MelSeverity::CatB => 0.7,
            MelSeverity::CatC => 0.4,
            MelSeverity::CatD => 0.2,
        }
    }
}

/// How derived signals respond to added delay, plus flag thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SignalConfig {
    pub turn_risk_threshold:      f64,
    pub delay_risk_per_minute:    f64,
    pub turn_success_per_minute:  f64,
    pub turn_success_floor:       f64,
    pub misconnect_per_minute:    f64,
    pub misconnect_cap:           f64,
    /// Share of revenue exposure at risk on an on-time leg.
    pub on_time_revenue_share:    f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            turn_risk_threshold:     0.70,
            delay_risk_per_minute:   0.5,
            turn_success_per_minute: 1.0 / 120.0,
            turn_success_floor:      0.30,
            misconnect_per_minute:   1.0 / 45.0,
            misconnect_cap:          0.95,
            on_time_revenue_share:   0.05,
        }
    }
}

// ── Propagation ──────────────────────────────────────────────────────────────

/// How carried delay shrinks between consecutive hops.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum DecayModel {
    /// Input to hop k is carried(k-1) * factor, for k >= 2.
    Geometric { factor: f64 },
    /// Input to hop k is carried(k-1) * (1 - step * (k - 1)), floored at 0.
    Linear { step: f64 },
}

impl DecayModel {
    /// Multiplier applied to delay entering `hop` (1-based).
    pub fn multiplier(&self, hop: usize) -> f64 {
        if hop <= 1 {
            return 1.0;
        }
        match *self {
            Self::Geometric { factor } => factor.clamp(0.0, 1.0),
            Self::Linear { step } => (1.0 - step * (hop - 1) as f64).clamp(0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PropagationConfig {
    pub max_depth: usize,
    pub decay:     DecayModel,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            decay:     DecayModel::Linear { step: 0.25 },
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CriticalityMode {
    /// Deterministic walk over the rotation graph only.
    Propagated,
    /// Externally supplied score overrides; falls back to propagated.
    External,
    /// Weighted mix of external and propagated scores.
    Blended { external_weight: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CriticalityConfig {
    pub mode:            CriticalityMode,
    /// Share of the score driven by the plain count of Medium+ legs.
    pub count_weight:    f64,
    pub medium_severity: f64,
    pub high_severity:   f64,
}

impl Default for CriticalityConfig {
    fn default() -> Self {
        Self {
            mode:            CriticalityMode::Blended { external_weight: 0.5 },
            count_weight:    0.4,
            medium_severity: 0.5,
            high_severity:   1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FleetConfig {
    /// Block time from which a leg needs an ETOPS-capable aircraft.
    pub etops_block_minutes: Minutes,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self { etops_block_minutes: 360 }
    }
}

// ── Root ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub scoring:     ScoringWeights,
    pub bands:       BandThresholds,
    pub ceilings:    ComponentCeilings,
    pub crew:        CrewConfig,
    pub environment: EnvironmentConfig,
    pub passenger:   PassengerConfig,
    pub maintenance: MaintenanceConfig,
    pub signals:     SignalConfig,
    pub propagation: PropagationConfig,
    pub criticality: CriticalityConfig,
    pub fleet:       FleetConfig,
}

impl EngineConfig {
    /// Load overrides from a JSON file. Missing sections keep defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config = Self::from_json(&content)?;
        log::info!("config: loaded overrides from {path}");
        Ok(config)
    }

    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would break the scorer's range guarantees.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bands.medium > self.bands.high {
            anyhow::bail!(
                "band thresholds out of order: medium {} > high {}",
                self.bands.medium, self.bands.high
            );
        }
        let ceilings = [
            ("crew_legality", self.ceilings.crew_legality),
            ("environment", self.ceilings.environment),
            ("passenger", self.ceilings.passenger),
            ("maintenance", self.ceilings.maintenance),
        ];
        for (name, value) in ceilings {
            if !value.is_finite() || value < 0.0 {
                anyhow::bail!("ceilings.{name} must be a finite value >= 0, got {value}");
            }
        }
        if self.ceilings.total() <= 0.0 {
            anyhow::bail!("component ceilings must sum to a positive value");
        }
        let weights = [
            ("delay_risk", self.scoring.delay_risk),
            ("turn_failure", self.scoring.turn_failure),
            ("misconnect", self.scoring.misconnect),
            ("network_criticality", self.scoring.network_criticality),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                anyhow::bail!("scoring.{name} must be a finite value >= 0, got {value}");
            }
        }
        if self.environment.curfew_buffer_minutes < 0 {
            anyhow::bail!("environment.curfew_buffer_minutes must be >= 0");
        }
        if self.propagation.max_depth == 0 {
            anyhow::bail!("propagation.max_depth must be at least 1");
        }
        if let CriticalityMode::Blended { external_weight } = self.criticality.mode {
            if !(0.0..=1.0).contains(&external_weight) {
                anyhow::bail!("criticality external_weight must be within [0, 1]");
            }
        }
        Ok(())
    }
}
