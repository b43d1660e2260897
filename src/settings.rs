//! Physics tuning and table presets
//!
//! Loaded from JSON on disk for the batch harness; library callers
//! normally start from `PhysicsConfig::default()`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::{Error, Result};

/// Table size presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TablePreset {
    #[default]
    Pool9ft,
    Pool7ft,
    Snooker,
}

impl TablePreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            TablePreset::Pool9ft => "Pool9ft",
            TablePreset::Pool7ft => "Pool7ft",
            TablePreset::Snooker => "Snooker",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pool9ft" | "9ft" | "pool" => Ok(TablePreset::Pool9ft),
            "pool7ft" | "7ft" | "barbox" => Ok(TablePreset::Pool7ft),
            "snooker" => Ok(TablePreset::Snooker),
            _ => Err(Error::UnknownPreset(s.to_string())),
        }
    }

    /// Playing surface (cushion nose to cushion nose) in table units
    pub fn surface_size(&self) -> (f64, f64) {
        let (w, h) = match self {
            TablePreset::Pool9ft => (100.0, 50.0),
            TablePreset::Pool7ft => (78.0, 39.0),
            TablePreset::Snooker => (140.0, 70.0),
        };
        (w * UNITS_PER_INCH, h * UNITS_PER_INCH)
    }

    pub fn ball_radius(&self) -> f64 {
        match self {
            TablePreset::Pool9ft | TablePreset::Pool7ft => 1.125 * UNITS_PER_INCH,
            TablePreset::Snooker => 1.03125 * UNITS_PER_INCH,
        }
    }

    /// Capture radius of a corner pocket
    pub fn corner_capture_radius(&self) -> f64 {
        match self {
            TablePreset::Pool9ft => 23.0,
            TablePreset::Pool7ft => 24.0,
            TablePreset::Snooker => 20.5,
        }
    }

    /// Capture radius of a side (middle) pocket
    pub fn side_capture_radius(&self) -> f64 {
        match self {
            TablePreset::Pool9ft => 21.0,
            TablePreset::Pool7ft => 22.0,
            TablePreset::Snooker => 19.0,
        }
    }
}

impl std::str::FromStr for TablePreset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Physics tuning constants (units: table units, seconds, radians)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Length of one external tick (seconds)
    pub dt: f64,
    /// Substeps per tick
    pub substeps: u32,

    // === Cloth ===
    /// Deceleration while the contact point slips on the cloth
    pub slide_friction: f64,
    /// Deceleration of a ball in natural roll
    pub roll_friction: f64,
    /// Total slip speed above which a ball counts as sliding
    pub slide_threshold: f64,
    /// Side-spin decay while sliding (rad/s²)
    pub side_decay_sliding: f64,
    /// Side-spin decay while rolling (rad/s²)
    pub side_decay_rolling: f64,
    /// Fraction of slide friction turned into lateral curve by side spin
    pub curve_factor: f64,
    /// Speed at which the lateral curve reaches full strength
    pub curve_full_speed: f64,

    // === Contacts ===
    /// Ball-ball coefficient of restitution
    pub ball_restitution: f64,
    /// Cushion coefficient of restitution
    pub rail_restitution: f64,
    /// Side spin to tangential velocity coupling at the cushion
    pub rail_spin_coupling: f64,
    /// Fraction of side spin kept after a cushion contact
    pub rail_side_retention: f64,
    /// Tangential throw per unit of striker side-spin surface speed
    pub throw_factor: f64,
    /// Throw cap as a fraction of the normal impulse
    pub max_throw_ratio: f64,

    // === Rest and pockets ===
    /// Linear speed below which a ball may be stopped
    pub stop_speed: f64,
    /// Angular speed below which a ball may be stopped
    pub stop_spin: f64,
    /// Seconds a ball takes to drop once captured
    pub sink_duration: f64,
    /// Tick cap for a single shot
    pub max_shot_ticks: u32,

    // === Cue ===
    pub min_power: f64,
    pub max_power: f64,
    pub power_to_speed: f64,
    /// Spin (as multiple of natural roll) imparted by a full tip offset
    pub tip_spin_scale: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            dt: SIM_DT,
            substeps: SUBSTEPS,

            slide_friction: 900.0,
            roll_friction: 300.0,
            slide_threshold: 6.0,
            side_decay_sliding: 30.0,
            side_decay_rolling: 15.0,
            curve_factor: 0.05,
            curve_full_speed: 400.0,

            ball_restitution: 0.96,
            rail_restitution: 0.75,
            rail_spin_coupling: 0.1,
            rail_side_retention: 0.6,
            throw_factor: 0.02,
            max_throw_ratio: 0.1,

            stop_speed: 2.0,
            stop_spin: 0.5,
            sink_duration: 0.25,
            max_shot_ticks: MAX_SHOT_TICKS,

            min_power: MIN_POWER,
            max_power: MAX_POWER,
            power_to_speed: POWER_TO_SPEED,
            // Solid sphere: omega = 5/2 * v * offset / r^2 at the largest offset
            tip_spin_scale: 2.5 * MAX_TIP_OFFSET,
        }
    }
}

impl PhysicsConfig {
    /// Substep length (seconds)
    #[inline]
    pub fn sub_dt(&self) -> f64 {
        self.dt / self.substeps as f64
    }

    pub fn clamp_power(&self, power: f64) -> f64 {
        power.clamp(self.min_power, self.max_power)
    }

    /// Check basic invariants
    pub fn validate(&self) -> Result<()> {
        if !(self.dt > 0.0) {
            return Err(Error::InvalidConfig(format!("dt must be positive, got {}", self.dt)));
        }
        if self.substeps == 0 {
            return Err(Error::InvalidConfig("substeps must be at least 1".into()));
        }
        for (name, e) in [
            ("ball_restitution", self.ball_restitution),
            ("rail_restitution", self.rail_restitution),
        ] {
            if !(0.0..=1.0).contains(&e) {
                return Err(Error::InvalidConfig(format!("{name} must be in [0, 1], got {e}")));
            }
        }
        if self.min_power > self.max_power {
            return Err(Error::InvalidConfig("min_power exceeds max_power".into()));
        }
        if self.max_shot_ticks == 0 {
            return Err(Error::InvalidConfig("max_shot_ticks must be at least 1".into()));
        }
        Ok(())
    }

    /// Parse and validate a JSON document (missing fields take defaults)
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn try_load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Load from disk, falling back to defaults
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::try_load(path) {
            Ok(config) => {
                log::info!("Loaded physics config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("Could not load physics config from {}: {}, using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
