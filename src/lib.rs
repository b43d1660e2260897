//! Cuesport - billiards and snooker simulation core
//!
//! Core modules:
//! - `sim`: Deterministic physics (ball state, table geometry, collisions, tick)
//! - `ai`: Shot planning computer opponent and headless what-if simulation
//! - `settings`: Data-driven physics tuning and table presets
//! - `driver`: Synchronous turn driver for batch evaluation

pub mod ai;
pub mod driver;
pub mod error;
pub mod settings;
pub mod sim;

pub use error::{Error, Result};
pub use settings::{PhysicsConfig, TablePreset};

/// Simulation constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz external tick)
    pub const SIM_DT: f64 = 1.0 / 60.0;
    /// Physics substeps per external tick
    pub const SUBSTEPS: u32 = 8;
    /// Hard cap on ticks a single shot may run (one minute of play)
    pub const MAX_SHOT_TICKS: u32 = 60 * 60;

    /// Table units per inch of real cloth
    pub const UNITS_PER_INCH: f64 = 10.0;

    /// Shot power range accepted by the engine
    pub const MIN_POWER: f64 = 0.0;
    pub const MAX_POWER: f64 = 100.0;
    /// Cue-ball launch speed per unit of power (units/s)
    pub const POWER_TO_SPEED: f64 = 30.0;

    /// Largest cue-tip offset as a fraction of ball radius
    pub const MAX_TIP_OFFSET: f64 = 0.5;
}

#[inline]
pub fn deg(radians: f64) -> f64 {
    radians.to_degrees()
}

#[inline]
pub fn rad(degrees: f64) -> f64 {
    degrees.to_radians()
}
