//! Error types for the fallible edges of the crate
//!
//! The simulation and planner never fail; only loading configuration
//! and fitting the aim model can.

use thiserror::Error;

/// Result type alias for cuesport operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Generic IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Table preset name did not match any known preset
    #[error("unknown table preset: {0}")]
    UnknownPreset(String),

    /// Configuration violates a basic invariant
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Too few samples to fit the requested model
    #[error("not enough samples: need {needed}, got {got}")]
    NotEnoughSamples { needed: usize, got: usize },

    /// Normal equations could not be solved
    #[error("singular system while fitting model")]
    SingularSystem,
}
