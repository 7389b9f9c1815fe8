//! Error types for gate planning and run bookkeeping.
//!
//! Step failures are never errors: a non-zero exit, a launch failure or a
//! timeout is recorded as an [`crate::outcome::StepStatus`]. `GateError` only
//! covers problems that stop a run before it starts.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GateError {
    /// Config file could not be read
    #[error("Failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML or has the wrong shape
    #[error("Invalid config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Step plan is empty: at least one enabled step is required")]
    EmptyPlan,

    #[error("Duplicate step name '{name}' at positions {first} and {second}")]
    DuplicateStep {
        name: String,
        first: usize,
        second: usize,
    },

    #[error("Step at position {index} has a blank name")]
    BlankName { index: usize },

    #[error("Step '{0}' has an empty command")]
    EmptyCommand(String),

    #[error("Invalid runner state transition: {current} -> {requested}")]
    InvalidTransition { current: String, requested: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for gate operations
pub type Result<T> = std::result::Result<T, GateError>;
