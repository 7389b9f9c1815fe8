//! qgate CI - fail-complete quality gate
//!
//! Runs an ordered list of verification steps (tests, format check,
//! security scan, dependency audit) as external processes:
//! - every step runs, whatever happened to the ones before it
//! - one outcome per step, kept in step-list order
//! - one aggregate exit status: 0 only when every step passed

pub mod config;
pub mod error;
pub mod gate;
pub mod identity;
pub mod outcome;
pub mod pipeline;
pub mod report;
pub mod runner;
pub mod step;
pub mod telemetry;

// Re-export key types
pub use config::{GateConfig, CONFIG_ENV};
pub use error::{GateError, Result};
pub use gate::{GateVerdict, QualityGate, RunSummary, EXIT_FAILURE, EXIT_SUCCESS};
pub use identity::RunIdentity;
pub use outcome::{CapturedOutput, Outcome, ResultSet, StepStatus};
pub use pipeline::{GatePipeline, PipelineResult, RunnerState};
pub use runner::{OutputMode, ProcessExecutor, StepExecutor};
pub use step::{BuiltinStep, Step, StepPlan};
pub use telemetry::init_tracing;
