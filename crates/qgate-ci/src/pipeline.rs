//! Gate pipeline orchestration.
//!
//! Runs every step of a [`StepPlan`] in order, one at a time, records one
//! outcome per step no matter how earlier steps ended, then renders the
//! summary. A failing step is data, never an error: `run` only returns `Err`
//! when the pipeline itself is driven through an illegal state transition.

use crate::error::{GateError, Result};
use crate::gate::{GateVerdict, QualityGate, RunSummary};
use crate::identity::RunIdentity;
use crate::outcome::ResultSet;
use crate::report;
use crate::runner::{OutputMode, ProcessExecutor, StepExecutor};
use crate::step::StepPlan;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::time::Instant;
use tracing::{info, warn};

/// Lifecycle of a pipeline. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerState {
    Idle,
    Running,
    Reporting,
    Finished,
}

impl RunnerState {
    fn can_transition_to(self, next: RunnerState) -> bool {
        matches!(
            (self, next),
            (RunnerState::Idle, RunnerState::Running)
                | (RunnerState::Running, RunnerState::Reporting)
                | (RunnerState::Reporting, RunnerState::Finished)
        )
    }
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunnerState::Idle => "idle",
            RunnerState::Running => "running",
            RunnerState::Reporting => "reporting",
            RunnerState::Finished => "finished",
        };
        f.write_str(s)
    }
}

/// Result of a complete gate run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    #[serde(flatten)]
    pub identity: RunIdentity,

    /// One outcome per planned step, in plan order.
    #[serde(flatten)]
    pub results: ResultSet,

    pub summary: RunSummary,

    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

impl PipelineResult {
    /// Whether all steps passed.
    pub fn success(&self) -> bool {
        !self.summary.any_failure
    }

    pub fn passed_count(&self) -> usize {
        self.summary.passed.len()
    }

    pub fn failed_count(&self) -> usize {
        self.summary.failed.len()
    }

    /// Aggregate process exit status (0 or 1).
    pub fn exit_code(&self) -> i32 {
        self.summary.exit_code()
    }

    pub fn verdict(&self) -> GateVerdict {
        QualityGate::evaluate(&self.results)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Gate runner: executes a step plan sequentially and fail-complete.
pub struct GatePipeline<E = ProcessExecutor> {
    executor: E,
    mode: OutputMode,
    state: RunnerState,
}

impl GatePipeline<ProcessExecutor> {
    pub fn new(mode: OutputMode) -> Self {
        Self::with_executor(ProcessExecutor, mode)
    }
}

impl<E: StepExecutor> GatePipeline<E> {
    pub fn with_executor(executor: E, mode: OutputMode) -> Self {
        Self {
            executor,
            mode,
            state: RunnerState::Idle,
        }
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    fn transition(&mut self, next: RunnerState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(GateError::InvalidTransition {
                current: self.state.to_string(),
                requested: next.to_string(),
            });
        }
        self.state = next;
        Ok(())
    }

    /// Execute every step in `plan` and render headers and the summary to
    /// `out`.
    ///
    /// Write errors on `out` are logged and otherwise ignored; losing the
    /// console must not cut a run short.
    pub async fn run<W: Write + ?Sized>(
        &mut self,
        plan: &StepPlan,
        out: &mut W,
    ) -> Result<PipelineResult> {
        self.transition(RunnerState::Running)?;

        let start = Instant::now();
        let identity = RunIdentity::new(plan);
        info!(
            run_id = %identity.run_id,
            steps = plan.len(),
            digest = %identity.short_digest(),
            mode = ?self.mode,
            "Starting gate run"
        );

        let mut results = ResultSet::new();
        for (index, step) in plan.steps().iter().enumerate() {
            if let Err(e) = report::write_step_header(out, &step.name) {
                warn!(step = %step.name, error = %e, "Failed to write step header");
            }

            info!(step = %step.name, index, command = %step.command_line(), "Executing step");
            let mut outcome = self.executor.execute(index, step, self.mode).await;
            // The plan owns position and name; the executor only reports how
            // the step went.
            outcome.index = index;
            outcome.name.clone_from(&step.name);
            info!(
                step = %step.name,
                index,
                exit_code = outcome.code(),
                duration_ms = outcome.duration_ms,
                status = outcome.status.label(),
                "Step finished"
            );

            if let Some(captured) = &outcome.output {
                if let Err(e) = report::write_captured(out, &step.name, captured) {
                    warn!(step = %step.name, error = %e, "Failed to write captured output");
                }
            }

            let recorded = results.record(outcome);
            debug_assert!(recorded, "result set out of step with plan at {index}");
        }

        self.transition(RunnerState::Reporting)?;

        let summary = RunSummary::from_results(&results);
        if let Err(e) = report::write_summary(out, &results, &summary) {
            warn!(error = %e, "Failed to write summary");
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        if summary.any_failure {
            info!(
                run_id = %identity.run_id,
                failed = ?summary.failed,
                duration_ms,
                "Gate run failed"
            );
        } else {
            info!(run_id = %identity.run_id, duration_ms, "Gate run passed");
        }

        self.transition(RunnerState::Finished)?;

        Ok(PipelineResult {
            identity,
            results,
            summary,
            duration_ms,
        })
    }
}
