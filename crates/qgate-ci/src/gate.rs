//! Gate evaluation: pass/fail partition and aggregate exit status.

use crate::outcome::{ResultSet, StepStatus};
use serde::{Deserialize, Serialize};

/// Exit status when every step passed.
pub const EXIT_SUCCESS: i32 = 0;

/// Exit status when at least one step failed or timed out.
pub const EXIT_FAILURE: i32 = 1;

/// Read-only view over a finished result set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSummary {
    /// Names of passing steps, in step-list order.
    pub passed: Vec<String>,

    /// Names of failing steps (timeouts included), in step-list order.
    pub failed: Vec<String>,

    /// Subset of `failed` that hit their deadline.
    pub timed_out: Vec<String>,

    pub any_failure: bool,
}

impl RunSummary {
    pub fn from_results(results: &ResultSet) -> Self {
        let mut passed = Vec::new();
        let mut failed = Vec::new();
        let mut timed_out = Vec::new();

        for outcome in results.iter() {
            if outcome.passed() {
                passed.push(outcome.name.clone());
                continue;
            }
            if outcome.status.timed_out() {
                timed_out.push(outcome.name.clone());
            }
            failed.push(outcome.name.clone());
        }

        let any_failure = !failed.is_empty();
        Self {
            passed,
            failed,
            timed_out,
            any_failure,
        }
    }

    /// Aggregate process exit status.
    pub fn exit_code(&self) -> i32 {
        if self.any_failure {
            EXIT_FAILURE
        } else {
            EXIT_SUCCESS
        }
    }
}

/// Gate evaluation verdict.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GateVerdict {
    /// Whether the gate passed.
    pub passed: bool,

    /// One message per failed step (empty if passed).
    pub violations: Vec<String>,

    /// Summary message.
    pub message: String,
}

/// Gate evaluation rules.
pub struct QualityGate;

impl QualityGate {
    /// Evaluate whether every step in the result set passed.
    pub fn evaluate(results: &ResultSet) -> GateVerdict {
        let violations: Vec<String> = results
            .iter()
            .filter(|o| !o.passed())
            .map(|o| match &o.status {
                StepStatus::Exited { code } => {
                    format!("Step '{}' exited with code {}", o.name, code)
                }
                StepStatus::LaunchFailed { reason, .. } => {
                    format!("Step '{}' could not be launched: {}", o.name, reason)
                }
                StepStatus::TimedOut { after_secs } => {
                    format!("Step '{}' timed out after {}s", o.name, after_secs)
                }
            })
            .collect();

        let passed = violations.is_empty();
        let message = if passed {
            "All steps passed".to_string()
        } else {
            format!("Gate failed with {} violation(s)", violations.len())
        };

        GateVerdict {
            passed,
            violations,
            message,
        }
    }
}
