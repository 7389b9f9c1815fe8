//! Gate step definitions and the validated step plan.

use crate::error::{GateError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

/// Builtin gate steps, in their default order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinStep {
    /// pytest
    UnitTests,

    /// black --check .
    Formatting,

    /// bandit -r . -q
    Security,

    /// pip-audit
    DependencyAudit,
}

impl BuiltinStep {
    /// All builtin steps in gate order.
    pub const ALL: [BuiltinStep; 4] = [
        BuiltinStep::UnitTests,
        BuiltinStep::Formatting,
        BuiltinStep::Security,
        BuiltinStep::DependencyAudit,
    ];

    /// Display name, also used as the summary label.
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinStep::UnitTests => "Unit Tests",
            BuiltinStep::Formatting => "Formatting",
            BuiltinStep::Security => "Security",
            BuiltinStep::DependencyAudit => "Dependency Audit",
        }
    }

    /// Command line for the step (first element is the executable).
    pub fn command(&self) -> Vec<String> {
        let argv: &[&str] = match self {
            BuiltinStep::UnitTests => &["pytest"],
            BuiltinStep::Formatting => &["black", "--check", "."],
            BuiltinStep::Security => &["bandit", "-r", ".", "-q"],
            BuiltinStep::DependencyAudit => &["pip-audit"],
        };
        argv.iter().map(|s| s.to_string()).collect()
    }
}

/// One named unit of work in the gate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Step {
    /// Human-readable step name.
    pub name: String,

    /// Command to execute (first element is executable).
    pub command: Vec<String>,

    /// Extra environment variables layered over the inherited environment.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    /// Working directory, defaults to the orchestrator's own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,

    /// Deadline in seconds. `Some(0)` is an explicit "no deadline" that a
    /// default timeout will not replace; `None` leaves it open to one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Step {
    pub fn from_builtin(step: BuiltinStep, timeout_secs: u64) -> Self {
        Self {
            name: step.name().to_string(),
            command: step.command(),
            env: BTreeMap::new(),
            working_dir: None,
            timeout_secs: (timeout_secs > 0).then_some(timeout_secs),
        }
    }

    pub fn custom(name: impl Into<String>, command: Vec<String>) -> Self {
        Self {
            name: name.into(),
            command,
            env: BTreeMap::new(),
            working_dir: None,
            timeout_secs: None,
        }
    }

    /// Set the deadline; 0 pins the step as unbounded.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Deadline for this step, if any.
    pub fn deadline(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Command rendered as a single display string.
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

/// Validated, ordered, non-empty list of steps with unique names.
///
/// A `StepPlan` is the only input [`crate::pipeline::GatePipeline`] accepts,
/// so every run starts from a list that cannot produce colliding outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPlan {
    steps: Vec<Step>,
}

impl StepPlan {
    pub fn new(steps: Vec<Step>) -> Result<Self> {
        if steps.is_empty() {
            return Err(GateError::EmptyPlan);
        }

        let mut seen: HashMap<&str, usize> = HashMap::new();
        for (index, step) in steps.iter().enumerate() {
            if step.name.trim().is_empty() {
                return Err(GateError::BlankName { index });
            }
            if step.command.first().map_or(true, |exe| exe.trim().is_empty()) {
                return Err(GateError::EmptyCommand(step.name.clone()));
            }
            if let Some(first) = seen.insert(step.name.as_str(), index) {
                return Err(GateError::DuplicateStep {
                    name: step.name.clone(),
                    first,
                    second: index,
                });
            }
        }

        Ok(Self { steps })
    }

    /// The builtin four-step gate.
    pub fn builtin(timeout_secs: u64) -> Self {
        Self {
            steps: BuiltinStep::ALL
                .iter()
                .map(|s| Step::from_builtin(*s, timeout_secs))
                .collect(),
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Never true for a plan built through `new` or `builtin`.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Apply a default deadline to every step that has not set one.
    ///
    /// Steps pinned to `timeout_secs = 0` stay unbounded.
    pub fn with_default_timeout(mut self, timeout_secs: u64) -> Self {
        for step in &mut self.steps {
            step.timeout_secs.get_or_insert(timeout_secs);
        }
        self
    }
}
