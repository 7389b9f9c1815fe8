//! Declarative gate configuration.
//!
//! A gate file lists steps in the order they run:
//!
//! ```toml
//! [defaults]
//! timeout_secs = 600
//!
//! [[step]]
//! name = "Unit Tests"
//! command = ["pytest", "-q"]
//! env = { PYTHONPATH = "." }
//!
//! [[step]]
//! name = "Formatting"
//! command = ["black", "--check", "."]
//! timeout_secs = 60
//! ```
//!
//! The file is read once at startup and turned into a [`StepPlan`]; nothing
//! re-reads it during a run.

use crate::error::{GateError, Result};
use crate::step::{BuiltinStep, Step, StepPlan};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming a gate file.
pub const CONFIG_ENV: &str = "QGATE_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GateConfig {
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default, rename = "step")]
    pub steps: Vec<StepEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    /// Deadline for steps without their own. An explicit 0 keeps those steps
    /// unbounded even when the command line supplies a timeout.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// One `[[step]]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StepEntry {
    pub name: String,

    pub command: Vec<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    #[serde(default)]
    pub timeout_secs: Option<u64>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl StepEntry {
    fn into_step(self, default_timeout: Option<u64>) -> Step {
        Step {
            name: self.name,
            command: self.command,
            env: self.env,
            working_dir: self.working_dir,
            timeout_secs: self.timeout_secs.or(default_timeout),
        }
    }
}

impl GateConfig {
    /// The builtin four-step gate.
    pub fn builtin() -> Self {
        Self {
            defaults: Defaults::default(),
            steps: BuiltinStep::ALL
                .iter()
                .map(|s| StepEntry {
                    name: s.name().to_string(),
                    command: s.command(),
                    env: BTreeMap::new(),
                    working_dir: None,
                    timeout_secs: None,
                    enabled: true,
                })
                .collect(),
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| GateError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&raw)?;
        debug!(path = %path.display(), steps = config.steps.len(), "Loaded gate config");
        Ok(config)
    }

    /// Load `path` if given, otherwise fall back to the builtin gate.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::builtin()),
        }
    }

    /// Drop disabled steps and validate the rest into a plan.
    pub fn into_plan(self) -> Result<StepPlan> {
        let default_timeout = self.defaults.timeout_secs;
        let steps = self
            .steps
            .into_iter()
            .filter(|entry| {
                if !entry.enabled {
                    info!(step = %entry.name, "Skipping disabled step");
                }
                entry.enabled
            })
            .map(|entry| entry.into_step(default_timeout))
            .collect();

        StepPlan::new(steps)
    }
}
