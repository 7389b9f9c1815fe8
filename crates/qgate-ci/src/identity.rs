//! Run identity: run id, start time and a digest of the step plan.

use crate::step::StepPlan;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Identity of a single gate run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunIdentity {
    pub run_id: Uuid,

    pub started_at: DateTime<Utc>,

    /// SHA-256 over ordered step names and commands (deterministic).
    pub steps_digest: String,
}

impl RunIdentity {
    pub fn new(plan: &StepPlan) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            steps_digest: compute_steps_digest(plan),
        }
    }

    /// First 12 hex chars of the digest, for log lines.
    pub fn short_digest(&self) -> &str {
        &self.steps_digest[..12.min(self.steps_digest.len())]
    }
}

/// Compute deterministic digest of the ordered plan.
pub fn compute_steps_digest(plan: &StepPlan) -> String {
    let mut hasher = Sha256::new();
    for step in plan.steps() {
        hasher.update(step.name.as_bytes());
        hasher.update(b"\0");
        for arg in &step.command {
            hasher.update(arg.as_bytes());
            hasher.update(b"\x1f");
        }
        hasher.update(b"\0");
    }
    hex::encode(hasher.finalize())
}
