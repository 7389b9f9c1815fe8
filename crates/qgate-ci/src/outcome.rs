//! Step outcomes and the per-run result set.

use serde::{Deserialize, Serialize};

/// Status code recorded when the executable does not exist.
pub const LAUNCH_NOT_FOUND_CODE: i32 = 127;

/// Status code recorded when the executable is not runnable.
pub const LAUNCH_DENIED_CODE: i32 = 126;

/// Status code recorded for any other launch error.
pub const LAUNCH_ERROR_CODE: i32 = -1;

/// Status code recorded for a step killed at its deadline.
pub const TIMED_OUT_CODE: i32 = 124;

/// How a step ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepStatus {
    /// Process ran and exited (or was signalled, recorded as -1).
    Exited { code: i32 },

    /// Process could not be started.
    LaunchFailed { code: i32, reason: String },

    /// Process was killed after exceeding its deadline.
    TimedOut { after_secs: u64 },
}

impl StepStatus {
    /// Integer status, 0 only for a clean exit.
    pub fn code(&self) -> i32 {
        match self {
            StepStatus::Exited { code } => *code,
            StepStatus::LaunchFailed { code, .. } => *code,
            StepStatus::TimedOut { .. } => TIMED_OUT_CODE,
        }
    }

    pub fn passed(&self) -> bool {
        matches!(self, StepStatus::Exited { code: 0 })
    }

    pub fn timed_out(&self) -> bool {
        matches!(self, StepStatus::TimedOut { .. })
    }

    /// Summary tag.
    pub fn label(&self) -> &'static str {
        match self {
            StepStatus::TimedOut { .. } => "TIMEOUT",
            s if s.passed() => "PASS",
            _ => "FAIL",
        }
    }
}

/// Output captured in buffered mode.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Result of executing one step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Outcome {
    /// Position of the step in the plan.
    pub index: usize,

    /// Step name.
    pub name: String,

    pub status: StepStatus,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Present only when the step ran in buffered mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<CapturedOutput>,
}

impl Outcome {
    pub fn code(&self) -> i32 {
        self.status.code()
    }

    pub fn passed(&self) -> bool {
        self.status.passed()
    }
}

/// Outcomes of one run, keyed by step position.
///
/// Slots are filled strictly in order; each position is written once.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResultSet {
    outcomes: Vec<Outcome>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the outcome for the next position.
    ///
    /// Returns `false` (and drops the outcome) if `outcome.index` is not the
    /// next unfilled position.
    pub(crate) fn record(&mut self, outcome: Outcome) -> bool {
        if outcome.index != self.outcomes.len() {
            return false;
        }
        self.outcomes.push(outcome);
        true
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Outcome> {
        self.outcomes.get(index)
    }

    /// Look up an outcome by step name.
    pub fn by_name(&self, name: &str) -> Option<&Outcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }

    /// Outcomes in step-list order.
    pub fn iter(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter()
    }

    /// `(name, code)` pairs in step-list order.
    pub fn codes(&self) -> Vec<(&str, i32)> {
        self.outcomes
            .iter()
            .map(|o| (o.name.as_str(), o.code()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(index: usize, name: &str, status: StepStatus) -> Outcome {
        Outcome {
            index,
            name: name.to_string(),
            status,
            duration_ms: 10,
            output: None,
        }
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(StepStatus::Exited { code: 0 }.code(), 0);
        assert_eq!(StepStatus::Exited { code: 3 }.code(), 3);
        assert_eq!(
            StepStatus::LaunchFailed {
                code: LAUNCH_NOT_FOUND_CODE,
                reason: "missing".to_string()
            }
            .code(),
            127
        );
        assert_eq!(StepStatus::TimedOut { after_secs: 5 }.code(), TIMED_OUT_CODE);
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(StepStatus::Exited { code: 0 }.label(), "PASS");
        assert_eq!(StepStatus::Exited { code: 1 }.label(), "FAIL");
        assert_eq!(StepStatus::Exited { code: -1 }.label(), "FAIL");
        assert_eq!(
            StepStatus::LaunchFailed {
                code: LAUNCH_ERROR_CODE,
                reason: String::new()
            }
            .label(),
            "FAIL"
        );
        assert_eq!(StepStatus::TimedOut { after_secs: 1 }.label(), "TIMEOUT");
    }

    #[test]
    fn test_only_clean_exit_passes() {
        assert!(StepStatus::Exited { code: 0 }.passed());
        assert!(!StepStatus::Exited { code: 2 }.passed());
        assert!(!StepStatus::TimedOut { after_secs: 1 }.passed());
        assert!(StepStatus::TimedOut { after_secs: 1 }.timed_out());
    }

    #[test]
    fn test_result_set_records_in_order() {
        let mut results = ResultSet::new();
        assert!(results.record(outcome(0, "a", StepStatus::Exited { code: 0 })));
        assert!(results.record(outcome(1, "b", StepStatus::Exited { code: 1 })));

        assert_eq!(results.len(), 2);
        assert_eq!(results.codes(), vec![("a", 0), ("b", 1)]);
        assert_eq!(results.by_name("b").map(Outcome::code), Some(1));
        assert!(results.by_name("c").is_none());
    }

    #[test]
    fn test_result_set_rejects_out_of_order_and_repeat() {
        let mut results = ResultSet::new();
        assert!(!results.record(outcome(1, "b", StepStatus::Exited { code: 0 })));
        assert!(results.record(outcome(0, "a", StepStatus::Exited { code: 0 })));
        assert!(!results.record(outcome(0, "a", StepStatus::Exited { code: 1 })));

        assert_eq!(results.len(), 1);
        assert_eq!(results.get(0).map(Outcome::code), Some(0));
    }

    #[test]
    fn test_status_serializes_tagged() {
        let json = serde_json::to_value(StepStatus::TimedOut { after_secs: 9 }).expect("serialize");
        assert_eq!(json["type"], "timed_out");
        assert_eq!(json["after_secs"], 9);
    }
}
