//! Integration tests for the gate pipeline against real processes.

use qgate_ci::{
    GateConfig, GatePipeline, OutputMode, QualityGate, RunnerState, Step, StepPlan, StepStatus,
};

fn sh(name: &str, script: &str) -> Step {
    Step::custom(
        name,
        vec!["sh".to_string(), "-c".to_string(), script.to_string()],
    )
}

fn exits(codes: &[(&str, i32)]) -> StepPlan {
    StepPlan::new(
        codes
            .iter()
            .map(|(name, code)| sh(name, &format!("exit {code}")))
            .collect(),
    )
    .expect("valid plan")
}

async fn run(plan: &StepPlan, mode: OutputMode) -> (qgate_ci::PipelineResult, String) {
    let mut pipeline = GatePipeline::new(mode);
    let mut out = Vec::new();
    let result = pipeline.run(plan, &mut out).await.expect("pipeline run");
    assert_eq!(pipeline.state(), RunnerState::Finished);
    (result, String::from_utf8(out).expect("utf8"))
}

/// Test: one failing step in the middle of the standard four
#[tokio::test]
async fn test_single_failure_scenario() {
    let plan = exits(&[
        ("Unit Tests", 0),
        ("Formatting", 1),
        ("Security", 0),
        ("Dependency Audit", 0),
    ]);

    let (result, text) = run(&plan, OutputMode::Inherit).await;

    assert_eq!(
        result.results.codes(),
        vec![
            ("Unit Tests", 0),
            ("Formatting", 1),
            ("Security", 0),
            ("Dependency Audit", 0)
        ]
    );
    assert_eq!(result.summary.failed, vec!["Formatting"]);
    assert_eq!(result.exit_code(), 1);
    assert_eq!(text.matches(": FAIL").count(), 1);
    assert!(text.contains("Failed steps:\n  - Formatting\n"));
}

/// Test: every step passes
#[tokio::test]
async fn test_all_pass_scenario() {
    let plan = exits(&[
        ("Unit Tests", 0),
        ("Formatting", 0),
        ("Security", 0),
        ("Dependency Audit", 0),
    ]);

    let (result, text) = run(&plan, OutputMode::Inherit).await;

    assert!(result.success());
    assert_eq!(result.exit_code(), 0);
    assert_eq!(result.passed_count(), 4);
    assert_eq!(text.matches(": PASS").count(), 4);
    assert!(!text.contains("FAIL"));
    assert!(result.verdict().passed);
}

/// Test: a missing executable fails its step and the run continues
#[tokio::test]
async fn test_unlaunchable_step_continues() {
    let plan = StepPlan::new(vec![
        Step::custom(
            "Missing Tool",
            vec!["/nonexistent-binary-that-does-not-exist".to_string()],
        ),
        sh("After", "exit 0"),
    ])
    .expect("valid plan");

    let (result, _) = run(&plan, OutputMode::Inherit).await;

    assert_eq!(result.results.len(), 2);
    let missing = result.results.by_name("Missing Tool").expect("outcome");
    assert!(matches!(missing.status, StepStatus::LaunchFailed { code: 127, .. }));
    assert!(result.results.by_name("After").expect("outcome").passed());
    assert_eq!(result.exit_code(), 1);

    let verdict = QualityGate::evaluate(&result.results);
    assert_eq!(verdict.violations.len(), 1);
    assert!(verdict.violations[0].contains("Missing Tool"));
}

/// Test: every step fails, and all of them still run
#[tokio::test]
async fn test_isolation_when_everything_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let marker = dir.path().join("ran");
    let plan = StepPlan::new(vec![
        sh("first", "exit 3"),
        sh("second", "exit 4"),
        sh("third", &format!("touch '{}'; exit 5", marker.display())),
    ])
    .expect("valid plan");

    let (result, _) = run(&plan, OutputMode::Inherit).await;

    assert!(marker.exists(), "last step must run after earlier failures");
    assert_eq!(
        result.results.codes(),
        vec![("first", 3), ("second", 4), ("third", 5)]
    );
    assert_eq!(result.summary.failed, vec!["first", "second", "third"]);
}

/// Test: identical plans give identical result sets and status
#[tokio::test]
async fn test_repeat_runs_are_identical() {
    let plan = exits(&[("a", 0), ("b", 2), ("c", 0)]);

    let (first, _) = run(&plan, OutputMode::Inherit).await;
    let (second, _) = run(&plan, OutputMode::Inherit).await;

    assert_eq!(first.results.codes(), second.results.codes());
    assert_eq!(first.exit_code(), second.exit_code());
    assert_eq!(first.identity.steps_digest, second.identity.steps_digest);
    assert_ne!(first.identity.run_id, second.identity.run_id);
}

/// Test: a step over its deadline is recorded as a timeout and the run goes on
#[tokio::test]
async fn test_timeout_recorded_and_run_continues() {
    let plan = StepPlan::new(vec![
        sh("slow", "sleep 5").with_timeout(1),
        sh("fast", "exit 0"),
    ])
    .expect("valid plan");

    let (result, text) = run(&plan, OutputMode::Inherit).await;

    assert!(result.results.get(0).expect("slow").status.timed_out());
    assert!(result.results.get(1).expect("fast").passed());
    assert_eq!(result.summary.timed_out, vec!["slow"]);
    assert_eq!(result.exit_code(), 1);
    assert!(text.contains("slow: TIMEOUT"));
}

/// Test: a buffered step killed at its deadline still shows what it printed
#[tokio::test]
async fn test_buffered_timeout_reports_partial_output() {
    let plan = StepPlan::new(vec![
        sh("hang", "echo collected 3 items; sleep 5").with_timeout(1),
        sh("after", "echo still-ran"),
    ])
    .expect("valid plan");

    let (result, text) = run(&plan, OutputMode::Buffered).await;

    assert_eq!(result.summary.timed_out, vec!["hang"]);
    assert!(result.results.get(1).expect("after").passed());
    assert!(text.contains("--- hang (stdout) ---\ncollected 3 items\n"));
    assert!(text.contains("--- hang (stderr) ---\n[Process killed after 1s timeout]\n"));
    assert!(text.contains("--- after (stdout) ---\nstill-ran\n"));
}

/// Test: buffered mode flushes each step's output as a labeled block in order
#[tokio::test]
async fn test_buffered_output_blocks_in_order() {
    let plan = StepPlan::new(vec![
        sh("one", "echo first-output"),
        sh("two", "echo second-error >&2; exit 1"),
    ])
    .expect("valid plan");

    let (result, text) = run(&plan, OutputMode::Buffered).await;

    let one = text.find("--- one (stdout) ---\nfirst-output\n").expect("one block");
    let two = text.find("--- two (stderr) ---\nsecond-error\n").expect("two block");
    let summary = text.find("SUMMARY").expect("summary");
    assert!(one < two && two < summary);

    let captured = result.results.get(1).and_then(|o| o.output.as_ref()).expect("captured");
    assert!(captured.stderr.contains("second-error"));
}

/// Test: a config file drives the whole run
#[tokio::test]
async fn test_plan_from_config() {
    let raw = r#"
[[step]]
name = "Greeting"
command = ["sh", "-c", "test \"$GREETING\" = hello"]
env = { GREETING = "hello" }

[[step]]
name = "Skipped"
command = ["false"]
enabled = false
"#;
    let plan = GateConfig::from_toml_str(raw)
        .and_then(GateConfig::into_plan)
        .expect("plan");

    let (result, _) = run(&plan, OutputMode::Inherit).await;

    assert_eq!(result.results.len(), 1);
    assert!(result.success());
}
