//! Step execution as external processes.

use crate::outcome::{
    CapturedOutput, Outcome, StepStatus, LAUNCH_DENIED_CODE, LAUNCH_ERROR_CODE,
    LAUNCH_NOT_FOUND_CODE,
};
use crate::step::Step;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[cfg(unix)]
use nix::sys::signal::{killpg, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// How long to keep reading a pipe after the step has exited or been killed.
/// Bounds the wait when a detached grandchild still holds the pipe open.
const OUTPUT_COLLECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a step's stdout/stderr go while it runs.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Stream straight through to the orchestrator's own stdout/stderr.
    #[default]
    Inherit,

    /// Capture both streams and hand them back in the outcome.
    Buffered,
}

/// Runs a single step to completion.
///
/// Implementations never fail: every way a step can go wrong is folded into
/// the returned [`StepStatus`].
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute(&self, index: usize, step: &Step, mode: OutputMode) -> Outcome;
}

/// Executes steps as child processes via `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor;

#[async_trait]
impl StepExecutor for ProcessExecutor {
    async fn execute(&self, index: usize, step: &Step, mode: OutputMode) -> Outcome {
        let start = Instant::now();

        let (status, output) = match spawn(step, mode) {
            Ok(mut child) => match mode {
                OutputMode::Inherit => (wait_with_deadline(&mut child, step).await, None),
                OutputMode::Buffered => {
                    let (status, output) = wait_buffered(child, step).await;
                    (status, Some(output))
                }
            },
            Err(e) => {
                warn!(step = %step.name, error = %e, "Failed to launch step");
                (launch_failure(step, &e), None)
            }
        };

        Outcome {
            index,
            name: step.name.clone(),
            status,
            duration_ms: start.elapsed().as_millis() as u64,
            output,
        }
    }
}

fn spawn(step: &Step, mode: OutputMode) -> io::Result<Child> {
    let Some((exe, args)) = step.command.split_first() else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "empty command",
        ));
    };

    let mut cmd = Command::new(exe);
    cmd.args(args).envs(&step.env).kill_on_drop(true);

    if let Some(dir) = &step.working_dir {
        cmd.current_dir(dir);
    }

    // A step that can time out gets its own process group so the kill reaches
    // its children too. Unbounded steps stay in ours and keep receiving the
    // terminal's Ctrl-C.
    #[cfg(unix)]
    {
        if step.deadline().is_some() {
            cmd.process_group(0);
        }
    }

    match mode {
        OutputMode::Inherit => cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit()),
        OutputMode::Buffered => cmd.stdout(Stdio::piped()).stderr(Stdio::piped()),
    };

    debug!(step = %step.name, command = %step.command_line(), "Spawning step");
    cmd.spawn()
}

fn launch_failure(step: &Step, err: &io::Error) -> StepStatus {
    let code = match err.kind() {
        io::ErrorKind::NotFound => LAUNCH_NOT_FOUND_CODE,
        io::ErrorKind::PermissionDenied => LAUNCH_DENIED_CODE,
        _ => LAUNCH_ERROR_CODE,
    };
    StepStatus::LaunchFailed {
        code,
        reason: format!("failed to launch '{}': {}", step.command_line(), err),
    }
}

fn exited(status: ExitStatus) -> StepStatus {
    StepStatus::Exited {
        code: status.code().unwrap_or(-1),
    }
}

fn wait_error(step: &Step, err: io::Error) -> StepStatus {
    warn!(step = %step.name, error = %err, "Failed to wait for step");
    StepStatus::Exited { code: -1 }
}

/// Wait for the step, killing it (and everything it forked) at its deadline.
async fn wait_with_deadline(child: &mut Child, step: &Step) -> StepStatus {
    let Some(deadline) = step.deadline() else {
        return match child.wait().await {
            Ok(status) => exited(status),
            Err(e) => wait_error(step, e),
        };
    };

    match tokio::time::timeout(deadline, child.wait()).await {
        Ok(Ok(status)) => exited(status),
        Ok(Err(e)) => wait_error(step, e),
        Err(_) => {
            kill_step(child, step).await;
            timed_out(step, deadline)
        }
    }
}

async fn kill_step(child: &mut Child, step: &Step) {
    // Steps with a deadline lead their own process group (see `spawn`).
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                debug!(step = %step.name, error = %e, "Failed to signal step process group");
            }
        }
    }

    if let Err(e) = child.kill().await {
        warn!(step = %step.name, error = %e, "Failed to kill timed out step");
    }
}

async fn wait_buffered(mut child: Child, step: &Step) -> (StepStatus, CapturedOutput) {
    // Drain both pipes while waiting so a full pipe cannot stall the child,
    // and so whatever it wrote before a timeout is still there afterwards.
    let stdout = StreamCapture::start(child.stdout.take());
    let stderr = StreamCapture::start(child.stderr.take());

    let status = wait_with_deadline(&mut child, step).await;

    let mut captured = CapturedOutput {
        stdout: stdout.finish().await,
        stderr: stderr.finish().await,
    };

    if let StepStatus::TimedOut { after_secs } = status {
        if !captured.stderr.is_empty() && !captured.stderr.ends_with('\n') {
            captured.stderr.push('\n');
        }
        captured
            .stderr
            .push_str(&format!("[Process killed after {after_secs}s timeout]\n"));
    }

    (status, captured)
}

/// Background reader that accumulates one child pipe.
struct StreamCapture {
    buf: Arc<Mutex<Vec<u8>>>,
    task: Option<JoinHandle<()>>,
}

impl StreamCapture {
    fn start<R>(reader: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let task = reader.map(|mut reader| {
            let sink = Arc::clone(&buf);
            tokio::spawn(async move {
                let mut chunk = [0u8; 8192];
                loop {
                    let n = match reader.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => n,
                    };
                    sink.lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend_from_slice(&chunk[..n]);
                }
            })
        });
        Self { buf, task }
    }

    /// Wait for EOF (bounded) and return what was read, lossily decoded.
    async fn finish(mut self) -> String {
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(OUTPUT_COLLECTION_TIMEOUT, &mut task)
                .await
                .is_err()
            {
                task.abort();
            }
        }
        let bytes = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).to_string()
    }
}

fn timed_out(step: &Step, deadline: Duration) -> StepStatus {
    warn!(
        step = %step.name,
        timeout_secs = deadline.as_secs(),
        "Step exceeded its deadline and was killed"
    );
    StepStatus::TimedOut {
        after_secs: deadline.as_secs(),
    }
}
