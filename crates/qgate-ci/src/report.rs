//! Text rendering for section headers, buffered output blocks and the
//! final summary.
//!
//! Everything here writes to a caller-supplied `Write` so the pipeline can
//! target stdout in production and a `Vec<u8>` in tests.

use crate::gate::RunSummary;
use crate::outcome::{CapturedOutput, ResultSet};
use std::io::{self, Write};

/// Section divider line.
pub const DIVIDER: &str = "==================================================";

/// Divider, `Running <name>`, divider.
pub fn write_step_header<W: Write + ?Sized>(out: &mut W, name: &str) -> io::Result<()> {
    writeln!(out, "{DIVIDER}")?;
    writeln!(out, "Running {name}")?;
    writeln!(out, "{DIVIDER}")?;
    out.flush()
}

/// Labeled block for a step's captured output. Empty streams are skipped.
pub fn write_captured<W: Write + ?Sized>(
    out: &mut W,
    name: &str,
    captured: &CapturedOutput,
) -> io::Result<()> {
    for (label, text) in [("stdout", &captured.stdout), ("stderr", &captured.stderr)] {
        if text.is_empty() {
            continue;
        }
        writeln!(out, "--- {name} ({label}) ---")?;
        out.write_all(text.as_bytes())?;
        if !text.ends_with('\n') {
            writeln!(out)?;
        }
    }
    out.flush()
}

/// Per-step PASS/FAIL/TIMEOUT lines in step-list order, then the failed
/// callout when anything failed.
pub fn write_summary<W: Write + ?Sized>(
    out: &mut W,
    results: &ResultSet,
    summary: &RunSummary,
) -> io::Result<()> {
    writeln!(out, "{DIVIDER}")?;
    writeln!(out, "SUMMARY")?;
    writeln!(out, "{DIVIDER}")?;

    for outcome in results.iter() {
        writeln!(out, "{}: {}", outcome.name, outcome.status.label())?;
    }

    if summary.any_failure {
        writeln!(out)?;
        writeln!(out, "Failed steps:")?;
        for name in &summary.failed {
            writeln!(out, "  - {name}")?;
        }
    }

    out.flush()
}
