//! qgate - quality gate runner
//!
//! Runs the configured verification steps in order, keeps going past
//! failures, prints a PASS/FAIL summary and exits 1 if any step failed.
//!
//! ## Commands
//!
//! - `run`: execute the gate
//! - `list`: print the resolved step plan
//! - `validate`: load and check a gate file without running anything

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use qgate_ci::{GateConfig, GatePipeline, OutputMode, RunIdentity, StepPlan, CONFIG_ENV};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, Level};

/// Exit status for configuration and usage errors (nothing was run).
const EXIT_USAGE: u8 = 2;

#[derive(Parser)]
#[command(name = "qgate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Fail-complete quality gate runner", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every step and report an aggregate verdict
    Run {
        /// Gate file (TOML); builtin steps are used when omitted
        #[arg(short, long, env = CONFIG_ENV)]
        config: Option<PathBuf>,

        /// Capture each step's output and print it after the step finishes
        #[arg(long)]
        buffered: bool,

        /// Default per-step deadline in seconds for steps without one
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Summary format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Print the step plan that `run` would execute
    List {
        /// Gate file (TOML); builtin steps are used when omitted
        #[arg(short, long, env = CONFIG_ENV)]
        config: Option<PathBuf>,
    },

    /// Check a gate file without running it
    Validate {
        /// Gate file (TOML)
        #[arg(env = CONFIG_ENV)]
        config: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Headers, step output and a PASS/FAIL summary
    Text,
    /// A single JSON report on stdout
    Json,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    qgate_ci::init_tracing(cli.json_logs, level);

    let outcome = match cli.command {
        Commands::Run {
            config,
            buffered,
            timeout,
            format,
        } => cmd_run(config.as_deref(), buffered, timeout, format).await,
        Commands::List { config } => cmd_list(config.as_deref()).map(|_| 0),
        Commands::Validate { config } => cmd_validate(&config).map(|_| 0),
    };

    match outcome {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            error!(error = %e, "qgate aborted before running any step");
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_USAGE)
        }
    }
}

fn load_plan(config: Option<&Path>, timeout: Option<u64>) -> Result<StepPlan> {
    let plan = GateConfig::resolve(config)
        .and_then(GateConfig::into_plan)
        .with_context(|| match config {
            Some(path) => format!("Failed to load gate file {}", path.display()),
            None => "Failed to build builtin gate".to_string(),
        })?;

    Ok(match timeout {
        Some(secs) => plan.with_default_timeout(secs),
        None => plan,
    })
}

/// Run the gate and return the aggregate exit status.
async fn cmd_run(
    config: Option<&Path>,
    buffered: bool,
    timeout: Option<u64>,
    format: Format,
) -> Result<i32> {
    let plan = load_plan(config, timeout)?;

    match format {
        Format::Text => {
            let mode = if buffered {
                OutputMode::Buffered
            } else {
                OutputMode::Inherit
            };
            let mut pipeline = GatePipeline::new(mode);
            let result = pipeline
                .run(&plan, &mut std::io::stdout())
                .await
                .context("Gate pipeline failed to run")?;
            Ok(result.exit_code())
        }
        Format::Json => {
            // Step output would corrupt the report, so capture it into the
            // report instead.
            let mut pipeline = GatePipeline::new(OutputMode::Buffered);
            let result = pipeline
                .run(&plan, &mut std::io::sink())
                .await
                .context("Gate pipeline failed to run")?;
            println!("{}", result.to_json()?);
            Ok(result.exit_code())
        }
    }
}

fn cmd_list(config: Option<&Path>) -> Result<()> {
    let plan = load_plan(config, None)?;

    for (index, step) in plan.steps().iter().enumerate() {
        let deadline = match step.deadline() {
            Some(d) => format!("{}s", d.as_secs()),
            None => "none".to_string(),
        };
        println!(
            "{:>2}. {}  [{}]  timeout: {}",
            index + 1,
            step.name,
            step.command_line(),
            deadline
        );
    }
    Ok(())
}

fn cmd_validate(config: &Path) -> Result<()> {
    let plan = load_plan(Some(config), None)?;
    let identity = RunIdentity::new(&plan);
    println!(
        "OK: {} step(s), digest {}",
        plan.len(),
        identity.short_digest()
    );
    Ok(())
}
