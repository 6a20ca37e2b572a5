//! # Simulate Subcommand
//!
//! Runs a scenario file against an in-memory ledger configured from a
//! deployment config and prints the resulting [`Report`] as JSON.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::scenario::{Report, Scenario};

/// Arguments for the `lqd simulate` subcommand.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Deployment config (YAML, or JSON with a `.json` extension).
    #[arg(long)]
    pub config: PathBuf,

    /// Scenario file (YAML).
    #[arg(value_name = "SCENARIO")]
    pub scenario: PathBuf,

    /// Write the report here instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Execute the simulate subcommand.
///
/// Returns exit code: 0 if every step met its expectation and custody
/// balances, 1 otherwise.
pub fn run_simulate(args: &SimulateArgs) -> Result<u8> {
    let config = crate::load_config(&args.config)?;
    let scenario = Scenario::from_path(&args.scenario)?;
    tracing::info!(
        scenario = %args.scenario.display(),
        steps = scenario.steps.len(),
        "running scenario"
    );

    let report: Report = scenario.run(&config)?;
    let passed = report.passed();
    let value = serde_json::to_value(&report).context("failed to serialize report")?;
    crate::emit_json(&value, args.output.as_deref())?;

    if passed {
        Ok(0)
    } else {
        tracing::warn!("scenario did not pass");
        Ok(1)
    }
}
