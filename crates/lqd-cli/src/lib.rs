//! # lqd-cli: CLI Tool for the Liquidator Escrow Stack
//!
//! Provides the `lqd` command-line interface.
//!
//! ## Subcommands
//!
//! - `lqd check-config`: load a deployment config, apply environment
//!   overrides, validate it and print the effective settings.
//! - `lqd simulate`: run a YAML scenario of mints, approvals and escrow
//!   calls against an in-memory ledger and print a JSON report.
//!
//! ```bash
//! lqd check-config deploy.yaml
//! LQD_FEE_BPS=50 lqd -v simulate --config deploy.yaml batch.yaml
//! ```

pub mod check;
pub mod scenario;
pub mod simulate;

use std::path::Path;

use anyhow::{Context, Result};
use lqd_escrow::EscrowConfig;

/// Load a config file and apply `LQD_*` environment overrides.
pub fn load_config(path: &Path) -> Result<EscrowConfig> {
    EscrowConfig::from_path(path)
        .and_then(EscrowConfig::with_env_overrides)
        .with_context(|| format!("failed to load config {}", path.display()))
}

/// Write `value` as pretty JSON to `output`, or stdout when `None`.
pub fn emit_json(value: &serde_json::Value, output: Option<&Path>) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render report")?;
    match output {
        Some(path) => std::fs::write(path, rendered + "\n")
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            println!("{rendered}");
            Ok(())
        }
    }
}
