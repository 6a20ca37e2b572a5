//! # Check-Config Subcommand
//!
//! Loads a deployment config, applies environment overrides and validates
//! it. Prints the effective configuration as JSON on success.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

/// Arguments for the `lqd check-config` subcommand.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Path to the deployment config (YAML, or JSON with a `.json` extension).
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Write the effective config here instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Execute the check-config subcommand.
///
/// Returns exit code: 0 if the config is valid, 1 if it fails validation.
/// Unreadable or unparseable files are operational errors.
pub fn run_check(args: &CheckArgs) -> Result<u8> {
    let config = crate::load_config(&args.config)?;
    match config.validate() {
        Ok(()) => {
            tracing::info!(path = %args.config.display(), "config valid");
            crate::emit_json(&serde_json::to_value(&config)?, args.output.as_deref())?;
            Ok(0)
        }
        Err(e) => {
            println!("FAIL: {}: {e}", args.config.display());
            Ok(1)
        }
    }
}
