// Resolved configuration command

use crate::output::OutputFormat;
use anyhow::{Context, Result};
use autoscale_executor::ExecutorConfig;

/// Print the configuration `autoscale run` would start from, always as JSON
pub fn run() -> Result<()> {
    let config = ExecutorConfig::from_env();
    config
        .validate()
        .context("invalid executor configuration in environment")?;

    OutputFormat::Json.print_value(&config)
}
