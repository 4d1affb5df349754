//! Implementation of the `jumpship resolve` command.

use std::path::Path;

use anyhow::{Context, Result};

use super::{load_config, workflow, ModelOverrides};

/// Resolve the session and artifacts, then print the descriptor as JSON.
pub async fn run(config_path: Option<&Path>, overrides: &ModelOverrides) -> Result<()> {
    let config = load_config(config_path, overrides)?;
    let descriptor = workflow(&config)
        .await?
        .plan()
        .await
        .context("failed to resolve deployment")?;

    println!("{}", serde_json::to_string_pretty(&descriptor)?);
    Ok(())
}
