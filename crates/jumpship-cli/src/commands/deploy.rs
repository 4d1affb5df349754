//! Implementation of the `jumpship deploy` command.

use std::path::Path;

use anyhow::{Context, Result};

use super::{load_config, workflow, ModelOverrides};

pub async fn run(
    config_path: Option<&Path>,
    overrides: &ModelOverrides,
    no_wait: bool,
) -> Result<()> {
    let mut config = load_config(config_path, overrides)?;
    if no_wait {
        config.wait.enabled = false;
    }

    let handle = workflow(&config)
        .await?
        .deploy()
        .await
        .context("deployment failed")?;

    println!("Endpoint: {}", handle.name);
    println!("ARN:      {}", handle.arn);
    println!("Region:   {}", handle.region);
    println!("Status:   {}", handle.status);
    Ok(())
}
