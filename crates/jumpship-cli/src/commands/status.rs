//! Implementation of the `jumpship status` command.

use std::path::Path;

use anyhow::{Context, Result};
use jumpship_core::EndpointName;

use super::{load_config, workflow, ModelOverrides};

pub async fn run(config_path: Option<&Path>, name: &str) -> Result<()> {
    let name = EndpointName::parse(name)?;
    let config = load_config(config_path, &ModelOverrides::default())?;

    let description = workflow(&config)
        .await?
        .status(&name)
        .await
        .with_context(|| format!("failed to describe endpoint {name}"))?;

    println!("{}", serde_json::to_string_pretty(&description)?);
    Ok(())
}
