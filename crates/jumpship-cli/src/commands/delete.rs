//! Implementation of the `jumpship delete` command.

use std::path::Path;

use anyhow::{Context, Result};
use jumpship_core::EndpointName;

use super::{load_config, workflow, ModelOverrides};

pub async fn run(config_path: Option<&Path>, name: &str) -> Result<()> {
    let name = EndpointName::parse(name)?;
    let config = load_config(config_path, &ModelOverrides::default())?;

    let report = workflow(&config)
        .await?
        .teardown(&name)
        .await
        .with_context(|| format!("failed to delete endpoint {name}"))?;

    let mark = |deleted: bool| if deleted { "deleted" } else { "not found" };
    println!("Endpoint:        {}", mark(report.endpoint));
    println!("Endpoint config: {}", mark(report.endpoint_config));
    println!("Model:           {}", mark(report.model));
    Ok(())
}
