//! Subcommand implementations.

pub mod delete;
pub mod deploy;
pub mod resolve;
pub mod status;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::debug;

use jumpship_aws::{load_sdk_config, object_store_credentials, AwsSession, SageMakerProvisioner};
use jumpship_catalog::{BucketAccess, CatalogResolver, ModelRepacker};
use jumpship_core::{DeploymentWorkflow, JumpshipConfig};

/// Command-line overrides of the `[model]` and `[endpoint]` settings.
#[derive(Debug, Default, Args)]
pub struct ModelOverrides {
    /// Catalog model identifier
    #[arg(long)]
    pub model_id: Option<String>,

    /// Model version (`*` for the latest)
    #[arg(long)]
    pub model_version: Option<String>,

    /// Instance type, e.g. ml.g4dn.2xlarge
    #[arg(long)]
    pub instance_type: Option<String>,

    /// Number of instances
    #[arg(long)]
    pub instance_count: Option<u32>,
}

impl ModelOverrides {
    /// Apply the overrides on top of loaded configuration.
    pub fn apply(&self, config: &mut JumpshipConfig) {
        if let Some(id) = &self.model_id {
            config.model.id.clone_from(id);
        }
        if let Some(version) = &self.model_version {
            config.model.version.clone_from(version);
        }
        if let Some(instance_type) = &self.instance_type {
            config.endpoint.instance_type.clone_from(instance_type);
        }
        if let Some(count) = self.instance_count {
            config.endpoint.instance_count = count;
        }
    }
}

/// Load configuration and apply command-line overrides.
pub fn load_config(path: Option<&Path>, overrides: &ModelOverrides) -> Result<JumpshipConfig> {
    let mut config = JumpshipConfig::load(path).context("failed to load configuration")?;
    overrides.apply(&mut config);
    Ok(config)
}

/// Wire the AWS and catalog collaborators into a workflow.
pub async fn workflow(config: &JumpshipConfig) -> Result<DeploymentWorkflow> {
    let settings = config.settings().context("invalid configuration")?;
    let sdk_config = load_sdk_config(config.session.region.clone()).await;
    debug!(region = ?sdk_config.region(), "loaded AWS configuration");

    let credentials = object_store_credentials(&sdk_config);
    let mut resolver = CatalogResolver::new(config.catalog.clone());
    if let Some(credentials) = credentials.clone() {
        resolver = resolver.with_credentials(credentials);
    }

    let mut workflow = DeploymentWorkflow::new(
        Arc::new(AwsSession::new(&sdk_config, config.session.role_arn.clone())),
        Arc::new(resolver),
        Arc::new(SageMakerProvisioner::new(&sdk_config)),
        settings,
    );

    if config.packaging.enabled {
        let region = sdk_config
            .region()
            .map(ToString::to_string)
            .context("no AWS region configured")?;
        let mut repacker = ModelRepacker::new(BucketAccess::s3(region, credentials));
        if let Some(bucket) = &config.packaging.bucket {
            repacker = repacker.with_bucket(bucket.clone());
        }
        workflow = workflow.with_packager(Arc::new(repacker));
    }

    Ok(workflow)
}
