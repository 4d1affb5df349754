//! Configuration for jumpship.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{DeployError, DeployResult};
use crate::settings::{
    DeploymentSettings, WaitSettings, DEFAULT_ENDPOINT_PREFIX, DEFAULT_ENTRY_POINT,
    DEFAULT_INSTANCE_TYPE, DEFAULT_MODEL_ID,
};
use crate::types::{ArtifactScope, InstanceType, ModelId, ModelVersion};

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "jumpship.toml";

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "JUMPSHIP_";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct JumpshipConfig {
    /// Which catalog model to deploy.
    #[serde(default)]
    pub model: ModelConfig,

    /// Endpoint sizing and naming.
    #[serde(default)]
    pub endpoint: EndpointConfig,

    /// Extra environment overrides for the serving process.
    #[serde(default)]
    pub environment: BTreeMap<String, String>,

    /// Overrides for values normally taken from the ambient session.
    #[serde(default)]
    pub session: SessionConfig,

    /// Model catalog location.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Bundling of the inference scripts into the model archive.
    #[serde(default)]
    pub packaging: PackagingConfig,

    /// Readiness wait behaviour.
    #[serde(default)]
    pub wait: WaitConfig,
}

impl JumpshipConfig {
    /// Load configuration from the default sources.
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Default values
    /// 2. `jumpship.toml` in the current directory (if present)
    /// 3. The file at `path` (if provided)
    /// 4. Environment variables with `JUMPSHIP_` prefix, nested keys split on `__`
    pub fn load(path: Option<&Path>) -> DeployResult<Self> {
        let mut figment = Figment::new().merge(Toml::file(DEFAULT_CONFIG_FILE));

        if let Some(path) = path {
            if !path.exists() {
                return Err(DeployError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            figment = figment.merge(Toml::file(path));
        }

        Self::from_figment(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Extract configuration from an already assembled figment.
    pub fn from_figment(figment: Figment) -> DeployResult<Self> {
        figment.extract().map_err(DeployError::from)
    }

    /// Validate the configuration into deployment settings.
    pub fn settings(&self) -> DeployResult<DeploymentSettings> {
        if self.endpoint.instance_count == 0 {
            return Err(DeployError::invalid(
                "instance count",
                "at least one instance is required",
            ));
        }
        if self.model.entry_point.trim().is_empty() {
            return Err(DeployError::invalid("entry point", "must not be empty"));
        }
        if self.wait.poll_interval_secs == 0 {
            return Err(DeployError::invalid(
                "wait.poll_interval_secs",
                "must be greater than zero",
            ));
        }

        Ok(DeploymentSettings {
            model_id: ModelId::new(&self.model.id)?,
            model_version: ModelVersion::new(&self.model.version)?,
            scope: ArtifactScope::Inference,
            instance_type: InstanceType::new(&self.endpoint.instance_type)?,
            instance_count: self.endpoint.instance_count,
            endpoint_prefix: self.endpoint.prefix.clone(),
            entry_point: self.model.entry_point.trim().to_owned(),
            extra_environment: self.environment.clone(),
            wait: WaitSettings {
                enabled: self.wait.enabled,
                poll_interval: Duration::from_secs(self.wait.poll_interval_secs),
                timeout: Duration::from_secs(self.wait.timeout_secs),
            },
        })
    }
}

/// Catalog model selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    /// Catalog model identifier.
    #[serde(default = "default_model_id")]
    pub id: String,

    /// Version selector (`*`, `1.*`, or an exact version).
    #[serde(default = "default_model_version")]
    pub version: String,

    /// Entry-point script inside the inference script bundle.
    #[serde(default = "default_entry_point")]
    pub entry_point: String,
}

fn default_model_id() -> String {
    DEFAULT_MODEL_ID.to_owned()
}

fn default_model_version() -> String {
    ModelVersion::LATEST.to_owned()
}

fn default_entry_point() -> String {
    DEFAULT_ENTRY_POINT.to_owned()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            id: default_model_id(),
            version: default_model_version(),
            entry_point: default_entry_point(),
        }
    }
}

/// Endpoint sizing and naming.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Prefix of generated endpoint names.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Compute SKU, e.g. `ml.g4dn.2xlarge`.
    #[serde(default = "default_instance_type")]
    pub instance_type: String,

    /// Number of instances.
    #[serde(default = "default_instance_count")]
    pub instance_count: u32,
}

fn default_prefix() -> String {
    DEFAULT_ENDPOINT_PREFIX.to_owned()
}

fn default_instance_type() -> String {
    DEFAULT_INSTANCE_TYPE.to_owned()
}

const fn default_instance_count() -> u32 {
    1
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            instance_type: default_instance_type(),
            instance_count: default_instance_count(),
        }
    }
}

/// Overrides for the ambient session.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Region to use instead of the one from the credential chain.
    pub region: Option<String>,

    /// Execution role to use instead of the caller identity.
    pub role_arn: Option<String>,
}

/// Model catalog location.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    /// Where the manifest and specs are read from (`s3://bucket` or
    /// `file:///path`). Defaults to the regional content bucket.
    pub url: Option<String>,

    /// Bucket used in artifact URIs when `url` is not an S3 bucket.
    pub artifact_bucket: Option<String>,

    /// Key of the manifest inside the catalog.
    #[serde(default = "default_manifest_key")]
    pub manifest_key: String,
}

fn default_manifest_key() -> String {
    "models_manifest.json".to_owned()
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            url: None,
            artifact_bucket: None,
            manifest_key: default_manifest_key(),
        }
    }
}

/// Bundling of the inference scripts into the model archive.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PackagingConfig {
    /// Repack the weights with the scripts under `code/` before deploying.
    /// When off, the container downloads the script bundle itself.
    #[serde(default = "default_packaging_enabled")]
    pub enabled: bool,

    /// Bucket the packaged archive is uploaded to.
    /// Defaults to `sagemaker-{region}-{account}`.
    pub bucket: Option<String>,
}

const fn default_packaging_enabled() -> bool {
    true
}

impl Default for PackagingConfig {
    fn default() -> Self {
        Self {
            enabled: default_packaging_enabled(),
            bucket: None,
        }
    }
}

/// Readiness wait behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WaitConfig {
    /// Block until the endpoint is in service.
    #[serde(default = "default_wait_enabled")]
    pub enabled: bool,

    /// Seconds between status checks.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Seconds before giving up.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_wait_enabled() -> bool {
    true
}

const fn default_poll_interval_secs() -> u64 {
    30
}

const fn default_timeout_secs() -> u64 {
    3600 // 1 hour
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            enabled: default_wait_enabled(),
            poll_interval_secs: default_poll_interval_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}
