//! Validated deployment settings.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::types::{ArtifactScope, InstanceType, ModelId, ModelVersion};

/// Catalog model deployed when nothing else is configured.
pub const DEFAULT_MODEL_ID: &str = "model-txt2img-stabilityai-stable-diffusion-v1-4";

/// Instance type used when nothing else is configured.
pub const DEFAULT_INSTANCE_TYPE: &str = "ml.g4dn.2xlarge";

/// Prefix of generated endpoint names.
pub const DEFAULT_ENDPOINT_PREFIX: &str = "jumpstart-example-infer";

/// Entry-point script inside the inference script bundle.
pub const DEFAULT_ENTRY_POINT: &str = "inference.py";

/// How to wait for an endpoint to come up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitSettings {
    /// Block until the endpoint is in service.
    pub enabled: bool,
    /// Delay between status checks.
    pub poll_interval: Duration,
    /// Give up after this long.
    pub timeout: Duration,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval: Duration::from_secs(30),
            timeout: Duration::from_secs(3600),
        }
    }
}

/// Everything a deployment needs besides the ambient session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentSettings {
    /// Catalog model identifier.
    pub model_id: ModelId,
    /// Version selector.
    pub model_version: ModelVersion,
    /// Artifact scope; deployments always use inference artifacts.
    pub scope: ArtifactScope,
    /// Compute SKU.
    pub instance_type: InstanceType,
    /// Number of instances.
    pub instance_count: u32,
    /// Prefix of the generated endpoint name.
    pub endpoint_prefix: String,
    /// Entry-point script inside the script bundle.
    pub entry_point: String,
    /// Extra environment overrides for the serving process.
    pub extra_environment: BTreeMap<String, String>,
    /// Readiness wait behaviour.
    pub wait: WaitSettings,
}

impl Default for DeploymentSettings {
    fn default() -> Self {
        Self {
            model_id: ModelId(DEFAULT_MODEL_ID.to_owned()),
            model_version: ModelVersion::latest(),
            scope: ArtifactScope::Inference,
            instance_type: InstanceType(DEFAULT_INSTANCE_TYPE.to_owned()),
            instance_count: 1,
            endpoint_prefix: DEFAULT_ENDPOINT_PREFIX.to_owned(),
            entry_point: DEFAULT_ENTRY_POINT.to_owned(),
            extra_environment: BTreeMap::new(),
            wait: WaitSettings::default(),
        }
    }
}
