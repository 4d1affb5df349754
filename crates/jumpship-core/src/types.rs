//! Core types for jumpship.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DeployError, DeployResult};

/// Identifier of a model in the platform's model catalog.
///
/// Surrounding whitespace is stripped on construction; catalog identifiers
/// never contain it and a stray space would otherwise leak into the
/// endpoint name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelId(pub(crate) String);

impl ModelId {
    /// Create a model ID, trimming surrounding whitespace.
    pub fn new(id: impl AsRef<str>) -> DeployResult<Self> {
        let id = id.as_ref().trim();
        if id.is_empty() {
            return Err(DeployError::invalid("model id", "must not be empty"));
        }
        if id.chars().any(char::is_whitespace) {
            return Err(DeployError::invalid(
                "model id",
                format!("'{id}' contains whitespace"),
            ));
        }
        Ok(Self(id.to_owned()))
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ModelId {
    type Error = DeployError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ModelId> for String {
    fn from(id: ModelId) -> Self {
        id.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ModelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Version selector for a catalog model.
///
/// `*` selects the newest version; `1.*` and `1.2.*` select the newest
/// version under that prefix; anything else is matched exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelVersion(String);

impl ModelVersion {
    /// Selector matching the newest available version.
    pub const LATEST: &'static str = "*";

    /// Create a version selector.
    pub fn new(version: impl AsRef<str>) -> DeployResult<Self> {
        let version = version.as_ref().trim();
        if version.is_empty() {
            return Err(DeployError::invalid("model version", "must not be empty"));
        }
        Ok(Self(version.to_owned()))
    }

    /// Selector matching the newest available version.
    #[must_use]
    pub fn latest() -> Self {
        Self(Self::LATEST.to_owned())
    }

    /// Get the selector as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ModelVersion {
    fn default() -> Self {
        Self::latest()
    }
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A managed-platform compute SKU such as `ml.g4dn.2xlarge`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstanceType(pub(crate) String);

impl InstanceType {
    /// Parse an instance type of the form `ml.<family>.<size>`.
    pub fn new(value: impl AsRef<str>) -> DeployResult<Self> {
        let value = value.as_ref().trim();
        let mut parts = value.split('.');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some("ml"), Some(family), Some(size), None)
                if !family.is_empty() && !size.is_empty() =>
            {
                Ok(Self(value.to_owned()))
            }
            _ => Err(DeployError::invalid(
                "instance type",
                format!("'{value}' is not of the form ml.<family>.<size>"),
            )),
        }
    }

    /// Get the instance type as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Instance family, e.g. `g4dn` for `ml.g4dn.2xlarge`.
    #[must_use]
    pub fn family(&self) -> &str {
        self.0.split('.').nth(1).unwrap_or_default()
    }

    /// Coarse accelerator class: `gpu` for GPU families, `cpu` otherwise.
    #[must_use]
    pub fn accelerator_class(&self) -> &'static str {
        match self.family().chars().next() {
            Some('g' | 'p') => "gpu",
            _ => "cpu",
        }
    }
}

impl TryFrom<String> for InstanceType {
    type Error = DeployError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<InstanceType> for String {
    fn from(value: InstanceType) -> Self {
        value.0
    }
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of a managed endpoint.
///
/// Always matches `^[a-zA-Z0-9](-*[a-zA-Z0-9]){0,62}$`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EndpointName(String);

impl EndpointName {
    /// Maximum length the platform accepts.
    pub const MAX_LEN: usize = 63;

    /// Validate an existing endpoint name.
    pub fn parse(name: impl AsRef<str>) -> DeployResult<Self> {
        let name = name.as_ref();
        if name.is_empty() || name.len() > Self::MAX_LEN {
            return Err(DeployError::invalid(
                "endpoint name",
                format!("length must be between 1 and {}", Self::MAX_LEN),
            ));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(DeployError::invalid(
                "endpoint name",
                format!("'{name}' may only contain ASCII letters, digits and hyphens"),
            ));
        }
        if name.starts_with('-') || name.ends_with('-') {
            return Err(DeployError::invalid(
                "endpoint name",
                format!("'{name}' must start and end with a letter or digit"),
            ));
        }
        Ok(Self(name.to_owned()))
    }

    /// Wrap a name already built from allowed characters.
    pub(crate) fn from_sanitized(name: String) -> Self {
        debug_assert!(Self::parse(&name).is_ok(), "invalid endpoint name {name}");
        Self(name)
    }

    /// Get the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EndpointName {
    type Error = DeployError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<EndpointName> for String {
    fn from(name: EndpointName) -> Self {
        name.0
    }
}

impl fmt::Display for EndpointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for EndpointName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Whether artifacts are looked up for hosting or for training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactScope {
    /// Artifacts for serving an endpoint.
    #[default]
    Inference,
    /// Artifacts for a training job.
    Training,
}

impl ArtifactScope {
    /// Get the scope name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inference => "inference",
            Self::Training => "training",
        }
    }
}

impl fmt::Display for ArtifactScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three artifacts a deployable model is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Serving container image.
    Image,
    /// Inference script bundle.
    Script,
    /// Model weights archive.
    Model,
}

impl ArtifactKind {
    /// Get the kind name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Script => "script",
            Self::Model => "model",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters shared by all three artifact lookups of one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactRequest {
    /// Catalog model identifier.
    pub model_id: ModelId,
    /// Version selector.
    pub version: ModelVersion,
    /// Hosting or training.
    pub scope: ArtifactScope,
    /// Region whose catalog and registries are used.
    pub region: String,
}

/// Resolved artifact locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSet {
    /// Container image URI.
    pub image_uri: String,
    /// Inference script bundle URI.
    pub script_uri: String,
    /// Model weights URI.
    pub model_uri: String,
}

/// Execution identity and region taken from the ambient session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Region API calls are made in.
    pub region: String,
    /// Role the endpoint runs as.
    pub role_arn: String,
}

impl SessionContext {
    /// Account that owns the execution role.
    #[must_use]
    pub fn account_id(&self) -> Option<&str> {
        arn_account(&self.role_arn)
    }
}

/// Account id field of an ARN, `arn:<partition>:<service>:<region>:<account>:...`.
#[must_use]
pub fn arn_account(arn: &str) -> Option<&str> {
    let mut parts = arn.split(':');
    if parts.next() != Some("arn") {
        return None;
    }
    parts.nth(3).filter(|account| !account.is_empty())
}

/// Lifecycle status of a managed endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum EndpointStatus {
    /// Being created.
    Creating,
    /// Being updated.
    Updating,
    /// Platform maintenance in progress.
    SystemUpdating,
    /// An update is being rolled back.
    RollingBack,
    /// Ready to serve requests.
    InService,
    /// Not serving requests.
    OutOfService,
    /// Being deleted.
    Deleting,
    /// Provisioning failed.
    Failed,
    /// A status this version does not know about.
    Other(String),
}

impl EndpointStatus {
    /// Get the platform's name for this status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Creating => "Creating",
            Self::Updating => "Updating",
            Self::SystemUpdating => "SystemUpdating",
            Self::RollingBack => "RollingBack",
            Self::InService => "InService",
            Self::OutOfService => "OutOfService",
            Self::Deleting => "Deleting",
            Self::Failed => "Failed",
            Self::Other(s) => s,
        }
    }

    /// True while the platform is still working towards a ready endpoint.
    #[must_use]
    pub fn is_transitional(&self) -> bool {
        matches!(self, Self::Creating | Self::Updating | Self::SystemUpdating)
    }
}

impl FromStr for EndpointStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Creating" => Self::Creating,
            "Updating" => Self::Updating,
            "SystemUpdating" => Self::SystemUpdating,
            "RollingBack" => Self::RollingBack,
            "InService" => Self::InService,
            "OutOfService" => Self::OutOfService,
            "Deleting" => Self::Deleting,
            "Failed" => Self::Failed,
            other => Self::Other(other.to_owned()),
        })
    }
}

impl From<String> for EndpointStatus {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(status) => status,
            Err(never) => match never {},
        }
    }
}

impl From<EndpointStatus> for String {
    fn from(status: EndpointStatus) -> Self {
        status.as_str().to_owned()
    }
}

impl fmt::Display for EndpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to a live (or provisioning) endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointHandle {
    /// Endpoint name.
    pub name: EndpointName,
    /// Endpoint ARN.
    pub arn: String,
    /// Region the endpoint lives in.
    pub region: String,
    /// Last observed status.
    pub status: EndpointStatus,
}

/// Point-in-time view of an endpoint, as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescription {
    /// Endpoint name.
    pub name: EndpointName,
    /// Endpoint ARN.
    pub arn: String,
    /// Current status.
    pub status: EndpointStatus,
    /// Failure reason, when the platform gives one.
    pub failure_reason: Option<String>,
}

/// What a teardown removed. `false` means the resource did not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TeardownReport {
    /// Endpoint was deleted.
    pub endpoint: bool,
    /// Endpoint configuration was deleted.
    pub endpoint_config: bool,
    /// Model was deleted.
    pub model: bool,
}
