//! Error types for catalog lookups.

use jumpship_core::{ArtifactKind, ArtifactRequest, DeployError};

/// Result type alias using [`CatalogError`].
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors that can occur while reading the model catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The catalog URL is not usable.
    #[error("invalid catalog url '{url}': {reason}")]
    InvalidUrl {
        /// The configured URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Object store client could not be created.
    #[error("failed to open catalog at {location}")]
    Open {
        /// Catalog location.
        location: String,
        /// Underlying error.
        #[source]
        source: object_store::Error,
    },

    /// A catalog document could not be fetched.
    #[error("failed to fetch catalog document '{key}'")]
    Fetch {
        /// Object key.
        key: String,
        /// Underlying error.
        #[source]
        source: object_store::Error,
    },

    /// A catalog document is not valid JSON of the expected shape.
    #[error("malformed catalog document '{key}'")]
    Parse {
        /// Object key.
        key: String,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// The model id is not in the manifest.
    #[error("model '{model_id}' not found in catalog")]
    ModelNotFound {
        /// Requested model id.
        model_id: String,
    },

    /// The model exists but no version matches the selector.
    #[error("no version of '{model_id}' matches '{version}' (available: {available})")]
    VersionNotFound {
        /// Requested model id.
        model_id: String,
        /// Requested version selector.
        version: String,
        /// Versions that do exist.
        available: String,
    },

    /// The spec lacks a key needed for the requested scope.
    #[error("spec for '{model_id}' has no {field}")]
    MissingField {
        /// Model id of the spec.
        model_id: String,
        /// Missing spec field.
        field: &'static str,
    },

    /// The instance type is not supported by the model.
    #[error("instance type {instance_type} is not supported by '{model_id}' (supported: {supported})")]
    UnsupportedInstanceType {
        /// Model id of the spec.
        model_id: String,
        /// Requested instance type.
        instance_type: String,
        /// Supported instance types.
        supported: String,
    },

    /// No image is listed for the instance type.
    #[error("no {scope} image for '{model_id}' on {instance_type} in {region}")]
    ImageNotFound {
        /// Model id of the spec.
        model_id: String,
        /// Artifact scope.
        scope: &'static str,
        /// Requested instance type.
        instance_type: String,
        /// Requested region.
        region: String,
    },

    /// A variant refers to an alias the region does not define.
    #[error("image alias '{alias}' is not defined for region {region}")]
    AliasNotFound {
        /// Alias name without the leading `$`.
        alias: String,
        /// Requested region.
        region: String,
    },

    /// An `s3://bucket/key` URI was expected.
    #[error("invalid object uri '{uri}'")]
    InvalidUri {
        /// The rejected URI.
        uri: String,
    },

    /// No account id could be read from the execution role.
    #[error("cannot derive an upload bucket from role '{role_arn}'")]
    MissingAccount {
        /// Execution role of the deployment.
        role_arn: String,
    },

    /// Reading or writing a tar archive failed.
    #[error("failed to repack model archive")]
    Repack {
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The script bundle lacks the entry point.
    #[error("script bundle has no {entry_point}")]
    MissingEntryPoint {
        /// Expected entry point script.
        entry_point: String,
    },

    /// The packaged archive could not be stored.
    #[error("failed to upload '{key}'")]
    Upload {
        /// Object key.
        key: String,
        /// Underlying error.
        #[source]
        source: object_store::Error,
    },
}

impl From<std::io::Error> for CatalogError {
    fn from(source: std::io::Error) -> Self {
        Self::Repack { source }
    }
}

impl CatalogError {
    /// Wrap this error as a failed artifact lookup.
    #[must_use]
    pub fn into_deploy_error(self, kind: ArtifactKind, request: &ArtifactRequest) -> DeployError {
        DeployError::ArtifactResolution {
            kind: kind.as_str(),
            model_id: request.model_id.to_string(),
            version: request.version.to_string(),
            source: Box::new(self),
        }
    }
}
