//! Error types for jumpship-core.

/// Boxed error used to carry failures from external collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias using [`DeployError`].
pub type DeployResult<T> = Result<T, DeployError>;

/// Errors that can occur while planning or running a deployment.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Ambient credentials or region could not be resolved.
    #[error("failed to resolve execution session: {reason}")]
    Session {
        /// What could not be resolved.
        reason: String,
        /// Underlying failure, when one was reported.
        #[source]
        source: Option<BoxError>,
    },

    /// The caller identity cannot be used as an execution role.
    #[error("identity is not a role: {arn}")]
    NotARole {
        /// ARN reported for the caller.
        arn: String,
    },

    /// The inference scripts could not be bundled into the model archive.
    #[error("failed to package model artifact for endpoint {endpoint}")]
    Packaging {
        /// Endpoint the package is for.
        endpoint: String,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },

    /// One of the artifact lookups failed.
    #[error("failed to resolve {kind} artifact for {model_id}@{version}")]
    ArtifactResolution {
        /// Which artifact was being resolved.
        kind: &'static str,
        /// Model identifier of the lookup.
        model_id: String,
        /// Version of the lookup.
        version: String,
        /// Underlying lookup failure.
        #[source]
        source: BoxError,
    },

    /// A platform API call failed.
    #[error("{operation} failed")]
    Platform {
        /// Name of the platform operation.
        operation: &'static str,
        /// Underlying SDK failure.
        #[source]
        source: BoxError,
    },

    /// The endpoint reached the `Failed` state.
    #[error("endpoint {endpoint} failed: {reason}")]
    EndpointFailed {
        /// Endpoint name.
        endpoint: String,
        /// Failure reason reported by the platform.
        reason: String,
    },

    /// The endpoint reached a state from which it will not become ready.
    #[error("endpoint {endpoint} stopped in state {status}")]
    EndpointNotReady {
        /// Endpoint name.
        endpoint: String,
        /// Last observed status.
        status: String,
    },

    /// The endpoint did not become ready in time.
    #[error("timed out after {waited_secs}s waiting for endpoint {endpoint}")]
    WaitTimeout {
        /// Endpoint name.
        endpoint: String,
        /// Seconds spent waiting.
        waited_secs: u64,
    },

    /// An input value is malformed.
    #[error("invalid {field}: {reason}")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DeployError {
    /// Create a session error.
    #[must_use]
    pub fn session(reason: impl Into<String>) -> Self {
        Self::Session {
            reason: reason.into(),
            source: None,
        }
    }

    /// Create a session error caused by `source`.
    #[must_use]
    pub fn session_with(reason: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Session {
            reason: reason.into(),
            source: Some(source.into()),
        }
    }

    /// Create a model packaging error.
    #[must_use]
    pub fn packaging(endpoint: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Packaging {
            endpoint: endpoint.into(),
            source: source.into(),
        }
    }

    /// Create a platform error for a named operation.
    #[must_use]
    pub fn platform(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Platform {
            operation,
            source: source.into(),
        }
    }

    /// Create an input validation error.
    #[must_use]
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<figment::Error> for DeployError {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}
