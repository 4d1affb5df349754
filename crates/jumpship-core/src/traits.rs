//! Collaborator traits for the external platform.
//!
//! A deployment touches the outside world in three places: the ambient
//! session, the artifact catalog and the endpoint API. Each is a trait so the
//! workflow can run against real cloud services or in-process fakes.

use async_trait::async_trait;

use crate::descriptor::ModelDescriptor;
use crate::error::DeployResult;
use crate::types::{
    ArtifactRequest, EndpointDescription, EndpointHandle, EndpointName, InstanceType,
    SessionContext, TeardownReport,
};

/// Source of the execution role and region.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Resolve the session from ambient credentials.
    ///
    /// Fails when credentials are absent or the identity cannot be used as an
    /// execution role.
    async fn session(&self) -> DeployResult<SessionContext>;
}

/// Catalog lookup for the three artifacts of a model.
///
/// Each lookup fails if the `(model id, version)` pair is unknown.
#[async_trait]
pub trait ArtifactResolver: Send + Sync {
    /// Serving container image for the given instance type.
    async fn image_uri(
        &self,
        request: &ArtifactRequest,
        instance_type: &InstanceType,
    ) -> DeployResult<String>;

    /// Inference script bundle.
    async fn script_uri(&self, request: &ArtifactRequest) -> DeployResult<String>;

    /// Model weights archive.
    async fn model_uri(&self, request: &ArtifactRequest) -> DeployResult<String>;
}

/// Managed endpoint API.
#[async_trait]
pub trait EndpointProvisioner: Send + Sync {
    /// Submit the provisioning request.
    ///
    /// Returns as soon as the platform accepted it; the endpoint is usually
    /// still `Creating`.
    async fn create_endpoint(&self, descriptor: &ModelDescriptor) -> DeployResult<EndpointHandle>;

    /// Current state of an endpoint.
    async fn describe_endpoint(&self, name: &EndpointName) -> DeployResult<EndpointDescription>;

    /// Delete an endpoint along with its configuration and model.
    ///
    /// Resources that do not exist are reported as not deleted rather than
    /// failing the call.
    async fn delete_endpoint(&self, name: &EndpointName) -> DeployResult<TeardownReport>;
}

/// Bundles the inference scripts into the model archive.
///
/// Serving toolkits only load the entry point from `code/` inside the model
/// directory, so the script bundle has to travel inside the weights archive.
#[async_trait]
pub trait ModelPackager: Send + Sync {
    /// Write a combined archive for `descriptor` and return its URI.
    async fn package(&self, descriptor: &ModelDescriptor) -> DeployResult<String>;
}
