//! Deployment orchestration.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::descriptor::ModelDescriptor;
use crate::error::{DeployError, DeployResult};
use crate::naming;
use crate::settings::DeploymentSettings;
use crate::traits::{ArtifactResolver, EndpointProvisioner, ModelPackager, SessionProvider};
use crate::types::{
    ArtifactRequest, ArtifactSet, EndpointDescription, EndpointHandle, EndpointName,
    EndpointStatus, TeardownReport,
};

/// Runs the deploy sequence against a set of platform collaborators.
///
/// The sequence is strictly ordered:
/// 1. Resolve the execution role and region
/// 2. Derive the endpoint name
/// 3. Resolve image, script and model URIs
/// 4. Assemble the model descriptor
/// 5. Bundle the scripts into the model archive, when a packager is set
/// 6. Create the endpoint and wait until it is in service
///
/// Any failure ends the run; nothing is retried.
pub struct DeploymentWorkflow {
    session: Arc<dyn SessionProvider>,
    resolver: Arc<dyn ArtifactResolver>,
    provisioner: Arc<dyn EndpointProvisioner>,
    packager: Option<Arc<dyn ModelPackager>>,
    settings: DeploymentSettings,
}

impl DeploymentWorkflow {
    /// Create a new workflow.
    pub fn new(
        session: Arc<dyn SessionProvider>,
        resolver: Arc<dyn ArtifactResolver>,
        provisioner: Arc<dyn EndpointProvisioner>,
        settings: DeploymentSettings,
    ) -> Self {
        Self {
            session,
            resolver,
            provisioner,
            packager: None,
            settings,
        }
    }

    /// Bundle the inference scripts into the model archive before deploying.
    #[must_use]
    pub fn with_packager(mut self, packager: Arc<dyn ModelPackager>) -> Self {
        self.packager = Some(packager);
        self
    }

    /// Settings this workflow deploys with.
    #[must_use]
    pub fn settings(&self) -> &DeploymentSettings {
        &self.settings
    }

    /// Resolve everything needed for a deployment without creating anything.
    pub async fn plan(&self) -> DeployResult<ModelDescriptor> {
        self.plan_at(Utc::now()).await
    }

    /// Like [`plan`](Self::plan), naming the endpoint after `at`.
    pub async fn plan_at(&self, at: DateTime<Utc>) -> DeployResult<ModelDescriptor> {
        let session = self.session.session().await?;
        info!(
            region = %session.region,
            role = %session.role_arn,
            "session resolved"
        );

        let endpoint_name =
            naming::endpoint_name(&self.settings.endpoint_prefix, &self.settings.model_id, at);

        let request = ArtifactRequest {
            model_id: self.settings.model_id.clone(),
            version: self.settings.model_version.clone(),
            scope: self.settings.scope,
            region: session.region.clone(),
        };
        let artifacts = self.resolve_artifacts(&request).await?;

        Ok(ModelDescriptor::assemble(
            &self.settings,
            &session,
            endpoint_name,
            artifacts,
        ))
    }

    /// Plan and create the endpoint, waiting for it unless waiting is disabled.
    pub async fn deploy(&self) -> DeployResult<EndpointHandle> {
        let descriptor = self.package(self.plan().await?).await?;
        self.deploy_descriptor(&descriptor).await
    }

    /// Bundle the scripts into the model archive. Without a packager the
    /// descriptor is returned unchanged.
    pub async fn package(&self, descriptor: ModelDescriptor) -> DeployResult<ModelDescriptor> {
        let Some(packager) = &self.packager else {
            return Ok(descriptor);
        };
        let uri = packager.package(&descriptor).await?;
        info!(endpoint = %descriptor.endpoint_name(), uri = %uri, "model packaged");
        Ok(descriptor.with_packaged_model(uri))
    }

    /// Create the endpoint described by `descriptor`.
    pub async fn deploy_descriptor(
        &self,
        descriptor: &ModelDescriptor,
    ) -> DeployResult<EndpointHandle> {
        info!(
            endpoint = %descriptor.endpoint_name(),
            model_id = %descriptor.model_id(),
            instance_type = %descriptor.instance_type(),
            instance_count = descriptor.instance_count(),
            "creating endpoint"
        );

        let handle = self.provisioner.create_endpoint(descriptor).await?;

        if !self.settings.wait.enabled {
            info!(endpoint = %handle.name, status = %handle.status, "not waiting for endpoint");
            return Ok(handle);
        }

        let description = self.wait_until_in_service(&handle.name).await?;
        info!(endpoint = %handle.name, arn = %description.arn, "endpoint in service");

        Ok(EndpointHandle {
            status: description.status,
            ..handle
        })
    }

    /// Poll an endpoint until it is in service, fails, or the wait times out.
    pub async fn wait_until_in_service(
        &self,
        name: &EndpointName,
    ) -> DeployResult<EndpointDescription> {
        let poll_interval = self.settings.wait.poll_interval;
        let timeout = self.settings.wait.timeout;
        let started = Instant::now();

        loop {
            let description = self.provisioner.describe_endpoint(name).await?;
            debug!(endpoint = %name, status = %description.status, "endpoint status");

            match description.status.clone() {
                EndpointStatus::InService => return Ok(description),
                EndpointStatus::Failed => {
                    return Err(DeployError::EndpointFailed {
                        endpoint: name.to_string(),
                        reason: description
                            .failure_reason
                            .unwrap_or_else(|| "no failure reason reported".to_owned()),
                    });
                }
                status if status.is_transitional() => {}
                EndpointStatus::Other(status) => {
                    warn!(endpoint = %name, status = %status, "unrecognised endpoint status");
                }
                status => {
                    return Err(DeployError::EndpointNotReady {
                        endpoint: name.to_string(),
                        status: status.to_string(),
                    });
                }
            }

            let next_poll = started.elapsed().checked_add(poll_interval);
            if next_poll.map_or(true, |at| at >= timeout) {
                return Err(DeployError::WaitTimeout {
                    endpoint: name.to_string(),
                    waited_secs: started.elapsed().as_secs(),
                });
            }
            sleep(poll_interval).await;
        }
    }

    /// Current state of an endpoint.
    pub async fn status(&self, name: &EndpointName) -> DeployResult<EndpointDescription> {
        self.provisioner.describe_endpoint(name).await
    }

    /// Delete an endpoint with its configuration and model.
    pub async fn teardown(&self, name: &EndpointName) -> DeployResult<TeardownReport> {
        info!(endpoint = %name, "deleting endpoint");
        let report = self.provisioner.delete_endpoint(name).await?;
        if !report.endpoint {
            warn!(endpoint = %name, "endpoint did not exist");
        }
        Ok(report)
    }

    async fn resolve_artifacts(&self, request: &ArtifactRequest) -> DeployResult<ArtifactSet> {
        let image_uri = self
            .resolver
            .image_uri(request, &self.settings.instance_type)
            .await?;
        debug!(uri = %image_uri, "resolved image");

        let script_uri = self.resolver.script_uri(request).await?;
        debug!(uri = %script_uri, "resolved script bundle");

        let model_uri = self.resolver.model_uri(request).await?;
        debug!(uri = %model_uri, "resolved model weights");

        info!(
            model_id = %request.model_id,
            version = %request.version,
            scope = %request.scope,
            "artifacts resolved"
        );

        Ok(ArtifactSet {
            image_uri,
            script_uri,
            model_uri,
        })
    }
}

impl std::fmt::Debug for DeploymentWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentWorkflow")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
