//! In-process platform for tests and dry runs.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::descriptor::ModelDescriptor;
use crate::error::{DeployError, DeployResult};
use crate::traits::{ArtifactResolver, EndpointProvisioner, ModelPackager, SessionProvider};
use crate::types::{
    ArtifactKind, ArtifactRequest, ArtifactSet, EndpointDescription, EndpointHandle,
    EndpointName, EndpointStatus, InstanceType, SessionContext, TeardownReport,
};

/// One recorded artifact lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactCall {
    /// Which artifact was requested.
    pub kind: ArtifactKind,
    /// Shared lookup parameters.
    pub request: ArtifactRequest,
    /// Instance type, for image lookups.
    pub instance_type: Option<InstanceType>,
}

#[derive(Debug, Default)]
struct Recorded {
    artifact_calls: Vec<ArtifactCall>,
    created: Vec<ModelDescriptor>,
    packaged: Vec<ModelDescriptor>,
    deleted: Vec<EndpointName>,
    describe_count: usize,
}

/// Mock platform implementing every collaborator trait.
///
/// Records each call so tests can assert on what the workflow sent. Endpoint
/// statuses are replayed in order; the last one repeats.
#[derive(Debug)]
pub struct MockPlatform {
    session: Option<SessionContext>,
    artifacts: ArtifactSet,
    unknown_model: bool,
    statuses: Mutex<VecDeque<EndpointStatus>>,
    failure_reason: Option<String>,
    describe_latency: Duration,
    recorded: Mutex<Recorded>,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self {
            session: Some(SessionContext {
                region: "us-west-2".to_owned(),
                role_arn: "arn:aws:iam::123456789012:role/MockDeployer".to_owned(),
            }),
            artifacts: ArtifactSet {
                image_uri: "763104351884.dkr.ecr.us-west-2.amazonaws.com/mock-inference:latest"
                    .to_owned(),
                script_uri: "s3://mock-catalog/source/sourcedir.tar.gz".to_owned(),
                model_uri: "s3://mock-catalog/models/model.tar.gz".to_owned(),
            },
            unknown_model: false,
            statuses: Mutex::new(VecDeque::from([EndpointStatus::InService])),
            failure_reason: None,
            describe_latency: Duration::ZERO,
            recorded: Mutex::new(Recorded::default()),
        }
    }
}

impl MockPlatform {
    /// Create a mock with default session and artifacts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail session resolution as if no credentials were configured.
    #[must_use]
    pub fn without_session(mut self) -> Self {
        self.session = None;
        self
    }

    /// Use a specific session.
    #[must_use]
    pub fn with_session(mut self, session: SessionContext) -> Self {
        self.session = Some(session);
        self
    }

    /// Use specific artifact URIs.
    #[must_use]
    pub fn with_artifacts(mut self, artifacts: ArtifactSet) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// Fail every artifact lookup as if the model were not in the catalog.
    #[must_use]
    pub fn with_unknown_model(mut self) -> Self {
        self.unknown_model = true;
        self
    }

    /// Statuses returned by successive describe calls.
    #[must_use]
    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = EndpointStatus>) -> Self {
        self.statuses = Mutex::new(statuses.into_iter().collect());
        self
    }

    /// Failure reason reported alongside a `Failed` status.
    #[must_use]
    pub fn with_failure_reason(mut self, reason: impl Into<String>) -> Self {
        self.failure_reason = Some(reason.into());
        self
    }

    /// Time each describe call takes, on the tokio clock.
    #[must_use]
    pub fn with_describe_latency(mut self, latency: Duration) -> Self {
        self.describe_latency = latency;
        self
    }

    /// Artifacts this mock resolves to.
    #[must_use]
    pub fn artifacts(&self) -> &ArtifactSet {
        &self.artifacts
    }

    /// Artifact lookups in call order.
    #[must_use]
    pub fn artifact_calls(&self) -> Vec<ArtifactCall> {
        self.with_recorded(|r| r.artifact_calls.clone())
    }

    /// Descriptors passed to `create_endpoint`.
    #[must_use]
    pub fn created(&self) -> Vec<ModelDescriptor> {
        self.with_recorded(|r| r.created.clone())
    }

    /// Descriptors passed to `package`.
    #[must_use]
    pub fn packaged(&self) -> Vec<ModelDescriptor> {
        self.with_recorded(|r| r.packaged.clone())
    }

    /// Endpoints passed to `delete_endpoint`.
    #[must_use]
    pub fn deleted(&self) -> Vec<EndpointName> {
        self.with_recorded(|r| r.deleted.clone())
    }

    /// Number of describe calls.
    #[must_use]
    pub fn describe_count(&self) -> usize {
        self.with_recorded(|r| r.describe_count)
    }

    fn with_recorded<T>(&self, f: impl FnOnce(&Recorded) -> T) -> T {
        match self.recorded.lock() {
            Ok(guard) => f(&guard),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }

    fn record(&self, f: impl FnOnce(&mut Recorded)) -> DeployResult<()> {
        let mut recorded = self
            .recorded
            .lock()
            .map_err(|_| DeployError::internal("lock poisoned"))?;
        f(&mut recorded);
        Ok(())
    }

    fn lookup(
        &self,
        kind: ArtifactKind,
        request: &ArtifactRequest,
        instance_type: Option<&InstanceType>,
        uri: &str,
    ) -> DeployResult<String> {
        self.record(|r| {
            r.artifact_calls.push(ArtifactCall {
                kind,
                request: request.clone(),
                instance_type: instance_type.cloned(),
            });
        })?;

        if self.unknown_model {
            return Err(DeployError::ArtifactResolution {
                kind: kind.as_str(),
                model_id: request.model_id.to_string(),
                version: request.version.to_string(),
                source: "model not found in catalog".into(),
            });
        }
        Ok(uri.to_owned())
    }

    fn next_status(&self) -> DeployResult<EndpointStatus> {
        let mut statuses = self
            .statuses
            .lock()
            .map_err(|_| DeployError::internal("lock poisoned"))?;
        let status = if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().cloned()
        };
        Ok(status.unwrap_or(EndpointStatus::InService))
    }
}

#[async_trait]
impl SessionProvider for MockPlatform {
    async fn session(&self) -> DeployResult<SessionContext> {
        self.session
            .clone()
            .ok_or_else(|| DeployError::session("no credentials configured"))
    }
}

#[async_trait]
impl ArtifactResolver for MockPlatform {
    async fn image_uri(
        &self,
        request: &ArtifactRequest,
        instance_type: &InstanceType,
    ) -> DeployResult<String> {
        self.lookup(
            ArtifactKind::Image,
            request,
            Some(instance_type),
            &self.artifacts.image_uri,
        )
    }

    async fn script_uri(&self, request: &ArtifactRequest) -> DeployResult<String> {
        self.lookup(ArtifactKind::Script, request, None, &self.artifacts.script_uri)
    }

    async fn model_uri(&self, request: &ArtifactRequest) -> DeployResult<String> {
        self.lookup(ArtifactKind::Model, request, None, &self.artifacts.model_uri)
    }
}

#[async_trait]
impl EndpointProvisioner for MockPlatform {
    async fn create_endpoint(&self, descriptor: &ModelDescriptor) -> DeployResult<EndpointHandle> {
        self.record(|r| r.created.push(descriptor.clone()))?;

        Ok(EndpointHandle {
            name: descriptor.endpoint_name().clone(),
            arn: format!(
                "arn:aws:sagemaker:{}:123456789012:endpoint/{}",
                descriptor.region(),
                descriptor.endpoint_name()
            ),
            region: descriptor.region().to_owned(),
            status: EndpointStatus::Creating,
        })
    }

    async fn describe_endpoint(&self, name: &EndpointName) -> DeployResult<EndpointDescription> {
        self.record(|r| r.describe_count += 1)?;
        if !self.describe_latency.is_zero() {
            tokio::time::sleep(self.describe_latency).await;
        }
        let status = self.next_status()?;
        let failure_reason = match status {
            EndpointStatus::Failed => self.failure_reason.clone(),
            _ => None,
        };

        Ok(EndpointDescription {
            name: name.clone(),
            arn: format!("arn:aws:sagemaker:us-west-2:123456789012:endpoint/{name}"),
            status,
            failure_reason,
        })
    }

    async fn delete_endpoint(&self, name: &EndpointName) -> DeployResult<TeardownReport> {
        self.record(|r| r.deleted.push(name.clone()))?;

        Ok(TeardownReport {
            endpoint: true,
            endpoint_config: true,
            model: true,
        })
    }
}

#[async_trait]
impl ModelPackager for MockPlatform {
    async fn package(&self, descriptor: &ModelDescriptor) -> DeployResult<String> {
        self.record(|r| r.packaged.push(descriptor.clone()))?;
        let account = descriptor
            .account_id()
            .ok_or_else(|| DeployError::internal("execution role has no account"))?;
        Ok(format!(
            "s3://sagemaker-{}-{account}/{}/model.tar.gz",
            descriptor.region(),
            descriptor.endpoint_name()
        ))
    }
}
