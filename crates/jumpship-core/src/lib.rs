//! Jumpship core
//!
//! Deploys a pretrained model from a managed platform's model catalog onto a
//! managed inference endpoint.
//!
//! # Workflow
//!
//! A deployment is a fixed sequence of calls to three collaborators:
//!
//! ```text
//! SessionProvider ──▶ ArtifactResolver (image, script, model) ──▶ EndpointProvisioner
//!   role, region        same (model id, version) for all three     create, then poll
//! ```
//!
//! The collaborators are traits so the same [`DeploymentWorkflow`] runs
//! against the real cloud (`jumpship-aws`, `jumpship-catalog`) or against
//! [`MockPlatform`] in tests.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use jumpship_core::{DeploymentSettings, DeploymentWorkflow, MockPlatform};
//!
//! let platform = Arc::new(MockPlatform::new());
//! let workflow = DeploymentWorkflow::new(
//!     platform.clone(),
//!     platform.clone(),
//!     platform,
//!     DeploymentSettings::default(),
//! );
//! let endpoint = workflow.deploy().await?;
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod descriptor;
pub mod error;
pub mod mock;
pub mod naming;
pub mod settings;
pub mod traits;
pub mod types;
pub mod workflow;

pub use config::JumpshipConfig;
pub use descriptor::{
    EnvironmentOverrides, ModelDescriptor, MAX_RESPONSE_SIZE_BYTES, MAX_RESPONSE_SIZE_KEY,
    PACKAGED_CODE_DIR,
};
pub use error::{BoxError, DeployError, DeployResult};
pub use mock::MockPlatform;
pub use settings::{DeploymentSettings, WaitSettings};
pub use traits::{ArtifactResolver, EndpointProvisioner, ModelPackager, SessionProvider};
pub use types::{
    arn_account, ArtifactKind, ArtifactRequest, ArtifactScope, ArtifactSet, EndpointDescription,
    EndpointHandle, EndpointName, EndpointStatus, InstanceType, ModelId, ModelVersion,
    SessionContext, TeardownReport,
};
pub use workflow::DeploymentWorkflow;
