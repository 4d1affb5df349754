//! AWS collaborators for jumpship.
//!
//! - [`AwsSession`]: region from the SDK configuration, execution role from
//!   STS caller identity and IAM
//! - [`SdkCredentials`]: the SDK credential chain for `object_store` clients
//! - [`SageMakerProvisioner`]: creates, describes and deletes endpoints

#![forbid(unsafe_code)]

pub mod credentials;
pub mod sagemaker;
pub mod session;

pub use credentials::{object_store_credentials, SdkCredentials};
pub use sagemaker::SageMakerProvisioner;
pub use session::{role_from_caller_arn, AssumedRole, AwsSession};

use aws_config::{BehaviorVersion, Region, SdkConfig};

/// Load SDK configuration from the default provider chain.
///
/// `region` replaces whatever region the chain would pick.
pub async fn load_sdk_config(region: Option<String>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(Region::new(region));
    }
    loader.load().await
}
