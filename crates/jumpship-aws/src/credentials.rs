//! SDK credentials for `object_store` clients.
//!
//! `AmazonS3Builder::from_env` only reads `AWS_*` variables. Handing it the
//! SDK's provider keeps profiles, SSO and instance roles working for catalog
//! reads and model uploads.

use std::sync::Arc;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use object_store::aws::{AwsCredential, AwsCredentialProvider};
use object_store::CredentialProvider;
use tracing::trace;

/// `object_store` credential provider that asks the SDK provider chain.
#[derive(Debug, Clone)]
pub struct SdkCredentials {
    provider: SharedCredentialsProvider,
}

impl SdkCredentials {
    /// Wrap an SDK credentials provider.
    #[must_use]
    pub fn new(provider: SharedCredentialsProvider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl CredentialProvider for SdkCredentials {
    type Credential = AwsCredential;

    async fn get_credential(&self) -> object_store::Result<Arc<AwsCredential>> {
        let credentials = self
            .provider
            .provide_credentials()
            .await
            .map_err(|e| object_store::Error::Generic {
                store: "S3",
                source: Box::new(e),
            })?;
        trace!(expires = ?credentials.expiry(), "loaded SDK credentials");

        Ok(Arc::new(AwsCredential {
            key_id: credentials.access_key_id().to_owned(),
            secret_key: credentials.secret_access_key().to_owned(),
            token: credentials.session_token().map(str::to_owned),
        }))
    }
}

/// Credentials for `object_store` S3 clients, if the SDK config has a provider.
#[must_use]
pub fn object_store_credentials(sdk_config: &SdkConfig) -> Option<AwsCredentialProvider> {
    sdk_config
        .credentials_provider()
        .map(|provider| Arc::new(SdkCredentials::new(provider)) as AwsCredentialProvider)
}
