//! SageMaker endpoint provisioning.
//!
//! A deployment creates three resources that all share the endpoint name:
//! a model, an endpoint configuration with a single `AllTraffic` variant,
//! and the endpoint itself. Teardown deletes them in reverse order.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sagemaker::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_sagemaker::types::{
    ContainerDefinition, EndpointStatus as SdkEndpointStatus, ProductionVariant,
    ProductionVariantInstanceType,
};
use tracing::{debug, info, warn};

use jumpship_core::{
    DeployError, DeployResult, EndpointDescription, EndpointHandle, EndpointName,
    EndpointProvisioner, EndpointStatus, ModelDescriptor, TeardownReport,
};

/// Name of the single production variant.
pub const VARIANT_NAME: &str = "AllTraffic";

const INITIAL_VARIANT_WEIGHT: f32 = 1.0;

/// [`EndpointProvisioner`] backed by the SageMaker API.
#[derive(Debug, Clone)]
pub struct SageMakerProvisioner {
    client: aws_sdk_sagemaker::Client,
}

impl SageMakerProvisioner {
    /// Create a provisioner for the configured region.
    #[must_use]
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_sagemaker::Client::new(sdk_config),
        }
    }

    async fn create_model(&self, descriptor: &ModelDescriptor) -> DeployResult<()> {
        let name = descriptor.endpoint_name().as_str();
        self.client
            .create_model()
            .model_name(name)
            .execution_role_arn(descriptor.role_arn())
            .primary_container(container_definition(descriptor))
            .send()
            .await
            .map_err(|e| DeployError::platform("CreateModel", e))?;
        debug!(model = %name, "model created");
        Ok(())
    }

    async fn create_endpoint_config(&self, descriptor: &ModelDescriptor) -> DeployResult<()> {
        let name = descriptor.endpoint_name().as_str();
        self.client
            .create_endpoint_config()
            .endpoint_config_name(name)
            .production_variants(production_variant(descriptor)?)
            .send()
            .await
            .map_err(|e| DeployError::platform("CreateEndpointConfig", e))?;
        debug!(endpoint_config = %name, "endpoint config created");
        Ok(())
    }
}

#[async_trait]
impl EndpointProvisioner for SageMakerProvisioner {
    async fn create_endpoint(&self, descriptor: &ModelDescriptor) -> DeployResult<EndpointHandle> {
        let name = descriptor.endpoint_name();

        self.create_model(descriptor).await?;
        self.create_endpoint_config(descriptor).await?;

        let output = self
            .client
            .create_endpoint()
            .endpoint_name(name.as_str())
            .endpoint_config_name(name.as_str())
            .send()
            .await
            .map_err(|e| DeployError::platform("CreateEndpoint", e))?;

        let arn: Option<&str> = output.endpoint_arn().into();
        info!(
            endpoint = %name,
            instance_type = %descriptor.instance_type(),
            instance_count = descriptor.instance_count(),
            "endpoint creation submitted"
        );

        Ok(EndpointHandle {
            name: name.clone(),
            arn: arn.unwrap_or_default().to_owned(),
            region: descriptor.region().to_owned(),
            status: EndpointStatus::Creating,
        })
    }

    async fn describe_endpoint(&self, name: &EndpointName) -> DeployResult<EndpointDescription> {
        let output = self
            .client
            .describe_endpoint()
            .endpoint_name(name.as_str())
            .send()
            .await
            .map_err(|e| DeployError::platform("DescribeEndpoint", e))?;

        let arn: Option<&str> = output.endpoint_arn().into();
        let status: Option<&SdkEndpointStatus> = output.endpoint_status().into();

        Ok(EndpointDescription {
            name: name.clone(),
            arn: arn.unwrap_or_default().to_owned(),
            status: status.map_or_else(
                || EndpointStatus::Other("Unknown".to_owned()),
                |s| EndpointStatus::from(s.as_str().to_owned()),
            ),
            failure_reason: output.failure_reason().map(str::to_owned),
        })
    }

    async fn delete_endpoint(&self, name: &EndpointName) -> DeployResult<TeardownReport> {
        let name = name.as_str();

        let endpoint = deleted(
            "DeleteEndpoint",
            self.client.delete_endpoint().endpoint_name(name).send().await,
        )?;
        let endpoint_config = deleted(
            "DeleteEndpointConfig",
            self.client
                .delete_endpoint_config()
                .endpoint_config_name(name)
                .send()
                .await,
        )?;
        let model = deleted(
            "DeleteModel",
            self.client.delete_model().model_name(name).send().await,
        )?;

        let report = TeardownReport {
            endpoint,
            endpoint_config,
            model,
        };
        info!(
            endpoint = %name,
            endpoint_deleted = report.endpoint,
            config_deleted = report.endpoint_config,
            model_deleted = report.model,
            "endpoint torn down"
        );
        Ok(report)
    }
}

/// Container definition for the serving model.
#[must_use]
pub fn container_definition(descriptor: &ModelDescriptor) -> ContainerDefinition {
    let environment: HashMap<String, String> =
        descriptor.container_environment().into_iter().collect();
    ContainerDefinition::builder()
        .image(&descriptor.artifacts().image_uri)
        .model_data_url(descriptor.model_data_uri())
        .set_environment(Some(environment))
        .build()
}

/// The single production variant routing all traffic to the model.
pub fn production_variant(descriptor: &ModelDescriptor) -> DeployResult<ProductionVariant> {
    let instance_count = i32::try_from(descriptor.instance_count())
        .map_err(|_| DeployError::invalid("instance_count", "too large"))?;
    Ok(ProductionVariant::builder()
        .variant_name(VARIANT_NAME)
        .model_name(descriptor.endpoint_name().as_str())
        .instance_type(ProductionVariantInstanceType::from(
            descriptor.instance_type().as_str(),
        ))
        .initial_instance_count(instance_count)
        .initial_variant_weight(INITIAL_VARIANT_WEIGHT)
        .build())
}

/// Map a delete result to whether the resource existed.
fn deleted<T, E, R>(operation: &'static str, result: Result<T, SdkError<E, R>>) -> DeployResult<bool>
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    match result {
        Ok(_) => Ok(true),
        Err(err) if is_missing_resource(err.as_service_error().and_then(|e| e.message())) => {
            warn!(operation = %operation, "resource does not exist, skipping");
            Ok(false)
        }
        Err(err) => Err(DeployError::platform(operation, err)),
    }
}

/// SageMaker reports absent resources as a validation error with this message.
fn is_missing_resource(message: Option<&str>) -> bool {
    message.is_some_and(|m| m.starts_with("Could not find"))
}
