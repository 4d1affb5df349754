//! End-to-end deploy runs against the mock platform.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use jumpship_core::{
    DeploymentSettings, DeploymentWorkflow, EndpointStatus, InstanceType, JumpshipConfig,
    MockPlatform, ModelId, ModelVersion, MAX_RESPONSE_SIZE_KEY,
};

fn workflow_for(platform: &Arc<MockPlatform>, settings: DeploymentSettings) -> DeploymentWorkflow {
    DeploymentWorkflow::new(platform.clone(), platform.clone(), platform.clone(), settings)
}

fn stable_diffusion_settings() -> DeploymentSettings {
    let mut settings = DeploymentSettings {
        model_id: ModelId::new("model-txt2img-stabilityai-stable-diffusion-v1-4").unwrap(),
        model_version: ModelVersion::new("*").unwrap(),
        instance_type: InstanceType::new("ml.g4dn.2xlarge").unwrap(),
        ..DeploymentSettings::default()
    };
    settings.wait.poll_interval = Duration::from_secs(30);
    settings
}

#[tokio::test(start_paused = true)]
async fn stable_diffusion_deploy_sends_expected_descriptor() {
    let platform = Arc::new(MockPlatform::new().with_statuses([
        EndpointStatus::Creating,
        EndpointStatus::InService,
    ]));
    let workflow = workflow_for(&platform, stable_diffusion_settings());

    let handle = workflow.deploy().await.unwrap();
    assert_eq!(handle.status, EndpointStatus::InService);

    let created = platform.created();
    assert_eq!(created.len(), 1);
    let descriptor = &created[0];

    assert_eq!(descriptor.instance_type().as_str(), "ml.g4dn.2xlarge");
    assert_eq!(descriptor.instance_count(), 1);
    assert_eq!(descriptor.environment().len(), 1);
    assert_eq!(
        descriptor.environment().get(MAX_RESPONSE_SIZE_KEY),
        Some("20000000")
    );
    assert_eq!(descriptor.entry_point(), "inference.py");
    assert_eq!(descriptor.artifacts(), platform.artifacts());
    assert_eq!(descriptor.endpoint_name(), &handle.name);
    assert!(descriptor
        .endpoint_name()
        .as_str()
        .starts_with("jumpstart-example-infer-model-txt2img"));

    for call in platform.artifact_calls() {
        assert_eq!(
            call.request.model_id.as_str(),
            "model-txt2img-stabilityai-stable-diffusion-v1-4"
        );
        assert_eq!(call.request.version.as_str(), "*");
    }
}

#[tokio::test]
async fn leading_space_in_configured_model_id_is_ignored() {
    let mut config = JumpshipConfig::default();
    config.model.id = " model-txt2img-stabilityai-stable-diffusion-v1-4".to_owned();
    let settings = config.settings().unwrap();

    let platform = Arc::new(MockPlatform::new());
    let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
    let descriptor = workflow_for(&platform, settings).plan_at(at).await.unwrap();

    assert_eq!(
        descriptor.endpoint_name().as_str(),
        "jumpstart-example-infer-model-txt2img-s-2026-01-02-03-04-05-000"
    );
    assert_eq!(
        platform.artifact_calls()[0].request.model_id.as_str(),
        "model-txt2img-stabilityai-stable-diffusion-v1-4"
    );
}

#[tokio::test]
async fn planning_twice_at_one_instant_is_deterministic() {
    let platform = Arc::new(MockPlatform::new());
    let workflow = workflow_for(&platform, stable_diffusion_settings());
    let at = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();

    let first = workflow.plan_at(at).await.unwrap();
    let second = workflow.plan_at(at).await.unwrap();

    assert_eq!(first, second);
}
