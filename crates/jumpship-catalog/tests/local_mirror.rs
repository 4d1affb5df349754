//! Artifact resolution against a catalog mirrored to a temp directory.

#![allow(clippy::unwrap_used)]

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use jumpship_catalog::{BucketAccess, CatalogResolver, CatalogSource, ModelRepacker};
use jumpship_core::{
    ArtifactRequest, ArtifactResolver, ArtifactScope, DeployError, DeploymentSettings,
    DeploymentWorkflow, InstanceType, MockPlatform, ModelId, ModelVersion, PACKAGED_CODE_DIR,
};
use tempfile::TempDir;

const MODEL_ID: &str = "model-txt2img-stabilityai-stable-diffusion-v1-4";
const BUCKET: &str = "jumpstart-cache-prod-us-west-2";
const GPU_IMAGE: &str = "763104351884.dkr.ecr.us-west-2.amazonaws.com/huggingface-pytorch-inference:1.10.2-transformers4.17.0-gpu-py38-cu113-ubuntu20.04";

fn write(root: &Path, key: &str, body: &str) {
    let path = root.join(key);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, body).unwrap();
}

fn write_bytes(root: &Path, key: &str, body: &[u8]) {
    let path = root.join(key);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, body).unwrap();
}

fn gzipped_tar(files: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, body) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        builder
            .append_data(&mut header, path, body.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

fn spec(version: &str) -> String {
    format!(
        r#"{{
            "model_id": "{MODEL_ID}",
            "version": "{version}",
            "hosting_artifact_key": "stabilityai-infer/v{version}/infer-{MODEL_ID}.tar.gz",
            "hosting_script_key": "source-directory-tarballs/stabilityai/inference/txt2img/v{version}/sourcedir.tar.gz",
            "supported_inference_instance_types": ["ml.g4dn.2xlarge", "ml.p3.2xlarge"],
            "hosting_instance_type_variants": {{
                "regional_aliases": {{"us-west-2": {{"gpu_image": "{GPU_IMAGE}"}}}},
                "variants": {{"gpu": {{"regional_properties": {{"image_uri": "$gpu_image"}}}}}}
            }}
        }}"#
    )
}

fn mirror() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "models_manifest.json",
        &format!(
            r#"[
                {{"model_id": "{MODEL_ID}", "version": "1.0.0", "spec_key": "community_models_specs/{MODEL_ID}/specs_v1.0.0.json"}},
                {{"model_id": "{MODEL_ID}", "version": "1.2.0", "spec_key": "community_models_specs/{MODEL_ID}/specs_v1.2.0.json"}}
            ]"#
        ),
    );
    for version in ["1.0.0", "1.2.0"] {
        write(
            dir.path(),
            &format!("community_models_specs/{MODEL_ID}/specs_v{version}.json"),
            &spec(version),
        );
    }
    dir
}

fn resolver(dir: &TempDir) -> CatalogResolver {
    CatalogResolver::with_source(
        CatalogSource::local(dir.path(), BUCKET).unwrap(),
        "models_manifest.json",
    )
}

fn request(version: &str) -> ArtifactRequest {
    ArtifactRequest {
        model_id: ModelId::new(MODEL_ID).unwrap(),
        version: ModelVersion::new(version).unwrap(),
        scope: ArtifactScope::Inference,
        region: "us-west-2".to_owned(),
    }
}

fn g4dn() -> InstanceType {
    InstanceType::new("ml.g4dn.2xlarge").unwrap()
}

#[tokio::test]
async fn resolves_all_three_artifacts_for_latest_version() {
    let dir = mirror();
    let resolver = resolver(&dir);
    let request = request("*");

    let image = resolver.image_uri(&request, &g4dn()).await.unwrap();
    let script = resolver.script_uri(&request).await.unwrap();
    let model = resolver.model_uri(&request).await.unwrap();

    assert_eq!(image, GPU_IMAGE);
    assert_eq!(
        script,
        format!("s3://{BUCKET}/source-directory-tarballs/stabilityai/inference/txt2img/v1.2.0/sourcedir.tar.gz")
    );
    assert_eq!(
        model,
        format!("s3://{BUCKET}/stabilityai-infer/v1.2.0/infer-{MODEL_ID}.tar.gz")
    );
}

#[tokio::test]
async fn exact_version_is_honoured() {
    let dir = mirror();
    let model = resolver(&dir).model_uri(&request("1.0.0")).await.unwrap();
    assert!(model.contains("/v1.0.0/"), "{model}");
}

#[tokio::test]
async fn documents_are_cached_after_first_lookup() {
    let dir = mirror();
    let resolver = resolver(&dir);
    let request = request("*");
    resolver.model_uri(&request).await.unwrap();

    std::fs::remove_file(dir.path().join("models_manifest.json")).unwrap();
    std::fs::remove_dir_all(dir.path().join("community_models_specs")).unwrap();

    assert!(resolver.script_uri(&request).await.is_ok());
}

#[tokio::test]
async fn unknown_model_fails_every_lookup() {
    let dir = mirror();
    let resolver = resolver(&dir);
    let mut request = request("*");
    request.model_id = ModelId::new("model-does-not-exist").unwrap();

    let err = resolver.image_uri(&request, &g4dn()).await.unwrap_err();
    assert!(matches!(
        err,
        DeployError::ArtifactResolution { kind: "image", .. }
    ));
    let err = resolver.script_uri(&request).await.unwrap_err();
    assert!(matches!(
        err,
        DeployError::ArtifactResolution { kind: "script", .. }
    ));
    let err = resolver.model_uri(&request).await.unwrap_err();
    assert!(matches!(
        err,
        DeployError::ArtifactResolution { kind: "model", .. }
    ));
}

#[tokio::test]
async fn unsupported_instance_type_is_rejected() {
    let dir = mirror();
    let err = resolver(&dir)
        .image_uri(&request("*"), &InstanceType::new("ml.c5.xlarge").unwrap())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("image"), "{err}");
}

#[tokio::test]
async fn workflow_plans_with_catalog_artifacts() {
    let dir = mirror();
    let platform = Arc::new(MockPlatform::new());
    let settings = DeploymentSettings {
        model_id: ModelId::new(MODEL_ID).unwrap(),
        instance_type: g4dn(),
        ..DeploymentSettings::default()
    };
    let workflow = DeploymentWorkflow::new(
        platform.clone(),
        Arc::new(resolver(&dir)),
        platform,
        settings,
    );

    let descriptor = workflow.plan().await.unwrap();

    assert_eq!(descriptor.artifacts().image_uri, GPU_IMAGE);
    assert!(descriptor.artifacts().model_uri.starts_with("s3://"));
    assert!(descriptor.artifacts().script_uri.ends_with("sourcedir.tar.gz"));
}

#[tokio::test]
async fn deploy_uploads_archive_with_bundled_scripts() {
    let dir = mirror();
    write_bytes(
        dir.path(),
        &format!("{BUCKET}/stabilityai-infer/v1.2.0/infer-{MODEL_ID}.tar.gz"),
        &gzipped_tar(&[("model.ckpt", "weights")]),
    );
    write_bytes(
        dir.path(),
        &format!(
            "{BUCKET}/source-directory-tarballs/stabilityai/inference/txt2img/v1.2.0/sourcedir.tar.gz"
        ),
        &gzipped_tar(&[("inference.py", "def model_fn(model_dir): ...")]),
    );

    let platform = Arc::new(MockPlatform::new());
    let settings = DeploymentSettings {
        model_id: ModelId::new(MODEL_ID).unwrap(),
        instance_type: g4dn(),
        ..DeploymentSettings::default()
    };
    let workflow = DeploymentWorkflow::new(
        platform.clone(),
        Arc::new(resolver(&dir)),
        platform.clone(),
        settings,
    )
    .with_packager(Arc::new(ModelRepacker::new(
        BucketAccess::local(dir.path()).unwrap(),
    )));

    let handle = workflow.deploy().await.unwrap();

    let created = platform.created();
    let descriptor = &created[0];
    let expected = format!(
        "s3://sagemaker-us-west-2-123456789012/{}/model.tar.gz",
        handle.name
    );
    assert_eq!(descriptor.model_data_uri(), expected);
    assert_eq!(
        descriptor.container_environment()["SAGEMAKER_SUBMIT_DIRECTORY"],
        PACKAGED_CODE_DIR
    );

    let uploaded = std::fs::read(dir.path().join(format!(
        "sagemaker-us-west-2-123456789012/{}/model.tar.gz",
        handle.name
    )))
    .unwrap();
    let mut archive = tar::Archive::new(GzDecoder::new(uploaded.as_slice()));
    let mut paths = Vec::new();
    for entry in archive.entries().unwrap() {
        let mut entry = entry.unwrap();
        let path = entry.path().unwrap().display().to_string();
        if path == "code/inference.py" {
            let mut body = String::new();
            entry.read_to_string(&mut body).unwrap();
            assert!(body.starts_with("def model_fn"));
        }
        paths.push(path);
    }
    paths.sort();
    assert_eq!(paths, vec!["code/inference.py", "model.ckpt"]);
}

#[tokio::test]
async fn missing_script_bundle_fails_packaging() {
    let dir = mirror();
    write_bytes(
        dir.path(),
        &format!("{BUCKET}/stabilityai-infer/v1.2.0/infer-{MODEL_ID}.tar.gz"),
        &gzipped_tar(&[("model.ckpt", "weights")]),
    );

    let platform = Arc::new(MockPlatform::new());
    let settings = DeploymentSettings {
        model_id: ModelId::new(MODEL_ID).unwrap(),
        instance_type: g4dn(),
        ..DeploymentSettings::default()
    };
    let workflow = DeploymentWorkflow::new(
        platform.clone(),
        Arc::new(resolver(&dir)),
        platform.clone(),
        settings,
    )
    .with_packager(Arc::new(ModelRepacker::new(
        BucketAccess::local(dir.path()).unwrap(),
    )));

    let err = workflow.deploy().await.unwrap_err();
    assert!(matches!(err, DeployError::Packaging { .. }), "{err}");
    assert!(platform.created().is_empty());
}
