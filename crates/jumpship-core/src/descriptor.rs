//! Deployable model descriptor.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::settings::DeploymentSettings;
use crate::types::{
    ArtifactSet, EndpointName, InstanceType, ModelId, ModelVersion, SessionContext,
};

/// Environment variable raising the serving process's response size limit.
pub const MAX_RESPONSE_SIZE_KEY: &str = "MMS_MAX_RESPONSE_SIZE";

/// Response size limit in bytes; generated images exceed the default.
pub const MAX_RESPONSE_SIZE_BYTES: &str = "20000000";

/// Where the serving container finds scripts bundled into the model archive.
pub const PACKAGED_CODE_DIR: &str = "/opt/ml/model/code";

/// Log level passed to the serving container (Python `logging.INFO`).
const CONTAINER_LOG_LEVEL: &str = "20";

/// Environment overrides for the deployed serving process.
///
/// Always contains [`MAX_RESPONSE_SIZE_KEY`] set to [`MAX_RESPONSE_SIZE_BYTES`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EnvironmentOverrides(BTreeMap<String, String>);

impl EnvironmentOverrides {
    /// Overrides containing only the response size limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_extra(std::iter::empty::<(String, String)>())
    }

    /// Overrides with additional entries.
    ///
    /// Extra entries cannot change the response size limit.
    pub fn with_extra<K, V>(extra: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut vars: BTreeMap<String, String> = extra
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        vars.insert(
            MAX_RESPONSE_SIZE_KEY.to_owned(),
            MAX_RESPONSE_SIZE_BYTES.to_owned(),
        );
        Self(vars)
    }

    /// Look up a variable.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Number of variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; the response size limit is always present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over variables in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Default for EnvironmentOverrides {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the platform needs to create an endpoint.
///
/// Built once per deployment from a fully resolved [`ArtifactSet`] and then
/// only read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelDescriptor {
    model_id: ModelId,
    model_version: ModelVersion,
    endpoint_name: EndpointName,
    instance_type: InstanceType,
    instance_count: u32,
    role_arn: String,
    region: String,
    entry_point: String,
    artifacts: ArtifactSet,
    environment: EnvironmentOverrides,
    #[serde(skip_serializing_if = "Option::is_none")]
    packaged_model_uri: Option<String>,
}

impl ModelDescriptor {
    /// Assemble a descriptor.
    #[must_use]
    pub fn assemble(
        settings: &DeploymentSettings,
        session: &SessionContext,
        endpoint_name: EndpointName,
        artifacts: ArtifactSet,
    ) -> Self {
        Self {
            model_id: settings.model_id.clone(),
            model_version: settings.model_version.clone(),
            endpoint_name,
            instance_type: settings.instance_type.clone(),
            instance_count: settings.instance_count,
            role_arn: session.role_arn.clone(),
            region: session.region.clone(),
            entry_point: settings.entry_point.clone(),
            artifacts,
            environment: EnvironmentOverrides::with_extra(settings.extra_environment.clone()),
            packaged_model_uri: None,
        }
    }

    /// Point the model at an archive that bundles the inference scripts
    /// under `code/`.
    #[must_use]
    pub fn with_packaged_model(mut self, uri: impl Into<String>) -> Self {
        self.packaged_model_uri = Some(uri.into());
        self
    }

    /// Archive the container loads as its model data: the packaged archive
    /// when there is one, the catalog weights otherwise.
    #[must_use]
    pub fn model_data_uri(&self) -> &str {
        self.packaged_model_uri
            .as_deref()
            .unwrap_or(&self.artifacts.model_uri)
    }

    /// True once the scripts have been bundled into the model archive.
    #[must_use]
    pub fn is_packaged(&self) -> bool {
        self.packaged_model_uri.is_some()
    }

    /// Directory the serving toolkit loads the entry point from.
    #[must_use]
    pub fn submit_directory(&self) -> &str {
        if self.is_packaged() {
            PACKAGED_CODE_DIR
        } else {
            &self.artifacts.script_uri
        }
    }

    /// Catalog model identifier.
    #[must_use]
    pub fn model_id(&self) -> &ModelId {
        &self.model_id
    }

    /// Version selector used for artifact lookup.
    #[must_use]
    pub fn model_version(&self) -> &ModelVersion {
        &self.model_version
    }

    /// Name shared by the model, endpoint configuration and endpoint.
    #[must_use]
    pub fn endpoint_name(&self) -> &EndpointName {
        &self.endpoint_name
    }

    /// Compute SKU for the endpoint.
    #[must_use]
    pub fn instance_type(&self) -> &InstanceType {
        &self.instance_type
    }

    /// Number of instances behind the endpoint.
    #[must_use]
    pub fn instance_count(&self) -> u32 {
        self.instance_count
    }

    /// Execution role ARN.
    #[must_use]
    pub fn role_arn(&self) -> &str {
        &self.role_arn
    }

    /// Account that owns the execution role.
    #[must_use]
    pub fn account_id(&self) -> Option<&str> {
        crate::types::arn_account(&self.role_arn)
    }

    /// Region the endpoint is created in.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Entry-point script inside the script bundle.
    #[must_use]
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Resolved artifact URIs.
    #[must_use]
    pub fn artifacts(&self) -> &ArtifactSet {
        &self.artifacts
    }

    /// Environment overrides for the serving process.
    #[must_use]
    pub fn environment(&self) -> &EnvironmentOverrides {
        &self.environment
    }

    /// Full container environment: the overrides plus the variables the
    /// serving toolkit reads to locate and run the entry point.
    #[must_use]
    pub fn container_environment(&self) -> BTreeMap<String, String> {
        let mut env: BTreeMap<String, String> = self
            .environment
            .iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        env.insert("SAGEMAKER_PROGRAM".to_owned(), self.entry_point.clone());
        env.insert(
            "SAGEMAKER_SUBMIT_DIRECTORY".to_owned(),
            self.submit_directory().to_owned(),
        );
        env.insert(
            "SAGEMAKER_CONTAINER_LOG_LEVEL".to_owned(),
            CONTAINER_LOG_LEVEL.to_owned(),
        );
        env.insert("SAGEMAKER_REGION".to_owned(), self.region.clone());
        env
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn descriptor(extra: Vec<(&str, &str)>) -> ModelDescriptor {
        let mut settings = DeploymentSettings::default();
        settings.extra_environment = extra
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        let session = SessionContext {
            region: "us-west-2".to_owned(),
            role_arn: "arn:aws:iam::123456789012:role/Deployer".to_owned(),
        };
        ModelDescriptor::assemble(
            &settings,
            &session,
            EndpointName::parse("ep-1").unwrap(),
            ArtifactSet {
                image_uri: "123.dkr.ecr.us-west-2.amazonaws.com/inference:1".to_owned(),
                script_uri: "s3://bucket/sourcedir.tar.gz".to_owned(),
                model_uri: "s3://bucket/model.tar.gz".to_owned(),
            },
        )
    }

    #[test]
    fn default_overrides_hold_only_response_size() {
        let env = EnvironmentOverrides::new();
        assert_eq!(env.len(), 1);
        assert_eq!(env.get(MAX_RESPONSE_SIZE_KEY), Some("20000000"));
    }

    #[test]
    fn extra_overrides_cannot_replace_response_size() {
        let env = EnvironmentOverrides::with_extra([
            (MAX_RESPONSE_SIZE_KEY, "1"),
            ("TS_DEFAULT_WORKERS_PER_MODEL", "1"),
        ]);
        assert_eq!(env.len(), 2);
        assert_eq!(env.get(MAX_RESPONSE_SIZE_KEY), Some("20000000"));
        assert_eq!(env.get("TS_DEFAULT_WORKERS_PER_MODEL"), Some("1"));
    }

    #[test]
    fn assemble_copies_settings_and_session() {
        let d = descriptor(vec![]);
        assert_eq!(d.instance_type().as_str(), "ml.g4dn.2xlarge");
        assert_eq!(d.instance_count(), 1);
        assert_eq!(d.entry_point(), "inference.py");
        assert_eq!(d.region(), "us-west-2");
        assert_eq!(d.environment().len(), 1);
    }

    #[test]
    fn container_environment_points_at_script_bundle() {
        let env = descriptor(vec![("EXTRA", "x")]).container_environment();
        assert_eq!(env["SAGEMAKER_PROGRAM"], "inference.py");
        assert_eq!(env["SAGEMAKER_SUBMIT_DIRECTORY"], "s3://bucket/sourcedir.tar.gz");
        assert_eq!(env["SAGEMAKER_CONTAINER_LOG_LEVEL"], "20");
        assert_eq!(env["SAGEMAKER_REGION"], "us-west-2");
        assert_eq!(env[MAX_RESPONSE_SIZE_KEY], "20000000");
        assert_eq!(env["EXTRA"], "x");
    }

    #[test]
    fn packaged_model_loads_code_from_archive() {
        let d = descriptor(vec![])
            .with_packaged_model("s3://sagemaker-us-west-2-123456789012/ep-1/model.tar.gz");
        assert!(d.is_packaged());
        assert_eq!(
            d.model_data_uri(),
            "s3://sagemaker-us-west-2-123456789012/ep-1/model.tar.gz"
        );
        let env = d.container_environment();
        assert_eq!(env["SAGEMAKER_SUBMIT_DIRECTORY"], PACKAGED_CODE_DIR);
        assert_eq!(env["SAGEMAKER_PROGRAM"], "inference.py");
        assert_eq!(d.artifacts().model_uri, "s3://bucket/model.tar.gz");
    }

    #[test]
    fn unpackaged_model_uses_catalog_weights() {
        let d = descriptor(vec![]);
        assert!(!d.is_packaged());
        assert_eq!(d.model_data_uri(), "s3://bucket/model.tar.gz");
    }

    #[test]
    fn serializes_for_dry_runs() {
        let json = serde_json::to_value(descriptor(vec![])).unwrap();
        assert_eq!(json["endpoint_name"], "ep-1");
        assert_eq!(json["environment"][MAX_RESPONSE_SIZE_KEY], "20000000");
        assert_eq!(json["artifacts"]["model_uri"], "s3://bucket/model.tar.gz");
        assert!(json.get("packaged_model_uri").is_none());
    }
}
