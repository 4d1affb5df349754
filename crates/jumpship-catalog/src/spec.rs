//! Per-version model spec documents.
//!
//! Only the fields needed to locate artifacts are modelled; everything else
//! in a spec is ignored.

use std::collections::HashMap;

use serde::Deserialize;

use jumpship_core::{ArtifactScope, InstanceType};

use crate::error::{CatalogError, CatalogResult};

const IMAGE_URI_PROPERTY: &str = "image_uri";

/// A model spec document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelSpec {
    /// Catalog model identifier.
    pub model_id: String,
    /// Model version.
    pub version: String,
    /// Weights archive for hosting.
    #[serde(default)]
    pub hosting_artifact_key: Option<String>,
    /// Script bundle for hosting.
    #[serde(default)]
    pub hosting_script_key: Option<String>,
    /// Weights archive for training.
    #[serde(default)]
    pub training_artifact_key: Option<String>,
    /// Script bundle for training.
    #[serde(default)]
    pub training_script_key: Option<String>,
    /// Instance types an endpoint may use. Empty means unrestricted.
    #[serde(default)]
    pub supported_inference_instance_types: Vec<String>,
    /// Instance types a training job may use. Empty means unrestricted.
    #[serde(default)]
    pub supported_training_instance_types: Vec<String>,
    /// Images per instance type for hosting.
    #[serde(default)]
    pub hosting_instance_type_variants: Option<InstanceTypeVariants>,
    /// Images per instance type for training.
    #[serde(default)]
    pub training_instance_type_variants: Option<InstanceTypeVariants>,
}

/// Instance-type specific properties with per-region aliases.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstanceTypeVariants {
    /// `region -> alias -> value`.
    #[serde(default)]
    pub regional_aliases: HashMap<String, HashMap<String, String>>,
    /// Keyed by instance type, family, or accelerator class.
    #[serde(default)]
    pub variants: HashMap<String, VariantProperties>,
}

/// Properties of one variant.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VariantProperties {
    /// Values that may be `$alias` references into `regional_aliases`.
    #[serde(default)]
    pub regional_properties: HashMap<String, String>,
    /// Region-independent values.
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
}

impl ModelSpec {
    /// Key of the weights archive for `scope`.
    pub fn artifact_key(&self, scope: ArtifactScope) -> CatalogResult<&str> {
        let (key, field) = match scope {
            ArtifactScope::Inference => (&self.hosting_artifact_key, "hosting_artifact_key"),
            ArtifactScope::Training => (&self.training_artifact_key, "training_artifact_key"),
        };
        self.required(key, field)
    }

    /// Key of the script bundle for `scope`.
    pub fn script_key(&self, scope: ArtifactScope) -> CatalogResult<&str> {
        let (key, field) = match scope {
            ArtifactScope::Inference => (&self.hosting_script_key, "hosting_script_key"),
            ArtifactScope::Training => (&self.training_script_key, "training_script_key"),
        };
        self.required(key, field)
    }

    /// Fail if the model restricts instance types and `instance_type` is not allowed.
    pub fn check_instance_type(
        &self,
        scope: ArtifactScope,
        instance_type: &InstanceType,
    ) -> CatalogResult<()> {
        let supported = match scope {
            ArtifactScope::Inference => &self.supported_inference_instance_types,
            ArtifactScope::Training => &self.supported_training_instance_types,
        };
        if supported.is_empty() || supported.iter().any(|t| t == instance_type.as_str()) {
            return Ok(());
        }
        Err(CatalogError::UnsupportedInstanceType {
            model_id: self.model_id.clone(),
            instance_type: instance_type.to_string(),
            supported: supported.join(", "),
        })
    }

    /// Container image for `instance_type` in `region`.
    ///
    /// Variants are tried by full instance type, then family, then
    /// accelerator class.
    pub fn image_uri(
        &self,
        scope: ArtifactScope,
        instance_type: &InstanceType,
        region: &str,
    ) -> CatalogResult<String> {
        let not_found = || CatalogError::ImageNotFound {
            model_id: self.model_id.clone(),
            scope: scope.as_str(),
            instance_type: instance_type.to_string(),
            region: region.to_owned(),
        };

        let variants = match scope {
            ArtifactScope::Inference => self.hosting_instance_type_variants.as_ref(),
            ArtifactScope::Training => self.training_instance_type_variants.as_ref(),
        }
        .ok_or_else(not_found)?;

        let candidates = [
            instance_type.as_str(),
            instance_type.family(),
            instance_type.accelerator_class(),
        ];

        for key in candidates {
            let Some(variant) = variants.variants.get(key) else {
                continue;
            };
            if let Some(value) = variant.regional_properties.get(IMAGE_URI_PROPERTY) {
                return variants.dereference(value, region);
            }
            if let Some(serde_json::Value::String(uri)) =
                variant.properties.get(IMAGE_URI_PROPERTY)
            {
                return Ok(uri.clone());
            }
        }

        Err(not_found())
    }

    fn required<'a>(&self, value: &'a Option<String>, field: &'static str) -> CatalogResult<&'a str> {
        value
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| CatalogError::MissingField {
                model_id: self.model_id.clone(),
                field,
            })
    }
}

impl InstanceTypeVariants {
    /// Resolve a `$alias` reference for `region`; other values pass through.
    pub fn dereference(&self, value: &str, region: &str) -> CatalogResult<String> {
        let Some(alias) = value.strip_prefix('$') else {
            return Ok(value.to_owned());
        };
        self.regional_aliases
            .get(region)
            .and_then(|aliases| aliases.get(alias))
            .cloned()
            .ok_or_else(|| CatalogError::AliasNotFound {
                alias: alias.to_owned(),
                region: region.to_owned(),
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rstest::rstest;

    const SPEC: &str = r#"{
        "model_id": "model-txt2img-stabilityai-stable-diffusion-v1-4",
        "version": "2.0.0",
        "hosting_ecr_specs": {"framework": "huggingface", "framework_version": "1.10.2", "py_version": "py38"},
        "hosting_artifact_key": "stabilityai-infer/infer-model-txt2img-stabilityai-stable-diffusion-v1-4.tar.gz",
        "hosting_script_key": "source-directory-tarballs/stabilityai/inference/txt2img/v1.2.0/sourcedir.tar.gz",
        "supported_inference_instance_types": ["ml.g4dn.2xlarge", "ml.g5.2xlarge", "ml.p3.2xlarge", "ml.m5.4xlarge"],
        "hosting_instance_type_variants": {
            "regional_aliases": {
                "us-west-2": {
                    "gpu_image": "763104351884.dkr.ecr.us-west-2.amazonaws.com/huggingface-pytorch-inference:1.10.2-transformers4.17.0-gpu-py38-cu113-ubuntu20.04",
                    "g5_image": "763104351884.dkr.ecr.us-west-2.amazonaws.com/djl-inference:0.21.0-deepspeed0.8.3-cu117"
                }
            },
            "variants": {
                "gpu": {"regional_properties": {"image_uri": "$gpu_image"}},
                "g5": {"regional_properties": {"image_uri": "$g5_image"}},
                "m5": {"properties": {"image_uri": "public.ecr.aws/cpu/inference:1", "artifact_key": {"nested": true}}}
            }
        }
    }"#;

    fn spec() -> ModelSpec {
        serde_json::from_str(SPEC).unwrap()
    }

    fn it(raw: &str) -> InstanceType {
        InstanceType::new(raw).unwrap()
    }

    #[test]
    fn keys_for_inference() {
        let spec = spec();
        assert!(spec
            .artifact_key(ArtifactScope::Inference)
            .unwrap()
            .ends_with("stable-diffusion-v1-4.tar.gz"));
        assert!(spec
            .script_key(ArtifactScope::Inference)
            .unwrap()
            .ends_with("sourcedir.tar.gz"));
    }

    #[test]
    fn training_keys_missing() {
        let err = spec().artifact_key(ArtifactScope::Training).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::MissingField { field: "training_artifact_key", .. }
        ));
    }

    #[rstest]
    #[case("ml.g4dn.2xlarge", "huggingface-pytorch-inference")]
    #[case("ml.p3.2xlarge", "huggingface-pytorch-inference")]
    #[case("ml.g5.2xlarge", "djl-inference")]
    #[case("ml.m5.4xlarge", "public.ecr.aws/cpu/inference:1")]
    fn image_by_variant(#[case] instance_type: &str, #[case] expected: &str) {
        let uri = spec()
            .image_uri(ArtifactScope::Inference, &it(instance_type), "us-west-2")
            .unwrap();
        assert!(uri.contains(expected), "{uri}");
    }

    #[test]
    fn alias_missing_for_region() {
        let err = spec()
            .image_uri(ArtifactScope::Inference, &it("ml.g4dn.2xlarge"), "eu-west-1")
            .unwrap_err();
        assert!(matches!(err, CatalogError::AliasNotFound { .. }));
    }

    #[test]
    fn no_variant_for_cpu_family() {
        let err = spec()
            .image_uri(ArtifactScope::Inference, &it("ml.c5.xlarge"), "us-west-2")
            .unwrap_err();
        assert!(matches!(err, CatalogError::ImageNotFound { .. }));
    }

    #[test]
    fn instance_type_restrictions() {
        let spec = spec();
        assert!(spec
            .check_instance_type(ArtifactScope::Inference, &it("ml.g4dn.2xlarge"))
            .is_ok());
        assert!(matches!(
            spec.check_instance_type(ArtifactScope::Inference, &it("ml.c5.xlarge")),
            Err(CatalogError::UnsupportedInstanceType { .. })
        ));
        assert!(spec
            .check_instance_type(ArtifactScope::Training, &it("ml.c5.xlarge"))
            .is_ok());
    }
}
