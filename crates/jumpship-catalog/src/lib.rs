//! Jumpship catalog
//!
//! Looks up the container image, inference scripts and model weights of a
//! catalog model. The catalog is a bucket (or a local mirror of one) holding a
//! manifest of every `(model id, version)` and one spec document per version:
//!
//! ```text
//! models_manifest.json          [{model_id, version, spec_key}, ...]
//! <spec_key>                    {hosting_artifact_key, hosting_script_key,
//!                                hosting_instance_type_variants, ...}
//! ```
//!
//! [`CatalogResolver`] implements [`jumpship_core::ArtifactResolver`] on top
//! of these documents. [`ModelRepacker`] implements
//! [`jumpship_core::ModelPackager`] by merging the resolved weights and
//! scripts into one archive.

#![forbid(unsafe_code)]

pub mod error;
pub mod manifest;
pub mod repack;
pub mod resolver;
pub mod source;
pub mod spec;
pub mod version;

pub use error::{CatalogError, CatalogResult};
pub use manifest::{Manifest, ManifestEntry};
pub use repack::{default_output_bucket, repack_archives, BucketAccess, ModelRepacker};
pub use resolver::CatalogResolver;
pub use source::{default_bucket, s3_store, CatalogSource};
pub use spec::{InstanceTypeVariants, ModelSpec, VariantProperties};
pub use version::{CatalogVersion, VersionSelector};
