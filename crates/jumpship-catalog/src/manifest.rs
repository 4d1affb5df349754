//! Catalog manifest: the index of every model version and its spec document.

use serde::Deserialize;

use jumpship_core::{ModelId, ModelVersion};

use crate::error::{CatalogError, CatalogResult};
use crate::version::VersionSelector;

/// One `(model id, version)` row of the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManifestEntry {
    /// Catalog model identifier.
    pub model_id: String,
    /// Model version.
    pub version: String,
    /// Oldest client version able to read the spec.
    #[serde(default)]
    pub min_version: Option<String>,
    /// Key of the spec document, relative to the catalog root.
    pub spec_key: String,
}

/// The parsed manifest.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Build a manifest from entries.
    #[must_use]
    pub fn new(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the manifest lists no models.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the entry for `model_id` that best matches `version`.
    pub fn select(&self, model_id: &ModelId, version: &ModelVersion) -> CatalogResult<&ManifestEntry> {
        let candidates: Vec<&ManifestEntry> = self
            .entries
            .iter()
            .filter(|e| e.model_id == model_id.as_str())
            .collect();

        if candidates.is_empty() {
            return Err(CatalogError::ModelNotFound {
                model_id: model_id.to_string(),
            });
        }

        VersionSelector::new(version)
            .select(candidates.iter().map(|e| e.version.as_str()))
            .map(|i| candidates[i])
            .ok_or_else(|| CatalogError::VersionNotFound {
                model_id: model_id.to_string(),
                version: version.to_string(),
                available: candidates
                    .iter()
                    .map(|e| e.version.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}
