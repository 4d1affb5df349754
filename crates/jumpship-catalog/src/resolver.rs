//! [`ArtifactResolver`] backed by the model catalog.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use object_store::aws::AwsCredentialProvider;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use jumpship_core::config::CatalogConfig;
use jumpship_core::{
    ArtifactKind, ArtifactRequest, ArtifactResolver, DeployError, DeployResult, InstanceType,
};

use crate::error::{CatalogError, CatalogResult};
use crate::manifest::Manifest;
use crate::source::CatalogSource;
use crate::spec::ModelSpec;

/// One region's catalog with its parsed documents cached.
#[derive(Debug)]
struct RegionCatalog {
    source: CatalogSource,
    manifest_key: String,
    manifest: OnceCell<Arc<Manifest>>,
    specs: RwLock<HashMap<String, Arc<ModelSpec>>>,
}

impl RegionCatalog {
    fn new(source: CatalogSource, manifest_key: String) -> Self {
        Self {
            source,
            manifest_key,
            manifest: OnceCell::new(),
            specs: RwLock::new(HashMap::new()),
        }
    }

    async fn manifest(&self) -> CatalogResult<Arc<Manifest>> {
        self.manifest
            .get_or_try_init(|| async {
                let manifest: Manifest = self.source.fetch_json(&self.manifest_key).await?;
                info!(
                    location = %self.source.location(),
                    models = manifest.len(),
                    "loaded model catalog manifest"
                );
                Ok::<_, CatalogError>(Arc::new(manifest))
            })
            .await
            .cloned()
    }

    async fn spec(&self, key: &str) -> CatalogResult<Arc<ModelSpec>> {
        if let Some(spec) = self.cached_spec(key) {
            return Ok(spec);
        }
        let spec: Arc<ModelSpec> = Arc::new(self.source.fetch_json(key).await?);
        if let Ok(mut specs) = self.specs.write() {
            specs.insert(key.to_owned(), spec.clone());
        }
        Ok(spec)
    }

    fn cached_spec(&self, key: &str) -> Option<Arc<ModelSpec>> {
        self.specs.read().ok()?.get(key).cloned()
    }
}

enum Catalogs {
    /// Opened on first use for each requested region.
    PerRegion {
        config: CatalogConfig,
        credentials: Option<AwsCredentialProvider>,
        opened: RwLock<HashMap<String, Arc<RegionCatalog>>>,
    },
    /// A single catalog regardless of region.
    Fixed(Arc<RegionCatalog>),
}

/// Resolves artifact URIs from the manifest and spec documents of the catalog.
///
/// Documents are fetched once per resolver and shared across lookups, so the
/// three lookups of a deployment cost one manifest and one spec fetch.
pub struct CatalogResolver {
    catalogs: Catalogs,
}

impl CatalogResolver {
    /// Resolver that opens the configured catalog for each request's region.
    #[must_use]
    pub fn new(config: CatalogConfig) -> Self {
        Self {
            catalogs: Catalogs::PerRegion {
                config,
                credentials: None,
                opened: RwLock::new(HashMap::new()),
            },
        }
    }

    /// Sign S3 catalog reads with `credentials` instead of the `AWS_*`
    /// environment.
    #[must_use]
    pub fn with_credentials(mut self, provider: AwsCredentialProvider) -> Self {
        if let Catalogs::PerRegion { credentials, .. } = &mut self.catalogs {
            *credentials = Some(provider);
        }
        self
    }

    /// Resolver reading from one source for every region.
    #[must_use]
    pub fn with_source(source: CatalogSource, manifest_key: impl Into<String>) -> Self {
        Self {
            catalogs: Catalogs::Fixed(Arc::new(RegionCatalog::new(source, manifest_key.into()))),
        }
    }

    fn catalog(
        &self,
        kind: ArtifactKind,
        request: &ArtifactRequest,
    ) -> DeployResult<Arc<RegionCatalog>> {
        let (config, credentials, opened) = match &self.catalogs {
            Catalogs::Fixed(catalog) => return Ok(catalog.clone()),
            Catalogs::PerRegion {
                config,
                credentials,
                opened,
            } => (config, credentials, opened),
        };
        let region = request.region.as_str();

        if let Some(catalog) = opened
            .read()
            .map_err(|_| DeployError::internal("lock poisoned"))?
            .get(region)
        {
            return Ok(catalog.clone());
        }

        let source = CatalogSource::for_region(region, config, credentials.clone())
            .map_err(|e| e.into_deploy_error(kind, request))?;
        let catalog = Arc::new(RegionCatalog::new(source, config.manifest_key.clone()));

        let mut opened = opened
            .write()
            .map_err(|_| DeployError::internal("lock poisoned"))?;
        Ok(opened.entry(region.to_owned()).or_insert(catalog).clone())
    }

    async fn spec_for(
        &self,
        kind: ArtifactKind,
        request: &ArtifactRequest,
    ) -> DeployResult<(Arc<RegionCatalog>, Arc<ModelSpec>)> {
        let catalog = self.catalog(kind, request)?;
        let found: CatalogResult<Arc<ModelSpec>> = async {
            let manifest = catalog.manifest().await?;
            let entry = manifest.select(&request.model_id, &request.version)?;
            debug!(
                model_id = %request.model_id,
                requested = %request.version,
                version = %entry.version,
                spec_key = %entry.spec_key,
                "selected catalog entry"
            );
            catalog.spec(&entry.spec_key).await
        }
        .await;

        found
            .map(|spec| (catalog, spec))
            .map_err(|e| e.into_deploy_error(kind, request))
    }
}

#[async_trait]
impl ArtifactResolver for CatalogResolver {
    async fn image_uri(
        &self,
        request: &ArtifactRequest,
        instance_type: &InstanceType,
    ) -> DeployResult<String> {
        let kind = ArtifactKind::Image;
        let (_, spec) = self.spec_for(kind, request).await?;
        spec.check_instance_type(request.scope, instance_type)
            .and_then(|()| spec.image_uri(request.scope, instance_type, &request.region))
            .map_err(|e| e.into_deploy_error(kind, request))
    }

    async fn script_uri(&self, request: &ArtifactRequest) -> DeployResult<String> {
        let kind = ArtifactKind::Script;
        let (catalog, spec) = self.spec_for(kind, request).await?;
        spec.script_key(request.scope)
            .map(|key| catalog.source.s3_uri(key))
            .map_err(|e| e.into_deploy_error(kind, request))
    }

    async fn model_uri(&self, request: &ArtifactRequest) -> DeployResult<String> {
        let kind = ArtifactKind::Model;
        let (catalog, spec) = self.spec_for(kind, request).await?;
        spec.artifact_key(request.scope)
            .map(|key| catalog.source.s3_uri(key))
            .map_err(|e| e.into_deploy_error(kind, request))
    }
}
