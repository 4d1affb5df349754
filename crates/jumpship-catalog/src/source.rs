//! Where catalog documents are read from.

use std::path::Path;
use std::sync::Arc;

use object_store::aws::{AmazonS3, AmazonS3Builder, AwsCredentialProvider};
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use serde::de::DeserializeOwned;
use tracing::debug;

use jumpship_core::config::CatalogConfig;

use crate::error::{CatalogError, CatalogResult};

/// Name of the public catalog bucket for a region.
#[must_use]
pub fn default_bucket(region: &str) -> String {
    format!("jumpstart-cache-prod-{region}")
}

/// S3 client for one bucket.
///
/// Without `credentials` the client falls back to the `AWS_*` environment.
pub fn s3_store(
    bucket: &str,
    region: &str,
    credentials: Option<AwsCredentialProvider>,
) -> object_store::Result<AmazonS3> {
    let mut builder = AmazonS3Builder::from_env()
        .with_bucket_name(bucket)
        .with_region(region);
    if let Some(credentials) = credentials {
        builder = builder.with_credentials(credentials);
    }
    builder.build()
}

/// A readable catalog root plus the bucket artifact URIs point into.
#[derive(Clone)]
pub struct CatalogSource {
    store: Arc<dyn ObjectStore>,
    location: String,
    artifact_bucket: String,
}

impl std::fmt::Debug for CatalogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogSource")
            .field("location", &self.location)
            .field("artifact_bucket", &self.artifact_bucket)
            .finish_non_exhaustive()
    }
}

impl CatalogSource {
    /// Open the catalog configured for `region`.
    ///
    /// Without a configured URL this is the region's public catalog bucket.
    /// `credentials` sign S3 requests; local mirrors ignore them.
    pub fn for_region(
        region: &str,
        config: &CatalogConfig,
        credentials: Option<AwsCredentialProvider>,
    ) -> CatalogResult<Self> {
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| format!("s3://{}", default_bucket(region)));
        let artifact_bucket = config
            .artifact_bucket
            .clone()
            .unwrap_or_else(|| default_bucket(region));

        if let Some(bucket) = url.strip_prefix("s3://") {
            let bucket = bucket.trim_end_matches('/');
            if bucket.is_empty() || bucket.contains('/') {
                return Err(CatalogError::InvalidUrl {
                    url,
                    reason: "expected s3://<bucket> without a key prefix".to_owned(),
                });
            }
            let store = s3_store(bucket, region, credentials).map_err(|source| CatalogError::Open {
                    location: url.clone(),
                    source,
                })?;
            debug!(bucket = %bucket, region = %region, "opened catalog bucket");
            return Ok(Self {
                store: Arc::new(store),
                location: url,
                artifact_bucket,
            });
        }

        if let Some(path) = url.strip_prefix("file://") {
            return Self::local(path, artifact_bucket);
        }

        Err(CatalogError::InvalidUrl {
            url,
            reason: "unsupported scheme, expected s3:// or file://".to_owned(),
        })
    }

    /// Read a catalog mirrored to a local directory.
    pub fn local(root: impl AsRef<Path>, artifact_bucket: impl Into<String>) -> CatalogResult<Self> {
        let root = root.as_ref();
        let location = root.display().to_string();
        let store = LocalFileSystem::new_with_prefix(root).map_err(|source| CatalogError::Open {
            location: location.clone(),
            source,
        })?;
        debug!(path = %location, "opened local catalog mirror");
        Ok(Self {
            store: Arc::new(store),
            location,
            artifact_bucket: artifact_bucket.into(),
        })
    }

    /// Where documents are read from.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Bucket artifact keys are relative to.
    #[must_use]
    pub fn artifact_bucket(&self) -> &str {
        &self.artifact_bucket
    }

    /// `s3://` URI of an artifact key.
    #[must_use]
    pub fn s3_uri(&self, key: &str) -> String {
        format!("s3://{}/{}", self.artifact_bucket, key.trim_start_matches('/'))
    }

    /// Fetch and parse a JSON document.
    pub async fn fetch_json<T: DeserializeOwned>(&self, key: &str) -> CatalogResult<T> {
        let path = ObjectPath::from(key);
        let fetch_error = |source: object_store::Error| CatalogError::Fetch {
            key: key.to_owned(),
            source,
        };

        let bytes = self
            .store
            .get(&path)
            .await
            .map_err(fetch_error)?
            .bytes()
            .await
            .map_err(fetch_error)?;

        debug!(key = %key, size = bytes.len(), "fetched catalog document");

        serde_json::from_slice(&bytes).map_err(|source| CatalogError::Parse {
            key: key.to_owned(),
            source,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn config(url: Option<&str>) -> CatalogConfig {
        CatalogConfig {
            url: url.map(str::to_owned),
            ..CatalogConfig::default()
        }
    }

    #[test]
    fn default_bucket_is_regional() {
        assert_eq!(default_bucket("us-west-2"), "jumpstart-cache-prod-us-west-2");
    }

    #[rstest]
    #[case("http://example.com/catalog")]
    #[case("s3://")]
    #[case("s3://bucket/prefix")]
    fn rejects_unusable_urls(#[case] url: &str) {
        let err = CatalogSource::for_region("us-west-2", &config(Some(url)), None).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidUrl { .. }), "{err}");
    }

    #[test]
    fn default_source_targets_public_bucket() {
        let source = CatalogSource::for_region("eu-west-1", &config(None), None).unwrap();
        assert_eq!(source.location(), "s3://jumpstart-cache-prod-eu-west-1");
        assert_eq!(
            source.s3_uri("a/b.tar.gz"),
            "s3://jumpstart-cache-prod-eu-west-1/a/b.tar.gz"
        );
    }

    #[test]
    fn s3_source_accepts_explicit_credentials() {
        let credentials: AwsCredentialProvider =
            Arc::new(object_store::StaticCredentialProvider::new(
                object_store::aws::AwsCredential {
                    key_id: "AKIDEXAMPLE".to_owned(),
                    secret_key: "secret".to_owned(),
                    token: Some("session".to_owned()),
                },
            ));
        let source =
            CatalogSource::for_region("us-west-2", &config(None), Some(credentials)).unwrap();
        assert_eq!(source.location(), "s3://jumpstart-cache-prod-us-west-2");
    }

    #[test]
    fn file_url_uses_configured_artifact_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("file://{}", dir.path().display());
        let cfg = CatalogConfig {
            url: Some(url),
            artifact_bucket: Some("my-mirror".to_owned()),
            ..CatalogConfig::default()
        };
        let source = CatalogSource::for_region("us-east-1", &cfg, None).unwrap();
        assert_eq!(source.artifact_bucket(), "my-mirror");
        assert_eq!(source.s3_uri("/k"), "s3://my-mirror/k");
    }

    #[test]
    fn missing_local_directory_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = CatalogSource::local(&missing, "b").unwrap_err();
        assert!(matches!(err, CatalogError::Open { .. }));
    }

    #[tokio::test]
    async fn fetch_reports_missing_and_malformed_documents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), b"{not json").unwrap();
        let source = CatalogSource::local(dir.path(), "b").unwrap();

        let missing = source
            .fetch_json::<serde_json::Value>("absent.json")
            .await
            .unwrap_err();
        assert!(matches!(missing, CatalogError::Fetch { .. }));

        let bad = source
            .fetch_json::<serde_json::Value>("bad.json")
            .await
            .unwrap_err();
        assert!(matches!(bad, CatalogError::Parse { .. }));
    }
}
