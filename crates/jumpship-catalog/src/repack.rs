//! Bundling inference scripts into the model archive.
//!
//! The serving container loads its entry point from `/opt/ml/model/code`, which
//! is the `code/` directory of the model archive. The catalog ships weights and
//! scripts as separate tarballs, so before deploying they are merged into one
//! `model.tar.gz` and uploaded to the account's SageMaker bucket:
//!
//! ```text
//! s3://sagemaker-{region}-{account}/{endpoint}/model.tar.gz
//! ├── model_index.json, unet/, vae/, ...    (weights, unchanged)
//! └── code/
//!     ├── inference.py                      (script bundle)
//!     └── requirements.txt
//! ```

use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use object_store::aws::AwsCredentialProvider;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use tokio::task::spawn_blocking;
use tracing::{debug, info};

use jumpship_core::{DeployError, DeployResult, ModelDescriptor, ModelPackager};

use crate::error::{CatalogError, CatalogResult};
use crate::source::s3_store;

/// Directory of the archive the scripts are placed in.
const CODE_DIR: &str = "code";

/// File name of the packaged archive.
const ARCHIVE_NAME: &str = "model.tar.gz";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Default upload bucket for a region and account.
#[must_use]
pub fn default_output_bucket(region: &str, account: &str) -> String {
    format!("sagemaker-{region}-{account}")
}

/// How buckets named in `s3://` URIs are reached.
#[derive(Clone)]
pub enum BucketAccess {
    /// Real S3 in one region.
    S3 {
        /// Region of the buckets.
        region: String,
        /// Signing credentials; `None` reads the `AWS_*` environment.
        credentials: Option<AwsCredentialProvider>,
    },
    /// A directory holding one subdirectory per bucket.
    Local(Arc<LocalFileSystem>),
}

impl std::fmt::Debug for BucketAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::S3 { region, .. } => f.debug_struct("S3").field("region", region).finish(),
            Self::Local(_) => f.write_str("Local"),
        }
    }
}

impl BucketAccess {
    /// S3 in `region`.
    #[must_use]
    pub fn s3(region: impl Into<String>, credentials: Option<AwsCredentialProvider>) -> Self {
        Self::S3 {
            region: region.into(),
            credentials,
        }
    }

    /// Buckets mirrored as subdirectories of `root`.
    pub fn local(root: impl AsRef<Path>) -> CatalogResult<Self> {
        let root = root.as_ref();
        let store = LocalFileSystem::new_with_prefix(root).map_err(|source| CatalogError::Open {
            location: root.display().to_string(),
            source,
        })?;
        Ok(Self::Local(Arc::new(store)))
    }

    fn open(&self, bucket: &str, key: &str) -> CatalogResult<(Arc<dyn ObjectStore>, ObjectPath)> {
        match self {
            Self::S3 {
                region,
                credentials,
            } => {
                let store = s3_store(bucket, region, credentials.clone()).map_err(|source| {
                    CatalogError::Open {
                        location: format!("s3://{bucket}"),
                        source,
                    }
                })?;
                Ok((Arc::new(store), ObjectPath::from(key)))
            }
            Self::Local(store) => Ok((store.clone(), ObjectPath::from(format!("{bucket}/{key}")))),
        }
    }

    async fn get(&self, uri: &str) -> CatalogResult<Vec<u8>> {
        let (bucket, key) = split_s3_uri(uri)?;
        let (store, path) = self.open(bucket, key)?;
        let fetch_error = |source: object_store::Error| CatalogError::Fetch {
            key: uri.to_owned(),
            source,
        };
        let bytes = store
            .get(&path)
            .await
            .map_err(fetch_error)?
            .bytes()
            .await
            .map_err(fetch_error)?;
        debug!(uri = %uri, size = bytes.len(), "downloaded archive");
        Ok(bytes.to_vec())
    }

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> CatalogResult<String> {
        let (store, path) = self.open(bucket, key)?;
        let size = body.len();
        store
            .put(&path, PutPayload::from(body))
            .await
            .map_err(|source| CatalogError::Upload {
                key: key.to_owned(),
                source,
            })?;
        let uri = format!("s3://{bucket}/{key}");
        debug!(uri = %uri, size, "uploaded archive");
        Ok(uri)
    }
}

/// [`ModelPackager`] that merges the catalog weights and scripts into one
/// archive and uploads it.
#[derive(Debug, Clone)]
pub struct ModelRepacker {
    access: BucketAccess,
    bucket: Option<String>,
}

impl ModelRepacker {
    /// Repacker uploading to each account's default SageMaker bucket.
    #[must_use]
    pub fn new(access: BucketAccess) -> Self {
        Self {
            access,
            bucket: None,
        }
    }

    /// Upload to `bucket` instead of `sagemaker-{region}-{account}`.
    #[must_use]
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Build and upload the packaged archive, returning its URI.
    pub async fn repack(&self, descriptor: &ModelDescriptor) -> CatalogResult<String> {
        let bucket = match &self.bucket {
            Some(bucket) => bucket.clone(),
            None => {
                let account =
                    descriptor
                        .account_id()
                        .ok_or_else(|| CatalogError::MissingAccount {
                            role_arn: descriptor.role_arn().to_owned(),
                        })?;
                default_output_bucket(descriptor.region(), account)
            }
        };
        let key = format!("{}/{ARCHIVE_NAME}", descriptor.endpoint_name());

        let model = self.access.get(descriptor.artifacts().model_uri.as_str()).await?;
        let scripts = self.access.get(descriptor.artifacts().script_uri.as_str()).await?;
        let entry_point = descriptor.entry_point().to_owned();

        let packaged = spawn_blocking(move || repack_archives(&model, &scripts, &entry_point))
            .await
            .map_err(std::io::Error::from)??;

        let uri = self.access.put(&bucket, &key, packaged).await?;
        info!(
            endpoint = %descriptor.endpoint_name(),
            uri = %uri,
            "packaged model archive"
        );
        Ok(uri)
    }
}

#[async_trait]
impl ModelPackager for ModelRepacker {
    async fn package(&self, descriptor: &ModelDescriptor) -> DeployResult<String> {
        self.repack(descriptor)
            .await
            .map_err(|e| DeployError::packaging(descriptor.endpoint_name().as_str(), e))
    }
}

/// Split `s3://bucket/key` into bucket and key.
pub fn split_s3_uri(uri: &str) -> CatalogResult<(&str, &str)> {
    uri.strip_prefix("s3://")
        .and_then(|rest| rest.split_once('/'))
        .filter(|(bucket, key)| !bucket.is_empty() && !key.is_empty())
        .ok_or_else(|| CatalogError::InvalidUri {
            uri: uri.to_owned(),
        })
}

/// Merge a weights archive and a script archive into a gzipped tarball.
///
/// Weights keep their paths, except anything already under `code/`, which is
/// replaced by the script bundle. Either input may be gzipped or plain tar.
pub fn repack_archives(model: &[u8], scripts: &[u8], entry_point: &str) -> CatalogResult<Vec<u8>> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

    let weights = append_entries(model, &mut builder, |path| {
        (!path.starts_with(CODE_DIR)).then(|| path.to_path_buf())
    })?;
    let code = append_entries(scripts, &mut builder, |path| {
        Some(Path::new(CODE_DIR).join(path))
    })?;

    let entry = Path::new(CODE_DIR).join(entry_point);
    if !code.iter().any(|path| *path == entry) {
        return Err(CatalogError::MissingEntryPoint {
            entry_point: entry_point.to_owned(),
        });
    }

    let packaged = builder.into_inner()?.finish()?;
    debug!(
        weights = weights.len(),
        scripts = code.len(),
        size = packaged.len(),
        "repacked model archive"
    );
    Ok(packaged)
}

/// Copy every entry of `archive` into `builder` under the path `rename` gives
/// it, skipping entries it maps to `None`. Returns the paths written.
fn append_entries<W: Write>(
    archive: &[u8],
    builder: &mut tar::Builder<W>,
    rename: impl Fn(&Path) -> Option<PathBuf>,
) -> std::io::Result<Vec<PathBuf>> {
    let reader: Box<dyn Read + '_> = if archive.starts_with(&GZIP_MAGIC) {
        Box::new(GzDecoder::new(archive))
    } else {
        Box::new(archive)
    };

    let mut written = Vec::new();
    for entry in tar::Archive::new(reader).entries()? {
        let mut entry = entry?;
        let path = normalize(&entry.path()?);
        if path.as_os_str().is_empty() {
            continue;
        }
        let Some(target) = rename(&path) else {
            continue;
        };
        let mut header = entry.header().clone();
        builder.append_data(&mut header, &target, &mut entry)?;
        written.push(target);
    }
    Ok(written)
}

/// Drop `.` components so `./code/x` and `code/x` compare equal.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn tarball(files: &[(&str, &str)], gzip: bool) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, body) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, path, body.as_bytes())
                .unwrap();
        }
        let plain = builder.into_inner().unwrap();
        if !gzip {
            return plain;
        }
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&plain).unwrap();
        encoder.finish().unwrap()
    }

    fn contents(packaged: &[u8]) -> Vec<(String, String)> {
        let mut archive = tar::Archive::new(GzDecoder::new(packaged));
        let mut files: Vec<(String, String)> = archive
            .entries()
            .unwrap()
            .map(|entry| {
                let mut entry = entry.unwrap();
                let path = entry.path().unwrap().display().to_string();
                let mut body = String::new();
                entry.read_to_string(&mut body).unwrap();
                (path, body)
            })
            .collect();
        files.sort();
        files
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn scripts_land_under_code(#[case] gzip: bool) {
        let model = tarball(&[("model_index.json", "{}"), ("unet/weights.bin", "w")], gzip);
        let scripts = tarball(
            &[("./inference.py", "def model_fn(): ..."), ("./requirements.txt", "diffusers")],
            true,
        );

        let packaged = repack_archives(&model, &scripts, "inference.py").unwrap();

        assert_eq!(
            contents(&packaged),
            vec![
                ("code/inference.py".to_owned(), "def model_fn(): ...".to_owned()),
                ("code/requirements.txt".to_owned(), "diffusers".to_owned()),
                ("model_index.json".to_owned(), "{}".to_owned()),
                ("unet/weights.bin".to_owned(), "w".to_owned()),
            ]
        );
    }

    #[test]
    fn stale_code_in_weights_is_replaced() {
        let model = tarball(&[("code/old.py", "old"), ("model.ckpt", "w")], true);
        let scripts = tarball(&[("inference.py", "new")], true);

        let packaged = repack_archives(&model, &scripts, "inference.py").unwrap();

        let paths: Vec<String> = contents(&packaged).into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["code/inference.py", "model.ckpt"]);
    }

    #[test]
    fn missing_entry_point_is_an_error() {
        let model = tarball(&[("model.ckpt", "w")], true);
        let scripts = tarball(&[("serve.py", "")], true);
        let err = repack_archives(&model, &scripts, "inference.py").unwrap_err();
        assert!(matches!(err, CatalogError::MissingEntryPoint { .. }), "{err}");
    }

    #[test]
    fn garbage_archive_is_a_repack_error() {
        let scripts = tarball(&[("inference.py", "")], true);
        let err = repack_archives(&[0x1f, 0x8b, 0, 1, 2], &scripts, "inference.py").unwrap_err();
        assert!(matches!(err, CatalogError::Repack { .. }), "{err}");
    }

    #[rstest]
    #[case("s3://bucket/a/b.tar.gz", Some(("bucket", "a/b.tar.gz")))]
    #[case("s3://bucket/", None)]
    #[case("s3://bucket", None)]
    #[case("https://bucket/key", None)]
    fn s3_uris(#[case] uri: &str, #[case] expected: Option<(&str, &str)>) {
        assert_eq!(split_s3_uri(uri).ok(), expected);
    }

    #[test]
    fn default_bucket_is_per_account() {
        assert_eq!(
            default_output_bucket("us-west-2", "123456789012"),
            "sagemaker-us-west-2-123456789012"
        );
    }
}
