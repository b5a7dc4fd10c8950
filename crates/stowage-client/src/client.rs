//! Object store client

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use stowage_core::key::{extension_of, join_path, normalize_extension};
use stowage_core::{Error, ObjectKey, Result, StowageConfig, LARGE_FILE_CONCURRENCY};
use stowage_storage::{part_size_for, ObjectBackend, S3Backend};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, warn};

use crate::retry::RetryPolicy;

/// Where an uploaded object ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedObject {
    /// Key relative to the base path; what `get_url`, `get_signed_url` and
    /// `delete` accept
    pub name: String,
    /// Full object key in the bucket
    pub key: String,
    /// Public or signed URL, depending on the bucket's privacy setting
    pub url: String,
    /// The content was already stored and the transfer was skipped
    pub deduplicated: bool,
}

/// Upload, URL and delete operations over one bucket.
///
/// Holds only immutable configuration and a shared backend, so clones can be
/// used from any number of tasks.
#[derive(Clone)]
pub struct ObjectStoreClient {
    config: Arc<StowageConfig>,
    backend: Arc<dyn ObjectBackend>,
    retry: RetryPolicy,
}

impl ObjectStoreClient {
    /// Connect to the configured S3-compatible endpoint and resolve the bucket
    pub async fn connect(config: StowageConfig) -> Result<Self> {
        let backend = S3Backend::new(&config)?;
        Self::with_backend(config, Arc::new(backend)).await
    }

    /// Build a client over an existing backend
    pub async fn with_backend(
        config: StowageConfig,
        backend: Arc<dyn ObjectBackend>,
    ) -> Result<Self> {
        config.validate()?;

        if backend.bucket() != config.bucket {
            return Err(Error::Initialization(format!(
                "Backend is bound to bucket {}, config names {}",
                backend.bucket(),
                config.bucket
            )));
        }

        backend
            .resolve_bucket()
            .await
            .map_err(|source| Error::BucketResolution {
                bucket: config.bucket.clone(),
                source,
            })?;

        let retry = RetryPolicy::linear(config.effective_max_retry());
        info!(
            bucket = %config.bucket,
            base_path = %config.base_path,
            private = config.private,
            dedup = config.dedup,
            max_retry = retry.max_attempts(),
            "Object store client ready"
        );

        Ok(Self {
            config: Arc::new(config),
            backend,
            retry,
        })
    }

    pub fn config(&self) -> &StowageConfig {
        &self.config
    }

    /// Check if the bucket is still reachable
    pub async fn health_check(&self) -> bool {
        self.backend.resolve_bucket().await.is_ok()
    }

    /// Upload `content` and return its URL.
    ///
    /// With dedup enabled the object is named after the MD5 of the content,
    /// and an object already stored under that name is not sent again.
    pub async fn upload_bytes(
        &self,
        content: impl Into<Bytes>,
        extension: &str,
    ) -> Result<UploadedObject> {
        let content = content.into();
        let extension = normalize_extension(extension);

        let key = if self.config.dedup {
            let key = ObjectKey::content_hash(&self.config.base_path, &content, &extension);
            match self.backend.object_exists(key.as_str()).await {
                Ok(true) => {
                    debug!(key = %key, "Content already stored, skipping upload");
                    return self.uploaded(key, true).await;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(key = %key, error = %e, "Existence check failed, uploading anyway");
                }
            }
            key
        } else {
            ObjectKey::unique(&self.config.base_path, &extension)
        };

        let content_type = content_type_for(&extension);
        self.retry
            .run(&key, || {
                self.backend
                    .put_object(key.as_str(), content.clone(), &content_type)
            })
            .await?;

        info!(key = %key, size = content.len(), "Object uploaded");
        self.uploaded(key, false).await
    }

    /// Read `reader` to the end and upload the content.
    ///
    /// The extension is taken from `filename` when one is given.
    pub async fn upload_from_reader<R>(
        &self,
        mut reader: R,
        filename: Option<&str>,
    ) -> Result<UploadedObject>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut content = Vec::new();
        reader
            .read_to_end(&mut content)
            .await
            .map_err(|source| Error::Read {
                origin: filename.unwrap_or("stream").to_string(),
                source,
            })?;

        let extension = filename.map(|name| extension_of(name)).unwrap_or_default();
        self.upload_bytes(content, &extension).await
    }

    /// Read a local file into memory and upload it
    pub async fn upload_local_file(&self, path: impl AsRef<Path>) -> Result<UploadedObject> {
        let path = path.as_ref();
        let content = tokio::fs::read(path).await.map_err(|source| Error::Read {
            origin: path.display().to_string(),
            source,
        })?;

        self.upload_bytes(content, &extension_of(path)).await
    }

    /// Upload a local file under `name` (relative to the base path)
    pub async fn upload_file_as(
        &self,
        name: &str,
        path: impl AsRef<Path>,
    ) -> Result<UploadedObject> {
        let path = path.as_ref();
        let key = self.object_key(name)?;
        ensure_readable(path).await?;

        let content_type = content_type_for(&extension_of(path));
        self.retry
            .run(&key, || self.backend.put_file(key.as_str(), path, &content_type))
            .await?;

        info!(key = %key, path = %path.display(), "File uploaded");
        self.uploaded(key, false).await
    }

    /// Upload a local file in parts, three at a time, without reading it
    /// into memory. The object always gets a fresh unique name.
    ///
    /// `part_size` is raised to the 5 MiB minimum and, for big files, to
    /// whatever keeps the upload within 10,000 parts.
    pub async fn upload_large_file(
        &self,
        path: impl AsRef<Path>,
        part_size: u64,
    ) -> Result<UploadedObject> {
        let path = path.as_ref();
        let size = ensure_readable(path).await?.len();
        let part_size = part_size_for(size, part_size).ok_or_else(|| Error::TooLarge {
            origin: path.display().to_string(),
            size,
        })?;

        let extension = extension_of(path);
        let key = ObjectKey::unique(&self.config.base_path, &extension);
        let content_type = content_type_for(&extension);

        self.retry
            .run(&key, || {
                self.backend.multipart_upload(
                    key.as_str(),
                    path,
                    part_size,
                    LARGE_FILE_CONCURRENCY,
                    &content_type,
                )
            })
            .await?;

        info!(key = %key, path = %path.display(), part_size, "Large file uploaded");
        self.uploaded(key, false).await
    }

    /// Public URL of `name` under the base path. No request is made.
    ///
    /// Virtual-host form `https://{bucket}.{endpoint}/{key}`; an `http://`
    /// endpoint keeps its scheme and `force_path_style` puts the bucket in
    /// the path instead.
    pub fn get_url(&self, name: &str) -> String {
        self.public_url(&ObjectKey::new(&self.config.base_path, name))
    }

    /// Signed GET URL of `name` under the base path, valid for `expire_secs`
    pub async fn get_signed_url(&self, name: &str, expire_secs: u64) -> Result<String> {
        let key = self.object_key(name)?;
        self.signed_url(&key, expire_secs).await
    }

    /// Delete `name` under the base path
    pub async fn delete(&self, name: &str) -> Result<()> {
        let key = self.object_key(name)?;
        self.backend
            .delete_object(key.as_str())
            .await
            .map_err(|source| Error::Deletion {
                key: key.to_string(),
                source,
            })?;

        info!(key = %key, "Object deleted");
        Ok(())
    }

    /// URL reported for an uploaded object: signed for private buckets,
    /// public otherwise. `key` is already joined with the base path.
    async fn generate_url(&self, key: &ObjectKey) -> Result<String> {
        if self.config.private {
            self.signed_url(key, self.config.signed_url_ttl_secs).await
        } else {
            Ok(self.public_url(key))
        }
    }

    fn public_url(&self, key: &ObjectKey) -> String {
        let scheme = self.config.endpoint_scheme();
        let host = self.config.endpoint_host();
        if self.config.force_path_style {
            format!("{}://{}/{}/{}", scheme, host, self.config.bucket, key.url_path())
        } else {
            format!("{}://{}.{}/{}", scheme, self.config.bucket, host, key.url_path())
        }
    }

    async fn signed_url(&self, key: &ObjectKey, expire_secs: u64) -> Result<String> {
        self.backend
            .presign_get(key.as_str(), Duration::from_secs(expire_secs))
            .await
            .map_err(|source| Error::Signing {
                key: key.to_string(),
                source,
            })
    }

    async fn uploaded(&self, key: ObjectKey, deduplicated: bool) -> Result<UploadedObject> {
        let url = self.generate_url(&key).await?;
        Ok(UploadedObject {
            name: key.name(&self.config.base_path).to_string(),
            key: key.to_string(),
            url,
            deduplicated,
        })
    }

    fn object_key(&self, name: &str) -> Result<ObjectKey> {
        if join_path(&[name]).is_empty() {
            return Err(Error::InvalidKey(name.to_string()));
        }
        Ok(ObjectKey::new(&self.config.base_path, name))
    }
}

async fn ensure_readable(path: &Path) -> Result<std::fs::Metadata> {
    let metadata = tokio::fs::metadata(path).await.map_err(|source| Error::Read {
        origin: path.display().to_string(),
        source,
    })?;

    if !metadata.is_file() {
        return Err(Error::Read {
            origin: path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
        });
    }
    Ok(metadata)
}

fn content_type_for(extension: &str) -> String {
    mime_guess::from_ext(extension.trim_start_matches('.'))
        .first_or_octet_stream()
        .to_string()
}
