//! S3-compatible backend built on aws-sdk-s3

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::{ByteStream, Length};
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use bytes::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};
use stowage_core::{BackendError, Error, Result, StowageConfig};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::{part_ranges, part_size_for, BackendResult, ObjectBackend};

/// Object storage backend talking to an S3-compatible service
/// (AWS S3, Aliyun OSS, MinIO, ...).
#[derive(Clone)]
pub struct S3Backend {
    client: Client,
    bucket: String,
}

impl S3Backend {
    /// Create an S3 client from configuration
    pub fn new(config: &StowageConfig) -> Result<Self> {
        config.validate()?;

        let host = config.endpoint_host();
        if host.is_empty() || host.chars().any(char::is_whitespace) {
            return Err(Error::Initialization(format!(
                "Invalid endpoint: {:?}",
                config.endpoint
            )));
        }

        let credentials = Credentials::new(
            &config.access_key_id,
            &config.access_key_secret,
            None,
            None,
            "stowage",
        );

        let s3_config = S3ConfigBuilder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(config.endpoint_url())
            .force_path_style(config.force_path_style)
            .build();

        info!(bucket = %config.bucket, endpoint = %config.endpoint_url(), "S3 client initialized");

        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
        })
    }

    /// Wrap an already configured SDK client
    pub fn from_client(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    async fn upload_part(
        &self,
        key: &str,
        path: &Path,
        upload_id: &str,
        part_number: i32,
        offset: u64,
        len: u64,
    ) -> BackendResult<CompletedPart> {
        let body = ByteStream::read_from()
            .path(path)
            .offset(offset)
            .length(Length::Exact(len))
            .build()
            .await
            .map_err(|e| sdk_error("UploadPart", e))?;
        debug!(key = %key, part = part_number, size = len, "Uploading part");

        let resp = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(body)
            .send()
            .await
            .map_err(|e| sdk_error("UploadPart", e))?;

        Ok(CompletedPart::builder()
            .set_e_tag(resp.e_tag().map(|s| s.to_string()))
            .part_number(part_number)
            .build())
    }

    async fn upload_parts(
        &self,
        key: &str,
        path: &Path,
        upload_id: &str,
        size: u64,
        part_size: u64,
        concurrency: usize,
    ) -> BackendResult<Vec<CompletedPart>> {
        let mut parts: Vec<CompletedPart> = stream::iter(part_ranges(size, part_size))
            .map(|(part_number, offset, len)| {
                self.upload_part(key, path, upload_id, part_number, offset, len)
            })
            .buffer_unordered(concurrency.max(1))
            .try_collect()
            .await?;

        parts.sort_by_key(|p| p.part_number());
        Ok(parts)
    }

    async fn abort_upload(&self, key: &str, upload_id: &str) {
        if let Err(e) = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
        {
            warn!(key = %key, upload_id = %upload_id, error = %DisplayErrorContext(&e), "Failed to abort multipart upload");
        }
    }
}

#[async_trait]
impl ObjectBackend for S3Backend {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn resolve_bucket(&self) -> BackendResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| sdk_error("HeadBucket", e))?;
        Ok(())
    }

    async fn put_object(&self, key: &str, data: Bytes, content_type: &str) -> BackendResult<()> {
        let size = data.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| sdk_error("PutObject", e))?;

        debug!(bucket = %self.bucket, key = %key, size, "Stored object");
        Ok(())
    }

    async fn put_file(&self, key: &str, path: &Path, content_type: &str) -> BackendResult<()> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| sdk_error("PutObject", e))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| sdk_error("PutObject", e))?;

        debug!(bucket = %self.bucket, key = %key, path = %path.display(), "Stored object from file");
        Ok(())
    }

    async fn object_exists(&self, key: &str) -> BackendResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(sdk_error("HeadObject", service_err))
                }
            }
        }
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> BackendResult<String> {
        let presigning_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| sdk_error("PresignGetObject", e))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning_config)
            .await
            .map_err(|e| sdk_error("PresignGetObject", e))?;

        Ok(presigned.uri().to_string())
    }

    async fn delete_object(&self, key: &str) -> BackendResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| missing_key_or_sdk("DeleteObject", key, e))?;
        Ok(())
    }

    async fn multipart_upload(
        &self,
        key: &str,
        path: &Path,
        part_size: u64,
        concurrency: usize,
        content_type: &str,
    ) -> BackendResult<()> {
        let size = fs::metadata(path).await?.len();
        if size == 0 {
            // S3 rejects a multipart upload without parts
            return self.put_object(key, Bytes::new(), content_type).await;
        }
        let part_size = part_size_for(size, part_size).ok_or_else(|| {
            BackendError::sdk(
                "CreateMultipartUpload",
                format!("{} bytes exceed the multipart upload limit", size),
            )
        })?;

        let create = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| sdk_error("CreateMultipartUpload", e))?;

        let upload_id = create
            .upload_id()
            .ok_or_else(|| BackendError::sdk("CreateMultipartUpload", "response without upload id"))?
            .to_string();

        debug!(key = %key, upload_id = %upload_id, size, part_size, concurrency, "Multipart upload started");

        let parts = match self
            .upload_parts(key, path, &upload_id, size, part_size, concurrency)
            .await
        {
            Ok(parts) => parts,
            Err(e) => {
                self.abort_upload(key, &upload_id).await;
                return Err(e);
            }
        };

        let part_count = parts.len();
        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        if let Err(e) = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(&upload_id)
            .multipart_upload(completed)
            .send()
            .await
        {
            let err = sdk_error("CompleteMultipartUpload", e);
            self.abort_upload(key, &upload_id).await;
            return Err(err);
        }

        info!(key = %key, parts = part_count, size, "Multipart upload completed");
        Ok(())
    }
}

fn sdk_error<E: std::error::Error>(operation: &'static str, err: E) -> BackendError {
    BackendError::sdk(operation, DisplayErrorContext(err).to_string())
}

fn missing_key_or_sdk<E>(operation: &'static str, key: &str, err: E) -> BackendError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    if is_missing_key(err.code()) {
        BackendError::NotFound(key.to_string())
    } else {
        sdk_error(operation, err)
    }
}

fn is_missing_key(code: Option<&str>) -> bool {
    matches!(code, Some("NoSuchKey") | Some("NotFound"))
}
