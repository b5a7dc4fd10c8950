//! In-process backend
//!
//! Keeps objects in a map and lets callers inject failures, so upload and
//! retry policies can be exercised without a storage service.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use stowage_core::BackendError;
use tokio::fs;
use tracing::debug;

use crate::{BackendResult, ObjectBackend};

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
}

/// Parameters of one multipart call, as seen by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultipartCall {
    pub part_size: u64,
    pub concurrency: usize,
}

#[derive(Default)]
struct State {
    objects: HashMap<String, StoredObject>,
    bucket_missing: bool,
    failing_writes: u32,
    failing_exists: bool,
    failing_presign: bool,
    write_attempts: u32,
    exists_calls: u32,
    multipart_calls: Vec<MultipartCall>,
}

pub struct MemoryBackend {
    bucket: String,
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            state: Mutex::new(State::default()),
        }
    }

    /// Make bucket resolution fail
    pub fn set_bucket_missing(&self, missing: bool) {
        self.state.lock().bucket_missing = missing;
    }

    /// Fail the next `count` write attempts (put, put_file, multipart)
    pub fn fail_next_writes(&self, count: u32) {
        self.state.lock().failing_writes = count;
    }

    /// Make existence checks fail
    pub fn set_exists_failing(&self, failing: bool) {
        self.state.lock().failing_exists = failing;
    }

    /// Make URL signing fail
    pub fn set_presign_failing(&self, failing: bool) {
        self.state.lock().failing_presign = failing;
    }

    /// Write attempts seen so far, failed ones included
    pub fn write_attempts(&self) -> u32 {
        self.state.lock().write_attempts
    }

    pub fn exists_calls(&self) -> u32 {
        self.state.lock().exists_calls
    }

    pub fn multipart_calls(&self) -> Vec<MultipartCall> {
        self.state.lock().multipart_calls.clone()
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.state.lock().objects.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.state.lock().objects.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        self.state.lock().objects.insert(
            key.into(),
            StoredObject {
                data: data.into(),
                content_type: "application/octet-stream".to_string(),
            },
        );
    }

    fn begin_write(&self, operation: &'static str) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.write_attempts += 1;
        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            return Err(BackendError::sdk(operation, "injected failure"));
        }
        Ok(())
    }

    fn store(&self, key: &str, data: Bytes, content_type: &str) {
        debug!(bucket = %self.bucket, key = %key, size = data.len(), "Stored object in memory");
        self.state.lock().objects.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
    }
}

#[async_trait]
impl ObjectBackend for MemoryBackend {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn resolve_bucket(&self) -> BackendResult<()> {
        if self.state.lock().bucket_missing {
            return Err(BackendError::sdk(
                "HeadBucket",
                format!("bucket {} does not exist", self.bucket),
            ));
        }
        Ok(())
    }

    async fn put_object(&self, key: &str, data: Bytes, content_type: &str) -> BackendResult<()> {
        self.begin_write("PutObject")?;
        self.store(key, data, content_type);
        Ok(())
    }

    async fn put_file(&self, key: &str, path: &Path, content_type: &str) -> BackendResult<()> {
        self.begin_write("PutObject")?;
        let data = fs::read(path).await?;
        self.store(key, Bytes::from(data), content_type);
        Ok(())
    }

    async fn object_exists(&self, key: &str) -> BackendResult<bool> {
        let mut state = self.state.lock();
        state.exists_calls += 1;
        if state.failing_exists {
            return Err(BackendError::sdk("HeadObject", "injected failure"));
        }
        Ok(state.objects.contains_key(key))
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> BackendResult<String> {
        if self.state.lock().failing_presign {
            return Err(BackendError::sdk("PresignGetObject", "injected failure"));
        }
        Ok(format!(
            "memory://{}/{}?expires={}",
            self.bucket,
            key,
            expires_in.as_secs()
        ))
    }

    async fn delete_object(&self, key: &str) -> BackendResult<()> {
        match self.state.lock().objects.remove(key) {
            Some(_) => Ok(()),
            None => Err(BackendError::NotFound(key.to_string())),
        }
    }

    async fn multipart_upload(
        &self,
        key: &str,
        path: &Path,
        part_size: u64,
        concurrency: usize,
        content_type: &str,
    ) -> BackendResult<()> {
        self.state.lock().multipart_calls.push(MultipartCall {
            part_size,
            concurrency,
        });
        self.begin_write("CompleteMultipartUpload")?;
        let data = fs::read(path).await?;
        self.store(key, Bytes::from(data), content_type);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_exists() {
        let backend = MemoryBackend::new("bucket");
        assert!(!backend.object_exists("a").await.unwrap());

        backend
            .put_object("a", Bytes::from_static(b"x"), "text/plain")
            .await
            .unwrap();

        assert!(backend.object_exists("a").await.unwrap());
        assert_eq!(backend.get("a").unwrap().content_type, "text/plain");
        assert_eq!(backend.exists_calls(), 2);
    }

    #[tokio::test]
    async fn test_injected_write_failures() {
        let backend = MemoryBackend::new("bucket");
        backend.fail_next_writes(2);

        for _ in 0..2 {
            let result = backend.put_object("a", Bytes::new(), "text/plain").await;
            assert!(result.is_err());
        }
        backend.put_object("a", Bytes::new(), "text/plain").await.unwrap();

        assert_eq!(backend.write_attempts(), 3);
        assert_eq!(backend.keys(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let backend = MemoryBackend::new("bucket");
        let err = backend.delete_object("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_multipart_records_call() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"parts").unwrap();
        let backend = MemoryBackend::new("bucket");

        backend
            .multipart_upload("big.bin", file.path(), 8, 3, "application/octet-stream")
            .await
            .unwrap();

        assert_eq!(
            backend.multipart_calls(),
            vec![MultipartCall {
                part_size: 8,
                concurrency: 3
            }]
        );
        assert_eq!(&backend.get("big.bin").unwrap().data[..], b"parts");
    }
}
