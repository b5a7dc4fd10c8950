//! Storage backends for Stowage
//!
//! `ObjectBackend` is the seam between the client's upload/URL policies and
//! the object storage SDK that performs the actual requests.

mod memory;
mod s3;

pub use memory::{MemoryBackend, MultipartCall, StoredObject};
pub use s3::S3Backend;

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use std::time::Duration;
use stowage_core::{BackendError, MAX_PARTS, MAX_PART_SIZE, MIN_PART_SIZE};

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Object storage backend trait
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Name of the bucket this backend is bound to
    fn bucket(&self) -> &str;

    /// Check that the bucket exists and is reachable with our credentials
    async fn resolve_bucket(&self) -> BackendResult<()>;

    /// Store an object from memory
    async fn put_object(&self, key: &str, data: Bytes, content_type: &str) -> BackendResult<()>;

    /// Store an object streamed from a local file
    async fn put_file(&self, key: &str, path: &Path, content_type: &str) -> BackendResult<()>;

    /// Check if object exists
    async fn object_exists(&self, key: &str) -> BackendResult<bool>;

    /// Time-limited signed GET URL
    async fn presign_get(&self, key: &str, expires_in: Duration) -> BackendResult<String>;

    /// Delete object
    async fn delete_object(&self, key: &str) -> BackendResult<()>;

    /// Upload a local file in parts of `part_size` bytes, at most
    /// `concurrency` parts in flight
    async fn multipart_upload(
        &self,
        key: &str,
        path: &Path,
        part_size: u64,
        concurrency: usize,
        content_type: &str,
    ) -> BackendResult<()>;
}

/// Part size for a `total`-byte upload: `requested`, raised to the S3
/// minimum and to whatever keeps the upload within `MAX_PARTS`, capped at
/// `MAX_PART_SIZE`. `None` when `total` cannot fit at all.
pub fn part_size_for(total: u64, requested: u64) -> Option<u64> {
    let needed = total.div_ceil(MAX_PARTS);
    if needed > MAX_PART_SIZE {
        return None;
    }
    Some(requested.max(MIN_PART_SIZE).max(needed).min(MAX_PART_SIZE))
}

/// Byte ranges `(part_number, offset, len)` covering `total` bytes
pub(crate) fn part_ranges(total: u64, part_size: u64) -> Vec<(i32, u64, u64)> {
    let part_size = part_size.max(1);
    let mut parts = Vec::new();
    let mut offset = 0u64;
    let mut part_number = 1i32;

    while offset < total {
        let len = part_size.min(total - offset);
        parts.push((part_number, offset, len));
        offset += len;
        part_number += 1;
    }

    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_ranges() {
        assert!(part_ranges(0, 10).is_empty());
        assert_eq!(part_ranges(10, 10), vec![(1, 0, 10)]);
        assert_eq!(
            part_ranges(25, 10),
            vec![(1, 0, 10), (2, 10, 10), (3, 20, 5)]
        );
    }

    #[test]
    fn test_part_size_small_file() {
        assert_eq!(part_size_for(13, 1024), Some(MIN_PART_SIZE));
        assert_eq!(part_size_for(13, 64 * 1024 * 1024), Some(64 * 1024 * 1024));
        assert_eq!(part_size_for(0, 0), Some(MIN_PART_SIZE));
    }

    #[test]
    fn test_part_size_stays_within_part_limit() {
        let gib = 1024 * 1024 * 1024u64;
        for total in [100 * gib, 48 * gib + 1, 1024 * gib, MAX_PARTS * MAX_PART_SIZE] {
            let part_size = part_size_for(total, MIN_PART_SIZE).unwrap();
            let parts = part_ranges(total, part_size);
            assert!(parts.len() as u64 <= MAX_PARTS, "{} bytes -> {} parts", total, parts.len());
            assert!(part_size <= MAX_PART_SIZE);
            assert_eq!(parts.last().map(|p| p.0 as u64), Some(parts.len() as u64));
        }
    }

    #[test]
    fn test_part_size_caps_requested() {
        assert_eq!(part_size_for(10, u64::MAX), Some(MAX_PART_SIZE));
    }

    #[test]
    fn test_part_size_rejects_oversized_upload() {
        assert_eq!(part_size_for(MAX_PARTS * MAX_PART_SIZE + 1, MIN_PART_SIZE), None);
    }
}
