//! Stowage Core Library
//!
//! Configuration, error types, object-key construction and content hashing
//! shared by the Stowage storage backends and client.

pub mod config;
pub mod error;
pub mod hash;
pub mod key;

pub use config::StowageConfig;
pub use error::{BackendError, Error, Result};
pub use key::ObjectKey;

/// Stowage version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default S3 region
pub const DEFAULT_REGION: &str = "us-east-1";

/// Upload attempts used when the configured value is unset or non-positive
pub const DEFAULT_MAX_RETRY: u32 = 3;

/// Lifetime of the signed URL reported for uploads to a private bucket
pub const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 3600;

/// Parallel part uploads for large files
pub const LARGE_FILE_CONCURRENCY: usize = 3;

/// Minimum part size (5 MiB)
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Maximum part size (5 GiB)
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Maximum number of parts in one multipart upload
pub const MAX_PARTS: u64 = 10_000;
