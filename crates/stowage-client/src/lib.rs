//! Stowage client
//!
//! Upload bytes, streams and local files to an S3-compatible bucket, with
//! optional content-hash deduplication and linear-backoff retries, and build
//! public or signed URLs for the stored objects.
//!
//! ```no_run
//! use stowage_client::{ObjectStoreClient, StowageConfig};
//!
//! # async fn run() -> stowage_client::Result<()> {
//! let mut config = StowageConfig::new(
//!     "oss-cn-hangzhou.aliyuncs.com",
//!     "your-access-key-id",
//!     "your-access-key-secret",
//!     "your-bucket-name",
//! );
//! config.base_path = "prefix".to_string();
//!
//! let client = ObjectStoreClient::connect(config).await?;
//! let uploaded = client.upload_local_file("./hello.txt").await?;
//! println!("{}", uploaded.url);
//!
//! let signed = client.get_signed_url(&uploaded.name, 3600).await?;
//! println!("{}", signed);
//! # Ok(())
//! # }
//! ```

mod client;
mod retry;

pub use client::{ObjectStoreClient, UploadedObject};
pub use stowage_core::{BackendError, Error, ObjectKey, Result, StowageConfig};
pub use stowage_storage::{MemoryBackend, ObjectBackend, S3Backend};
