//! Configuration for Stowage
//!
//! Example config:
//! ```toml
//! endpoint = "oss-cn-hangzhou.aliyuncs.com"
//! access_key_id = "your-access-key-id"
//! access_key_secret = "your-access-key-secret"
//! bucket = "your-bucket-name"
//! base_path = "uploads"
//! private = false
//! dedup = true
//! max_retry = 3
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{Error, Result, DEFAULT_MAX_RETRY, DEFAULT_REGION, DEFAULT_SIGNED_URL_TTL_SECS};

/// Connection and policy settings for an object store client.
///
/// Set once at construction; the client never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StowageConfig {
    /// Storage service host, e.g. `oss-cn-hangzhou.aliyuncs.com`.
    /// A scheme is optional; `https://` is assumed when missing.
    pub endpoint: String,

    /// Access key ID
    pub access_key_id: String,

    /// Access key secret
    pub access_key_secret: String,

    /// Bucket name
    pub bucket: String,

    /// Prefix prepended to every object key
    #[serde(default)]
    pub base_path: String,

    /// Report signed URLs instead of public ones
    #[serde(default)]
    pub private: bool,

    /// Name uploaded objects after their content hash and skip re-uploads
    #[serde(default)]
    pub dedup: bool,

    /// Upload attempts; zero or negative falls back to 3
    #[serde(default)]
    pub max_retry: i32,

    /// Signing region
    #[serde(default = "default_region")]
    pub region: String,

    /// Path style access (use path instead of virtual hosted style)
    #[serde(default)]
    pub force_path_style: bool,

    /// Lifetime of signed URLs returned from uploads (seconds)
    #[serde(default = "default_signed_url_ttl")]
    pub signed_url_ttl_secs: u64,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_signed_url_ttl() -> u64 {
    DEFAULT_SIGNED_URL_TTL_SECS
}

impl Default for StowageConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            access_key_id: String::new(),
            access_key_secret: String::new(),
            bucket: String::new(),
            base_path: String::new(),
            private: false,
            dedup: false,
            max_retry: 0,
            region: default_region(),
            force_path_style: false,
            signed_url_ttl_secs: default_signed_url_ttl(),
        }
    }
}

impl StowageConfig {
    pub fn new(
        endpoint: impl Into<String>,
        access_key_id: impl Into<String>,
        access_key_secret: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
            bucket: bucket.into(),
            ..Self::default()
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfig(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::InvalidConfig(format!("Failed to parse config: {}", e)))
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(endpoint) = std::env::var("STOWAGE_ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Ok(key) = std::env::var("AWS_ACCESS_KEY_ID") {
            config.access_key_id = key;
        }
        if let Ok(key) = std::env::var("STOWAGE_ACCESS_KEY_ID") {
            config.access_key_id = key;
        }
        if let Ok(secret) = std::env::var("AWS_SECRET_ACCESS_KEY") {
            config.access_key_secret = secret;
        }
        if let Ok(secret) = std::env::var("STOWAGE_ACCESS_KEY_SECRET") {
            config.access_key_secret = secret;
        }
        if let Ok(bucket) = std::env::var("STOWAGE_BUCKET") {
            config.bucket = bucket;
        }
        if let Ok(base_path) = std::env::var("STOWAGE_BASE_PATH") {
            config.base_path = base_path;
        }
        if let Ok(region) = std::env::var("STOWAGE_REGION") {
            config.region = region;
        }
        if let Ok(retry) = std::env::var("STOWAGE_MAX_RETRY") {
            if let Ok(n) = retry.parse() {
                config.max_retry = n;
            }
        }
        if let Ok(ttl) = std::env::var("STOWAGE_SIGNED_URL_TTL") {
            if let Ok(secs) = ttl.parse() {
                config.signed_url_ttl_secs = secs;
            }
        }
        config.private = env_flag("STOWAGE_PRIVATE");
        config.dedup = env_flag("STOWAGE_DEDUP");
        config.force_path_style = env_flag("STOWAGE_FORCE_PATH_STYLE");

        config
    }

    /// Validate that everything needed to reach the bucket is present
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "Endpoint not configured. Set STOWAGE_ENDPOINT".to_string(),
            ));
        }
        if self.access_key_id.is_empty() {
            return Err(Error::InvalidConfig(
                "Access key ID not configured. Set STOWAGE_ACCESS_KEY_ID".to_string(),
            ));
        }
        if self.access_key_secret.is_empty() {
            return Err(Error::InvalidConfig(
                "Access key secret not configured. Set STOWAGE_ACCESS_KEY_SECRET".to_string(),
            ));
        }
        if self.bucket.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "Bucket not configured. Set STOWAGE_BUCKET".to_string(),
            ));
        }

        Ok(())
    }

    /// Upload attempts actually made per operation
    pub fn effective_max_retry(&self) -> u32 {
        if self.max_retry <= 0 {
            DEFAULT_MAX_RETRY
        } else {
            self.max_retry as u32
        }
    }

    /// Endpoint as a URL the SDK can dial
    pub fn endpoint_url(&self) -> String {
        let endpoint = self.endpoint.trim().trim_end_matches('/');
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("https://{}", endpoint)
        }
    }

    /// `http` when the endpoint says so, `https` otherwise
    pub fn endpoint_scheme(&self) -> &'static str {
        if self.endpoint.trim().starts_with("http://") {
            "http"
        } else {
            "https"
        }
    }

    /// Endpoint host without scheme, used in public URLs
    pub fn endpoint_host(&self) -> &str {
        let endpoint = self.endpoint.trim();
        endpoint
            .strip_prefix("https://")
            .or_else(|| endpoint.strip_prefix("http://"))
            .unwrap_or(endpoint)
            .trim_end_matches('/')
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
