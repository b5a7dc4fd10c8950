//! Error types for Stowage

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a storage backend (the SDK side of the seam).
#[derive(Error, Debug)]
pub enum BackendError {
    /// The key does not exist. `S3Backend` reports this for the `NoSuchKey` and
    /// `NotFound` error codes; S3 itself deletes missing keys without complaint.
    #[error("The specified key does not exist: {0}")]
    NotFound(String),

    #[error("{operation} failed: {message}")]
    Sdk {
        operation: &'static str,
        message: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BackendError {
    pub fn sdk(operation: &'static str, message: impl Into<String>) -> Self {
        BackendError::Sdk {
            operation,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound(_))
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to initialize storage client: {0}")]
    Initialization(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid object key: {0:?}")]
    InvalidKey(String),

    #[error("Failed to resolve bucket {bucket}")]
    BucketResolution {
        bucket: String,
        #[source]
        source: BackendError,
    },

    #[error("Failed to read {origin}")]
    Read {
        origin: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{origin} is too large for a multipart upload ({size} bytes)")]
    TooLarge { origin: String, size: u64 },

    #[error("Upload of {key} failed after {attempts} attempts")]
    Upload {
        key: String,
        attempts: u32,
        #[source]
        source: BackendError,
    },

    #[error("Failed to generate signed URL for {key}")]
    Signing {
        key: String,
        #[source]
        source: BackendError,
    },

    #[error("Failed to delete {key}")]
    Deletion {
        key: String,
        #[source]
        source: BackendError,
    },
}

impl Error {
    /// Short machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Initialization(_) => "InitializationError",
            Error::InvalidConfig(_) => "InitializationError",
            Error::InvalidKey(_) => "InvalidKeyError",
            Error::BucketResolution { .. } => "BucketResolutionError",
            Error::Read { .. } => "ReadError",
            Error::TooLarge { .. } => "TooLargeError",
            Error::Upload { .. } => "UploadError",
            Error::Signing { .. } => "SigningError",
            Error::Deletion { .. } => "DeletionError",
        }
    }

    /// The backend failure behind this error, if any
    pub fn backend_error(&self) -> Option<&BackendError> {
        match self {
            Error::BucketResolution { source, .. }
            | Error::Upload { source, .. }
            | Error::Signing { source, .. }
            | Error::Deletion { source, .. } => Some(source),
            _ => None,
        }
    }
}
