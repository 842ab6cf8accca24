// Error types shared across the publishing pipeline

use std::path::PathBuf;

use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Malformed manifest: {0}")]
    MalformedManifest(String),

    #[error("Failed to read {}: {source}", path.display())]
    LocalRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Upload of {key} failed: {reason}")]
    Upload { key: String, reason: String },

    #[error("Invalid pattern {pattern:?}: {reason}")]
    Glob { pattern: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{} already exists (use --force to overwrite)", .0.display())]
    ManifestExists(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for PublishError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::LocalRead { path, source } => PublishError::LocalRead { path, source },
            StorageError::Upload { key, reason } => PublishError::Upload { key, reason },
            StorageError::Config(msg) => PublishError::Config(msg),
        }
    }
}

impl From<::config::ConfigError> for PublishError {
    fn from(err: ::config::ConfigError) -> Self {
        PublishError::Config(err.to_string())
    }
}

pub type PublishResult<T> = std::result::Result<T, PublishError>;
