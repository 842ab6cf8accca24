// Asset Publisher - declarative publishing of local files to S3-compatible storage

pub mod config;
pub mod manifest;
pub mod publish;
pub mod resolve;   // Glob expansion and remote key rewriting
pub mod storage;
pub mod types;
pub mod utils;

// Re-exports for convenience
pub use crate::config::{PublishConfig, StorageConfig};
pub use manifest::{Entry, Manifest, MANIFEST_FILE_NAME};
pub use publish::{FailurePolicy, Outcome, PublishReport, Publisher};
pub use resolve::ResolvedUpload;
pub use storage::{S3Client, StorageAdapter};
pub use types::{PublishError, PublishResult};
