//! Backends that persist validated revocation lists
//!
//! Every backend exposes the same capability: read the previously stored
//! artifact for a key, and overwrite it. Backends never coordinate with each
//! other; each one compares new content against its own prior copy.

pub mod change;
pub mod local;
pub mod object;

use async_trait::async_trait;
use thiserror::Error;

pub use change::{Change, detect_change, fingerprint};
pub use local::LocalStore;
pub use object::ObjectStoreBackend;

/// Storage backend errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Failed to read {key}: {reason}")]
    Read { key: String, reason: String },

    #[error("Failed to write {key}: {reason}")]
    Write { key: String, reason: String },

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),
}

type Result<T> = std::result::Result<T, StorageError>;

/// Abstract interface for CRL storage backends.
#[async_trait]
pub trait CrlStore: Send + Sync {
    /// Short label used in logs and outcomes, e.g. `local` or `s3`.
    fn name(&self) -> &str;

    /// Loads the stored artifact. A missing artifact is `StorageError::NotFound`.
    async fn read(&self, key: &str) -> Result<Vec<u8>>;

    /// Replaces the stored artifact with `data`.
    async fn write(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Checks whether an artifact exists for `key`.
    async fn exists(&self, key: &str) -> Result<bool> {
        match self.read(key).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
