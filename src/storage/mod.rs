//! Blob storage for uploaded files.
//!
//! Blobs are addressed by a relative path such as `images/articles/<name>`;
//! the same path is what the photo row records.

pub mod local;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub use local::LocalBlobStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Invalid blob path: {0}")]
    InvalidPath(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes `content` at `path`, creating parent directories as needed
    async fn put(&self, path: &str, content: &[u8]) -> Result<()>;

    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Fails with `StorageError::NotFound` when nothing is stored at `path`
    async fn delete(&self, path: &str) -> Result<()>;

    async fn exists(&self, path: &str) -> Result<bool>;
}

/// Collision-resistant file name that keeps the upload's extension
pub fn unique_name(extension: &str) -> String {
    format!("{}.{}", Uuid::new_v4().simple(), extension)
}

/// Joins a namespace and a file name into a blob path
pub fn blob_path(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace.trim_end_matches('/'), name)
}
