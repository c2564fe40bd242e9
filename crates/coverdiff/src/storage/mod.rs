//! Object storage collaborator.
//!
//! Jobs reference their documents by opaque storage key; the pipeline
//! fetches bytes at the start of a run and deletes both objects at the
//! end of it. `delete` is idempotent — removing a key that is already
//! gone succeeds, so cleanup can be retried safely.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::StorageConfig;
use crate::error::{CoverdiffError, StorageError};

mod fs;
mod http;

pub use fs::FsObjectStore;
pub use http::HttpObjectStore;

/// Narrow contract over the external blob store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>, StorageError>;
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Builds the configured storage backend.
pub fn build_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>, CoverdiffError> {
    match config {
        StorageConfig::Filesystem { root } => Ok(Arc::new(FsObjectStore::new(root))),
        StorageConfig::Http {
            base_url,
            auth_token_env,
        } => Ok(Arc::new(HttpObjectStore::new(
            base_url,
            auth_token_env.as_deref(),
        )?)),
    }
}
