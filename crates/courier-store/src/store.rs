use async_trait::async_trait;

use crate::document::{Collection, Document};
use crate::error::StoreError;

pub use courier_core::NowFn;

/// Options for [`DocumentStore::documents`].
#[derive(Debug, Clone, Default)]
pub struct DocumentsOpts {
    /// String-prefix filter on the key within `parent`.
    pub prefix: Option<String>,
    /// Number of leading entries to skip.
    pub index: usize,
    /// Maximum entries returned; 0 means no limit.
    pub limit: usize,
    /// Return paths and timestamps only, no data.
    pub path_only: bool,
}

/// The key-value contract the exchange server is written against. Paths are
/// canonical `/a/b` strings; see `courier_core::path`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document, failing if the path already exists.
    async fn create(&self, path: &str, data: &[u8]) -> Result<(), StoreError>;

    /// Create or replace a document.
    async fn set(&self, path: &str, data: &[u8]) -> Result<(), StoreError>;

    async fn get(&self, path: &str) -> Result<Option<Document>, StoreError>;

    /// Delete a document, returning whether it existed.
    async fn delete(&self, path: &str) -> Result<bool, StoreError>;

    /// List documents under `parent`, ordered by path.
    async fn documents(
        &self,
        parent: &str,
        opts: &DocumentsOpts,
    ) -> Result<Vec<Document>, StoreError>;

    /// List top-level collection names under `parent`.
    async fn collections(&self, parent: &str) -> Result<Vec<Collection>, StoreError>;

    fn set_time_now(&self, now_fn: NowFn);
}
