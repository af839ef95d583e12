//! Lazily loaded record cache
//!
//! The dataset is parsed at most once per cache. Concurrent first callers
//! wait on the same load; a failed load is not remembered, so the next
//! caller tries again.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{instrument, warn};

use super::{RecordSource, RecordStore};
use crate::error::{FetchError, SourceError};
use crate::import;
use crate::record::{PageRequest, PageResponse};

/// Message returned to clients when the dataset cannot be loaded.
pub const LOAD_FAILED: &str = "Failed to process search request";

/// Guarded single-initialization cache of the parsed dataset.
#[derive(Debug)]
pub struct RecordCache {
    path: PathBuf,
    store: OnceCell<Arc<RecordStore>>,
}

impl RecordCache {
    /// Cache that will load `path` on first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            store: OnceCell::new(),
        }
    }

    /// Cache that is already populated.
    pub fn preloaded(store: RecordStore) -> Self {
        Self {
            path: PathBuf::new(),
            store: OnceCell::new_with(Some(Arc::new(store))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.store.initialized()
    }

    /// Load the dataset if nothing is cached yet and return the store.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn ensure_loaded(&self) -> Result<Arc<RecordStore>, SourceError> {
        self.store
            .get_or_try_init(|| async {
                let records = import::load(&self.path).await?;
                Ok::<_, SourceError>(Arc::new(RecordStore::new(records)))
            })
            .await
            .cloned()
    }

    /// Search the dataset, degrading to an empty page with an error
    /// when it cannot be loaded.
    pub async fn search(&self, request: &PageRequest) -> PageResponse {
        match self.ensure_loaded().await {
            Ok(store) => store.search(request),
            Err(e) => {
                warn!(error = %e, "dataset unavailable");
                PageResponse::failed(LOAD_FAILED)
            }
        }
    }
}

/// In-process source backed by a [`RecordCache`].
#[derive(Debug, Clone)]
pub struct LocalSource {
    cache: Arc<RecordCache>,
}

impl LocalSource {
    pub fn new(cache: Arc<RecordCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<RecordCache> {
        &self.cache
    }
}

#[async_trait]
impl RecordSource for LocalSource {
    async fn fetch(&self, request: &PageRequest) -> Result<PageResponse, FetchError> {
        Ok(self.cache.search(request).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_csv(name: &str, body: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "smartlist-cache-{}-{}.csv",
            name,
            std::process::id()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[tokio::test]
    async fn test_loads_once() {
        let path = temp_csv(
            "once",
            "h\n1,u,p,Cafe One,d,4,1,c,US,CA,SF,St,1\n2,u,p,Cafe Two,d,4,1,c,US,CA,SF,St,2\n",
        );
        let cache = RecordCache::new(&path);
        assert!(!cache.is_loaded());

        let first = cache.ensure_loaded().await.unwrap();
        assert_eq!(first.len(), 2);

        // Later edits are not picked up once loaded
        std::fs::write(&path, "h\n").unwrap();
        let second = cache.ensure_loaded().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_failed_load_degrades_and_retries() {
        let path = std::env::temp_dir().join(format!(
            "smartlist-cache-retry-{}.csv",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let cache = RecordCache::new(&path);

        let resp = cache.search(&PageRequest::first("", 10)).await;
        assert!(resp.items.is_empty());
        assert_eq!(resp.total, 0);
        assert!(!resp.has_more);
        assert_eq!(resp.error.as_deref(), Some(LOAD_FAILED));
        assert!(!cache.is_loaded());

        std::fs::write(&path, "h\n1,u,p,Cafe,d,4,1,c,US,CA,SF,St,1\n").unwrap();
        let resp = cache.search(&PageRequest::first("", 10)).await;
        assert_eq!(resp.total, 1);
        assert!(resp.error.is_none());

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_local_source_fetch() {
        let cache = RecordCache::preloaded(RecordStore::new(Vec::new()));
        let source = LocalSource::new(Arc::new(cache));
        let resp = source.fetch(&PageRequest::first("x", 5)).await.unwrap();
        assert_eq!(resp.total, 0);
        assert!(source.cache().is_loaded());
    }
}
