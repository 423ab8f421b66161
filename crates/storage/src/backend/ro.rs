//! Read-only object store.
//!
//! This module provides a store implementation that wraps another and
//! prevents metadata replacement from executing, while still indicating
//! success on return. Used for dry runs.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Cursor, ListPage, ObjectMetadata};
use crate::{ObjectStore, StoreHandle};

/// Read-only object store.
///
/// Wraps another store and silently drops all metadata replacements, logging
/// an [`info event`](tracing::Event) for each.
#[derive(Clone)]
pub struct ReadOnlyStore {
    inner: StoreHandle,
}
impl ReadOnlyStore {
    pub fn new(inner: StoreHandle) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ObjectStore for ReadOnlyStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn region(&self) -> &str {
        self.inner.region()
    }

    async fn list_page(&self, prefix: Option<&str>, cursor: Option<&Cursor>, limit: u32) -> Result<ListPage> {
        self.inner.list_page(prefix, cursor, limit).await
    }

    async fn head(&self, key: &str) -> Result<ObjectMetadata> {
        self.inner.head(key).await
    }

    async fn replace_metadata(&self, key: &str, content_type: &str, metadata: &ObjectMetadata) -> Result<()> {
        tracing::info!(
            key,
            from = metadata.content_type.as_deref().unwrap_or_default(),
            to = content_type,
            "Skipping content-type rewrite during read-only mode"
        );
        Ok(())
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::backend::MockStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_replace_is_dropped() {
        let mock = Arc::new(MockStore::with_objects([("a.json", ObjectMetadata::with_content_type("text/plain"))]));
        let store = ReadOnlyStore::new(mock.clone());
        let metadata = store.head("a.json").await.unwrap();
        store.replace_metadata("a.json", "application/json", &metadata).await.unwrap();
        assert!(mock.replaced().await.is_empty());
        assert_eq!(mock.head("a.json").await.unwrap().content_type.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_reads_are_forwarded() {
        let mock = Arc::new(MockStore::with_objects([("a.json", ObjectMetadata::default())]).with_name("bucket"));
        let store = ReadOnlyStore::new(mock.clone());
        assert_eq!(store.name(), "bucket");
        let page = store.list_page(None, None, 10).await.unwrap();
        assert_eq!(page.objects.len(), 1);
        assert_eq!(mock.list_calls(), 1);
    }
}
