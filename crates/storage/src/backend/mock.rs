//! In-memory object store for testing.

use crate::ObjectStore;
use crate::error::{ErrorKind, Result};
use crate::models::{Cursor, ListPage, ObjectMetadata, ObjectRecord};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// A store call, as recorded by [`MockStore::calls`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List(Option<Cursor>),
    Head(String),
    Replace(String),
}

/// In-memory object store for testing.
///
/// Objects are kept in a key-ordered map behind a [`RwLock`], so all trait
/// methods can operate on `&self` without external synchronisation. Listing
/// pages the way S3 does: at most `limit` keys per call, in key order,
/// `truncated` when more keys remain.
///
/// Every call yields to the scheduler once before touching the map, so
/// concurrent inspections and rewrites genuinely interleave.
///
/// # Examples
///
/// ```
/// use remime_storage::backend::MockStore;
/// use remime_storage::{ObjectMetadata, ObjectStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MockStore::with_objects([
///     ("a.json", ObjectMetadata::with_content_type("text/plain")),
/// ]);
/// let metadata = store.head("a.json").await?;
/// store.replace_metadata("a.json", "application/json", &metadata).await?;
/// assert_eq!(store.replaced().await, ["a.json"]);
/// # Ok(())
/// # }
/// ```
pub struct MockStore {
    name: String,
    region: String,
    objects: RwLock<BTreeMap<String, ObjectMetadata>>,
    /// Issue continuation tokens instead of leaving the caller to fall back
    /// on the last key.
    tokens: bool,
    /// Re-include the cursor key at the start of the next page, simulating
    /// pages that overlap at their boundary.
    inclusive: bool,
    fail_head: HashSet<String>,
    fail_replace: HashSet<String>,
    fail_list_from: Option<usize>,
    list_calls: AtomicUsize,
    calls: RwLock<Vec<Call>>,
    inspected: RwLock<Vec<String>>,
    replaced: RwLock<Vec<String>>,
}

impl MockStore {
    /// Create a mock store pre-populated with objects.
    pub fn with_objects(objects: impl IntoIterator<Item = (impl Into<String>, ObjectMetadata)>) -> Self {
        Self {
            name: "mock".to_string(),
            region: "mock-region-1".to_string(),
            objects: RwLock::new(objects.into_iter().map(|(key, metadata)| (key.into(), metadata)).collect()),
            tokens: false,
            inclusive: false,
            fail_head: HashSet::new(),
            fail_replace: HashSet::new(),
            fail_list_from: None,
            list_calls: AtomicUsize::new(0),
            calls: RwLock::new(Vec::new()),
            inspected: RwLock::new(Vec::new()),
            replaced: RwLock::new(Vec::new()),
        }
    }

    /// Change the bucket name of the mock store.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Issue a continuation token with every truncated page.
    pub fn with_tokens(mut self) -> Self {
        self.tokens = true;
        self
    }

    /// Make cursors inclusive, so consecutive pages share a boundary key.
    pub fn with_inclusive_cursor(mut self) -> Self {
        self.inclusive = true;
        self
    }

    /// Fail every metadata fetch for `key`.
    pub fn fail_head(mut self, key: impl Into<String>) -> Self {
        self.fail_head.insert(key.into());
        self
    }

    /// Fail every metadata replace for `key`.
    pub fn fail_replace(mut self, key: impl Into<String>) -> Self {
        self.fail_replace.insert(key.into());
        self
    }

    /// Fail every listing call from the `call`-th onwards (zero-based).
    pub fn fail_list_from(mut self, call: usize) -> Self {
        self.fail_list_from = Some(call);
        self
    }

    /// Number of listing calls made so far, failed ones included.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Every call made so far, in the order the calls began.
    pub async fn calls(&self) -> Vec<Call> {
        self.calls.read().await.clone()
    }

    /// Keys whose metadata was fetched, in call order.
    pub async fn inspected(&self) -> Vec<String> {
        self.inspected.read().await.clone()
    }

    /// Keys whose metadata was replaced, in call order.
    pub async fn replaced(&self) -> Vec<String> {
        self.replaced.read().await.clone()
    }
}
impl Default for MockStore {
    fn default() -> Self {
        let objects: [(&str, ObjectMetadata); 0] = [];
        Self::with_objects(objects)
    }
}

#[async_trait]
impl ObjectStore for MockStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn region(&self) -> &str {
        &self.region
    }

    async fn list_page(&self, prefix: Option<&str>, cursor: Option<&Cursor>, limit: u32) -> Result<ListPage> {
        let call = self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.calls.write().await.push(Call::List(cursor.cloned()));
        tokio::task::yield_now().await;
        if self.fail_list_from.is_some_and(|from| call >= from) {
            exn::bail!(ErrorKind::Network(format!("listing call {call} refused")));
        }
        let start = match cursor {
            Some(Cursor::Token(key) | Cursor::After(key)) if self.inclusive => Bound::Included(key.clone()),
            Some(Cursor::Token(key) | Cursor::After(key)) => Bound::Excluded(key.clone()),
            None => Bound::Unbounded,
        };
        let guard = self.objects.read().await;
        let mut matching = guard
            .range((start, Bound::Unbounded))
            .filter(|(key, _)| prefix.is_none_or(|prefix| key.starts_with(prefix)))
            .map(|(key, _)| ObjectRecord::new(key.clone(), 0));
        let objects: Vec<_> = matching.by_ref().take(limit as usize).collect();
        let truncated = matching.next().is_some();
        let next_token = match (self.tokens && truncated, objects.last()) {
            (true, Some(last)) => Some(last.key.clone()),
            _ => None,
        };
        Ok(ListPage {
            objects,
            truncated,
            next_token,
        })
    }

    async fn head(&self, key: &str) -> Result<ObjectMetadata> {
        self.calls.write().await.push(Call::Head(key.to_string()));
        tokio::task::yield_now().await;
        self.inspected.write().await.push(key.to_string());
        if self.fail_head.contains(key) {
            exn::bail!(ErrorKind::Network(format!("metadata fetch for {key} refused")));
        }
        self.objects.read().await.get(key).cloned().ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(key.to_string())))
    }

    async fn replace_metadata(&self, key: &str, content_type: &str, metadata: &ObjectMetadata) -> Result<()> {
        self.calls.write().await.push(Call::Replace(key.to_string()));
        tokio::task::yield_now().await;
        if self.fail_replace.contains(key) {
            exn::bail!(ErrorKind::BackendError(format!("metadata replace for {key} refused")));
        }
        let mut guard = self.objects.write().await;
        let stored = guard.get_mut(key).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(key.to_string())))?;
        *stored = ObjectMetadata {
            content_type: Some(content_type.to_string()),
            custom: metadata.custom.clone(),
            headers: metadata.headers.clone(),
        };
        drop(guard);
        self.replaced.write().await.push(key.to_string());
        Ok(())
    }
}
