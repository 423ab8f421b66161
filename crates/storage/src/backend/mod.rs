//! Object store trait and implementations.
//!
//! This module defines the `ObjectStore` trait, the narrow slice of a bulk
//! object store that a content-type repair pass needs: paged listing, a
//! metadata fetch, and an in-place metadata replace.

#[cfg(feature = "mock")]
mod mock;
mod ro;
#[cfg(feature = "s3")]
mod s3;

#[cfg(feature = "mock")]
pub use self::mock::{Call, MockStore};
pub use self::ro::ReadOnlyStore;
#[cfg(feature = "s3")]
pub use self::s3::S3Backend;
use crate::error::Result;
use crate::models::{Cursor, ListPage, ObjectMetadata};
use async_trait::async_trait;

/// Unified interface for object stores.
///
/// All operations are asynchronous and take `&self`, so a single handle can
/// be shared by many in-flight inspections and rewrites at once.
///
/// # Examples
///
/// ```
/// use remime_storage::{ObjectStore, error::Result};
///
/// async fn count_first_page(store: &dyn ObjectStore) -> Result<usize> {
///     let page = store.list_page(None, None, 1000).await?;
///     Ok(page.objects.len())
/// }
/// ```
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Name of the container (bucket) this store operates on. Used for
    /// events and logging only.
    fn name(&self) -> &str;

    /// Region the container lives in. Used for events and logging only.
    fn region(&self) -> &str;

    /// Fetch a single page of object keys.
    ///
    /// Returns at most `limit` objects, in key order, whose keys start with
    /// `prefix` (if given). When `cursor` is given the listing resumes from
    /// it; an [`After`](Cursor::After) cursor is exclusive.
    ///
    /// # Notes
    /// - `truncated` and `next_token` are whatever the store reports. Callers
    ///   decide for themselves whether listing is exhausted.
    async fn list_page(&self, prefix: Option<&str>, cursor: Option<&Cursor>, limit: u32) -> Result<ListPage>;

    /// Fetch an object's metadata without reading its contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the object
    /// does not exist.
    async fn head(&self, key: &str) -> Result<ObjectMetadata>;

    /// Replace an object's metadata in place, without altering its contents.
    ///
    /// The stored `Content-Type` becomes `content_type`; the custom metadata
    /// and preserved headers in `metadata` are written back exactly as given.
    /// The `content_type` field of `metadata` is ignored.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use remime_storage::{ObjectStore, error::Result};
    /// # async fn example(store: &dyn ObjectStore) -> Result<()> {
    /// let metadata = store.head("data/report.json").await?;
    /// store.replace_metadata("data/report.json", "application/json", &metadata).await?;
    /// # Ok(())
    /// # }
    /// ```
    async fn replace_metadata(&self, key: &str, content_type: &str, metadata: &ObjectMetadata) -> Result<()>;
}
