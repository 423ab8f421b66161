use remime_storage::error::Result;
use remime_storage::{ObjectMetadata, StoreHandle};

/// An in-place content-type correction for one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub key: String,
    /// The content-type to store.
    pub content_type: String,
    /// Metadata as fetched during inspection; written back unchanged.
    pub metadata: ObjectMetadata,
}

/// Replace the object's content-type, passing every other piece of metadata
/// through untouched.
pub async fn rewrite(store: &StoreHandle, rewrite: &Rewrite) -> Result<()> {
    store.replace_metadata(&rewrite.key, &rewrite.content_type, &rewrite.metadata).await?;
    tracing::debug!(key = %rewrite.key, content_type = %rewrite.content_type, "Rewrote content-type");
    Ok(())
}
