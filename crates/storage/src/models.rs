//! Storage models.
//!
//! These types are shared by every backend: listing results, the position to
//! resume a listing from, and the metadata carried by each stored object.

use std::collections::BTreeMap;
use time::OffsetDateTime;

/// Position to resume a listing from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    /// Opaque continuation token issued by the store.
    Token(String),
    /// Resume strictly after this key. Used when the store did not issue a
    /// token for the previous page.
    After(String),
}

/// A single entry returned by a listing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRecord {
    /// Object key, unique within the bucket
    pub key: String,
    /// Object size in bytes
    pub size: u64,
    /// Last modified timestamp, if the store reported one
    pub modified: Option<OffsetDateTime>,
}
impl ObjectRecord {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            modified: None,
        }
    }

    pub fn with_modified(mut self, modified: OffsetDateTime) -> Self {
        self.modified = Some(modified);
        self
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub objects: Vec<ObjectRecord>,
    /// The store's own claim that more objects remain.
    pub truncated: bool,
    /// Continuation token for the next page, when the store issues one.
    pub next_token: Option<String>,
}

/// System headers that an in-place metadata replace would otherwise reset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreservedHeaders {
    pub cache_control: Option<String>,
    pub content_disposition: Option<String>,
    pub content_encoding: Option<String>,
    pub content_language: Option<String>,
    pub storage_class: Option<String>,
}

/// Metadata stored alongside an object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMetadata {
    /// Stored `Content-Type`, verbatim (untrimmed).
    pub content_type: Option<String>,
    /// User-defined metadata (`x-amz-meta-*` on S3).
    pub custom: BTreeMap<String, String>,
    pub headers: PreservedHeaders,
}
impl ObjectMetadata {
    pub fn with_content_type(content_type: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type.into()),
            ..Self::default()
        }
    }

    pub fn with_custom(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: PreservedHeaders) -> Self {
        self.headers = headers;
        self
    }
}
