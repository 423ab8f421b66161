use crate::rewrite::Rewrite;
use remime_mime::MimeResolver;
use remime_storage::error::Result;
use remime_storage::{ObjectMetadata, StoreHandle};

/// The result of comparing one object's stored content-type with the type
/// its key implies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inspection {
    pub key: String,
    /// `None` when the resolver knows nothing about the key.
    pub expected: Option<String>,
    pub metadata: ObjectMetadata,
}

impl Inspection {
    /// Compare the stored content-type with the expected one.
    ///
    /// The stored value is trimmed before an exact comparison. A missing
    /// stored value compares as the empty string. When no expectation could
    /// be derived the object is never considered mismatched.
    pub fn is_mismatched(&self) -> bool {
        let stored = self.metadata.content_type.as_deref().unwrap_or_default().trim();
        self.expected.as_deref().is_some_and(|expected| stored != expected)
    }

    /// The rewrite this inspection calls for, if any.
    pub fn into_rewrite(self) -> Option<Rewrite> {
        if !self.is_mismatched() {
            return None;
        }
        let content_type = self.expected?;
        Some(Rewrite {
            key: self.key,
            content_type,
            metadata: self.metadata,
        })
    }
}

/// Fetch `key`'s metadata and compare it against `resolver`'s expectation.
pub async fn inspect(store: &StoreHandle, resolver: &dyn MimeResolver, key: String) -> Result<Inspection> {
    let metadata = store.head(&key).await?;
    let expected = resolver.resolve(&key).map(str::to_string);
    let inspection = Inspection { key, expected, metadata };
    tracing::debug!(
        key = %inspection.key,
        stored = inspection.metadata.content_type.as_deref().unwrap_or_default(),
        expected = inspection.expected.as_deref().unwrap_or_default(),
        mismatched = inspection.is_mismatched(),
        "Inspected object"
    );
    Ok(inspection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use remime_mime::ExtensionResolver;
    use remime_storage::backend::MockStore;
    use rstest::rstest;
    use std::sync::Arc;

    fn inspection(key: &str, stored: Option<&str>, expected: Option<&str>) -> Inspection {
        Inspection {
            key: key.to_string(),
            expected: expected.map(str::to_string),
            metadata: ObjectMetadata {
                content_type: stored.map(str::to_string),
                ..ObjectMetadata::default()
            },
        }
    }

    #[rstest]
    #[case(Some("text/plain"), Some("application/json"), true)]
    #[case(Some("application/json"), Some("application/json"), false)]
    #[case(Some("  application/json\n"), Some("application/json"), false)]
    #[case(Some("application/json; charset=utf-8"), Some("application/json"), true)]
    #[case(Some("Application/JSON"), Some("application/json"), true)]
    #[case(None, Some("application/json"), true)]
    #[case(Some("text/plain"), None, false)]
    #[case(None, None, false)]
    fn test_is_mismatched(#[case] stored: Option<&str>, #[case] expected: Option<&str>, #[case] mismatched: bool) {
        assert_eq!(inspection("key", stored, expected).is_mismatched(), mismatched);
    }

    #[test]
    fn test_into_rewrite_carries_metadata() {
        let mut found = inspection("a.json", Some("text/plain"), Some("application/json"));
        found.metadata.custom.insert("owner".to_string(), "team-x".to_string());
        let rewrite = found.clone().into_rewrite().unwrap();
        assert_eq!(rewrite.key, "a.json");
        assert_eq!(rewrite.content_type, "application/json");
        assert_eq!(rewrite.metadata, found.metadata);
        assert!(inspection("b.png", Some("image/png"), Some("image/png")).into_rewrite().is_none());
    }

    #[tokio::test]
    async fn test_inspect_fetches_and_resolves() {
        let store: StoreHandle = Arc::new(MockStore::with_objects([
            ("a.json", ObjectMetadata::with_content_type("text/plain")),
            ("README", ObjectMetadata::with_content_type("text/plain")),
        ]));
        let resolver = ExtensionResolver::default();
        let found = inspect(&store, &resolver, "a.json".to_string()).await.unwrap();
        assert_eq!(found.expected.as_deref(), Some("application/json"));
        assert!(found.is_mismatched());
        let unknown = inspect(&store, &resolver, "README".to_string()).await.unwrap();
        assert!(!unknown.is_mismatched());
    }

    #[tokio::test]
    async fn test_inspect_propagates_fetch_failure() {
        let store: StoreHandle = Arc::new(MockStore::default());
        let err = inspect(&store, &ExtensionResolver::default(), "gone.json".to_string()).await.unwrap_err();
        assert!(matches!(&*err, remime_storage::error::ErrorKind::NotFound(_)));
    }
}
