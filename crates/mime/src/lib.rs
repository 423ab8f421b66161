//! Expected content-type lookup.
//!
//! Maps an object key to the media type its name implies, using the key's
//! extension. Resolution is purely name-based; object contents are never
//! consulted.

mod table;

use std::collections::BTreeMap;

/// Resolves the content-type an object *should* have, given its key.
pub trait MimeResolver: Send + Sync {
    /// Returns `None` when no expectation can be derived from the key.
    fn resolve(&self, key: &str) -> Option<&str>;
}

/// Extension of the final key segment, ASCII-lowercased.
///
/// Keys without a dot in their final `/`-separated segment, with nothing
/// after the last dot, or ending in `/` (directory markers) have no
/// extension.
///
/// ```
/// use remime_mime::extension;
/// assert_eq!(extension("photos/IMG_01.JPG").as_deref(), Some("jpg"));
/// assert_eq!(extension("archive.tar.gz").as_deref(), Some("gz"));
/// assert_eq!(extension("v1.2/README"), None);
/// assert_eq!(extension("photos/"), None);
/// ```
pub fn extension(key: &str) -> Option<String> {
    let name = key.rsplit('/').next()?;
    match name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => Some(ext.to_ascii_lowercase()),
        _ => None,
    }
}

/// Resolver backed by a built-in extension table, with user overrides.
///
/// # Examples
///
/// ```
/// use remime_mime::{ExtensionResolver, MimeResolver};
///
/// let resolver = ExtensionResolver::default().with_override(".MD", "text/x-markdown");
/// assert_eq!(resolver.resolve("docs/guide.md"), Some("text/x-markdown"));
/// assert_eq!(resolver.resolve("a.json"), Some("application/json"));
/// assert_eq!(resolver.resolve("Makefile"), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExtensionResolver {
    overrides: BTreeMap<String, String>,
}

impl ExtensionResolver {
    /// Map `ext` to `content_type`, taking precedence over the built-in table.
    ///
    /// A leading dot is ignored and the extension is matched
    /// case-insensitively.
    pub fn with_override(mut self, ext: impl AsRef<str>, content_type: impl Into<String>) -> Self {
        let ext = ext.as_ref().trim_start_matches('.').to_ascii_lowercase();
        self.overrides.insert(ext, content_type.into());
        self
    }

    pub fn with_overrides<K, V>(self, overrides: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        overrides.into_iter().fold(self, |resolver, (ext, content_type)| resolver.with_override(ext, content_type))
    }
}

impl MimeResolver for ExtensionResolver {
    fn resolve(&self, key: &str) -> Option<&str> {
        let ext = extension(key)?;
        let resolved = self.overrides.get(&ext).map(String::as_str).or_else(|| table::lookup(&ext));
        if resolved.is_none() {
            tracing::trace!(key, ext = %ext, "No content-type known for extension");
        }
        resolved
    }
}
