//! Sequential page retrieval.
//!
//! The [`Paginator`] never touches the store itself: it hands out the next
//! [`PageRequest`] and digests the [`ListPage`] the store returned for it.
//! Keeping the request future out of the paginator lets a page stay in flight
//! while the orchestrator is busy with per-object work.

use remime_storage::{Cursor, ListPage};
use std::collections::HashSet;
use std::num::{NonZeroU32, NonZeroU64};

/// Parameters for the next listing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub cursor: Option<Cursor>,
    pub limit: u32,
}

/// Outcome of one listing call, as reported to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResult {
    /// New objects this page contributed.
    pub retrieved: u64,
    /// Running sum of `retrieved` across pages.
    pub total: u64,
    /// 1-based page index.
    pub batch: u64,
    /// Where the next page would resume from.
    pub cursor: Option<Cursor>,
    /// More pages remain. `false` on the final page, whatever the store said.
    pub truncated: bool,
}

/// A digested page: its result and the keys to inspect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub result: PageResult,
    pub keys: Vec<String>,
}

#[derive(Debug)]
pub struct Paginator {
    page_size: NonZeroU32,
    object_cap: Option<NonZeroU64>,
    cursor: Option<Cursor>,
    batch: u64,
    total: u64,
    /// Keys of the previous page, to drop any that a boundary overlap repeats.
    previous: HashSet<String>,
    exhausted: bool,
}

impl Paginator {
    pub fn new(page_size: NonZeroU32, object_cap: Option<NonZeroU64>) -> Self {
        Self {
            page_size,
            object_cap,
            cursor: None,
            batch: 0,
            total: 0,
            previous: HashSet::new(),
            exhausted: false,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Effective limit for the next call: the page size, reduced so that the
    /// object cap can never be exceeded.
    fn limit(&self) -> u32 {
        let page_size = self.page_size.get();
        match self.object_cap {
            Some(cap) => {
                let remaining = cap.get().saturating_sub(self.total);
                u32::try_from(remaining).map_or(page_size, |remaining| remaining.min(page_size))
            },
            None => page_size,
        }
    }

    fn cap_reached(&self) -> bool {
        self.object_cap.is_some_and(|cap| self.total >= cap.get())
    }

    /// The next page to request, or `None` once listing is exhausted.
    pub fn request(&self) -> Option<PageRequest> {
        if self.exhausted {
            return None;
        }
        Some(PageRequest {
            cursor: self.cursor.clone(),
            limit: self.limit(),
        })
    }

    /// Digest the page returned for the last [`request`](Self::request).
    pub fn advance(&mut self, page: ListPage) -> Batch {
        let limit = self.limit();
        let returned = page.objects.len();
        let last_key = page.objects.last().map(|object| object.key.clone());

        let mut keys = Vec::with_capacity(returned);
        let mut seen = HashSet::with_capacity(returned);
        for object in page.objects {
            if self.cap_reached() {
                break;
            }
            if self.previous.contains(&object.key) || !seen.insert(object.key.clone()) {
                tracing::debug!(key = %object.key, "Skipping key already listed");
                continue;
            }
            self.total += 1;
            keys.push(object.key);
        }
        self.previous = seen;
        self.batch += 1;

        let previous_cursor = self.cursor.take();
        self.cursor = page.next_token.map(Cursor::Token).or(last_key.map(Cursor::After)).or(previous_cursor.clone());
        let stalled = returned > 0 && self.cursor == previous_cursor;
        if stalled {
            tracing::warn!(cursor = ?self.cursor, "Listing cursor did not advance; treating page as final");
        }
        // Infallible: a usize (either 32- or 64-bit) will always fit in a u64.
        let short = u64::try_from(returned).unwrap_or(0) < u64::from(limit);
        self.exhausted = short || self.cap_reached() || !page.truncated || stalled;

        Batch {
            result: PageResult {
                retrieved: u64::try_from(keys.len()).unwrap_or(0),
                total: self.total,
                batch: self.batch,
                cursor: self.cursor.clone(),
                truncated: !self.exhausted,
            },
            keys,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remime_storage::ObjectRecord;

    fn paginator(page_size: u32, object_cap: Option<u64>) -> Paginator {
        Paginator::new(NonZeroU32::new(page_size).unwrap(), object_cap.and_then(NonZeroU64::new))
    }

    fn page(keys: &[&str], truncated: bool) -> ListPage {
        ListPage {
            objects: keys.iter().map(|key| ObjectRecord::new(*key, 1)).collect(),
            truncated,
            next_token: None,
        }
    }

    #[test]
    fn test_first_request() {
        let paginator = paginator(1000, None);
        assert_eq!(paginator.request(), Some(PageRequest { cursor: None, limit: 1000 }));
    }

    #[test]
    fn test_batch_boundaries() {
        let mut paginator = paginator(2, None);
        let pages = [page(&["a", "b"], true), page(&["c", "d"], true), page(&["e"], false)];
        let mut results = Vec::new();
        for listed in pages {
            assert!(paginator.request().is_some());
            results.push(paginator.advance(listed).result);
        }
        assert_eq!(results.iter().map(|r| r.retrieved).collect::<Vec<_>>(), [2, 2, 1]);
        assert_eq!(results.iter().map(|r| r.batch).collect::<Vec<_>>(), [1, 2, 3]);
        assert_eq!(results.iter().map(|r| r.total).collect::<Vec<_>>(), [2, 4, 5]);
        assert_eq!(results.iter().map(|r| r.truncated).collect::<Vec<_>>(), [true, true, false]);
        assert_eq!(paginator.request(), None);
    }

    #[test]
    fn test_cursor_falls_back_to_last_key() {
        let mut paginator = paginator(2, None);
        paginator.advance(page(&["a", "b"], true));
        assert_eq!(paginator.request().unwrap().cursor, Some(Cursor::After("b".to_string())));
    }

    #[test]
    fn test_cursor_prefers_token() {
        let mut paginator = paginator(2, None);
        let mut listed = page(&["a", "b"], true);
        listed.next_token = Some("opaque".to_string());
        paginator.advance(listed);
        assert_eq!(paginator.request().unwrap().cursor, Some(Cursor::Token("opaque".to_string())));
    }

    #[test]
    fn test_object_cap_reduces_limit_and_exhausts() {
        let mut paginator = paginator(2, Some(3));
        assert_eq!(paginator.request().unwrap().limit, 2);
        paginator.advance(page(&["a", "b"], true));
        assert_eq!(paginator.request().unwrap().limit, 1);
        let batch = paginator.advance(page(&["c"], true));
        assert_eq!(batch.keys, ["c"]);
        assert_eq!(batch.result.total, 3);
        assert!(!batch.result.truncated, "cap reached even though the store reports more");
        assert!(paginator.is_exhausted());
    }

    #[test]
    fn test_object_cap_smaller_than_page() {
        let mut paginator = paginator(1000, Some(3));
        assert_eq!(paginator.request().unwrap().limit, 3);
        let batch = paginator.advance(page(&["a", "b", "c"], true));
        assert_eq!(batch.result.retrieved, 3);
        assert!(paginator.is_exhausted());
    }

    #[test]
    fn test_object_cap_trims_oversized_page() {
        let mut paginator = paginator(1000, Some(2));
        let batch = paginator.advance(page(&["a", "b", "c"], true));
        assert_eq!(batch.keys, ["a", "b"]);
        assert_eq!(batch.result.total, 2);
    }

    #[test]
    fn test_short_page_is_final_even_if_store_says_truncated() {
        let mut paginator = paginator(3, None);
        let batch = paginator.advance(page(&["a", "b"], true));
        assert!(!batch.result.truncated);
    }

    #[test]
    fn test_store_not_truncated_is_final() {
        let mut paginator = paginator(2, None);
        let batch = paginator.advance(page(&["a", "b"], false));
        assert!(!batch.result.truncated);
        assert_eq!(paginator.request(), None);
    }

    #[test]
    fn test_empty_listing() {
        let mut paginator = paginator(2, None);
        let batch = paginator.advance(page(&[], false));
        assert_eq!(batch.result, PageResult { retrieved: 0, total: 0, batch: 1, cursor: None, truncated: false });
        assert!(batch.keys.is_empty());
    }

    #[test]
    fn test_boundary_overlap_deduplicated() {
        let mut paginator = paginator(2, None);
        paginator.advance(page(&["a", "b"], true));
        let batch = paginator.advance(page(&["b", "c"], true));
        assert_eq!(batch.keys, ["c"]);
        assert_eq!(batch.result.retrieved, 1);
        assert_eq!(batch.result.total, 3);
        assert!(batch.result.truncated, "a full page from the store is not a short page");
        assert_eq!(paginator.request().unwrap().cursor, Some(Cursor::After("c".to_string())));
    }

    #[test]
    fn test_stalled_cursor_is_final() {
        let mut paginator = paginator(1, None);
        paginator.advance(page(&["a"], true));
        let batch = paginator.advance(page(&["a"], true));
        assert!(batch.keys.is_empty());
        assert!(!batch.result.truncated);
    }
}
