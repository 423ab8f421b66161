use serde::{Deserialize, Serialize};
use std::num::{NonZeroU32, NonZeroU64, NonZeroUsize};

/// Objects requested per listing call. Also the most S3 will return.
pub const DEFAULT_PAGE_SIZE: NonZeroU32 = NonZeroU32::new(1000).unwrap();
/// Inspections and rewrites allowed in flight at once.
pub const DEFAULT_CONCURRENCY: NonZeroUsize = NonZeroUsize::new(100).unwrap();

/// How a per-object failure affects the rest of the run.
///
/// Applies identically to metadata fetches and metadata rewrites.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Report the failure and abort the run.
    #[default]
    FailFast,
    /// Report the failure, count the object as failed, and carry on.
    BestEffort,
}

/// Parameters of a single repair run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Only consider keys starting with this prefix.
    pub prefix: Option<String>,
    pub page_size: NonZeroU32,
    /// Hard ceiling on the number of objects inspected; listing stops early
    /// once it is reached.
    pub object_cap: Option<NonZeroU64>,
    pub concurrency: NonZeroUsize,
    pub failure_policy: FailurePolicy,
}
impl Default for Settings {
    fn default() -> Self {
        Self {
            prefix: None,
            page_size: DEFAULT_PAGE_SIZE,
            object_cap: None,
            concurrency: DEFAULT_CONCURRENCY,
            failure_policy: FailurePolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.page_size.get(), 1000);
        assert_eq!(settings.concurrency.get(), 100);
        assert_eq!(settings.object_cap, None);
        assert_eq!(settings.failure_policy, FailurePolicy::FailFast);
    }

    #[test]
    fn test_deserialize_partial() {
        let settings: Settings =
            serde_json::from_str(r#"{"page_size": 2, "object_cap": 3, "failure_policy": "best-effort"}"#).unwrap();
        assert_eq!(settings.page_size.get(), 2);
        assert_eq!(settings.object_cap.map(NonZeroU64::get), Some(3));
        assert_eq!(settings.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(settings.failure_policy, FailurePolicy::BestEffort);
    }

    #[test]
    fn test_zero_rejected() {
        assert!(serde_json::from_str::<Settings>(r#"{"object_cap": 0}"#).is_err());
        assert!(serde_json::from_str::<Settings>(r#"{"concurrency": 0}"#).is_err());
    }
}
