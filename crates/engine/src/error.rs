//! Error types for the repair engine.
//!
//! Uses [`exn`] for automatic location tracking and error tree construction.

use derive_more::{Display, Error};

/// An engine error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the stage of a run that failed.
///
/// ### Always fatal
/// - [`ErrorKind::Connection`]
/// - [`ErrorKind::ListRetrieval`]
/// - [`ErrorKind::Incomplete`]
///
/// ### Fatal under [`FailurePolicy::FailFast`](crate::FailurePolicy::FailFast)
/// - [`ErrorKind::ObjectRetrieve`]
/// - [`ErrorKind::Rewrite`]
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The initial listing probe failed; the run never started.
    #[display("could not connect to the object store")]
    Connection,
    /// A page request failed after listing had begun.
    #[display("could not retrieve the object listing")]
    ListRetrieval,
    /// Metadata for a discovered object could not be fetched.
    #[display("could not retrieve metadata for {_0}")]
    ObjectRetrieve(#[error(not(source))] String),
    /// The in-place metadata replace for a mismatched object failed.
    #[display("could not rewrite content-type of {_0}")]
    Rewrite(#[error(not(source))] String),
    /// Nothing was left in flight, yet not every object was accounted for.
    #[display("run stopped before every object was accounted for")]
    Incomplete,
}

impl ErrorKind {
    /// Stable tag identifying the kind of failure, for reporting.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Connection => "ConnectionFailed",
            Self::ListRetrieval => "ListRetrievalFailed",
            Self::ObjectRetrieve(_) => "ObjectRetrieveFailed",
            Self::Rewrite(_) => "RewriteFailed",
            Self::Incomplete => "Incomplete",
        }
    }

    /// Returns `true` if the failure concerns a single object rather than the
    /// run as a whole.
    pub fn is_per_object(&self) -> bool {
        matches!(self, Self::ObjectRetrieve(_) | Self::Rewrite(_))
    }
}
