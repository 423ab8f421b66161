//! Run completion tracking.
//!
//! The [`CompletionTracker`] is the only writer of [`HandledCounters`] and
//! [`Totals`]. Every other component reports to it with a [`Progress`]
//! message, and it alone decides when the run is [`Done`](Phase::Done).

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    /// Pages are still being requested; no total is authoritative yet.
    #[default]
    Listing,
    /// The final page has been seen. The object total is authoritative; the
    /// transform total becomes so once every object has been inspected.
    AwaitingFinal,
    /// Every object and every rewrite has been accounted for.
    Done,
}

/// A count that may still grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Total {
    Pending(u64),
    Final(u64),
}
impl Total {
    pub fn value(&self) -> u64 {
        match self {
            Self::Pending(n) | Self::Final(n) => *n,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Self::Final(_))
    }

    fn increment(&mut self, by: u64) {
        debug_assert!(!self.is_final(), "finalized total must not grow");
        *self = Self::Pending(self.value() + by);
    }

    fn finalize(&mut self) {
        *self = Self::Final(self.value());
    }
}
impl Default for Total {
    fn default() -> Self {
        Self::Pending(0)
    }
}

/// What the run is measured against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    /// Objects discovered by listing.
    pub objects: Total,
    /// Objects found to need a rewrite.
    pub transforms: Total,
    /// Pages retrieved.
    pub batches: u64,
}

/// Work completed so far. Never decreases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandledCounters {
    /// Objects inspected, failed inspections included.
    pub objects: u64,
    /// Rewrites completed successfully.
    pub transformed: u64,
    /// Inspections and rewrites abandoned after a failure.
    pub failed: u64,
}

/// A completion report sent to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// A page was retrieved, contributing `retrieved` new objects.
    Listed { retrieved: u64, exhausted: bool },
    /// An object's metadata was fetched and compared.
    Inspected { mismatched: bool },
    /// An object's metadata could not be fetched and will not be retried.
    InspectFailed,
    /// A rewrite succeeded.
    Rewritten,
    /// A rewrite failed and will not be retried.
    RewriteFailed,
}

/// Final accounting of a run, produced exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub handled: HandledCounters,
    pub totals: Totals,
}

/// Aggregates progress from every page, inspection and rewrite.
///
/// # Examples
///
/// ```
/// use remime_engine::{CompletionTracker, Phase, Progress};
///
/// let mut tracker = CompletionTracker::default();
/// assert!(tracker.record(Progress::Listed { retrieved: 1, exhausted: false }).is_none());
/// // Numerically "everything is handled", but listing isn't over yet.
/// assert!(tracker.record(Progress::Inspected { mismatched: false }).is_none());
/// assert!(tracker.record(Progress::Listed { retrieved: 0, exhausted: true }).is_some());
/// assert_eq!(tracker.phase(), Phase::Done);
/// ```
#[derive(Debug, Default)]
pub struct CompletionTracker {
    phase: Phase,
    handled: HandledCounters,
    totals: Totals,
    /// Rewrites that failed: settled, but never counted as transformed.
    abandoned: u64,
}

impl CompletionTracker {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn handled(&self) -> HandledCounters {
        self.handled
    }

    pub fn totals(&self) -> Totals {
        self.totals
    }

    /// Apply a progress report, returning the [`Summary`] if (and only if)
    /// this report completed the run.
    pub fn record(&mut self, progress: Progress) -> Option<Summary> {
        if self.phase == Phase::Done {
            tracing::warn!(?progress, "Progress reported after run completed; ignoring");
            return None;
        }
        match progress {
            Progress::Listed { retrieved, exhausted } => {
                self.totals.batches += 1;
                self.totals.objects.increment(retrieved);
                if exhausted {
                    self.totals.objects.finalize();
                    self.phase = Phase::AwaitingFinal;
                }
            },
            Progress::Inspected { mismatched } => {
                self.handled.objects += 1;
                if mismatched {
                    self.totals.transforms.increment(1);
                }
            },
            Progress::InspectFailed => {
                self.handled.objects += 1;
                self.handled.failed += 1;
            },
            Progress::Rewritten => self.handled.transformed += 1,
            Progress::RewriteFailed => {
                self.handled.failed += 1;
                self.abandoned += 1;
            },
        }
        if self.phase == Phase::AwaitingFinal && self.handled.objects == self.totals.objects.value() {
            // Every object has been inspected: no further mismatch can appear.
            self.totals.transforms.finalize();
        }
        debug_assert!(!self.totals.objects.is_final() || self.handled.objects <= self.totals.objects.value());
        debug_assert!(
            !self.totals.transforms.is_final()
                || self.handled.transformed + self.abandoned <= self.totals.transforms.value()
        );
        self.check()
    }

    fn check(&mut self) -> Option<Summary> {
        if self.phase != Phase::AwaitingFinal {
            return None;
        }
        let (Total::Final(objects), Total::Final(transforms)) = (self.totals.objects, self.totals.transforms) else {
            return None;
        };
        if self.handled.objects != objects || self.handled.transformed + self.abandoned != transforms {
            return None;
        }
        self.phase = Phase::Done;
        Some(Summary {
            handled: self.handled,
            totals: self.totals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn listed(retrieved: u64, exhausted: bool) -> Progress {
        Progress::Listed { retrieved, exhausted }
    }

    fn inspected(mismatched: bool) -> Progress {
        Progress::Inspected { mismatched }
    }

    /// Feed every report, returning the index of the one that completed the run.
    fn completes_at(reports: &[Progress]) -> Option<usize> {
        let mut tracker = CompletionTracker::default();
        let mut done = None;
        for (i, report) in reports.iter().enumerate() {
            if tracker.record(*report).is_some() {
                assert!(done.is_none(), "summary produced twice");
                done = Some(i);
            }
        }
        done
    }

    #[rstest]
    #[case::empty(&[listed(0, true)], Some(0))]
    #[case::clean(&[listed(2, true), inspected(false), inspected(false)], Some(2))]
    #[case::rewrite_last(&[listed(1, true), inspected(true), Progress::Rewritten], Some(2))]
    #[case::stale_equality_while_listing(
        &[listed(1, false), inspected(false), listed(1, true), inspected(false)],
        Some(3)
    )]
    #[case::final_page_completes(&[listed(1, false), inspected(false), listed(0, true)], Some(2))]
    #[case::pending_rewrite_blocks(&[listed(2, true), inspected(true), inspected(false)], None)]
    #[case::rewrite_before_last_inspection(
        &[listed(2, true), inspected(true), Progress::Rewritten, inspected(false)],
        Some(3)
    )]
    #[case::failed_rewrite_settles(&[listed(1, true), inspected(true), Progress::RewriteFailed], Some(2))]
    #[case::failed_inspection_settles(&[listed(1, true), Progress::InspectFailed], Some(1))]
    #[case::never_exhausted(&[listed(1, false), inspected(false)], None)]
    fn test_completion(#[case] reports: &[Progress], #[case] expected: Option<usize>) {
        assert_eq!(completes_at(reports), expected);
    }

    #[test]
    fn test_phases() {
        let mut tracker = CompletionTracker::default();
        assert_eq!(tracker.phase(), Phase::Listing);
        tracker.record(listed(2, false));
        assert_eq!(tracker.phase(), Phase::Listing);
        tracker.record(listed(1, true));
        assert_eq!(tracker.phase(), Phase::AwaitingFinal);
        assert_eq!(tracker.totals().objects, Total::Final(3));
        assert_eq!(tracker.totals().transforms, Total::Pending(0));
    }

    #[test]
    fn test_transforms_finalized_after_last_inspection() {
        let mut tracker = CompletionTracker::default();
        tracker.record(listed(2, true));
        tracker.record(inspected(true));
        assert_eq!(tracker.totals().transforms, Total::Pending(1));
        tracker.record(inspected(true));
        assert_eq!(tracker.totals().transforms, Total::Final(2));
    }

    #[test]
    fn test_summary() {
        let mut tracker = CompletionTracker::default();
        tracker.record(listed(2, false));
        tracker.record(inspected(true));
        tracker.record(Progress::Rewritten);
        tracker.record(listed(1, true));
        tracker.record(Progress::InspectFailed);
        let summary = tracker.record(inspected(false)).unwrap();
        assert_eq!(summary.handled, HandledCounters { objects: 3, transformed: 1, failed: 1 });
        assert_eq!(summary.totals.objects, Total::Final(3));
        assert_eq!(summary.totals.transforms, Total::Final(1));
        assert_eq!(summary.totals.batches, 2);
        assert_eq!(tracker.phase(), Phase::Done);
    }

    #[test]
    fn test_reports_after_done_ignored() {
        let mut tracker = CompletionTracker::default();
        assert!(tracker.record(listed(0, true)).is_some());
        assert!(tracker.record(listed(0, true)).is_none());
        assert_eq!(tracker.totals().batches, 1);
    }
}
