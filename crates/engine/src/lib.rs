//! Content-type repair engine.
//!
//! Lists every object in a store page by page, compares each object's stored
//! `Content-Type` against the type its key implies, and rewrites mismatches
//! in place. Pages are requested strictly in sequence while the per-object
//! work they produce runs concurrently in a bounded pool, so the totals the
//! run is measured against are only known once listing is exhausted *and*
//! every discovered object has been inspected. The [`CompletionTracker`]
//! owns that decision.
//!
//! The primary entry point is [`fix`], which streams [`FixEvent`]s.

pub mod error;
mod inspect;
mod paginate;
mod rewrite;
mod run;
mod settings;
mod tracker;

pub use crate::inspect::{Inspection, inspect};
pub use crate::paginate::{Batch, PageRequest, PageResult, Paginator};
pub use crate::rewrite::{Rewrite, rewrite};
pub use crate::run::{FixEvent, connect, fix};
pub use crate::settings::{FailurePolicy, Settings};
pub use crate::tracker::{CompletionTracker, HandledCounters, Phase, Progress, Summary, Total, Totals};
