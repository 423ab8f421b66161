use crate::error::{ErrorKind, Result};
use crate::inspect::{Inspection, inspect};
use crate::paginate::{PageRequest, PageResult, Paginator};
use crate::rewrite::{Rewrite, rewrite};
use crate::settings::{FailurePolicy, Settings};
use crate::tracker::{CompletionTracker, Progress, Summary};
use async_stream::stream;
use exn::ResultExt;
use futures::future::{BoxFuture, FutureExt, OptionFuture};
use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt};
use remime_mime::MimeResolver;
use remime_storage::error::Result as StorageResult;
use remime_storage::{ListPage, StoreHandle};
use std::collections::VecDeque;

/// Progress events emitted by [`fix`].
///
/// Events follow a strict ordering:
/// 1. [`Connected`](Self::Connected) exactly once, before anything else.
/// 2. [`BatchFinished`](Self::BatchFinished) once per page, in page order,
///    interleaved with [`Transformed`](Self::Transformed) events.
/// 3. [`AllBatchesFinished`](Self::AllBatchesFinished) exactly once, right
///    after the final page.
/// 4. [`End`](Self::End) exactly once, last.
///
/// An error may terminate the stream early, in which case
/// [`End`](Self::End) is never emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixEvent {
    Connected { bucket: String, region: String },
    BatchFinished(PageResult),
    AllBatchesFinished { batches: u64, total: u64 },
    /// An object's content-type was rewritten. `number` counts rewrites so far.
    Transformed { key: String, content_type: String, number: u64 },
    End(Summary),
}

/// Per-object work waiting for a slot in the pool.
enum Task {
    Inspect(String),
    Rewrite(Rewrite),
}

/// Per-object work that has settled.
enum Outcome {
    Inspected(String, StorageResult<Inspection>),
    Rewritten(Rewrite, StorageResult<()>),
}

enum Step {
    Listed(StorageResult<ListPage>),
    Settled(Outcome),
}

/// Probe the store with a single-object listing.
pub async fn connect(store: &StoreHandle, settings: &Settings) -> Result<FixEvent> {
    store.list_page(settings.prefix.as_deref(), None, 1).await.or_raise(|| ErrorKind::Connection)?;
    tracing::info!(bucket = store.name(), region = store.region(), "Connected to object store");
    Ok(FixEvent::Connected {
        bucket: store.name().to_string(),
        region: store.region().to_string(),
    })
}

fn request_page<'a>(
    store: &'a StoreHandle,
    settings: &'a Settings,
    request: PageRequest,
) -> BoxFuture<'a, StorageResult<ListPage>> {
    tracing::debug!(cursor = ?request.cursor, limit = request.limit, "Requesting page");
    async move { store.list_page(settings.prefix.as_deref(), request.cursor.as_ref(), request.limit).await }.boxed()
}

fn start<'a>(store: &'a StoreHandle, resolver: &'a dyn MimeResolver, task: Task) -> BoxFuture<'a, Outcome> {
    match task {
        Task::Inspect(key) => async move {
            let result = inspect(store, resolver, key.clone()).await;
            Outcome::Inspected(key, result)
        }
        .boxed(),
        Task::Rewrite(correction) => async move {
            let result = rewrite(store, &correction).await;
            Outcome::Rewritten(correction, result)
        }
        .boxed(),
    }
}

/// Streams [`FixEvent`]s while repairing every object in `store`.
///
/// Pages are requested one at a time; the next request is only issued once
/// every key of the previous page has been dispatched into the pool. Each discovered key is inspected, and
/// each mismatch rewritten, in a pool of at most `settings.concurrency`
/// futures. Work is promoted into the pool in the order it was queued.
///
/// Connection and listing failures always end the stream. Per-object failures
/// are yielded as `Err` items and then handled according to
/// `settings.failure_policy`.
pub fn fix<'a>(
    store: &'a StoreHandle,
    resolver: &'a dyn MimeResolver,
    settings: &'a Settings,
) -> impl Stream<Item = Result<FixEvent>> + 'a {
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        match connect(store, settings).await {
            Ok(event) => {
                yield Ok(event);
            },
            Err(e) => {
                yield Err(e);
                return;
            },
        }

        let mut paginator = Paginator::new(settings.page_size, settings.object_cap);
        let mut tracker = CompletionTracker::default();
        let mut queue = VecDeque::new();
        let mut processing = FuturesUnordered::new();
        let mut listing: Option<BoxFuture<'_, StorageResult<ListPage>>> = None;

        loop {
            while processing.len() < settings.concurrency.get()
                && let Some(task) = queue.pop_front()
            {
                processing.push(start(store, resolver, task));
            }
            // The next page is only requested once everything queued so far
            // has a slot in the pool.
            if listing.is_none()
                && queue.is_empty()
                && let Some(request) = paginator.request()
            {
                listing = Some(request_page(store, settings, request));
            }

            let step = tokio::select! {
                Some(listed) = OptionFuture::from(listing.as_mut()) => Step::Listed(listed),
                Some(outcome) = processing.next(), if !processing.is_empty() => Step::Settled(outcome),
                else => break,
            };

            let summary = match step {
                Step::Listed(Err(e)) => {
                    yield Err(e.raise(ErrorKind::ListRetrieval));
                    return;
                },
                Step::Listed(Ok(page)) => {
                    listing = None;
                    let batch = paginator.advance(page);
                    let exhausted = paginator.is_exhausted();
                    let result = batch.result.clone();
                    tracing::debug!(
                        batch = result.batch,
                        retrieved = result.retrieved,
                        total = result.total,
                        "Page retrieved"
                    );
                    queue.extend(batch.keys.into_iter().map(Task::Inspect));
                    yield Ok(FixEvent::BatchFinished(batch.result));
                    if exhausted {
                        yield Ok(FixEvent::AllBatchesFinished {
                            batches: result.batch,
                            total: result.total,
                        });
                    }
                    tracker.record(Progress::Listed {
                        retrieved: result.retrieved,
                        exhausted,
                    })
                },
                Step::Settled(Outcome::Inspected(_, Ok(inspection))) => {
                    let mismatched = inspection.is_mismatched();
                    if let Some(correction) = inspection.into_rewrite() {
                        queue.push_back(Task::Rewrite(correction));
                    }
                    tracker.record(Progress::Inspected { mismatched })
                },
                Step::Settled(Outcome::Inspected(key, Err(e))) => {
                    tracing::warn!(key = %key, error = ?e, "Could not inspect object");
                    yield Err(e.raise(ErrorKind::ObjectRetrieve(key)));
                    if settings.failure_policy == FailurePolicy::FailFast {
                        return;
                    }
                    tracker.record(Progress::InspectFailed)
                },
                Step::Settled(Outcome::Rewritten(correction, Ok(()))) => {
                    let summary = tracker.record(Progress::Rewritten);
                    tracing::info!(key = %correction.key, content_type = %correction.content_type, "Transformed object");
                    yield Ok(FixEvent::Transformed {
                        key: correction.key,
                        content_type: correction.content_type,
                        number: tracker.handled().transformed,
                    });
                    summary
                },
                Step::Settled(Outcome::Rewritten(correction, Err(e))) => {
                    tracing::warn!(key = %correction.key, error = ?e, "Could not rewrite object");
                    yield Err(e.raise(ErrorKind::Rewrite(correction.key)));
                    if settings.failure_policy == FailurePolicy::FailFast {
                        return;
                    }
                    tracker.record(Progress::RewriteFailed)
                },
            };

            if let Some(summary) = summary {
                tracing::info!(
                    objects = summary.handled.objects,
                    transformed = summary.handled.transformed,
                    failed = summary.handled.failed,
                    batches = summary.totals.batches,
                    "Run complete"
                );
                yield Ok(FixEvent::End(summary));
                return;
            }
        }

        tracing::error!(phase = ?tracker.phase(), handled = ?tracker.handled(), totals = ?tracker.totals(), "Nothing left in flight");
        yield Err(exn::Exn::from(ErrorKind::Incomplete));
    })
}
