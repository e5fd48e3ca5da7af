//! Per-query identity, cancellation, and deadline plumbing shared by every
//! task in one query's operator tree (spec.md §5 "Cancellation... scoped to
//! the per-query task tree").

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

static NEXT_QUERY_ID: AtomicU64 = AtomicU64::new(1);

/// Shared state every operator task in one query's tree holds a clone of.
/// Cloning is cheap (an `Arc` bump) — the inner state is the single source
/// of truth for "has this query been told to stop."
#[derive(Clone)]
pub struct QueryContext {
    inner: Arc<Inner>,
}

struct Inner {
    query_id: u64,
    cancelled: AtomicBool,
    interrupted: AtomicBool,
    notify: Notify,
    deadline: Option<Instant>,
}

impl QueryContext {
    pub fn new(timeout: Option<Duration>) -> Self {
        QueryContext {
            inner: Arc::new(Inner {
                query_id: NEXT_QUERY_ID.fetch_add(1, Ordering::Relaxed),
                cancelled: AtomicBool::new(false),
                interrupted: AtomicBool::new(false),
                notify: Notify::new(),
                deadline: timeout.map(|d| Instant::now() + d),
            }),
        }
    }

    pub fn query_id(&self) -> u64 {
        self.inner.query_id
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// True once [`Self::cancel`] has been called, or the deadline has
    /// passed (spec.md §4.5 "An optional wall-clock timeout per query
    /// aborts the root and propagates cancellation").
    pub fn is_cancelled(&self) -> bool {
        if self.inner.cancelled.load(Ordering::Relaxed) {
            return true;
        }
        matches!(self.inner.deadline, Some(d) if Instant::now() >= d)
    }

    /// Signals every task sharing this context to stop producing
    /// (spec.md §4.5 "the engine signals all ancestors to stop producing").
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Relaxed);
        self.inner.notify.notify_waiters();
    }

    /// Records that a leaf hit a `BackendError` (connection/auth/query
    /// failure): the leaf closes its queue immediately but upstream
    /// operators keep running on whatever bindings they already have
    /// (spec.md §7 "the result is flagged `Interrupted`"). Distinct from
    /// [`Self::cancel`], which is a clean, error-free abort.
    pub fn mark_interrupted(&self) {
        self.inner.interrupted.store(true, Ordering::Relaxed);
    }

    pub fn is_interrupted(&self) -> bool {
        self.inner.interrupted.load(Ordering::Relaxed)
    }

    /// Suspends until either cancellation fires or the deadline elapses,
    /// whichever is sooner — a single await point operators can race
    /// against their queue read/write (spec.md §5 "Suspension points").
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        match self.inner.deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                tokio::select! {
                    _ = self.inner.notify.notified() => {}
                    _ = tokio::time::sleep(remaining) => {}
                }
            }
            None => self.inner.notify.notified().await,
        }
    }
}
