//! Run counters shared by the enumerators, the deletion workers and the
//! progress reporter.
//!
//! The pipeline never reads these values for control decisions; they exist
//! for reporting only, so relaxed atomics are sufficient.

use std::fmt;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Observer for pipeline progress.
///
/// Injected into every pipeline stage as `Arc<dyn PurgeMetrics>`. The
/// default implementation is [`PurgeCounters`]; tests may supply their own
/// to assert exact call counts.
pub trait PurgeMetrics: Send + Sync {
    /// Objects (versions and delete markers) returned by listing.
    fn add_listed(&self, count: u64);
    /// Objects pushed onto the deletion queue.
    fn add_queued(&self, count: u64);
    /// Objects popped from the deletion queue.
    fn sub_queued(&self, count: u64);
    /// One remote request (list page, delete batch, or bucket delete) issued.
    fn inc_requests(&self);
    fn inc_deletes_pending(&self);
    fn dec_deletes_pending(&self);
    /// Objects the store reported as deleted.
    fn add_deleted(&self, count: u64);
}

/// Lock-free counters backing the progress reporter.
#[derive(Debug, Default)]
pub struct PurgeCounters {
    listed: AtomicU64,
    queued: AtomicI64,
    requests: AtomicU64,
    deletes_pending: AtomicI64,
    deleted: AtomicU64,
}

impl PurgeCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> PurgeStats {
        PurgeStats {
            listed: self.listed.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
            requests: self.requests.load(Ordering::Relaxed),
            deletes_pending: self.deletes_pending.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
        }
    }
}

impl PurgeMetrics for PurgeCounters {
    fn add_listed(&self, count: u64) {
        self.listed.fetch_add(count, Ordering::Relaxed);
    }

    fn add_queued(&self, count: u64) {
        self.queued.fetch_add(count as i64, Ordering::Relaxed);
    }

    fn sub_queued(&self, count: u64) {
        self.queued.fetch_sub(count as i64, Ordering::Relaxed);
    }

    fn inc_requests(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_deletes_pending(&self) {
        self.deletes_pending.fetch_add(1, Ordering::Relaxed);
    }

    fn dec_deletes_pending(&self) {
        self.deletes_pending.fetch_sub(1, Ordering::Relaxed);
    }

    fn add_deleted(&self, count: u64) {
        self.deleted.fetch_add(count, Ordering::Relaxed);
    }
}

/// Point-in-time copy of [`PurgeCounters`].
///
/// `queued` and `deletes_pending` are gauges and are signed so that a torn
/// read between a concurrent increment and decrement is still representable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeStats {
    pub listed: u64,
    pub queued: i64,
    pub requests: u64,
    pub deletes_pending: i64,
    pub deleted: u64,
}

impl Display for PurgeStats {
    // Counter names in alphabetical order.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "deleted:{} deletes_pending:{} listed:{} queued:{} requests:{}",
            self.deleted, self.deletes_pending, self.listed, self.queued, self.requests
        )
    }
}
