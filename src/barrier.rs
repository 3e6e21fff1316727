// src/barrier.rs

//! N-of-N countdown barrier used to gate a node on its predecessors.

use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::Notify;

/// A counting barrier: `wait` blocks until `notify` has been called
/// `threshold` times.
///
/// Each predecessor of a node calls [`Barrier::notify`] once when it
/// finishes; the node itself parks in [`Barrier::wait`]. The release permit
/// is produced exactly once, when the counter first reaches the threshold.
/// `tokio::sync::Notify` stores the permit, so notifying before anyone
/// waits is safe.
///
/// A barrier is wired to exactly one waiter and is never reused across
/// runs; every run plans fresh barriers.
#[derive(Debug)]
pub struct Barrier {
    threshold: u32,
    counter: AtomicU32,
    signal: Notify,
}

impl Barrier {
    /// Create a barrier that releases after `threshold` notifications.
    /// A threshold of zero never waits.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            counter: AtomicU32::new(0),
            signal: Notify::new(),
        }
    }

    /// Record one predecessor completion. Safe to call concurrently.
    pub fn notify(&self) {
        if self.counter.fetch_add(1, Ordering::AcqRel) + 1 == self.threshold {
            self.signal.notify_one();
        }
    }

    /// Park until every predecessor has notified.
    pub async fn wait(&self) {
        if self.threshold == 0 {
            return;
        }
        self.signal.notified().await;
    }

    /// Release the waiter regardless of the counter.
    ///
    /// Used when a run aborts: runners still parked in `wait` must be
    /// unblocked rather than leaked. The caller is expected to re-check the
    /// run's abort flag after waking.
    pub fn force_release(&self) {
        self.signal.notify_one();
    }
}
