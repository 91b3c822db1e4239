//! Batching - defer notifications until the outermost batch closes.
//!
//! Batch state is per thread. While at least one `batch` is open on the
//! current thread, every notification produced by a cell mutation is queued
//! instead of delivered. Closing the outermost batch replays the queue in
//! the order it was filled. Entries are not deduplicated: a subscriber
//! notified twice inside a batch runs twice after it.
//!
//! # Example
//!
//! ```ignore
//! use spark_runtime::reactive::{batch, Signal};
//!
//! let a = Signal::new(0);
//! let b = Signal::new(0);
//! batch(|| {
//!     a.set(1);
//!     b.set(2);
//! }); // subscribers of a and b run here
//! ```

use std::cell::RefCell;
use std::sync::Arc;

use super::{Callback, Scheduler};

// =============================================================================
// NOTIFICATION
// =============================================================================

/// One pending subscriber invocation.
#[derive(Clone)]
pub(crate) struct Notification {
    pub(crate) callback: Callback,
    pub(crate) scheduler: Option<Arc<dyn Scheduler>>,
}

impl Notification {
    fn fire(self) {
        match self.scheduler {
            Some(scheduler) => {
                let callback = self.callback;
                scheduler.schedule(Box::new(move || callback()));
            }
            None => (self.callback)(),
        }
    }
}

// =============================================================================
// STATE
// =============================================================================

#[derive(Default)]
struct BatchState {
    depth: usize,
    pending: Vec<Notification>,
}

thread_local! {
    static BATCH: RefCell<BatchState> = RefCell::new(BatchState::default());
}

/// Check whether a batch is open on this thread.
pub fn is_batching() -> bool {
    BATCH.with(|b| b.borrow().depth > 0)
}

/// Deliver notifications now, or queue them if a batch is open.
pub(crate) fn deliver(notifications: Vec<Notification>) {
    if notifications.is_empty() {
        return;
    }
    let immediate = BATCH.with(|b| {
        let mut state = b.borrow_mut();
        if state.depth > 0 {
            state.pending.extend(notifications);
            None
        } else {
            Some(notifications)
        }
    });
    if let Some(list) = immediate {
        for notification in list {
            notification.fire();
        }
    }
}

// =============================================================================
// BATCH
// =============================================================================

struct BatchGuard;

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let flushed = BATCH.with(|b| {
            let mut state = b.borrow_mut();
            state.depth -= 1;
            if state.depth == 0 {
                Some(std::mem::take(&mut state.pending))
            } else {
                None
            }
        });
        let Some(pending) = flushed else { return };
        if std::thread::panicking() {
            if !pending.is_empty() {
                tracing::warn!(
                    dropped = pending.len(),
                    "batch closed by panic, discarding notifications"
                );
            }
            return;
        }
        for notification in pending {
            notification.fire();
        }
    }
}

/// Run `f` with notifications deferred until the outermost batch returns.
///
/// Batches nest. Only closing the outermost one flushes.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    BATCH.with(|b| b.borrow_mut().depth += 1);
    let _guard = BatchGuard;
    f()
}

// =============================================================================
// TESTS
// =============================================================================
