//! Signal - a thread-safe value cell with change notification.
//!
//! # API
//!
//! - `Signal::new(value)` - cell using `PartialEq` to suppress no-op writes
//! - `Signal::with_equality(value, eq)` - cell with a custom predicate
//! - `get` / `with` - read
//! - `set` / `update` - write, returning whether subscribers were notified
//! - `subscribe` / `subscribe_with` - listen for changes
//! - `dependency` - type-erased handle for explicit dependency lists
//!
//! Subscriptions live until cancelled. Dropping a [`Subscription`] keeps the
//! callback registered.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::batch::{self, Notification};
use super::track::{Readable, Trackable};
use super::{Callback, Scheduler};

/// Equality predicate deciding whether a write is a change.
pub type EqualityFn<T> = Arc<dyn Fn(&T, &T) -> bool + Send + Sync>;

// =============================================================================
// SUBSCRIBABLE
// =============================================================================

/// Anything that emits change notifications.
///
/// Implemented by every reactive cell; implement it to feed custom sources
/// into [`Computed`](super::Computed) or [`Effect`](super::Effect).
pub trait Subscribable: Send + Sync {
    /// Register a callback; returns an id for `remove_subscriber`.
    fn add_subscriber(&self, callback: Callback, scheduler: Option<Arc<dyn Scheduler>>) -> u64;

    /// Remove a callback. Unknown ids are ignored.
    fn remove_subscriber(&self, id: u64);
}

/// Type-erased handle to a reactive source.
#[derive(Clone)]
pub struct Dependency {
    source: Arc<dyn Subscribable>,
}

impl Dependency {
    /// Wrap a custom source.
    pub fn new(source: Arc<dyn Subscribable>) -> Self {
        Self { source }
    }

    pub fn subscribe(&self, f: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.attach(Arc::new(f), None)
    }

    pub fn subscribe_with(
        &self,
        scheduler: Arc<dyn Scheduler>,
        f: impl Fn() + Send + Sync + 'static,
    ) -> Subscription {
        self.attach(Arc::new(f), Some(scheduler))
    }

    pub(crate) fn attach(
        &self,
        callback: Callback,
        scheduler: Option<Arc<dyn Scheduler>>,
    ) -> Subscription {
        let id = self.source.add_subscriber(callback, scheduler);
        Subscription {
            source: self.source.clone(),
            id,
            cancelled: AtomicBool::new(false),
        }
    }

    /// Identity of the underlying source, stable for its lifetime.
    pub fn key(&self) -> usize {
        Arc::as_ptr(&self.source) as *const () as usize
    }

    pub fn same_source(&self, other: &Dependency) -> bool {
        self.key() == other.key()
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dependency({:#x})", self.key())
    }
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// A registered callback. Cancel explicitly; drop does not unsubscribe.
pub struct Subscription {
    source: Arc<dyn Subscribable>,
    id: u64,
    cancelled: AtomicBool,
}

impl Subscription {
    /// Remove the callback from its source. Safe to call more than once.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            self.source.remove_subscriber(self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        !self.cancelled.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

// =============================================================================
// SIGNAL
// =============================================================================

struct Subscriber {
    callback: Callback,
    scheduler: Option<Arc<dyn Scheduler>>,
}

struct State<T> {
    value: T,
    equal: EqualityFn<T>,
    subscribers: BTreeMap<u64, Subscriber>,
    next_id: u64,
}

impl<T> State<T> {
    fn snapshot(&self) -> Vec<Notification> {
        self.subscribers
            .values()
            .map(|sub| Notification {
                callback: sub.callback.clone(),
                scheduler: sub.scheduler.clone(),
            })
            .collect()
    }
}

struct Inner<T> {
    state: Mutex<State<T>>,
}

impl<T: Send + 'static> Subscribable for Inner<T> {
    fn add_subscriber(&self, callback: Callback, scheduler: Option<Arc<dyn Scheduler>>) -> u64 {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.subscribers.insert(id, Subscriber { callback, scheduler });
        id
    }

    fn remove_subscriber(&self, id: u64) {
        self.state.lock().subscribers.remove(&id);
    }
}

/// A value cell that notifies subscribers when it changes.
pub struct Signal<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: PartialEq + Send + 'static> Signal<T> {
    /// Create a signal whose writes are compared with `PartialEq`.
    pub fn new(value: T) -> Self {
        Self::with_equality(value, |a: &T, b: &T| a == b)
    }
}

impl<T: Send + 'static> Signal<T> {
    /// Create a signal with a custom equality predicate.
    pub fn with_equality(value: T, equal: impl Fn(&T, &T) -> bool + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    value,
                    equal: Arc::new(equal),
                    subscribers: BTreeMap::new(),
                    next_id: 0,
                }),
            }),
        }
    }

    /// Replace the equality predicate.
    pub fn set_equality(&self, equal: impl Fn(&T, &T) -> bool + Send + Sync + 'static) {
        self.inner.state.lock().equal = Arc::new(equal);
    }

    /// Borrow the current value.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.state.lock().value)
    }

    /// Store `value` and notify subscribers if it differs from the current one.
    ///
    /// Returns `true` if the value changed.
    pub fn set(&self, value: T) -> bool {
        let notifications = {
            let mut state = self.inner.state.lock();
            if (state.equal)(&state.value, &value) {
                return false;
            }
            state.value = value;
            state.snapshot()
        };
        batch::deliver(notifications);
        true
    }

    /// Mutate in place without notifying. Pair with `notify`.
    pub(crate) fn with_mut(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.inner.state.lock().value);
    }

    /// Notify subscribers without changing the value.
    pub(crate) fn notify(&self) {
        let notifications = self.inner.state.lock().snapshot();
        batch::deliver(notifications);
    }

    /// Register a callback run synchronously on change (or deferred by a batch).
    pub fn subscribe(&self, f: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.dependency().subscribe(f)
    }

    /// Register a callback delivered through `scheduler`.
    pub fn subscribe_with(
        &self,
        scheduler: Arc<dyn Scheduler>,
        f: impl Fn() + Send + Sync + 'static,
    ) -> Subscription {
        self.dependency().subscribe_with(scheduler, f)
    }

    pub fn dependency(&self) -> Dependency {
        Dependency::new(self.inner.clone())
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.state.lock().subscribers.len()
    }

    pub fn ptr_eq(&self, other: &Signal<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Clone + Send + 'static> Signal<T> {
    /// Get a copy of the current value.
    pub fn get(&self) -> T {
        self.inner.state.lock().value.clone()
    }

    /// Replace the value with `f(current)`.
    ///
    /// `f` runs outside the lock, so concurrent updates may interleave.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> bool {
        let current = self.get();
        self.set(f(&current))
    }
}

impl<T: Send + 'static> Trackable for Signal<T> {
    fn dependency(&self) -> Dependency {
        Signal::dependency(self)
    }
}

impl<T: Clone + Send + 'static> Readable for Signal<T> {
    type Value = T;

    fn read(&self) -> T {
        self.get()
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Signal")
            .field("value", &state.value)
            .field("subscribers", &state.subscribers.len())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
