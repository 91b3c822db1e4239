//! Dependency tracking.
//!
//! A [`Tracker`] is passed into tracked computations and records every cell
//! read through it. It is deliberately `!Send`: one tracked evaluation runs
//! on one thread at a time, and the tracker never escapes it.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;

use super::signal::{Dependency, Subscription};
use super::{Callback, Scheduler};

/// A reactive source that can be recorded as a dependency.
pub trait Trackable {
    fn dependency(&self) -> Dependency;
}

/// A trackable source with a readable value.
pub trait Readable: Trackable {
    type Value;

    fn read(&self) -> Self::Value;
}

/// Records the sources read during one tracked evaluation.
pub struct Tracker {
    deps: RefCell<Vec<Dependency>>,
    _not_send: PhantomData<*const ()>,
}

impl Tracker {
    pub(crate) fn new() -> Self {
        Self {
            deps: RefCell::new(Vec::new()),
            _not_send: PhantomData,
        }
    }

    /// Read a source and record it as a dependency.
    pub fn get<R: Readable + ?Sized>(&self, source: &R) -> R::Value {
        self.track(source);
        source.read()
    }

    /// Record a dependency without reading it.
    pub fn track<S: Trackable + ?Sized>(&self, source: &S) {
        self.add(source.dependency());
    }

    pub fn add(&self, dep: Dependency) {
        let mut deps = self.deps.borrow_mut();
        if !deps.iter().any(|d| d.same_source(&dep)) {
            deps.push(dep);
        }
    }

    pub fn len(&self) -> usize {
        self.deps.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.deps.borrow().is_empty()
    }

    pub(crate) fn into_deps(self) -> Vec<Dependency> {
        self.deps.into_inner()
    }
}

/// Run `f` under a fresh tracker, returning its result and what it read.
pub(crate) fn track_dependencies<T>(f: impl FnOnce(&Tracker) -> T) -> (T, Vec<Dependency>) {
    let tracker = Tracker::new();
    let value = f(&tracker);
    (value, tracker.into_deps())
}

// =============================================================================
// DEPENDENCY SET
// =============================================================================

/// The live subscriptions a derived cell or effect holds on its sources.
#[derive(Default)]
pub(crate) struct DepSet {
    subs: Mutex<Vec<Subscription>>,
}

impl DepSet {
    /// Cancel current subscriptions and subscribe `callback` to `deps`.
    pub(crate) fn replace(
        &self,
        deps: &[Dependency],
        callback: &Callback,
        scheduler: Option<&Arc<dyn Scheduler>>,
    ) {
        let fresh: Vec<Subscription> = deps
            .iter()
            .map(|dep| dep.attach(callback.clone(), scheduler.cloned()))
            .collect();
        let old = std::mem::replace(&mut *self.subs.lock(), fresh);
        for sub in old {
            sub.cancel();
        }
    }

    pub(crate) fn clear(&self) {
        let old = std::mem::take(&mut *self.subs.lock());
        for sub in old {
            sub.cancel();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.subs.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;

    #[test]
    fn test_tracker_dedups_sources() {
        let a = Signal::new(1);
        let b = Signal::new(2);
        let (sum, deps) = track_dependencies(|t| t.get(&a) + t.get(&b) + t.get(&a));
        assert_eq!(sum, 4);
        assert_eq!(deps.len(), 2);
    }

    #[test]
    fn test_depset_replace_cancels_old() {
        let a = Signal::new(1);
        let b = Signal::new(2);
        let set = DepSet::default();
        let cb: Callback = Arc::new(|| {});

        set.replace(&[a.dependency(), b.dependency()], &cb, None);
        assert_eq!(a.subscriber_count(), 1);
        assert_eq!(b.subscriber_count(), 1);

        set.replace(&[b.dependency()], &cb, None);
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 1);
        assert_eq!(set.len(), 1);

        set.clear();
        assert_eq!(b.subscriber_count(), 0);
    }
}
