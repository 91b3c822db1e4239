//! Computed - a value derived from other reactive sources.
//!
//! Two forms:
//!
//! - `Computed::new(deps, f)` recomputes `f()` whenever one of the listed
//!   dependencies changes.
//! - `Computed::tracked(f)` passes a [`Tracker`] into `f` and depends on
//!   exactly the sources read through it during the latest evaluation. A
//!   branch not taken stops being a dependency.
//!
//! A computed cell stays subscribed to its sources until [`Computed::stop`]
//! or until its last handle is dropped. Sources hold only a weak reference.

use std::fmt;
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};

use super::signal::{Dependency, Signal, Subscription};
use super::track::{DepSet, Readable, Trackable, Tracker, track_dependencies};
use super::{Callback, Scheduler};

type ExplicitFn<T> = Box<dyn Fn() -> T + Send + Sync>;
type TrackedFn<T> = Box<dyn Fn(&Tracker) -> T + Send + Sync>;

enum Compute<T> {
    Explicit(ExplicitFn<T>),
    Tracked(TrackedFn<T>),
}

struct Core<T> {
    value: Signal<T>,
    compute: Compute<T>,
    deps: DepSet,
    scheduler: Option<Arc<dyn Scheduler>>,
    stopped: AtomicBool,
}

impl<T: Send + 'static> Core<T> {
    fn callback(self: &Arc<Self>) -> Callback {
        let core: Weak<Self> = Arc::downgrade(self);
        Arc::new(move || {
            if let Some(core) = core.upgrade() {
                core.recompute();
            }
        })
    }

    fn recompute(self: &Arc<Self>) {
        if self.stopped.load(Ordering::Acquire) {
            return;
        }
        match &self.compute {
            Compute::Explicit(f) => {
                self.value.set(f());
            }
            Compute::Tracked(f) => {
                let (value, deps) = track_dependencies(|t| f(t));
                if self.stopped.load(Ordering::Acquire) {
                    return;
                }
                self.deps
                    .replace(&deps, &self.callback(), self.scheduler.as_ref());
                self.value.set(value);
            }
        }
    }
}

impl<T> Drop for Core<T> {
    fn drop(&mut self) {
        self.deps.clear();
    }
}

/// A derived reactive value.
pub struct Computed<T> {
    core: Arc<Core<T>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<T: PartialEq + Send + 'static> Computed<T> {
    /// Derive from an explicit dependency list.
    pub fn new(deps: Vec<Dependency>, f: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self::build_explicit(None, deps, Box::new(f))
    }

    /// Like [`Computed::new`], with recomputes delivered through `scheduler`.
    pub fn new_with_scheduler(
        scheduler: Arc<dyn Scheduler>,
        deps: Vec<Dependency>,
        f: impl Fn() -> T + Send + Sync + 'static,
    ) -> Self {
        Self::build_explicit(Some(scheduler), deps, Box::new(f))
    }

    /// Derive with automatic dependency tracking.
    pub fn tracked(f: impl Fn(&Tracker) -> T + Send + Sync + 'static) -> Self {
        Self::build_tracked(None, Box::new(f))
    }

    /// Like [`Computed::tracked`], with recomputes delivered through `scheduler`.
    pub fn tracked_with_scheduler(
        scheduler: Arc<dyn Scheduler>,
        f: impl Fn(&Tracker) -> T + Send + Sync + 'static,
    ) -> Self {
        Self::build_tracked(Some(scheduler), Box::new(f))
    }

    fn build_explicit(
        scheduler: Option<Arc<dyn Scheduler>>,
        deps: Vec<Dependency>,
        f: ExplicitFn<T>,
    ) -> Self {
        let initial = f();
        let core = Arc::new(Core {
            value: Signal::new(initial),
            compute: Compute::Explicit(f),
            deps: DepSet::default(),
            scheduler,
            stopped: AtomicBool::new(false),
        });
        core.deps
            .replace(&deps, &core.callback(), core.scheduler.as_ref());
        Self { core }
    }

    fn build_tracked(scheduler: Option<Arc<dyn Scheduler>>, f: TrackedFn<T>) -> Self {
        let (initial, deps) = track_dependencies(|t| f(t));
        let core = Arc::new(Core {
            value: Signal::new(initial),
            compute: Compute::Tracked(f),
            deps: DepSet::default(),
            scheduler,
            stopped: AtomicBool::new(false),
        });
        core.deps
            .replace(&deps, &core.callback(), core.scheduler.as_ref());
        Self { core }
    }
}

impl<T: Send + 'static> Computed<T> {
    /// Replace the predicate that suppresses no-op recomputes.
    pub fn set_equality(&self, equal: impl Fn(&T, &T) -> bool + Send + Sync + 'static) {
        self.core.value.set_equality(equal);
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.core.value.with(f)
    }

    pub fn subscribe(&self, f: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.core.value.subscribe(f)
    }

    pub fn subscribe_with(
        &self,
        scheduler: Arc<dyn Scheduler>,
        f: impl Fn() + Send + Sync + 'static,
    ) -> Subscription {
        self.core.value.subscribe_with(scheduler, f)
    }

    pub fn dependency(&self) -> Dependency {
        self.core.value.dependency()
    }

    /// Number of sources currently subscribed to.
    pub fn dependency_count(&self) -> usize {
        self.core.deps.len()
    }

    /// Detach from all dependencies. The last value stays readable.
    pub fn stop(&self) {
        self.core.stopped.store(true, Ordering::Release);
        self.core.deps.clear();
    }

    pub fn is_stopped(&self) -> bool {
        self.core.stopped.load(Ordering::Acquire)
    }
}

impl<T: Clone + Send + 'static> Computed<T> {
    pub fn get(&self) -> T {
        self.core.value.get()
    }
}

impl<T: Send + 'static> Trackable for Computed<T> {
    fn dependency(&self) -> Dependency {
        Computed::dependency(self)
    }
}

impl<T: Clone + Send + 'static> Readable for Computed<T> {
    type Value = T;

    fn read(&self) -> T {
        self.get()
    }
}

impl<T: fmt::Debug> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("value", &self.core.value)
            .field("stopped", &self.core.stopped.load(Ordering::Relaxed))
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
