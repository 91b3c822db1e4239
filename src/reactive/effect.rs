//! Effect - run a side effect on construction and whenever a dependency changes.
//!
//! An effect stays alive until [`Effect::dispose`]; dropping the handle does
//! not stop it. Its sources own it through their subscriber lists, so an
//! effect that is never disposed lives as long as they do.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::signal::Dependency;
use super::track::{DepSet, Tracker, track_dependencies};
use super::{Callback, Scheduler};

enum Body {
    Explicit(Box<dyn Fn() + Send + Sync>),
    Tracked(Box<dyn Fn(&Tracker) + Send + Sync>),
}

struct Core {
    body: Body,
    deps: DepSet,
    scheduler: Option<Arc<dyn Scheduler>>,
    dead: AtomicBool,
}

impl Core {
    fn callback(self: &Arc<Self>) -> Callback {
        let core = self.clone();
        Arc::new(move || core.run())
    }

    fn run(self: &Arc<Self>) {
        if self.dead.load(Ordering::Acquire) {
            return;
        }
        match &self.body {
            Body::Explicit(f) => f(),
            Body::Tracked(f) => {
                let ((), deps) = track_dependencies(|t| f(t));
                if self.dead.load(Ordering::Acquire) {
                    return;
                }
                self.deps
                    .replace(&deps, &self.callback(), self.scheduler.as_ref());
            }
        }
    }
}

/// Handle to a running side effect.
#[derive(Clone)]
pub struct Effect {
    core: Arc<Core>,
}

impl Effect {
    /// Run `f` now and again whenever one of `deps` changes.
    pub fn new(deps: Vec<Dependency>, f: impl Fn() + Send + Sync + 'static) -> Self {
        Self::start(None, Body::Explicit(Box::new(f)), deps)
    }

    /// Like [`Effect::new`], with re-runs delivered through `scheduler`.
    pub fn with_scheduler(
        scheduler: Arc<dyn Scheduler>,
        deps: Vec<Dependency>,
        f: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self::start(Some(scheduler), Body::Explicit(Box::new(f)), deps)
    }

    /// Run `f` now and again whenever a source it read last time changes.
    pub fn tracked(f: impl Fn(&Tracker) + Send + Sync + 'static) -> Self {
        Self::start(None, Body::Tracked(Box::new(f)), Vec::new())
    }

    pub fn tracked_with_scheduler(
        scheduler: Arc<dyn Scheduler>,
        f: impl Fn(&Tracker) + Send + Sync + 'static,
    ) -> Self {
        Self::start(Some(scheduler), Body::Tracked(Box::new(f)), Vec::new())
    }

    fn start(scheduler: Option<Arc<dyn Scheduler>>, body: Body, deps: Vec<Dependency>) -> Self {
        let explicit = matches!(body, Body::Explicit(_));
        let core = Arc::new(Core {
            body,
            deps: DepSet::default(),
            scheduler,
            dead: AtomicBool::new(false),
        });
        if explicit {
            core.deps
                .replace(&deps, &core.callback(), core.scheduler.as_ref());
        }
        core.run();
        Self { core }
    }

    /// Run the effect once, outside the dependency cycle.
    ///
    /// Goes through the scheduler when one is configured.
    pub fn trigger(&self) {
        match &self.core.scheduler {
            Some(scheduler) => {
                let core = self.core.clone();
                scheduler.schedule(Box::new(move || core.run()));
            }
            None => self.core.run(),
        }
    }

    /// Stop the effect and unsubscribe from its dependencies. Idempotent.
    pub fn dispose(&self) {
        if self.core.dead.swap(true, Ordering::AcqRel) {
            return;
        }
        self.core.deps.clear();
    }

    pub fn is_disposed(&self) -> bool {
        self.core.dead.load(Ordering::Acquire)
    }

    pub fn dependency_count(&self) -> usize {
        self.core.deps.len()
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("disposed", &self.is_disposed())
            .field("dependencies", &self.dependency_count())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
