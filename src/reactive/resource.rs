//! Resource - asynchronously fetched data.
//!
//! Every fetch bumps a generation counter. A completion is applied only if
//! its generation is still the latest, so a slow superseded fetch can never
//! overwrite a newer result.
//!
//! # Example
//!
//! ```ignore
//! let user_id = Signal::new(1);
//! let id = user_id.clone();
//! let user = Resource::new(vec![user_id.dependency()], move || load_user(id.get()));
//!
//! let state = user.get();
//! if state.loading { /* spinner */ }
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::signal::{Dependency, Signal, Subscription};
use super::track::{DepSet, Readable, Trackable};
use super::{Callback, Job, Scheduler};

// =============================================================================
// SPAWNER
// =============================================================================

/// Runs fetch jobs off the calling thread.
pub trait Spawner: Send + Sync {
    fn spawn(&self, job: Job);
}

/// Spawns one OS thread per fetch.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSpawner;

impl Spawner for ThreadSpawner {
    fn spawn(&self, job: Job) {
        let spawned = std::thread::Builder::new()
            .name("spark-resource".into())
            .spawn(job);
        if let Err(err) = spawned {
            tracing::error!(%err, "failed to spawn resource fetch thread");
        }
    }
}

// =============================================================================
// STATE
// =============================================================================

/// Point-in-time view of a resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceState<T, E> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<E>,
}

impl<T, E> Default for ResourceState<T, E> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
        }
    }
}

type Fetcher<T, E> = Arc<dyn Fn() -> Result<T, E> + Send + Sync>;

struct Core<T, E> {
    state: Signal<ResourceState<T, E>>,
    fetcher: Fetcher<T, E>,
    spawner: Arc<dyn Spawner>,
    generation: AtomicU64,
    // Serializes generation checks with state writes.
    apply: Mutex<()>,
    deps: DepSet,
    scheduler: Option<Arc<dyn Scheduler>>,
}

impl<T: Send + 'static, E: Send + 'static> Core<T, E> {
    fn refetch(self: &Arc<Self>) {
        let generation = {
            let _apply = self.apply.lock();
            let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
            self.state.with_mut(|s| {
                s.loading = true;
                s.error = None;
            });
            generation
        };
        self.state.notify();

        let core = self.clone();
        self.spawner.spawn(Box::new(move || {
            let result = (core.fetcher)();
            core.complete(generation, result);
        }));
    }

    fn complete(&self, generation: u64, result: Result<T, E>) {
        {
            let _apply = self.apply.lock();
            if generation != self.generation.load(Ordering::Acquire) {
                tracing::debug!(generation, "discarding stale resource result");
                return;
            }
            self.state.with_mut(|s| {
                s.loading = false;
                match result {
                    Ok(data) => {
                        s.data = Some(data);
                        s.error = None;
                    }
                    Err(err) => {
                        s.data = None;
                        s.error = Some(err);
                    }
                }
            });
        }
        self.state.notify();
    }
}

// =============================================================================
// RESOURCE
// =============================================================================

/// Asynchronously loaded data with loading and error status.
pub struct Resource<T, E> {
    core: Arc<Core<T, E>>,
}

impl<T, E> Clone for Resource<T, E> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<T: Send + 'static, E: Send + 'static> Resource<T, E> {
    /// Start fetching immediately on a new thread, and again whenever a dep changes.
    pub fn new(
        deps: Vec<Dependency>,
        fetcher: impl Fn() -> Result<T, E> + Send + Sync + 'static,
    ) -> Self {
        Self::builder(fetcher).deps(deps).build()
    }

    pub fn builder(
        fetcher: impl Fn() -> Result<T, E> + Send + Sync + 'static,
    ) -> ResourceBuilder<T, E> {
        ResourceBuilder {
            fetcher: Arc::new(fetcher),
            deps: Vec::new(),
            spawner: Arc::new(ThreadSpawner),
            scheduler: None,
        }
    }

    /// Start a new fetch, superseding any in flight.
    pub fn refetch(&self) {
        self.core.refetch();
    }

    /// Unsubscribe from dependencies. In-flight fetches still complete.
    pub fn dispose(&self) {
        self.core.deps.clear();
    }

    pub fn is_loading(&self) -> bool {
        self.core.state.with(|s| s.loading)
    }

    pub fn generation(&self) -> u64 {
        self.core.generation.load(Ordering::Acquire)
    }

    pub fn subscribe(&self, f: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.core.state.subscribe(f)
    }

    pub fn subscribe_with(
        &self,
        scheduler: Arc<dyn Scheduler>,
        f: impl Fn() + Send + Sync + 'static,
    ) -> Subscription {
        self.core.state.subscribe_with(scheduler, f)
    }

    pub fn dependency(&self) -> Dependency {
        self.core.state.dependency()
    }
}

impl<T: Clone + Send + 'static, E: Clone + Send + 'static> Resource<T, E> {
    /// Snapshot of data, loading flag and error.
    pub fn get(&self) -> ResourceState<T, E> {
        self.core.state.get()
    }
}

impl<T: Send + 'static, E: Send + 'static> Trackable for Resource<T, E> {
    fn dependency(&self) -> Dependency {
        Resource::dependency(self)
    }
}

impl<T: Clone + Send + 'static, E: Clone + Send + 'static> Readable for Resource<T, E> {
    type Value = ResourceState<T, E>;

    fn read(&self) -> Self::Value {
        self.get()
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Resource<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("state", &self.core.state)
            .field("generation", &self.core.generation.load(Ordering::Relaxed))
            .finish()
    }
}

/// Configures a [`Resource`] before its first fetch.
pub struct ResourceBuilder<T, E> {
    fetcher: Fetcher<T, E>,
    deps: Vec<Dependency>,
    spawner: Arc<dyn Spawner>,
    scheduler: Option<Arc<dyn Scheduler>>,
}

impl<T: Send + 'static, E: Send + 'static> ResourceBuilder<T, E> {
    pub fn deps(mut self, deps: Vec<Dependency>) -> Self {
        self.deps = deps;
        self
    }

    pub fn spawner(mut self, spawner: Arc<dyn Spawner>) -> Self {
        self.spawner = spawner;
        self
    }

    /// Deliver dependency-triggered refetches through `scheduler`.
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Create the resource and start the first fetch.
    pub fn build(self) -> Resource<T, E> {
        let core = Arc::new(Core {
            state: Signal::with_equality(ResourceState::default(), |_, _| false),
            fetcher: self.fetcher,
            spawner: self.spawner,
            generation: AtomicU64::new(0),
            apply: Mutex::new(()),
            deps: DepSet::default(),
            scheduler: self.scheduler,
        });
        let weak = Arc::downgrade(&core);
        let callback: Callback = Arc::new(move || {
            if let Some(core) = weak.upgrade() {
                core.refetch();
            }
        });
        core.deps
            .replace(&self.deps, &callback, core.scheduler.as_ref());
        core.refetch();
        Resource { core }
    }
}

// =============================================================================
// TESTS
// =============================================================================
