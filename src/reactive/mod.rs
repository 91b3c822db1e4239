//! Reactive primitives.
//!
//! - [`Signal`] - a value cell that notifies subscribers on change
//! - [`Computed`] - a value derived from other cells
//! - [`Effect`] - a side effect re-run when its dependencies change
//! - [`Resource`] - asynchronously fetched data with loading/error state
//! - [`batch`] - defer notifications until a group of writes completes
//!
//! Cells are `Send + Sync` and can be written from any thread. Notification
//! happens outside the cell's lock, either synchronously on the writing
//! thread or through a [`Scheduler`] (the app loop provides one that runs
//! callbacks on the loop thread).
//!
//! # Example
//!
//! ```ignore
//! use spark_runtime::reactive::{Computed, Effect, Signal};
//!
//! let count = Signal::new(1);
//! let c = count.clone();
//! let doubled = Computed::tracked(move |t| t.get(&c) * 2);
//!
//! let d = doubled.clone();
//! let effect = Effect::new(vec![doubled.dependency()], move || {
//!     println!("doubled = {}", d.get());
//! });
//!
//! count.set(2); // prints "doubled = 4"
//! effect.dispose();
//! ```

mod batch;
mod computed;
mod effect;
mod resource;
mod signal;
mod track;

use std::sync::Arc;

pub use batch::{batch, is_batching};
pub use computed::Computed;
pub use effect::Effect;
pub use resource::{Resource, ResourceBuilder, ResourceState, Spawner, ThreadSpawner};
pub use signal::{Dependency, EqualityFn, Signal, Subscribable, Subscription};
pub use track::{Readable, Trackable, Tracker};

/// A subscriber callback.
pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// A unit of work handed to a [`Scheduler`].
pub type Job = Box<dyn FnOnce() + Send>;

/// Decides where and when subscriber callbacks run.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, job: Job);
}
