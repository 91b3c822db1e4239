//! # spark-runtime
//!
//! Reactive terminal UI runtime: a single-owner event loop, a layered screen
//! with focus and hit testing, a flex layout engine and fine-grained
//! reactive state.
//!
//! ## Architecture
//!
//! ```text
//! input / timers / tasks -> AppHandle -> App loop -> Screen (layers)
//!        ^                                              |
//!        +---- Signal / Computed / Effect <- widgets <--+
//! ```
//!
//! The loop thread owns every widget. Other threads post [`Message`]s or run
//! closures on the loop with [`AppHandle::call`]. Reactive cells are
//! thread-safe and can deliver their notifications back onto the loop
//! through [`AppHandle::scheduler`].
//!
//! ## Modules
//!
//! - [`reactive`] - signals, computed values, effects, resources, batching
//! - [`layout`] - flex distribution and the `Flex` container
//! - [`state`] - focus, keyboard, mouse and terminal input
//! - [`screen`] - layers, render pass, dispatch, fault isolation
//! - [`style`] - selectors, stylesheets and the style resolver
//! - [`renderer`] - frame buffer, diff renderer and output backends
//! - [`app`] - the loop, its handle, timers and render sampling
//! - [`persist`] - widget state snapshots

pub mod app;
pub mod error;
pub mod layout;
pub mod persist;
pub mod reactive;
pub mod renderer;
pub mod screen;
pub mod state;
pub mod style;
pub mod types;
pub mod widget;

pub use types::*;

pub use error::{CallError, ConfigError, Error, PersistError, PostError, Result};

pub use app::{
    App, AppConfig, AppHandle, CallOptions, CancelToken, Command, Message, RenderObserver,
    RenderSampler, RenderStats, Services, TaskContext, TimerId,
};

pub use layout::{Axis, Flex, FlexChild, Spacer};

pub use reactive::{Computed, Effect, Resource, ResourceState, Signal, Subscription, Tracker, batch};

pub use renderer::{Backend, CrosstermBackend, FrameBuffer, MemoryBackend};

pub use screen::{Dirty, ErrorReporter, Layer, RenderContext, Screen, WidgetFault};

pub use state::{FocusHandle, FocusScope, KeyboardEvent, Modifiers, MouseEvent};

pub use style::{Style, Stylesheet, WidgetState};

pub use widget::{HandleResult, Widget, WidgetId};
