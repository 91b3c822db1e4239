//! State Module - per-widget interaction state.
//!
//! - **Focus** - focus handles and the per-layer focus scope
//! - **Keyboard** - key event types
//! - **Mouse** - pointer events and the hit-test grid
//! - **Input** - crossterm conversion and the input reader task

pub mod focus;
pub mod input;
pub mod keyboard;
pub mod mouse;

pub use focus::{FocusChangeFn, FocusHandle, FocusScope};
pub use input::{CrosstermEvents, EventSource, InputReader, convert_event};
pub use keyboard::{KeyState, KeyboardEvent, Modifiers};
pub use mouse::{HitGrid, MouseAction, MouseButton, MouseEvent, ScrollDirection, ScrollInfo};
