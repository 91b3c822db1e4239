//! Messages flowing into the loop.
//!
//! Messages come from terminal input, timers, background tasks and the
//! screen itself (focus changes). All of them are `Send`, so any thread can
//! post one through an [`AppHandle`](super::AppHandle).

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::state::keyboard::KeyboardEvent;
use crate::state::mouse::MouseEvent;
use crate::types::Size;
use crate::widget::WidgetId;

/// An event for the application loop.
#[derive(Debug, Clone)]
pub enum Message {
    /// Keyboard input.
    Key(KeyboardEvent),
    /// Pointer input, routed through the hit grid first.
    Mouse(MouseEvent),
    /// Bracketed paste.
    Paste(String),
    /// The terminal changed size.
    Resize(Size),
    /// Frame tick for animations.
    Tick(Instant),
    /// Focus moved within the top layer.
    FocusChanged {
        prev: Option<WidgetId>,
        next: Option<WidgetId>,
    },
    /// Run reactive callbacks scheduled onto the loop.
    QueueFlush,
    /// Request a render pass without a full redraw.
    Invalidate,
    /// Application-defined payload.
    Custom(CustomMsg),
}

impl Message {
    /// Wrap an application value.
    pub fn custom<T: Any + Send + Sync>(value: T) -> Self {
        Message::Custom(CustomMsg::new(value))
    }

    /// Borrow the payload of a `Custom` message as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Message::Custom(custom) => custom.downcast_ref(),
            _ => None,
        }
    }

    /// Short name for logs and fault reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Key(_) => "Key",
            Message::Mouse(_) => "Mouse",
            Message::Paste(_) => "Paste",
            Message::Resize(_) => "Resize",
            Message::Tick(_) => "Tick",
            Message::FocusChanged { .. } => "FocusChanged",
            Message::QueueFlush => "QueueFlush",
            Message::Invalidate => "Invalidate",
            Message::Custom(_) => "Custom",
        }
    }
}

/// Opaque application payload, cheap to clone.
#[derive(Clone)]
pub struct CustomMsg {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl CustomMsg {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }
}

impl fmt::Debug for CustomMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CustomMsg<{}>", self.type_name)
    }
}
