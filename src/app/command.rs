//! Commands returned by widgets from `handle_message`.
//!
//! The screen applies focus and overlay commands itself; everything else is
//! handed to the loop.

use std::fmt;

use super::handle::TaskContext;
use super::message::Message;
use crate::widget::Widget;

/// Background work started by [`Command::RunEffect`] or `AppHandle::spawn`.
pub type Task = Box<dyn FnOnce(TaskContext) + Send>;

/// A request from a widget to the screen or the loop.
pub enum Command {
    /// Stop the loop after the current step.
    Quit,
    /// Move focus forward in the top layer.
    FocusNext,
    /// Move focus backward in the top layer.
    FocusPrev,
    /// Push a new layer on top of the stack.
    PushOverlay { root: Box<dyn Widget>, modal: bool },
    /// Remove the top layer (never the base layer).
    PopOverlay,
    /// Queue a message for the loop, ahead of pending input.
    SendMsg(Message),
    /// Run a task on a background thread.
    RunEffect(Task),
    /// Force a full redraw.
    Refresh,
}

impl Command {
    pub fn push_overlay(root: impl Widget + 'static, modal: bool) -> Self {
        Command::PushOverlay {
            root: Box::new(root),
            modal,
        }
    }

    pub fn run_effect(task: impl FnOnce(TaskContext) + Send + 'static) -> Self {
        Command::RunEffect(Box::new(task))
    }

    /// Whether the screen consumes this command.
    pub(crate) fn is_screen_command(&self) -> bool {
        matches!(
            self,
            Command::FocusNext
                | Command::FocusPrev
                | Command::PushOverlay { .. }
                | Command::PopOverlay
        )
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Quit => f.write_str("Quit"),
            Command::FocusNext => f.write_str("FocusNext"),
            Command::FocusPrev => f.write_str("FocusPrev"),
            Command::PushOverlay { root, modal } => f
                .debug_struct("PushOverlay")
                .field("root", &root.display_name())
                .field("modal", modal)
                .finish(),
            Command::PopOverlay => f.write_str("PopOverlay"),
            Command::SendMsg(msg) => f.debug_tuple("SendMsg").field(msg).finish(),
            Command::RunEffect(_) => f.write_str("RunEffect(..)"),
            Command::Refresh => f.write_str("Refresh"),
        }
    }
}
