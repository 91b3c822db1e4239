//! Input - crossterm events into loop messages.
//!
//! # API
//!
//! - `convert_event` - crossterm `Event` to [`Message`], `None` for events
//!   the runtime ignores (focus gained/lost)
//! - `convert_key_event` / `convert_mouse_event` - the individual mappings
//! - `EventSource` - where events come from; `CrosstermEvents` reads the
//!   real terminal
//! - `InputReader` - a background task that polls a source and posts
//!   every converted event into the loop
//!
//! # Example
//!
//! ```ignore
//! use spark_runtime::state::input::{CrosstermEvents, InputReader};
//!
//! let reader = InputReader::new(CrosstermEvents);
//! reader.spawn(&app.handle())?;
//! app.run()?;
//! ```

use std::io;
use std::thread::JoinHandle;
use std::time::Duration;

use crossterm::event::{
    self, Event as CrosstermEvent, KeyCode, KeyEvent as CrosstermKeyEvent, KeyEventKind,
    KeyModifiers, MouseButton as CrosstermMouseButton, MouseEvent as CrosstermMouseEvent,
    MouseEventKind,
};

use super::keyboard::{KeyState, KeyboardEvent, Modifiers};
use super::mouse::{MouseAction, MouseButton, MouseEvent, ScrollDirection, ScrollInfo};
use crate::app::{AppHandle, Message, TaskContext};
use crate::types::Size;

// =============================================================================
// EVENT CONVERSION
// =============================================================================

/// Map a terminal event to a loop message.
pub fn convert_event(event: CrosstermEvent) -> Option<Message> {
    match event {
        CrosstermEvent::Key(key) => Some(Message::Key(convert_key_event(key))),
        CrosstermEvent::Mouse(mouse) => Some(Message::Mouse(convert_mouse_event(mouse))),
        CrosstermEvent::Paste(text) => Some(Message::Paste(text)),
        CrosstermEvent::Resize(width, height) => Some(Message::Resize(Size::new(width, height))),
        CrosstermEvent::FocusGained | CrosstermEvent::FocusLost => None,
    }
}

/// Convert crossterm MouseEvent to our MouseEvent
pub fn convert_mouse_event(event: CrosstermMouseEvent) -> MouseEvent {
    let modifiers = convert_modifiers(event.modifiers);
    let (x, y) = (event.column, event.row);
    let scroll = |direction| MouseEvent {
        modifiers,
        ..MouseEvent::scroll(x, y, direction, 1)
    };
    let pressed = |action, button| MouseEvent {
        modifiers,
        ..MouseEvent::new(action, convert_mouse_button(button), x, y)
    };

    match event.kind {
        MouseEventKind::Down(button) => pressed(MouseAction::Down, button),
        MouseEventKind::Up(button) => pressed(MouseAction::Up, button),
        MouseEventKind::Drag(button) => pressed(MouseAction::Drag, button),
        MouseEventKind::Moved => MouseEvent {
            modifiers,
            ..MouseEvent::move_to(x, y)
        },
        MouseEventKind::ScrollUp => scroll(ScrollDirection::Up),
        MouseEventKind::ScrollDown => scroll(ScrollDirection::Down),
        MouseEventKind::ScrollLeft => scroll(ScrollDirection::Left),
        MouseEventKind::ScrollRight => scroll(ScrollDirection::Right),
    }
}

fn convert_mouse_button(btn: CrosstermMouseButton) -> MouseButton {
    match btn {
        CrosstermMouseButton::Left => MouseButton::Left,
        CrosstermMouseButton::Right => MouseButton::Right,
        CrosstermMouseButton::Middle => MouseButton::Middle,
    }
}

/// Convert crossterm KeyEvent to our KeyboardEvent
pub fn convert_key_event(event: CrosstermKeyEvent) -> KeyboardEvent {
    let mut modifiers = convert_modifiers(event.modifiers);
    let key = match event.code {
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Tab => "Tab".to_string(),
        KeyCode::BackTab => {
            modifiers.shift = true;
            "Tab".to_string()
        }
        KeyCode::Backspace => "Backspace".to_string(),
        KeyCode::Delete => "Delete".to_string(),
        KeyCode::Esc => "Escape".to_string(),
        KeyCode::Up => "ArrowUp".to_string(),
        KeyCode::Down => "ArrowDown".to_string(),
        KeyCode::Left => "ArrowLeft".to_string(),
        KeyCode::Right => "ArrowRight".to_string(),
        KeyCode::Home => "Home".to_string(),
        KeyCode::End => "End".to_string(),
        KeyCode::PageUp => "PageUp".to_string(),
        KeyCode::PageDown => "PageDown".to_string(),
        KeyCode::F(n) => format!("F{n}"),
        KeyCode::Insert => "Insert".to_string(),
        _ => String::new(),
    };

    let state = match event.kind {
        KeyEventKind::Press => KeyState::Press,
        KeyEventKind::Repeat => KeyState::Repeat,
        KeyEventKind::Release => KeyState::Release,
    };

    KeyboardEvent {
        key,
        modifiers,
        state,
    }
}

fn convert_modifiers(mods: KeyModifiers) -> Modifiers {
    Modifiers {
        ctrl: mods.contains(KeyModifiers::CONTROL),
        alt: mods.contains(KeyModifiers::ALT),
        shift: mods.contains(KeyModifiers::SHIFT),
        meta: mods.intersects(KeyModifiers::META | KeyModifiers::SUPER),
    }
}

// =============================================================================
// EVENT SOURCES
// =============================================================================

/// Something that yields terminal events.
pub trait EventSource: Send {
    /// Wait up to `timeout` for the next event.
    fn poll_event(&mut self, timeout: Duration) -> io::Result<Option<CrosstermEvent>>;
}

/// The process terminal, through crossterm's global reader.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrosstermEvents;

impl EventSource for CrosstermEvents {
    fn poll_event(&mut self, timeout: Duration) -> io::Result<Option<CrosstermEvent>> {
        if event::poll(timeout)? {
            event::read().map(Some)
        } else {
            Ok(None)
        }
    }
}

// =============================================================================
// INPUT READER
// =============================================================================

/// Feeds an [`EventSource`] into the loop until shutdown.
pub struct InputReader<S> {
    source: S,
    poll_interval: Duration,
}

impl<S: EventSource + 'static> InputReader<S> {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

    pub fn new(source: S) -> Self {
        Self {
            source,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
        }
    }

    /// How long one poll waits before checking for shutdown again.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Start reading on a background thread.
    pub fn spawn(self, handle: &AppHandle) -> io::Result<JoinHandle<()>> {
        handle.spawn(move |ctx| self.run(ctx))
    }

    /// Read until the loop shuts down, the source fails or a post fails.
    pub fn run(mut self, ctx: TaskContext) {
        while !ctx.is_shutdown() {
            match self.source.poll_event(self.poll_interval) {
                Ok(Some(event)) => {
                    let Some(msg) = convert_event(event) else {
                        continue;
                    };
                    if let Err(err) = ctx.post(msg) {
                        tracing::debug!(%err, "input reader stopping");
                        return;
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(%err, "terminal input failed");
                    return;
                }
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn mouse(kind: MouseEventKind, modifiers: KeyModifiers) -> CrosstermMouseEvent {
        CrosstermMouseEvent {
            kind,
            column: 10,
            row: 5,
            modifiers,
        }
    }

    #[test]
    fn test_convert_mouse_down() {
        let event = convert_mouse_event(mouse(MouseEventKind::Down(CrosstermMouseButton::Left), KeyModifiers::empty()));

        assert_eq!(event.action, MouseAction::Down);
        assert_eq!(event.button, MouseButton::Left);
        assert_eq!((event.x, event.y), (10, 5));
        assert!(!event.modifiers.ctrl);
        assert!(event.scroll.is_none());
    }

    #[test]
    fn test_convert_mouse_scroll_directions() {
        let directions = [
            (MouseEventKind::ScrollUp, ScrollDirection::Up),
            (MouseEventKind::ScrollDown, ScrollDirection::Down),
            (MouseEventKind::ScrollLeft, ScrollDirection::Left),
            (MouseEventKind::ScrollRight, ScrollDirection::Right),
        ];

        for (kind, expected) in directions {
            let event = convert_mouse_event(mouse(kind, KeyModifiers::empty()));
            assert_eq!(event.action, MouseAction::Scroll);
            assert_eq!(event.scroll, Some(ScrollInfo { direction: expected, delta: 1 }));
        }
    }

    #[test]
    fn test_convert_mouse_with_modifiers() {
        let event = convert_mouse_event(mouse(
            MouseEventKind::Drag(CrosstermMouseButton::Middle),
            KeyModifiers::CONTROL | KeyModifiers::SHIFT,
        ));

        assert_eq!(event.action, MouseAction::Drag);
        assert_eq!(event.button, MouseButton::Middle);
        assert!(event.modifiers.ctrl);
        assert!(event.modifiers.shift);
        assert!(!event.modifiers.alt);
    }

    #[test]
    fn test_convert_keys() {
        let key = convert_key_event(CrosstermKeyEvent::new(KeyCode::Char('q'), KeyModifiers::CONTROL));
        assert_eq!(key.key, "q");
        assert!(key.modifiers.ctrl);
        assert_eq!(key.state, KeyState::Press);

        let back = convert_key_event(CrosstermKeyEvent::new(KeyCode::BackTab, KeyModifiers::empty()));
        assert_eq!(back.key, "Tab");
        assert!(back.modifiers.shift);

        let f5 = convert_key_event(CrosstermKeyEvent::new(KeyCode::F(5), KeyModifiers::empty()));
        assert_eq!(f5.key, "F5");
    }

    #[test]
    fn test_convert_event_kinds() {
        assert!(matches!(
            convert_event(CrosstermEvent::Resize(80, 24)),
            Some(Message::Resize(size)) if size == Size::new(80, 24)
        ));
        assert!(matches!(
            convert_event(CrosstermEvent::Paste("hi".into())),
            Some(Message::Paste(text)) if text == "hi"
        ));
        assert!(convert_event(CrosstermEvent::FocusGained).is_none());
    }
}
