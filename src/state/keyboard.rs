//! Keyboard events.
//!
//! Keys are named the way the input layer reports them: single characters
//! (`"a"`, `"?"`) or names (`"Enter"`, `"Tab"`, `"ArrowUp"`, `"F5"`).
//!
//! # Example
//!
//! ```ignore
//! use spark_runtime::state::keyboard::{KeyboardEvent, Modifiers};
//!
//! let event = KeyboardEvent::with_modifiers("c", Modifiers::ctrl());
//! assert!(event.is_ctrl("c"));
//! ```

use std::fmt;

// =============================================================================
// TYPES
// =============================================================================

/// Held modifier keys. Super maps to `meta`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl Modifiers {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn ctrl() -> Self {
        Self { ctrl: true, ..Self::default() }
    }

    pub fn alt() -> Self {
        Self { alt: true, ..Self::default() }
    }

    pub fn shift() -> Self {
        Self { shift: true, ..Self::default() }
    }

    pub fn is_empty(&self) -> bool {
        !(self.ctrl || self.alt || self.shift || self.meta)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum KeyState {
    #[default]
    Press,
    Repeat,
    Release,
}

/// One key transition with its modifiers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyboardEvent {
    /// Character or key name, see the module docs.
    pub key: String,
    pub modifiers: Modifiers,
    pub state: KeyState,
}

impl KeyboardEvent {
    /// Plain press of `key`.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            modifiers: Modifiers::default(),
            state: KeyState::Press,
        }
    }

    pub fn with_modifiers(key: impl Into<String>, modifiers: Modifiers) -> Self {
        Self {
            key: key.into(),
            modifiers,
            state: KeyState::Press,
        }
    }

    pub fn is_press(&self) -> bool {
        self.state == KeyState::Press
    }

    /// Unmodified press (shift allowed) of `key`.
    pub fn is(&self, key: &str) -> bool {
        self.key == key && !self.modifiers.ctrl && !self.modifiers.alt && !self.modifiers.meta
    }

    /// Ctrl + `key`.
    pub fn is_ctrl(&self, key: &str) -> bool {
        self.modifiers.ctrl && self.key.eq_ignore_ascii_case(key)
    }

    /// The typed character, if this is a single printable key without ctrl/alt.
    pub fn char(&self) -> Option<char> {
        if self.modifiers.ctrl || self.modifiers.alt {
            return None;
        }
        let mut chars = self.key.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if !c.is_control() => Some(c),
            _ => None,
        }
    }
}

impl fmt::Display for KeyboardEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.ctrl {
            f.write_str("Ctrl+")?;
        }
        if self.modifiers.alt {
            f.write_str("Alt+")?;
        }
        if self.modifiers.meta {
            f.write_str("Meta+")?;
        }
        if self.modifiers.shift && self.key.chars().count() > 1 {
            f.write_str("Shift+")?;
        }
        f.write_str(&self.key)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_only_for_plain_single_keys() {
        assert_eq!(KeyboardEvent::new("a").char(), Some('a'));
        assert_eq!(KeyboardEvent::new("Enter").char(), None);
        assert_eq!(KeyboardEvent::with_modifiers("a", Modifiers::ctrl()).char(), None);
        assert_eq!(KeyboardEvent::with_modifiers("A", Modifiers::shift()).char(), Some('A'));
    }

    #[test]
    fn test_matchers() {
        let tab = KeyboardEvent::new("Tab");
        assert!(tab.is("Tab"));
        assert!(!tab.is_ctrl("Tab"));

        let quit = KeyboardEvent::with_modifiers("Q", Modifiers::ctrl());
        assert!(quit.is_ctrl("q"));
        assert!(!quit.is("Q"));
    }

    #[test]
    fn test_display() {
        let event = KeyboardEvent::with_modifiers(
            "Tab",
            Modifiers { shift: true, ..Modifiers::default() },
        );
        assert_eq!(event.to_string(), "Shift+Tab");
        assert_eq!(KeyboardEvent::with_modifiers("x", Modifiers::ctrl()).to_string(), "Ctrl+x");
    }
}
