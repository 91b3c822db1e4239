//! Style values and the stylesheet cascade.
//!
//! # API
//!
//! - `Style` - sparse colors and attributes; unset fields inherit
//! - `WidgetState` - pseudo-class flags (focus, hover, first-child...)
//! - `Selector` - programmatic compound selector with a descendant chain
//! - `Stylesheet` / `StyleRule` - ordered rules with media conditions
//! - `StyleResolver` - per-pass cascade over a widget tree
//!
//! # Example
//!
//! ```ignore
//! use spark_runtime::style::{Selector, Style, Stylesheet, WidgetState};
//!
//! let mut sheet = Stylesheet::new();
//! sheet.add(Selector::of("Button"), Style::new().fg(Rgba::WHITE));
//! sheet.add(
//!     Selector::of("Button").state(WidgetState::FOCUSED),
//!     Style::new().bold(true),
//! );
//! ```

mod media;
mod resolver;
mod selector;
mod sheet;

pub use media::{MediaContext, MediaQuery, Orientation};
pub use resolver::StyleResolver;
pub use selector::{Selector, Specificity, StyleNode};
pub use sheet::{StyleRule, Stylesheet};

use crate::types::{Attr, Cell, Rgba};

bitflags::bitflags! {
    /// Pseudo-class state of a widget.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct WidgetState: u8 {
        const FOCUSED = 1 << 0;
        const DISABLED = 1 << 1;
        const HOVERED = 1 << 2;
        const ACTIVE = 1 << 3;
        const FIRST_CHILD = 1 << 4;
        const LAST_CHILD = 1 << 5;
    }
}

// =============================================================================
// STYLE
// =============================================================================

/// A sparse style. `None` colors and attributes outside `set` are unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Style {
    pub fg: Option<Rgba>,
    pub bg: Option<Rgba>,
    /// Attribute values; only bits present in `set` are meaningful.
    pub attrs: Attr,
    /// Attributes this style specifies, on or off.
    pub set: Attr,
}

impl Style {
    pub const fn new() -> Self {
        Self {
            fg: None,
            bg: None,
            attrs: Attr::empty(),
            set: Attr::empty(),
        }
    }

    pub fn fg(mut self, color: Rgba) -> Self {
        self.fg = Some(color);
        self
    }

    pub fn bg(mut self, color: Rgba) -> Self {
        self.bg = Some(color);
        self
    }

    /// Specify `attr` as on or off.
    pub fn attr(mut self, attr: Attr, on: bool) -> Self {
        self.set |= attr;
        self.attrs.set(attr, on);
        self
    }

    pub fn bold(self, on: bool) -> Self {
        self.attr(Attr::BOLD, on)
    }

    pub fn italic(self, on: bool) -> Self {
        self.attr(Attr::ITALIC, on)
    }

    pub fn underline(self, on: bool) -> Self {
        self.attr(Attr::UNDERLINE, on)
    }

    pub fn dim(self, on: bool) -> Self {
        self.attr(Attr::DIM, on)
    }

    pub fn inverse(self, on: bool) -> Self {
        self.attr(Attr::INVERSE, on)
    }

    pub fn is_empty(&self) -> bool {
        self.fg.is_none() && self.bg.is_none() && self.set.is_empty()
    }

    /// Attributes that are specified and on.
    pub fn active_attrs(&self) -> Attr {
        self.attrs & self.set
    }

    /// Overlay `other` on top of `self`: every field `other` specifies wins.
    pub fn merge(self, other: Style) -> Style {
        Style {
            fg: other.fg.or(self.fg),
            bg: other.bg.or(self.bg),
            attrs: (self.attrs & !other.set) | (other.attrs & other.set),
            set: self.set | other.set,
        }
    }

    /// Fill every field `self` leaves unset from `parent`.
    pub fn inherit(self, parent: Style) -> Style {
        let missing = parent.set & !self.set;
        Style {
            fg: self.fg.or(parent.fg),
            bg: self.bg.or(parent.bg),
            attrs: (self.attrs & self.set) | (parent.attrs & missing),
            set: self.set | parent.set,
        }
    }

    /// Paint the specified fields onto `cell`.
    pub fn apply(&self, cell: &mut Cell) {
        if let Some(fg) = self.fg {
            cell.fg = fg;
        }
        if let Some(bg) = self.bg {
            cell.bg = bg;
        }
        cell.attrs = (cell.attrs & !self.set) | self.active_attrs();
    }
}

// =============================================================================
// TESTS
// =============================================================================
