//! Mouse events and the hit-test grid.
//!
//! # API
//!
//! - `MouseEvent` - pointer event in screen cells
//! - `HitGrid` - O(1) coordinate to widget lookup, rebuilt by the screen
//!   whenever layout or the layer stack changes
//!
//! # Example
//!
//! ```ignore
//! use spark_runtime::state::mouse::{HitGrid, MouseButton, MouseEvent};
//!
//! let mut grid = HitGrid::new(80, 24);
//! grid.fill_rect(Rect::new(5, 5, 10, 3), button.id());
//! assert_eq!(grid.get(7, 6), Some(button.id()));
//! ```

use super::keyboard::Modifiers;
use crate::types::Rect;
use crate::widget::WidgetId;

// =============================================================================
// TYPES
// =============================================================================

/// What the pointer did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseAction {
    Down,
    Up,
    Move,
    Drag,
    Scroll,
}

/// Which button, `None` for moves and scrolls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    #[default]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

/// Wheel direction and step count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollInfo {
    pub direction: ScrollDirection,
    pub delta: u16,
}

/// A pointer event in screen cells, origin top-left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MouseEvent {
    pub action: MouseAction,
    pub button: MouseButton,
    pub x: u16,
    pub y: u16,
    pub modifiers: Modifiers,
    /// Set only when `action` is `Scroll`.
    pub scroll: Option<ScrollInfo>,
}

impl MouseEvent {
    pub fn new(action: MouseAction, button: MouseButton, x: u16, y: u16) -> Self {
        Self {
            action,
            button,
            x,
            y,
            modifiers: Modifiers::default(),
            scroll: None,
        }
    }

    pub fn scroll(x: u16, y: u16, direction: ScrollDirection, delta: u16) -> Self {
        Self {
            scroll: Some(ScrollInfo { direction, delta }),
            ..Self::new(MouseAction::Scroll, MouseButton::None, x, y)
        }
    }

    pub fn down(button: MouseButton, x: u16, y: u16) -> Self {
        Self::new(MouseAction::Down, button, x, y)
    }

    pub fn up(button: MouseButton, x: u16, y: u16) -> Self {
        Self::new(MouseAction::Up, button, x, y)
    }

    /// Pointer motion with no button held.
    pub fn move_to(x: u16, y: u16) -> Self {
        Self::new(MouseAction::Move, MouseButton::None, x, y)
    }
}

// =============================================================================
// HIT GRID
// =============================================================================

/// Cell to widget map. Later fills overwrite earlier ones.
#[derive(Debug, Clone)]
pub struct HitGrid {
    width: u16,
    height: u16,
    cells: Vec<Option<WidgetId>>,
}

impl HitGrid {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![None; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Change dimensions. Drops every entry.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.cells.clear();
        self.cells.resize(width as usize * height as usize, None);
    }

    pub fn clear(&mut self) {
        self.cells.fill(None);
    }

    /// Claim every cell of `rect` (clipped to the grid) for `id`.
    pub fn fill_rect(&mut self, rect: Rect, id: WidgetId) {
        let Some(clipped) = rect.intersect(&Rect::new(0, 0, self.width, self.height)) else {
            return;
        };
        let stride = self.width as usize;
        for y in clipped.y..clipped.bottom() {
            let row = y as usize * stride;
            let start = row + clipped.x as usize;
            let end = row + clipped.right() as usize;
            self.cells[start..end].fill(Some(id));
        }
    }

    /// `None` outside the grid or over an unclaimed cell.
    pub fn get(&self, x: u16, y: u16) -> Option<WidgetId> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = y as usize * self.width as usize + x as usize;
        self.cells.get(idx).copied().flatten()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_grid_basic() {
        let mut grid = HitGrid::new(10, 10);
        let id = WidgetId::next();

        assert_eq!(grid.get(0, 0), None);
        grid.fill_rect(Rect::new(2, 2, 3, 3), id);

        assert_eq!(grid.get(2, 2), Some(id));
        assert_eq!(grid.get(4, 4), Some(id));
        assert_eq!(grid.get(5, 5), None);
        assert_eq!(grid.get(1, 2), None);
    }

    #[test]
    fn test_hit_grid_overlap_last_wins() {
        let mut grid = HitGrid::new(10, 10);
        let below = WidgetId::next();
        let above = WidgetId::next();

        grid.fill_rect(Rect::new(0, 0, 5, 5), below);
        grid.fill_rect(Rect::new(2, 2, 5, 5), above);

        assert_eq!(grid.get(1, 1), Some(below));
        assert_eq!(grid.get(3, 3), Some(above));
        assert_eq!(grid.get(6, 6), Some(above));
    }

    #[test]
    fn test_hit_grid_clips_and_resizes() {
        let mut grid = HitGrid::new(4, 4);
        let id = WidgetId::next();
        grid.fill_rect(Rect::new(2, 2, 10, 10), id);
        assert_eq!(grid.get(3, 3), Some(id));
        assert_eq!(grid.get(4, 4), None);

        grid.resize(8, 8);
        assert_eq!(grid.width(), 8);
        assert_eq!(grid.get(3, 3), None);
    }

    #[test]
    fn test_scroll_constructor() {
        let event = MouseEvent::scroll(5, 6, ScrollDirection::Down, 3);
        assert_eq!(event.action, MouseAction::Scroll);
        assert_eq!(
            event.scroll,
            Some(ScrollInfo { direction: ScrollDirection::Down, delta: 3 })
        );
    }
}
