//! FrameBuffer and drawing primitives.
//!
//! The FrameBuffer is a 2D grid of Cells that represents what should be displayed
//! on the terminal. All drawing operations work on this buffer.
//!
//! - **Flat storage**: `Vec<Cell>` with row-major indexing.
//! - **Clipping**: drawing functions take an optional clip `Rect`.
//! - **Wide characters**: emoji and CJK characters occupy two cells, the
//!   second holding [`Cell::CONTINUATION`].

use unicode_width::UnicodeWidthChar;

use crate::style::Style;
use crate::types::{Cell, Rect, Size};

// =============================================================================
// FrameBuffer
// =============================================================================

/// A 2D buffer of terminal cells.
///
/// Uses flat storage with row-major indexing: `index = y * width + x`
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    /// Create a new buffer filled with default cells.
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::default(); width as usize * height as usize],
        }
    }

    #[inline]
    pub fn width(&self) -> u16 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// The full buffer area.
    #[inline]
    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    #[inline]
    fn index(&self, x: u16, y: u16) -> usize {
        y as usize * self.width as usize + x as usize
    }

    #[inline]
    pub fn in_bounds(&self, x: u16, y: u16) -> bool {
        x < self.width && y < self.height
    }

    #[inline]
    pub fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        if self.in_bounds(x, y) {
            self.cells.get(self.index(x, y))
        } else {
            None
        }
    }

    #[inline]
    pub fn get_mut(&mut self, x: u16, y: u16) -> Option<&mut Cell> {
        if self.in_bounds(x, y) {
            let idx = self.index(x, y);
            self.cells.get_mut(idx)
        } else {
            None
        }
    }

    /// Raw cells, row-major.
    #[inline]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Reset every cell to the default blank.
    pub fn clear(&mut self) {
        self.cells.fill(Cell::default());
    }

    /// Resize the buffer (clears content).
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.cells.clear();
        self.cells.resize(width as usize * height as usize, Cell::default());
    }

    // =========================================================================
    // Drawing Primitives
    // =========================================================================

    /// Set a single cell. Returns true if the cell was inside the buffer and
    /// the clip.
    pub fn set_cell(&mut self, x: u16, y: u16, cell: Cell, clip: Option<Rect>) -> bool {
        if clip.is_some_and(|c| !c.contains(x, y)) {
            return false;
        }
        match self.get_mut(x, y) {
            Some(slot) => {
                *slot = cell;
                true
            }
            None => false,
        }
    }

    /// Fill `rect` with `cell`, clipped to the buffer and `clip`.
    pub fn fill_rect(&mut self, rect: Rect, cell: Cell, clip: Option<Rect>) {
        let mut area = match rect.intersect(&self.bounds()) {
            Some(area) => area,
            None => return,
        };
        if let Some(clip) = clip {
            area = match area.intersect(&clip) {
                Some(area) => area,
                None => return,
            };
        }
        for row in area.y..area.bottom() {
            let start = self.index(area.x, row);
            let end = self.index(area.right(), row);
            self.cells[start..end].fill(cell);
        }
    }

    /// Draw text starting at (x, y) with `style` painted over blank cells.
    ///
    /// Returns the number of columns advanced (handles wide characters).
    pub fn draw_text(&mut self, x: u16, y: u16, text: &str, style: &Style, clip: Option<Rect>) -> u16 {
        let mut col = x;

        for ch in text.chars() {
            if col >= self.width {
                break;
            }
            let char_width = ch.width().unwrap_or(0) as u16;
            if char_width == 0 {
                continue;
            }
            // A wide char that would straddle the right edge is dropped.
            if char_width == 2 && col + 1 >= self.width {
                break;
            }

            let mut cell = Cell {
                ch,
                ..Cell::default()
            };
            style.apply(&mut cell);
            if self.set_cell(col, y, cell, clip) && char_width == 2 {
                let continuation = Cell {
                    ch: Cell::CONTINUATION,
                    ..cell
                };
                self.set_cell(col + 1, y, continuation, clip);
            }
            col += char_width;
        }

        col.saturating_sub(x)
    }

    /// Text of one row; continuation cells are skipped, missing rows are empty.
    pub fn row_text(&self, y: u16) -> String {
        if y >= self.height {
            return String::new();
        }
        let start = self.index(0, y);
        let end = start + self.width as usize;
        self.cells[start..end]
            .iter()
            .filter(|c| c.ch != Cell::CONTINUATION)
            .map(|c| c.ch)
            .collect()
    }

    /// Every row joined with `'\n'`.
    pub fn to_text(&self) -> String {
        (0..self.height)
            .map(|y| self.row_text(y))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// =============================================================================
// Tests
// =============================================================================
