//! Differential renderer.
//!
//! The DiffRenderer compares the current frame to the previous frame and only
//! outputs cells that have changed.
//!
//! # Algorithm
//!
//! 1. Wrap output in a synchronized update block
//! 2. For each cell in the new frame:
//!    - If previous frame exists and cell is unchanged: skip
//!    - Otherwise: emit it through the stateful cell writer
//! 3. Flush the writer once
//! 4. Store current frame as previous for next comparison

use std::io::{self, Write};

use crossterm::queue;
use crossterm::style::{
    Attribute, Color, Print, SetAttribute, SetBackgroundColor, SetForegroundColor,
};
use crossterm::terminal::{BeginSynchronizedUpdate, EndSynchronizedUpdate};

use super::buffer::FrameBuffer;
use crate::types::{Attr, Cell, Rgba};

/// Differential renderer for fullscreen mode.
#[derive(Debug, Default)]
pub struct DiffRenderer {
    cell_writer: CellWriter,
    previous: Option<FrameBuffer>,
}

impl DiffRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the cells that differ from the previous frame, or every cell
    /// when `full` is set or the size changed. Returns the cells written.
    pub fn render<W: Write>(&mut self, out: &mut W, frame: &FrameBuffer, full: bool) -> io::Result<usize> {
        let previous = match &self.previous {
            Some(prev) if !full && prev.size() == frame.size() => Some(prev),
            _ => None,
        };

        queue!(out, BeginSynchronizedUpdate)?;
        self.cell_writer.reset();

        let mut written = 0;
        let width = frame.width() as usize;
        for (i, cell) in frame.cells().iter().enumerate() {
            let changed = previous
                .and_then(|prev| prev.cells().get(i))
                .is_none_or(|prev_cell| prev_cell != cell);
            if changed {
                let x = (i % width) as u16;
                let y = (i / width) as u16;
                self.cell_writer.write_cell(out, x, y, cell)?;
                written += 1;
            }
        }

        queue!(out, SetAttribute(Attribute::Reset), EndSynchronizedUpdate)?;
        out.flush()?;

        self.previous = Some(frame.clone());
        Ok(written)
    }

    /// Forget the previous frame; the next render is a full redraw.
    pub fn invalidate(&mut self) {
        self.previous = None;
    }

    pub fn has_previous(&self) -> bool {
        self.previous.is_some()
    }
}

// =============================================================================
// CellWriter
// =============================================================================

/// Emits cells while tracking terminal state to skip redundant cursor moves,
/// colors and attributes.
#[derive(Debug, Default)]
struct CellWriter {
    last_pos: Option<(u16, u16)>,
    last_fg: Option<Rgba>,
    last_bg: Option<Rgba>,
    last_attrs: Attr,
}

impl CellWriter {
    fn reset(&mut self) {
        *self = Self::default();
    }

    fn write_cell<W: Write>(&mut self, out: &mut W, x: u16, y: u16, cell: &Cell) -> io::Result<()> {
        // The wide char to the left already covers this column.
        if cell.ch == Cell::CONTINUATION {
            self.last_pos = Some((x, y));
            return Ok(());
        }

        let sequential = matches!(self.last_pos, Some((lx, ly)) if ly == y && lx + 1 == x);
        if !sequential {
            queue!(out, crossterm::cursor::MoveTo(x, y))?;
        }

        if cell.attrs != self.last_attrs {
            queue!(out, SetAttribute(Attribute::Reset))?;
            for attr in cell.attrs.iter() {
                if let Some(attribute) = to_attribute(attr) {
                    queue!(out, SetAttribute(attribute))?;
                }
            }
            // Reset clears colors too.
            self.last_fg = None;
            self.last_bg = None;
            self.last_attrs = cell.attrs;
        }

        if self.last_fg != Some(cell.fg) {
            queue!(out, SetForegroundColor(to_color(cell.fg)))?;
            self.last_fg = Some(cell.fg);
        }
        if self.last_bg != Some(cell.bg) {
            queue!(out, SetBackgroundColor(to_color(cell.bg)))?;
            self.last_bg = Some(cell.bg);
        }

        queue!(out, Print(cell.ch))?;
        self.last_pos = Some((x, y));
        Ok(())
    }
}

pub(crate) fn to_color(color: Rgba) -> Color {
    if color.is_terminal_default() {
        Color::Reset
    } else if color.is_ansi() {
        Color::AnsiValue(color.ansi_index())
    } else {
        Color::Rgb {
            r: color.r.clamp(0, 255) as u8,
            g: color.g.clamp(0, 255) as u8,
            b: color.b.clamp(0, 255) as u8,
        }
    }
}

fn to_attribute(attr: Attr) -> Option<Attribute> {
    let attribute = match attr {
        Attr::BOLD => Attribute::Bold,
        Attr::DIM => Attribute::Dim,
        Attr::ITALIC => Attribute::Italic,
        Attr::UNDERLINE => Attribute::Underlined,
        Attr::BLINK => Attribute::SlowBlink,
        Attr::INVERSE => Attribute::Reverse,
        Attr::HIDDEN => Attribute::Hidden,
        Attr::STRIKETHROUGH => Attribute::CrossedOut,
        _ => return None,
    };
    Some(attribute)
}

// =============================================================================
// Tests
// =============================================================================
