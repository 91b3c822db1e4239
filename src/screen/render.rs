//! The drawing surface handed to `Widget::render`.

use super::fault::{self, Phase, RawFault};
use crate::renderer::FrameBuffer;
use crate::style::{Style, StyleResolver};
use crate::types::{Cell, Rect};
use crate::widget::{Widget, WidgetId};

/// A clipped view of the frame for one widget.
///
/// Coordinates are absolute screen cells; anything outside `clip` is
/// dropped. Containers draw children through [`render_child`], which
/// isolates a panicking child so its siblings still render.
///
/// [`render_child`]: RenderContext::render_child
pub struct RenderContext<'a> {
    buffer: &'a mut FrameBuffer,
    bounds: Rect,
    clip: Rect,
    focused: bool,
    styles: Option<&'a StyleResolver>,
    faults: &'a mut Vec<RawFault>,
}

impl<'a> RenderContext<'a> {
    pub(crate) fn new(
        buffer: &'a mut FrameBuffer,
        bounds: Rect,
        focused: bool,
        styles: Option<&'a StyleResolver>,
        faults: &'a mut Vec<RawFault>,
    ) -> Self {
        let clip = bounds.intersect(&buffer.bounds()).unwrap_or_default();
        Self {
            buffer,
            bounds,
            clip,
            focused,
            styles,
            faults,
        }
    }

    /// Bounds of the widget being rendered.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Visible part of `bounds`.
    pub fn clip(&self) -> Rect {
        self.clip
    }

    /// Whether this layer is the top (focused) one.
    pub fn focused(&self) -> bool {
        self.focused
    }

    pub fn is_visible(&self, rect: Rect) -> bool {
        !rect.is_empty() && self.clip.intersects(&rect)
    }

    /// Resolved stylesheet style for `id`, empty without a stylesheet.
    pub fn style_for(&self, id: WidgetId) -> Style {
        self.styles
            .map(|resolver| resolver.resolve(id, self.focused))
            .unwrap_or_default()
    }

    // -------------------------------------------------------------------------
    // Drawing
    // -------------------------------------------------------------------------

    /// Draw `text` at (x, y). Returns columns advanced.
    pub fn set_string(&mut self, x: u16, y: u16, text: &str, style: &Style) -> u16 {
        self.buffer.draw_text(x, y, text, style, Some(self.clip))
    }

    pub fn set_cell(&mut self, x: u16, y: u16, cell: Cell) -> bool {
        self.buffer.set_cell(x, y, cell, Some(self.clip))
    }

    pub fn cell(&self, x: u16, y: u16) -> Option<&Cell> {
        self.buffer.get(x, y)
    }

    /// Fill `rect` with blanks painted by `style`.
    pub fn fill(&mut self, rect: Rect, style: &Style) {
        let mut cell = Cell::default();
        style.apply(&mut cell);
        self.buffer.fill_rect(rect, cell, Some(self.clip));
    }

    /// Fill the whole widget area.
    pub fn clear(&mut self, style: &Style) {
        self.fill(self.bounds, style);
    }

    // -------------------------------------------------------------------------
    // Children
    // -------------------------------------------------------------------------

    /// A context for `bounds`, or `None` when nothing of it is visible.
    pub fn sub(&mut self, bounds: Rect) -> Option<RenderContext<'_>> {
        if bounds.is_empty() {
            return None;
        }
        let clip = self.clip.intersect(&bounds)?;
        Some(RenderContext {
            buffer: &mut *self.buffer,
            bounds,
            clip,
            focused: self.focused,
            styles: self.styles,
            faults: &mut *self.faults,
        })
    }

    /// Render `child` into `bounds`. A panic is recorded as a fault and the
    /// child is skipped. Returns whether the child rendered.
    pub fn render_child(&mut self, child: &dyn Widget, bounds: Rect) -> bool {
        let result = match self.sub(bounds) {
            Some(mut sub) => fault::guard(|| child.render(&mut sub)),
            None => return false,
        };
        match result {
            Ok(()) => true,
            Err(caught) => {
                tracing::debug!(widget = %child.display_name(), "render fault isolated");
                self.faults.push(RawFault::new(child, Phase::Render, caught));
                false
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
