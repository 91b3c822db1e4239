//! Terminal output.
//!
//! # API
//!
//! - `FrameBuffer` - the cell grid widgets draw into
//! - `DiffRenderer` - writes only changed cells through crossterm
//! - `Backend` - where finished frames go
//! - `CrosstermBackend` - a real terminal (or any `Write`)
//! - `MemoryBackend` - headless, keeps the last frame for inspection
//!
//! # Example
//!
//! ```ignore
//! use spark_runtime::renderer::{Backend, MemoryBackend};
//!
//! let mut backend = MemoryBackend::new(80, 24);
//! backend.present(&frame, true)?;
//! assert_eq!(backend.frames(), 1);
//! ```

mod buffer;
mod diff;

pub use buffer::FrameBuffer;
pub use diff::DiffRenderer;

use std::io::{self, Stdout, Write};

use crossterm::{cursor, event, execute, terminal};

use crate::types::Size;

/// Sink for rendered frames.
pub trait Backend {
    /// Current output size.
    fn size(&self) -> io::Result<Size>;

    /// Show `frame`. `full_redraw` forces every cell out. Returns the number
    /// of cells written.
    fn present(&mut self, frame: &FrameBuffer, full_redraw: bool) -> io::Result<usize>;
}

// =============================================================================
// CROSSTERM
// =============================================================================

/// Diff-rendering backend over any writer.
pub struct CrosstermBackend<W: Write> {
    out: W,
    diff: DiffRenderer,
    size: Option<Size>,
    fullscreen: bool,
}

impl CrosstermBackend<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> CrosstermBackend<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            diff: DiffRenderer::new(),
            size: None,
            fullscreen: false,
        }
    }

    /// Report a fixed size instead of querying the terminal.
    pub fn with_size(mut self, size: Size) -> Self {
        self.size = Some(size);
        self
    }

    /// Raw mode, alternate screen, hidden cursor, mouse capture.
    pub fn enter_fullscreen(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.out,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            event::EnableMouseCapture,
            event::EnableBracketedPaste,
            terminal::Clear(terminal::ClearType::All)
        )?;
        self.fullscreen = true;
        self.diff.invalidate();
        Ok(())
    }

    pub fn exit_fullscreen(&mut self) -> io::Result<()> {
        if !self.fullscreen {
            return Ok(());
        }
        self.fullscreen = false;
        execute!(
            self.out,
            event::DisableBracketedPaste,
            event::DisableMouseCapture,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    pub fn writer(&self) -> &W {
        &self.out
    }
}

impl<W: Write> Backend for CrosstermBackend<W> {
    fn size(&self) -> io::Result<Size> {
        match self.size {
            Some(size) => Ok(size),
            None => terminal::size().map(|(w, h)| Size::new(w, h)),
        }
    }

    fn present(&mut self, frame: &FrameBuffer, full_redraw: bool) -> io::Result<usize> {
        self.diff.render(&mut self.out, frame, full_redraw)
    }
}

impl<W: Write> Drop for CrosstermBackend<W> {
    fn drop(&mut self) {
        if let Err(err) = self.exit_fullscreen() {
            tracing::warn!(%err, "failed to restore terminal");
        }
    }
}

// =============================================================================
// MEMORY
// =============================================================================

/// Headless backend for tests and automation.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    size: Size,
    last: Option<FrameBuffer>,
    frames: usize,
}

impl MemoryBackend {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            size: Size::new(width, height),
            last: None,
            frames: 0,
        }
    }

    pub fn set_size(&mut self, size: Size) {
        self.size = size;
    }

    /// The most recently presented frame.
    pub fn last_frame(&self) -> Option<&FrameBuffer> {
        self.last.as_ref()
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Text of the last frame, or empty.
    pub fn text(&self) -> String {
        self.last.as_ref().map(FrameBuffer::to_text).unwrap_or_default()
    }
}

impl Backend for MemoryBackend {
    fn size(&self) -> io::Result<Size> {
        Ok(self.size)
    }

    fn present(&mut self, frame: &FrameBuffer, full_redraw: bool) -> io::Result<usize> {
        let dirty = match &self.last {
            Some(prev) if !full_redraw && prev.size() == frame.size() => prev
                .cells()
                .iter()
                .zip(frame.cells())
                .filter(|(a, b)| a != b)
                .count(),
            _ => frame.cells().len(),
        };
        self.last = Some(frame.clone());
        self.frames += 1;
        Ok(dirty)
    }
}
