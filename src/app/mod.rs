//! Application loop.
//!
//! One thread owns the [`App`]: it drains the message queue, fires timers,
//! dispatches to the [`Screen`] and renders when something is dirty. Other
//! threads talk to it only through an [`AppHandle`].
//!
//! # API
//!
//! - `App::new(config, backend, root)` - validate config, build the screen
//! - `run()` - block until quit; `try_step()` - one non-blocking step
//! - `handle()` - `post`, `call`, timers, `spawn`, `scheduler`
//!
//! # Example
//!
//! ```ignore
//! use spark_runtime::app::{App, AppConfig};
//! use spark_runtime::renderer::CrosstermBackend;
//!
//! let mut backend = CrosstermBackend::stdout();
//! backend.enter_fullscreen()?;
//! let mut app = App::new(AppConfig::default(), backend, root)?;
//! let handle = app.handle();
//! handle.every(Duration::from_millis(500), |now| Some(Message::Tick(now)))?;
//! app.run()?;
//! ```

mod command;
mod handle;
mod message;
mod sampler;
mod services;
mod timer;

pub use command::{Command, Task};
pub use handle::{AppHandle, CallOptions, CancelToken, TaskContext};
pub use message::{CustomMsg, Message};
pub use sampler::{RenderObserver, RenderSampler, RenderStats, RenderSummary};
pub use services::Services;
pub use timer::{Clock, ManualClock, SystemClock, TickFn, TimerId};

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use crossbeam_channel::Receiver;

use handle::{Envelope, Shared};
use crate::error::{ConfigError, Result};
use crate::renderer::Backend;
use crate::screen::{Dirty, ErrorReporter, Screen};
use crate::style::Stylesheet;
use crate::types::Size;
use crate::widget::Widget;

// =============================================================================
// CONFIG
// =============================================================================

/// Queue capacity used when none is configured.
pub const DEFAULT_CAPACITY: usize = 256;

/// Settings for [`App::new`].
#[derive(Clone)]
pub struct AppConfig {
    capacity: usize,
    size: Option<Size>,
    auto_register_focus: bool,
    stylesheet: Option<Arc<Stylesheet>>,
    reduced_motion: bool,
    reporter: Option<Arc<dyn ErrorReporter>>,
    observer: Option<Arc<dyn RenderObserver>>,
    show_tree: bool,
    show_stack: bool,
    clock: Arc<dyn Clock>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            size: None,
            auto_register_focus: true,
            stylesheet: None,
            reduced_motion: false,
            reporter: None,
            observer: None,
            show_tree: false,
            show_stack: false,
            clock: Arc::new(SystemClock),
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound of the message queue. Must be at least 1.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Initial size. Defaults to the backend's size.
    pub fn with_size(mut self, size: Size) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_auto_register_focus(mut self, enabled: bool) -> Self {
        self.auto_register_focus = enabled;
        self
    }

    pub fn with_stylesheet(mut self, sheet: Arc<Stylesheet>) -> Self {
        self.stylesheet = Some(sheet);
        self
    }

    pub fn with_reduced_motion(mut self, reduced: bool) -> Self {
        self.reduced_motion = reduced;
        self
    }

    /// Where widget faults go. Defaults to `tracing` error events.
    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RenderObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Include the widget tree in fault reports.
    pub fn with_show_tree(mut self, show: bool) -> Self {
        self.show_tree = show;
        self
    }

    /// Include the captured backtrace in fault reports.
    pub fn with_show_stack(mut self, show: bool) -> Self {
        self.show_stack = show;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

// =============================================================================
// APP
// =============================================================================

pub struct App {
    screen: Screen,
    backend: Box<dyn Backend>,
    rx: Receiver<Envelope>,
    local: VecDeque<Message>,
    shared: Arc<Shared>,
    handle: AppHandle,
    observer: Option<Arc<dyn RenderObserver>>,
    frame: u64,
}

impl App {
    /// Build the loop on the calling thread, which must be the one that
    /// later calls [`run`](Self::run) or [`try_step`](Self::try_step).
    pub fn new(config: AppConfig, backend: impl Backend + 'static, root: impl Widget + 'static) -> Result<Self> {
        if config.capacity == 0 {
            return Err(ConfigError::ZeroCapacity.into());
        }
        let size = match config.size {
            Some(size) => size,
            None => backend.size()?,
        };

        let (shared, rx) = Shared::new(config.capacity, config.clock.clone());
        let handle = AppHandle { shared: shared.clone() };

        let mut screen = Screen::new(size, Box::new(root))?
            .with_auto_register_focus(config.auto_register_focus)
            .with_reduced_motion(config.reduced_motion)
            .with_fault_details(config.show_tree, config.show_stack);
        if let Some(reporter) = config.reporter {
            screen = screen.with_reporter(reporter);
        }
        if let Some(sheet) = config.stylesheet.clone() {
            screen = screen.with_stylesheet(sheet);
        }
        screen.set_services(Services::new(
            Some(handle.clone()),
            config.stylesheet,
            config.reduced_motion,
        ));
        if !config.auto_register_focus {
            tracing::debug!("focus auto-registration disabled");
        }

        let mut app = Self {
            screen,
            backend: Box::new(backend),
            rx,
            local: VecDeque::new(),
            shared,
            handle,
            observer: config.observer,
            frame: 0,
        };
        app.absorb_screen();
        tracing::debug!(width = size.width, height = size.height, capacity = config.capacity, "app created");
        Ok(app)
    }

    pub fn handle(&self) -> AppHandle {
        self.handle.clone()
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    /// Direct screen access. Changes made here are picked up on the next step.
    pub fn screen_mut(&mut self) -> &mut Screen {
        self.screen.mark(Dirty::LAYOUT | Dirty::RENDER);
        &mut self.screen
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Frames presented so far.
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    /// Queue a message ahead of anything waiting in the channel.
    pub fn send(&mut self, msg: Message) {
        self.local.push_back(msg);
    }

    pub fn quit(&self) {
        self.handle.quit();
    }

    pub fn is_quitting(&self) -> bool {
        self.shared.quit.load(Ordering::Acquire)
    }

    /// Step until quit, then close the queue.
    pub fn run(&mut self) -> Result<()> {
        tracing::debug!("loop started");
        while !self.is_quitting() {
            self.step(true)?;
        }
        self.close();
        tracing::debug!(frames = self.frame, "loop stopped");
        Ok(())
    }

    /// One step that never blocks. Returns whether any work was done.
    pub fn try_step(&mut self) -> Result<bool> {
        if self.is_quitting() {
            return Ok(false);
        }
        self.step(false)
    }

    fn step(&mut self, block: bool) -> Result<bool> {
        let _span = tracing::trace_span!("step", frame = self.frame).entered();
        let mut worked = self.run_jobs();
        worked |= self.fire_timers();

        if let Some(msg) = self.local.pop_front() {
            self.dispatch(msg);
            worked = true;
        } else if let Some(envelope) = self.next_envelope(block) {
            self.open(envelope);
            worked = true;
        }

        worked |= self.render_frame()?;
        Ok(worked)
    }

    fn next_envelope(&self, block: bool) -> Option<Envelope> {
        let busy = self.shared.dirty.load(Ordering::Acquire) != 0 || !self.local.is_empty();
        if !block || busy {
            return self.rx.try_recv().ok();
        }
        let deadline = self.shared.timers.lock().next_deadline();
        match deadline {
            Some(deadline) => {
                let wait = deadline.saturating_duration_since(self.shared.clock.now());
                self.rx.recv_timeout(wait).ok()
            }
            None => self.rx.recv().ok(),
        }
    }

    fn open(&mut self, envelope: Envelope) {
        match envelope {
            Envelope::Message(msg) => self.dispatch(msg),
            Envelope::Call { job, abandoned } => {
                if abandoned.load(Ordering::Acquire) {
                    tracing::debug!("skipping abandoned call");
                    return;
                }
                if catch_unwind(AssertUnwindSafe(|| job(self))).is_err() {
                    tracing::error!("call panicked on the loop");
                }
                self.shared.mark(Dirty::RENDER);
                self.absorb_screen();
            }
            Envelope::Wake => self.shared.woke(),
        }
    }

    fn dispatch(&mut self, msg: Message) {
        match msg {
            Message::QueueFlush => {
                self.run_jobs();
            }
            Message::Invalidate => self.shared.mark(Dirty::RENDER),
            msg => {
                let result = self.screen.handle_message(&msg);
                for command in result.commands {
                    self.apply(command);
                }
                self.absorb_screen();
            }
        }
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Quit => self.quit(),
            Command::SendMsg(msg) => self.local.push_back(msg),
            Command::RunEffect(task) => {
                if let Err(err) = self.handle.spawn(task) {
                    tracing::warn!(%err, "failed to start effect task");
                }
            }
            Command::Refresh => self.shared.mark(Dirty::RENDER | Dirty::FULL_REDRAW),
            other => tracing::warn!(command = ?other, "screen command reached the loop"),
        }
    }

    /// Move the screen's focus messages and dirty flags into the loop.
    fn absorb_screen(&mut self) {
        self.local.extend(self.screen.take_messages());
        self.shared.mark(self.screen.take_dirty());
    }

    fn run_jobs(&mut self) -> bool {
        let jobs = self.shared.take_jobs();
        let ran = !jobs.is_empty();
        for job in jobs {
            if catch_unwind(AssertUnwindSafe(job)).is_err() {
                tracing::error!("scheduled job panicked");
            }
        }
        ran
    }

    fn fire_timers(&mut self) -> bool {
        let now = self.shared.clock.now();
        let due = self.shared.timers.lock().take_due(now);
        if due.is_empty() {
            return false;
        }
        for (id, timer) in due {
            // Callbacks run outside the lock so they may schedule timers.
            let (msg, next) = match catch_unwind(AssertUnwindSafe(|| timer.fire(now))) {
                Ok(fired) => fired,
                Err(_) => {
                    tracing::error!(%id, "timer callback panicked; timer dropped");
                    (None, None)
                }
            };
            self.shared.timers.lock().finish(id, next);
            if let Some(msg) = msg {
                self.local.push_back(msg);
            }
        }
        true
    }

    fn render_frame(&mut self) -> Result<bool> {
        self.absorb_screen();
        let dirty = self.shared.take_dirty();
        if dirty.is_empty() {
            return Ok(false);
        }

        let started = Instant::now();
        if dirty.contains(Dirty::LAYOUT) {
            self.screen.relayout();
        }
        self.screen.render();
        let rendered = Instant::now();

        let full_redraw = dirty.contains(Dirty::FULL_REDRAW);
        let dirty_cells = self.backend.present(self.screen.buffer(), full_redraw)?;
        let finished = Instant::now();
        self.frame += 1;

        // Layout faults may have moved focus; render flags are spent.
        self.local.extend(self.screen.take_messages());
        self.shared.mark(self.screen.take_dirty() - Dirty::RENDER);

        if let Some(observer) = &self.observer {
            observer.observe_render(&RenderStats {
                frame: self.frame,
                started,
                finished,
                render: rendered - started,
                flush: finished - rendered,
                dirty_cells,
                total_cells: self.screen.size().area(),
                full_redraw,
            });
        }
        Ok(true)
    }

    fn close(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.shutdown.cancel();
        // Dropping queued calls wakes their callers with `Closed`.
        while self.rx.try_recv().is_ok() {}
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("size", &self.screen.size())
            .field("layers", &self.screen.layer_count())
            .field("frame", &self.frame)
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
