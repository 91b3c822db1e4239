//! Widget fault isolation and reporting.
//!
//! A panic inside a widget's `measure`, `layout`, `render` or
//! `handle_message` is caught at the screen boundary, turned into a
//! [`WidgetFault`] and handed to the configured [`ErrorReporter`]. The call
//! site then behaves as if the widget did nothing.
//!
//! # Example
//!
//! ```ignore
//! let reporter = Arc::new(MemoryReporter::new());
//! let app = App::new(AppConfig::new().with_reporter(reporter.clone()), backend, root)?;
//! // ... a widget panics while rendering ...
//! assert_eq!(reporter.faults()[0].phase, Phase::Render);
//! ```

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use parking_lot::Mutex;

use crate::app::Message;
use crate::widget::{Widget, WidgetId};

/// Where a fault happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Measure,
    Layout,
    Render,
    HandleMessage,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Measure => "measure",
            Phase::Layout => "layout",
            Phase::Render => "render",
            Phase::HandleMessage => "handle_message",
        };
        f.write_str(name)
    }
}

// =============================================================================
// PANIC GUARD
// =============================================================================

/// A caught panic.
#[derive(Debug, Clone)]
pub(crate) struct Caught {
    pub error: String,
    pub backtrace: Option<String>,
}

thread_local! {
    static GUARD_DEPTH: Cell<usize> = const { Cell::new(0) };
    static LAST_BACKTRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Route panics raised inside [`guard`] to a backtrace slot instead of stderr.
fn install_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if GUARD_DEPTH.with(Cell::get) > 0 {
                let trace = Backtrace::force_capture().to_string();
                LAST_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            } else {
                previous(info);
            }
        }));
    });
}

/// Run `f`, converting a panic into [`Caught`].
pub(crate) fn guard<R>(f: impl FnOnce() -> R) -> Result<R, Caught> {
    install_hook();
    GUARD_DEPTH.with(|d| d.set(d.get() + 1));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    GUARD_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));

    result.map_err(|payload| Caught {
        error: format!("panic: {}", panic_text(payload.as_ref())),
        backtrace: LAST_BACKTRACE.with(|slot| slot.borrow_mut().take()),
    })
}

fn panic_text(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown error".to_string()
    }
}

// =============================================================================
// FAULTS
// =============================================================================

/// A fault before the screen has attached tree context.
#[derive(Debug, Clone)]
pub(crate) struct RawFault {
    pub widget: WidgetId,
    pub name: String,
    pub phase: Phase,
    pub caught: Caught,
}

impl RawFault {
    pub(crate) fn new(widget: &dyn Widget, phase: Phase, caught: Caught) -> Self {
        Self {
            widget: widget.id(),
            name: widget.display_name(),
            phase,
            caught,
        }
    }
}

/// A widget fault with the context needed to find it.
#[derive(Debug, Clone)]
pub struct WidgetFault {
    pub widget: WidgetId,
    /// Display name of the faulting widget.
    pub name: String,
    pub phase: Phase,
    pub error: String,
    /// Root-to-widget segments.
    pub path: Vec<String>,
    /// Indented tree dump with the widget marked, when enabled.
    pub tree: Option<Vec<String>>,
    pub backtrace: Option<String>,
    /// Debug rendering of the message being handled, if any.
    pub message: Option<String>,
}

/// What to include in fault reports.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FaultOptions {
    pub show_tree: bool,
    pub show_stack: bool,
}

impl WidgetFault {
    pub(crate) fn from_raw(
        raw: RawFault,
        roots: &[&dyn Widget],
        options: FaultOptions,
        message: Option<&Message>,
    ) -> Self {
        Self {
            widget: raw.widget,
            name: raw.name,
            phase: raw.phase,
            error: raw.caught.error,
            path: widget_path(roots, raw.widget),
            tree: options.show_tree.then(|| widget_tree(roots, raw.widget)),
            backtrace: if options.show_stack { raw.caught.backtrace } else { None },
            message: message.map(|m| format!("{m:?}")),
        }
    }

    /// Multi-line boxed report.
    pub fn report(&self) -> String {
        let mut lines = vec![
            "Widget Error".to_string(),
            format!("In {}", self.name),
            String::new(),
            self.error.clone(),
        ];
        if !self.path.is_empty() {
            lines.push(String::new());
            lines.push(format!("Widget Path: {}", self.path.join(" > ")));
        }
        if let Some(tree) = &self.tree {
            lines.push(String::new());
            lines.push("Widget Tree:".to_string());
            lines.extend(tree.iter().cloned());
        }
        if let Some(message) = &self.message {
            lines.push(String::new());
            lines.push(format!("Last Message: {message}"));
        }
        if let Some(trace) = self.backtrace.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            lines.push(String::new());
            lines.push("Stack Trace:".to_string());
            lines.extend(trace.lines().map(str::to_string));
        }
        boxed(&lines)
    }
}

impl fmt::Display for WidgetFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.report())
    }
}

fn boxed(lines: &[String]) -> String {
    let width = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let border = format!("+{}+", "-".repeat(width + 2));
    let mut out = String::new();
    out.push_str(&border);
    out.push('\n');
    for line in lines {
        out.push_str(&format!("| {line:<width$} |\n"));
    }
    out.push_str(&border);
    out
}

const APP_ROOT: &str = "App";

/// Segments from the root to `target`. Several roots get a synthetic
/// `App` parent.
pub(crate) fn widget_path(roots: &[&dyn Widget], target: WidgetId) -> Vec<String> {
    match roots {
        [root] => path_from(*root, target).unwrap_or_default(),
        _ => roots
            .iter()
            .find_map(|root| path_from(*root, target))
            .map(|path| std::iter::once(APP_ROOT.to_string()).chain(path).collect())
            .unwrap_or_default(),
    }
}

fn path_from(node: &dyn Widget, target: WidgetId) -> Option<Vec<String>> {
    if node.id() == target {
        return Some(vec![node.display_name()]);
    }
    let mut found = None;
    node.visit_children(&mut |child| {
        if found.is_some() {
            return;
        }
        if let Some(rest) = path_from(child, target) {
            let segment = node
                .path_segment(child.id())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| node.display_name());
            found = Some(std::iter::once(segment).chain(rest).collect());
        }
    });
    found
}

/// `|- ` / `` `- `` tree with the target marked ` [HERE]`.
pub(crate) fn widget_tree(roots: &[&dyn Widget], target: WidgetId) -> Vec<String> {
    let mut lines = Vec::new();
    match roots {
        [root] => tree_lines(*root, target, "", true, true, &mut lines),
        _ => {
            lines.push(APP_ROOT.to_string());
            for (i, root) in roots.iter().enumerate() {
                tree_lines(*root, target, "", i + 1 == roots.len(), false, &mut lines);
            }
        }
    }
    lines
}

fn tree_lines(
    node: &dyn Widget,
    target: WidgetId,
    prefix: &str,
    is_last: bool,
    is_root: bool,
    out: &mut Vec<String>,
) {
    let mut name = node.display_name();
    if node.id() == target {
        name.push_str(" [HERE]");
    }
    if is_root {
        out.push(name);
    } else {
        let branch = if is_last { "`- " } else { "|- " };
        out.push(format!("{prefix}{branch}{name}"));
    }

    let child_prefix = if is_root {
        String::new()
    } else if is_last {
        format!("{prefix}   ")
    } else {
        format!("{prefix}|  ")
    };
    let mut count = 0usize;
    node.visit_children(&mut |_| count += 1);
    let mut index = 0usize;
    node.visit_children(&mut |child| {
        index += 1;
        tree_lines(child, target, &child_prefix, index == count, false, out);
    });
}

// =============================================================================
// REPORTERS
// =============================================================================

/// Receives widget faults. Called on the loop thread.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, fault: &WidgetFault);
}

/// Emits each fault as a `tracing` error event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, fault: &WidgetFault) {
        tracing::error!(
            widget = %fault.name,
            phase = %fault.phase,
            error = %fault.error,
            "widget fault\n{}",
            fault.report()
        );
    }
}

/// Keeps every fault in memory.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    faults: Mutex<Vec<WidgetFault>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faults(&self) -> Vec<WidgetFault> {
        self.faults.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.faults.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.faults.lock().is_empty()
    }
}

impl ErrorReporter for MemoryReporter {
    fn report(&self, fault: &WidgetFault) {
        self.faults.lock().push(fault.clone());
    }
}

// =============================================================================
// TESTS
// =============================================================================
