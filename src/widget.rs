//! The widget contract.
//!
//! A widget measures itself under [`Constraints`], accepts the bounds it is
//! given, renders into a [`RenderContext`] and handles messages. Everything
//! else is an optional capability with a no-op default: containers expose
//! children, focusable widgets hand out a [`FocusHandle`], persistable ones
//! expose a state key and payload, styled ones describe themselves to the
//! style resolver.
//!
//! Widgets are owned by the screen and live on the loop thread; they are not
//! required to be `Send`.

use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::app::{Command, Message, Services};
use crate::screen::RenderContext;
use crate::state::focus::FocusHandle;
use crate::style::WidgetState;
use crate::types::{Constraints, Rect, Size};

// =============================================================================
// IDENTITY
// =============================================================================

/// Process-unique widget identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId(NonZeroU64);

static NEXT_WIDGET_ID: AtomicU64 = AtomicU64::new(1);

impl WidgetId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        let raw = NEXT_WIDGET_ID.fetch_add(1, Ordering::Relaxed);
        Self(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// HANDLE RESULT
// =============================================================================

/// Outcome of `Widget::handle_message`.
#[derive(Debug, Default)]
pub struct HandleResult {
    pub handled: bool,
    pub commands: Vec<Command>,
}

impl HandleResult {
    pub fn unhandled() -> Self {
        Self::default()
    }

    pub fn handled() -> Self {
        Self {
            handled: true,
            commands: Vec::new(),
        }
    }

    /// Handled, carrying one command.
    pub fn command(command: Command) -> Self {
        Self::handled().with_command(command)
    }

    pub fn with_command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }
}

/// Error type for widget state save/restore.
pub type StateError = Box<dyn std::error::Error + Send + Sync>;

// =============================================================================
// WIDGET
// =============================================================================

pub trait Widget {
    fn id(&self) -> WidgetId;

    /// Desired size under `constraints`.
    fn measure(&mut self, constraints: Constraints) -> Size;

    /// Accept final bounds and lay out children.
    fn layout(&mut self, bounds: Rect);

    fn render(&self, ctx: &mut RenderContext<'_>);

    fn handle_message(&mut self, msg: &Message) -> HandleResult;

    // -------------------------------------------------------------------------
    // Tree
    // -------------------------------------------------------------------------

    /// Call `f` for each direct child, in order.
    fn visit_children(&self, _f: &mut dyn FnMut(&dyn Widget)) {}

    fn visit_children_mut(&mut self, _f: &mut dyn FnMut(&mut dyn Widget)) {}

    /// Bounds from the last layout, for hit testing.
    fn bounds(&self) -> Option<Rect> {
        None
    }

    /// Debug label this container gives to `child` in widget paths.
    fn path_segment(&self, _child: WidgetId) -> Option<String> {
        None
    }

    /// Containers that want pointer events over their children's area.
    fn hit_self(&self) -> bool {
        false
    }

    // -------------------------------------------------------------------------
    // Focus
    // -------------------------------------------------------------------------

    fn focus_handle(&self) -> Option<FocusHandle> {
        None
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    fn state_key(&self) -> Option<String> {
        None
    }

    /// `None` means the widget has nothing to persist.
    fn save_state(&self) -> Option<Result<Vec<u8>, StateError>> {
        None
    }

    fn restore_state(&mut self, _data: &[u8]) -> Result<(), StateError> {
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Style
    // -------------------------------------------------------------------------

    /// Selector type name. Defaults to the Rust type name.
    fn style_type(&self) -> String {
        short_type_name(std::any::type_name::<Self>()).to_string()
    }

    fn style_id(&self) -> Option<String> {
        None
    }

    fn style_classes(&self) -> Vec<String> {
        Vec::new()
    }

    /// Explicit pseudo-class state. When `None` the resolver derives it.
    fn style_state(&self) -> Option<WidgetState> {
        None
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    fn bind(&mut self, _services: &Services) {}

    fn unbind(&mut self) {}

    fn mount(&mut self) {}

    fn unmount(&mut self) {}

    /// Name used in fault reports.
    fn display_name(&self) -> String {
        let name = short_type_name(std::any::type_name::<Self>());
        match self.style_id() {
            Some(id) if !id.trim().is_empty() => format!("{name} [id:{}]", id.trim()),
            _ => name.to_string(),
        }
    }
}

/// `a::b::Flex<c::D>` -> `Flex`.
pub fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

// =============================================================================
// TREE WALKS
// =============================================================================

/// Pre-order walk.
pub fn walk(root: &dyn Widget, f: &mut dyn FnMut(&dyn Widget)) {
    f(root);
    root.visit_children(&mut |child| walk(child, &mut *f));
}

/// Pre-order mutable walk.
pub fn walk_mut(root: &mut dyn Widget, f: &mut dyn FnMut(&mut dyn Widget)) {
    f(root);
    root.visit_children_mut(&mut |child| walk_mut(child, &mut *f));
}

/// Post-order mutable walk.
fn walk_mut_post(root: &mut dyn Widget, f: &mut dyn FnMut(&mut dyn Widget)) {
    root.visit_children_mut(&mut |child| walk_mut_post(child, &mut *f));
    f(root);
}

/// Run `f` on the widget with `id`, if it is in the tree.
pub fn with_widget<R>(
    root: &mut dyn Widget,
    id: WidgetId,
    f: impl FnOnce(&mut dyn Widget) -> R,
) -> Option<R> {
    let mut f = Some(f);
    let mut out = None;
    find_mut(root, id, &mut |w| {
        if let Some(f) = f.take() {
            out = Some(f(w));
        }
    });
    out
}

fn find_mut(root: &mut dyn Widget, id: WidgetId, f: &mut dyn FnMut(&mut dyn Widget)) -> bool {
    if root.id() == id {
        f(root);
        return true;
    }
    let mut found = false;
    root.visit_children_mut(&mut |child| {
        if !found {
            found = find_mut(child, id, &mut *f);
        }
    });
    found
}

/// Parent-first `bind` over the tree.
pub fn bind_tree(root: &mut dyn Widget, services: &Services) {
    walk_mut(root, &mut |w| w.bind(services));
}

/// Children-first `unbind`.
pub fn unbind_tree(root: &mut dyn Widget) {
    walk_mut_post(root, &mut |w| w.unbind());
}

pub fn mount_tree(root: &mut dyn Widget) {
    walk_mut(root, &mut |w| w.mount());
}

pub fn unmount_tree(root: &mut dyn Widget) {
    walk_mut_post(root, &mut |w| w.unmount());
}

/// Every focus handle in the tree, in pre-order.
pub fn collect_focusables(root: &dyn Widget) -> Vec<FocusHandle> {
    let mut out = Vec::new();
    walk(root, &mut |w| {
        if let Some(handle) = w.focus_handle() {
            out.push(handle);
        }
    });
    out
}

// =============================================================================
// TESTS
// =============================================================================
