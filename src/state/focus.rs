//! Focus System - keyboard focus within one layer.
//!
//! A [`FocusHandle`] is the shared focus state of one widget: the widget keeps
//! a clone, the layer's [`FocusScope`] keeps another. The scope owns the
//! ordering and decides who is focused; the widget reads the handle when it
//! renders.
//!
//! Invariant: the scope's current entry is always focusable, or there is none.
//! A handle disabled while focused stops counting as current at once and is
//! left on the next move.
//!
//! # Example
//!
//! ```ignore
//! use spark_runtime::state::focus::{FocusHandle, FocusScope};
//!
//! let mut scope = FocusScope::new();
//! scope.register(a.clone()); // a gets focus
//! scope.register(b.clone());
//! scope.focus_next();        // b
//! scope.focus_next();        // wraps to a
//! ```

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::widget::WidgetId;

// =============================================================================
// FOCUS HANDLE
// =============================================================================

struct FocusState {
    id: WidgetId,
    focused: Cell<bool>,
    enabled: Cell<bool>,
    affects_layout: Cell<bool>,
}

/// Shared focus state for one widget.
#[derive(Clone)]
pub struct FocusHandle(Rc<FocusState>);

impl FocusHandle {
    /// Create an enabled, unfocused handle for `id`.
    pub fn new(id: WidgetId) -> Self {
        Self(Rc::new(FocusState {
            id,
            focused: Cell::new(false),
            enabled: Cell::new(true),
            affects_layout: Cell::new(false),
        }))
    }

    pub fn id(&self) -> WidgetId {
        self.0.id
    }

    pub fn is_focused(&self) -> bool {
        self.0.focused.get() && self.0.enabled.get()
    }

    /// Whether the scope may move focus here.
    pub fn can_focus(&self) -> bool {
        self.0.enabled.get()
    }

    /// Enable or disable focusability.
    ///
    /// A disabled handle is never reported as focused. The scope skips it on
    /// the next move.
    pub fn set_enabled(&self, enabled: bool) {
        self.0.enabled.set(enabled);
    }

    /// Whether gaining or losing focus changes this widget's size.
    pub fn affects_layout(&self) -> bool {
        self.0.affects_layout.get()
    }

    pub fn set_affects_layout(&self, affects: bool) {
        self.0.affects_layout.set(affects);
    }

    pub(crate) fn set_focused(&self, focused: bool) {
        self.0.focused.set(focused);
    }

    pub fn same(&self, other: &FocusHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0) || self.id() == other.id()
    }
}

impl fmt::Debug for FocusHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FocusHandle")
            .field("id", &self.id())
            .field("focused", &self.is_focused())
            .field("enabled", &self.can_focus())
            .finish()
    }
}

// =============================================================================
// FOCUS SCOPE
// =============================================================================

/// Callback fired once per focus change with `(previous, next)`.
pub type FocusChangeFn = Box<dyn FnMut(Option<FocusHandle>, Option<FocusHandle>)>;

/// Ordered focus registry for one layer.
#[derive(Default)]
pub struct FocusScope {
    entries: Vec<FocusHandle>,
    current: Option<usize>,
    on_change: Option<FocusChangeFn>,
}

impl FocusScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a focus change callback, replacing any previous one.
    pub fn set_on_change(&mut self, f: impl FnMut(Option<FocusHandle>, Option<FocusHandle>) + 'static) {
        self.on_change = Some(Box::new(f));
    }

    /// Add a widget. Focuses it if nothing is focused and it can take focus.
    ///
    /// Returns `false` if it was already registered.
    pub fn register(&mut self, handle: FocusHandle) -> bool {
        if self.position(handle.id()).is_some() {
            return false;
        }
        self.entries.push(handle);
        let index = self.entries.len() - 1;
        if self.current.is_none() && self.entries[index].can_focus() {
            self.focus_index(index);
        }
        true
    }

    /// Remove a widget. If it held focus, focus moves to the first focusable
    /// remaining entry (or nowhere).
    pub fn unregister(&mut self, id: WidgetId) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        let removed = self.entries.remove(index);
        match self.current {
            Some(current) if current == index => {
                removed.set_focused(false);
                self.current = None;
                let next = self.entries.iter().position(FocusHandle::can_focus);
                if let Some(next) = next {
                    self.current = Some(next);
                    self.entries[next].set_focused(true);
                }
                let next = next.map(|i| self.entries[i].clone());
                self.emit(Some(removed), next);
            }
            Some(current) if current > index => self.current = Some(current - 1),
            _ => {}
        }
        true
    }

    /// The focused widget, if any.
    pub fn current(&self) -> Option<FocusHandle> {
        self.current
            .map(|i| &self.entries[i])
            .filter(|h| h.can_focus())
            .cloned()
    }

    pub fn current_id(&self) -> Option<WidgetId> {
        self.current().map(|h| h.id())
    }

    /// Jump to a registered, focusable widget. Returns `true` if focus changed.
    pub fn set_focus(&mut self, id: WidgetId) -> bool {
        match self.position(id) {
            Some(i) if self.entries[i].can_focus() => self.focus_index(i),
            _ => false,
        }
    }

    pub fn focus_first(&mut self) -> bool {
        match self.entries.iter().position(FocusHandle::can_focus) {
            Some(i) => self.focus_index(i),
            None => false,
        }
    }

    pub fn focus_last(&mut self) -> bool {
        match self.entries.iter().rposition(FocusHandle::can_focus) {
            Some(i) => self.focus_index(i),
            None => false,
        }
    }

    /// Move to the next focusable entry, wrapping to the start.
    pub fn focus_next(&mut self) -> bool {
        let len = self.entries.len();
        if len == 0 {
            return false;
        }
        let start = self.current.unwrap_or(len - 1);
        (1..=len)
            .map(|step| (start + step) % len)
            .find(|&i| self.entries[i].can_focus())
            .is_some_and(|i| self.focus_index(i))
    }

    /// Move to the previous focusable entry, wrapping to the end.
    pub fn focus_prev(&mut self) -> bool {
        let len = self.entries.len();
        if len == 0 {
            return false;
        }
        let start = self.current.unwrap_or(len);
        (1..=len)
            .map(|step| (start + len - step) % len)
            .find(|&i| self.entries[i].can_focus())
            .is_some_and(|i| self.focus_index(i))
    }

    /// Blur the current widget, if any.
    pub fn clear_focus(&mut self) {
        let Some(index) = self.current.take() else {
            return;
        };
        let prev = self.entries[index].clone();
        prev.set_focused(false);
        self.emit(Some(prev), None);
    }

    /// Clear focus and forget every entry.
    pub fn reset(&mut self) {
        self.clear_focus();
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered widgets in focus order.
    pub fn ids(&self) -> Vec<WidgetId> {
        self.entries.iter().map(FocusHandle::id).collect()
    }

    pub fn contains(&self, id: WidgetId) -> bool {
        self.position(id).is_some()
    }

    fn position(&self, id: WidgetId) -> Option<usize> {
        self.entries.iter().position(|h| h.id() == id)
    }

    fn focus_index(&mut self, index: usize) -> bool {
        if self.current == Some(index) {
            return false;
        }
        let prev = self.current.map(|i| self.entries[i].clone());
        if let Some(prev) = &prev {
            prev.set_focused(false);
        }
        self.current = Some(index);
        let next = self.entries[index].clone();
        next.set_focused(true);
        self.emit(prev, Some(next));
        true
    }

    fn emit(&mut self, prev: Option<FocusHandle>, next: Option<FocusHandle>) {
        if let Some(on_change) = self.on_change.as_mut() {
            on_change(prev, next);
        }
    }
}

impl fmt::Debug for FocusScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FocusScope")
            .field("entries", &self.entries)
            .field("current", &self.current)
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    type Log = Rc<RefCell<Vec<(Option<WidgetId>, Option<WidgetId>)>>>;

    fn setup(n: usize) -> (FocusScope, Vec<FocusHandle>, Log) {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let mut scope = FocusScope::new();
        let sink = log.clone();
        scope.set_on_change(move |prev, next| {
            sink.borrow_mut()
                .push((prev.map(|h| h.id()), next.map(|h| h.id())));
        });
        let handles = (0..n).map(|_| FocusHandle::new(WidgetId::next())).collect();
        (scope, handles, log)
    }

    #[test]
    fn test_register_autofocuses_first_focusable() {
        let (mut scope, h, log) = setup(2);
        h[0].set_enabled(false);

        scope.register(h[0].clone());
        assert_eq!(scope.current_id(), None);
        scope.register(h[1].clone());
        assert_eq!(scope.current_id(), Some(h[1].id()));
        assert!(h[1].is_focused());
        assert!(!scope.register(h[1].clone()));
        assert_eq!(*log.borrow(), vec![(None, Some(h[1].id()))]);
    }

    #[test]
    fn test_focus_next_wraps_and_skips_disabled() {
        let (mut scope, h, _log) = setup(3);
        for handle in &h {
            scope.register(handle.clone());
        }
        h[1].set_enabled(false);

        assert!(scope.focus_next());
        assert_eq!(scope.current_id(), Some(h[2].id()));
        assert!(scope.focus_next());
        assert_eq!(scope.current_id(), Some(h[0].id()));
        assert!(scope.focus_prev());
        assert_eq!(scope.current_id(), Some(h[2].id()));
        assert!(!h[0].is_focused());
    }

    #[test]
    fn test_focus_next_single_entry_is_noop() {
        let (mut scope, h, log) = setup(1);
        scope.register(h[0].clone());
        assert!(!scope.focus_next());
        assert!(!scope.focus_prev());
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_focus_from_empty_state() {
        let (mut scope, h, _log) = setup(3);
        for handle in &h {
            scope.register(handle.clone());
        }
        scope.clear_focus();
        assert!(scope.focus_next());
        assert_eq!(scope.current_id(), Some(h[0].id()));

        scope.clear_focus();
        assert!(scope.focus_prev());
        assert_eq!(scope.current_id(), Some(h[2].id()));
    }

    #[test]
    fn test_unregister_current_reseeks_with_one_callback() {
        let (mut scope, h, log) = setup(3);
        for handle in &h {
            scope.register(handle.clone());
        }
        scope.set_focus(h[1].id());
        log.borrow_mut().clear();

        assert!(scope.unregister(h[1].id()));
        assert!(!h[1].is_focused());
        assert_eq!(scope.current_id(), Some(h[0].id()));
        assert_eq!(*log.borrow(), vec![(Some(h[1].id()), Some(h[0].id()))]);
    }

    #[test]
    fn test_unregister_before_current_keeps_focus() {
        let (mut scope, h, _log) = setup(3);
        for handle in &h {
            scope.register(handle.clone());
        }
        scope.set_focus(h[2].id());
        scope.unregister(h[0].id());
        assert_eq!(scope.current_id(), Some(h[2].id()));
        assert!(scope.focus_prev());
        assert_eq!(scope.current_id(), Some(h[1].id()));
    }

    #[test]
    fn test_disabling_focused_entry_drops_current() {
        let (mut scope, h, log) = setup(3);
        for handle in &h {
            scope.register(handle.clone());
        }
        h[0].set_enabled(false);

        assert_eq!(scope.current_id(), None);
        assert!(scope.current().is_none());
        assert!(!h[0].is_focused());

        assert!(scope.focus_next());
        assert_eq!(scope.current_id(), Some(h[1].id()));
        assert_eq!(log.borrow().last(), Some(&(Some(h[0].id()), Some(h[1].id()))));

        h[0].set_enabled(true);
        assert!(!h[0].is_focused());
    }

    #[test]
    fn test_set_focus_rejects_disabled_and_unknown() {
        let (mut scope, h, _log) = setup(2);
        scope.register(h[0].clone());
        scope.register(h[1].clone());
        h[1].set_enabled(false);

        assert!(!scope.set_focus(h[1].id()));
        assert!(!scope.set_focus(WidgetId::next()));
        assert!(!scope.set_focus(h[0].id()));
    }

    #[test]
    fn test_clear_and_reset() {
        let (mut scope, h, log) = setup(2);
        scope.register(h[0].clone());
        scope.register(h[1].clone());

        scope.clear_focus();
        scope.clear_focus();
        assert_eq!(log.borrow().len(), 2);
        assert!(!h[0].is_focused());

        scope.focus_last();
        scope.reset();
        assert!(scope.is_empty());
        assert!(scope.current().is_none());
        assert!(!h[1].is_focused());
    }
}
