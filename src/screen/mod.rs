//! Screen - the layer stack, render pass and message dispatch.
//!
//! The screen owns every widget tree. The bottom layer is the application
//! root and is never removed; overlays are pushed above it, each with its own
//! [`FocusScope`]. Only the top layer is focused.
//!
//! # API
//!
//! - `Screen::new` / `set_root` / `push_layer` / `pop_layer`
//! - `relayout` / `render` / `resize`
//! - `handle_message` - hit grid first for pointer events, then the layer
//!   walk, stopping at the first modal layer
//! - `widget_at`, `snapshot_text`, `capture_state`, `apply_state`
//!
//! # Example
//!
//! ```ignore
//! let mut screen = Screen::new(Size::new(80, 24), Box::new(root))?;
//! screen.push_layer(Box::new(dialog), true);
//! screen.relayout();
//! screen.render();
//! println!("{}", screen.snapshot_text());
//! ```

mod fault;
mod render;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use bitflags::bitflags;

pub use fault::{ErrorReporter, MemoryReporter, Phase, TracingReporter, WidgetFault};
pub(crate) use fault::FaultOptions;
pub use render::RenderContext;

use fault::RawFault;
use crate::app::{Command, Message, Services};
use crate::error::{ConfigError, PersistError};
use crate::persist::{self, StateSnapshot};
use crate::renderer::FrameBuffer;
use crate::state::focus::{FocusHandle, FocusScope};
use crate::state::mouse::HitGrid;
use crate::style::{MediaContext, StyleResolver, Stylesheet};
use crate::types::{Constraints, Rect, Size};
use crate::widget::{self, HandleResult, Widget, WidgetId};

bitflags! {
    /// Pending work for the next frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Dirty: u8 {
        const LAYOUT = 1 << 0;
        const RENDER = 1 << 1;
        const FULL_REDRAW = 1 << 2;
    }
}

// =============================================================================
// LAYER
// =============================================================================

/// One widget tree on the stack, with its own focus order.
pub struct Layer {
    root: Box<dyn Widget>,
    scope: FocusScope,
    modal: bool,
}

impl Layer {
    pub fn root(&self) -> &dyn Widget {
        self.root.as_ref()
    }

    pub fn scope(&self) -> &FocusScope {
        &self.scope
    }

    /// A modal layer stops message dispatch from reaching layers below it.
    pub fn is_modal(&self) -> bool {
        self.modal
    }
}

type FocusEvents = Rc<RefCell<Vec<(Option<FocusHandle>, Option<FocusHandle>)>>>;

// =============================================================================
// SCREEN
// =============================================================================

pub struct Screen {
    size: Size,
    layers: Vec<Layer>,
    buffer: FrameBuffer,
    hit_grid: HitGrid,
    hit_dirty: bool,
    // The grid was built from a modal top layer only.
    hit_modal: bool,
    styles: Option<StyleResolver>,
    stylesheet: Option<Arc<Stylesheet>>,
    reduced_motion: bool,
    services: Services,
    auto_register_focus: bool,
    focus_events: FocusEvents,
    outbox: Vec<Message>,
    dirty: Dirty,
    reporter: Arc<dyn ErrorReporter>,
    fault_options: FaultOptions,
    last_message: Option<Message>,
    faults: Vec<RawFault>,
}

impl Screen {
    /// A screen of `size` with `root` as its base layer.
    pub fn new(size: Size, root: Box<dyn Widget>) -> Result<Self, ConfigError> {
        if size.area() == 0 {
            return Err(ConfigError::EmptyScreen {
                width: size.width,
                height: size.height,
            });
        }
        let mut screen = Self {
            size,
            layers: Vec::new(),
            buffer: FrameBuffer::new(size.width, size.height),
            hit_grid: HitGrid::new(size.width, size.height),
            hit_dirty: true,
            hit_modal: false,
            styles: None,
            stylesheet: None,
            reduced_motion: false,
            services: Services::detached(),
            auto_register_focus: true,
            focus_events: Rc::new(RefCell::new(Vec::new())),
            outbox: Vec::new(),
            dirty: Dirty::all(),
            reporter: Arc::new(TracingReporter),
            fault_options: FaultOptions::default(),
            last_message: None,
            faults: Vec::new(),
        };
        let layer = screen.attach(root, false);
        screen.layers.push(layer);
        screen.after_transition();
        Ok(screen)
    }

    pub fn with_stylesheet(mut self, sheet: Arc<Stylesheet>) -> Self {
        self.set_stylesheet(Some(sheet));
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Include the widget tree and/or the backtrace in fault reports.
    pub fn with_fault_details(mut self, show_tree: bool, show_stack: bool) -> Self {
        self.fault_options = FaultOptions { show_tree, show_stack };
        self
    }

    pub fn with_reduced_motion(mut self, reduced: bool) -> Self {
        self.reduced_motion = reduced;
        self.styles = None;
        self
    }

    /// When off, focusables must be registered through [`refresh_focus`].
    ///
    /// [`refresh_focus`]: Screen::refresh_focus
    pub fn with_auto_register_focus(mut self, enabled: bool) -> Self {
        self.auto_register_focus = enabled;
        self
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn stylesheet(&self) -> Option<&Arc<Stylesheet>> {
        self.stylesheet.as_ref()
    }

    pub fn set_stylesheet(&mut self, sheet: Option<Arc<Stylesheet>>) {
        self.stylesheet = sheet;
        self.styles = None;
        self.dirty |= Dirty::LAYOUT | Dirty::RENDER;
    }

    /// Rebind every tree to `services`.
    pub fn set_services(&mut self, services: Services) {
        self.services = services;
        for layer in &mut self.layers {
            widget::unbind_tree(layer.root.as_mut());
            widget::bind_tree(layer.root.as_mut(), &self.services);
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    // -------------------------------------------------------------------------
    // Layers
    // -------------------------------------------------------------------------

    /// Replace the base layer's tree. Overlays stay.
    pub fn set_root(&mut self, root: Box<dyn Widget>) {
        let layer = self.attach(root, false);
        let old = std::mem::replace(&mut self.layers[0], layer);
        self.detach(old);
        self.after_transition();
    }

    pub fn push_layer(&mut self, root: Box<dyn Widget>, modal: bool) {
        let layer = self.attach(root, modal);
        self.layers.push(layer);
        tracing::debug!(depth = self.layers.len(), modal, "layer pushed");
        self.after_transition();
    }

    /// Remove and return the top overlay. The base layer is never removed.
    pub fn pop_layer(&mut self) -> Option<Box<dyn Widget>> {
        if self.layers.len() <= 1 {
            return None;
        }
        let layer = self.layers.pop()?;
        let root = self.detach(layer);
        tracing::debug!(depth = self.layers.len(), "layer popped");
        self.after_transition();
        Some(root)
    }

    fn attach(&mut self, mut root: Box<dyn Widget>, modal: bool) -> Layer {
        widget::bind_tree(root.as_mut(), &self.services);
        widget::mount_tree(root.as_mut());

        let mut scope = FocusScope::new();
        let events = self.focus_events.clone();
        scope.set_on_change(move |prev, next| events.borrow_mut().push((prev, next)));
        if self.auto_register_focus {
            for handle in widget::collect_focusables(root.as_ref()) {
                scope.register(handle);
            }
        }
        Layer { root, scope, modal }
    }

    fn detach(&mut self, mut layer: Layer) -> Box<dyn Widget> {
        layer.scope.set_on_change(|_, _| {});
        layer.scope.reset();
        widget::unmount_tree(layer.root.as_mut());
        widget::unbind_tree(layer.root.as_mut());
        layer.root
    }

    fn after_transition(&mut self) {
        self.drain_focus_events();
        self.relayout();
    }

    // -------------------------------------------------------------------------
    // Focus
    // -------------------------------------------------------------------------

    fn top_scope(&mut self) -> Option<&mut FocusScope> {
        self.layers.last_mut().map(|l| &mut l.scope)
    }

    /// Focused widget of the top layer.
    pub fn focused(&self) -> Option<WidgetId> {
        self.layers.last().and_then(|l| l.scope.current_id())
    }

    pub fn focus_next(&mut self) -> bool {
        let moved = self.top_scope().is_some_and(FocusScope::focus_next);
        self.drain_focus_events();
        moved
    }

    pub fn focus_prev(&mut self) -> bool {
        let moved = self.top_scope().is_some_and(FocusScope::focus_prev);
        self.drain_focus_events();
        moved
    }

    pub fn set_focus(&mut self, id: WidgetId) -> bool {
        let moved = self.top_scope().is_some_and(|s| s.set_focus(id));
        self.drain_focus_events();
        moved
    }

    /// Sync every layer's scope with the focusables currently in its tree.
    pub fn refresh_focus(&mut self) {
        for layer in &mut self.layers {
            let handles = widget::collect_focusables(layer.root.as_ref());
            for id in layer.scope.ids() {
                if !handles.iter().any(|h| h.id() == id) {
                    layer.scope.unregister(id);
                }
            }
            for handle in handles {
                layer.scope.register(handle);
            }
        }
        self.drain_focus_events();
    }

    fn drain_focus_events(&mut self) {
        let events = std::mem::take(&mut *self.focus_events.borrow_mut());
        if events.is_empty() {
            return;
        }
        let mut needs_layout = self.stylesheet.as_ref().is_some_and(|s| s.relayout_on_focus());
        for (prev, next) in events {
            needs_layout |= prev.iter().chain(next.iter()).any(FocusHandle::affects_layout);
            self.outbox.push(Message::FocusChanged {
                prev: prev.map(|h| h.id()),
                next: next.map(|h| h.id()),
            });
        }
        if needs_layout {
            self.relayout();
        } else {
            self.styles = None;
            self.dirty |= Dirty::RENDER;
        }
    }

    // -------------------------------------------------------------------------
    // Layout & render
    // -------------------------------------------------------------------------

    pub fn resize(&mut self, size: Size) {
        if size == self.size {
            return;
        }
        self.size = size;
        self.buffer.resize(size.width, size.height);
        self.hit_grid.resize(size.width, size.height);
        self.dirty |= Dirty::FULL_REDRAW;
        self.relayout();
    }

    /// Measure and lay out every layer at full screen size.
    pub fn relayout(&mut self) {
        let _span = tracing::debug_span!("layout", layers = self.layers.len()).entered();
        let size = self.size;
        let full = Rect::from_size(size);
        for layer in &mut self.layers {
            let root = &mut layer.root;
            if let Err(caught) = fault::guard(|| root.measure(Constraints::tight(size))) {
                self.faults.push(RawFault::new(root.as_ref(), Phase::Measure, caught));
                continue;
            }
            if let Err(caught) = fault::guard(|| root.layout(full)) {
                self.faults.push(RawFault::new(root.as_ref(), Phase::Layout, caught));
            }
        }
        self.styles = None;
        self.hit_dirty = true;
        self.dirty.remove(Dirty::LAYOUT);
        self.dirty |= Dirty::RENDER;
        self.flush_faults();
    }

    /// Draw every layer, bottom to top, into the frame buffer.
    pub fn render(&mut self) {
        let _span = tracing::debug_span!("render", layers = self.layers.len()).entered();
        self.ensure_styles();
        self.buffer.clear();
        let full = Rect::from_size(self.size);
        let top = self.layers.len().saturating_sub(1);
        for (i, layer) in self.layers.iter().enumerate() {
            let mut ctx = RenderContext::new(
                &mut self.buffer,
                full,
                i == top,
                self.styles.as_ref(),
                &mut self.faults,
            );
            ctx.render_child(layer.root.as_ref(), full);
        }
        self.dirty.remove(Dirty::RENDER);
        self.flush_faults();
    }

    fn ensure_styles(&mut self) {
        if self.styles.is_some() {
            return;
        }
        let Some(sheet) = self.stylesheet.clone() else {
            return;
        };
        let media = MediaContext {
            width: self.size.width,
            height: self.size.height,
            reduced_motion: self.reduced_motion,
        };
        let roots = self.layers.iter().map(|l| l.root.as_ref());
        self.styles = Some(StyleResolver::new(sheet, media, roots));
    }

    /// Take and reset the pending work flags.
    pub fn take_dirty(&mut self) -> Dirty {
        std::mem::take(&mut self.dirty)
    }

    pub fn mark(&mut self, flags: Dirty) {
        self.dirty |= flags;
    }

    /// Messages the screen produced (focus changes), oldest first.
    pub fn take_messages(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.outbox)
    }

    // -------------------------------------------------------------------------
    // Dispatch
    // -------------------------------------------------------------------------

    /// Dispatch `msg` and apply focus and overlay commands.
    ///
    /// The returned result carries the commands meant for the loop.
    pub fn handle_message(&mut self, msg: &Message) -> HandleResult {
        let _span = tracing::debug_span!("dispatch", kind = msg.kind()).entered();
        self.last_message = Some(msg.clone());
        if let Message::Resize(size) = msg {
            self.resize(*size);
        }

        let mut commands = Vec::new();
        let mut handled = false;

        // Behind a modal layer the hit target is the only recipient.
        let mut settled = false;
        if let Message::Mouse(event) = msg {
            let target = self.widget_at(event.x, event.y);
            if let Some(target) = target {
                handled = self.dispatch_to(target, msg, &mut commands);
            }
            settled = self.hit_modal;
        }

        if !handled && !settled {
            for i in (0..self.layers.len()).rev() {
                let root = &mut self.layers[i].root;
                match fault::guard(|| root.handle_message(msg)) {
                    Ok(result) => {
                        commands.extend(result.commands);
                        handled = result.handled;
                    }
                    Err(caught) => {
                        self.faults.push(RawFault::new(root.as_ref(), Phase::HandleMessage, caught));
                    }
                }
                if handled || self.layers[i].modal {
                    break;
                }
            }
        }

        let mut rest = Vec::new();
        for command in commands {
            if command.is_screen_command() {
                self.apply_command(command);
            } else {
                rest.push(command);
            }
        }
        if handled {
            self.dirty |= Dirty::RENDER;
        }
        self.drain_focus_events();
        self.flush_faults();
        HandleResult {
            handled,
            commands: rest,
        }
    }

    fn dispatch_to(&mut self, target: WidgetId, msg: &Message, commands: &mut Vec<Command>) -> bool {
        for layer in self.layers.iter_mut().rev() {
            let outcome = widget::with_widget(layer.root.as_mut(), target, |w| {
                fault::guard(|| w.handle_message(msg)).map_err(|caught| RawFault::new(w, Phase::HandleMessage, caught))
            });
            match outcome {
                Some(Ok(result)) => {
                    commands.extend(result.commands);
                    return result.handled;
                }
                Some(Err(raw)) => {
                    self.faults.push(raw);
                    return false;
                }
                None => {}
            }
        }
        false
    }

    fn apply_command(&mut self, command: Command) {
        match command {
            Command::FocusNext => {
                self.focus_next();
            }
            Command::FocusPrev => {
                self.focus_prev();
            }
            Command::PushOverlay { root, modal } => self.push_layer(root, modal),
            Command::PopOverlay => {
                self.pop_layer();
            }
            other => tracing::warn!(command = ?other, "not a screen command"),
        }
    }

    // -------------------------------------------------------------------------
    // Hit testing
    // -------------------------------------------------------------------------

    /// The widget under a cell. Only the top layer is hit when it is modal.
    pub fn widget_at(&mut self, x: u16, y: u16) -> Option<WidgetId> {
        if self.hit_dirty {
            self.rebuild_hit_grid();
        }
        self.hit_grid.get(x, y)
    }

    fn rebuild_hit_grid(&mut self) {
        self.hit_grid.clear();
        self.hit_modal = self.layers.last().is_some_and(|top| top.modal);
        let start = if self.hit_modal { self.layers.len() - 1 } else { 0 };
        for layer in &self.layers[start..] {
            paint_hits(layer.root.as_ref(), &mut self.hit_grid);
        }
        self.hit_dirty = false;
    }

    // -------------------------------------------------------------------------
    // Faults, snapshots, state
    // -------------------------------------------------------------------------

    fn flush_faults(&mut self) {
        if self.faults.is_empty() {
            return;
        }
        let raws = std::mem::take(&mut self.faults);
        let roots: Vec<&dyn Widget> = self.layers.iter().map(|l| l.root.as_ref()).collect();
        for raw in raws {
            let fault = WidgetFault::from_raw(raw, &roots, self.fault_options, self.last_message.as_ref());
            self.reporter.report(&fault);
        }
    }

    /// The last rendered frame as plain text, one line per row.
    pub fn snapshot_text(&self) -> String {
        self.buffer.to_text()
    }

    pub fn capture_state(&self) -> Result<StateSnapshot, PersistError> {
        persist::capture_state(self.layers.iter().map(|l| l.root.as_ref()))
    }

    /// Restore keyed widgets and lay out again.
    pub fn apply_state(&mut self, snapshot: &StateSnapshot) -> Result<(), PersistError> {
        let result = persist::apply_state(
            self.layers.iter_mut().map(|l| -> &mut dyn Widget { l.root.as_mut() }),
            snapshot,
        );
        self.relayout();
        result
    }
}

/// Leaves claim their bounds; containers only with `hit_self`, painted
/// after their children so they sit on top.
fn paint_hits(widget: &dyn Widget, grid: &mut HitGrid) {
    let mut has_children = false;
    widget.visit_children(&mut |child| {
        has_children = true;
        paint_hits(child, grid);
    });
    if has_children && !widget.hit_self() {
        return;
    }
    if let Some(bounds) = widget.bounds().filter(|b| !b.is_empty()) {
        grid.fill_rect(bounds, widget.id());
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{Flex, FlexChild};
    use crate::state::keyboard::KeyboardEvent;
    use crate::state::mouse::{MouseButton, MouseEvent};
    use crate::style::{Selector, Style, WidgetState};
    use crate::types::Rgba;
    use std::cell::Cell;

    /// A one-line label that counts messages and can take focus.
    struct Label {
        id: WidgetId,
        text: &'static str,
        bounds: Rect,
        focus: Option<FocusHandle>,
        seen: Rc<Cell<usize>>,
        layouts: Rc<Cell<usize>>,
        consume: bool,
        on_key: Option<fn() -> Command>,
    }

    impl Label {
        fn new(text: &'static str) -> Self {
            Self {
                id: WidgetId::next(),
                text,
                bounds: Rect::default(),
                focus: None,
                seen: Rc::new(Cell::new(0)),
                layouts: Rc::new(Cell::new(0)),
                consume: false,
                on_key: None,
            }
        }

        fn focusable(mut self) -> Self {
            self.focus = Some(FocusHandle::new(self.id));
            self
        }

        fn consuming(mut self) -> Self {
            self.consume = true;
            self
        }
    }

    impl Widget for Label {
        fn id(&self) -> WidgetId {
            self.id
        }
        fn measure(&mut self, c: Constraints) -> Size {
            c.constrain(Size::new(self.text.len() as u16, 1))
        }
        fn layout(&mut self, bounds: Rect) {
            self.bounds = bounds;
            self.layouts.set(self.layouts.get() + 1);
        }
        fn render(&self, ctx: &mut RenderContext<'_>) {
            let style = ctx.style_for(self.id);
            ctx.set_string(self.bounds.x, self.bounds.y, self.text, &style);
        }
        fn handle_message(&mut self, msg: &Message) -> HandleResult {
            self.seen.set(self.seen.get() + 1);
            if let (Message::Key(_), Some(make)) = (msg, self.on_key) {
                return HandleResult::command(make());
            }
            if self.consume {
                HandleResult::handled()
            } else {
                HandleResult::unhandled()
            }
        }
        fn bounds(&self) -> Option<Rect> {
            Some(self.bounds)
        }
        fn focus_handle(&self) -> Option<FocusHandle> {
            self.focus.clone()
        }
    }

    /// Panics in the chosen phase.
    struct Bomb(WidgetId, Phase);

    impl Widget for Bomb {
        fn id(&self) -> WidgetId {
            self.0
        }
        fn measure(&mut self, c: Constraints) -> Size {
            if self.1 == Phase::Measure {
                panic!("measure boom");
            }
            c.min_size()
        }
        fn layout(&mut self, _bounds: Rect) {
            if self.1 == Phase::Layout {
                panic!("layout boom");
            }
        }
        fn render(&self, _ctx: &mut RenderContext<'_>) {}
        fn handle_message(&mut self, _msg: &Message) -> HandleResult {
            if self.1 == Phase::HandleMessage {
                panic!("boom");
            }
            HandleResult::unhandled()
        }
    }

    fn setup() -> Screen {
        let root = Flex::column()
            .push(FlexChild::fixed(Label::new("first").focusable()))
            .push(FlexChild::fixed(Label::new("second").focusable()));
        Screen::new(Size::new(10, 3), Box::new(root)).unwrap()
    }

    fn key() -> Message {
        Message::Key(KeyboardEvent::new("x"))
    }

    #[test]
    fn test_new_rejects_empty_size() {
        let err = Screen::new(Size::new(0, 5), Box::new(Label::new("x"))).err();
        assert_eq!(err, Some(ConfigError::EmptyScreen { width: 0, height: 5 }));
    }

    #[test]
    fn test_render_and_snapshot() {
        let mut screen = setup();
        screen.render();
        assert_eq!(screen.snapshot_text(), "first     \nsecond    \n          ");
    }

    #[test]
    fn test_base_layer_is_never_popped() {
        let mut screen = setup();
        assert!(screen.pop_layer().is_none());
        screen.push_layer(Box::new(Label::new("over")), false);
        assert_eq!(screen.layer_count(), 2);
        assert!(screen.pop_layer().is_some());
        assert!(screen.pop_layer().is_none());
        assert_eq!(screen.layer_count(), 1);
    }

    #[test]
    fn test_focus_commands_emit_focus_changed() {
        let mut screen = setup();
        let first = screen.focused();
        screen.take_messages();

        assert!(screen.focus_next());
        let second = screen.focused();
        assert_ne!(first, second);
        match screen.take_messages().as_slice() {
            [Message::FocusChanged { prev, next }] => {
                assert_eq!(*prev, first);
                assert_eq!(*next, second);
            }
            other => panic!("unexpected messages: {other:?}"),
        }

        assert!(screen.focus_next());
        assert_eq!(screen.focused(), first);
    }

    #[test]
    fn test_modal_layer_stops_dispatch() {
        let mut screen = setup();
        let below = Label::new("below");
        let below_seen = below.seen.clone();
        screen.set_root(Box::new(below));

        let modal = Label::new("modal");
        let modal_seen = modal.seen.clone();
        screen.push_layer(Box::new(modal), true);

        let result = screen.handle_message(&key());
        assert!(!result.handled);
        assert_eq!(modal_seen.get(), 1);
        assert_eq!(below_seen.get(), 0);

        screen.pop_layer();
        screen.handle_message(&key());
        assert_eq!(below_seen.get(), 1);
    }

    #[test]
    fn test_non_modal_layer_falls_through() {
        let mut screen = setup();
        let below = Label::new("below").consuming();
        let below_seen = below.seen.clone();
        screen.set_root(Box::new(below));
        screen.push_layer(Box::new(Label::new("over")), false);

        let result = screen.handle_message(&key());
        assert!(result.handled);
        assert_eq!(below_seen.get(), 1);
    }

    #[test]
    fn test_overlay_command_applied_by_screen() {
        let mut screen = setup();
        let mut opener = Label::new("open");
        opener.on_key = Some(|| Command::push_overlay(Label::new("dialog"), true));
        screen.set_root(Box::new(opener));

        let result = screen.handle_message(&key());
        assert!(result.handled);
        assert!(result.commands.is_empty());
        assert_eq!(screen.layer_count(), 2);
        assert!(screen.layers()[1].is_modal());
    }

    #[test]
    fn test_loop_commands_are_returned() {
        let mut screen = setup();
        let mut quitter = Label::new("quit");
        quitter.on_key = Some(|| Command::Quit);
        screen.set_root(Box::new(quitter));

        let result = screen.handle_message(&key());
        assert!(matches!(result.commands.as_slice(), [Command::Quit]));
    }

    #[test]
    fn test_mouse_goes_to_widget_under_cursor() {
        let first = Label::new("first").consuming();
        let second = Label::new("second").consuming();
        let (first_seen, second_seen) = (first.seen.clone(), second.seen.clone());
        let second_id = second.id;
        let root = Flex::column().push(FlexChild::fixed(first)).push(FlexChild::fixed(second));
        let mut screen = Screen::new(Size::new(10, 3), Box::new(root)).unwrap();

        assert_eq!(screen.widget_at(1, 1), Some(second_id));
        assert_eq!(screen.widget_at(9, 2), None);

        let click = Message::Mouse(MouseEvent::down(MouseButton::Left, 1, 1));
        assert!(screen.handle_message(&click).handled);
        assert_eq!(second_seen.get(), 1);
        assert_eq!(first_seen.get(), 0);
    }

    #[test]
    fn test_modal_hit_target_gets_pointer_once() {
        let mut screen = setup();
        let target = Label::new("t");
        let seen = target.seen.clone();
        screen.push_layer(Box::new(Flex::column().push(FlexChild::fixed(target))), true);

        let click = Message::Mouse(MouseEvent::down(MouseButton::Left, 0, 0));
        assert!(!screen.handle_message(&click).handled);
        assert_eq!(seen.get(), 1);

        let miss = Message::Mouse(MouseEvent::down(MouseButton::Left, 9, 2));
        assert!(!screen.handle_message(&miss).handled);
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn test_modal_layer_hides_lower_hits() {
        let mut screen = setup();
        assert!(screen.widget_at(0, 0).is_some());
        screen.push_layer(Box::new(Label::new("m")), true);
        let modal_id = screen.layers()[1].root().id();
        assert_eq!(screen.widget_at(0, 0), Some(modal_id));
        assert_eq!(screen.widget_at(0, 1), Some(modal_id));
    }

    #[test]
    fn test_resize_relayouts_and_requests_full_redraw() {
        let mut screen = setup();
        screen.take_dirty();
        screen.handle_message(&Message::Resize(Size::new(20, 4)));
        assert_eq!(screen.size(), Size::new(20, 4));
        let dirty = screen.take_dirty();
        assert!(dirty.contains(Dirty::FULL_REDRAW | Dirty::RENDER));
        screen.render();
        assert_eq!(screen.buffer().width(), 20);
    }

    #[test]
    fn test_focus_styles_only_the_top_layer() {
        let red = Rgba::rgb(255, 0, 0);
        let mut sheet = Stylesheet::new();
        sheet.add(Selector::of("Label").state(WidgetState::FOCUSED), Style::new().fg(red));
        let mut screen = Screen::new(Size::new(6, 1), Box::new(Label::new("ab").focusable()))
            .unwrap()
            .with_stylesheet(Arc::new(sheet));
        screen.render();
        assert_eq!(screen.buffer().get(0, 0).map(|c| c.fg), Some(red));

        screen.push_layer(Box::new(Label::new("")), false);
        screen.render();
        assert_ne!(screen.buffer().get(0, 0).map(|c| c.fg), Some(red));
    }

    #[test]
    fn test_focus_change_restyles_without_layout() {
        let first = Label::new("first").focusable();
        let second = Label::new("second").focusable();
        let layouts = first.layouts.clone();
        let handle = second.focus.clone().unwrap();
        let root = Flex::column().push(FlexChild::fixed(first)).push(FlexChild::fixed(second));
        let mut screen = Screen::new(Size::new(10, 3), Box::new(root)).unwrap();
        screen.take_dirty();

        let before = layouts.get();
        assert!(screen.focus_next());
        assert_eq!(layouts.get(), before);
        assert!(screen.take_dirty().contains(Dirty::RENDER));

        handle.set_affects_layout(true);
        assert!(screen.focus_next());
        assert_eq!(layouts.get(), before + 1);
    }

    #[test]
    fn test_stylesheet_can_relayout_on_focus() {
        let mut sheet = Stylesheet::new();
        sheet.set_relayout_on_focus(true);
        let first = Label::new("first").focusable();
        let layouts = first.layouts.clone();
        let root = Flex::column()
            .push(FlexChild::fixed(first))
            .push(FlexChild::fixed(Label::new("second").focusable()));
        let mut screen = Screen::new(Size::new(10, 3), Box::new(root))
            .unwrap()
            .with_stylesheet(Arc::new(sheet));

        let before = layouts.get();
        assert!(screen.focus_next());
        assert_eq!(layouts.get(), before + 1);
    }

    #[test]
    fn test_measure_and_layout_panics_are_isolated_per_layer() {
        let reporter = Arc::new(MemoryReporter::new());
        let base = Label::new("base");
        let layouts = base.layouts.clone();
        let mut screen = Screen::new(Size::new(6, 2), Box::new(base))
            .unwrap()
            .with_reporter(reporter.clone());

        screen.push_layer(Box::new(Bomb(WidgetId::next(), Phase::Measure)), false);
        screen.push_layer(Box::new(Bomb(WidgetId::next(), Phase::Layout)), false);
        let earlier = reporter.len();

        let before = layouts.get();
        screen.relayout();
        assert_eq!(layouts.get(), before + 1);
        let faults = reporter.faults().split_off(earlier);
        let phases: Vec<Phase> = faults.iter().map(|f| f.phase).collect();
        assert_eq!(phases, vec![Phase::Measure, Phase::Layout]);
        assert!(faults[0].error.contains("measure boom"));
        assert!(!screen.take_dirty().contains(Dirty::LAYOUT));

        screen.render();
        assert_eq!(screen.snapshot_text(), "base  \n      ");
    }

    #[test]
    fn test_handler_panic_is_reported() {
        let reporter = Arc::new(MemoryReporter::new());
        let mut screen = Screen::new(Size::new(4, 1), Box::new(Bomb(WidgetId::next(), Phase::HandleMessage)))
            .unwrap()
            .with_reporter(reporter.clone());
        let result = screen.handle_message(&key());
        assert!(!result.handled);
        let faults = reporter.faults();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].phase, Phase::HandleMessage);
        assert!(faults[0].error.contains("boom"));
        assert_eq!(faults[0].message.as_deref().map(|m| m.starts_with("Key")), Some(true));
    }
}
