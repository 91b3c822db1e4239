//! Cross-module guarantees of the runtime.
//!
//! Run with: cargo test --test properties

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use proptest::prelude::*;

use spark_runtime::layout::{FlexItem, solve};
use spark_runtime::reactive::{Job, Spawner};
use spark_runtime::screen::{MemoryReporter, Phase};
use spark_runtime::{
    App, AppConfig, Computed, Constraints, Flex, FlexChild, FocusHandle, FocusScope, HandleResult,
    KeyboardEvent, MemoryBackend, Message, Rect, RenderContext, Resource, Screen, Signal, Size,
    Spacer, Style, Widget, WidgetId, batch,
};

// =============================================================================
// FIXTURES
// =============================================================================

/// Draws a fixed string, optionally panicking instead.
struct Label {
    id: WidgetId,
    text: &'static str,
    bounds: Rect,
    explode: bool,
    seen: Rc<Cell<usize>>,
}

impl Label {
    fn new(text: &'static str) -> Self {
        Self {
            id: WidgetId::next(),
            text,
            bounds: Rect::default(),
            explode: false,
            seen: Rc::new(Cell::new(0)),
        }
    }

    fn exploding() -> Self {
        Self {
            explode: true,
            ..Self::new("")
        }
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
    }

    fn render(&self, ctx: &mut RenderContext<'_>) {
        if self.explode {
            panic!("render exploded");
        }
        ctx.set_string(self.bounds.x, self.bounds.y, self.text, &Style::new());
    }

    fn handle_message(&mut self, _msg: &Message) -> HandleResult {
        self.seen.set(self.seen.get() + 1);
        HandleResult::unhandled()
    }

    fn bounds(&self) -> Option<Rect> {
        Some(self.bounds)
    }
}

#[derive(Default)]
struct ManualSpawner {
    jobs: Mutex<Vec<Job>>,
}

impl Spawner for ManualSpawner {
    fn spawn(&self, job: Job) {
        self.jobs.lock().push(job);
    }
}

fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    (count, move || {
        c.fetch_add(1, Ordering::SeqCst);
    })
}

// =============================================================================
// LAYOUT
// =============================================================================

proptest! {
    #[test]
    fn test_flex_conserves_space(
        container in 0u16..400,
        gap in 0u16..4,
        items in prop::collection::vec((0u16..40, 0.0f64..5.0), 1..8),
    ) {
        let items: Vec<FlexItem> = items
            .into_iter()
            .map(|(base, grow)| FlexItem { base, grow, shrink: 1.0 })
            .collect();
        let gaps = gap as u32 * (items.len() as u32 - 1);
        let bases: u32 = items.iter().map(|it| it.base as u32).sum();
        let growing = items.iter().any(|it| it.grow > 0.0);
        prop_assume!(growing && bases + gaps <= container as u32);

        let sizes = solve(container, gap, &items);
        let used: u32 = sizes.iter().map(|s| *s as u32).sum::<u32>() + gaps;
        prop_assert_eq!(used, container as u32);
    }
}

#[test]
fn test_flex_widget_fills_row() {
    let mut row = Flex::row()
        .with_gap(1)
        .push(FlexChild::fixed(Label::new("ab")))
        .push(Spacer::space())
        .push(FlexChild::expanded(Label::new("")));
    row.measure(Constraints::tight(Size::new(21, 1)));
    row.layout(Rect::new(0, 0, 21, 1));

    let widths: Vec<u16> = row.child_bounds().iter().map(|b| b.width).collect();
    assert_eq!(widths, vec![2, 9, 8]);
    assert_eq!(widths.iter().sum::<u16>() + 2, 21);
}

// =============================================================================
// REACTIVITY
// =============================================================================

#[test]
fn test_equal_set_does_not_notify() {
    let signal = Signal::new(vec![1, 2, 3]);
    let (count, bump) = counter();
    let _sub = signal.subscribe(bump);

    assert!(!signal.set(vec![1, 2, 3]));
    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert!(signal.set(vec![1, 2]));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_untaken_branch_is_pruned() {
    let guard = Signal::new(true);
    let a = Signal::new(1);
    let b = Signal::new(5);
    let (g, ca, cb) = (guard.clone(), a.clone(), b.clone());
    let sum = Computed::tracked(move |t| if t.get(&g) { t.get(&ca) } else { t.get(&cb) });
    let (count, bump) = counter();
    let _sub = sum.subscribe(bump);
    assert_eq!(sum.get(), 1);

    guard.set(false);
    assert_eq!(sum.get(), 5);
    assert_eq!(count.load(Ordering::SeqCst), 1);

    a.set(2);
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(a.subscriber_count(), 0);

    b.set(7);
    assert_eq!(sum.get(), 7);
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[test]
fn test_batch_defers_until_outermost_close() {
    let signal = Signal::new(0);
    let (count, bump) = counter();
    let _sub = signal.subscribe(bump);

    batch(|| {
        signal.set(1);
        batch(|| signal.set(2));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    });
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[test]
fn test_only_latest_fetch_is_applied() {
    let spawner = Arc::new(ManualSpawner::default());
    let query = Signal::new("first");
    let fetches = Arc::new(AtomicUsize::new(0));
    let f = fetches.clone();
    let res: Resource<usize, ()> = Resource::builder(move || Ok(f.fetch_add(1, Ordering::SeqCst)))
        .deps(vec![query.dependency()])
        .spawner(spawner.clone())
        .build();

    query.set("second");
    let mut jobs = std::mem::take(&mut *spawner.jobs.lock());
    assert_eq!(jobs.len(), 2);
    let stale = jobs.remove(0);
    let fresh = jobs.remove(0);

    // The fresh fetch completes first with 0; the stale one yields 1 and is dropped.
    fresh();
    stale();
    let state = res.get();
    assert_eq!(state.data, Some(0));
    assert!(!state.loading);
    assert_eq!(res.generation(), 2);
}

// =============================================================================
// FOCUS & DISPATCH
// =============================================================================

#[test]
fn test_focus_wraps_and_skips_disabled() {
    let handles: Vec<FocusHandle> = (0..3).map(|_| FocusHandle::new(WidgetId::next())).collect();
    handles[1].set_enabled(false);
    let mut scope = FocusScope::new();
    for handle in &handles {
        scope.register(handle.clone());
    }

    assert_eq!(scope.current_id(), Some(handles[0].id()));
    assert!(scope.focus_next());
    assert_eq!(scope.current_id(), Some(handles[2].id()));
    assert!(scope.focus_next());
    assert_eq!(scope.current_id(), Some(handles[0].id()));
    assert!(scope.focus_prev());
    assert_eq!(scope.current_id(), Some(handles[2].id()));
}

#[test]
fn test_modal_layer_is_a_dispatch_boundary() {
    let base = Label::new("base");
    let base_seen = base.seen.clone();
    let mut screen = Screen::new(Size::new(8, 2), Box::new(base)).unwrap();

    let middle = Label::new("mid");
    let middle_seen = middle.seen.clone();
    screen.push_layer(Box::new(middle), true);
    let top = Label::new("top");
    let top_seen = top.seen.clone();
    screen.push_layer(Box::new(top), false);

    let result = screen.handle_message(&Message::Key(KeyboardEvent::new("Enter")));
    assert!(!result.handled);
    assert_eq!((top_seen.get(), middle_seen.get(), base_seen.get()), (1, 1, 0));
}

// =============================================================================
// FAULTS
// =============================================================================

#[test]
fn test_render_fault_is_isolated() {
    let reporter = Arc::new(MemoryReporter::new());
    let root = Flex::row()
        .push(FlexChild::sized(Label::exploding(), 3))
        .push(FlexChild::fixed(Label::new("ok")));
    let config = AppConfig::new().with_reporter(reporter.clone()).with_show_tree(true);
    let mut app = App::new(config, MemoryBackend::new(6, 1), root).unwrap();

    assert!(app.try_step().unwrap());
    assert_eq!(app.screen().snapshot_text(), "   ok ");
    let faults = reporter.faults();
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0].phase, Phase::Render);
    assert!(faults[0].error.contains("render exploded"));
    assert!(faults[0].tree.is_some());

    // The loop keeps going.
    app.handle().invalidate();
    assert!(app.try_step().unwrap());
    assert_eq!(app.frame_count(), 2);
    assert_eq!(reporter.len(), 2);
}
