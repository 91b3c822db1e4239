//! Loop behaviour driven headlessly through `try_step` and a memory backend.
//!
//! Run with: cargo test --test app_loop

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use spark_runtime::app::{CallOptions, CancelToken, ManualClock, RenderSampler};
use spark_runtime::reactive::Signal;
use spark_runtime::{
    App, AppConfig, CallError, Command, ConfigError, Constraints, HandleResult, MemoryBackend,
    Message, PostError, Rect, RenderContext, Size, Widget, WidgetId,
};

// =============================================================================
// FIXTURES
// =============================================================================

/// Records every `&str` payload it sees and reacts to a few of them.
struct Echo {
    id: WidgetId,
    log: Rc<RefCell<Vec<String>>>,
}

impl Widget for Echo {
    fn id(&self) -> WidgetId {
        self.id
    }

    fn measure(&mut self, c: Constraints) -> Size {
        c.min_size()
    }

    fn layout(&mut self, _bounds: Rect) {}

    fn render(&self, ctx: &mut RenderContext<'_>) {
        let style = ctx.style_for(self.id);
        let last = self.log.borrow().last().cloned().unwrap_or_default();
        ctx.set_string(0, 0, &last, &style);
    }

    fn handle_message(&mut self, msg: &Message) -> HandleResult {
        let Some(text) = msg.downcast_ref::<&str>() else {
            return HandleResult::unhandled();
        };
        self.log.borrow_mut().push(text.to_string());
        match *text {
            "chain" => HandleResult::command(Command::SendMsg(Message::custom("chained"))),
            "quit" => HandleResult::command(Command::Quit),
            _ => HandleResult::handled(),
        }
    }
}

fn setup_with(config: AppConfig) -> (App, Rc<RefCell<Vec<String>>>) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let root = Echo {
        id: WidgetId::next(),
        log: log.clone(),
    };
    let app = App::new(config, MemoryBackend::new(12, 2), root).unwrap();
    (app, log)
}

fn setup() -> (App, Rc<RefCell<Vec<String>>>) {
    setup_with(AppConfig::new())
}

fn drain(app: &mut App) {
    while app.try_step().unwrap() {}
}

// =============================================================================
// MESSAGES
// =============================================================================

#[test]
fn test_posts_are_delivered_in_order() {
    let (mut app, log) = setup();
    let handle = app.handle();
    thread::spawn(move || {
        for text in ["one", "two", "three"] {
            handle.post(Message::custom(text)).unwrap();
        }
    })
    .join()
    .unwrap();

    drain(&mut app);
    assert_eq!(*log.borrow(), vec!["one", "two", "three"]);
    assert_eq!(app.screen().snapshot_text().lines().next(), Some("three       "));
}

#[test]
fn test_try_post_reports_full_queue() {
    let (app, _log) = setup_with(AppConfig::new().with_capacity(1));
    let handle = app.handle();
    assert_eq!(handle.try_post(Message::custom("a")), Ok(()));
    assert_eq!(handle.try_post(Message::custom("b")), Err(PostError::Full));
}

#[test]
fn test_loop_messages_run_before_queued_ones() {
    let (mut app, log) = setup();
    let handle = app.handle();
    handle.post(Message::custom("chain")).unwrap();
    handle.post(Message::custom("after")).unwrap();

    drain(&mut app);
    assert_eq!(*log.borrow(), vec!["chain", "chained", "after"]);
}

#[test]
fn test_quit_closes_handles() {
    let (mut app, log) = setup();
    let handle = app.handle();
    handle.post(Message::custom("quit")).unwrap();
    app.run().unwrap();

    assert_eq!(*log.borrow(), vec!["quit"]);
    assert!(handle.is_closed());
    assert_eq!(handle.try_post(Message::Invalidate), Err(PostError::Closed));
}

#[test]
fn test_quit_from_another_thread_unblocks_run() {
    let (mut app, _log) = setup();
    let handle = app.handle();
    let quitter = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        handle.quit();
    });
    app.run().unwrap();
    quitter.join().unwrap();
    assert!(app.is_quitting());
}

// =============================================================================
// CALLS
// =============================================================================

#[test]
fn test_call_runs_on_the_loop() {
    let (mut app, _log) = setup();
    let handle = app.handle();
    let caller = thread::spawn(move || handle.call(|app| app.screen().layer_count()));

    while !caller.is_finished() {
        app.try_step().unwrap();
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(caller.join().unwrap(), Ok(1));
}

#[test]
fn test_call_timeout_abandons_the_request() {
    let (mut app, _log) = setup();
    let handle = app.handle();
    let ran = Arc::new(AtomicBool::new(false));
    let flag = ran.clone();

    let result = thread::spawn(move || {
        handle.call_with(CallOptions::timeout(Duration::from_millis(20)), move |_| {
            flag.store(true, Ordering::SeqCst);
        })
    })
    .join()
    .unwrap();

    assert_eq!(result, Err(CallError::Timeout(Duration::from_millis(20))));
    drain(&mut app);
    assert!(!ran.load(Ordering::SeqCst));
}

#[test]
fn test_cancelled_call_returns_cancelled() {
    let (app, _log) = setup();
    let handle = app.handle();
    let token = CancelToken::new();
    let cancel = token.clone();

    let caller = thread::spawn(move || handle.call_with(CallOptions::default().with_cancel(token), |_| ()));
    thread::sleep(Duration::from_millis(10));
    cancel.cancel();
    assert_eq!(caller.join().unwrap(), Err(CallError::Cancelled));
}

#[test]
fn test_call_on_loop_thread_is_rejected() {
    let (app, _log) = setup();
    assert_eq!(app.handle().call(|_| ()), Err(CallError::Reentrant));
}

#[test]
fn test_call_after_drop_is_closed() {
    let (app, _log) = setup();
    let handle = app.handle();
    drop(app);
    let result = thread::spawn(move || handle.call(|_| ())).join().unwrap();
    assert_eq!(result, Err(CallError::Closed));
}

// =============================================================================
// TIMERS
// =============================================================================

#[test]
fn test_after_fires_on_the_clock() {
    let clock = Arc::new(ManualClock::new());
    let (mut app, log) = setup_with(AppConfig::new().with_clock(clock.clone()));
    let handle = app.handle();
    handle.after(Duration::from_millis(10), Message::custom("ping"));

    drain(&mut app);
    assert!(log.borrow().is_empty());

    clock.advance(Duration::from_millis(10));
    drain(&mut app);
    assert_eq!(*log.borrow(), vec!["ping"]);
}

#[test]
fn test_every_ticks_until_cancelled() {
    let clock = Arc::new(ManualClock::new());
    let (mut app, log) = setup_with(AppConfig::new().with_clock(clock.clone()));
    let handle = app.handle();

    let err = handle.every(Duration::ZERO, |_| None);
    assert_eq!(err, Err(ConfigError::ZeroInterval));

    let id = handle
        .every(Duration::from_millis(5), |_| Some(Message::custom("tick")))
        .unwrap();
    for _ in 0..2 {
        clock.advance(Duration::from_millis(5));
        drain(&mut app);
    }
    assert_eq!(log.borrow().len(), 2);

    assert!(handle.cancel_timer(id));
    clock.advance(Duration::from_millis(5));
    drain(&mut app);
    assert_eq!(log.borrow().len(), 2);
    assert!(!handle.cancel_timer(id));
}

// =============================================================================
// TASKS & SCHEDULING
// =============================================================================

#[test]
fn test_spawned_task_posts_back() {
    let (mut app, log) = setup();
    let task = app
        .handle()
        .spawn(|ctx| {
            assert!(!ctx.is_shutdown());
            ctx.post(Message::custom("done")).unwrap();
        })
        .unwrap();
    task.join().unwrap();

    drain(&mut app);
    assert_eq!(*log.borrow(), vec!["done"]);
}

#[test]
fn test_scheduler_runs_callbacks_on_the_loop() {
    let (mut app, _log) = setup();
    drain(&mut app);

    let signal = Signal::new(0);
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();
    let loop_thread = thread::current().id();
    let _sub = signal.subscribe_with(app.handle().scheduler(), move || {
        assert_eq!(thread::current().id(), loop_thread);
        c.fetch_add(1, Ordering::SeqCst);
    });

    let writer = signal.clone();
    thread::spawn(move || {
        writer.set(1);
        writer.set(2);
    })
    .join()
    .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    drain(&mut app);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

// =============================================================================
// RENDERING
// =============================================================================

#[test]
fn test_invalidate_renders_again_and_is_sampled() {
    let sampler = Arc::new(RenderSampler::default());
    let (mut app, _log) = setup_with(AppConfig::new().with_observer(sampler.clone()));
    drain(&mut app);
    assert_eq!(app.frame_count(), 1);

    app.handle().invalidate();
    drain(&mut app);
    assert_eq!(app.frame_count(), 2);

    let summary = sampler.summary();
    assert_eq!(summary.frames, 2);
    assert_eq!(summary.last.map(|s| s.total_cells), Some(24));
    assert!(summary.last.is_some_and(|s| !s.full_redraw));
}
