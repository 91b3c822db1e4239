//! The thread-safe side of the loop.
//!
//! [`AppHandle`] is cheap to clone and `Send + Sync`. Everything it does
//! reaches the loop through one bounded channel, so messages and call
//! requests are delivered in the order they were sent.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError, after, bounded, never, select};
use parking_lot::Mutex;

use super::message::Message;
use super::timer::{Clock, TimerId, TimerKind, TimerQueue};
use super::App;
use crate::error::{CallError, ConfigError, PostError};
use crate::reactive::{Job, Scheduler};
use crate::screen::Dirty;

// =============================================================================
// ENVELOPES
// =============================================================================

pub(crate) type CallJob = Box<dyn FnOnce(&mut App) + Send>;

pub(crate) enum Envelope {
    Message(Message),
    Call { job: CallJob, abandoned: Arc<AtomicBool> },
    /// Nudge an idle loop to look at timers, flags and scheduled jobs.
    Wake,
}

/// State shared between the loop and its handles.
pub(crate) struct Shared {
    pub(crate) tx: Sender<Envelope>,
    pub(crate) dirty: AtomicU8,
    pub(crate) quit: AtomicBool,
    pub(crate) closed: AtomicBool,
    pub(crate) loop_thread: ThreadId,
    pub(crate) timers: Mutex<TimerQueue>,
    pub(crate) jobs: Mutex<Vec<Job>>,
    flush_pending: AtomicBool,
    wake_pending: AtomicBool,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) shutdown: CancelToken,
}

impl Shared {
    pub(crate) fn new(capacity: usize, clock: Arc<dyn Clock>) -> (Arc<Self>, Receiver<Envelope>) {
        let (tx, rx) = bounded(capacity);
        let shared = Arc::new(Self {
            tx,
            dirty: AtomicU8::new((Dirty::LAYOUT | Dirty::RENDER | Dirty::FULL_REDRAW).bits()),
            quit: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            loop_thread: thread::current().id(),
            timers: Mutex::new(TimerQueue::default()),
            jobs: Mutex::new(Vec::new()),
            flush_pending: AtomicBool::new(false),
            wake_pending: AtomicBool::new(false),
            clock,
            shutdown: CancelToken::new(),
        });
        (shared, rx)
    }

    pub(crate) fn mark(&self, flags: Dirty) {
        self.dirty.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    pub(crate) fn take_dirty(&self) -> Dirty {
        Dirty::from_bits_truncate(self.dirty.swap(0, Ordering::AcqRel))
    }

    /// At most one `Wake` is queued at a time. Best effort: a full queue
    /// already guarantees the loop wakes up.
    pub(crate) fn wake(&self) {
        if self.closed.load(Ordering::Acquire) || self.wake_pending.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.tx.try_send(Envelope::Wake).is_err() {
            self.wake_pending.store(false, Ordering::Release);
        }
    }

    /// The loop took the queued `Wake`.
    pub(crate) fn woke(&self) {
        self.wake_pending.store(false, Ordering::Release);
    }

    pub(crate) fn take_jobs(&self) -> Vec<Job> {
        self.flush_pending.store(false, Ordering::Release);
        std::mem::take(&mut *self.jobs.lock())
    }

    fn schedule_job(&self, job: Job) {
        self.jobs.lock().push(job);
        // One QueueFlush per batch of scheduled jobs.
        if !self.flush_pending.swap(true, Ordering::AcqRel) && !self.closed.load(Ordering::Acquire) {
            let _ = self.tx.try_send(Envelope::Message(Message::QueueFlush));
        }
    }
}

// =============================================================================
// CANCELLATION
// =============================================================================

/// A one-shot cancellation flag that can also be waited on.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

struct CancelInner {
    cancelled: AtomicBool,
    // Dropping the sender disconnects `rx`, which wakes every waiter.
    tx: Mutex<Option<Sender<()>>>,
    rx: Receiver<()>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            inner: Arc::new(CancelInner {
                cancelled: AtomicBool::new(false),
                tx: Mutex::new(Some(tx)),
                rx,
            }),
        }
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        self.inner.tx.lock().take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Block until cancelled or `timeout` elapses. Returns whether cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let _ = self.inner.rx.recv_timeout(timeout);
        self.is_cancelled()
    }

    pub(crate) fn receiver(&self) -> &Receiver<()> {
        &self.inner.rx
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Deadline and cancellation for [`AppHandle::call_with`].
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub timeout: Option<Duration>,
    pub cancel: Option<CancelToken>,
}

impl CallOptions {
    pub fn timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

// =============================================================================
// APP HANDLE
// =============================================================================

/// Cloneable, thread-safe access to a running [`App`].
#[derive(Clone)]
pub struct AppHandle {
    pub(crate) shared: Arc<Shared>,
}

impl AppHandle {
    fn ensure_open(&self) -> Result<(), PostError> {
        if self.shared.closed.load(Ordering::Acquire) || self.shared.shutdown.is_cancelled() {
            Err(PostError::Closed)
        } else {
            Ok(())
        }
    }

    /// Queue `msg`, waiting while the queue is full.
    ///
    /// Fails with `Closed` once the loop quits, including while waiting.
    pub fn post(&self, msg: Message) -> Result<(), PostError> {
        self.ensure_open()?;
        select! {
            send(self.shared.tx, Envelope::Message(msg)) -> res => res.map_err(|_| PostError::Closed),
            recv(self.shared.shutdown.receiver()) -> _ => Err(PostError::Closed),
        }
    }

    /// Queue `msg` without waiting.
    pub fn try_post(&self, msg: Message) -> Result<(), PostError> {
        self.ensure_open()?;
        self.shared
            .tx
            .try_send(Envelope::Message(msg))
            .map_err(|err| match err {
                TrySendError::Full(_) => PostError::Full,
                TrySendError::Disconnected(_) => PostError::Closed,
            })
    }

    /// Run `f` on the loop with the app and wait for its result.
    pub fn call<R, F>(&self, f: F) -> Result<R, CallError>
    where
        R: Send + 'static,
        F: FnOnce(&mut App) -> R + Send + 'static,
    {
        self.call_with(CallOptions::default(), f)
    }

    /// [`call`](Self::call) with a deadline and/or cancellation token.
    ///
    /// A request given up on before the loop reaches it is skipped. Calling
    /// from the loop thread itself fails with `Reentrant`.
    pub fn call_with<R, F>(&self, options: CallOptions, f: F) -> Result<R, CallError>
    where
        R: Send + 'static,
        F: FnOnce(&mut App) -> R + Send + 'static,
    {
        if thread::current().id() == self.shared.loop_thread {
            return Err(CallError::Reentrant);
        }
        if self.ensure_open().is_err() {
            return Err(CallError::Closed);
        }

        let deadline = options.timeout.map(|t| Instant::now() + t);
        let timeout_err = || CallError::Timeout(options.timeout.unwrap_or_default());
        let (result_tx, result_rx) = bounded::<R>(1);
        let abandoned = Arc::new(AtomicBool::new(false));
        let job: CallJob = Box::new(move |app: &mut App| {
            let _ = result_tx.send(f(app));
        });

        let shutdown_rx = self.shared.shutdown.receiver();
        let never_cancel = never::<()>();
        let cancel_rx = options.cancel.as_ref().map_or(&never_cancel, |t| t.receiver());
        if options.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(CallError::Cancelled);
        }

        let envelope = Envelope::Call {
            job,
            abandoned: abandoned.clone(),
        };
        let sent = match deadline {
            Some(deadline) => {
                let wait = deadline.saturating_duration_since(Instant::now());
                select! {
                    send(self.shared.tx, envelope) -> res => res.map_err(|_| CallError::Closed),
                    recv(cancel_rx) -> _ => Err(CallError::Cancelled),
                    recv(shutdown_rx) -> _ => Err(CallError::Closed),
                    recv(after(wait)) -> _ => Err(timeout_err()),
                }
            }
            None => select! {
                send(self.shared.tx, envelope) -> res => res.map_err(|_| CallError::Closed),
                recv(cancel_rx) -> _ => Err(CallError::Cancelled),
                recv(shutdown_rx) -> _ => Err(CallError::Closed),
            },
        };
        sent?;

        let timer = match deadline {
            Some(deadline) => after(deadline.saturating_duration_since(Instant::now())),
            None => never(),
        };
        let outcome = select! {
            recv(result_rx) -> res => res.map_err(|_| CallError::Closed),
            recv(cancel_rx) -> _ => Err(CallError::Cancelled),
            // A job that quits the loop still delivers its result.
            recv(shutdown_rx) -> _ => result_rx.try_recv().map_err(|_| CallError::Closed),
            recv(timer) -> _ => Err(timeout_err()),
        };
        if outcome.is_err() {
            abandoned.store(true, Ordering::Release);
        }
        outcome
    }

    /// Queue `msg` after `delay`.
    pub fn after(&self, delay: Duration, msg: Message) -> TimerId {
        let deadline = self.shared.clock.now() + delay;
        let id = self.shared.timers.lock().insert(deadline, TimerKind::Once(msg));
        self.shared.wake();
        id
    }

    /// Call `tick` every `interval`; a returned message is queued.
    pub fn every<F>(&self, interval: Duration, tick: F) -> Result<TimerId, ConfigError>
    where
        F: FnMut(Instant) -> Option<Message> + Send + 'static,
    {
        if interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        let deadline = self.shared.clock.now() + interval;
        let kind = TimerKind::Every {
            interval,
            tick: Box::new(tick),
        };
        let id = self.shared.timers.lock().insert(deadline, kind);
        self.shared.wake();
        Ok(id)
    }

    /// Returns false if the timer already fired or was never scheduled.
    pub fn cancel_timer(&self, id: TimerId) -> bool {
        self.shared.timers.lock().cancel(id)
    }

    /// Run `task` on a new named thread.
    pub fn spawn<F>(&self, task: F) -> std::io::Result<JoinHandle<()>>
    where
        F: FnOnce(TaskContext) + Send + 'static,
    {
        let ctx = TaskContext {
            handle: self.clone(),
            shutdown: self.shared.shutdown.clone(),
        };
        thread::Builder::new()
            .name("spark-task".into())
            .spawn(move || task(ctx))
    }

    /// A scheduler that runs reactive callbacks on the loop thread.
    pub fn scheduler(&self) -> Arc<dyn Scheduler> {
        Arc::new(LoopScheduler {
            shared: self.shared.clone(),
        })
    }

    /// Request a render pass.
    pub fn invalidate(&self) {
        self.shared.mark(Dirty::RENDER);
        self.shared.wake();
    }

    /// Request a layout pass followed by a render.
    pub fn relayout(&self) {
        self.shared.mark(Dirty::LAYOUT | Dirty::RENDER);
        self.shared.wake();
    }

    /// Stop the loop after the current step.
    pub fn quit(&self) {
        self.shared.quit.store(true, Ordering::Release);
        self.shared.shutdown.cancel();
        self.shared.wake();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for AppHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppHandle")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// What a spawned task gets: a way back into the loop and the shutdown
/// signal.
#[derive(Debug, Clone)]
pub struct TaskContext {
    handle: AppHandle,
    shutdown: CancelToken,
}

impl TaskContext {
    pub fn handle(&self) -> &AppHandle {
        &self.handle
    }

    pub fn post(&self, msg: Message) -> Result<(), PostError> {
        self.handle.post(msg)
    }

    pub fn try_post(&self, msg: Message) -> Result<(), PostError> {
        self.handle.try_post(msg)
    }

    /// Set once the loop starts shutting down.
    pub fn shutdown(&self) -> &CancelToken {
        &self.shutdown
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

/// Runs jobs on the loop, coalescing them into one `QueueFlush`.
struct LoopScheduler {
    shared: Arc<Shared>,
}

impl Scheduler for LoopScheduler {
    fn schedule(&self, job: Job) {
        self.shared.schedule_job(job);
    }
}
