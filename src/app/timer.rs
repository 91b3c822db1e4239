//! Clocks and the loop's timer queue.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::message::Message;

/// Time source for timers. Swappable so tests can drive time by hand.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock()
    }
}

// =============================================================================
// TIMERS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Callback of a repeating timer; its message, if any, is queued.
pub type TickFn = Box<dyn FnMut(Instant) -> Option<Message> + Send>;

pub(crate) enum TimerKind {
    Once(Message),
    Every { interval: Duration, tick: TickFn },
}

pub(crate) struct Timer {
    deadline: Instant,
    kind: TimerKind,
}

/// Timers keyed by id, ordered by deadline.
///
/// Due timers are taken out of the queue before their callbacks run, so a
/// callback may schedule or cancel timers without deadlocking.
#[derive(Default)]
pub(crate) struct TimerQueue {
    next_id: u64,
    heap: BinaryHeap<Reverse<(Instant, TimerId)>>,
    timers: HashMap<TimerId, Timer>,
    running: HashSet<TimerId>,
    cancelled: HashSet<TimerId>,
}

impl TimerQueue {
    pub(crate) fn insert(&mut self, deadline: Instant, kind: TimerKind) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.schedule(id, Timer { deadline, kind });
        id
    }

    fn schedule(&mut self, id: TimerId, timer: Timer) {
        self.heap.push(Reverse((timer.deadline, id)));
        self.timers.insert(id, timer);
    }

    pub(crate) fn cancel(&mut self, id: TimerId) -> bool {
        if self.timers.remove(&id).is_some() {
            return true;
        }
        self.running.contains(&id) && self.cancelled.insert(id)
    }

    pub(crate) fn next_deadline(&mut self) -> Option<Instant> {
        while let Some(Reverse((deadline, id))) = self.heap.peek().copied() {
            match self.timers.get(&id) {
                Some(timer) if timer.deadline == deadline => return Some(deadline),
                // Stale heap entry left by a cancel.
                _ => {
                    self.heap.pop();
                }
            }
        }
        None
    }

    /// Remove every timer due at `now`, earliest first.
    pub(crate) fn take_due(&mut self, now: Instant) -> Vec<(TimerId, Timer)> {
        let mut due = Vec::new();
        while let Some(deadline) = self.next_deadline() {
            if deadline > now {
                break;
            }
            if let Some(Reverse((_, id))) = self.heap.pop() {
                if let Some(timer) = self.timers.remove(&id) {
                    self.running.insert(id);
                    due.push((id, timer));
                }
            }
        }
        due
    }

    /// Put a repeating timer back after its callback ran.
    pub(crate) fn finish(&mut self, id: TimerId, timer: Option<Timer>) {
        self.running.remove(&id);
        if self.cancelled.remove(&id) {
            return;
        }
        if let Some(timer) = timer {
            self.schedule(id, timer);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.timers.len()
    }
}

impl Timer {
    /// Run the timer. Returns its message and, for repeating timers, the
    /// rescheduled timer. A repeating timer that fell behind skips the
    /// missed ticks.
    pub(crate) fn fire(self, now: Instant) -> (Option<Message>, Option<Timer>) {
        match self.kind {
            TimerKind::Once(msg) => (Some(msg), None),
            TimerKind::Every { interval, mut tick } => {
                let msg = tick(now);
                let mut deadline = self.deadline + interval;
                if deadline <= now {
                    deadline = now + interval;
                }
                let next = Timer {
                    deadline,
                    kind: TimerKind::Every { interval, tick },
                };
                (msg, Some(next))
            }
        }
    }
}
