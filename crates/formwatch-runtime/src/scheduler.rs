#![forbid(unsafe_code)]

//! Cooperative single-threaded scheduler with virtual time.
//!
//! The [`Scheduler`] owns two queues:
//!
//! - a FIFO **microtask** queue, drained by [`Scheduler::run_microtasks`].
//!   Work queued here runs "at the end of the current tick", which is what
//!   the visibility engine uses to coalesce bursts of signals;
//! - a set of **timers** (one-shot and periodic) keyed by a virtual clock
//!   that only moves when the host calls [`Scheduler::advance`].
//!
//! Driving time explicitly keeps every schedule deterministic: tests advance
//! by exact durations, and a host event loop advances by the real elapsed
//! time between frames.
//!
//! # Invariants
//!
//! 1. Timers fire in deadline order; equal deadlines fire in creation order.
//! 2. The microtask queue is fully drained after every timer callback.
//! 3. A cancelled timer never fires again, even if cancelled from inside its
//!    own callback.
//! 4. No internal borrow is held while user callbacks run, so callbacks may
//!    queue work, create timers or cancel timers freely.
//!
//! # Failure Modes
//!
//! - A periodic timer that never cancels itself keeps firing on every
//!   `advance`; [`Scheduler::advance`] is bounded by the requested duration,
//!   so it still terminates.
//! - Dropping the `Scheduler` while handles are alive: handles become inert.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::time::Duration;

type Microtask = Box<dyn FnOnce()>;

enum TimerCallback {
    Once(Option<Box<dyn FnOnce()>>),
    Repeat(Box<dyn FnMut()>),
}

struct TimerEntry {
    id: u64,
    deadline: Duration,
    period: Option<Duration>,
    callback: Rc<RefCell<TimerCallback>>,
}

#[derive(Default)]
struct SchedulerState {
    now: Duration,
    next_timer_id: u64,
    microtasks: VecDeque<Microtask>,
    timers: Vec<TimerEntry>,
}

impl SchedulerState {
    /// Index of the earliest timer due at or before `limit`.
    fn next_due(&self, limit: Duration) -> Option<usize> {
        self.timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.deadline <= limit)
            .min_by_key(|(_, t)| (t.deadline, t.id))
            .map(|(idx, _)| idx)
    }
}

/// Shared handle to a cooperative scheduler. Clones share the same queues.
#[derive(Clone, Default)]
pub struct Scheduler {
    state: Rc<RefCell<SchedulerState>>,
}

impl Scheduler {
    /// Create a scheduler with its clock at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.state.borrow().now
    }

    /// Queue `task` to run on the next microtask drain.
    pub fn queue_microtask(&self, task: impl FnOnce() + 'static) {
        self.state.borrow_mut().microtasks.push_back(Box::new(task));
    }

    /// Run queued microtasks until the queue is empty, including any queued
    /// while draining. Returns how many ran.
    pub fn run_microtasks(&self) -> usize {
        let mut ran = 0;
        loop {
            let task = self.state.borrow_mut().microtasks.pop_front();
            let Some(task) = task else {
                break;
            };
            task();
            ran += 1;
        }
        ran
    }

    /// Fire `callback` once after `delay`.
    pub fn set_timeout(&self, delay: Duration, callback: impl FnOnce() + 'static) -> TimerHandle {
        self.insert_timer(
            delay,
            None,
            TimerCallback::Once(Some(Box::new(callback))),
        )
    }

    /// Fire `callback` every `period` until the handle is cancelled or dropped.
    ///
    /// A zero period is clamped to one millisecond so `advance` terminates.
    pub fn set_interval(&self, period: Duration, callback: impl FnMut() + 'static) -> TimerHandle {
        let period = period.max(Duration::from_millis(1));
        self.insert_timer(period, Some(period), TimerCallback::Repeat(Box::new(callback)))
    }

    fn insert_timer(
        &self,
        delay: Duration,
        period: Option<Duration>,
        callback: TimerCallback,
    ) -> TimerHandle {
        let mut state = self.state.borrow_mut();
        let id = state.next_timer_id;
        state.next_timer_id += 1;
        let deadline = state.now + delay;
        state.timers.push(TimerEntry {
            id,
            deadline,
            period,
            callback: Rc::new(RefCell::new(callback)),
        });
        TimerHandle {
            id,
            state: Rc::downgrade(&self.state),
        }
    }

    /// Move the clock forward by `by`, firing every timer that comes due.
    ///
    /// Microtasks are drained before the first timer and after each one.
    pub fn advance(&self, by: Duration) {
        self.run_microtasks();
        let target = self.now() + by;
        loop {
            let fired = {
                let mut state = self.state.borrow_mut();
                let Some(idx) = state.next_due(target) else {
                    break;
                };
                let deadline = state.timers[idx].deadline;
                state.now = deadline;
                let callback = Rc::clone(&state.timers[idx].callback);
                let id = state.timers[idx].id;
                if let Some(period) = state.timers[idx].period {
                    state.timers[idx].deadline = deadline + period;
                } else {
                    state.timers.remove(idx);
                }
                (id, callback)
            };
            let (id, callback) = fired;
            tracing::trace!(timer = id, now = ?self.now(), "timer fired");
            match &mut *callback.borrow_mut() {
                TimerCallback::Once(slot) => {
                    if let Some(cb) = slot.take() {
                        cb();
                    }
                }
                TimerCallback::Repeat(cb) => cb(),
            }
            self.run_microtasks();
        }
        self.state.borrow_mut().now = target;
    }

    /// Jump from deadline to deadline until nothing is queued or scheduled.
    ///
    /// Never returns while an unbounded interval is live.
    pub fn run_until_idle(&self) {
        self.run_microtasks();
        while let Some(deadline) = self.next_deadline() {
            let now = self.now();
            self.advance(deadline.saturating_sub(now));
        }
    }

    /// Deadline of the next pending timer, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.state.borrow().timers.iter().map(|t| t.deadline).min()
    }

    /// Number of queued microtasks.
    #[must_use]
    pub fn pending_microtasks(&self) -> usize {
        self.state.borrow().microtasks.len()
    }

    /// Number of live timers.
    #[must_use]
    pub fn active_timers(&self) -> usize {
        self.state.borrow().timers.len()
    }

    /// Whether nothing is queued or scheduled.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        let state = self.state.borrow();
        state.microtasks.is_empty() && state.timers.is_empty()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Scheduler")
            .field("now", &state.now)
            .field("microtasks", &state.microtasks.len())
            .field("timers", &state.timers.len())
            .finish()
    }
}

/// RAII handle for a scheduled timer. Dropping it cancels the timer.
#[must_use = "dropping a TimerHandle cancels the timer"]
pub struct TimerHandle {
    id: u64,
    state: Weak<RefCell<SchedulerState>>,
}

impl TimerHandle {
    /// Cancel the timer now. Equivalent to dropping the handle.
    pub fn cancel(self) {}

    /// Whether the timer is still scheduled.
    #[must_use]
    pub fn is_active(&self) -> bool {
        let Some(state) = self.state.upgrade() else {
            return false;
        };
        let active = state.borrow().timers.iter().any(|t| t.id == self.id);
        active
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            state.borrow_mut().timers.retain(|t| t.id != self.id);
        }
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle").field("id", &self.id).finish()
    }
}
