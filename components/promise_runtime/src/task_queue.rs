//! Timer, microtask and idle-callback queues.
//!
//! These are the host primitives the event loop is built from. None of them
//! run anything: they only hand back the next job to execute so that the loop
//! can invoke it without holding a borrow of its own state.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::rc::Rc;

/// A unit of deferred work.
pub type Job = Box<dyn FnOnce()>;

/// Identifies a timer, interval or idle callback so it can be cancelled.
pub type TimerId = u64;

/// A timer entry in the timer heap.
#[derive(Debug, Clone, Copy)]
pub struct TimerEntry {
    /// Timer ID for cancellation.
    pub timer_id: TimerId,
    /// Absolute deadline in milliseconds.
    pub deadline_ms: u64,
    /// Sequence number for stable ordering of equal deadlines.
    pub seq: u64,
}

// Order by (deadline_ms, seq) ascending - min-heap needs reversed comparison.
impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline_ms == other.deadline_ms && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        match other.deadline_ms.cmp(&self.deadline_ms) {
            Ordering::Equal => other.seq.cmp(&self.seq),
            ord => ord,
        }
    }
}

enum TimerCallback {
    Once(Job),
    Repeat { period_ms: u64, callback: Rc<dyn Fn()> },
}

/// What the timer queue hands back when a timer is due.
pub enum DueTimer {
    /// A one-shot timer; it has already been forgotten.
    Once(Job),
    /// An interval; it has already been re-armed for its next period.
    Repeat(Rc<dyn Fn()>),
}

/// Timers ordered by deadline, then by scheduling order.
///
/// Cancellation removes the callback; the stale heap entry is skipped lazily.
#[derive(Default)]
pub struct TimerQueue {
    heap: BinaryHeap<TimerEntry>,
    callbacks: HashMap<TimerId, TimerCallback>,
}

impl TimerQueue {
    /// Creates an empty timer queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a one-shot timer.
    pub fn schedule(&mut self, entry: TimerEntry, job: Job) {
        self.callbacks.insert(entry.timer_id, TimerCallback::Once(job));
        self.heap.push(entry);
    }

    /// Arms a repeating timer.
    pub fn schedule_repeating(&mut self, entry: TimerEntry, period_ms: u64, callback: Rc<dyn Fn()>) {
        self.callbacks.insert(
            entry.timer_id,
            TimerCallback::Repeat {
                period_ms,
                callback,
            },
        );
        self.heap.push(entry);
    }

    /// Cancels a timer. Returns true if it was still armed.
    pub fn cancel(&mut self, timer_id: TimerId) -> bool {
        self.callbacks.remove(&timer_id).is_some()
    }

    /// Returns true if the timer is still armed.
    pub fn contains(&self, timer_id: TimerId) -> bool {
        self.callbacks.contains_key(&timer_id)
    }

    /// Number of armed timers.
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Returns true if no timer is armed.
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Deadline of the earliest armed timer.
    pub fn next_deadline(&mut self) -> Option<u64> {
        self.discard_cancelled();
        self.heap.peek().map(|entry| entry.deadline_ms)
    }

    /// Pops the earliest timer if its deadline is at or before `now_ms`.
    ///
    /// Repeating timers are pushed back with `next_seq` as their new sequence.
    pub fn pop_due(&mut self, now_ms: u64, next_seq: u64) -> Option<(TimerEntry, DueTimer)> {
        self.discard_cancelled();
        let entry = *self.heap.peek()?;
        if entry.deadline_ms > now_ms {
            return None;
        }
        self.heap.pop();
        match self.callbacks.remove(&entry.timer_id)? {
            TimerCallback::Once(job) => Some((entry, DueTimer::Once(job))),
            TimerCallback::Repeat {
                period_ms,
                callback,
            } => {
                let next = TimerEntry {
                    timer_id: entry.timer_id,
                    deadline_ms: entry.deadline_ms.saturating_add(period_ms.max(1)),
                    seq: next_seq,
                };
                self.schedule_repeating(next, period_ms, callback.clone());
                Some((entry, DueTimer::Repeat(callback)))
            }
        }
    }

    fn discard_cancelled(&mut self) {
        while let Some(entry) = self.heap.peek() {
            if self.callbacks.contains_key(&entry.timer_id) {
                break;
            }
            self.heap.pop();
        }
    }
}

/// A queue for microtasks.
///
/// Microtasks are drained completely before any timer or idle callback runs.
#[derive(Default)]
pub struct MicrotaskQueue {
    queue: VecDeque<Job>,
}

impl MicrotaskQueue {
    /// Creates a new empty MicrotaskQueue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a microtask to the end of the queue.
    pub fn enqueue(&mut self, job: Job) {
        self.queue.push_back(job);
    }

    /// Removes and returns the next microtask from the queue.
    pub fn dequeue(&mut self) -> Option<Job> {
        self.queue.pop_front()
    }

    /// Returns true if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns the number of microtasks in the queue.
    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

struct IdleEntry {
    id: TimerId,
    deadline_ms: Option<u64>,
    job: Job,
}

/// Callbacks waiting for the loop to become idle.
///
/// An entry with a deadline is forced to run once the deadline passes even if
/// the loop never goes idle.
#[derive(Default)]
pub struct IdleQueue {
    entries: VecDeque<IdleEntry>,
}

impl IdleQueue {
    /// Creates an empty idle queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an idle callback.
    pub fn enqueue(&mut self, id: TimerId, deadline_ms: Option<u64>, job: Job) {
        self.entries.push_back(IdleEntry {
            id,
            deadline_ms,
            job,
        });
    }

    /// Removes an idle callback. Returns true if it was still queued.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        before != self.entries.len()
    }

    /// Removes the first callback whose deadline has passed.
    pub fn take_expired(&mut self, now_ms: u64) -> Option<Job> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.deadline_ms.is_some_and(|deadline| deadline <= now_ms))?;
        self.entries.remove(index).map(|entry| entry.job)
    }

    /// Removes every queued callback, in request order.
    pub fn take_all(&mut self) -> Vec<Job> {
        self.entries.drain(..).map(|entry| entry.job).collect()
    }

    /// Returns true if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of queued callbacks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
