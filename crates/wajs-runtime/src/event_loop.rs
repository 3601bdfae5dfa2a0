//! Single-threaded timer queue on a virtual millisecond clock.
//!
//! Time only moves when the embedder advances it. Timers fire in order of
//! due time, then of registration, each run to completion by the caller
//! before the next is taken. A timer armed while another is running is
//! due at least 1 ms later, so a callback that re-arms itself with a zero
//! delay yields to the clock instead of spinning at one instant.

use std::collections::{BTreeMap, HashMap};

pub type TimerId = u32;

#[derive(Debug, Clone)]
struct Timer<T> {
    due: u64,
    seq: u64,
    interval: Option<u64>,
    task: T,
}

/// A timer taken off the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct Fired<T> {
    pub id: TimerId,
    pub due: u64,
    pub task: T,
}

#[derive(Debug, Clone)]
pub struct EventLoop<T> {
    now: u64,
    next_id: TimerId,
    seq: u64,
    in_task: bool,
    queue: BTreeMap<(u64, u64), TimerId>,
    timers: HashMap<TimerId, Timer<T>>,
}

impl<T> Default for EventLoop<T> {
    fn default() -> Self {
        Self {
            now: 0,
            next_id: 1,
            seq: 0,
            in_task: false,
            queue: BTreeMap::new(),
            timers: HashMap::new(),
        }
    }
}

impl<T: Clone> EventLoop<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time in milliseconds.
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    pub fn is_idle(&self) -> bool {
        self.timers.is_empty()
    }

    fn enqueue(&mut self, id: TimerId, due: u64, interval: Option<u64>, task: T) {
        self.seq += 1;
        self.queue.insert((due, self.seq), id);
        self.timers.insert(
            id,
            Timer {
                due,
                seq: self.seq,
                interval,
                task,
            },
        );
    }

    fn fresh_id(&mut self) -> TimerId {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        id
    }

    /// Run `task` once, `delay` ms from now.
    pub fn schedule(&mut self, delay: u64, task: T) -> TimerId {
        let delay = if self.in_task { delay.max(1) } else { delay };
        let id = self.fresh_id();
        self.enqueue(id, self.now.saturating_add(delay), None, task);
        id
    }

    /// Run `task` every `period` ms. A zero period is treated as 1 ms so
    /// an interval never starves the clock.
    pub fn schedule_interval(&mut self, period: u64, task: T) -> TimerId {
        let period = period.max(1);
        let id = self.fresh_id();
        self.enqueue(id, self.now.saturating_add(period), Some(period), task);
        id
    }

    /// Remove a pending timer. A cancelled timer never fires; cancelling
    /// an unknown or already fired one-shot timer is a no-op.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.timers.remove(&id) {
            Some(timer) => {
                self.queue.remove(&(timer.due, timer.seq));
                true
            }
            None => false,
        }
    }

    pub fn next_due(&self) -> Option<u64> {
        self.queue.keys().next().map(|(due, _)| *due)
    }

    /// Take the earliest timer due at or before `until`, moving the clock
    /// to its due time. Intervals are re-armed before they are returned.
    pub fn pop_due(&mut self, until: u64) -> Option<Fired<T>> {
        let (&(due, seq), &id) = self.queue.iter().next()?;
        if due > until {
            return None;
        }
        self.queue.remove(&(due, seq));
        let timer = self.timers.remove(&id)?;
        self.now = self.now.max(due);
        self.in_task = true;
        if let Some(period) = timer.interval {
            self.enqueue(id, due.saturating_add(period), Some(period), timer.task.clone());
        }
        Some(Fired {
            id,
            due,
            task: timer.task,
        })
    }

    /// The task returned by the last [`pop_due`](Self::pop_due) has finished.
    pub fn task_done(&mut self) {
        self.in_task = false;
    }

    /// Move the clock forward without running anything.
    pub fn set_now(&mut self, now: u64) {
        self.now = self.now.max(now);
    }
}
