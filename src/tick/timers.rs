use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::time::Instant;

/// Handle returned by [`TimerQueue::after`], used to cancel the continuation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Per-peer deferred continuations, driven by the peer's own tick clock.
///
/// Nothing runs on its own: the tick loop moves the clock forward with
/// [`TimerQueue::set_clock`] and collects whatever came due with
/// [`TimerQueue::drain_due`]. Timers due at the same instant come out in
/// scheduling order.
#[derive(Debug)]
pub struct TimerQueue<T> {
    clock: Instant,
    next_id: u64,
    pending: BTreeMap<(Instant, u64), T>,
    deadlines: HashMap<u64, Instant>,
}

impl<T> TimerQueue<T> {
    pub fn new(now: Instant) -> Self {
        Self {
            clock: now,
            next_id: 0,
            pending: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    pub fn clock(&self) -> Instant {
        self.clock
    }

    /// Move the clock forward. Never goes backwards.
    pub fn set_clock(&mut self, now: Instant) {
        if now > self.clock {
            self.clock = now;
        }
    }

    /// Schedule `timer` to come due `delay` after the current clock
    pub fn after(&mut self, delay: Duration, timer: T) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;
        let due = self.clock + delay;
        self.pending.insert((due, id), timer);
        self.deadlines.insert(id, due);
        TimerId(id)
    }

    /// Drop a pending timer. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.deadlines.remove(&id.0) {
            Some(due) => self.pending.remove(&(due, id.0)).is_some(),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Remove and return every timer due at or before the clock
    pub fn drain_due(&mut self) -> Vec<(TimerId, T)> {
        let mut due = Vec::new();
        while let Some(entry) = self.pending.first_entry() {
            let (at, id) = *entry.key();
            if at > self.clock {
                break;
            }
            let timer = entry.remove();
            self.deadlines.remove(&id);
            due.push((TimerId(id), timer));
        }
        due
    }
}
