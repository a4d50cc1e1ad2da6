//! Ordered queue of pending clock entries.
//!
//! Both clock implementations keep their entries in a [`TimerQueue`] and
//! drain it with [`run_due`], so real and virtual time share one set of
//! ordering rules:
//!
//! - entries fire in non-decreasing due time
//! - entries with the same due time fire in registration order
//! - the cursor sits at an entry's due time while that entry runs

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Work registered with a clock.
pub type Action = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a scheduled entry, used for cancellation.
///
/// Handles order by due time, then by registration sequence, which is
/// exactly the firing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle {
    due: Duration,
    seq: u64,
}

impl TimerHandle {
    /// Returns the cursor value at which the entry fires.
    pub fn due(&self) -> Duration {
        self.due
    }
}

/// Cursor plus pending entries, ordered by [`TimerHandle`].
pub struct TimerQueue {
    /// Current cursor
    cursor: Duration,

    /// Sequence number handed to the next registration
    next_seq: u64,

    /// Pending entries in firing order
    entries: BTreeMap<TimerHandle, Action>,

    /// Entries fired so far
    fired: u64,
}

impl TimerQueue {
    /// Creates an empty queue with the cursor at zero.
    pub fn new() -> Self {
        Self::starting_at(Duration::ZERO)
    }

    /// Creates an empty queue with the cursor at `cursor`.
    pub fn starting_at(cursor: Duration) -> Self {
        Self {
            cursor,
            next_seq: 0,
            entries: BTreeMap::new(),
            fired: 0,
        }
    }

    /// Returns the current cursor.
    pub fn now(&self) -> Duration {
        self.cursor
    }

    /// Returns the number of pending entries.
    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    /// Returns the number of entries fired so far.
    pub fn fired(&self) -> u64 {
        self.fired
    }

    /// Returns the earliest pending due time.
    pub fn next_due(&self) -> Option<Duration> {
        self.entries.keys().next().map(TimerHandle::due)
    }

    /// Registers `action` at `cursor + delay`.
    pub fn schedule(&mut self, delay: Duration, action: Action) -> TimerHandle {
        let handle = TimerHandle {
            due: self.cursor.saturating_add(delay),
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.entries.insert(handle, action);
        handle
    }

    /// Removes a pending entry, dropping its action.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.entries.remove(&handle).is_some()
    }

    /// Drops every pending entry and returns how many there were.
    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }

    /// Pops the earliest entry due at or before `target`.
    ///
    /// The cursor moves to the popped entry's due time.
    pub fn pop_due(&mut self, target: Duration) -> Option<Action> {
        let entry = self.entries.first_entry()?;
        if entry.key().due > target {
            return None;
        }
        let (handle, action) = entry.remove_entry();
        self.cursor = self.cursor.max(handle.due);
        self.fired += 1;
        Some(action)
    }

    /// Moves the cursor to `target` unless it is already past it.
    pub fn settle(&mut self, target: Duration) {
        self.cursor = self.cursor.max(target);
    }
}

impl Default for TimerQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TimerQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerQueue")
            .field("cursor", &self.cursor)
            .field("pending", &self.entries.keys().collect::<Vec<_>>())
            .field("fired", &self.fired)
            .finish()
    }
}

/// Locks a queue, recovering the guard if a previous action panicked.
pub fn lock_queue(queue: &Mutex<TimerQueue>) -> MutexGuard<'_, TimerQueue> {
    queue.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fires every entry of `queue` due at or before `target`, then settles the
/// cursor at `target`.
///
/// The lock is released while each action runs. Entries registered by an
/// action are fired in the same pass when they fall inside the window.
///
/// Returns the wall-clock time spent inside actions.
pub fn run_due(queue: &Mutex<TimerQueue>, target: Duration) -> Duration {
    let mut spent = Duration::ZERO;
    loop {
        let next = lock_queue(queue).pop_due(target);
        let Some(action) = next else {
            break;
        };
        let started = Instant::now();
        action();
        spent += started.elapsed();
    }
    lock_queue(queue).settle(target);
    spent
}
