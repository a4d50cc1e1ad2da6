//! Virtual clock implementing `Clock` for compressed-time verification.

use async_trait::async_trait;
use fluxcheck_env::{lock_queue, run_due, Action, Clock, TimeMode, TimerHandle, TimerQueue};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Simulated time source.
///
/// The cursor moves only through [`VirtualClock::advance_by`] (or the
/// trait's `advance`). Advancing fires every due entry immediately, on the
/// caller, so an hour of periodic emissions runs in a few milliseconds:
/// - entries fire in non-decreasing due time, ties in registration order
/// - an action may schedule or cancel entries while it runs
/// - entries an action registers inside the current window fire in the
///   same advance
pub struct VirtualClock {
    /// Current cursor and pending entries
    queue: Mutex<TimerQueue>,
}

impl VirtualClock {
    /// Creates a new VirtualClock with its cursor at zero.
    pub fn new() -> Self {
        Self::starting_at(Duration::ZERO)
    }

    /// Creates a VirtualClock whose cursor starts at `start`.
    pub fn starting_at(start: Duration) -> Self {
        Self {
            queue: Mutex::new(TimerQueue::starting_at(start)),
        }
    }

    /// Creates an Arc-wrapped clock for sharing with streams.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Advances virtual time by `duration`, firing everything that falls due.
    ///
    /// Returns the wall-clock time spent inside fired actions.
    pub fn advance_by(&self, duration: Duration) -> Duration {
        let (from, pending) = {
            let queue = lock_queue(&self.queue);
            (queue.now(), queue.pending())
        };
        let target = from.saturating_add(duration);
        let fired_before = self.fired();

        let spent = run_due(&self.queue, target);

        debug!(
            from = ?from,
            to = ?target,
            pending_before = pending,
            fired = self.fired() - fired_before,
            "Advanced virtual time"
        );
        spent
    }

    /// Advances virtual time up to the absolute instant `target`.
    ///
    /// Does nothing if the cursor is already at or past `target`.
    pub fn advance_to(&self, target: Duration) -> Duration {
        let now = self.now();
        if target <= now {
            return Duration::ZERO;
        }
        self.advance_by(target - now)
    }

    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        self.now().as_nanos() as u64
    }

    /// Returns how many entries have fired since creation.
    pub fn fired(&self) -> u64 {
        lock_queue(&self.queue).fired()
    }

    /// Drops every pending entry and returns how many there were.
    pub fn clear(&self) -> usize {
        lock_queue(&self.queue).clear()
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for VirtualClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualClock")
            .field("queue", &*lock_queue(&self.queue))
            .finish()
    }
}

#[async_trait]
impl Clock for VirtualClock {
    fn now(&self) -> Duration {
        lock_queue(&self.queue).now()
    }

    fn mode(&self) -> TimeMode {
        TimeMode::Virtual
    }

    fn schedule(&self, delay: Duration, action: Action) -> TimerHandle {
        lock_queue(&self.queue).schedule(delay, action)
    }

    fn cancel(&self, handle: TimerHandle) -> bool {
        lock_queue(&self.queue).cancel(handle)
    }

    async fn advance(&self, duration: Duration) -> Duration {
        // No sleep: virtual time never waits on the wall clock
        self.advance_by(duration)
    }

    fn next_due(&self) -> Option<Duration> {
        lock_queue(&self.queue).next_due()
    }

    fn pending(&self) -> usize {
        lock_queue(&self.queue).pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Weak;

    type Log = Arc<Mutex<Vec<(usize, Duration)>>>;

    /// Schedules an action that records its index and the cursor it sees.
    fn record(clock: &Arc<VirtualClock>, log: &Log, index: usize, delay: Duration) -> TimerHandle {
        let weak: Weak<VirtualClock> = Arc::downgrade(clock);
        let sink = Arc::clone(log);
        clock.schedule(
            delay,
            Box::new(move || {
                let now = weak.upgrade().map(|c| c.now()).unwrap_or_default();
                sink.lock().unwrap().push((index, now));
            }),
        )
    }

    fn entries(log: &Log) -> Vec<(usize, Duration)> {
        log.lock().unwrap().clone()
    }

    #[test]
    fn test_virtual_clock_time() {
        let clock = VirtualClock::new();
        assert_eq!(clock.now(), Duration::ZERO);

        clock.advance_by(Duration::from_secs(1));
        assert_eq!(clock.now(), Duration::from_secs(1));

        clock.advance_by(Duration::from_millis(500));
        assert_eq!(clock.now(), Duration::from_millis(1500));
        assert_eq!(clock.time_ns(), 1_500_000_000);
    }

    #[test]
    fn test_starting_at_offsets_cursor() {
        let clock = VirtualClock::starting_at(Duration::from_secs(60));
        assert_eq!(clock.now(), Duration::from_secs(60));

        clock.advance_to(Duration::from_secs(30));
        assert_eq!(clock.now(), Duration::from_secs(60));

        clock.advance_to(Duration::from_secs(90));
        assert_eq!(clock.now(), Duration::from_secs(90));
    }

    #[test]
    fn test_entries_fire_in_due_then_registration_order() {
        let clock = VirtualClock::shared();
        let log: Log = Arc::new(Mutex::new(Vec::new()));

        record(&clock, &log, 0, Duration::from_millis(300));
        record(&clock, &log, 1, Duration::from_millis(100));
        record(&clock, &log, 2, Duration::from_millis(100));
        record(&clock, &log, 3, Duration::from_millis(200));

        clock.advance_by(Duration::from_millis(250));
        assert_eq!(
            entries(&log),
            vec![
                (1, Duration::from_millis(100)),
                (2, Duration::from_millis(100)),
                (3, Duration::from_millis(200)),
            ]
        );
        assert_eq!(clock.now(), Duration::from_millis(250));
        assert_eq!(clock.pending(), 1);
        assert_eq!(clock.next_due(), Some(Duration::from_millis(300)));
    }

    #[test]
    fn test_entry_due_exactly_at_target_fires() {
        let clock = VirtualClock::shared();
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        record(&clock, &log, 0, Duration::from_secs(1));

        clock.advance_by(Duration::from_secs(1));
        assert_eq!(entries(&log), vec![(0, Duration::from_secs(1))]);
    }

    #[test]
    fn test_cancelled_entry_never_fires() {
        let clock = VirtualClock::shared();
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let handle = record(&clock, &log, 0, Duration::from_secs(1));

        assert!(clock.cancel(handle));
        assert!(!clock.cancel(handle));

        clock.advance_by(Duration::from_secs(5));
        assert!(entries(&log).is_empty());
        assert_eq!(clock.fired(), 0);
    }

    #[test]
    fn test_rescheduling_inside_window_fires_same_advance() {
        let clock = VirtualClock::shared();
        let count = Arc::new(Mutex::new(0u32));

        fn tick(clock: Weak<VirtualClock>, count: Arc<Mutex<u32>>) {
            *count.lock().unwrap() += 1;
            if let Some(strong) = clock.upgrade() {
                let next = Arc::downgrade(&strong);
                strong.schedule(
                    Duration::from_millis(100),
                    Box::new(move || tick(next, count)),
                );
            }
        }

        let weak = Arc::downgrade(&clock);
        let counter = Arc::clone(&count);
        clock.schedule(Duration::from_millis(100), Box::new(move || tick(weak, counter)));

        clock.advance_by(Duration::from_secs(1));
        assert_eq!(*count.lock().unwrap(), 10);
        assert_eq!(clock.next_due(), Some(Duration::from_millis(1100)));

        assert_eq!(clock.clear(), 1);
        assert_eq!(clock.pending(), 0);
    }

    #[tokio::test]
    async fn test_trait_advance_does_not_sleep() {
        let clock = VirtualClock::shared();
        let started = std::time::Instant::now();

        clock.advance(Duration::from_secs(3600)).await;

        assert_eq!(clock.now(), Duration::from_secs(3600));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(clock.mode(), TimeMode::Virtual);
    }

    proptest! {
        #[test]
        fn prop_split_advance_is_idempotent(
            delays in prop::collection::vec(0u64..2_000, 0..24),
            d1 in 0u64..1_500,
            d2 in 0u64..1_500,
        ) {
            let once = VirtualClock::shared();
            let split = VirtualClock::shared();
            let once_log: Log = Arc::new(Mutex::new(Vec::new()));
            let split_log: Log = Arc::new(Mutex::new(Vec::new()));

            for (i, delay) in delays.iter().enumerate() {
                record(&once, &once_log, i, Duration::from_millis(*delay));
                record(&split, &split_log, i, Duration::from_millis(*delay));
            }

            once.advance_by(Duration::from_millis(d1 + d2));
            split.advance_by(Duration::from_millis(d1));
            split.advance_by(Duration::from_millis(d2));

            prop_assert_eq!(entries(&once_log), entries(&split_log));
            prop_assert_eq!(once.now(), split.now());
            prop_assert_eq!(once.pending(), split.pending());
        }

        #[test]
        fn prop_fire_times_never_decrease(delays in prop::collection::vec(0u64..5_000, 1..32)) {
            let clock = VirtualClock::shared();
            let log: Log = Arc::new(Mutex::new(Vec::new()));
            for (i, delay) in delays.iter().enumerate() {
                record(&clock, &log, i, Duration::from_millis(*delay));
            }

            clock.advance_by(Duration::from_secs(5));

            let fired = entries(&log);
            prop_assert_eq!(fired.len(), delays.len());
            for pair in fired.windows(2) {
                prop_assert!(pair[0].1 <= pair[1].1);
                if pair[0].1 == pair[1].1 {
                    prop_assert!(pair[0].0 < pair[1].0);
                }
            }
        }
    }
}
