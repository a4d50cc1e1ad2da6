//! Real-time implementation of Clock using Tokio.

use crate::timer::{lock_queue, run_due, Action, TimerHandle, TimerQueue};
use crate::types::TimeMode;
use crate::Clock;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Real-time clock backed by Tokio timers.
///
/// `advance` really sleeps, then fires every entry due by the elapsed
/// wall-clock time. The cursor therefore reads as the wall time of the last
/// advance, and periodic entries keep their nominal due times instead of
/// drifting by the time their actions take.
pub struct TokioClock {
    /// Start time for wall-clock measurements
    start: Instant,

    /// Pending entries and the cursor
    queue: Mutex<TimerQueue>,
}

impl TokioClock {
    /// Creates a new TokioClock with its cursor at zero.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            queue: Mutex::new(TimerQueue::new()),
        }
    }

    /// Creates an Arc-wrapped clock for sharing with streams.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Returns the wall-clock time since creation.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Duration {
        lock_queue(&self.queue).now()
    }

    fn mode(&self) -> TimeMode {
        TimeMode::Real
    }

    fn schedule(&self, delay: Duration, action: Action) -> TimerHandle {
        lock_queue(&self.queue).schedule(delay, action)
    }

    fn cancel(&self, handle: TimerHandle) -> bool {
        lock_queue(&self.queue).cancel(handle)
    }

    async fn advance(&self, duration: Duration) -> Duration {
        tokio::time::sleep(duration).await;
        let target = self.now().saturating_add(duration).max(self.elapsed());
        run_due(&self.queue, target)
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
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_tokio_clock_time() {
        let clock = TokioClock::new();
        let t1 = clock.now();
        clock.advance(Duration::from_millis(10)).await;
        let t2 = clock.now();

        assert!(t2 > t1);
        assert!(t2 - t1 >= Duration::from_millis(10));
        assert!(clock.elapsed() >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_tokio_clock_fires_due_entries() {
        let clock = TokioClock::new();
        let hits = Arc::new(AtomicU32::new(0));

        for delay in [5, 10, 500] {
            let hits = Arc::clone(&hits);
            clock.schedule(
                Duration::from_millis(delay),
                Box::new(move || {
                    hits.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }

        clock.advance(Duration::from_millis(20)).await;

        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(clock.pending(), 1);
        assert_eq!(clock.next_due(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_tokio_clock_mode() {
        let clock = TokioClock::new();
        assert_eq!(clock.mode(), TimeMode::Real);
        assert_eq!(clock.now(), Duration::ZERO);
    }
}
