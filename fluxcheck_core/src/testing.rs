//! Hand-stepped clock for unit tests.

use async_trait::async_trait;
use fluxcheck_env::{lock_queue, run_due, Action, Clock, TimeMode, TimerHandle, TimerQueue};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Clock whose cursor only moves through [`ManualClock::step`].
#[derive(Debug, Default)]
pub(crate) struct ManualClock {
    queue: Mutex<TimerQueue>,
}

impl ManualClock {
    pub(crate) fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn step(&self, duration: Duration) -> Duration {
        let target = lock_queue(&self.queue).now().saturating_add(duration);
        run_due(&self.queue, target)
    }

    pub(crate) fn next_due_at(&self) -> Option<Duration> {
        lock_queue(&self.queue).next_due()
    }

    pub(crate) fn pending_entries(&self) -> usize {
        lock_queue(&self.queue).pending()
    }
}

#[async_trait]
impl Clock for ManualClock {
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
        self.step(duration)
    }

    fn next_due(&self) -> Option<Duration> {
        self.next_due_at()
    }

    fn pending(&self) -> usize {
        self.pending_entries()
    }
}
