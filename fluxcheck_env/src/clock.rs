//! Core clock trait driving time-scheduled streams.

use crate::timer::{Action, TimerHandle};
use crate::types::TimeMode;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// The central interface for time.
///
/// This trait abstracts the passage of time so that time-driven streams can
/// run both against the wall clock and against a virtual clock that only
/// moves when the verifier tells it to.
///
/// # Implementations
///
/// - **Real time**: `TokioClock` - wraps `tokio::time::sleep`
/// - **Virtual time**: `VirtualClock` (in `fluxcheck_sim`) - a cursor that
///   moves only on `advance`
///
/// # Firing rules
///
/// Scheduled actions never run on a background thread. They run inside
/// `advance`, on the caller, in non-decreasing due-time order with ties
/// broken by registration order. An action may schedule or cancel other
/// entries while it runs.
#[async_trait]
pub trait Clock: Send + Sync + 'static {
    /// Returns the current cursor, measured from clock creation.
    fn now(&self) -> Duration;

    /// Returns whether this clock follows the wall clock or a virtual cursor.
    fn mode(&self) -> TimeMode;

    /// Registers `action` to fire once the cursor reaches `now() + delay`.
    ///
    /// The returned handle can be passed to [`Clock::cancel`].
    fn schedule(&self, delay: Duration, action: Action) -> TimerHandle;

    /// Removes a pending entry.
    ///
    /// Returns `false` if the entry already fired or was cancelled before.
    fn cancel(&self, handle: TimerHandle) -> bool;

    /// Moves the cursor forward by `duration`, firing every entry that
    /// becomes due on the way.
    ///
    /// Returns the wall-clock time spent running the fired actions. This is
    /// diagnostic only; the real clock's sleep is not included.
    async fn advance(&self, duration: Duration) -> Duration;

    /// Returns the due time of the earliest pending entry, if any.
    fn next_due(&self) -> Option<Duration>;

    /// Returns the number of pending entries.
    fn pending(&self) -> usize;
}

/// A clock shared between a verifier and the streams it drives.
pub type SharedClock = Arc<dyn Clock>;
