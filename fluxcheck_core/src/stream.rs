//! Lazy, restartable event streams.
//!
//! A [`Stream`] stores a subscribe function and does nothing until
//! [`Stream::subscribe`] is called. Each subscription runs that function
//! again from the start, so two subscriptions never share emission state.
//!
//! Producers push events into an [`Emitter`]. The emitter answers every push
//! with a [`ControlFlow`]: `Break` means the subscriber has seen enough, and a
//! synchronous producer stops iterating. This is what lets `take` bound an
//! infinite sequence without looping forever.

use crate::error::ConstructionError;
use crate::event::Event;
use fluxcheck_env::{SharedClock, TimerHandle};
use std::fmt;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The subscriber side of a subscription, as seen by the producer.
pub struct Emitter<T, E> {
    sink: Arc<dyn Fn(Event<T, E>) -> ControlFlow<()> + Send + Sync>,
}

impl<T, E> Emitter<T, E> {
    /// Wraps a sink function.
    pub fn new<F>(sink: F) -> Self
    where
        F: Fn(Event<T, E>) -> ControlFlow<()> + Send + Sync + 'static,
    {
        Self {
            sink: Arc::new(sink),
        }
    }

    /// Delivers one event.
    pub fn emit(&self, event: Event<T, E>) -> ControlFlow<()> {
        (self.sink)(event)
    }

    /// Delivers a value.
    pub fn value(&self, value: T) -> ControlFlow<()> {
        self.emit(Event::Value(value))
    }

    /// Delivers a terminal error.
    pub fn error(&self, error: E) -> ControlFlow<()> {
        self.emit(Event::Error(error))
    }

    /// Delivers terminal completion.
    pub fn complete(&self) -> ControlFlow<()> {
        self.emit(Event::Complete)
    }
}

impl<T, E> Clone for Emitter<T, E> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
        }
    }
}

impl<T, E> fmt::Debug for Emitter<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter").finish_non_exhaustive()
    }
}

/// Handle returned by [`Stream::subscribe`].
///
/// Cancelling releases whatever the producer still holds, such as pending
/// clock registrations. Dropping the handle does not cancel.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Creates a subscription that runs `cancel` once when cancelled.
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Creates a subscription with nothing to release.
    pub fn empty() -> Self {
        Self { cancel: None }
    }

    /// Releases the producer. Later calls do nothing.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Returns true until `cancel` has run.
    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

type SubscribeFn<T, E> = dyn Fn(Emitter<T, E>) -> Subscription + Send + Sync;

/// A lazy, restartable producer of [`Event`]s.
pub struct Stream<T, E> {
    source: Arc<SubscribeFn<T, E>>,
    kind: &'static str,
}

impl<T, E> Clone for Stream<T, E> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            kind: self.kind,
        }
    }
}

impl<T, E> fmt::Debug for Stream<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream").field("kind", &self.kind).finish()
    }
}

impl<T, E> Stream<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Creates a stream from a custom subscribe function.
    ///
    /// The function runs once per subscription. It should honour the event
    /// protocol (values, then at most one terminal event) and stop producing
    /// when the emitter answers `Break`.
    pub fn new<F>(subscribe: F) -> Self
    where
        F: Fn(Emitter<T, E>) -> Subscription + Send + Sync + 'static,
    {
        Self::with_kind("custom", subscribe)
    }

    fn with_kind<F>(kind: &'static str, subscribe: F) -> Self
    where
        F: Fn(Emitter<T, E>) -> Subscription + Send + Sync + 'static,
    {
        Self {
            source: Arc::new(subscribe),
            kind,
        }
    }

    /// Returns the name of the combinator that built this stream.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Starts a fresh emission into `emitter`.
    ///
    /// Synchronous producers have emitted everything they are going to emit
    /// by the time this returns.
    pub fn subscribe(&self, emitter: Emitter<T, E>) -> Subscription {
        (self.source)(emitter)
    }

    /// A stream that only completes.
    pub fn empty() -> Self {
        Self::with_kind("empty", |emitter| {
            let _ = emitter.complete();
            Subscription::empty()
        })
    }

    /// A stream that emits every value of `values`, in order, then completes.
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Clone,
    {
        let values: Vec<T> = values.into_iter().collect();
        Self::with_kind("from_values", move |emitter| {
            emit_all(&emitter, values.iter().cloned());
            Subscription::empty()
        })
    }

    /// A stream that walks a fresh copy of `sequence` on every subscription.
    ///
    /// The sequence may be infinite as long as the subscriber stops it, for
    /// example through [`Stream::take`].
    pub fn from_sequence<I>(sequence: I) -> Self
    where
        I: IntoIterator<Item = T> + Clone + Send + Sync + 'static,
    {
        Self::with_kind("from_sequence", move |emitter| {
            emit_all(&emitter, sequence.clone());
            Subscription::empty()
        })
    }

    /// A stream that fails immediately with `error`.
    pub fn fail_with(error: E) -> Self
    where
        E: Clone,
    {
        Self::with_kind("fail_with", move |emitter| {
            let _ = emitter.error(error.clone());
            Subscription::empty()
        })
    }

    /// Passes through the first `n` values, then completes and detaches from
    /// the source.
    ///
    /// A source that terminates before `n` values has its terminal event
    /// passed through unchanged.
    pub fn take(self, n: u64) -> Self {
        Self::with_kind("take", move |downstream| {
            if n == 0 {
                let _ = downstream.complete();
                return Subscription::empty();
            }

            let gate = Arc::new(TakeGate {
                remaining: AtomicU64::new(n),
                done: AtomicBool::new(false),
                downstream,
                upstream: Mutex::new(None),
            });

            let forward = Arc::clone(&gate);
            let mut upstream = self.subscribe(Emitter::new(move |event| forward.forward(event)));

            // Synchronous sources may have hit the limit inside subscribe
            if gate.done.load(Ordering::Acquire) {
                upstream.cancel();
            } else {
                *lock(&gate.upstream) = Some(upstream);
            }

            Subscription::new(move || gate.detach())
        })
    }

    /// Emits this stream's values, then subscribes to `next` once this one
    /// completes. An error from this stream ends the concatenation.
    pub fn concat(self, next: Stream<T, E>) -> Self {
        Self::with_kind("concat", move |downstream| {
            let link = Arc::new(ConcatLink {
                cancelled: AtomicBool::new(false),
                subscriptions: Mutex::new(Vec::new()),
            });

            let handoff = Arc::clone(&link);
            let second = next.clone();
            let first = self.subscribe(Emitter::new(move |event| match event {
                Event::Complete => {
                    if handoff.cancelled.load(Ordering::Acquire) {
                        return ControlFlow::Break(());
                    }
                    handoff.hold(second.subscribe(downstream.clone()));
                    ControlFlow::Continue(())
                }
                other => downstream.emit(other),
            }));
            link.hold(first);

            Subscription::new(move || link.cancel())
        })
    }

    /// Transforms every value with `f`.
    pub fn map<U, F>(self, f: F) -> Stream<U, E>
    where
        U: Send + Sync + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Stream::with_kind("map", move |downstream: Emitter<U, E>| {
            let f = Arc::clone(&f);
            self.subscribe(Emitter::new(move |event: Event<T, E>| {
                downstream.emit(event.map_value(|v| (*f)(v)))
            }))
        })
    }
}

impl<E> Stream<u64, E>
where
    E: Send + Sync + 'static,
{
    /// A stream that emits 0, 1, 2, ... every `period` of `clock` time.
    ///
    /// The first value is due one period after subscription. Each firing
    /// re-registers at its own due time plus `period`, so the schedule never
    /// drifts. The stream never completes on its own.
    pub fn periodic(period: Duration, clock: SharedClock) -> Result<Self, ConstructionError> {
        if period.is_zero() {
            return Err(ConstructionError::ZeroPeriod);
        }

        Ok(Self::with_kind("periodic", move |emitter| {
            let ticker = Arc::new(Ticker {
                clock: Arc::clone(&clock),
                period,
                emitter,
                cancelled: AtomicBool::new(false),
                timer: Mutex::new(None),
            });
            ticker.arm(0);
            Subscription::new(move || ticker.stop())
        }))
    }
}

fn emit_all<T, E>(emitter: &Emitter<T, E>, values: impl IntoIterator<Item = T>) {
    for value in values {
        if emitter.value(value).is_break() {
            return;
        }
    }
    let _ = emitter.complete();
}

/// Per-subscription state of a periodic stream.
struct Ticker<E> {
    clock: SharedClock,
    period: Duration,
    emitter: Emitter<u64, E>,
    cancelled: AtomicBool,
    timer: Mutex<Option<TimerHandle>>,
}

impl<E> Ticker<E>
where
    E: Send + Sync + 'static,
{
    fn arm(self: &Arc<Self>, tick: u64) {
        let this = Arc::clone(self);
        let handle = self
            .clock
            .schedule(self.period, Box::new(move || this.fire(tick)));
        *lock(&self.timer) = Some(handle);
    }

    fn fire(self: Arc<Self>, tick: u64) {
        lock(&self.timer).take();
        if self.cancelled.load(Ordering::Acquire) {
            return;
        }
        // The emitter may cancel us while handling the value
        if self.emitter.value(tick).is_break() || self.cancelled.load(Ordering::Acquire) {
            return;
        }
        self.arm(tick + 1);
    }

    fn stop(&self) {
        self.cancelled.store(true, Ordering::Release);
        let pending = lock(&self.timer).take();
        if let Some(handle) = pending {
            self.clock.cancel(handle);
        }
    }
}

/// Per-subscription state of `take`.
struct TakeGate<T, E> {
    remaining: AtomicU64,
    done: AtomicBool,
    downstream: Emitter<T, E>,
    upstream: Mutex<Option<Subscription>>,
}

impl<T, E> TakeGate<T, E> {
    fn forward(&self, event: Event<T, E>) -> ControlFlow<()> {
        if self.done.load(Ordering::Acquire) {
            return ControlFlow::Break(());
        }

        match event {
            Event::Value(value) => {
                let left = self.remaining.fetch_sub(1, Ordering::AcqRel) - 1;
                let flow = self.downstream.value(value);
                if left == 0 {
                    let _ = self.downstream.complete();
                    self.detach();
                    return ControlFlow::Break(());
                }
                if flow.is_break() {
                    self.detach();
                }
                flow
            }
            terminal => {
                self.done.store(true, Ordering::Release);
                let _ = self.downstream.emit(terminal);
                ControlFlow::Break(())
            }
        }
    }

    fn detach(&self) {
        self.done.store(true, Ordering::Release);
        let upstream = lock(&self.upstream).take();
        if let Some(mut subscription) = upstream {
            subscription.cancel();
        }
    }
}

/// Subscriptions held by one `concat` subscription.
struct ConcatLink {
    cancelled: AtomicBool,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl ConcatLink {
    fn hold(&self, mut subscription: Subscription) {
        if self.cancelled.load(Ordering::Acquire) {
            subscription.cancel();
        } else {
            lock(&self.subscriptions).push(subscription);
        }
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        let held = std::mem::take(&mut *lock(&self.subscriptions));
        for mut subscription in held {
            subscription.cancel();
        }
    }
}
