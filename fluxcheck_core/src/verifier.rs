//! The verification engine.
//!
//! A [`Verifier`] subscribes to a fresh instance of a stream, then walks the
//! script one step at a time:
//!
//! ```text
//!   Idle ──subscribe──► Running ──all steps matched──► Passed
//!                          │
//!                          └──────first mismatch─────► Failed
//! ```
//!
//! Events land in an inbox as the stream emits them. Synchronous streams
//! fill it inside `subscribe`; clock-driven streams fill it while the
//! verifier advances the clock. Matching is strictly sequential: one event
//! per value step, no reordering and no look-ahead.

use crate::error::Mismatch;
use crate::event::Event;
use crate::report::VerificationReport;
use crate::script::{Matcher, Script, Step, Terminal};
use crate::stream::{Emitter, Stream};
use fluxcheck_env::{RunId, SharedClock, TimeMode, TokioClock};
use std::collections::VecDeque;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn, Instrument};

/// Configuration for a verifier.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Label attached to logs and reports
    pub label: String,

    /// Longest a real-time pull may sleep waiting for the next scheduled
    /// emission before the step is reported as stalled (None = no limit)
    pub real_wait_limit: Option<Duration>,

    /// Seed for the run id, so replays log under the same id (None = random)
    pub run_seed: Option<u64>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            label: "verification".to_string(),
            real_wait_limit: None,
            run_seed: None,
        }
    }
}

impl VerifierConfig {
    /// Sets the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Caps how long a real-time pull may wait.
    pub fn with_real_wait_limit(mut self, limit: Duration) -> Self {
        self.real_wait_limit = Some(limit);
        self
    }

    /// Derives run ids from `seed` instead of drawing them at random.
    pub fn with_run_seed(mut self, seed: u64) -> Self {
        self.run_seed = Some(seed);
        self
    }
}

/// Drives streams against scripts on one clock.
pub struct Verifier {
    clock: SharedClock,
    config: VerifierConfig,
}

impl Verifier {
    /// Creates a verifier owning `clock`.
    ///
    /// Clock-driven streams must be built on the same clock, otherwise the
    /// verifier's `then_await` steps never reach them.
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            config: VerifierConfig::default(),
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: VerifierConfig) -> Self {
        self.config = config;
        self
    }

    /// Subscribes to `stream` and matches its events against `script`.
    ///
    /// The subscription is cancelled when the run ends, whatever the verdict,
    /// so no clock entry registered by the stream outlives the run.
    pub async fn verify<T, E>(&self, stream: &Stream<T, E>, script: &Script<T, E>) -> VerificationReport
    where
        T: fmt::Debug + Send + Sync + 'static,
        E: fmt::Debug + Send + Sync + 'static,
    {
        let run_id = self.config.run_seed.map_or_else(RunId::new, RunId::from_seed);
        let span = tracing::info_span!(
            "verify",
            run = %run_id,
            label = %self.config.label,
            mode = %self.clock.mode(),
        );
        self.run(run_id, stream, script).instrument(span).await
    }

    async fn run<T, E>(&self, run_id: RunId, stream: &Stream<T, E>, script: &Script<T, E>) -> VerificationReport
    where
        T: fmt::Debug + Send + Sync + 'static,
        E: fmt::Debug + Send + Sync + 'static,
    {
        let started = Instant::now();
        let virtual_start = self.clock.now();

        info!(
            stream = stream.kind(),
            steps = script.steps().len(),
            scheduled = ?script.scheduled_time(),
            terminal = %script.terminal(),
            "Starting verification"
        );

        let inbox = Arc::new(Mutex::new(Inbox::new()));
        let mut subscription = stream.subscribe(Inbox::emitter(&inbox));

        let mut run = Run {
            clock: &self.clock,
            config: &self.config,
            inbox: &inbox,
            steps_run: 0,
            action_time: Duration::ZERO,
        };
        let outcome = run.execute(script).await;
        let (steps_run, action_time) = (run.steps_run, run.action_time);

        subscription.cancel();

        let report = VerificationReport {
            run_id,
            label: self.config.label.clone(),
            mode: self.clock.mode(),
            steps_run,
            events_received: lock(&inbox).received,
            virtual_elapsed: self.clock.now().saturating_sub(virtual_start),
            real_elapsed: started.elapsed(),
            action_time,
            failure: outcome.err(),
        };

        match &report.failure {
            None => info!(
                steps = report.steps_run,
                events = report.events_received,
                virtual_ms = report.virtual_elapsed.as_millis() as u64,
                real_us = report.real_elapsed.as_micros() as u64,
                "Verification passed"
            ),
            Some(mismatch) => warn!(
                step = mismatch.step(),
                events = report.events_received,
                "Verification failed: {}",
                mismatch
            ),
        }

        report
    }
}

/// Verifies `stream` against `script` in real time.
///
/// Uses a fresh [`TokioClock`], so `then_await` really sleeps. Streams built
/// on a different clock are not advanced; use [`Verifier::new`] with that
/// clock instead.
pub async fn verify<T, E>(stream: &Stream<T, E>, script: &Script<T, E>) -> VerificationReport
where
    T: fmt::Debug + Send + Sync + 'static,
    E: fmt::Debug + Send + Sync + 'static,
{
    Verifier::new(TokioClock::shared()).verify(stream, script).await
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Events emitted but not yet matched.
struct Inbox<T, E> {
    queue: VecDeque<Event<T, E>>,
    terminated: bool,
    received: u64,
    /// First event delivered after the terminal one
    late: Option<String>,
}

impl<T, E> Inbox<T, E>
where
    T: fmt::Debug + Send + Sync + 'static,
    E: fmt::Debug + Send + Sync + 'static,
{
    fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            terminated: false,
            received: 0,
            late: None,
        }
    }

    fn emitter(inbox: &Arc<Mutex<Self>>) -> Emitter<T, E> {
        let inbox = Arc::clone(inbox);
        Emitter::new(move |event: Event<T, E>| {
            let mut inbox = lock(&inbox);
            inbox.received += 1;
            if inbox.terminated {
                if inbox.late.is_none() {
                    inbox.late = Some(event.to_string());
                }
                return ControlFlow::Break(());
            }
            inbox.terminated = event.is_terminal();
            inbox.queue.push_back(event);
            ControlFlow::Continue(())
        })
    }
}

/// Result of asking the inbox for the next event.
enum Pulled<T, E> {
    Event(Event<T, E>),
    /// The terminal event was already consumed
    Ended,
    /// Nothing buffered and nothing will arrive without a clock step
    Stalled,
}

/// State of one run.
struct Run<'a, T, E> {
    clock: &'a SharedClock,
    config: &'a VerifierConfig,
    inbox: &'a Arc<Mutex<Inbox<T, E>>>,
    steps_run: usize,
    action_time: Duration,
}

impl<'a, T, E> Run<'a, T, E>
where
    T: fmt::Debug + Send + Sync + 'static,
    E: fmt::Debug + Send + Sync + 'static,
{
    async fn execute(&mut self, script: &Script<T, E>) -> Result<(), Mismatch> {
        for (index, step) in script.steps().iter().enumerate() {
            debug!(step = index, expected = %step, "Executing step");
            match step {
                Step::Next(matcher) => self.expect_value(index, matcher).await?,
                Step::NextCount(n) => self.expect_count(index, *n).await?,
                Step::Await(duration) => self.advance(*duration).await,
                Step::NoEvent(window) => self.expect_silence(index, *window).await?,
            }
            self.steps_run += 1;
        }

        let index = script.steps().len();
        debug!(step = index, expected = %script.terminal(), "Executing terminal step");
        match script.terminal() {
            Terminal::Complete => self.expect_complete(index).await?,
            Terminal::Error(matcher) => self.expect_error(index, matcher.as_ref()).await?,
            Terminal::Cancel => {
                self.steps_run += 1;
                return Ok(());
            }
        }

        if let Some(actual) = lock(self.inbox).late.take() {
            return Err(Mismatch::ExtraEvent { step: index, actual });
        }
        self.steps_run += 1;
        Ok(())
    }

    async fn advance(&mut self, duration: Duration) {
        debug!(by = ?duration, from = ?self.clock.now(), "Advancing clock");
        self.action_time += self.clock.advance(duration).await;
    }

    async fn pull(&mut self) -> Pulled<T, E> {
        loop {
            {
                let mut inbox = lock(self.inbox);
                if let Some(event) = inbox.queue.pop_front() {
                    return Pulled::Event(event);
                }
                if inbox.terminated {
                    return Pulled::Ended;
                }
            }

            // Virtual time moves only on explicit steps, but entries already
            // due at the cursor still fire
            if self.clock.mode() == TimeMode::Virtual {
                let now = self.clock.now();
                if self.clock.next_due().is_some_and(|due| due <= now) {
                    self.advance(Duration::ZERO).await;
                    continue;
                }
                return Pulled::Stalled;
            }
            let Some(due) = self.clock.next_due() else {
                return Pulled::Stalled;
            };
            let wait = due.saturating_sub(self.clock.now());
            if self.config.real_wait_limit.is_some_and(|limit| wait > limit) {
                return Pulled::Stalled;
            }
            self.advance(wait).await;
        }
    }

    fn stalled(&self, step: usize, expected: String) -> Mismatch {
        Mismatch::Stalled {
            step,
            expected,
            at: self.clock.now(),
        }
    }

    async fn expect_value(&mut self, step: usize, matcher: &Matcher<T>) -> Result<(), Mismatch> {
        let expected = format!("value {}", matcher.description());
        match self.pull().await {
            Pulled::Event(Event::Value(value)) if matcher.matches(&value) => Ok(()),
            Pulled::Event(Event::Value(value)) => Err(Mismatch::WrongValue {
                step,
                expected,
                actual: format!("{:?}", value),
            }),
            other => Err(self.not_a_value(step, expected, other)),
        }
    }

    async fn expect_count(&mut self, step: usize, n: u64) -> Result<(), Mismatch> {
        for seen in 0..n {
            match self.pull().await {
                Pulled::Event(Event::Value(_)) => {}
                other => {
                    let expected = format!("{} values ({} seen)", n, seen);
                    return Err(self.not_a_value(step, expected, other));
                }
            }
        }
        Ok(())
    }

    fn not_a_value(&self, step: usize, expected: String, pulled: Pulled<T, E>) -> Mismatch {
        match pulled {
            Pulled::Event(Event::Value(value)) => Mismatch::WrongValue {
                step,
                expected,
                actual: format!("{:?}", value),
            },
            Pulled::Event(Event::Error(error)) => Mismatch::UnexpectedError {
                step,
                expected,
                error: format!("{:?}", error),
            },
            Pulled::Event(Event::Complete) | Pulled::Ended => Mismatch::EndedEarly { step, expected },
            Pulled::Stalled => self.stalled(step, expected),
        }
    }

    async fn expect_silence(&mut self, step: usize, window: Duration) -> Result<(), Mismatch> {
        self.advance(window).await;
        let inbox = lock(self.inbox);
        match inbox.queue.front() {
            Some(event) => Err(Mismatch::EventDuringSilence {
                step,
                window,
                actual: event.to_string(),
            }),
            None => Ok(()),
        }
    }

    async fn expect_complete(&mut self, step: usize) -> Result<(), Mismatch> {
        let expected = "completion".to_string();
        match self.pull().await {
            Pulled::Event(Event::Complete) => Ok(()),
            Pulled::Event(Event::Value(value)) => Err(Mismatch::UnexpectedValue {
                step,
                expected,
                actual: format!("{:?}", value),
            }),
            Pulled::Event(Event::Error(error)) => Err(Mismatch::UnexpectedError {
                step,
                expected,
                error: format!("{:?}", error),
            }),
            Pulled::Ended => Err(Mismatch::EndedEarly { step, expected }),
            Pulled::Stalled => Err(self.stalled(step, expected)),
        }
    }

    async fn expect_error(&mut self, step: usize, matcher: Option<&Matcher<E>>) -> Result<(), Mismatch> {
        let expected = match matcher {
            Some(m) => format!("error {}", m.description()),
            None => "error".to_string(),
        };
        match self.pull().await {
            Pulled::Event(Event::Error(error)) => {
                if matcher.map_or(true, |m| m.matches(&error)) {
                    Ok(())
                } else {
                    Err(Mismatch::UnexpectedError {
                        step,
                        expected,
                        error: format!("{:?}", error),
                    })
                }
            }
            Pulled::Event(Event::Value(value)) => Err(Mismatch::UnexpectedValue {
                step,
                expected,
                actual: format!("{:?}", value),
            }),
            Pulled::Event(Event::Complete) => Err(Mismatch::UnexpectedCompletion { step, expected }),
            Pulled::Ended => Err(Mismatch::EndedEarly { step, expected }),
            Pulled::Stalled => Err(self.stalled(step, expected)),
        }
    }
}
