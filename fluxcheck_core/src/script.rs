//! Expectation scripts and their fluent builder.
//!
//! A script is built by chaining calls on a [`ScriptBuilder`], one call per
//! expected step, in the order events must arrive:
//!
//! ```ignore
//! let script = Script::builder()
//!     .expect_next("foo")
//!     .expect_next("bar")
//!     .expect_complete();
//! ```
//!
//! The terminal calls (`expect_complete`, `expect_error*`, `then_cancel`)
//! consume the builder and return the sealed [`Script`], so nothing can be
//! appended after a terminal assertion.

use crate::report::VerificationReport;
use crate::stream::Stream;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A named predicate over a payload or an error.
pub struct Matcher<T> {
    description: String,
    predicate: Arc<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T> Matcher<T> {
    /// Creates a matcher from a description and a predicate.
    pub fn new<F>(description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Creates a matcher requiring equality with `expected`.
    pub fn eq(expected: T) -> Self
    where
        T: PartialEq + fmt::Debug + Send + Sync + 'static,
    {
        Self::new(format!("{:?}", expected), move |actual: &T| *actual == expected)
    }

    /// Evaluates the predicate.
    pub fn matches(&self, candidate: &T) -> bool {
        (self.predicate)(candidate)
    }

    /// Returns the human-readable condition.
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl<T> Clone for Matcher<T> {
    fn clone(&self) -> Self {
        Self {
            description: self.description.clone(),
            predicate: Arc::clone(&self.predicate),
        }
    }
}

impl<T> fmt::Debug for Matcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Matcher").field(&self.description).finish()
    }
}

/// One non-terminal step of a script.
pub enum Step<T> {
    /// The next event must be a value accepted by the matcher
    Next(Matcher<T>),

    /// The next `n` events must be values, content unchecked
    NextCount(u64),

    /// Advance the clock before pulling further events
    Await(Duration),

    /// Advance the clock and require that nothing is emitted meanwhile
    NoEvent(Duration),
}

impl<T> Clone for Step<T> {
    fn clone(&self) -> Self {
        match self {
            Step::Next(m) => Step::Next(m.clone()),
            Step::NextCount(n) => Step::NextCount(*n),
            Step::Await(d) => Step::Await(*d),
            Step::NoEvent(d) => Step::NoEvent(*d),
        }
    }
}

impl<T> fmt::Debug for Step<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Next(m) => f.debug_tuple("Next").field(m).finish(),
            Step::NextCount(n) => f.debug_tuple("NextCount").field(n).finish(),
            Step::Await(d) => f.debug_tuple("Await").field(d).finish(),
            Step::NoEvent(d) => f.debug_tuple("NoEvent").field(d).finish(),
        }
    }
}

impl<T> fmt::Display for Step<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Next(m) => write!(f, "value {}", m.description()),
            Step::NextCount(n) => write!(f, "{} values", n),
            Step::Await(d) => write!(f, "await {:?}", d),
            Step::NoEvent(d) => write!(f, "no event for {:?}", d),
        }
    }
}

/// How a script ends.
pub enum Terminal<E> {
    /// The stream must complete
    Complete,

    /// The stream must fail, optionally with an error accepted by the matcher
    Error(Option<Matcher<E>>),

    /// Stop after the last step and cancel the subscription
    Cancel,
}

impl<E> Clone for Terminal<E> {
    fn clone(&self) -> Self {
        match self {
            Terminal::Complete => Terminal::Complete,
            Terminal::Error(m) => Terminal::Error(m.clone()),
            Terminal::Cancel => Terminal::Cancel,
        }
    }
}

impl<E> fmt::Debug for Terminal<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminal::Complete => f.write_str("Complete"),
            Terminal::Error(m) => f.debug_tuple("Error").field(m).finish(),
            Terminal::Cancel => f.write_str("Cancel"),
        }
    }
}

impl<E> fmt::Display for Terminal<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminal::Complete => write!(f, "completion"),
            Terminal::Error(None) => write!(f, "error"),
            Terminal::Error(Some(m)) => write!(f, "error {}", m.description()),
            Terminal::Cancel => write!(f, "cancellation"),
        }
    }
}

/// A sealed, immutable expectation script.
pub struct Script<T, E> {
    steps: Arc<[Step<T>]>,
    terminal: Terminal<E>,
}

impl<T, E> Script<T, E> {
    /// Starts a new builder.
    pub fn builder() -> ScriptBuilder<T, E> {
        ScriptBuilder::new()
    }

    /// Returns the non-terminal steps, in order.
    pub fn steps(&self) -> &[Step<T>] {
        &self.steps
    }

    /// Returns the terminal assertion.
    pub fn terminal(&self) -> &Terminal<E> {
        &self.terminal
    }

    /// Returns the total virtual time the script's clock steps ask for.
    pub fn scheduled_time(&self) -> Duration {
        self.steps
            .iter()
            .map(|step| match step {
                Step::Await(d) | Step::NoEvent(d) => *d,
                _ => Duration::ZERO,
            })
            .sum()
    }

    /// Verifies `stream` against this script in real time.
    pub async fn verify(&self, stream: &Stream<T, E>) -> VerificationReport
    where
        T: fmt::Debug + Send + Sync + 'static,
        E: fmt::Debug + Send + Sync + 'static,
    {
        crate::verifier::verify(stream, self).await
    }
}

impl<T, E> Clone for Script<T, E> {
    fn clone(&self) -> Self {
        Self {
            steps: Arc::clone(&self.steps),
            terminal: self.terminal.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Script<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Script")
            .field("steps", &self.steps)
            .field("terminal", &self.terminal)
            .finish()
    }
}

/// Fluent accumulator of script steps.
pub struct ScriptBuilder<T, E> {
    steps: Vec<Step<T>>,
    _error: std::marker::PhantomData<fn() -> E>,
}

impl<T, E> ScriptBuilder<T, E> {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            _error: std::marker::PhantomData,
        }
    }

    fn push(mut self, step: Step<T>) -> Self {
        self.steps.push(step);
        self
    }

    fn seal(self, terminal: Terminal<E>) -> Script<T, E> {
        Script {
            steps: self.steps.into(),
            terminal,
        }
    }

    /// Expects the next event to be a value equal to `value`.
    pub fn expect_next(self, value: T) -> Self
    where
        T: PartialEq + fmt::Debug + Send + Sync + 'static,
    {
        self.push(Step::Next(Matcher::eq(value)))
    }

    /// Expects one value per item of `values`, in order.
    pub fn expect_next_seq<I>(self, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: PartialEq + fmt::Debug + Send + Sync + 'static,
    {
        values.into_iter().fold(self, Self::expect_next)
    }

    /// Expects the next event to be a value accepted by `predicate`.
    pub fn expect_next_matching<F>(self, description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.push(Step::Next(Matcher::new(description, predicate)))
    }

    /// Expects `n` values without looking at them.
    pub fn expect_next_count(self, n: u64) -> Self {
        self.push(Step::NextCount(n))
    }

    /// Advances the clock by `duration` before the next step.
    pub fn then_await(self, duration: Duration) -> Self {
        self.push(Step::Await(duration))
    }

    /// Advances the clock by `duration` and expects nothing to be emitted.
    pub fn expect_no_event(self, duration: Duration) -> Self {
        self.push(Step::NoEvent(duration))
    }

    /// Expects the stream to complete.
    pub fn expect_complete(self) -> Script<T, E> {
        self.seal(Terminal::Complete)
    }

    /// Expects the stream to fail with any error.
    pub fn expect_error(self) -> Script<T, E> {
        self.seal(Terminal::Error(None))
    }

    /// Expects the stream to fail with an error accepted by `predicate`.
    pub fn expect_error_matching<F>(self, description: impl Into<String>, predicate: F) -> Script<T, E>
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.seal(Terminal::Error(Some(Matcher::new(description, predicate))))
    }

    /// Expects the stream to fail with an error equal to `error`.
    pub fn expect_error_eq(self, error: E) -> Script<T, E>
    where
        E: PartialEq + fmt::Debug + Send + Sync + 'static,
    {
        self.seal(Terminal::Error(Some(Matcher::eq(error))))
    }

    /// Ends the script without a terminal assertion. The verifier cancels
    /// the subscription once the steps are exhausted.
    pub fn then_cancel(self) -> Script<T, E> {
        self.seal(Terminal::Cancel)
    }

    /// Shorthand for `expect_complete()` followed by a real-time verify.
    pub async fn verify_complete(self, stream: &Stream<T, E>) -> VerificationReport
    where
        T: fmt::Debug + Send + Sync + 'static,
        E: fmt::Debug + Send + Sync + 'static,
    {
        self.expect_complete().verify(stream).await
    }
}

impl<T, E> Default for ScriptBuilder<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for ScriptBuilder<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptBuilder")
            .field("steps", &self.steps)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_keeps_call_order() {
        let script: Script<&str, ()> = Script::builder()
            .expect_next("foo")
            .then_await(Duration::from_secs(1))
            .expect_next_count(3)
            .expect_next("bar")
            .expect_complete();

        let rendered: Vec<String> = script.steps().iter().map(|s| s.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "value \"foo\"".to_string(),
                "await 1s".to_string(),
                "3 values".to_string(),
                "value \"bar\"".to_string(),
            ]
        );
        assert!(matches!(script.terminal(), Terminal::Complete));
    }

    #[test]
    fn test_expect_next_seq_expands_to_single_steps() {
        let script: Script<u32, ()> = Script::builder().expect_next_seq(1..=3).then_cancel();
        assert_eq!(script.steps().len(), 3);
        assert!(matches!(script.terminal(), Terminal::Cancel));
    }

    #[test]
    fn test_matchers_evaluate_predicates() {
        let script: Script<String, ()> = Script::builder()
            .expect_next_matching("starts with s", |v: &String| v.starts_with('s'))
            .expect_complete();

        let Step::Next(matcher) = &script.steps()[0] else {
            panic!("expected a value step");
        };
        assert!(matcher.matches(&"swhite".to_string()));
        assert!(!matcher.matches(&"jpinkman".to_string()));
        assert_eq!(matcher.description(), "starts with s");
    }

    #[test]
    fn test_error_terminals() {
        let any: Script<u8, &str> = Script::builder().expect_error();
        assert_eq!(any.terminal().to_string(), "error");

        let exact: Script<u8, &str> = Script::builder().expect_error_eq("boom");
        let Terminal::Error(Some(matcher)) = exact.terminal() else {
            panic!("expected an error matcher");
        };
        assert!(matcher.matches(&"boom"));
        assert!(!matcher.matches(&"bang"));
    }

    #[test]
    fn test_scheduled_time_sums_clock_steps() {
        let script: Script<u8, ()> = Script::builder()
            .then_await(Duration::from_millis(300))
            .expect_no_event(Duration::from_millis(200))
            .expect_next_count(1)
            .expect_complete();

        assert_eq!(script.scheduled_time(), Duration::from_millis(500));
    }
}
