//! Error types for stream construction and verification.

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Invalid stream parameters, reported before anything is subscribed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructionError {
    /// A periodic stream needs a period greater than zero
    #[error("Period must be greater than zero")]
    ZeroPeriod,
}

/// Divergence between an expectation script and what a stream emitted.
///
/// Every variant carries the index of the step that failed. The terminal
/// assertion of a script has index `steps.len()`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mismatch {
    /// A value arrived but failed the step's condition
    #[error("step {step}: expected {expected}, got value {actual}")]
    WrongValue {
        step: usize,
        expected: String,
        actual: String,
    },

    /// A value arrived where a terminal event was expected
    #[error("step {step}: expected {expected}, got value {actual}")]
    UnexpectedValue {
        step: usize,
        expected: String,
        actual: String,
    },

    /// The stream failed where a value or completion was expected, or failed
    /// with the wrong kind of error
    #[error("step {step}: expected {expected}, got error {error}")]
    UnexpectedError {
        step: usize,
        expected: String,
        error: String,
    },

    /// The stream completed where a value or an error was expected
    #[error("step {step}: expected {expected}, got completion")]
    UnexpectedCompletion { step: usize, expected: String },

    /// The stream had already terminated
    #[error("step {step}: expected {expected}, but the stream ended early")]
    EndedEarly { step: usize, expected: String },

    /// Something was emitted after the terminal event
    #[error("step {step}: extra event received after termination: {actual}")]
    ExtraEvent { step: usize, actual: String },

    /// An event arrived inside a window that had to stay silent
    #[error("step {step}: expected no event for {window:?}, got {actual}")]
    EventDuringSilence {
        step: usize,
        window: Duration,
        actual: String,
    },

    /// Nothing was emitted and nothing is scheduled to be
    #[error("step {step}: expected {expected}, but no event was available at {at:?}")]
    Stalled {
        step: usize,
        expected: String,
        at: Duration,
    },
}

impl Mismatch {
    /// Returns the index of the failing step.
    pub fn step(&self) -> usize {
        match self {
            Mismatch::WrongValue { step, .. }
            | Mismatch::UnexpectedValue { step, .. }
            | Mismatch::UnexpectedError { step, .. }
            | Mismatch::UnexpectedCompletion { step, .. }
            | Mismatch::EndedEarly { step, .. }
            | Mismatch::ExtraEvent { step, .. }
            | Mismatch::EventDuringSilence { step, .. }
            | Mismatch::Stalled { step, .. } => *step,
        }
    }

    /// Returns true when the stream emitted an error the script did not allow.
    pub fn is_unexpected_error(&self) -> bool {
        matches!(self, Mismatch::UnexpectedError { .. })
    }

    /// Returns true when the stream terminated before the script was done.
    pub fn is_ended_early(&self) -> bool {
        matches!(self, Mismatch::EndedEarly { .. })
    }
}
