//! Payload and error types used by the bundled scenarios.

use serde::Serialize;
use thiserror::Error;

/// A user record, the structured payload of the record scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl User {
    pub fn new(username: impl Into<String>, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    /// Skyler White.
    pub fn skyler() -> Self {
        Self::new("swhite", "Skyler", "White")
    }

    /// Jesse Pinkman.
    pub fn jesse() -> Self {
        Self::new("jpinkman", "Jesse", "Pinkman")
    }
}

/// Errors emitted by scenario streams.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScenarioError {
    #[error("illegal state")]
    IllegalState,

    #[error("runtime failure: {0}")]
    Runtime(String),
}

impl ScenarioError {
    /// Returns true for the runtime family of errors.
    pub fn is_runtime(&self) -> bool {
        matches!(self, ScenarioError::Runtime(_))
    }
}
