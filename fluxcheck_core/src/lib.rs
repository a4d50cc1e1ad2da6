//! FluxCheck Core - step-by-step verification of asynchronous event streams
//!
//! This library answers one question about a stream: does it emit exactly
//! these events, in this order, at these times?
//! 1. **Streams**: lazy, restartable producers of values followed by at most
//!    one terminal event (completion or error)
//! 2. **Scripts**: fluent, immutable lists of expectations built with
//!    [`Script::builder`]
//! 3. **Verification**: a [`Verifier`] subscribes, pulls events one at a time,
//!    and reports the first [`Mismatch`] in a [`VerificationReport`]
//!
//! Clock-driven streams such as [`Stream::periodic`] register their emissions
//! on a [`fluxcheck_env::Clock`]. The same script then runs in real time on a
//! Tokio clock or in compressed time on a virtual one.

pub mod error;
pub mod event;
pub mod report;
pub mod script;
pub mod stream;
pub mod verifier;

#[cfg(test)]
mod testing;

// Re-export key types for convenience
pub use error::{ConstructionError, Mismatch};
pub use event::Event;
pub use report::VerificationReport;
pub use script::{Matcher, Script, ScriptBuilder, Step, Terminal};
pub use stream::{Emitter, Stream, Subscription};
pub use verifier::{verify, Verifier, VerifierConfig};

pub use fluxcheck_env::{Clock, SharedClock, TimeMode};
