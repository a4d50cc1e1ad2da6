//! fluxcheck Clock Abstraction Layer
//!
//! This crate provides the abstraction allowing time-driven streams to run
//! against either **real time** (tokio) or **virtual time** (the
//! `fluxcheck_sim` clock).
//!
//! # Core Concept: Time Is an Input
//!
//! A stream that emits on a schedule never reads the wall clock itself. It
//! registers actions with a [`Clock`], and whoever owns the clock decides
//! when those actions run:
//! - Real time: `advance` sleeps, then fires what became due
//! - Virtual time: `advance` fires what became due immediately
//!
//! Either way, firing is synchronous on the caller of `advance`, so the
//! producer and the verifier never race.
//!
//! # Example
//!
//! ```ignore
//! use fluxcheck_env::{Clock, TokioClock};
//! use std::time::Duration;
//!
//! let clock = TokioClock::shared();
//! clock.schedule(Duration::from_millis(100), Box::new(|| println!("tick")));
//! clock.advance(Duration::from_millis(100)).await;
//! ```

mod clock;
mod timer;
mod tokio_impl;
mod types;

pub use clock::{Clock, SharedClock};
pub use timer::{lock_queue, run_due, Action, TimerHandle, TimerQueue};
pub use tokio_impl::TokioClock;
pub use types::{RunId, TimeMode};
