//! FluxCheck Virtual-Time Verification Harness
//!
//! This crate runs stream verifications in compressed time: a script that
//! waits an hour for 3600 periodic emissions finishes in milliseconds.
//!
//! # Core Principle: Time Only Moves When Asked
//!
//! Every source of delay is intercepted and controlled:
//! - **Time**: the [`VirtualClock`] cursor moves only on `then_await` steps
//! - **Emission**: periodic streams fire synchronously inside each advance
//! - **Randomness**: scenario payloads derive from a single 64-bit seed
//!
//! # Architecture
//!
//! ```text
//!   factory(clock) ──builds──► Stream ──schedule──► VirtualClock
//!                                 ▲                      │
//!                                 └──────── fire ────────┤
//!                                                        │ advance
//!   Verifier (script steps, inbox, report) ──────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use fluxcheck_core::{Script, Stream};
//! use fluxcheck_sim::verify_with_virtual_time;
//! use std::time::Duration;
//!
//! let script = Script::builder()
//!     .then_await(Duration::from_secs(3600))
//!     .expect_next_count(3600)
//!     .expect_complete();
//!
//! let report = verify_with_virtual_time(
//!     |clock| Ok(Stream::<u64, ()>::periodic(Duration::from_secs(1), clock)?.take(3600)),
//!     &script,
//! )
//! .await?;
//! report.assert_passed();
//! ```

mod clock;
mod config;
mod fixtures;
mod harness;
mod payloads;
mod runner;
pub mod scenarios;

pub use clock::VirtualClock;
pub use config::SimConfig;
pub use fixtures::{ScenarioError, User};
pub use harness::{verify_with_virtual_time, verify_with_virtual_time_config};
pub use payloads::DeterministicPayloads;
pub use runner::{ScenarioResult, ScenarioRunner};
