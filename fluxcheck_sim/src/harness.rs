//! Virtual-time verification entry points.

use crate::clock::VirtualClock;
use fluxcheck_core::{ConstructionError, Script, Stream, VerificationReport, Verifier, VerifierConfig};
use fluxcheck_env::SharedClock;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Verifies a stream under virtual time.
///
/// `factory` receives a fresh [`VirtualClock`] and builds the stream on it,
/// so every run starts at virtual time zero with an empty schedule. Script
/// `then_await` steps advance that clock without sleeping; the report carries
/// both the virtual time simulated and the real time the run took.
///
/// A factory error aborts before anything subscribes.
pub async fn verify_with_virtual_time<T, E, F>(
    factory: F,
    script: &Script<T, E>,
) -> Result<VerificationReport, ConstructionError>
where
    T: fmt::Debug + Send + Sync + 'static,
    E: fmt::Debug + Send + Sync + 'static,
    F: FnOnce(SharedClock) -> Result<Stream<T, E>, ConstructionError>,
{
    let config = VerifierConfig::default().with_label("virtual time");
    verify_with_virtual_time_config(factory, script, config).await
}

/// Like [`verify_with_virtual_time`], with an explicit verifier configuration.
pub async fn verify_with_virtual_time_config<T, E, F>(
    factory: F,
    script: &Script<T, E>,
    config: VerifierConfig,
) -> Result<VerificationReport, ConstructionError>
where
    T: fmt::Debug + Send + Sync + 'static,
    E: fmt::Debug + Send + Sync + 'static,
    F: FnOnce(SharedClock) -> Result<Stream<T, E>, ConstructionError>,
{
    let clock = VirtualClock::shared();
    let shared: SharedClock = Arc::clone(&clock) as SharedClock;
    let stream = factory(Arc::clone(&shared))?;

    let report = Verifier::new(shared).with_config(config).verify(&stream, script).await;

    let leftover = clock.clear();
    if leftover > 0 {
        // Entries registered outside the verified subscription
        debug!(leftover, "Dropped pending virtual clock entries");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::ScenarioError;
    use fluxcheck_core::Mismatch;
    use std::time::Duration;

    #[tokio::test]
    async fn test_ten_ticks_under_virtual_time() -> Result<(), ConstructionError> {
        let script = Script::builder()
            .then_await(Duration::from_millis(10 * 100))
            .expect_next_count(10)
            .expect_complete();

        let report = verify_with_virtual_time(
            |clock| Ok(Stream::<u64, ScenarioError>::periodic(Duration::from_millis(100), clock)?.take(10)),
            &script,
        )
        .await?;

        report.assert_passed();
        assert_eq!(report.virtual_elapsed, Duration::from_secs(1));
        assert!(report.real_elapsed < Duration::from_secs(1));
        Ok(())
    }

    #[tokio::test]
    async fn test_one_hour_runs_far_faster_than_real_time() -> Result<(), ConstructionError> {
        let script = Script::builder()
            .then_await(Duration::from_secs(3600))
            .expect_next_count(3600)
            .expect_complete();

        let report = verify_with_virtual_time(
            |clock| Ok(Stream::<u64, ScenarioError>::periodic(Duration::from_secs(1), clock)?.take(3600)),
            &script,
        )
        .await?;

        report.assert_passed();
        assert_eq!(report.events_received, 3601);
        assert!(report.real_elapsed < Duration::from_secs(60));
        assert!(report.speedup().map_or(true, |s| s > 60.0));
        Ok(())
    }

    #[tokio::test]
    async fn test_counter_values_in_order() -> Result<(), ConstructionError> {
        let script = Script::builder()
            .then_await(Duration::from_millis(300))
            .expect_next_seq([0u64, 1, 2])
            .then_await(Duration::from_millis(100))
            .expect_next(3)
            .then_cancel();

        let report = verify_with_virtual_time(
            |clock| Stream::<u64, ScenarioError>::periodic(Duration::from_millis(100), clock),
            &script,
        )
        .await?;

        report.assert_passed();
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_await_stalls_instead_of_hanging() -> Result<(), ConstructionError> {
        let script = Script::builder().expect_next_count(10).expect_complete();

        let report = verify_with_virtual_time(
            |clock| Ok(Stream::<u64, ScenarioError>::periodic(Duration::from_millis(100), clock)?.take(10)),
            &script,
        )
        .await?;

        assert!(matches!(report.failure(), Some(Mismatch::Stalled { step: 0, .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_construction_error_aborts_before_subscription() {
        let script: Script<u64, ScenarioError> = Script::builder().expect_complete();

        let result = verify_with_virtual_time(|clock| Stream::periodic(Duration::ZERO, clock), &script).await;

        assert_eq!(result.unwrap_err(), ConstructionError::ZeroPeriod);
    }

    #[tokio::test]
    async fn test_fresh_clock_per_run() -> Result<(), ConstructionError> {
        let script = Script::builder()
            .then_await(Duration::from_secs(2))
            .expect_next_seq([0u64, 1])
            .then_cancel();
        let factory = |clock: SharedClock| Stream::<u64, ScenarioError>::periodic(Duration::from_secs(1), clock);

        let first = verify_with_virtual_time(factory, &script).await?;
        let second = verify_with_virtual_time(factory, &script).await?;

        first.assert_passed();
        second.assert_passed();
        assert_eq!(first.virtual_elapsed, second.virtual_elapsed);
        Ok(())
    }
}
