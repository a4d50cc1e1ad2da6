//! Scenario runner - executes the bundled verification scenarios.

use crate::config::SimConfig;
use crate::fixtures::{ScenarioError, User};
use crate::harness::verify_with_virtual_time_config;
use crate::payloads::DeterministicPayloads;
use crate::scenarios::ScenarioId;

use fluxcheck_core::{ConstructionError, Script, Stream, VerificationReport, VerifierConfig};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Records in the seeded user scenario
const SEEDED_RECORDS: usize = 8;

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether the scenario passed all assertions
    pub passed: bool,

    /// Script steps completed
    pub steps_run: usize,

    /// Events delivered by the stream
    pub events_received: u64,

    /// Virtual time simulated
    pub virtual_elapsed: Duration,

    /// Wall-clock time the verification took
    pub real_elapsed: Duration,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Full report, absent when the stream could not be built
    pub report: Option<VerificationReport>,
}

/// Runs the bundled scenarios under virtual time.
pub struct ScenarioRunner {
    config: SimConfig,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            config: SimConfig::default().with_seed(seed),
        }
    }

    /// Creates a runner from a full configuration.
    pub fn with_config(config: SimConfig) -> Self {
        Self { config }
    }

    /// Sets the random value list length.
    pub fn with_random_values(mut self, len: usize) -> Self {
        self.config.random_values = len;
        self
    }

    /// Sets the real/virtual time ratio limit.
    pub fn with_max_real_ratio(mut self, ratio: f64) -> Self {
        self.config.max_real_ratio = ratio;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Runs a scenario and returns the result.
    pub async fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.config.seed);
        debug!("  {}", scenario.description());

        let outcome = match scenario {
            ScenarioId::Empty => self.run_empty(scenario).await,
            ScenarioId::FooBarValues => self.run_foo_bar_values(scenario).await,
            ScenarioId::FooBarList => self.run_foo_bar_list(scenario).await,
            ScenarioId::Error => self.run_error(scenario).await,
            ScenarioId::FooBarError => self.run_foo_bar_error(scenario).await,
            ScenarioId::Records => self.run_records(scenario).await,
            ScenarioId::Counter => self.run_counter(scenario).await,
            ScenarioId::HourCounter => self.run_hour_counter(scenario).await,
            ScenarioId::RandomValues => self.run_random_values(scenario).await,
            ScenarioId::SeededRecords => self.run_seeded_records(scenario).await,
        };

        self.finish(scenario, outcome)
    }

    fn verifier_config(&self, scenario: ScenarioId) -> VerifierConfig {
        // Same seed and scenario replay under the same run id
        let run_seed = self.config.seed.wrapping_mul(0x9e37_79b9_7f4a_7c15) ^ scenario as u64;
        VerifierConfig::default()
            .with_label(scenario.name())
            .with_run_seed(run_seed)
    }

    fn finish(&self, scenario: ScenarioId, outcome: Result<VerificationReport, ConstructionError>) -> ScenarioResult {
        let report = match outcome {
            Ok(report) => report,
            Err(e) => {
                warn!("Scenario {} could not build its stream: {}", scenario.name(), e);
                return ScenarioResult {
                    scenario,
                    seed: self.config.seed,
                    passed: false,
                    steps_run: 0,
                    events_received: 0,
                    virtual_elapsed: Duration::ZERO,
                    real_elapsed: Duration::ZERO,
                    failure_reason: Some(format!("construction error: {}", e)),
                    report: None,
                };
            }
        };

        let mut failure_reason = report.failure().map(ToString::to_string);

        if failure_reason.is_none() && scenario.is_clock_driven() {
            let virtual_secs = report.virtual_elapsed.as_secs_f64();
            let ratio = if virtual_secs > 0.0 {
                report.real_elapsed.as_secs_f64() / virtual_secs
            } else {
                0.0
            };
            info!(
                "  Verification took {:?} instead of {:?} (ratio {:.6})",
                report.real_elapsed, report.virtual_elapsed, ratio
            );
            if ratio > self.config.max_real_ratio {
                failure_reason = Some(format!(
                    "real/virtual ratio {:.4} exceeds limit {:.4}",
                    ratio, self.config.max_real_ratio
                ));
            }
        }

        ScenarioResult {
            scenario,
            seed: self.config.seed,
            passed: failure_reason.is_none(),
            steps_run: report.steps_run,
            events_received: report.events_received,
            virtual_elapsed: report.virtual_elapsed,
            real_elapsed: report.real_elapsed,
            failure_reason,
            report: Some(report),
        }
    }

    /// FLX-001: Empty stream only completes.
    async fn run_empty(&self, scenario: ScenarioId) -> Result<VerificationReport, ConstructionError> {
        let script: Script<&'static str, ScenarioError> = Script::builder().expect_complete();
        verify_with_virtual_time_config(|_| Ok(Stream::empty()), &script, self.verifier_config(scenario)).await
    }

    /// FLX-002: "foo" and "bar" from individual values.
    async fn run_foo_bar_values(&self, scenario: ScenarioId) -> Result<VerificationReport, ConstructionError> {
        let script: Script<&'static str, ScenarioError> = Script::builder()
            .expect_next("foo")
            .expect_next("bar")
            .expect_complete();
        verify_with_virtual_time_config(
            |_| Ok(Stream::from_values(["foo", "bar"])),
            &script,
            self.verifier_config(scenario),
        )
        .await
    }

    /// FLX-003: "foo" and "bar" walked from a list.
    async fn run_foo_bar_list(&self, scenario: ScenarioId) -> Result<VerificationReport, ConstructionError> {
        let script: Script<&'static str, ScenarioError> = Script::builder()
            .expect_next("foo")
            .expect_next("bar")
            .expect_complete();
        let list = vec!["foo", "bar"];
        verify_with_virtual_time_config(
            move |_| Ok(Stream::from_sequence(list)),
            &script,
            self.verifier_config(scenario),
        )
        .await
    }

    /// FLX-004: Immediate illegal state error.
    async fn run_error(&self, scenario: ScenarioId) -> Result<VerificationReport, ConstructionError> {
        let script: Script<&'static str, ScenarioError> =
            Script::builder().expect_error_eq(ScenarioError::IllegalState);
        verify_with_virtual_time_config(
            |_| Ok(Stream::fail_with(ScenarioError::IllegalState)),
            &script,
            self.verifier_config(scenario),
        )
        .await
    }

    /// FLX-005: "foo", "bar", then a runtime error.
    async fn run_foo_bar_error(&self, scenario: ScenarioId) -> Result<VerificationReport, ConstructionError> {
        let script: Script<&'static str, ScenarioError> = Script::builder()
            .expect_next("foo")
            .expect_next("bar")
            .expect_error_matching("runtime error", ScenarioError::is_runtime);
        verify_with_virtual_time_config(
            |_| {
                Ok(Stream::from_values(["foo", "bar"])
                    .concat(Stream::fail_with(ScenarioError::Runtime("boom".to_string()))))
            },
            &script,
            self.verifier_config(scenario),
        )
        .await
    }

    /// FLX-006: Skyler and Jesse matched on their username.
    async fn run_records(&self, scenario: ScenarioId) -> Result<VerificationReport, ConstructionError> {
        let script: Script<User, ScenarioError> = Script::builder()
            .expect_next_matching("username swhite", |u: &User| u.username == "swhite")
            .expect_next_matching("username jpinkman", |u: &User| u.username == "jpinkman")
            .expect_complete();
        verify_with_virtual_time_config(
            |_| Ok(Stream::from_values([User::skyler(), User::jesse()])),
            &script,
            self.verifier_config(scenario),
        )
        .await
    }

    /// FLX-007: 10 ticks at 100ms, checked after a 10s virtual await.
    async fn run_counter(&self, scenario: ScenarioId) -> Result<VerificationReport, ConstructionError> {
        let script: Script<u64, ScenarioError> = Script::builder()
            .then_await(Duration::from_secs(10))
            .expect_next_count(10)
            .expect_complete();
        verify_with_virtual_time_config(
            |clock| Ok(Stream::periodic(Duration::from_millis(100), clock)?.take(10)),
            &script,
            self.verifier_config(scenario),
        )
        .await
    }

    /// FLX-008: 3600 ticks at 1s, checked after a one-hour virtual await.
    async fn run_hour_counter(&self, scenario: ScenarioId) -> Result<VerificationReport, ConstructionError> {
        let script: Script<u64, ScenarioError> = Script::builder()
            .then_await(Duration::from_secs(3600))
            .expect_next_count(3600)
            .expect_complete();
        verify_with_virtual_time_config(
            |clock| Ok(Stream::periodic(Duration::from_secs(1), clock)?.take(3600)),
            &script,
            self.verifier_config(scenario),
        )
        .await
    }

    /// FLX-009: Seeded random values, doubled on the way through.
    async fn run_random_values(&self, scenario: ScenarioId) -> Result<VerificationReport, ConstructionError> {
        let mut payloads = DeterministicPayloads::new(self.config.seed);
        let values = payloads.values(0, self.config.random_values);
        debug!("  Generated {} values from seed {}", values.len(), payloads.seed());

        let script: Script<i64, ScenarioError> = Script::builder()
            .expect_next_seq(values.iter().map(|v| v.wrapping_mul(2)))
            .expect_complete();
        verify_with_virtual_time_config(
            move |_| Ok(Stream::from_values(values).map(|v: i64| v.wrapping_mul(2))),
            &script,
            self.verifier_config(scenario),
        )
        .await
    }

    /// FLX-010: Seeded user records, each matched on its username.
    async fn run_seeded_records(&self, scenario: ScenarioId) -> Result<VerificationReport, ConstructionError> {
        let payloads = DeterministicPayloads::new(self.config.seed);
        let users = payloads.users(1, SEEDED_RECORDS);

        let script: Script<User, ScenarioError> = users
            .iter()
            .fold(Script::builder(), |builder, user| {
                let username = user.username.clone();
                builder.expect_next_matching(format!("username {}", username), move |u: &User| {
                    u.username == username
                })
            })
            .expect_complete();
        verify_with_virtual_time_config(
            move |_| Ok(Stream::from_values(users)),
            &script,
            self.verifier_config(scenario),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_all_scenarios_pass() {
        let runner = ScenarioRunner::new(42);

        for scenario in ScenarioId::all() {
            let result = runner.run(scenario).await;
            assert!(
                result.passed,
                "{} failed: {:?}",
                scenario,
                result.failure_reason
            );
            assert!(result.report.is_some());
        }
    }

    #[tokio::test]
    async fn test_counter_accounts_virtual_time() {
        let result = ScenarioRunner::new(1).run(ScenarioId::Counter).await;

        assert!(result.passed);
        assert_eq!(result.virtual_elapsed, Duration::from_secs(10));
        assert_eq!(result.events_received, 11);
        assert!(result.real_elapsed < result.virtual_elapsed);
    }

    #[tokio::test]
    async fn test_impossible_ratio_fails_clock_driven_scenarios() {
        let runner = ScenarioRunner::new(1).with_max_real_ratio(-1.0);

        let counter = runner.run(ScenarioId::Counter).await;
        assert!(!counter.passed);
        assert!(counter.failure_reason.unwrap().contains("ratio"));

        // The ratio only applies to clock-driven scenarios
        assert!(runner.run(ScenarioId::Empty).await.passed);
    }

    #[tokio::test]
    async fn test_random_values_follow_config() {
        let runner = ScenarioRunner::with_config(SimConfig::default().with_seed(9).with_random_values(5));

        let result = runner.run(ScenarioId::RandomValues).await;
        assert!(result.passed);
        assert_eq!(result.steps_run, 6);
        assert_eq!(result.events_received, 6);
    }

    #[tokio::test]
    async fn test_seeded_records_match_generated_users() {
        let result = ScenarioRunner::new(5).run(ScenarioId::SeededRecords).await;

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.steps_run, SEEDED_RECORDS + 1);
        assert_eq!(result.events_received, SEEDED_RECORDS as u64 + 1);
    }

    #[tokio::test]
    async fn test_same_seed_replays_under_same_run_id() {
        let first = ScenarioRunner::new(7).run(ScenarioId::Records).await;
        let second = ScenarioRunner::new(7).run(ScenarioId::Records).await;
        let other_scenario = ScenarioRunner::new(7).run(ScenarioId::Empty).await;
        let other_seed = ScenarioRunner::new(8).run(ScenarioId::Records).await;

        let run_id = |r: &ScenarioResult| r.report.as_ref().map(|report| report.run_id);
        assert!(run_id(&first).is_some());
        assert_eq!(run_id(&first), run_id(&second));
        assert_ne!(run_id(&first), run_id(&other_scenario));
        assert_ne!(run_id(&first), run_id(&other_seed));
    }
}
