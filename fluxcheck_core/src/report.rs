//! The outcome of one verification run.

use crate::error::Mismatch;
use fluxcheck_env::{RunId, TimeMode};
use serde::Serialize;
use std::time::Duration;

/// Results from verifying one stream against one script.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    /// Identifier of this run, as it appears in the logs
    pub run_id: RunId,

    /// Label from the verifier configuration
    pub label: String,

    /// Clock mode the run used
    pub mode: TimeMode,

    /// Script steps completed, the terminal assertion included
    pub steps_run: usize,

    /// Events delivered by the stream, including any rejected ones
    pub events_received: u64,

    /// Clock time that passed during the run
    pub virtual_elapsed: Duration,

    /// Wall-clock time the run took
    pub real_elapsed: Duration,

    /// Wall-clock time spent inside fired clock actions
    pub action_time: Duration,

    /// First mismatch, if the run failed
    pub failure: Option<Mismatch>,
}

impl VerificationReport {
    /// Returns true when every step matched.
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }

    /// Returns the mismatch that failed the run.
    pub fn failure(&self) -> Option<&Mismatch> {
        self.failure.as_ref()
    }

    /// Panics with the mismatch if the run failed. Meant for tests.
    #[track_caller]
    pub fn assert_passed(&self) {
        if let Some(mismatch) = &self.failure {
            panic!("verification {} ({}) failed: {}", self.run_id, self.label, mismatch);
        }
    }

    /// Returns how many times faster than real time the clock ran.
    ///
    /// `None` when the run took no measurable wall-clock time.
    pub fn speedup(&self) -> Option<f64> {
        let real = self.real_elapsed.as_secs_f64();
        if real > 0.0 {
            Some(self.virtual_elapsed.as_secs_f64() / real)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(failure: Option<Mismatch>) -> VerificationReport {
        VerificationReport {
            run_id: RunId::from_seed(1),
            label: "unit".to_string(),
            mode: TimeMode::Virtual,
            steps_run: 2,
            events_received: 3,
            virtual_elapsed: Duration::from_secs(10),
            real_elapsed: Duration::from_millis(5),
            action_time: Duration::from_millis(1),
            failure,
        }
    }

    #[test]
    fn test_passed_report() {
        let report = report(None);
        assert!(report.passed());
        report.assert_passed();
        assert_eq!(report.speedup(), Some(2000.0));
        assert!(report.failure().is_none());
    }

    #[test]
    #[should_panic(expected = "stream ended early")]
    fn test_assert_passed_panics_on_failure() {
        report(Some(Mismatch::EndedEarly {
            step: 1,
            expected: "value \"bar\"".to_string(),
        }))
        .assert_passed();
    }

    #[test]
    fn test_report_json() {
        let value = serde_json::to_value(report(None)).unwrap();
        assert_eq!(value["mode"], "virtual");
        assert_eq!(value["steps_run"], 2);
        assert!(value["failure"].is_null());
    }
}
