//! Scenario results and per-scenario failure capture.

use crate::backend::BackendError;

/// The measured outcome of one completed trial set.
///
/// Immutable after creation; produced after teardown, so it owns nothing
/// from the backend it was measured against. The checksum exists solely to
/// prove the compiler did not elide the workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioResult {
    /// Scenario label, unique within a run.
    pub label: String,
    /// Wall-clock nanoseconds across all trials.
    pub elapsed_nanos: u64,
    /// Inner iterations per trial.
    pub iterations: u64,
    /// Number of timed trials.
    pub trials: u32,
    /// Accumulated workload checksum (liveness proof, not a metric).
    pub checksum: u64,
    /// True when the backend fell back to plain-heap semantics.
    pub degraded: bool,
}

impl ScenarioResult {
    /// Elapsed wall-clock time in milliseconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_nanos as f64 / 1_000_000.0
    }

    /// Milliseconds per trial.
    #[must_use]
    pub fn ms_per_trial(&self) -> f64 {
        if self.trials == 0 {
            return 0.0;
        }
        self.elapsed_ms() / f64::from(self.trials)
    }

    /// Total operations across all trials.
    #[must_use]
    pub fn total_ops(&self) -> u64 {
        u64::from(self.trials).saturating_mul(self.iterations)
    }

    /// Nanoseconds per operation.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn ns_per_op(&self) -> f64 {
        let ops = self.total_ops();
        if ops == 0 {
            return 0.0;
        }
        self.elapsed_nanos as f64 / ops as f64
    }
}

/// One scenario's outcome: a result, or the failure that stopped it.
///
/// Scenarios in a run are independent - a failed acquisition is captured
/// here, reported, and never prevents subsequent scenarios from running.
#[derive(Debug)]
pub enum ScenarioOutcome {
    /// The trial set ran to completion.
    Completed(ScenarioResult),

    /// The scenario aborted before measuring, typically on acquisition.
    Failed {
        /// Scenario label.
        label: String,
        /// What stopped it.
        error: BackendError,
    },
}

impl ScenarioOutcome {
    /// The scenario label, regardless of outcome.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Completed(result) => &result.label,
            Self::Failed { label, .. } => label,
        }
    }

    /// True when the scenario produced a result.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// The result, when there is one.
    #[must_use]
    pub fn result(&self) -> Option<&ScenarioResult> {
        match self {
            Self::Completed(result) => Some(result),
            Self::Failed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ScenarioResult {
        ScenarioResult {
            label: "sample".to_string(),
            elapsed_nanos: 2_000_000_000,
            iterations: 1_000_000,
            trials: 2,
            checksum: 42,
            degraded: false,
        }
    }

    #[test]
    fn test_derived_metrics() {
        let result = sample();
        assert!((result.elapsed_ms() - 2000.0).abs() < f64::EPSILON);
        assert!((result.ms_per_trial() - 1000.0).abs() < f64::EPSILON);
        assert_eq!(result.total_ops(), 2_000_000);
        assert!((result.ns_per_op() - 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_counts_do_not_divide_by_zero() {
        let mut result = sample();
        result.trials = 0;
        result.iterations = 0;
        assert!(result.ms_per_trial().abs() < f64::EPSILON);
        assert!(result.ns_per_op().abs() < f64::EPSILON);
    }

    #[test]
    fn test_outcome_label() {
        let completed = ScenarioOutcome::Completed(sample());
        assert_eq!(completed.label(), "sample");
        assert!(completed.is_completed());

        let failed = ScenarioOutcome::Failed {
            label: "broken".to_string(),
            error: BackendError::InvalidAlignment(3),
        };
        assert_eq!(failed.label(), "broken");
        assert!(!failed.is_completed());
        assert!(failed.result().is_none());
    }
}
