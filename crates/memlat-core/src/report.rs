//! Text report over an ordered sequence of scenario outcomes.
//!
//! Pure formatting: derives ms-per-trial and ns-per-op from the raw result
//! fields, never mutates its input, and produces byte-identical output for
//! identical inputs. Printing is the caller's business.

use std::fmt::Write;

use crate::harness::ScenarioOutcome;

/// Format one line per scenario outcome.
///
/// Completed scenarios show elapsed milliseconds, per-trial and per-op
/// derivations, and the liveness checksum; degraded backends carry a
/// `(degraded)` marker. Failed scenarios render the failure reason and the
/// run simply continues to the next line.
#[must_use]
pub fn format_report(outcomes: &[ScenarioOutcome]) -> String {
    let label_width = outcomes
        .iter()
        .map(|outcome| outcome.label().len())
        .max()
        .unwrap_or(0);

    let mut report = String::new();
    for outcome in outcomes {
        match outcome {
            ScenarioOutcome::Completed(result) => {
                let _ = write!(
                    report,
                    "{:label_width$}  {:>10.1} ms  {:>10.1} ms/trial  {:>8.2} ns/op  checksum={:#018x}",
                    result.label,
                    result.elapsed_ms(),
                    result.ms_per_trial(),
                    result.ns_per_op(),
                    result.checksum,
                );
                if result.degraded {
                    report.push_str("  (degraded)");
                }
                report.push('\n');
            }
            ScenarioOutcome::Failed { label, error } => {
                let _ = writeln!(report, "{label:label_width$}  FAILED: {error}");
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::harness::ScenarioResult;

    fn completed(label: &str, degraded: bool) -> ScenarioOutcome {
        ScenarioOutcome::Completed(ScenarioResult {
            label: label.to_string(),
            elapsed_nanos: 1_500_000_000,
            iterations: 1_000_000,
            trials: 3,
            checksum: 0xdead_beef,
            degraded,
        })
    }

    #[test]
    fn test_one_line_per_outcome() {
        let outcomes = vec![
            completed("cache_alignment/aligned", false),
            ScenarioOutcome::Failed {
                label: "numa_access/remote".to_string(),
                error: BackendError::CapabilityUnavailable("no NUMA".to_string()),
            },
        ];

        let report = format_report(&outcomes);
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("1500.0 ms"));
        assert!(lines[0].contains("500.0 ms/trial"));
        assert!(lines[0].contains("checksum=0x00000000deadbeef"));
        assert!(lines[1].contains("FAILED: required capability unavailable"));
    }

    #[test]
    fn test_degraded_marker() {
        let report = format_report(&[completed("numa_access/local", true)]);
        assert!(report.contains("(degraded)"));
    }

    #[test]
    fn test_format_is_idempotent() {
        let outcomes = vec![
            completed("a", false),
            completed("a-much-longer-label", true),
            ScenarioOutcome::Failed {
                label: "b".to_string(),
                error: BackendError::InvalidAlignment(7),
            },
        ];

        let first = format_report(&outcomes);
        let second = format_report(&outcomes);
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_input_empty_report() {
        assert_eq!(format_report(&[]), "");
    }
}
