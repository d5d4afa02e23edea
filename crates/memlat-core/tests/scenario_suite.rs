//! End-to-end suite runs through the public API at tiny scale.

use memlat_core::backend::Strategy;
use memlat_core::harness::ScenarioSpec;
use memlat_core::numa::Capability;
use memlat_core::slots::{PaddingPolicy, SlotSequence};
use memlat_core::workloads::{self, SuiteConfig};
use memlat_core::{format_report, Harness};

fn tiny_config() -> SuiteConfig {
    SuiteConfig {
        trials: 2,
        objects: Some(128),
        iterations: Some(1_000),
        local_node: 0,
        remote_node: None,
    }
}

#[test]
fn test_suite_report_round_trip() {
    let harness = Harness::new();
    let outcomes = workloads::run_suite(&harness, &tiny_config(), &[]);
    assert_eq!(outcomes.len(), 10);

    let report = format_report(&outcomes);
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines.len(), outcomes.len());
    for (line, outcome) in lines.iter().zip(&outcomes) {
        assert!(line.starts_with(outcome.label()));
        assert!(line.contains("ms/trial"));
        assert!(line.contains("checksum="));
    }
}

#[test]
fn test_failed_scenario_does_not_poison_the_run() {
    // No capability at all: NUMA-bound scenarios fail, everything else
    // runs to completion and the report carries both kinds of line.
    let harness = Harness::with_capability(Capability::Unavailable);
    let outcomes = workloads::run_suite(&harness, &tiny_config(), &[]);
    assert_eq!(outcomes.len(), 10);

    let failed: Vec<_> = outcomes.iter().filter(|o| !o.is_completed()).collect();
    assert_eq!(failed.len(), 2);
    assert!(failed
        .iter()
        .all(|o| o.label().starts_with("numa_access/")));

    let report = format_report(&outcomes);
    assert_eq!(report.matches("FAILED:").count(), 2);
}

#[test]
fn test_custom_scenario_against_the_harness() {
    // A user-defined scenario, not one of the shipped experiments: a
    // strided sum over pool-constructed counters.
    let harness = Harness::new();
    let spec = ScenarioSpec::new(
        "custom/strided_sum",
        Strategy::FixedPool { align: 64 },
        64 * 1024,
        1,
        4,
    );

    let outcome = harness.run_scenario(&spec, |region, timer| {
        let slots = SlotSequence::construct_all(region, 512, PaddingPolicy::Natural, |i| i as u64)
            .expect("pool sized for 512 u64 slots");
        let checksum = timer.measure(|passes| {
            let mut sum = 0u64;
            for _ in 0..passes {
                for value in slots.iter() {
                    sum = sum.wrapping_add(*value);
                }
            }
            sum
        });
        slots.destroy_all();
        checksum
    });

    let result = outcome.result().expect("custom scenario completes");
    // 4 passes over sum(0..512).
    assert_eq!(result.checksum, 4 * (511 * 512 / 2));
    assert!(!result.degraded);
}
