//! # Reference Workloads
//!
//! The five experiments the toolkit ships with, each comparing two or more
//! layout strategies for one fixed access pattern:
//!
//! - [`cache_alignment`] - aligned vs. unaligned 64-byte record scan
//! - [`false_sharing`] - adjacent vs. line-padded counter pair under two
//!   concurrent workers
//! - [`heap_vs_pool`] - per-object heap churn vs. fixed-pool placement
//!   construction
//! - [`numa_access`] - byte increments against local vs. remote node memory
//! - [`soa_vs_aos`] - array-of-structs vs. struct-of-arrays field sum
//!
//! Workloads are plain functions over a memory view and an iteration count,
//! returning a checksum that every loaded value contributes to. Setup
//! (allocation, construction, pinning) always happens before the harness
//! clock starts; nothing allocates inside a measured scan loop. The one
//! deliberate exception is [`heap_vs_pool`], where allocation behavior is
//! itself the effect under test.

pub mod cache_alignment;
pub mod false_sharing;
pub mod heap_vs_pool;
pub mod numa_access;
pub mod soa_vs_aos;

use crate::harness::{Harness, ScenarioOutcome};

/// Shared knobs for the reference suite.
///
/// `objects` and `iterations` override each experiment's default sizing
/// (the defaults reproduce the original experiment scales and take seconds
/// per scenario; tests pass small values).
#[derive(Debug, Clone)]
pub struct SuiteConfig {
    /// Timed trials per scenario.
    pub trials: u32,
    /// Override for per-experiment object counts.
    pub objects: Option<usize>,
    /// Override for per-experiment iteration counts.
    pub iterations: Option<u64>,
    /// NUMA node treated as local in the NUMA experiment.
    pub local_node: usize,
    /// NUMA node treated as remote; picked from the topology when absent.
    pub remote_node: Option<usize>,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            trials: 1,
            objects: None,
            iterations: None,
            local_node: 0,
            remote_node: None,
        }
    }
}

/// An experiment entry point: produces one outcome per compared layout.
pub type ExperimentFn = fn(&Harness, &SuiteConfig) -> Vec<ScenarioOutcome>;

/// The reference experiments, in suite order.
pub const EXPERIMENTS: &[(&str, ExperimentFn)] = &[
    ("cache_alignment", cache_alignment::scenarios),
    ("false_sharing", false_sharing::scenarios),
    ("heap_vs_pool", heap_vs_pool::scenarios),
    ("numa_access", numa_access::scenarios),
    ("soa_vs_aos", soa_vs_aos::scenarios),
];

/// Run the reference suite, optionally filtered by experiment name.
///
/// Experiments are independent: a failed scenario is captured in its
/// outcome and never stops the rest of the suite.
pub fn run_suite(
    harness: &Harness,
    config: &SuiteConfig,
    filter: &[String],
) -> Vec<ScenarioOutcome> {
    let mut outcomes = Vec::new();
    for (name, run) in EXPERIMENTS {
        if !filter.is_empty() && !filter.iter().any(|wanted| wanted == name) {
            continue;
        }
        tracing::info!(experiment = name, "running");
        outcomes.extend(run(harness, config));
    }
    outcomes
}
