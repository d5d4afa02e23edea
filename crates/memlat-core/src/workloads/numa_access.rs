//! Local vs. remote NUMA node byte increments.
//!
//! The region is bound to one node; the worker thread is pinned either to
//! that node (local) or to another (remote) and strides through the region
//! incrementing bytes. On a multi-socket host the remote pass pays the
//! interconnect on every miss. Single-node hosts run both passes degraded
//! and report roughly equal timings, which is itself the honest answer.

use super::SuiteConfig;
use crate::backend::Strategy;
use crate::harness::{Harness, ScenarioOutcome, ScenarioSpec};
use crate::numa::NumaTopology;

/// Byte increments per trial unless overridden.
pub const DEFAULT_INCREMENTS: u64 = 500_000_000;

/// Region size: 1 MiB, larger than L2 on most parts so misses reach DRAM.
pub const REGION_BYTES: usize = 1024 * 1024;

/// Run the local-access and remote-access scenarios.
pub fn scenarios(harness: &Harness, config: &SuiteConfig) -> Vec<ScenarioOutcome> {
    let increments = config.iterations.unwrap_or(DEFAULT_INCREMENTS);
    let topology = NumaTopology::detect();

    let memory_node = config.local_node;
    let remote_node = config.remote_node.or_else(|| {
        (0..topology.num_nodes()).find(|&node| node != memory_node)
    });

    let local = run_access(
        harness,
        &topology,
        "numa_access/local",
        memory_node,
        memory_node,
        config.trials,
        increments,
    );

    // With no second node the remote pass runs on the same node; the
    // degraded marker on the result says why the numbers look alike.
    let remote = run_access(
        harness,
        &topology,
        "numa_access/remote",
        memory_node,
        remote_node.unwrap_or(memory_node),
        config.trials,
        increments,
    );

    if let Err(error) = topology.unpin() {
        tracing::warn!(%error, "failed to restore thread affinity after NUMA run");
    }

    vec![local, remote]
}

/// One pass: memory on `memory_node`, worker pinned to `run_node`.
fn run_access(
    harness: &Harness,
    topology: &NumaTopology,
    label: &str,
    memory_node: usize,
    run_node: usize,
    trials: u32,
    increments: u64,
) -> ScenarioOutcome {
    let spec = ScenarioSpec::new(
        label,
        Strategy::NumaBound { node: memory_node },
        REGION_BYTES,
        trials,
        increments,
    );

    harness.run_scenario(&spec, |region, timer| {
        if let Err(error) = topology.pin_to_node(run_node) {
            tracing::warn!(%error, node = run_node, "could not pin worker; measuring unpinned");
        }

        // SAFETY: the harness pre-touched (zeroed) the region.
        #[allow(unsafe_code)]
        let data = unsafe { region.as_mut_slice() };
        let len = data.len();

        timer.measure(|iters| {
            let mut sum = 0u64;
            for i in 0..iters {
                #[allow(clippy::cast_possible_truncation)]
                let idx = (i % len as u64) as usize;
                let loaded = data[idx];
                data[idx] = loaded.wrapping_add(1);
                sum = sum.wrapping_add(u64::from(loaded));
            }
            sum
        })
    })
}
