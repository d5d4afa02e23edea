//! # Benchmark Harness
//!
//! Orchestrates one scenario end to end: acquire a backend region, warm it
//! up, run the workload for the configured trial and iteration counts under
//! a monotonic clock, then tear everything down - with release guaranteed
//! on every exit path by scoped acquisition.
//!
//! The harness controls the clock; scenario code controls setup and the
//! measured loop. A scenario body receives the region and a [`TrialTimer`],
//! does its setup (object construction, thread pinning), and hands the
//! measured loop to [`TrialTimer::measure`]. Anything done before `measure`
//! is untimed by construction.
//!
//! Concurrency scenarios instead go through
//! [`Harness::run_concurrent_pair`], which launches exactly two workers
//! against disjoint fields of one shared record and stops the clock only
//! after both have joined.

mod result;

pub use result::{ScenarioOutcome, ScenarioResult};

use std::hint::black_box;
use std::thread;
use std::time::{Duration, Instant};

use crate::backend::{Region, Strategy};
use crate::numa::Capability;

/// Configuration for one backed scenario.
#[derive(Debug, Clone)]
pub struct ScenarioSpec {
    /// Scenario label, unique within a run.
    pub label: String,
    /// Backend strategy to acquire the region under.
    pub strategy: Strategy,
    /// Region size in bytes.
    pub bytes: usize,
    /// Number of timed trials.
    pub trials: u32,
    /// Inner iterations handed to the workload per trial.
    pub iterations: u64,
}

impl ScenarioSpec {
    /// Convenience constructor.
    #[must_use]
    pub fn new(
        label: impl Into<String>,
        strategy: Strategy,
        bytes: usize,
        trials: u32,
        iterations: u64,
    ) -> Self {
        Self {
            label: label.into(),
            strategy,
            bytes,
            trials,
            iterations,
        }
    }
}

/// Times the trial loop of one scenario.
///
/// Handed to the scenario body by [`Harness::run_scenario`]; the body must
/// call [`TrialTimer::measure`] exactly once with the measured loop.
#[derive(Debug)]
pub struct TrialTimer {
    trials: u32,
    iterations: u64,
    elapsed: Option<Duration>,
}

impl TrialTimer {
    fn new(trials: u32, iterations: u64) -> Self {
        Self {
            trials,
            iterations,
            elapsed: None,
        }
    }

    /// Run `workload(iterations)` once per trial under the clock, folding
    /// every returned checksum through [`black_box`] so the compiler cannot
    /// prove the loop results unused and hoist it away.
    ///
    /// Returns the folded checksum.
    pub fn measure<W>(&mut self, mut workload: W) -> u64
    where
        W: FnMut(u64) -> u64,
    {
        if self.elapsed.is_some() {
            tracing::warn!("trial timer measured more than once; keeping the last measurement");
        }

        let start = Instant::now();
        let mut checksum = 0u64;
        for _ in 0..self.trials {
            checksum = checksum.wrapping_add(black_box(workload(self.iterations)));
        }
        self.elapsed = Some(start.elapsed());
        checksum
    }
}

/// Runs scenarios against backend regions.
///
/// Holds the NUMA capability probed once per harness, so every scenario in
/// a run sees the same platform verdict.
#[derive(Debug)]
pub struct Harness {
    capability: Capability,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    /// A harness with the host's probed NUMA capability.
    #[must_use]
    pub fn new() -> Self {
        Self {
            capability: Capability::probe(),
        }
    }

    /// A harness with an explicit capability, for tests and for callers
    /// that forbid NUMA fallback.
    #[must_use]
    pub fn with_capability(capability: Capability) -> Self {
        Self { capability }
    }

    /// The capability this harness acquires NUMA-bound regions under.
    #[must_use]
    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    /// Run one backed scenario.
    ///
    /// 1. Acquire the region per `spec` (scoped; released on every exit
    ///    path, including a panicking workload, via RAII)
    /// 2. Pre-touch the region so the first measured access is not paying
    ///    first-fault page-allocation cost
    /// 3. Hand region and timer to `body` for setup and measurement
    /// 4. Tear down and return the result
    ///
    /// Acquisition failures abort only this scenario: the error comes back
    /// as a [`ScenarioOutcome::Failed`] with the label attached, never a
    /// retry (a retried allocation under a fixed budget would corrupt the
    /// timing semantics).
    pub fn run_scenario<F>(&self, spec: &ScenarioSpec, body: F) -> ScenarioOutcome
    where
        F: FnOnce(&mut Region, &mut TrialTimer) -> u64,
    {
        tracing::debug!(
            label = %spec.label,
            strategy = spec.strategy.name(),
            bytes = spec.bytes,
            "acquiring region"
        );

        let mut region = match Region::acquire_with(spec.strategy, spec.bytes, &self.capability) {
            Ok(region) => region,
            Err(error) => {
                tracing::warn!(label = %spec.label, %error, "scenario failed to acquire backend");
                return ScenarioOutcome::Failed {
                    label: spec.label.clone(),
                    error,
                };
            }
        };

        region.pre_touch();
        let degraded = region.is_degraded();

        let mut timer = TrialTimer::new(spec.trials, spec.iterations);
        let checksum = body(&mut region, &mut timer);

        let elapsed = timer.elapsed.unwrap_or_else(|| {
            tracing::warn!(label = %spec.label, "scenario body never measured; reporting zero");
            Duration::ZERO
        });

        // Region dropped here: storage released exactly once, after the
        // body's slot borrows have ended.
        drop(region);

        ScenarioOutcome::Completed(self.finish(spec, elapsed, checksum, degraded))
    }

    /// Run an unbacked scenario: a workload that brings its own storage
    /// (heap-churn and AoS/SoA experiments, where the allocation behavior
    /// itself is the thing under test or the data is plain vectors).
    pub fn run_workload<W>(
        &self,
        label: impl Into<String>,
        trials: u32,
        iterations: u64,
        workload: W,
    ) -> ScenarioOutcome
    where
        W: FnMut(u64) -> u64,
    {
        let spec = ScenarioSpec::new(label, Strategy::PlainHeap, 0, trials, iterations);
        let mut timer = TrialTimer::new(trials, iterations);
        let checksum = timer.measure(workload);
        let elapsed = timer.elapsed.unwrap_or_default();
        ScenarioOutcome::Completed(self.finish(&spec, elapsed, checksum, false))
    }

    /// Run a two-worker concurrency scenario.
    ///
    /// Exactly two workers run under [`thread::scope`], each looping
    /// `iterations` times against its own logical field of `shared`. The
    /// clock stops only after both workers have joined, so the elapsed time
    /// is wall-clock for the whole concurrent section, not per-worker.
    ///
    /// The workers take no locks; `shared`'s fields are expected to be
    /// independently updatable (relaxed atomics in the reference
    /// workloads). A worker panic propagates - that is a bug in the
    /// workload, not a scenario failure to report.
    pub fn run_concurrent_pair<S, L, R>(
        &self,
        label: impl Into<String>,
        trials: u32,
        iterations: u64,
        shared: &S,
        left: L,
        right: R,
    ) -> ScenarioOutcome
    where
        S: Sync,
        L: Fn(&S, u64) -> u64 + Sync,
        R: Fn(&S, u64) -> u64 + Sync,
    {
        let spec = ScenarioSpec::new(label, Strategy::PlainHeap, 0, trials, iterations);

        let start = Instant::now();
        let mut checksum = 0u64;
        for _ in 0..trials {
            let (left_sum, right_sum) = thread::scope(|scope| {
                let left_worker = scope.spawn(|| left(shared, iterations));
                let right_worker = scope.spawn(|| right(shared, iterations));
                let left_sum = match left_worker.join() {
                    Ok(sum) => sum,
                    Err(payload) => std::panic::resume_unwind(payload),
                };
                let right_sum = match right_worker.join() {
                    Ok(sum) => sum,
                    Err(payload) => std::panic::resume_unwind(payload),
                };
                (left_sum, right_sum)
            });
            checksum = checksum
                .wrapping_add(black_box(left_sum))
                .wrapping_add(black_box(right_sum));
        }
        let elapsed = start.elapsed();

        ScenarioOutcome::Completed(self.finish(&spec, elapsed, checksum, false))
    }

    #[allow(clippy::unused_self, clippy::cast_possible_truncation)]
    fn finish(
        &self,
        spec: &ScenarioSpec,
        elapsed: Duration,
        checksum: u64,
        degraded: bool,
    ) -> ScenarioResult {
        let result = ScenarioResult {
            label: spec.label.clone(),
            elapsed_nanos: elapsed.as_nanos() as u64,
            iterations: spec.iterations,
            trials: spec.trials,
            checksum,
            degraded,
        };
        tracing::debug!(
            label = %result.label,
            elapsed_ms = result.elapsed_ms(),
            checksum = result.checksum,
            degraded = result.degraded,
            "scenario complete"
        );
        result
    }
}
