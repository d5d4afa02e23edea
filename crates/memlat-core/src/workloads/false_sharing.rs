//! Adjacent vs. line-padded counters under two concurrent workers.
//!
//! Two workers increment logically independent counters. When the counters
//! share a cache line, every write on one core invalidates the line in the
//! other core's cache; the padded variant gives each counter its own line
//! and the ping-pong disappears.
//!
//! The workers take no locks. Each counter is a relaxed atomic, so the
//! updates stay on disjoint words with no ordering edges added - the
//! hardware coherence traffic being measured is exactly the unsynchronized
//! adjacent-write pattern, made well-defined. The disjoint-field guarantee
//! is load-bearing: this crate never extends the pattern to two workers
//! racing on the *same* field.

use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};

use super::SuiteConfig;
use crate::harness::{Harness, ScenarioOutcome};
use crate::slots::PaddedCell;
use crate::CACHE_LINE_SIZE;

/// Increments per worker unless overridden.
pub const DEFAULT_INCREMENTS: u64 = 1_000_000_000;

/// Two counters packed onto one cache line.
#[repr(C)]
#[derive(Debug, Default)]
pub struct SharedPair {
    /// The left worker's counter.
    pub x: AtomicU64,
    /// The right worker's counter, on the same line as `x`.
    pub y: AtomicU64,
}

const _: () = assert!(mem::size_of::<SharedPair>() <= CACHE_LINE_SIZE);

/// Two counters, each on its own cache line.
#[derive(Debug, Default)]
pub struct PaddedPair {
    /// The left worker's counter.
    pub x: PaddedCell,
    /// The right worker's counter, one full line away from `x`.
    pub y: PaddedCell,
}

/// Run the unpadded and padded counter-pair scenarios.
pub fn scenarios(harness: &Harness, config: &SuiteConfig) -> Vec<ScenarioOutcome> {
    let increments = config.iterations.unwrap_or(DEFAULT_INCREMENTS);

    let shared = SharedPair::default();
    let unpadded = harness.run_concurrent_pair(
        "false_sharing/unpadded",
        config.trials,
        increments,
        &shared,
        |pair, iters| {
            for _ in 0..iters {
                pair.x.fetch_add(1, Ordering::Relaxed);
            }
            pair.x.load(Ordering::Relaxed)
        },
        |pair, iters| {
            for _ in 0..iters {
                pair.y.fetch_add(1, Ordering::Relaxed);
            }
            pair.y.load(Ordering::Relaxed)
        },
    );

    let padded = PaddedPair::default();
    let padded = harness.run_concurrent_pair(
        "false_sharing/padded",
        config.trials,
        increments,
        &padded,
        |pair, iters| {
            for _ in 0..iters {
                pair.x.increment();
            }
            pair.x.value()
        },
        |pair, iters| {
            for _ in 0..iters {
                pair.y.increment();
            }
            pair.y.value()
        },
    );

    vec![unpadded, padded]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_lost_updates_without_a_lock() {
        let harness = Harness::new();
        let config = SuiteConfig {
            trials: 1,
            iterations: Some(50_000),
            ..SuiteConfig::default()
        };

        // The benign race on disjoint fields affects timing, never
        // correctness: both counters must land exactly on the iteration
        // count.
        let shared = SharedPair::default();
        let outcome = harness.run_concurrent_pair(
            "lost_updates",
            config.trials,
            config.iterations.unwrap(),
            &shared,
            |pair, iters| {
                for _ in 0..iters {
                    pair.x.fetch_add(1, Ordering::Relaxed);
                }
                pair.x.load(Ordering::Relaxed)
            },
            |pair, iters| {
                for _ in 0..iters {
                    pair.y.fetch_add(1, Ordering::Relaxed);
                }
                pair.y.load(Ordering::Relaxed)
            },
        );

        assert!(outcome.is_completed());
        assert_eq!(shared.x.load(Ordering::SeqCst), 50_000);
        assert_eq!(shared.y.load(Ordering::SeqCst), 50_000);
    }

    #[test]
    fn test_padded_pair_fields_on_distinct_lines() {
        let pair = PaddedPair::default();
        let x_line = std::ptr::from_ref(&pair.x) as usize / CACHE_LINE_SIZE;
        let y_line = std::ptr::from_ref(&pair.y) as usize / CACHE_LINE_SIZE;
        assert_ne!(x_line, y_line);
    }

    #[test]
    fn test_unpadded_pair_fields_share_a_line() {
        // This is the layout under test; if it ever stops holding, the
        // scenario would measure nothing.
        let pair = SharedPair::default();
        let x_addr = std::ptr::from_ref(&pair.x) as usize;
        let y_addr = std::ptr::from_ref(&pair.y) as usize;
        assert_eq!(y_addr - x_addr, mem::size_of::<AtomicU64>());
    }

    #[test]
    fn test_scenarios_complete() {
        let harness = Harness::new();
        let config = SuiteConfig {
            iterations: Some(1000),
            ..SuiteConfig::default()
        };
        let outcomes = scenarios(&harness, &config);
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(ScenarioOutcome::is_completed));
    }
}
