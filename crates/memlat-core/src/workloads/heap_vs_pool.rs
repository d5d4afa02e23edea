//! Per-object heap churn vs. fixed-pool placement construction.
//!
//! The heap side allocates every trade individually and frees them all,
//! paying an allocator round trip per object and scattering the objects
//! across the heap. The pool side pre-reserves one contiguous region,
//! constructs the trades in place at fixed strides, and tears them down
//! explicitly - no allocator calls per object, and neighbors stay
//! neighbors.
//!
//! This is the one workload where allocation happens inside the measured
//! section: allocation behavior is the effect under test.

use std::mem;

use super::SuiteConfig;
use crate::backend::Strategy;
use crate::harness::{Harness, ScenarioOutcome, ScenarioSpec};
use crate::slots::{PaddingPolicy, SlotSequence};
use crate::CACHE_LINE_SIZE;

/// Trades constructed per trial unless overridden.
pub const DEFAULT_TRADES: usize = 10_000_000;

/// A small order record, the pooled object under test.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trade {
    /// Order identifier.
    pub id: i32,
    /// Limit price.
    pub price: f64,
    /// Order size.
    pub quantity: i32,
}

impl Trade {
    /// The `seq`-th trade of a run.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_precision_loss)]
    pub fn new(seq: usize) -> Self {
        Self {
            id: seq as i32,
            price: 100.5 + seq as f64,
            quantity: 10,
        }
    }
}

#[allow(clippy::cast_sign_loss)]
fn id_checksum(id: i32) -> u64 {
    u64::from(id as u32)
}

/// Run the heap-churn and pool scenarios.
#[allow(clippy::cast_possible_truncation)]
pub fn scenarios(harness: &Harness, config: &SuiteConfig) -> Vec<ScenarioOutcome> {
    let trades = config.objects.unwrap_or(DEFAULT_TRADES);

    let heap = harness.run_workload(
        "heap_vs_pool/heap",
        config.trials,
        trades as u64,
        |count| {
            let count = count as usize;
            let mut book: Vec<Box<Trade>> = Vec::with_capacity(count);
            for seq in 0..count {
                book.push(Box::new(Trade::new(seq)));
            }
            let sum = book
                .iter()
                .map(|trade| id_checksum(trade.id))
                .fold(0u64, u64::wrapping_add);
            // book drops here: the per-object frees are part of the
            // measured churn, as is the per-object allocation above.
            sum
        },
    );

    let pool_spec = ScenarioSpec::new(
        "heap_vs_pool/pool",
        Strategy::FixedPool {
            align: CACHE_LINE_SIZE,
        },
        trades * mem::size_of::<Trade>(),
        config.trials,
        trades as u64,
    );
    let pool = harness.run_scenario(&pool_spec, |region, timer| {
        timer.measure(|count| {
            let count = count as usize;
            let slots =
                SlotSequence::construct_all(&mut *region, count, PaddingPolicy::Natural, Trade::new)
                    .expect("pool sized for trade count");
            let sum = slots
                .iter()
                .map(|trade| id_checksum(trade.id))
                .fold(0u64, u64::wrapping_add);
            slots.destroy_all();
            sum
        })
    });

    vec![heap, pool]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Region;

    #[test]
    fn test_pool_round_trip_preserves_ids() {
        let mut region = Region::acquire(
            Strategy::FixedPool { align: 64 },
            5 * mem::size_of::<Trade>(),
        )
        .unwrap();
        let slots =
            SlotSequence::construct_all(&mut region, 5, PaddingPolicy::Natural, Trade::new)
                .unwrap();

        for i in 0..5 {
            assert_eq!(slots.get(i).unwrap().id, i32::try_from(i).unwrap());
        }
        slots.destroy_all();
    }

    #[test]
    fn test_heap_and_pool_checksums_match() {
        let harness = Harness::new();
        let config = SuiteConfig {
            trials: 2,
            objects: Some(500),
            ..SuiteConfig::default()
        };

        let outcomes = scenarios(&harness, &config);
        let heap = outcomes[0].result().expect("heap completes");
        let pool = outcomes[1].result().expect("pool completes");
        // Same objects either way; only the placement differs.
        assert_eq!(heap.checksum, pool.checksum);
    }

    #[test]
    fn test_pool_scenario_releases_backing_memory_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let harness = Harness::new();
        let spec = ScenarioSpec::new(
            "pool_release",
            Strategy::FixedPool { align: 64 },
            5 * mem::size_of::<Trade>(),
            1,
            5,
        );
        let releases = Arc::new(AtomicUsize::new(0));
        let probe = Arc::clone(&releases);

        let outcome = harness.run_scenario(&spec, move |region, timer| {
            region.on_release(move || {
                probe.fetch_add(1, Ordering::SeqCst);
            });
            timer.measure(|count| {
                #[allow(clippy::cast_possible_truncation)]
                let count = count as usize;
                let slots = SlotSequence::construct_all(
                    &mut *region,
                    count,
                    PaddingPolicy::Natural,
                    Trade::new,
                )
                .expect("pool sized for trade count");
                let sum = slots.iter().map(|t| id_checksum(t.id)).sum::<u64>();
                slots.destroy_all();
                sum
            })
        });

        assert!(outcome.is_completed());
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }
}
