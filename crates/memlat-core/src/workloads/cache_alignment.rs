//! Aligned vs. unaligned record scan.
//!
//! A 64-byte record that starts mid-line straddles two cache lines, so
//! every access loads both. The aligned variant places each record on a
//! line boundary; the unaligned variant takes whatever the plain heap
//! hands out. The workload scans every lane of every record, so the
//! aligned layout touches half the lines per record in the worst case.

use std::mem;

use super::SuiteConfig;
use crate::backend::Strategy;
use crate::harness::{Harness, ScenarioOutcome, ScenarioSpec};
use crate::slots::{PaddingPolicy, SlotSequence};
use crate::CACHE_LINE_SIZE;

/// Records scanned per pass unless overridden.
pub const DEFAULT_RECORDS: usize = 1_000_000;

/// Full passes over the array per trial unless overridden.
pub const DEFAULT_PASSES: u64 = 100;

/// A 64-byte record with no alignment demand beyond its `i32` lanes.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Record {
    /// Sixteen lanes, 64 bytes total.
    pub lanes: [i32; 16],
}

/// The same 64 bytes, forced onto a cache-line boundary.
#[repr(C, align(64))]
#[derive(Debug, Clone, Copy)]
pub struct AlignedRecord {
    /// Sixteen lanes, 64 bytes total.
    pub lanes: [i32; 16],
}

const _: () = assert!(mem::size_of::<Record>() == CACHE_LINE_SIZE);
const _: () = assert!(mem::size_of::<AlignedRecord>() == CACHE_LINE_SIZE);

trait Lanes {
    fn lanes(&self) -> &[i32; 16];
}

impl Lanes for Record {
    fn lanes(&self) -> &[i32; 16] {
        &self.lanes
    }
}

impl Lanes for AlignedRecord {
    fn lanes(&self) -> &[i32; 16] {
        &self.lanes
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn fill(i: usize) -> [i32; 16] {
    // Small nonzero values so the checksum proves every lane was loaded.
    let mut lanes = [0i32; 16];
    for (j, lane) in lanes.iter_mut().enumerate() {
        *lane = ((i + j) % 251) as i32;
    }
    lanes
}

/// Sum every lane of every record, `passes` times.
#[allow(clippy::cast_sign_loss)]
fn scan<T: Lanes>(slots: &SlotSequence<'_, T>, passes: u64) -> u64 {
    let mut sum = 0u64;
    for _ in 0..passes {
        for record in slots.iter() {
            for &lane in record.lanes() {
                sum = sum.wrapping_add(lane as u64);
            }
        }
    }
    sum
}

/// Run the aligned and unaligned scan scenarios.
pub fn scenarios(harness: &Harness, config: &SuiteConfig) -> Vec<ScenarioOutcome> {
    let records = config.objects.unwrap_or(DEFAULT_RECORDS);
    let passes = config.iterations.unwrap_or(DEFAULT_PASSES);

    let unaligned_spec = ScenarioSpec::new(
        "cache_alignment/unaligned",
        Strategy::PlainHeap,
        records * mem::size_of::<Record>(),
        config.trials,
        passes,
    );
    let unaligned = harness.run_scenario(&unaligned_spec, |region, timer| {
        let slots = SlotSequence::construct_all(region, records, PaddingPolicy::Natural, |i| {
            Record { lanes: fill(i) }
        })
        .expect("region sized for record count");
        timer.measure(|passes| scan(&slots, passes))
    });

    let aligned_spec = ScenarioSpec::new(
        "cache_alignment/aligned",
        Strategy::AlignedBlock {
            align: CACHE_LINE_SIZE,
        },
        records * mem::size_of::<AlignedRecord>(),
        config.trials,
        passes,
    );
    let aligned = harness.run_scenario(&aligned_spec, |region, timer| {
        let slots = SlotSequence::construct_all(region, records, PaddingPolicy::Natural, |i| {
            AlignedRecord { lanes: fill(i) }
        })
        .expect("region sized for record count");
        timer.measure(|passes| scan(&slots, passes))
    });

    vec![unaligned, aligned]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_layouts_produce_the_same_checksum() {
        let harness = Harness::new();
        let config = SuiteConfig {
            trials: 2,
            objects: Some(128),
            iterations: Some(3),
            ..SuiteConfig::default()
        };

        let outcomes = scenarios(&harness, &config);
        assert_eq!(outcomes.len(), 2);

        let unaligned = outcomes[0].result().expect("unaligned completes");
        let aligned = outcomes[1].result().expect("aligned completes");
        // Same data, same scan: only the layout differs.
        assert_eq!(unaligned.checksum, aligned.checksum);
        assert_ne!(aligned.checksum, 0);
    }

    #[test]
    fn test_aligned_records_sit_on_line_boundaries() {
        let mut region = crate::backend::Region::acquire(
            Strategy::AlignedBlock {
                align: CACHE_LINE_SIZE,
            },
            CACHE_LINE_SIZE * 100,
        )
        .unwrap();
        let slots = SlotSequence::construct_all(&mut region, 100, PaddingPolicy::Natural, |i| {
            AlignedRecord { lanes: fill(i) }
        })
        .unwrap();

        for i in 0..100 {
            assert_eq!(slots.address_of(i) % CACHE_LINE_SIZE, 0);
        }
        slots.destroy_all();
    }
}
