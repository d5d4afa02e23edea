//! # memlat Core
//!
//! Micro-benchmark harness for quantifying how memory layout decisions
//! affect access latency and throughput on modern CPUs.
//!
//! This crate provides:
//! - **Backends**: memory acquired under a named strategy (plain heap,
//!   cache-aligned block, fixed pool, NUMA-node-bound region)
//! - **Slots**: placement construction and explicit teardown of value
//!   sequences carved out of a backend region
//! - **Harness**: warm-up, timed trials, and guaranteed teardown on every
//!   exit path
//! - **Workloads**: the five reference experiments (cache alignment, false
//!   sharing, heap vs. pool, NUMA locality, AoS vs. SoA)
//! - **Report**: deterministic text formatting of scenario results
//!
//! ## Design Principles
//!
//! 1. **Measure the layout, not the machinery** - checksums defeat
//!    dead-code elimination, pre-touch removes first-fault noise
//! 2. **Scoped acquisition** - every region is released exactly once, on
//!    every exit path
//! 3. **Zero overhead in measured loops** - contract violations are made
//!    unrepresentable by ownership, not checked at runtime
//!
//! ## Example
//!
//! ```rust
//! use memlat_core::{Harness, ScenarioSpec, Strategy};
//!
//! let harness = Harness::new();
//! let spec = ScenarioSpec::new("scan", Strategy::AlignedBlock { align: 64 }, 4096, 3, 100);
//! let outcome = harness.run_scenario(&spec, |region, timer| {
//!     let len = region.len() as u64;
//!     timer.measure(|iters| iters.wrapping_mul(len))
//! });
//! assert!(outcome.is_completed());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)] // Selectively allowed where raw storage is manipulated
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod harness;
pub mod numa;
pub mod report;
pub mod slots;
pub mod workloads;

// Re-export key types
pub use backend::{BackendError, Region, Strategy};
pub use harness::{Harness, ScenarioOutcome, ScenarioResult, ScenarioSpec, TrialTimer};
pub use numa::{Capability, NumaError, NumaTopology};
pub use report::format_report;
pub use slots::{PaddedCell, PaddingPolicy, SlotSequence};

/// The cache line size assumed throughout the crate, in bytes.
///
/// 64 bytes on effectively all current x86-64 and most aarch64 parts.
pub const CACHE_LINE_SIZE: usize = 64;

/// Result type for memlat-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for memlat-core
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Memory backend errors
    #[error("backend error: {0}")]
    Backend(#[from] backend::BackendError),

    /// NUMA probe and placement errors
    #[error("NUMA error: {0}")]
    Numa(#[from] numa::NumaError),
}
