//! # Memory Backends
//!
//! Allocates raw storage under a named strategy and exposes it through an
//! exclusively-owning [`Region`] handle.
//!
//! ## Strategies
//!
//! | Strategy | Placement |
//! |----------|-----------|
//! | [`Strategy::PlainHeap`] | default allocator alignment |
//! | [`Strategy::AlignedBlock`] | start address is a multiple of `align` |
//! | [`Strategy::FixedPool`] | aligned, pre-reserved, sliced into equal slots |
//! | [`Strategy::NumaBound`] | physically resident on a NUMA node |
//!
//! A [`Region`] is created once per scenario run and released exactly once
//! when dropped. `NumaBound` degrades to plain-heap semantics on hosts
//! without NUMA support, carrying a `degraded` marker instead of failing.

mod error;
mod region;

pub use error::BackendError;
pub use region::{Region, Strategy};

/// Result type for backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;
