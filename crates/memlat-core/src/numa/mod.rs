//! # NUMA Probe and Thread Placement
//!
//! On multi-socket systems memory access latency differs by 2-3x depending
//! on whether the touched pages are local or remote to the running CPU. The
//! harness only needs two OS-level operations - allocate-on-node (done by
//! the backend) and run-on-node (done here) - plus a capability probe so the
//! rest of the crate never branches on platform specifics directly.
//!
//! ## Components
//!
//! - [`NumaTopology`] - detects nodes and their CPU sets
//! - [`Capability`] - tri-state probe consumed by `Region::acquire`
//! - [`NumaTopology::pin_to_node`] - restricts the calling thread to a
//!   node's CPUs
//!
//! ## Platform Support
//!
//! | Platform | Support |
//! |----------|---------|
//! | Linux | Full (sysfs topology, `mbind`, `sched_setaffinity`) |
//! | Others | Degraded (single node, pinning is a no-op) |

mod error;
mod topology;

pub use error::NumaError;
pub use topology::NumaTopology;

/// Result type for NUMA operations.
pub type Result<T> = std::result::Result<T, NumaError>;

/// Outcome of the NUMA capability probe.
///
/// Consumed by `Region::acquire` so NUMA-bound scenarios either bind for
/// real, degrade transparently, or fail fast - and nothing else in the
/// harness needs to know which platform it runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// NUMA binding is supported and `nodes` nodes exist.
    Available {
        /// Number of NUMA nodes on this host.
        nodes: usize,
    },

    /// No real NUMA capability; requests degrade to plain-heap semantics
    /// with a noted caveat in the scenario result.
    FallbackOnly,

    /// NUMA is required but absent and no fallback is permitted. Acquiring
    /// a NUMA-bound region in this state is a hard error.
    Unavailable,
}

impl Capability {
    /// Probe the current host.
    #[must_use]
    pub fn probe() -> Self {
        Self::from_topology(&NumaTopology::detect())
    }

    /// Derive the capability from an already-detected topology.
    #[must_use]
    pub fn from_topology(topology: &NumaTopology) -> Self {
        if topology.is_numa() {
            Self::Available {
                nodes: topology.num_nodes(),
            }
        } else {
            Self::FallbackOnly
        }
    }

    /// True when real NUMA binding is possible.
    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available { .. })
    }
}

/// The NUMA node the page containing `ptr` is resident on.
///
/// Uses the `move_pages` query form on Linux; returns `None` when the
/// kernel cannot say (page not faulted in, or no NUMA support).
#[cfg(target_os = "linux")]
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn node_of(ptr: *const u8) -> Option<usize> {
    if ptr.is_null() {
        return None;
    }

    let mut status: i32 = -1;
    let page_ptr = ptr as *mut libc::c_void;

    // SAFETY: single-page query form of move_pages; a null nodes array
    // means "report only" and status is written by the kernel.
    #[allow(unsafe_code)]
    let result = unsafe {
        libc::syscall(
            libc::SYS_move_pages,
            0i32, // self
            1usize,
            &raw const page_ptr,
            std::ptr::null::<i32>(),
            &raw mut status,
            0i32,
        )
    };

    if result == 0 && status >= 0 {
        Some(status as usize)
    } else {
        None
    }
}

/// Non-Linux fallback: residency cannot be queried.
#[cfg(not(target_os = "linux"))]
#[must_use]
pub fn node_of(_ptr: *const u8) -> Option<usize> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_never_reports_unavailable() {
        // Unavailable is only ever configured by callers forbidding
        // fallback; the probe itself always finds a usable path.
        let cap = Capability::probe();
        assert_ne!(cap, Capability::Unavailable);
    }

    #[test]
    fn test_capability_from_topology() {
        let topo = NumaTopology::detect();
        let cap = Capability::from_topology(&topo);
        if topo.is_numa() {
            assert!(cap.is_available());
        } else {
            assert_eq!(cap, Capability::FallbackOnly);
        }
    }

    #[test]
    fn test_node_of_null_is_none() {
        assert_eq!(node_of(std::ptr::null()), None);
    }
}
