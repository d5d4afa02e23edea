//! Error types for NUMA probe and placement operations.

/// Errors that can occur during NUMA operations.
#[derive(Debug, thiserror::Error)]
pub enum NumaError {
    /// Invalid NUMA node
    #[error("invalid NUMA node {node} (system has {available} nodes)")]
    InvalidNode {
        /// The requested node
        node: usize,
        /// Number of available nodes
        available: usize,
    },

    /// Topology detection failed
    #[error("topology detection failed: {0}")]
    TopologyError(String),

    /// System call failed
    #[error("system call failed: {0}")]
    SyscallFailed(#[from] std::io::Error),
}
