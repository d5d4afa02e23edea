//! NUMA topology detection and thread placement.
//!
//! Linux topology comes from sysfs (`/sys/devices/system/node/`); every
//! other platform gets a single-node fallback. Detection never fails.

use super::NumaError;

/// NUMA topology: which nodes exist and which CPUs belong to each.
#[derive(Debug, Clone)]
pub struct NumaTopology {
    /// Number of NUMA nodes
    num_nodes: usize,
    /// CPUs per node (index = node ID)
    cpus_per_node: Vec<Vec<usize>>,
    /// CPU to NUMA node mapping
    cpu_to_node: Vec<usize>,
    /// Total number of CPUs
    num_cpus: usize,
}

impl NumaTopology {
    /// Detect the system's NUMA topology.
    ///
    /// Reads sysfs on Linux and falls back to a single-node topology on
    /// other platforms or when detection fails. Never errors.
    #[must_use]
    pub fn detect() -> Self {
        #[cfg(target_os = "linux")]
        {
            if let Ok(topo) = Self::detect_sysfs() {
                return topo;
            }
        }

        Self::single_node_fallback()
    }

    /// Detect topology from sysfs on Linux.
    #[cfg(target_os = "linux")]
    fn detect_sysfs() -> super::Result<Self> {
        use std::fs;
        use std::path::Path;

        let node_path = Path::new("/sys/devices/system/node");
        if !node_path.exists() {
            return Err(NumaError::TopologyError(
                "sysfs node path not found".to_string(),
            ));
        }

        let mut node_ids: Vec<usize> = Vec::new();
        for entry in fs::read_dir(node_path)
            .map_err(|e| NumaError::TopologyError(format!("failed to read node dir: {e}")))?
        {
            let entry =
                entry.map_err(|e| NumaError::TopologyError(format!("failed to read entry: {e}")))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(id) = name.strip_prefix("node") {
                if let Ok(node_id) = id.parse::<usize>() {
                    node_ids.push(node_id);
                }
            }
        }

        if node_ids.is_empty() {
            return Err(NumaError::TopologyError("no NUMA nodes found".to_string()));
        }

        node_ids.sort_unstable();
        let num_nodes = node_ids.iter().max().map_or(1, |m| m + 1);
        let num_cpus = num_cpus::get();

        let mut cpus_per_node = vec![Vec::new(); num_nodes];
        let mut cpu_to_node = vec![0usize; num_cpus];

        for node_id in &node_ids {
            let cpulist_path = node_path.join(format!("node{node_id}/cpulist"));
            if let Ok(cpulist) = fs::read_to_string(&cpulist_path) {
                let cpus = Self::parse_cpulist(cpulist.trim());
                for cpu in &cpus {
                    if *cpu < num_cpus {
                        cpu_to_node[*cpu] = *node_id;
                    }
                }
                cpus_per_node[*node_id] = cpus;
            }
        }

        Ok(Self {
            num_nodes,
            cpus_per_node,
            cpu_to_node,
            num_cpus,
        })
    }

    /// Parse a CPU list string like "0-7,16-23".
    #[cfg(target_os = "linux")]
    fn parse_cpulist(s: &str) -> Vec<usize> {
        let mut cpus = Vec::new();

        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            if let Some((start, end)) = part.split_once('-') {
                if let (Ok(start), Ok(end)) = (start.parse::<usize>(), end.parse::<usize>()) {
                    cpus.extend(start..=end);
                }
            } else if let Ok(cpu) = part.parse::<usize>() {
                cpus.push(cpu);
            }
        }

        cpus
    }

    /// Create a single-node fallback topology.
    fn single_node_fallback() -> Self {
        let num_cpus = num_cpus::get();
        let cpus: Vec<usize> = (0..num_cpus).collect();

        Self {
            num_nodes: 1,
            cpus_per_node: vec![cpus],
            cpu_to_node: vec![0; num_cpus],
            num_cpus,
        }
    }

    /// Returns the number of NUMA nodes.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Returns the total number of CPUs.
    #[must_use]
    pub fn num_cpus(&self) -> usize {
        self.num_cpus
    }

    /// Returns the CPUs belonging to a specific NUMA node.
    ///
    /// Returns an empty slice if the node ID is invalid.
    #[must_use]
    pub fn cpus_for_node(&self, node: usize) -> &[usize] {
        self.cpus_per_node.get(node).map_or(&[], Vec::as_slice)
    }

    /// Returns the NUMA node for a given CPU, or 0 for an invalid CPU.
    #[must_use]
    pub fn node_for_cpu(&self, cpu: usize) -> usize {
        self.cpu_to_node.get(cpu).copied().unwrap_or(0)
    }

    /// Returns the NUMA node the calling thread is currently running on.
    #[must_use]
    pub fn current_node(&self) -> usize {
        self.node_for_cpu(Self::current_cpu())
    }

    /// Returns the current CPU ID.
    #[must_use]
    pub fn current_cpu() -> usize {
        #[cfg(target_os = "linux")]
        {
            // SAFETY: sched_getcpu takes no pointers and cannot fail unsafely.
            #[allow(unsafe_code)]
            let cpu = unsafe { libc::sched_getcpu() };
            if cpu >= 0 {
                #[allow(clippy::cast_sign_loss)]
                return cpu as usize;
            }
        }

        0
    }

    /// Check if the system has multiple NUMA nodes.
    #[must_use]
    pub fn is_numa(&self) -> bool {
        self.num_nodes > 1
    }

    /// Restrict the calling thread to the CPUs of `node`.
    ///
    /// This is the run-on-node half of the NUMA story: a benchmark worker
    /// pinned here observes local or remote latency depending on where its
    /// region was bound. A no-op (with a warning) on non-Linux targets.
    ///
    /// # Errors
    ///
    /// Returns [`NumaError::InvalidNode`] for an unknown node and
    /// [`NumaError::SyscallFailed`] when the kernel rejects the affinity.
    pub fn pin_to_node(&self, node: usize) -> super::Result<()> {
        let cpus = self.cpus_for_node(node);
        if cpus.is_empty() {
            return Err(NumaError::InvalidNode {
                node,
                available: self.num_nodes,
            });
        }

        self.set_affinity(cpus)
    }

    /// Undo [`NumaTopology::pin_to_node`]: allow the calling thread on
    /// every CPU again.
    ///
    /// # Errors
    ///
    /// Returns [`NumaError::SyscallFailed`] when the kernel rejects the
    /// affinity mask.
    pub fn unpin(&self) -> super::Result<()> {
        let cpus: Vec<usize> = (0..self.num_cpus).collect();
        self.set_affinity(&cpus)
    }

    #[cfg(target_os = "linux")]
    fn set_affinity(&self, cpus: &[usize]) -> super::Result<()> {
        // SAFETY: zeroed cpu_set_t is the documented empty set.
        #[allow(unsafe_code)]
        let mut set: libc::cpu_set_t = unsafe { std::mem::zeroed() };
        for &cpu in cpus {
            // SAFETY: CPU_SET only writes within the set for ids < CPU_SETSIZE.
            #[allow(unsafe_code)]
            unsafe {
                libc::CPU_SET(cpu, &mut set);
            }
        }

        // SAFETY: pid 0 targets the calling thread; the set outlives the call.
        #[allow(unsafe_code)]
        let rc = unsafe {
            libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &raw const set)
        };
        if rc != 0 {
            return Err(NumaError::SyscallFailed(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    #[allow(clippy::unnecessary_wraps, clippy::unused_self)]
    fn set_affinity(&self, _cpus: &[usize]) -> super::Result<()> {
        tracing::warn!("thread pinning unsupported on this target; running unpinned");
        Ok(())
    }

    /// Log the detected topology.
    pub fn log_topology(&self) {
        tracing::info!(
            "NUMA topology: {} nodes, {} CPUs",
            self.num_nodes,
            self.num_cpus
        );
        for node in 0..self.num_nodes {
            let cpus = self.cpus_for_node(node);
            tracing::info!("  node {}: {} CPUs ({:?})", node, cpus.len(), cpus);
        }
    }
}
