//! Region acquisition and release for the four backend strategies.
//!
//! A [`Region`] exclusively owns its raw storage for its entire lifetime and
//! returns it to the platform exactly once, from `Drop`. NUMA-bound regions
//! use `mmap` + `mbind` directly on Linux; everywhere else (and on hosts the
//! capability probe reports as non-NUMA) the strategy transparently degrades
//! to plain aligned heap storage while preserving the same handle shape.

use std::alloc::Layout;
use std::mem;
use std::ptr::NonNull;

use super::BackendError;
use crate::numa::Capability;
use crate::CACHE_LINE_SIZE;

/// Named allocation strategy for a benchmark scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Untyped storage with the default allocator alignment.
    PlainHeap,

    /// Storage whose start address is a multiple of `align`.
    AlignedBlock {
        /// Requested alignment; must be a nonzero power of two.
        align: usize,
    },

    /// Identical placement to [`Strategy::AlignedBlock`], but pre-reserved
    /// as one contiguous run intended to be sliced into equal-sized slots.
    /// The pool never grows; exhaustion is a caller error.
    FixedPool {
        /// Requested alignment; must be a nonzero power of two.
        align: usize,
    },

    /// Storage physically resident on a NUMA node, when the platform
    /// supports it. Degrades to plain-heap semantics otherwise.
    NumaBound {
        /// Target NUMA node.
        node: usize,
    },
}

impl Strategy {
    /// Short name used in logs and reports.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::PlainHeap => "plain_heap",
            Self::AlignedBlock { .. } => "aligned_block",
            Self::FixedPool { .. } => "fixed_pool",
            Self::NumaBound { .. } => "numa_bound",
        }
    }

    /// The alignment this strategy guarantees for the region base address.
    #[must_use]
    pub fn align(&self) -> usize {
        match self {
            Self::PlainHeap => mem::align_of::<usize>(),
            Self::AlignedBlock { align } | Self::FixedPool { align } => *align,
            // mmap returns page-aligned storage; the heap fallback matches.
            Self::NumaBound { .. } => CACHE_LINE_SIZE,
        }
    }
}

/// How the storage must be returned to the platform.
#[derive(Debug)]
enum Storage {
    /// `std::alloc` storage; freed with the recorded layout.
    Heap(Layout),

    /// Anonymous `mmap` storage; freed with `munmap`.
    #[cfg(target_os = "linux")]
    Mapped,
}

/// An exclusively-owned block of raw storage acquired under a [`Strategy`].
///
/// The region is released exactly once, when the handle is dropped. The
/// harness's scoped-acquisition discipline guarantees this happens on every
/// scenario exit path.
pub struct Region {
    ptr: NonNull<u8>,
    size: usize,
    align: usize,
    strategy: Strategy,
    degraded: bool,
    storage: Storage,
    release_probe: Option<ReleaseProbe>,
}

type ReleaseProbe = Box<dyn FnOnce() + Send>;

impl std::fmt::Debug for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Region")
            .field("ptr", &self.ptr)
            .field("size", &self.size)
            .field("align", &self.align)
            .field("strategy", &self.strategy)
            .field("degraded", &self.degraded)
            .field("storage", &self.storage)
            .field("release_probe", &self.release_probe.is_some())
            .finish()
    }
}

// SAFETY: the region exclusively owns its storage; moving the handle to
// another thread moves that ownership with it.
#[allow(unsafe_code)]
unsafe impl Send for Region {}

impl Region {
    /// Acquire a region of `size` bytes, probing platform capabilities.
    ///
    /// Equivalent to [`Region::acquire_with`] with [`Capability::probe`].
    ///
    /// # Errors
    ///
    /// See [`Region::acquire_with`].
    pub fn acquire(strategy: Strategy, size: usize) -> super::Result<Self> {
        Self::acquire_with(strategy, size, &Capability::probe())
    }

    /// Acquire a region of `size` bytes under `strategy`.
    ///
    /// For [`Strategy::NumaBound`], `numa` decides placement: binding is
    /// attempted when NUMA is available, the region silently degrades to
    /// plain-heap semantics under [`Capability::FallbackOnly`], and
    /// [`Capability::Unavailable`] is a hard error.
    ///
    /// # Errors
    ///
    /// - [`BackendError::AllocationFailed`] if the allocator returns no
    ///   memory or `size` is zero
    /// - [`BackendError::InvalidAlignment`] for a zero or non-power-of-two
    ///   alignment
    /// - [`BackendError::CapabilityUnavailable`] for `NumaBound` with no
    ///   fallback permitted
    /// - [`BackendError::Numa`] for an out-of-range node hint
    pub fn acquire_with(
        strategy: Strategy,
        size: usize,
        numa: &Capability,
    ) -> super::Result<Self> {
        if size == 0 {
            return Err(BackendError::AllocationFailed(
                "zero-sized region requested".to_string(),
            ));
        }

        match strategy {
            Strategy::PlainHeap => Self::heap_acquire(strategy, size, mem::align_of::<usize>()),
            Strategy::AlignedBlock { align } | Strategy::FixedPool { align } => {
                Self::heap_acquire(strategy, size, align)
            }
            Strategy::NumaBound { node } => Self::numa_acquire(strategy, size, node, numa),
        }
    }

    /// Allocate via `std::alloc` with an explicit alignment.
    fn heap_acquire(strategy: Strategy, size: usize, align: usize) -> super::Result<Self> {
        if align == 0 || !align.is_power_of_two() {
            return Err(BackendError::InvalidAlignment(align));
        }

        let layout = Layout::from_size_align(size, align)
            .map_err(|_| BackendError::InvalidAlignment(align))?;

        // SAFETY: layout has nonzero size and a valid power-of-two alignment.
        #[allow(unsafe_code)]
        let raw = unsafe { std::alloc::alloc(layout) };
        let ptr = NonNull::new(raw).ok_or_else(|| {
            BackendError::AllocationFailed(format!("allocator returned null for {size} bytes"))
        })?;

        Ok(Self {
            ptr,
            size,
            align,
            strategy,
            degraded: false,
            storage: Storage::Heap(layout),
            release_probe: None,
        })
    }

    /// Allocate NUMA-bound storage, degrading per the capability probe.
    fn numa_acquire(
        strategy: Strategy,
        size: usize,
        node: usize,
        numa: &Capability,
    ) -> super::Result<Self> {
        match *numa {
            Capability::Unavailable => Err(BackendError::CapabilityUnavailable(format!(
                "NUMA binding to node {node} requested but NUMA is unavailable \
                 and no fallback is permitted"
            ))),
            Capability::FallbackOnly => {
                tracing::warn!(
                    node,
                    "NUMA not available on this host; degrading to plain heap"
                );
                let mut region = Self::heap_acquire(strategy, size, CACHE_LINE_SIZE)?;
                region.degraded = true;
                Ok(region)
            }
            Capability::Available { nodes } => {
                if node >= nodes {
                    return Err(BackendError::Numa(crate::numa::NumaError::InvalidNode {
                        node,
                        available: nodes,
                    }));
                }
                Self::mmap_acquire(strategy, size, node)
            }
        }
    }

    /// Allocate with `mmap` and bind the pages to `node` with `mbind`.
    #[cfg(target_os = "linux")]
    fn mmap_acquire(strategy: Strategy, size: usize, node: usize) -> super::Result<Self> {
        // SAFETY: anonymous private mapping with no fixed address.
        #[allow(unsafe_code)]
        let raw = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };

        if raw == libc::MAP_FAILED {
            return Err(BackendError::AllocationFailed(format!(
                "mmap failed: {}",
                std::io::Error::last_os_error()
            )));
        }

        let ptr = NonNull::new(raw.cast::<u8>()).ok_or_else(|| {
            BackendError::AllocationFailed("mmap returned null".to_string())
        })?;

        let degraded = !Self::bind_to_node(ptr.as_ptr(), size, node);

        Ok(Self {
            ptr,
            size,
            align: CACHE_LINE_SIZE,
            strategy,
            degraded,
            storage: Storage::Mapped,
            release_probe: None,
        })
    }

    /// Heap fallback for targets without `mmap`/`mbind`.
    #[cfg(not(target_os = "linux"))]
    fn mmap_acquire(strategy: Strategy, size: usize, node: usize) -> super::Result<Self> {
        tracing::warn!(node, "NUMA binding unsupported on this target; degrading");
        let mut region = Self::heap_acquire(strategy, size, CACHE_LINE_SIZE)?;
        region.degraded = true;
        Ok(region)
    }

    /// Bind mapped pages to a NUMA node. Returns `false` when the kernel
    /// refuses the policy, in which case the region runs degraded.
    #[cfg(target_os = "linux")]
    #[allow(clippy::items_after_statements)]
    fn bind_to_node(ptr: *mut u8, size: usize, node: usize) -> bool {
        // MPOL_BIND = 2 - strictly bind to the specified nodes
        const MPOL_BIND: i32 = 2;
        // MPOL_MF_MOVE = 2 - move pages already faulted in
        const MPOL_MF_MOVE: u32 = 2;

        let mut nodemask: u64 = 0;
        if node < 64 {
            nodemask = 1u64 << node;
        }

        // SAFETY: ptr/size describe a mapping we just created; the nodemask
        // pointer is valid for the duration of the call.
        #[allow(unsafe_code)]
        let result = unsafe {
            libc::syscall(
                libc::SYS_mbind,
                ptr,
                size,
                MPOL_BIND,
                &raw const nodemask,
                64usize, // maxnode
                MPOL_MF_MOVE,
            )
        };

        if result < 0 {
            let err = std::io::Error::last_os_error();
            tracing::warn!(node, %err, "mbind failed; region runs degraded");
            return false;
        }
        true
    }

    /// Zero the whole region so the first measured access is not also
    /// paying first-fault page-allocation cost.
    ///
    /// This is an explicit warm-up step the harness runs before the clock
    /// starts; it also leaves the storage initialized for byte-level views.
    pub fn pre_touch(&mut self) {
        // SAFETY: ptr is valid for size bytes and exclusively owned.
        #[allow(unsafe_code)]
        unsafe {
            std::ptr::write_bytes(self.ptr.as_ptr(), 0, self.size);
        }
    }

    /// Region length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.size
    }

    /// Whether the region holds zero bytes. Always false for a live handle.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// The alignment actually guaranteed for the base address.
    #[must_use]
    pub fn align(&self) -> usize {
        self.align
    }

    /// The strategy this region was acquired under.
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// True when a `NumaBound` request fell back to plain-heap semantics.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Base address of the storage, for layout verification.
    #[must_use]
    pub fn base_addr(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    /// Raw pointer to the storage.
    #[must_use]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Raw mutable pointer to the storage.
    #[must_use]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// View the region as a byte slice.
    ///
    /// # Safety
    ///
    /// The storage must be initialized, e.g. via [`Region::pre_touch`].
    #[must_use]
    #[allow(unsafe_code)]
    pub unsafe fn as_slice(&self) -> &[u8] {
        std::slice::from_raw_parts(self.ptr.as_ptr(), self.size)
    }

    /// View the region as a mutable byte slice.
    ///
    /// # Safety
    ///
    /// The storage must be initialized, e.g. via [`Region::pre_touch`].
    #[must_use]
    #[allow(unsafe_code)]
    pub unsafe fn as_mut_slice(&mut self) -> &mut [u8] {
        std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.size)
    }

    /// The NUMA node the first page is resident on, when the platform can
    /// tell us. Pages must have been faulted in first.
    #[must_use]
    pub fn resident_node(&self) -> Option<usize> {
        crate::numa::node_of(self.ptr.as_ptr())
    }

    /// Install a probe invoked exactly once when the storage is returned to
    /// the platform. Test instrumentation for release accounting.
    pub fn on_release(&mut self, probe: impl FnOnce() + Send + 'static) {
        self.release_probe = Some(Box::new(probe));
    }

    /// Release the region explicitly. Equivalent to dropping the handle;
    /// provided so scenario code can make teardown points visible.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        match self.storage {
            Storage::Heap(layout) => {
                // SAFETY: ptr was returned by alloc with this exact layout
                // and is released exactly once.
                #[allow(unsafe_code)]
                unsafe {
                    std::alloc::dealloc(self.ptr.as_ptr(), layout);
                }
            }
            #[cfg(target_os = "linux")]
            Storage::Mapped => {
                // SAFETY: ptr/size describe the mapping created in
                // mmap_acquire and released exactly once.
                #[allow(unsafe_code)]
                unsafe {
                    libc::munmap(self.ptr.as_ptr().cast(), self.size);
                }
            }
        }
        if let Some(probe) = self.release_probe.take() {
            probe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_plain_heap_acquire() {
        let region = Region::acquire(Strategy::PlainHeap, 4096).unwrap();
        assert_eq!(region.len(), 4096);
        assert!(!region.is_degraded());
        assert_eq!(region.base_addr() % region.align(), 0);
    }

    #[test]
    fn test_aligned_block_base_is_multiple_of_alignment() {
        for align in [8usize, 16, 64, 128, 4096] {
            let region = Region::acquire(Strategy::AlignedBlock { align }, 8192).unwrap();
            assert_eq!(
                region.base_addr() % align,
                0,
                "base not aligned to {align}"
            );
        }
    }

    #[test]
    fn test_fixed_pool_base_is_multiple_of_alignment() {
        let region = Region::acquire(Strategy::FixedPool { align: 64 }, 64 * 1000).unwrap();
        assert_eq!(region.base_addr() % 64, 0);
        assert_eq!(region.len(), 64 * 1000);
    }

    #[test]
    fn test_non_power_of_two_alignment_rejected() {
        let err = Region::acquire(Strategy::AlignedBlock { align: 48 }, 4096).unwrap_err();
        assert!(matches!(err, BackendError::InvalidAlignment(48)));

        let err = Region::acquire(Strategy::AlignedBlock { align: 0 }, 4096).unwrap_err();
        assert!(matches!(err, BackendError::InvalidAlignment(0)));
    }

    #[test]
    fn test_zero_sized_region_rejected() {
        let err = Region::acquire(Strategy::PlainHeap, 0).unwrap_err();
        assert!(matches!(err, BackendError::AllocationFailed(_)));
    }

    #[test]
    fn test_numa_bound_degrades_without_capability() {
        let region =
            Region::acquire_with(Strategy::NumaBound { node: 0 }, 4096, &Capability::FallbackOnly)
                .unwrap();
        assert!(region.is_degraded());
        assert_eq!(region.len(), 4096);
        // Same handle shape: callers can still use it as raw storage.
        assert_eq!(region.base_addr() % CACHE_LINE_SIZE, 0);
    }

    #[test]
    fn test_numa_bound_fatal_when_no_fallback_permitted() {
        let err =
            Region::acquire_with(Strategy::NumaBound { node: 0 }, 4096, &Capability::Unavailable)
                .unwrap_err();
        assert!(matches!(err, BackendError::CapabilityUnavailable(_)));
    }

    #[test]
    fn test_numa_bound_invalid_node() {
        let err = Region::acquire_with(
            Strategy::NumaBound { node: 99 },
            4096,
            &Capability::Available { nodes: 2 },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            BackendError::Numa(crate::numa::NumaError::InvalidNode { node: 99, .. })
        ));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_numa_bound_acquires_on_node_zero() {
        // Node 0 always exists; binding may still run degraded on
        // single-node hosts depending on the probe.
        let cap = Capability::Available { nodes: 1 };
        let mut region =
            Region::acquire_with(Strategy::NumaBound { node: 0 }, 4096, &cap).unwrap();
        region.pre_touch();
        assert_eq!(region.len(), 4096);
    }

    #[test]
    fn test_release_probe_fires_exactly_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut region = Region::acquire(Strategy::FixedPool { align: 64 }, 4096).unwrap();
        let probe = Arc::clone(&count);
        region.on_release(move || {
            probe.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(count.load(Ordering::SeqCst), 0);
        region.release();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_pre_touch_zeroes_storage() {
        let mut region = Region::acquire(Strategy::AlignedBlock { align: 64 }, 1024).unwrap();
        region.pre_touch();
        // SAFETY: just initialized by pre_touch.
        #[allow(unsafe_code)]
        let bytes = unsafe { region.as_slice() };
        assert!(bytes.iter().all(|&b| b == 0));
    }
}
