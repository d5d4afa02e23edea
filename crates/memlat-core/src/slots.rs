//! Placement construction and explicit teardown of value sequences.
//!
//! A [`SlotSequence`] carves `count` equal slots out of a [`Region`]'s raw
//! storage at `base + i * stride` and constructs one value per slot in
//! place - no per-object allocator calls, no implicit copies. Teardown is
//! explicit and ordered: [`SlotSequence::destroy_all`] runs each value's
//! drop in construction order before the backing region is released.
//!
//! Double-destroy and use-after-destroy are made unrepresentable rather
//! than runtime-checked: `destroy_all` consumes the sequence, and the
//! sequence borrows the region it was carved from. No liveness bits, no
//! checks in the measured loops.

use std::marker::PhantomData;
use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::backend::{BackendError, Region};
use crate::CACHE_LINE_SIZE;

/// Stride policy for slot layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaddingPolicy {
    /// Slots packed at the value type's natural size and alignment.
    Natural,

    /// Stride rounded up to a cache-line multiple so two adjacent slots'
    /// hot fields never share a line.
    CacheLinePadded,
}

/// An ordered sequence of in-place constructed values inside a [`Region`].
///
/// Slot `i` begins at `base + i * stride`. The sequence mutably borrows the
/// region for its whole lifetime, so the backing storage cannot be released
/// while any constructed value is still reachable.
#[derive(Debug)]
pub struct SlotSequence<'r, T> {
    base: *mut u8,
    stride: usize,
    len: usize,
    _region: PhantomData<&'r mut Region>,
    _values: PhantomData<T>,
}

impl<'r, T> SlotSequence<'r, T> {
    /// Construct `count` values of `T` in place, one per slot.
    ///
    /// `factory(i)` produces the value for slot `i`; it is written directly
    /// into the slot. The stride is the value's natural footprint, rounded
    /// up to a cache line under [`PaddingPolicy::CacheLinePadded`].
    ///
    /// # Errors
    ///
    /// - [`BackendError::PoolExhausted`] when `count * stride` exceeds the
    ///   region (the region never grows; request fewer slots)
    /// - [`BackendError::InvalidAlignment`] when the region's base alignment
    ///   cannot satisfy `T` (or the cache line, for padded layouts)
    /// - [`BackendError::AllocationFailed`] for zero-sized value types
    #[allow(unsafe_code)]
    pub fn construct_all<F>(
        region: &'r mut Region,
        count: usize,
        policy: PaddingPolicy,
        mut factory: F,
    ) -> crate::backend::Result<Self>
    where
        F: FnMut(usize) -> T,
    {
        let size = mem::size_of::<T>();
        if size == 0 {
            return Err(BackendError::AllocationFailed(
                "zero-sized value types have no slots to measure".to_string(),
            ));
        }

        let value_align = mem::align_of::<T>();
        let required_align = match policy {
            PaddingPolicy::Natural => value_align,
            PaddingPolicy::CacheLinePadded => value_align.max(CACHE_LINE_SIZE),
        };
        if region.align() % required_align != 0 {
            return Err(BackendError::InvalidAlignment(region.align()));
        }

        let stride = match policy {
            PaddingPolicy::Natural => size.next_multiple_of(value_align),
            PaddingPolicy::CacheLinePadded => {
                size.next_multiple_of(value_align).next_multiple_of(CACHE_LINE_SIZE)
            }
        };

        let needed = stride.checked_mul(count).ok_or_else(|| {
            BackendError::AllocationFailed(format!("slot layout overflows: {count} x {stride}"))
        })?;
        if needed > region.len() {
            return Err(BackendError::PoolExhausted {
                needed,
                available: region.len(),
            });
        }

        let base = region.as_mut_ptr();
        for i in 0..count {
            // SAFETY: slot i lies within the region (checked above) and is
            // aligned for T because base is aligned and stride is a
            // multiple of T's alignment. write() moves the value in with
            // no drop of the uninitialized destination.
            unsafe {
                base.add(i * stride).cast::<T>().write(factory(i));
            }
        }

        Ok(Self {
            base,
            stride,
            len: count,
            _region: PhantomData,
            _values: PhantomData,
        })
    }

    /// Number of constructed slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the sequence holds no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Distance in bytes between consecutive slot starts.
    #[must_use]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Address of slot `i`, for layout verification.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of range.
    #[must_use]
    pub fn address_of(&self, i: usize) -> usize {
        assert!(i < self.len, "slot index {i} out of range ({})", self.len);
        self.base as usize + i * self.stride
    }

    fn slot_ptr(&self, i: usize) -> *mut T {
        debug_assert!(i < self.len);
        // Pointer arithmetic only; dereferencing is the callers' unsafe.
        self.base.wrapping_add(i * self.stride).cast::<T>()
    }

    /// Reference to the value in slot `i`.
    #[must_use]
    #[allow(unsafe_code)]
    pub fn get(&self, i: usize) -> Option<&T> {
        if i < self.len {
            // SAFETY: slot i was constructed and is still live.
            Some(unsafe { &*self.slot_ptr(i) })
        } else {
            None
        }
    }

    /// Mutable reference to the value in slot `i`.
    #[allow(unsafe_code)]
    pub fn get_mut(&mut self, i: usize) -> Option<&mut T> {
        if i < self.len {
            // SAFETY: slot i was constructed and is still live; &mut self
            // guarantees exclusivity.
            Some(unsafe { &mut *self.slot_ptr(i) })
        } else {
            None
        }
    }

    /// Iterate over the constructed values in slot order.
    #[allow(unsafe_code)]
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        // SAFETY: every index below len holds a live value.
        (0..self.len).map(move |i| unsafe { &*self.slot_ptr(i) })
    }

    /// Tear down every value in construction order, then consume the
    /// sequence.
    ///
    /// Consuming `self` makes double-destroy and use-after-destroy
    /// compile errors instead of documented preconditions.
    #[allow(unsafe_code)]
    pub fn destroy_all(mut self) {
        // SAFETY: all slots are live exactly once here; forget() below
        // prevents the Drop impl from running them a second time.
        unsafe {
            self.drop_values_in_order();
        }
        mem::forget(self);
    }

    /// Drop every constructed value, first to last.
    ///
    /// # Safety
    ///
    /// Callers must guarantee each slot is live and never drop them again.
    #[allow(unsafe_code)]
    unsafe fn drop_values_in_order(&mut self) {
        for i in 0..self.len {
            ptr::drop_in_place(self.slot_ptr(i));
        }
    }
}

impl<T> Drop for SlotSequence<'_, T> {
    fn drop(&mut self) {
        // Teardown also runs on early scenario exits (workload panic), so
        // the harness's release-on-every-path guarantee holds.
        #[allow(unsafe_code)]
        // SAFETY: values are live; destroy_all forgets self before this
        // can run twice.
        unsafe {
            self.drop_values_in_order();
        }
    }
}

/// One cache line holding a single hot counter.
///
/// Two adjacent `PaddedCell`s never share a cache line, which is the whole
/// point: placing each worker's counter in its own line removes the false
/// sharing that unpadded adjacent counters exhibit.
///
/// The counter is a relaxed atomic: no locks and no ordering edges are
/// introduced, so the cache-coherence traffic under measurement is
/// preserved while the disjoint-field updates stay well-defined.
#[repr(C, align(64))]
#[derive(Debug)]
pub struct PaddedCell {
    hot: AtomicU64,
    _pad: [u8; CACHE_LINE_SIZE - mem::size_of::<AtomicU64>()],
}

impl Default for PaddedCell {
    fn default() -> Self {
        Self::new(0)
    }
}

const _: () = assert!(mem::size_of::<PaddedCell>() == CACHE_LINE_SIZE);

impl PaddedCell {
    /// A cell starting at `value`.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self {
            hot: AtomicU64::new(value),
            _pad: [0; CACHE_LINE_SIZE - mem::size_of::<AtomicU64>()],
        }
    }

    /// Add one to the hot counter.
    #[inline]
    pub fn increment(&self) {
        self.hot.fetch_add(1, Ordering::Relaxed);
    }

    /// Current counter value.
    #[inline]
    #[must_use]
    pub fn value(&self) -> u64 {
        self.hot.load(Ordering::Relaxed)
    }
}
