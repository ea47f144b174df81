//! The allocator contract and its companion traits
//!
//! Every strategy implements the same object-safe [`Allocator`] trait, so a
//! `&dyn Allocator` can be handed to any component as "the place memory
//! comes from" without naming a concrete strategy. Requests are described
//! by [`core::alloc::Layout`]; success returns `NonNull<[u8]>` covering the
//! usable bytes; exhaustion is an [`AllocError`], never a panic. Panics are
//! reserved for caller contract violations, which each strategy documents.
//!
//! No trait method takes `&mut self`: strategies use interior mutability
//! (`Cell`) and are `!Sync`, so the compiler rejects sharing one instance
//! across threads. External synchronization, if wanted, wraps the whole
//! strategy.

use core::alloc::Layout;
use core::ptr::{self, NonNull};

use crate::error::{AllocError, AllocResult};

/// Borrowed allocator handle, the usual "backing allocator" parameter type
pub type AllocatorRef<'a> = &'a dyn Allocator;

/// Core allocation contract
///
/// # Safety
///
/// Implementations must return memory that is valid for reads and writes
/// for `layout.size()` bytes at `layout.align()` alignment, and must not
/// hand out overlapping ranges to live allocations. Callers must pass each
/// pointer back to the instance that produced it, with the layout it was
/// produced under.
pub unsafe trait Allocator {
    /// Allocate a block described by `layout`
    ///
    /// # Safety
    /// The returned block is uninitialized. The caller must not use it
    /// past a call that invalidates it (`deallocate`, `reset`, or dropping
    /// the strategy).
    unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>>;

    /// Allocate a zero-filled block
    ///
    /// # Safety
    /// Same as [`Allocator::allocate`].
    unsafe fn allocate_zeroed(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        let block = unsafe { self.allocate(layout)? };
        // SAFETY: block was just allocated with at least layout.size() bytes
        unsafe {
            ptr::write_bytes(block.cast::<u8>().as_ptr(), 0, layout.size());
        }
        Ok(block)
    }

    /// Release a block previously returned by this instance
    ///
    /// # Safety
    /// `ptr` must come from this instance's `allocate` with this `layout`
    /// and must not have been released already.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);

    /// Resize a block, moving it if necessary
    ///
    /// The default grabs a new block, copies `min(old, new)` bytes and
    /// releases the old one. Alignment must not change between the two
    /// layouts; changing it is a contract violation and panics.
    ///
    /// # Safety
    /// `ptr` must come from this instance's `allocate` with `old_layout`.
    /// On success the old pointer is invalid; on error it is untouched.
    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> AllocResult<NonNull<[u8]>> {
        assert_eq!(
            old_layout.align(),
            new_layout.align(),
            "reallocate must keep the original alignment"
        );

        if new_layout.size() == old_layout.size() {
            return Ok(NonNull::slice_from_raw_parts(ptr, old_layout.size()));
        }
        if new_layout.size() == 0 {
            // SAFETY: caller contract, ptr belongs to this instance
            unsafe { self.deallocate(ptr, old_layout) };
            let dangling = NonNull::new(new_layout.align() as *mut u8)
                .ok_or(AllocError::InvalidLayout("zero alignment"))?;
            return Ok(NonNull::slice_from_raw_parts(dangling, 0));
        }

        let new_block = unsafe { self.allocate(new_layout)? };
        let copy_len = old_layout.size().min(new_layout.size());
        // SAFETY: both blocks are valid for copy_len bytes and distinct
        unsafe {
            ptr::copy_nonoverlapping(ptr.as_ptr(), new_block.cast::<u8>().as_ptr(), copy_len);
            self.deallocate(ptr, old_layout);
        }
        Ok(new_block)
    }
}

/// Bulk release: discard every live allocation at once
///
/// Maps to the contract's "free all" operation. Strategies that cannot
/// implement it meaningfully report `can_reset() == false` and make
/// `reset` a no-op.
pub trait Resettable {
    /// Invalidate every outstanding allocation and restore initial state
    ///
    /// # Safety
    /// The caller must not use any pointer obtained from this instance
    /// after the call.
    unsafe fn reset(&self);

    /// Whether `reset` actually reclaims anything
    fn can_reset(&self) -> bool {
        true
    }
}

/// Per-instance usage diagnostics
///
/// Counters cover this instance only; there is no process-wide aggregation.
pub trait MemoryUsage {
    /// Bytes currently handed out (including per-allocation overhead where
    /// the strategy tracks it)
    fn used_memory(&self) -> usize;

    /// Bytes still available, when the strategy has a fixed capacity
    fn available_memory(&self) -> Option<usize> {
        None
    }

    /// Total capacity, when fixed
    fn total_memory(&self) -> Option<usize> {
        None
    }
}

// Contract values are usually passed around as borrows; forward the whole
// contract through references.

unsafe impl<T: Allocator + ?Sized> Allocator for &T {
    unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        unsafe { (**self).allocate(layout) }
    }

    unsafe fn allocate_zeroed(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        unsafe { (**self).allocate_zeroed(layout) }
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { (**self).deallocate(ptr, layout) }
    }

    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> AllocResult<NonNull<[u8]>> {
        unsafe { (**self).reallocate(ptr, old_layout, new_layout) }
    }
}

impl<T: Resettable + ?Sized> Resettable for &T {
    unsafe fn reset(&self) {
        unsafe { (**self).reset() }
    }

    fn can_reset(&self) -> bool {
        (**self).can_reset()
    }
}

impl<T: MemoryUsage + ?Sized> MemoryUsage for &T {
    fn used_memory(&self) -> usize {
        (**self).used_memory()
    }

    fn available_memory(&self) -> Option<usize> {
        (**self).available_memory()
    }

    fn total_memory(&self) -> Option<usize> {
        (**self).total_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::HeapAllocator;

    #[test]
    fn trait_object_round_trip() {
        let heap = HeapAllocator::new();
        let alloc: &dyn Allocator = &heap;

        unsafe {
            let layout = Layout::from_size_align(64, 16).unwrap();
            let block = alloc.allocate(layout).expect("allocation failed");
            assert!(block.len() >= 64);
            assert_eq!(block.cast::<u8>().as_ptr() as usize % 16, 0);
            alloc.deallocate(block.cast(), layout);
        }
    }

    #[test]
    fn default_zeroed_fills() {
        let heap = HeapAllocator::new();

        unsafe {
            let layout = Layout::from_size_align(32, 8).unwrap();
            let block = heap.allocate_zeroed(layout).expect("allocation failed");
            let bytes = core::slice::from_raw_parts(block.cast::<u8>().as_ptr(), 32);
            assert!(bytes.iter().all(|&b| b == 0));
            heap.deallocate(block.cast(), layout);
        }
    }

    // Forwards allocate/deallocate only, so reallocate runs the trait
    // default rather than the heap's realloc fast path.
    struct NoFastPath(HeapAllocator);

    unsafe impl Allocator for NoFastPath {
        unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
            unsafe { self.0.allocate(layout) }
        }

        unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
            unsafe { self.0.deallocate(ptr, layout) }
        }
    }

    #[test]
    fn default_reallocate_copies_prefix() {
        let alloc = NoFastPath(HeapAllocator::new());

        unsafe {
            let old = Layout::from_size_align(16, 8).unwrap();
            let new = Layout::from_size_align(48, 8).unwrap();

            let block = alloc.allocate(old).expect("allocation failed");
            for i in 0..16 {
                *block.cast::<u8>().as_ptr().add(i) = i as u8;
            }

            let grown = alloc
                .reallocate(block.cast(), old, new)
                .expect("reallocate failed");
            for i in 0..16 {
                assert_eq!(*grown.cast::<u8>().as_ptr().add(i), i as u8);
            }
            alloc.deallocate(grown.cast(), new);
        }
    }

    #[test]
    #[should_panic(expected = "original alignment")]
    fn default_reallocate_rejects_align_change() {
        let alloc = NoFastPath(HeapAllocator::new());

        unsafe {
            let old = Layout::from_size_align(16, 8).unwrap();
            let new = Layout::from_size_align(32, 16).unwrap();
            let block = alloc.allocate(old).expect("allocation failed");
            let _ = alloc.reallocate(block.cast(), old, new);
        }
    }
}
