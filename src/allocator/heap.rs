//! General-purpose heap strategy
//!
//! Stateless passthrough to the platform allocator. This is the fallback
//! strategy and the usual backing allocator for the fixed-buffer ones.

use core::alloc::Layout;
use core::ptr::NonNull;
use std::alloc::{GlobalAlloc, System};

use crate::allocator::traits::{Allocator, MemoryUsage, Resettable};
use crate::error::{AllocError, AllocResult};

/// Platform heap behind the allocator contract
///
/// Carries no state, so unlike the fixed-buffer strategies it is `Send`
/// and `Sync` and one instance can serve the whole process.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapAllocator;

impl HeapAllocator {
    /// Create a heap allocator
    #[inline]
    pub const fn new() -> Self {
        HeapAllocator
    }

    fn dangling(layout: Layout) -> NonNull<[u8]> {
        // align is a power of two, hence non-zero
        let ptr = unsafe { NonNull::new_unchecked(layout.align() as *mut u8) };
        NonNull::slice_from_raw_parts(ptr, 0)
    }
}

unsafe impl Allocator for HeapAllocator {
    unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        if layout.size() == 0 {
            return Ok(Self::dangling(layout));
        }

        // SAFETY: layout has non-zero size
        let raw = unsafe { System.alloc(layout) };
        match NonNull::new(raw) {
            Some(ptr) => Ok(NonNull::slice_from_raw_parts(ptr, layout.size())),
            None => {
                tracing::warn!(
                    size = layout.size(),
                    align = layout.align(),
                    "system allocation failed"
                );
                Err(AllocError::out_of_memory(layout))
            }
        }
    }

    unsafe fn allocate_zeroed(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        if layout.size() == 0 {
            return Ok(Self::dangling(layout));
        }

        // SAFETY: layout has non-zero size
        let raw = unsafe { System.alloc_zeroed(layout) };
        NonNull::new(raw)
            .map(|ptr| NonNull::slice_from_raw_parts(ptr, layout.size()))
            .ok_or_else(|| AllocError::out_of_memory(layout))
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() == 0 {
            return;
        }
        // SAFETY: caller contract, ptr came from this layout
        unsafe { System.dealloc(ptr.as_ptr(), layout) }
    }

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

        if old_layout.size() == 0 {
            return unsafe { self.allocate(new_layout) };
        }
        if new_layout.size() == 0 {
            unsafe { self.deallocate(ptr, old_layout) };
            return Ok(Self::dangling(new_layout));
        }

        // SAFETY: ptr is live under old_layout and sizes are non-zero
        let raw = unsafe { System.realloc(ptr.as_ptr(), old_layout, new_layout.size()) };
        NonNull::new(raw)
            .map(|p| NonNull::slice_from_raw_parts(p, new_layout.size()))
            .ok_or_else(|| AllocError::out_of_memory(new_layout))
    }
}

impl Resettable for HeapAllocator {
    unsafe fn reset(&self) {
        // nothing to reclaim, individual frees only
    }

    fn can_reset(&self) -> bool {
        false
    }
}

impl MemoryUsage for HeapAllocator {
    fn used_memory(&self) -> usize {
        0
    }
}
