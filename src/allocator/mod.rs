//! Allocation strategies behind one contract
//!
//! Strategy choice is an explicit, local decision: code that needs memory
//! takes an [`AllocatorRef`] and never assumes which strategy is behind it.

mod arena;
mod freelist;
mod header;
mod heap;
mod pool;
mod scratch;
mod traits;

pub use arena::{Arena, ArenaCheckpoint};
pub use freelist::FreeList;
pub use heap::HeapAllocator;
pub use pool::Pool;
pub use scratch::Scratch;
pub use traits::{Allocator, AllocatorRef, MemoryUsage, Resettable};

use core::alloc::Layout;
use core::ptr::NonNull;

/// A buffer obtained from a backing allocator, returned on drop
///
/// Strategies that own their buffer (rather than borrowing a caller slice)
/// hold one of these so the buffer goes back to wherever it came from.
pub(crate) struct BackingAllocation<'a> {
    alloc: AllocatorRef<'a>,
    ptr: NonNull<u8>,
    layout: Layout,
}

impl<'a> BackingAllocation<'a> {
    pub(crate) fn new(alloc: AllocatorRef<'a>, ptr: NonNull<u8>, layout: Layout) -> Self {
        BackingAllocation { alloc, ptr, layout }
    }
}

impl Drop for BackingAllocation<'_> {
    fn drop(&mut self) {
        // SAFETY: ptr was allocated from self.alloc with self.layout and
        // the owning strategy has invalidated all pointers into it
        unsafe { self.alloc.deallocate(self.ptr, self.layout) }
    }
}
