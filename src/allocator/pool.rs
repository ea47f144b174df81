//! Pool strategy: fixed-size blocks, constant-time alloc and free
//!
//! A [`Pool`] carves one buffer into equally sized slots and threads the
//! free ones into an intrusive singly linked list whose link word lives in
//! the slot itself, so the pool needs no side storage. Every request must
//! match the configured block size and alignment exactly.

use core::alloc::Layout;
use core::cell::Cell;
use core::ptr::{self, NonNull};

use crate::allocator::traits::{Allocator, AllocatorRef, MemoryUsage, Resettable};
use crate::allocator::BackingAllocation;
use crate::error::{AllocError, AllocResult};
use crate::region::RawRegion;
use crate::utils::{align_up, is_power_of_two, DEFAULT_ALIGNMENT, WORD_SIZE};

/// Link word stored inside a free slot; null terminates the chain
#[repr(C)]
struct FreeBlock {
    next: *mut FreeBlock,
}

/// Fixed-block allocator over a buffer taken from a backing allocator
///
/// Allocate pops the chain head, deallocate pushes onto it, both Θ(1);
/// the most recently freed block is handed out first. State lives in
/// `Cell`s; the type is `!Sync`.
pub struct Pool<'a> {
    region: RawRegion,
    block_size: usize,
    block_align: usize,
    block_count: usize,
    stride: usize,
    free_head: Cell<*mut FreeBlock>,
    free_blocks: Cell<usize>,
    _backing: BackingAllocation<'a>,
}

impl<'a> Pool<'a> {
    /// Pool of `block_count` blocks of `block_size` bytes at the default
    /// alignment
    pub fn new(
        backing: AllocatorRef<'a>,
        block_count: usize,
        block_size: usize,
    ) -> AllocResult<Self> {
        Self::with_alignment(backing, block_count, block_size, DEFAULT_ALIGNMENT)
    }

    /// Pool with an explicit block alignment
    ///
    /// Each slot reserves `block_size + block_align` bytes, rounded so
    /// every block start satisfies both `block_align` and the word
    /// alignment the free-chain link needs.
    pub fn with_alignment(
        backing: AllocatorRef<'a>,
        block_count: usize,
        block_size: usize,
        block_align: usize,
    ) -> AllocResult<Self> {
        if block_count == 0 {
            return Err(AllocError::InvalidLayout("pool needs at least one block"));
        }
        if !is_power_of_two(block_align) {
            return Err(AllocError::InvalidLayout(
                "block alignment must be a power of two",
            ));
        }
        if block_size < core::mem::size_of::<*mut u8>() {
            return Err(AllocError::InvalidLayout(
                "block size too small to hold a free-chain link",
            ));
        }

        let slot_align = block_align.max(WORD_SIZE);
        let stride = block_size
            .checked_add(block_align)
            .map(|n| align_up(n, slot_align))
            .ok_or(AllocError::SizeOverflow)?;
        let total = stride
            .checked_mul(block_count)
            .ok_or(AllocError::SizeOverflow)?;
        let layout =
            Layout::from_size_align(total, slot_align).map_err(|_| AllocError::SizeOverflow)?;

        // SAFETY: layout is valid; the block is owned by this pool until drop
        let block = unsafe { backing.allocate(layout)? };
        let buf = block.cast::<u8>();
        let pool = Pool {
            // SAFETY: block is valid for total bytes, exclusively ours
            region: unsafe { RawRegion::from_raw_parts(buf, total) },
            block_size,
            block_align,
            block_count,
            stride,
            free_head: Cell::new(ptr::null_mut()),
            free_blocks: Cell::new(0),
            _backing: BackingAllocation::new(backing, buf, layout),
        };
        unsafe { pool.thread_all_blocks() };
        tracing::trace!(block_count, block_size, block_align, "pool created");
        Ok(pool)
    }

    /// Size of every block in bytes
    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Total number of blocks
    #[inline]
    pub fn block_count(&self) -> usize {
        self.block_count
    }

    /// Blocks currently free
    #[inline]
    pub fn free_blocks(&self) -> usize {
        self.free_blocks.get()
    }

    // SAFETY: every block must be dead; rebuilds the chain front to back
    unsafe fn thread_all_blocks(&self) {
        let start = self.region.start_addr();
        let mut head: *mut FreeBlock = ptr::null_mut();
        for i in (0..self.block_count).rev() {
            let slot = self.region.ptr_at(start + i * self.stride).cast::<FreeBlock>();
            unsafe { (*slot).next = head };
            head = slot;
        }
        self.free_head.set(head);
        self.free_blocks.set(self.block_count);
    }
}

unsafe impl Allocator for Pool<'_> {
    unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        assert_eq!(
            layout.size(),
            self.block_size,
            "pool allocation size must match the block size"
        );
        assert_eq!(
            layout.align(),
            self.block_align,
            "pool allocation alignment must match the block alignment"
        );

        let head = self.free_head.get();
        if head.is_null() {
            tracing::warn!(
                block_count = self.block_count,
                block_size = self.block_size,
                "pool exhausted"
            );
            return Err(AllocError::PoolExhausted {
                block_size: self.block_size,
                block_count: self.block_count,
            });
        }

        // SAFETY: head is a live free slot written by this pool
        self.free_head.set(unsafe { (*head).next });
        self.free_blocks.set(self.free_blocks.get() - 1);

        // SAFETY: slots are inside the region, hence non-null
        let ptr = unsafe { NonNull::new_unchecked(head.cast::<u8>()) };
        Ok(NonNull::slice_from_raw_parts(ptr, self.block_size))
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        assert_eq!(
            layout.size(),
            self.block_size,
            "pool deallocation size must match the block size"
        );
        assert_eq!(
            layout.align(),
            self.block_align,
            "pool deallocation alignment must match the block alignment"
        );

        let addr = ptr.as_ptr() as usize;
        assert!(
            self.region.contains(addr),
            "pointer does not belong to this pool"
        );
        assert_eq!(
            (addr - self.region.start_addr()) % self.stride,
            0,
            "pointer is not a block start"
        );

        let slot = ptr.as_ptr().cast::<FreeBlock>();
        // SAFETY: slot is a block start inside the region and now dead
        unsafe { (*slot).next = self.free_head.get() };
        self.free_head.set(slot);
        self.free_blocks.set(self.free_blocks.get() + 1);
    }

    unsafe fn reallocate(
        &self,
        _ptr: NonNull<u8>,
        _old_layout: Layout,
        _new_layout: Layout,
    ) -> AllocResult<NonNull<[u8]>> {
        panic!("pool blocks cannot be resized");
    }
}

impl Resettable for Pool<'_> {
    unsafe fn reset(&self) {
        unsafe { self.thread_all_blocks() };
        tracing::trace!(block_count = self.block_count, "pool reset");
    }
}

impl MemoryUsage for Pool<'_> {
    fn used_memory(&self) -> usize {
        (self.block_count - self.free_blocks.get()) * self.block_size
    }

    fn available_memory(&self) -> Option<usize> {
        Some(self.free_blocks.get() * self.block_size)
    }

    fn total_memory(&self) -> Option<usize> {
        Some(self.block_count * self.block_size)
    }
}
