//! Arena strategy: bump allocation with bulk reclamation
//!
//! An [`Arena`] owns one fixed buffer and advances a single offset per
//! allocation. Individual frees are no-ops; memory comes back either all at
//! once via [`Resettable::reset`] or in nested batches via
//! [`ArenaCheckpoint`]. The buffer never grows.

use core::alloc::Layout;
use core::cell::Cell;
use core::marker::PhantomData;
use core::ptr::NonNull;

use crate::allocator::traits::{Allocator, AllocatorRef, MemoryUsage, Resettable};
use crate::allocator::BackingAllocation;
use crate::error::{AllocError, AllocResult};
use crate::region::RawRegion;
use crate::utils::{align_up, DEFAULT_ALIGNMENT};

/// Bump allocator over a fixed buffer
///
/// The buffer is either borrowed from the caller ([`Arena::from_slice`]) or
/// taken from a backing allocator ([`Arena::with_capacity`]) and returned
/// on drop. The offset advances by `size + align` per request, a worst-case
/// bound that keeps the advance independent of the current cursor position.
///
/// State lives in `Cell`s, so an `Arena` is `!Sync`; share one across
/// threads only behind external locking that wraps the whole value.
pub struct Arena<'a> {
    region: RawRegion,
    offset: Cell<usize>,
    peak: Cell<usize>,
    open_checkpoints: Cell<usize>,
    backing: Option<BackingAllocation<'a>>,
    _buf: PhantomData<&'a mut [u8]>,
}

impl<'a> Arena<'a> {
    /// Arena over a caller-provided buffer
    pub fn from_slice(buf: &'a mut [u8]) -> Self {
        let region = RawRegion::from_mut_slice(buf);
        tracing::trace!(capacity = region.len(), "arena created over caller buffer");
        Arena {
            region,
            offset: Cell::new(0),
            peak: Cell::new(0),
            open_checkpoints: Cell::new(0),
            backing: None,
            _buf: PhantomData,
        }
    }

    /// Arena over a buffer taken from `backing`, returned when the arena
    /// is dropped
    ///
    /// Because [`Arena`] itself implements [`Allocator`], `backing` may be
    /// another arena; the lifetime parameter makes the parent outlive the
    /// sub-arena, so cycles cannot form.
    pub fn with_capacity(backing: AllocatorRef<'a>, capacity: usize) -> AllocResult<Self> {
        if capacity == 0 {
            return Err(AllocError::InvalidLayout("arena capacity must be non-zero"));
        }
        let layout = Layout::from_size_align(capacity, DEFAULT_ALIGNMENT)
            .map_err(|_| AllocError::SizeOverflow)?;
        // SAFETY: layout is valid; the block is owned by this arena until drop
        let block = unsafe { backing.allocate(layout)? };
        let ptr = block.cast::<u8>();
        tracing::trace!(capacity, "arena created from backing allocator");
        Ok(Arena {
            // SAFETY: block is valid for capacity bytes, exclusively ours
            region: unsafe { RawRegion::from_raw_parts(ptr, capacity) },
            offset: Cell::new(0),
            peak: Cell::new(0),
            open_checkpoints: Cell::new(0),
            backing: Some(BackingAllocation::new(backing, ptr, layout)),
            _buf: PhantomData,
        })
    }

    /// Total buffer size in bytes
    #[inline]
    pub fn capacity(&self) -> usize {
        self.region.len()
    }

    /// Bytes consumed so far, including alignment reserves
    #[inline]
    pub fn used(&self) -> usize {
        self.offset.get()
    }

    /// High-water mark of [`Arena::used`] over the arena's lifetime
    #[inline]
    pub fn peak_usage(&self) -> usize {
        self.peak.get()
    }

    /// Bytes a single allocation at `align` could still get
    pub fn remaining(&self, align: usize) -> usize {
        let cursor = self.region.start_addr() + self.offset.get();
        self.region.end_addr().saturating_sub(align_up(cursor, align))
    }

    /// Capture the current offset for later rollback
    ///
    /// Checkpoints nest; they must be ended (or dropped) innermost-first.
    pub fn checkpoint(&self) -> ArenaCheckpoint<'_, 'a> {
        self.open_checkpoints.set(self.open_checkpoints.get() + 1);
        ArenaCheckpoint {
            arena: self,
            saved_offset: self.offset.get(),
        }
    }

    /// Number of checkpoints currently open
    #[inline]
    pub fn open_checkpoints(&self) -> usize {
        self.open_checkpoints.get()
    }
}

unsafe impl Allocator for Arena<'_> {
    unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        let size = layout.size();
        let align = layout.align();
        if size == 0 {
            let dangling = unsafe { NonNull::new_unchecked(align as *mut u8) };
            return Ok(NonNull::slice_from_raw_parts(dangling, 0));
        }

        // Reserve size + align so the advance never depends on how the
        // cursor happens to be aligned.
        let worst = size.checked_add(align).ok_or(AllocError::SizeOverflow)?;
        let offset = self.offset.get();
        let remaining = self.region.len() - offset;
        if worst > remaining {
            tracing::warn!(requested = worst, remaining, "arena exhausted");
            return Err(AllocError::ArenaExhausted {
                requested: worst,
                remaining,
            });
        }

        let cursor = self.region.start_addr() + offset;
        let addr = align_up(cursor, align);
        self.offset.set(offset + worst);
        if self.offset.get() > self.peak.get() {
            self.peak.set(self.offset.get());
        }

        // SAFETY: addr + size stays within the region because
        // offset + worst <= len and addr <= cursor + align - 1
        let ptr = unsafe { NonNull::new_unchecked(self.region.ptr_at(addr)) };
        Ok(NonNull::slice_from_raw_parts(ptr, size))
    }

    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {
        // individual frees are no-ops; use reset or a checkpoint
    }
}

impl Resettable for Arena<'_> {
    unsafe fn reset(&self) {
        // Unconditional: checkpoints are a caller convention, not a lock.
        self.offset.set(0);
        tracing::trace!(capacity = self.region.len(), "arena reset");
    }
}

impl MemoryUsage for Arena<'_> {
    fn used_memory(&self) -> usize {
        self.offset.get()
    }

    fn available_memory(&self) -> Option<usize> {
        Some(self.region.len() - self.offset.get())
    }

    fn total_memory(&self) -> Option<usize> {
        Some(self.region.len())
    }
}

impl Drop for Arena<'_> {
    fn drop(&mut self) {
        // Reachable only via mem::forget on a checkpoint; the borrow in
        // ArenaCheckpoint otherwise keeps the arena alive.
        assert_eq!(
            self.open_checkpoints.get(),
            0,
            "arena dropped with open checkpoints"
        );
    }
}

/// Saved arena position, rolled back on [`end`](ArenaCheckpoint::end) or drop
///
/// Everything allocated after [`Arena::checkpoint`] is invalidated when the
/// checkpoint ends. Nested checkpoints must end innermost-first.
#[must_use = "a checkpoint rolls back when dropped; bind it to a named variable"]
pub struct ArenaCheckpoint<'c, 'a> {
    arena: &'c Arena<'a>,
    saved_offset: usize,
}

impl ArenaCheckpoint<'_, '_> {
    /// Roll the arena back to the saved position
    pub fn end(self) {
        // Drop does the work.
    }
}

impl Drop for ArenaCheckpoint<'_, '_> {
    fn drop(&mut self) {
        let arena = self.arena;
        assert!(
            arena.open_checkpoints.get() > 0,
            "checkpoint ended after the arena was reset underneath it"
        );
        assert!(
            arena.offset.get() >= self.saved_offset,
            "checkpoints must end innermost-first"
        );
        arena.offset.set(self.saved_offset);
        arena.open_checkpoints.set(arena.open_checkpoints.get() - 1);
    }
}
