//! Scratch strategy: ring buffer with FIFO-biased reclamation
//!
//! A [`Scratch`] hands out transient blocks from a ring. Two cursors chase
//! each other: allocations advance the alloc cursor, frees mark their
//! header dead and then advance the free cursor past every contiguous dead
//! span. Memory is reclaimed in allocation order, so the ring suits
//! short-lived, roughly-FIFO workloads; a long-lived straggler pins
//! everything allocated after it.

use core::alloc::Layout;
use core::cell::Cell;
use core::marker::PhantomData;
use core::ptr::NonNull;

use crate::allocator::header::{find_header, write_header, FREE_BIT, HEADER_SIZE};
use crate::allocator::traits::{Allocator, MemoryUsage, Resettable};
use crate::error::{AllocError, AllocResult};
use crate::region::RawRegion;
use crate::utils::{align_down, align_up, WORD_SIZE};

/// Ring allocator over a caller-provided buffer
///
/// Headers use the shared in-band format; the header word's high bit marks
/// a span as freed, or as filler written when an allocation wraps past the
/// physical end. Besides the two cursors the ring tracks the occupied byte
/// count, which disambiguates equal cursors (empty vs completely full).
/// State lives in `Cell`s; the type is `!Sync`.
pub struct Scratch<'a> {
    region: RawRegion,
    alloc_cursor: Cell<usize>,
    free_cursor: Cell<usize>,
    occupied: Cell<usize>,
    _buf: PhantomData<&'a mut [u8]>,
}

impl<'a> Scratch<'a> {
    /// Ring over a caller-provided buffer
    ///
    /// The usable range is `buf` trimmed to word boundaries at both ends;
    /// fails if too little remains to hold a header and one word of
    /// payload.
    pub fn from_slice(buf: &'a mut [u8]) -> AllocResult<Self> {
        let raw = RawRegion::from_mut_slice(buf);
        let start = align_up(raw.start_addr(), WORD_SIZE);
        let end = align_down(raw.end_addr(), WORD_SIZE);
        if start >= end || end - start < 2 * HEADER_SIZE {
            return Err(AllocError::InvalidLayout(
                "scratch buffer too small for a header and payload",
            ));
        }
        // SAFETY: start..end is a sub-range of the caller's buffer
        let region = unsafe {
            RawRegion::from_raw_parts(NonNull::new_unchecked(raw.ptr_at(start)), end - start)
        };
        tracing::trace!(capacity = region.len(), "scratch ring created");
        Ok(Scratch {
            region,
            alloc_cursor: Cell::new(start),
            free_cursor: Cell::new(start),
            occupied: Cell::new(0),
            _buf: PhantomData,
        })
    }

    /// Usable ring size in bytes
    #[inline]
    pub fn capacity(&self) -> usize {
        self.region.len()
    }

    /// Whether `addr` falls inside the occupied part of the ring (spans
    /// allocated and not yet reclaimed by the free cursor)
    pub fn is_in_use(&self, addr: usize) -> bool {
        if self.occupied.get() == 0 {
            return false;
        }
        let free = self.free_cursor.get();
        let alloc = self.alloc_cursor.get();
        if alloc > free {
            addr >= free && addr < alloc
        } else {
            addr >= free || addr < alloc
        }
    }

    fn advance_free_cursor(&self) {
        let mut free = self.free_cursor.get();
        let mut occupied = self.occupied.get();
        while occupied > 0 {
            // SAFETY: every occupied position holds a header this ring wrote
            let word = unsafe { *self.region.ptr_at(free).cast::<usize>() };
            if word & FREE_BIT == 0 {
                break;
            }
            let span = word & !FREE_BIT;
            free += span;
            occupied -= span;
            if free == self.region.end_addr() {
                free = self.region.start_addr();
            }
        }
        self.free_cursor.set(free);
        self.occupied.set(occupied);
    }
}

unsafe impl Allocator for Scratch<'_> {
    unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        if layout.size() == 0 {
            let dangling = unsafe { NonNull::new_unchecked(layout.align() as *mut u8) };
            return Ok(NonNull::slice_from_raw_parts(dangling, 0));
        }

        // Word-rounded payload keeps every header word-aligned.
        let size = layout
            .size()
            .checked_add(WORD_SIZE - 1)
            .map(|n| align_down(n, WORD_SIZE))
            .ok_or(AllocError::SizeOverflow)?;
        let align = layout.align();

        // An empty ring restarts at the base; nothing pins the cursors.
        if self.occupied.get() == 0 {
            self.alloc_cursor.set(self.region.start_addr());
            self.free_cursor.set(self.region.start_addr());
        }
        let alloc = self.alloc_cursor.get();
        let free = self.free_cursor.get();
        let occupied = self.occupied.get();
        let full = AllocError::RingFull {
            requested: size + HEADER_SIZE,
        };

        let mut header_addr = alloc;
        let mut payload_addr = align_up(header_addr + HEADER_SIZE, align);
        let mut end = payload_addr
            .checked_add(size)
            .ok_or(AllocError::SizeOverflow)?;

        // Past the physical end: restart at the base, leaving a filler
        // span over the tail. Legal only while the tail is unoccupied.
        let mut filler_span = 0;
        if end > self.region.end_addr() {
            if occupied > 0 && free >= alloc {
                tracing::warn!(requested = size + HEADER_SIZE, "scratch ring full");
                return Err(full);
            }
            filler_span = self.region.end_addr() - alloc;
            header_addr = self.region.start_addr();
            payload_addr = align_up(header_addr + HEADER_SIZE, align);
            end = payload_addr + size;
            if end > self.region.end_addr() {
                tracing::warn!(requested = size + HEADER_SIZE, "request exceeds ring capacity");
                return Err(full);
            }
        }

        // Would the span run into the occupied region?
        let collides = if occupied == 0 {
            false
        } else if free == alloc {
            true // completely full
        } else if header_addr == alloc && free < alloc {
            false // appending with all occupied spans behind the cursor
        } else {
            end > free
        };
        if collides {
            tracing::warn!(requested = size + HEADER_SIZE, "scratch ring full");
            return Err(full);
        }

        // Commit: nothing above mutated state, so a failed request leaves
        // the ring untouched.
        if filler_span > 0 {
            let filler = self.region.ptr_at(alloc).cast::<usize>();
            // SAFETY: the tail holds at least one word and is unoccupied
            unsafe { *filler = filler_span | FREE_BIT };
            self.occupied.set(self.occupied.get() + filler_span);
        }
        let header = self.region.ptr_at(header_addr).cast::<usize>();
        let payload = self.region.ptr_at(payload_addr);
        // SAFETY: header and payload are word-aligned inside the span
        unsafe { write_header(header, payload, end - header_addr) };
        self.occupied.set(self.occupied.get() + (end - header_addr));

        // The alloc cursor never rests on the physical end.
        self.alloc_cursor.set(if end == self.region.end_addr() {
            self.region.start_addr()
        } else {
            end
        });

        // SAFETY: payload is inside the region, hence non-null
        let ptr = unsafe { NonNull::new_unchecked(payload) };
        Ok(NonNull::slice_from_raw_parts(ptr, layout.size()))
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() == 0 {
            return;
        }
        let addr = ptr.as_ptr() as usize;
        assert!(
            self.region.contains(addr),
            "pointer does not belong to this scratch ring"
        );

        // SAFETY: caller contract, ptr came from allocate on this ring
        let header = unsafe { find_header(ptr.as_ptr()) };
        let word = unsafe { *header };
        assert_eq!(word & FREE_BIT, 0, "scratch span already freed");
        unsafe { *header = word | FREE_BIT };

        self.advance_free_cursor();
    }
}

impl Resettable for Scratch<'_> {
    unsafe fn reset(&self) {
        self.alloc_cursor.set(self.region.start_addr());
        self.free_cursor.set(self.region.start_addr());
        self.occupied.set(0);
        tracing::trace!(capacity = self.region.len(), "scratch ring reset");
    }
}

impl MemoryUsage for Scratch<'_> {
    fn used_memory(&self) -> usize {
        self.occupied.get()
    }

    fn available_memory(&self) -> Option<usize> {
        Some(self.region.len() - self.occupied.get())
    }

    fn total_memory(&self) -> Option<usize> {
        Some(self.region.len())
    }
}
