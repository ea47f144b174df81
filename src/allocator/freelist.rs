//! Free-list strategy: general allocation inside a fixed buffer
//!
//! A [`FreeList`] threads unused ranges of its buffer into an
//! address-ordered chain of [`FreeNode`]s stored in the memory itself.
//! Allocation is a first-fit walk; deallocation re-links the span and
//! coalesces with adjacent free ranges, so the chain never contains two
//! nodes that touch.

use core::alloc::Layout;
use core::cell::Cell;
use core::marker::PhantomData;
use core::ptr::{self, NonNull};

use crate::allocator::header::{find_header, write_header, HEADER_SIZE};
use crate::allocator::traits::{Allocator, AllocatorRef, MemoryUsage, Resettable};
use crate::allocator::BackingAllocation;
use crate::error::{AllocError, AllocResult};
use crate::region::RawRegion;
use crate::utils::{align_up, DEFAULT_ALIGNMENT, WORD_SIZE};

/// Unused range descriptor, stored in the range it describes
///
/// `size` covers the node itself. Nodes are word-aligned; the chain is
/// sorted by address and never contains adjacent ranges.
#[repr(C)]
struct FreeNode {
    size: usize,
    next: *mut FreeNode,
}

/// Smallest range worth keeping as a separate node
const MIN_NODE: usize = core::mem::size_of::<FreeNode>();

/// First-fit allocator over a fixed buffer
///
/// Each live allocation carries a one-word header recording the carved
/// span, so [`FreeList::deallocate`] needs only the payload pointer to
/// return the exact range to the chain. State lives in `Cell`s; the type
/// is `!Sync`.
pub struct FreeList<'a> {
    region: RawRegion,
    head: Cell<*mut FreeNode>,
    used: Cell<usize>,
    live: Cell<usize>,
    backing: Option<BackingAllocation<'a>>,
    _buf: PhantomData<&'a mut [u8]>,
}

impl<'a> FreeList<'a> {
    /// Free list over a caller-provided buffer
    ///
    /// The usable range starts at the first word-aligned byte of `buf`;
    /// fails if what remains cannot hold a single free node.
    pub fn from_slice(buf: &'a mut [u8]) -> AllocResult<Self> {
        let raw = RawRegion::from_mut_slice(buf);
        let start = align_up(raw.start_addr(), WORD_SIZE);
        let end = raw.end_addr();
        if start >= end || end - start < MIN_NODE {
            return Err(AllocError::InvalidLayout(
                "free list buffer too small for a free node",
            ));
        }
        // SAFETY: start..end is a sub-range of the caller's buffer
        let region = unsafe {
            RawRegion::from_raw_parts(NonNull::new_unchecked(raw.ptr_at(start)), end - start)
        };
        let list = FreeList {
            region,
            head: Cell::new(ptr::null_mut()),
            used: Cell::new(0),
            live: Cell::new(0),
            backing: None,
            _buf: PhantomData,
        };
        unsafe { list.thread_initial_node() };
        tracing::trace!(capacity = region.len(), "free list created over caller buffer");
        Ok(list)
    }

    /// Free list over a buffer taken from `backing`, returned on drop
    pub fn with_capacity(backing: AllocatorRef<'a>, capacity: usize) -> AllocResult<Self> {
        if capacity < MIN_NODE {
            return Err(AllocError::InvalidLayout(
                "free list buffer too small for a free node",
            ));
        }
        let layout = Layout::from_size_align(capacity, DEFAULT_ALIGNMENT)
            .map_err(|_| AllocError::SizeOverflow)?;
        let block = unsafe { backing.allocate(layout)? };
        let ptr = block.cast::<u8>();
        let list = FreeList {
            // SAFETY: block is valid for capacity bytes, exclusively ours
            region: unsafe { RawRegion::from_raw_parts(ptr, capacity) },
            head: Cell::new(ptr::null_mut()),
            used: Cell::new(0),
            live: Cell::new(0),
            backing: Some(BackingAllocation::new(backing, ptr, layout)),
            _buf: PhantomData,
        };
        unsafe { list.thread_initial_node() };
        tracing::trace!(capacity, "free list created from backing allocator");
        Ok(list)
    }

    /// Total managed bytes
    #[inline]
    pub fn capacity(&self) -> usize {
        self.region.len()
    }

    /// Number of live allocations
    #[inline]
    pub fn live_allocations(&self) -> usize {
        self.live.get()
    }

    // SAFETY: region must be unused (fresh or post-reset)
    unsafe fn thread_initial_node(&self) {
        let node = self.region.ptr_at(self.region.start_addr()).cast::<FreeNode>();
        unsafe {
            (*node).size = self.region.len();
            (*node).next = ptr::null_mut();
        }
        self.head.set(node);
    }
}

unsafe impl Allocator for FreeList<'_> {
    unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        let size = layout.size();
        let align = layout.align();
        if size == 0 {
            let dangling = unsafe { NonNull::new_unchecked(align as *mut u8) };
            return Ok(NonNull::slice_from_raw_parts(dangling, 0));
        }

        // Worst-case span: header, room to align the payload, payload.
        // Rounded to the word so carved-off remainder nodes stay aligned.
        let total = HEADER_SIZE
            .checked_add(align)
            .and_then(|n| n.checked_add(size))
            .map(|n| align_up(n, WORD_SIZE))
            .ok_or(AllocError::SizeOverflow)?;

        let mut prev: *mut FreeNode = ptr::null_mut();
        let mut curr = self.head.get();
        while !curr.is_null() {
            // SAFETY: curr points into our region, written by this list
            let node_size = unsafe { (*curr).size };
            if node_size < total {
                prev = curr;
                curr = unsafe { (*curr).next };
                continue;
            }

            // A remainder too small for a node goes with the allocation.
            let consumed = if node_size - total < MIN_NODE {
                node_size
            } else {
                total
            };

            let next = unsafe { (*curr).next };
            let replacement = if consumed == node_size {
                next
            } else {
                // Split: the tail of this node stays free.
                let rest = unsafe { curr.cast::<u8>().add(total).cast::<FreeNode>() };
                unsafe {
                    (*rest).size = node_size - total;
                    (*rest).next = next;
                }
                rest
            };
            if prev.is_null() {
                self.head.set(replacement);
            } else {
                unsafe { (*prev).next = replacement };
            }

            let header = curr.cast::<usize>();
            let payload_addr = align_up(header as usize + HEADER_SIZE, align);
            let payload = self.region.ptr_at(payload_addr);
            // SAFETY: header and payload are word-aligned inside the span
            unsafe { write_header(header, payload, consumed) };

            self.used.set(self.used.get() + consumed);
            self.live.set(self.live.get() + 1);

            // SAFETY: payload is inside the region, hence non-null
            let ptr = unsafe { NonNull::new_unchecked(payload) };
            return Ok(NonNull::slice_from_raw_parts(ptr, size));
        }

        tracing::warn!(requested = total, used = self.used.get(), "free list exhausted");
        Err(AllocError::FreeListExhausted { requested: total })
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() == 0 {
            return;
        }
        let addr = ptr.as_ptr() as usize;
        assert!(
            self.region.contains(addr),
            "pointer does not belong to this free list"
        );

        // SAFETY: caller contract, ptr came from allocate on this list
        let header = unsafe { find_header(ptr.as_ptr()) };
        let span = unsafe { *header };
        let block_start = header as usize;
        let block_end = block_start + span;

        // Find the insertion point: prev ends up as the last node below
        // the span, curr as the first node at or above its end.
        let mut prev: *mut FreeNode = ptr::null_mut();
        let mut curr = self.head.get();
        while !curr.is_null() && (curr as usize) < block_end {
            prev = curr;
            curr = unsafe { (*curr).next };
        }

        let node;
        if prev.is_null() {
            node = block_start as *mut FreeNode;
            unsafe {
                (*node).size = span;
                (*node).next = curr;
            }
            self.head.set(node);
        } else if (prev as usize) + unsafe { (*prev).size } == block_start {
            // Backward merge into the predecessor.
            unsafe { (*prev).size += span };
            node = prev;
        } else {
            node = block_start as *mut FreeNode;
            unsafe {
                (*node).size = span;
                (*node).next = curr;
                (*prev).next = node;
            }
        }

        // Forward merge with the successor when the ranges touch.
        if !curr.is_null() && (curr as usize) == block_end {
            unsafe {
                (*node).size += (*curr).size;
                (*node).next = (*curr).next;
            }
        }

        self.used.set(self.used.get() - span);
        self.live.set(self.live.get() - 1);
    }
}

impl Resettable for FreeList<'_> {
    unsafe fn reset(&self) {
        unsafe { self.thread_initial_node() };
        self.used.set(0);
        self.live.set(0);
        tracing::trace!(capacity = self.region.len(), "free list reset");
    }
}

impl MemoryUsage for FreeList<'_> {
    fn used_memory(&self) -> usize {
        self.used.get()
    }

    fn available_memory(&self) -> Option<usize> {
        Some(self.region.len() - self.used.get())
    }

    fn total_memory(&self) -> Option<usize> {
        Some(self.region.len())
    }
}
