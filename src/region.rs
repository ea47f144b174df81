//! Raw byte range owned by an allocation strategy
//!
//! Every strategy operates on exactly one [`RawRegion`]: a pointer plus a
//! length, with no drop glue. Ownership and borrow discipline live in the
//! strategy types; the region itself is a plain value.

use core::ptr::NonNull;

/// A contiguous, exclusively owned byte range
///
/// Invariant: `ptr..ptr + len` is valid for reads and writes for as long
/// as the strategy holding the region lives.
#[derive(Debug, Clone, Copy)]
pub struct RawRegion {
    ptr: NonNull<u8>,
    len: usize,
}

impl RawRegion {
    /// Region over a caller-provided buffer
    ///
    /// The `&mut` borrow guarantees exclusivity; the caller keeps the
    /// buffer alive for the strategy's lifetime (enforced by the strategy's
    /// lifetime parameter, not by this type).
    #[inline]
    pub fn from_mut_slice(buf: &mut [u8]) -> Self {
        RawRegion {
            // slices are never null
            ptr: unsafe { NonNull::new_unchecked(buf.as_mut_ptr()) },
            len: buf.len(),
        }
    }

    /// Region over raw parts
    ///
    /// # Safety
    /// `ptr..ptr + len` must be valid for reads and writes and not aliased
    /// while the region is in use.
    #[inline]
    pub unsafe fn from_raw_parts(ptr: NonNull<u8>, len: usize) -> Self {
        RawRegion { ptr, len }
    }

    /// Base pointer
    #[inline]
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Length in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the region spans zero bytes
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Address of the first byte
    #[inline]
    pub fn start_addr(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    /// Address one past the last byte
    #[inline]
    pub fn end_addr(&self) -> usize {
        self.start_addr() + self.len
    }

    /// Whether `addr` falls inside the region
    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.start_addr() && addr < self.end_addr()
    }

    /// Pointer to the byte at `addr`, which must lie within the region
    /// (`end_addr` itself is allowed as a one-past-the-end pointer)
    #[inline]
    pub fn ptr_at(&self, addr: usize) -> *mut u8 {
        debug_assert!(addr >= self.start_addr() && addr <= self.end_addr());
        // offset from the base pointer to keep provenance
        unsafe { self.ptr.as_ptr().add(addr - self.start_addr()) }
    }
}
