//! Alignment arithmetic shared by every strategy
//!
//! All helpers operate on plain `usize` addresses; callers derive addresses
//! from a [`RawRegion`](crate::region::RawRegion) and convert back to
//! pointers afterwards, keeping provenance with the original region pointer.

/// Machine word size in bytes
pub const WORD_SIZE: usize = core::mem::size_of::<usize>();

/// Default alignment for strategy-owned buffers: two machine words,
/// matching `max_align_t` on common 64-bit targets
pub const DEFAULT_ALIGNMENT: usize = 2 * WORD_SIZE;

/// Check if a value is a power of two
#[inline(always)]
pub const fn is_power_of_two(n: usize) -> bool {
    n != 0 && (n & (n - 1)) == 0
}

/// Round `addr` up to the next multiple of `align`
///
/// `align` must be a power of two. Wraps on overflow in release builds;
/// strategies bound their inputs so the wrapped case is unreachable.
#[inline(always)]
pub const fn align_up(addr: usize, align: usize) -> usize {
    debug_assert!(is_power_of_two(align));
    (addr + align - 1) & !(align - 1)
}

/// Round `addr` down to the previous multiple of `align`
#[inline(always)]
pub const fn align_down(addr: usize, align: usize) -> usize {
    debug_assert!(is_power_of_two(align));
    addr & !(align - 1)
}

/// Check whether `addr` is a multiple of `align`
#[inline(always)]
pub const fn is_aligned(addr: usize, align: usize) -> bool {
    debug_assert!(is_power_of_two(align));
    addr & (align - 1) == 0
}

/// Bytes needed to advance `addr` to the next `align` boundary
#[inline(always)]
pub const fn padding_needed(addr: usize, align: usize) -> usize {
    align_up(addr, align) - addr
}
