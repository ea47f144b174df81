//! Error types for allocation operations
//!
//! Only *recoverable* conditions are expressed as errors: running out of
//! capacity in a fixed-size strategy, or arithmetic overflow while sizing a
//! request. Contract violations (freeing a foreign pointer, resizing a pool
//! block, ending a checkpoint out of order) are programming errors and panic
//! instead of returning an error; see the crate-level documentation.

use core::alloc::Layout;

use thiserror::Error;

/// Result type for allocation operations
pub type AllocResult<T> = Result<T, AllocError>;

/// Recoverable allocation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// The backing system allocator returned null
    #[error("out of memory: requested {size} bytes with alignment {align}")]
    OutOfMemory {
        /// Requested size in bytes
        size: usize,
        /// Requested alignment
        align: usize,
    },

    /// A fixed-capacity arena cannot satisfy the request
    #[error("arena exhausted: requested {requested} bytes, {remaining} remaining")]
    ArenaExhausted {
        /// Bytes requested, including worst-case alignment padding
        requested: usize,
        /// Bytes still unallocated in the arena
        remaining: usize,
    },

    /// A pool has no free blocks left
    #[error("pool exhausted: all {block_count} blocks of {block_size} bytes in use")]
    PoolExhausted {
        /// Size of each block
        block_size: usize,
        /// Total number of blocks in the pool
        block_count: usize,
    },

    /// No free-list node is large enough for the request
    #[error("free list exhausted: no block large enough for {requested} bytes")]
    FreeListExhausted {
        /// Total span needed, including header and alignment padding
        requested: usize,
    },

    /// The scratch ring has no room that would not overlap live allocations
    #[error("scratch ring full: {requested} bytes would overlap in-use region")]
    RingFull {
        /// Span needed, including header and alignment padding
        requested: usize,
    },

    /// A size calculation overflowed
    #[error("allocation size calculation overflowed")]
    SizeOverflow,

    /// Constructor parameters do not describe a usable layout
    #[error("invalid layout: {0}")]
    InvalidLayout(&'static str),
}

impl AllocError {
    /// Out-of-memory error carrying the failed layout's parameters
    #[inline]
    pub fn out_of_memory(layout: Layout) -> Self {
        AllocError::OutOfMemory {
            size: layout.size(),
            align: layout.align(),
        }
    }

    /// True for any exhaustion variant (capacity, not caller error)
    pub fn is_exhausted(&self) -> bool {
        matches!(
            self,
            AllocError::OutOfMemory { .. }
                | AllocError::ArenaExhausted { .. }
                | AllocError::PoolExhausted { .. }
                | AllocError::FreeListExhausted { .. }
                | AllocError::RingFull { .. }
        )
    }
}
