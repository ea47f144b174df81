//! Composable memory-allocation strategies behind a single contract
//!
//! Code that needs memory takes an [`AllocatorRef`] and never assumes
//! which strategy is behind it; the caller picks the strategy that fits
//! the allocation pattern and wires it in explicitly:
//!
//! - [`HeapAllocator`] — passthrough to the platform heap, the fallback.
//! - [`Arena`] — bump allocation, bulk reclamation, nested
//!   [checkpoints](ArenaCheckpoint).
//! - [`Pool`] — fixed-size blocks, constant-time alloc/free.
//! - [`FreeList`] — general alloc/free inside one fixed buffer, first-fit
//!   with coalescing.
//! - [`Scratch`] — ring buffer for transient, roughly-FIFO allocations.
//!
//! Backing buffers come from a caller slice, from another allocator, or
//! from the OS via [`vm::VirtualMemory`].
//!
//! # Failure model
//!
//! Exhaustion is recoverable: every strategy returns
//! [`Err(AllocError)`](AllocError) when it cannot satisfy a request, with
//! its own state unchanged. Violating a caller contract (freeing a foreign
//! pointer, resizing a pool block, mismatched pool layout, double-freeing
//! a scratch span) is a bug in the caller and panics.
//!
//! # Threading
//!
//! Strategies keep their state in `Cell`s and are deliberately `!Sync`;
//! one instance belongs to one thread at a time. [`HeapAllocator`] is the
//! stateless exception. Wrap a strategy in a lock externally if it must
//! be shared.
//!
//! # Example
//!
//! ```
//! use core::alloc::Layout;
//! use strata_alloc::{Allocator, Arena, Resettable};
//!
//! let mut buf = [0u8; 4096];
//! let arena = Arena::from_slice(&mut buf);
//!
//! unsafe {
//!     let layout = Layout::from_size_align(128, 16).unwrap();
//!     let block = arena.allocate(layout)?;
//!     assert_eq!(block.cast::<u8>().as_ptr() as usize % 16, 0);
//!
//!     // One call invalidates everything the arena handed out.
//!     arena.reset();
//! }
//! # Ok::<(), strata_alloc::AllocError>(())
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod allocator;
pub mod error;
pub mod region;
pub mod utils;
pub mod vm;

pub use allocator::{
    Allocator, AllocatorRef, Arena, ArenaCheckpoint, FreeList, HeapAllocator, MemoryUsage, Pool,
    Resettable, Scratch,
};
pub use error::{AllocError, AllocResult};
pub use region::RawRegion;
pub use utils::DEFAULT_ALIGNMENT;
pub use vm::VirtualMemory;
