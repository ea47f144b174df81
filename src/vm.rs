//! Virtual-memory provider
//!
//! Thin boundary over the OS page reservation calls, for callers that want
//! a large backing buffer without going through the process heap. The
//! mapping is committed read-write and returned to the OS on drop. No
//! strategy calls into this module; wiring a [`VirtualMemory`] buffer into
//! a strategy is the caller's choice.

use core::mem::ManuallyDrop;
use core::ptr::NonNull;
use core::slice;

use crate::error::{AllocError, AllocResult};
use crate::utils::align_up;

/// An owned, page-granular mapping from the OS
#[derive(Debug)]
pub struct VirtualMemory {
    ptr: NonNull<u8>,
    size: usize,
}

// The mapping is plain anonymous memory with no thread affinity.
unsafe impl Send for VirtualMemory {}

impl VirtualMemory {
    /// Reserve and commit at least `size` bytes, rounded up to whole pages
    pub fn reserve(size: usize) -> AllocResult<Self> {
        if size == 0 {
            return Err(AllocError::InvalidLayout("cannot reserve zero bytes"));
        }
        let size = align_up(size, page_size());
        let ptr = sys::map(size).ok_or(AllocError::OutOfMemory {
            size,
            align: page_size(),
        })?;
        tracing::trace!(size, "virtual memory reserved");
        Ok(VirtualMemory { ptr, size })
    }

    /// Mapped size in bytes, a multiple of the page size
    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    /// True only for a hypothetical empty mapping; reservations are never
    /// empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Base pointer of the mapping
    #[inline]
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// View the mapping as a byte slice, e.g. to hand to a strategy's
    /// `from_slice` constructor
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: the mapping is committed read-write and exclusively ours
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.size) }
    }

    /// Discard the contents but keep the mapping
    ///
    /// Tells the OS the pages can be reclaimed; the range stays mapped
    /// and writable. Every byte must be treated as garbage afterwards,
    /// which the `&mut` receiver enforces for safe callers.
    pub fn purge(&mut self) {
        // SAFETY: the mapping is live and no views of it are outstanding
        unsafe { sys::purge(self.ptr, self.size) };
        tracing::trace!(size = self.size, "virtual memory purged");
    }

    /// Shrink the mapping to the window `lead..lead + len`, giving the
    /// head and tail back to the OS
    ///
    /// Both `lead` and `len` must be page multiples, the window must lie
    /// inside the mapping, and `len` must be non-zero; violating any of
    /// these is a caller error and panics. On platforms that cannot
    /// release a mapping partially the window is remapped in place, which
    /// can fail; the original mapping is gone either way.
    pub fn trim(self, lead: usize, len: usize) -> AllocResult<VirtualMemory> {
        let page = page_size();
        assert!(len > 0, "trim window must be non-empty");
        assert!(
            lead % page == 0 && len % page == 0,
            "trim window must be page-aligned"
        );
        assert!(
            lead + len <= self.size,
            "trim window exceeds the mapping"
        );

        let vm = ManuallyDrop::new(self);
        // SAFETY: the mapping is live; ManuallyDrop keeps Drop from
        // releasing it a second time
        let ptr = unsafe { sys::trim(vm.ptr, vm.size, lead, len) }.ok_or(
            AllocError::OutOfMemory {
                size: len,
                align: page,
            },
        )?;
        tracing::trace!(lead, len, "virtual memory trimmed");
        Ok(VirtualMemory { ptr, size: len })
    }

    /// Return the mapping to the OS
    ///
    /// Dropping has the same effect; this form just makes the release
    /// point explicit.
    pub fn release(self) {
        // Drop does the work.
    }
}

impl Drop for VirtualMemory {
    fn drop(&mut self) {
        // SAFETY: ptr/size came from sys::map and were not released before
        unsafe { sys::unmap(self.ptr, self.size) };
        tracing::trace!(size = self.size, "virtual memory released");
    }
}

/// Size of an OS page in bytes
#[inline]
pub fn page_size() -> usize {
    sys::page_size()
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod sys {
            use core::ptr::{self, NonNull};

            pub fn map(size: usize) -> Option<NonNull<u8>> {
                // SAFETY: anonymous private mapping, no fd involved
                let raw = unsafe {
                    libc::mmap(
                        ptr::null_mut(),
                        size,
                        libc::PROT_READ | libc::PROT_WRITE,
                        libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                        -1,
                        0,
                    )
                };
                if raw == libc::MAP_FAILED {
                    return None;
                }
                NonNull::new(raw.cast::<u8>())
            }

            /// # Safety
            /// `ptr`/`size` must describe a live mapping from `map`.
            pub unsafe fn unmap(ptr: NonNull<u8>, size: usize) {
                let rc = unsafe { libc::munmap(ptr.as_ptr().cast(), size) };
                debug_assert_eq!(rc, 0, "munmap failed");
            }

            /// # Safety
            /// `ptr`/`size` must describe a live mapping from `map`; the
            /// contents are garbage afterwards.
            pub unsafe fn purge(ptr: NonNull<u8>, size: usize) {
                let rc = unsafe {
                    libc::madvise(ptr.as_ptr().cast(), size, libc::MADV_DONTNEED)
                };
                debug_assert_eq!(rc, 0, "madvise failed");
            }

            /// # Safety
            /// `ptr`/`size` must describe a live mapping from `map`;
            /// `lead`/`len` must be page-aligned and inside it. The old
            /// mapping must not be unmapped again by the caller.
            pub unsafe fn trim(
                ptr: NonNull<u8>,
                size: usize,
                lead: usize,
                len: usize,
            ) -> Option<NonNull<u8>> {
                let base = ptr.as_ptr();
                let trail = size - lead - len;
                unsafe {
                    if lead > 0 {
                        let rc = libc::munmap(base.cast(), lead);
                        debug_assert_eq!(rc, 0, "munmap failed");
                    }
                    if trail > 0 {
                        let rc = libc::munmap(base.add(lead + len).cast(), trail);
                        debug_assert_eq!(rc, 0, "munmap failed");
                    }
                    NonNull::new(base.add(lead))
                }
            }

            pub fn page_size() -> usize {
                // SAFETY: plain sysconf query
                unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
            }
        }
    } else if #[cfg(windows)] {
        mod sys {
            use core::mem;
            use core::ptr::{self, NonNull};

            use winapi::um::memoryapi::{VirtualAlloc, VirtualFree};
            use winapi::um::sysinfoapi::{GetSystemInfo, SYSTEM_INFO};
            use winapi::um::winnt::{
                MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, MEM_RESET, PAGE_READWRITE,
            };

            pub fn map(size: usize) -> Option<NonNull<u8>> {
                // SAFETY: reserving fresh address space, no aliasing
                let raw = unsafe {
                    VirtualAlloc(
                        ptr::null_mut(),
                        size,
                        MEM_COMMIT | MEM_RESERVE,
                        PAGE_READWRITE,
                    )
                };
                NonNull::new(raw.cast::<u8>())
            }

            /// # Safety
            /// `ptr` must be the base of a live mapping from `map`.
            pub unsafe fn unmap(ptr: NonNull<u8>, _size: usize) {
                let ok = unsafe { VirtualFree(ptr.as_ptr().cast(), 0, MEM_RELEASE) };
                debug_assert_ne!(ok, 0, "VirtualFree failed");
            }

            /// # Safety
            /// `ptr`/`size` must describe a live mapping from `map`; the
            /// contents are garbage afterwards.
            pub unsafe fn purge(ptr: NonNull<u8>, size: usize) {
                // MEM_RESET keeps the range mapped but lets the OS drop it.
                let raw = unsafe {
                    VirtualAlloc(ptr.as_ptr().cast(), size, MEM_RESET, PAGE_READWRITE)
                };
                debug_assert!(!raw.is_null(), "VirtualAlloc(MEM_RESET) failed");
            }

            /// # Safety
            /// `ptr`/`size` must describe a live mapping from `map`;
            /// `lead`/`len` must be page-aligned and inside it. The old
            /// mapping must not be unmapped again by the caller.
            pub unsafe fn trim(
                ptr: NonNull<u8>,
                size: usize,
                lead: usize,
                len: usize,
            ) -> Option<NonNull<u8>> {
                // No partial release here: drop the whole mapping and take
                // the window back at its old address, which can race.
                let want = unsafe { ptr.as_ptr().add(lead) };
                unsafe { unmap(ptr, size) };
                let raw = unsafe {
                    VirtualAlloc(
                        want.cast(),
                        len,
                        MEM_COMMIT | MEM_RESERVE,
                        PAGE_READWRITE,
                    )
                };
                if raw.is_null() {
                    return None;
                }
                if raw != want.cast() {
                    // SAFETY: raw is a fresh mapping we now own
                    unsafe { unmap(NonNull::new_unchecked(raw.cast()), len) };
                    return None;
                }
                NonNull::new(raw.cast())
            }

            pub fn page_size() -> usize {
                // SAFETY: out-param struct is fully written by the call
                unsafe {
                    let mut info: SYSTEM_INFO = mem::zeroed();
                    GetSystemInfo(&mut info);
                    info.dwPageSize as usize
                }
            }
        }
    }
}
