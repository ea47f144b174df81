//! Integration tests for the free-list strategy

use core::alloc::Layout;
use strata_alloc::{Allocator, FreeList, HeapAllocator, MemoryUsage, Resettable};

#[test]
fn test_freelist_basic() {
    let mut buf = [0u8; 4096];
    let list = FreeList::from_slice(&mut buf).expect("Failed to create free list");

    unsafe {
        let layout = Layout::from_size_align(300, 8).unwrap();
        let block = list.allocate(layout).expect("Allocation failed");
        std::ptr::write_bytes(block.cast::<u8>().as_ptr(), 0x99, 300);
        assert_eq!(*block.cast::<u8>().as_ptr().add(299), 0x99);
        list.deallocate(block.cast(), layout);
    }
    assert_eq!(list.used_memory(), 0);
}

#[test]
fn test_freelist_interleaved_alloc_free() {
    let mut buf = [0u8; 8192];
    let list = FreeList::from_slice(&mut buf).expect("Failed to create free list");

    unsafe {
        let small = Layout::from_size_align(64, 8).unwrap();
        let large = Layout::from_size_align(512, 8).unwrap();

        let a = list.allocate(small).expect("Allocation failed");
        let b = list.allocate(large).expect("Allocation failed");
        let c = list.allocate(small).expect("Allocation failed");

        list.deallocate(b.cast(), large);

        // The hole left by b is the first fit for another large request.
        let b_addr = b.cast::<u8>().as_ptr() as usize;
        let d = list.allocate(large).expect("Allocation failed");
        assert_eq!(d.cast::<u8>().as_ptr() as usize, b_addr);

        list.deallocate(a.cast(), small);
        list.deallocate(c.cast(), small);
        list.deallocate(d.cast(), large);
    }
    assert_eq!(list.live_allocations(), 0);
    assert_eq!(list.used_memory(), 0);
}

#[test]
fn test_freelist_full_capacity_after_churn() {
    let mut buf = [0u8; 4096];
    let list = FreeList::from_slice(&mut buf).expect("Failed to create free list");
    let layout = Layout::from_size_align(128, 8).unwrap();

    unsafe {
        for _ in 0..20 {
            let mut blocks = Vec::new();
            for _ in 0..8 {
                blocks.push(list.allocate(layout).expect("Allocation failed"));
            }
            // Free in a scrambled order to exercise both merge directions.
            for idx in [3usize, 0, 7, 1, 5, 2, 6, 4] {
                list.deallocate(blocks[idx].cast(), layout);
            }
            assert_eq!(list.used_memory(), 0, "coalescing must restore the buffer");
        }

        // After churn a buffer-sized request minus overhead still fits.
        let big = Layout::from_size_align(list.capacity() - 64, 8).unwrap();
        let block = list.allocate(big).expect("Large allocation failed");
        list.deallocate(block.cast(), big);
    }
}

#[test]
fn test_freelist_differing_alignments() {
    let mut buf = [0u8; 4096];
    let list = FreeList::from_slice(&mut buf).expect("Failed to create free list");

    unsafe {
        let mut blocks = Vec::new();
        for align in [1usize, 4, 8, 16, 32, 64, 128] {
            let layout = Layout::from_size_align(48, align).unwrap();
            let block = list.allocate(layout).expect("Allocation failed");
            assert_eq!(block.cast::<u8>().as_ptr() as usize % align, 0);
            blocks.push((block, layout));
        }
        for (block, layout) in blocks {
            list.deallocate(block.cast(), layout);
        }
    }
    assert_eq!(list.used_memory(), 0);
}

#[test]
fn test_freelist_from_backing_allocator() {
    let heap = HeapAllocator::new();
    let list = FreeList::with_capacity(&heap, 16 * 1024).expect("Failed to create free list");

    unsafe {
        let layout = Layout::from_size_align(1000, 16).unwrap();
        let block = list.allocate(layout).expect("Allocation failed");
        std::ptr::write_bytes(block.cast::<u8>().as_ptr(), 0xC3, 1000);
        list.deallocate(block.cast(), layout);
    }
}

#[test]
fn test_freelist_reset_after_leaks() {
    let mut buf = [0u8; 2048];
    let list = FreeList::from_slice(&mut buf).expect("Failed to create free list");
    let layout = Layout::from_size_align(256, 8).unwrap();

    unsafe {
        // Deliberately do not free these.
        let _a = list.allocate(layout).expect("Allocation failed");
        let _b = list.allocate(layout).expect("Allocation failed");
        assert!(list.used_memory() > 0);

        list.reset();
    }
    assert_eq!(list.used_memory(), 0);
    assert_eq!(list.live_allocations(), 0);

    unsafe {
        list.allocate(layout).expect("Allocation after reset failed");
    }
}

#[test]
fn test_freelist_reallocate_moves_contents() {
    let mut buf = [0u8; 4096];
    let list = FreeList::from_slice(&mut buf).expect("Failed to create free list");

    unsafe {
        let old = Layout::from_size_align(100, 8).unwrap();
        let new = Layout::from_size_align(400, 8).unwrap();

        let block = list.allocate(old).expect("Allocation failed");
        for i in 0..100 {
            *block.cast::<u8>().as_ptr().add(i) = i as u8;
        }

        let grown = list
            .reallocate(block.cast(), old, new)
            .expect("Reallocation failed");
        for i in 0..100 {
            assert_eq!(*grown.cast::<u8>().as_ptr().add(i), i as u8);
        }
        list.deallocate(grown.cast(), new);
    }
    assert_eq!(list.used_memory(), 0);
}
