//! Integration tests for the scratch ring strategy

use core::alloc::Layout;
use strata_alloc::{Allocator, MemoryUsage, Resettable, Scratch};

#[test]
fn test_scratch_basic() {
    let mut buf = [0u8; 1024];
    let ring = Scratch::from_slice(&mut buf).expect("Failed to create scratch ring");

    unsafe {
        let layout = Layout::from_size_align(200, 8).unwrap();
        let block = ring.allocate(layout).expect("Allocation failed");
        std::ptr::write_bytes(block.cast::<u8>().as_ptr(), 0x6D, 200);
        assert_eq!(*block.cast::<u8>().as_ptr().add(199), 0x6D);
        ring.deallocate(block.cast(), layout);
    }
    assert_eq!(ring.used_memory(), 0);
}

#[test]
fn test_scratch_steady_state_cycling() {
    let mut buf = [0u8; 512];
    let ring = Scratch::from_slice(&mut buf).expect("Failed to create scratch ring");
    let layout = Layout::from_size_align(96, 8).unwrap();

    unsafe {
        // Far more traffic than the ring holds at once; freeing in
        // allocation order keeps it flowing through the wrap point.
        let mut live = std::collections::VecDeque::new();
        for i in 0..100u32 {
            if live.len() == 3 {
                let oldest: core::ptr::NonNull<[u8]> = live.pop_front().unwrap();
                ring.deallocate(oldest.cast(), layout);
            }
            let block = ring.allocate(layout).expect("Allocation failed");
            std::ptr::write_bytes(block.cast::<u8>().as_ptr(), i as u8, 96);
            live.push_back(block);
        }
        for block in live {
            ring.deallocate(block.cast(), layout);
        }
    }
    assert_eq!(ring.used_memory(), 0);
}

#[test]
fn test_scratch_straggler_pins_memory() {
    let mut buf = [0u8; 1024];
    let ring = Scratch::from_slice(&mut buf).expect("Failed to create scratch ring");
    let layout = Layout::from_size_align(64, 8).unwrap();

    unsafe {
        let straggler = ring.allocate(layout).expect("Allocation failed");
        let mut transient = Vec::new();
        for _ in 0..5 {
            transient.push(ring.allocate(layout).expect("Allocation failed"));
        }
        let high_water = ring.used_memory();

        // Everything after the straggler is freed, nothing comes back.
        for block in transient.drain(..) {
            ring.deallocate(block.cast(), layout);
        }
        assert_eq!(ring.used_memory(), high_water);

        ring.deallocate(straggler.cast(), layout);
        assert_eq!(ring.used_memory(), 0);
    }
}

#[test]
fn test_scratch_oldest_block_gates_reuse() {
    // Ring sized to exactly three spans (8-byte header + 56-byte payload
    // each), so a fourth span can only come from reclaimed space.
    #[repr(align(8))]
    struct Ring([u8; 192]);
    let mut buf = Ring([0; 192]);
    let ring = Scratch::from_slice(&mut buf.0).expect("Failed to create scratch ring");
    assert_eq!(ring.capacity(), 192);
    let layout = Layout::from_size_align(56, 8).unwrap();

    unsafe {
        let a = ring.allocate(layout).expect("Allocation failed");
        let b = ring.allocate(layout).expect("Allocation failed");
        let c = ring.allocate(layout).expect("Allocation failed");
        let a_addr = a.cast::<u8>().as_ptr() as usize;
        assert_eq!(ring.used_memory(), 192);

        // b's bytes are free, but a still pins the reclaim cursor: a
        // request that needs b's space must fail.
        ring.deallocate(b.cast(), layout);
        assert_eq!(ring.used_memory(), 192);
        assert!(ring.allocate(layout).is_err());

        // Freeing a releases the dead run a+b and the request goes
        // through, landing on a's old span.
        ring.deallocate(a.cast(), layout);
        assert_eq!(ring.used_memory(), 64);
        let d = ring.allocate(layout).expect("Allocation after reclaim failed");
        assert_eq!(d.cast::<u8>().as_ptr() as usize, a_addr);

        ring.deallocate(c.cast(), layout);
        ring.deallocate(d.cast(), layout);
    }
    assert_eq!(ring.used_memory(), 0);
}

#[test]
fn test_scratch_wrap_preserves_contents() {
    let mut buf = [0u8; 256];
    let ring = Scratch::from_slice(&mut buf).expect("Failed to create scratch ring");
    let layout = Layout::from_size_align(80, 8).unwrap();

    unsafe {
        let a = ring.allocate(layout).expect("Allocation failed");
        std::ptr::write_bytes(a.cast::<u8>().as_ptr(), 0xA0, 80);
        let b = ring.allocate(layout).expect("Allocation failed");
        std::ptr::write_bytes(b.cast::<u8>().as_ptr(), 0xB0, 80);

        ring.deallocate(a.cast(), layout);

        // The next span wraps; b's bytes must survive the filler write.
        let c = ring.allocate(layout).expect("Wrapped allocation failed");
        std::ptr::write_bytes(c.cast::<u8>().as_ptr(), 0xC0, 80);

        assert_eq!(*b.cast::<u8>().as_ptr(), 0xB0);
        assert_eq!(*b.cast::<u8>().as_ptr().add(79), 0xB0);

        ring.deallocate(b.cast(), layout);
        ring.deallocate(c.cast(), layout);
    }
    assert_eq!(ring.used_memory(), 0);
}

#[test]
fn test_scratch_reset_recovers_full_ring() {
    let mut buf = [0u8; 256];
    let ring = Scratch::from_slice(&mut buf).expect("Failed to create scratch ring");
    let layout = Layout::from_size_align(80, 8).unwrap();

    unsafe {
        let _a = ring.allocate(layout).expect("Allocation failed");
        let _b = ring.allocate(layout).expect("Allocation failed");
        assert!(ring.allocate(layout).is_err());

        ring.reset();
        ring.allocate(layout).expect("Allocation after reset failed");
    }
}

#[test]
#[should_panic(expected = "does not belong")]
fn test_scratch_foreign_pointer_panics() {
    let mut buf = [0u8; 256];
    let ring = Scratch::from_slice(&mut buf).expect("Failed to create scratch ring");
    let mut other = [0u8; 32];

    unsafe {
        let layout = Layout::from_size_align(32, 8).unwrap();
        let foreign = core::ptr::NonNull::new(other.as_mut_ptr().add(8)).unwrap();
        ring.deallocate(foreign, layout);
    }
}
