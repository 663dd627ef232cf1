//! Physical-frame allocator.
//!
//! Owns the free-list of allocatable 4 KiB frames above the kernel image.
//! `kalloc`/`kfree` are free functions rather than an RAII tracker: frame
//! ownership here moves between the free-list, a leaf user PTE, and a swap
//! slot without any single Rust value's lifetime tracking it, since eviction
//! rewrites a PTE out from under whatever "owns" the frame.

use core::cell::SyncUnsafeCell;

use arch::PhysPageNum;
use bitmap_allocator::{BitAlloc, BitAlloc64K};
use config::mm::{PAGE_SIZE, PHYSTOP, kernel_end_phys};
use crate_interface::call_interface;
use mutex::SpinLock;

/// Byte pattern a freshly allocated frame is filled with, for debugging.
const ALLOC_SENTINEL: u8 = 0xCD;
/// Byte pattern a freed frame is overwritten with before it returns to the
/// free-list, distinct from [`ALLOC_SENTINEL`] so a use-after-free shows up
/// differently depending on which side of the lifetime it occurred.
const FREE_SENTINEL: u8 = 0xFE;

static FRAME_ALLOCATOR: SpinLock<BitAlloc64K> = SpinLock::new(BitAlloc64K::DEFAULT);

/// Offset between a frame's physical page number and its bit index in
/// [`FRAME_ALLOCATOR`]. Set once by [`init`].
static FRAME_OFFSET: SyncUnsafeCell<usize> = SyncUnsafeCell::new(0);
/// Total number of allocatable frames. Set once by [`init`].
static FRAME_COUNT: SyncUnsafeCell<usize> = SyncUnsafeCell::new(0);

fn frame_offset() -> usize {
    // SAFETY: written once during init, before any other access.
    unsafe { *FRAME_OFFSET.get() }
}

/// The `(offset, count)` of the allocatable frame range, in frame numbers.
/// Used by [`crate::meta`] to size its parallel, frame-indexed tables.
pub fn frame_range() -> (usize, usize) {
    // SAFETY: both written once during init, before any other access.
    unsafe { (*FRAME_OFFSET.get(), *FRAME_COUNT.get()) }
}

/// The Evictor this allocator recurses into when the free-list is empty.
///
/// Declared here (rather than depended on directly) because the Evictor
/// needs the page-table walker, which in turn calls back into `kalloc` — a
/// direct dependency would be circular. The kernel crate provides the real
/// implementation with `#[impl_interface]`.
#[crate_interface::def_interface]
pub trait Evictor: Send + Sync {
    /// Evicts one resident user page to swap. Returns whether it succeeded.
    fn evictpage() -> bool;
}

/// Initializes the frame allocator over `[kernel_end_phys(), PHYSTOP)`.
///
/// # Safety
///
/// Must be called exactly once, before any other frame is allocated, and
/// only after the kernel's own mappings make that range safe to hand out.
pub unsafe fn init() {
    let start = kernel_end_phys() / PAGE_SIZE;
    let end = PHYSTOP / PAGE_SIZE;
    let count = end - start;
    // SAFETY: single initialization, happens-before any allocation.
    unsafe {
        *FRAME_OFFSET.get() = start;
        *FRAME_COUNT.get() = count;
    }
    FRAME_ALLOCATOR.lock().insert(0..count);
    log::debug!(
        "frame allocator: {} frames from {:#x} to {:#x}",
        count,
        kernel_end_phys(),
        PHYSTOP
    );
}

fn fill(ppn: PhysPageNum, byte: u8) {
    // SAFETY: the frame is either freshly claimed from the free-list (not
    // yet visible to anyone else) or about to be pushed back onto it (no
    // longer visible to its former owner).
    let bytes = unsafe { ppn.as_bytes_mut() };
    bytes.fill(byte);
}

/// Allocates one physical frame, evicting a resident user page and
/// retrying if the free-list is empty. Returns `None` only if eviction
/// also fails to free anything up.
///
/// The returned frame is filled with [`ALLOC_SENTINEL`]; callers set
/// whatever permissions or zero it as their use requires.
pub fn kalloc() -> Option<PhysPageNum> {
    loop {
        let claimed = FRAME_ALLOCATOR.lock().alloc();
        if let Some(bit) = claimed {
            let ppn = PhysPageNum::new(frame_offset() + bit);
            fill(ppn, ALLOC_SENTINEL);
            return Some(ppn);
        }
        // Lock released above before recursing into eviction, which will
        // itself need the allocator lock to return the victim's frame.
        if !call_interface!(Evictor::evictpage()) {
            return None;
        }
    }
}

/// Returns a frame to the free-list.
///
/// # Panics
///
/// Panics if `ppn` is unaligned, inside the kernel image, or at or above
/// `PHYSTOP` — all programmer-precondition violations, never triggered by
/// untrusted input.
pub fn kfree(ppn: PhysPageNum) {
    let pa = ppn.address().to_usize();
    assert!(pa % PAGE_SIZE == 0, "kfree: unaligned frame {pa:#x}");
    assert!(
        pa >= kernel_end_phys() && pa < PHYSTOP,
        "kfree: frame {pa:#x} outside the allocatable range"
    );
    fill(ppn, FREE_SENTINEL);
    FRAME_ALLOCATOR.lock().dealloc(ppn.to_usize() - frame_offset());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reset_allocator(count: usize) {
        let mut guard = FRAME_ALLOCATOR.lock();
        *guard = BitAlloc64K::DEFAULT;
        guard.insert(0..count);
        drop(guard);
        unsafe {
            *FRAME_OFFSET.get() = 0;
        }
    }

    #[test]
    #[ignore = "requires a booted kernel harness: frame pointers must be backed by real RAM"]
    fn kalloc_then_kfree_round_trips_bit() {
        reset_allocator(4);
        let a = kalloc().unwrap();
        kfree(a);
        let b = kalloc().unwrap();
        assert_eq!(a, b);
    }
}
