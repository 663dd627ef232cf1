//! Swap-slot allocator and the swap I/O contract.
//!
//! The allocator is a fixed bitmap over `SWAPMAX / PAGE_SIZE` slots, the
//! same `bitmap-allocator` strategy the frame allocator uses, sized down to
//! a smaller instance. Swap I/O itself — reading and writing one page
//! between a physical frame and a slot — is provided by a real block
//! driver elsewhere in the tree; this crate only declares the contract
//! (via the same `crate_interface` decoupling idiom `logger` uses for its
//! console backend) and a `Vec<u8>`-backed stand-in for tests.

use alloc::vec::Vec;

use arch::PhysPageNum;
use bitmap_allocator::{BitAlloc, BitAlloc4K};
use config::mm::{PAGE_SIZE, SWAPMAX};
use crate_interface::{call_interface, def_interface};
use mutex::SpinLock;

const SLOT_COUNT: usize = SWAPMAX / PAGE_SIZE;

static SWAP_BITMAP: SpinLock<BitAlloc4K> = SpinLock::new(BitAlloc4K::DEFAULT);

/// Running counts of swap activity, reported by `print_swap_stats`.
struct SwapStats {
    swap_outs: u64,
    swap_ins: u64,
}

static SWAP_STATS: SpinLock<SwapStats> = SpinLock::new(SwapStats {
    swap_outs: 0,
    swap_ins: 0,
});

/// Prepares the swap-slot bitmap. Must be called once at boot.
pub fn init() {
    SWAP_BITMAP.lock().insert(0..SLOT_COUNT);
}

/// Allocates a swap slot.
///
/// # Panics
///
/// Panics on exhaustion. `spec.md`'s source treats swap exhaustion as
/// fatal to the kernel; see `DESIGN.md` for the resolution of that open
/// question.
pub fn allocswap() -> usize {
    SWAP_BITMAP
        .lock()
        .alloc()
        .expect("allocswap: swap device exhausted")
}

/// Frees a swap slot.
///
/// # Panics
///
/// Panics if `slot` is out of range — a programmer-precondition violation.
pub fn freeswap(slot: usize) {
    assert!(slot < SLOT_COUNT, "freeswap: slot {slot} out of range");
    SWAP_BITMAP.lock().dealloc(slot);
}

/// External collaborator: synchronous swap I/O, one page at a time.
///
/// A block driver implements this with `#[impl_interface]`; see
/// [`MemSwapIo`] for a backend usable without one (tests, or booting this
/// crate standalone).
#[def_interface]
pub trait SwapIo: Send + Sync {
    fn swapread(ppn: PhysPageNum, slot: usize);
    fn swapwrite(ppn: PhysPageNum, slot: usize);
}

/// Reads `slot` into the frame at `ppn` and records the swap-in.
pub fn swapread(ppn: PhysPageNum, slot: usize) {
    call_interface!(SwapIo::swapread(ppn, slot));
    SWAP_STATS.lock().swap_ins += 1;
}

/// Writes the frame at `ppn` out to `slot` and records the swap-out.
pub fn swapwrite(ppn: PhysPageNum, slot: usize) {
    call_interface!(SwapIo::swapwrite(ppn, slot));
    SWAP_STATS.lock().swap_outs += 1;
}

/// Logs the current swap-in/swap-out counters. Named `print_swap_stats` in
/// the external interface list; implemented as a log line rather than a
/// bespoke console writer, console output being an external collaborator.
pub fn print_swap_stats() {
    let stats = SWAP_STATS.lock();
    log::info!(
        "swap stats: {} swap-outs, {} swap-ins",
        stats.swap_outs,
        stats.swap_ins
    );
}

/// An in-memory stand-in for the swap device: one `Vec<u8>` of
/// `SLOT_COUNT * PAGE_SIZE` bytes, guarded by a single lock. Used by tests
/// and by standalone boots of this crate that have no real block driver
/// wired up, the same role `RustFlyer-OS`'s virtio-blk driver fills under
/// QEMU.
pub struct MemSwapIo;

static MEM_SWAP: SpinLock<Vec<u8>> = SpinLock::new(Vec::new());

impl MemSwapIo {
    /// Allocates the backing store. Call once before using `MemSwapIo` as
    /// the `SwapIo` implementation.
    pub fn init() {
        let mut buf = MEM_SWAP.lock();
        buf.resize(SLOT_COUNT * PAGE_SIZE, 0);
    }
}

#[crate_interface::impl_interface]
impl SwapIo for MemSwapIo {
    fn swapread(ppn: PhysPageNum, slot: usize) {
        let buf = MEM_SWAP.lock();
        let src = &buf[slot * PAGE_SIZE..(slot + 1) * PAGE_SIZE];
        // SAFETY: caller owns exclusive access to the frame for this call.
        unsafe { ppn.as_bytes_mut() }.copy_from_slice(src);
    }

    fn swapwrite(ppn: PhysPageNum, slot: usize) {
        let mut buf = MEM_SWAP.lock();
        // SAFETY: caller owns exclusive access to the frame for this call.
        let src = unsafe { ppn.as_bytes_mut() };
        buf[slot * PAGE_SIZE..(slot + 1) * PAGE_SIZE].copy_from_slice(src);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocswap_then_freeswap_round_trips_slot() {
        SWAP_BITMAP.lock().insert(0..SLOT_COUNT);
        let a = allocswap();
        freeswap(a);
        let b = allocswap();
        assert_eq!(a, b);
        freeswap(b);
    }

    #[test]
    fn freeswap_rejects_out_of_range_slot() {
        let result = std::panic::catch_unwind(|| freeswap(SLOT_COUNT));
        assert!(result.is_err());
    }
}
