//! The page-table walker and mapping primitives.
//!
//! Walks a three-level Sv39 page table, creating intermediate tables on
//! demand, and installs/removes/inspects leaf PTEs. Built directly on
//! `mm`'s frame allocator and per-frame metadata table rather than any
//! RAII frame tracker, matching this subsystem's "ownership moves without a
//! single Rust value tracking it" design (see `lib/mm/src/frame.rs`).

use arch::{PageTableEntry, PhysAddr, PhysPageNum, PteFlags, VirtAddr};
use config::mm::{MAXVA, PAGE_SIZE, PTE_PER_TABLE};
use mm::{frame, meta, swap};
use mutex::SpinLock;
use systype::{SysError, SysResult};

use super::maxva_pages;

/// Guards every leaf-PTE mutation performed by this module and by the
/// Clock/Evictor/fault-handler glue built on it, per the lock order in
/// `spec.md` §5 (acquired after the metadata and LRU locks, never before).
static PTE_LOCK: SpinLock<()> = SpinLock::new(());

fn table_entries(ppn: PhysPageNum) -> &'static mut [PageTableEntry; PTE_PER_TABLE] {
    // SAFETY: `ppn` is a live page-table frame and physical RAM is
    // identity-accessible in this kernel's (out-of-scope) direct map.
    unsafe { &mut *(ppn.address().to_usize() as *mut [PageTableEntry; PTE_PER_TABLE]) }
}

fn zero_frame(ppn: PhysPageNum) {
    // SAFETY: the frame was just allocated and is not yet visible elsewhere.
    unsafe { ppn.as_bytes_mut() }.fill(0);
}

/// Overwrites `*entry` while holding the PTE-mutation lock.
pub fn write_pte(entry: &mut PageTableEntry, value: PageTableEntry) {
    let _guard = PTE_LOCK.lock();
    *entry = value;
}

/// TLB shootdown for one page on the local hart, re-exported here so the
/// Evictor and fault-handler glue don't need to depend on `arch` directly
/// for this one call.
pub fn tlb_shootdown(va: VirtAddr) {
    arch::asm::tlb_shootdown(va);
}

/// Walks `root` to the level-0 PTE mapping `va`, creating intermediate
/// tables on demand when `alloc_intermediate` is set.
///
/// Returns `None` only if an intermediate table needs allocating and
/// `kalloc` fails (or `alloc_intermediate` is false and one is missing).
///
/// # Panics
///
/// Panics if `va >= MAXVA` — a programmer-precondition violation.
pub fn walk(
    root: PhysPageNum,
    va: VirtAddr,
    alloc_intermediate: bool,
) -> Option<&'static mut PageTableEntry> {
    assert!(va.to_usize() < MAXVA, "walk: va {:#x} >= MAXVA", va.to_usize());
    // indices[0] is the root (level 2) index, indices[2] the leaf (level 0).
    let indices = va.page_number().indices();
    let mut ppn = root;
    for &idx in &indices[0..2] {
        let entry = &mut table_entries(ppn)[idx];
        if !entry.is_valid() {
            if !alloc_intermediate {
                return None;
            }
            let frame = frame::kalloc()?;
            zero_frame(frame);
            meta::mark_page_table(frame);
            *entry = PageTableEntry::new(frame, PteFlags::V);
        }
        ppn = entry.ppn();
    }
    Some(&mut table_entries(ppn)[indices[2]])
}

/// Maps `[va, va+size)` to the same-length physical range starting at `pa`,
/// one page at a time. Adds each frame to the LRU list iff `perm` carries
/// the User bit, the frame isn't a page-table node, and `va < MAXVA`.
///
/// # Panics
///
/// Panics if `va`/`pa` aren't page-aligned, `size` is zero or not a whole
/// number of pages, or any target PTE is already mapped (remap).
pub fn mappages(root: PhysPageNum, va: VirtAddr, size: usize, pa: PhysAddr, perm: PteFlags) -> SysResult<()> {
    assert!(va.is_page_aligned(), "mappages: va {:#x} not page-aligned", va.to_usize());
    assert!(pa.is_page_aligned(), "mappages: pa {:#x} not page-aligned", pa.to_usize());
    assert!(size > 0 && size % PAGE_SIZE == 0, "mappages: bad size {size:#x}");

    let npages = size / PAGE_SIZE;
    for i in 0..npages {
        let page_va = VirtAddr::new(va.to_usize() + i * PAGE_SIZE);
        let page_pa = PhysAddr::new(pa.to_usize() + i * PAGE_SIZE);
        let ppn = page_pa.page_number();
        let entry = walk(root, page_va, true).ok_or(SysError::ENOMEM)?;
        assert!(
            !entry.is_valid() && !entry.is_swapped(),
            "mappages: remap at {:#x}",
            page_va.to_usize()
        );
        write_pte(entry, PageTableEntry::new(ppn, perm | PteFlags::V));
        tlb_shootdown(page_va);

        if perm.contains(PteFlags::U) && !meta::is_page_table(ppn) && page_va.to_usize() < MAXVA {
            meta::lru_add(ppn, root, page_va.page_number(), maxva_pages());
        }
    }
    Ok(())
}

/// Unmaps `npages` pages starting at `va`. If `do_free`, also releases the
/// backing resource: the frame (via `kfree`, after unlinking from the LRU)
/// for a resident leaf, or the swap slot for a swapped-out one.
///
/// # Panics
///
/// Panics if any target PTE is not a mapped leaf (resident or swapped-out)
/// — unmapping a page that was never mapped is a programmer error.
pub fn uvmunmap(root: PhysPageNum, va: VirtAddr, npages: usize, do_free: bool) {
    assert!(va.is_page_aligned(), "uvmunmap: va {:#x} not page-aligned", va.to_usize());
    for i in 0..npages {
        let page_va = VirtAddr::new(va.to_usize() + i * PAGE_SIZE);
        let entry = walk(root, page_va, false)
            .unwrap_or_else(|| panic!("uvmunmap: no mapping at {:#x}", page_va.to_usize()));
        assert!(
            entry.is_swapped() || entry.is_leaf(),
            "uvmunmap: {:#x} is not a mapped leaf",
            page_va.to_usize()
        );
        if do_free {
            if entry.is_swapped() {
                swap::freeswap(entry.swap_slot());
            } else {
                let ppn = entry.ppn();
                meta::lru_remove(ppn);
                frame::kfree(ppn);
            }
        }
        write_pte(entry, PageTableEntry::EMPTY);
        tlb_shootdown(page_va);
    }
}

/// Recursively frees every page-table frame reachable from `root`,
/// including `root` itself.
///
/// # Panics
///
/// Panics on encountering a still-mapped leaf PTE, resident or swapped-out
/// — callers must `uvmunmap` every leaf (which releases swap slots too)
/// before calling this.
pub fn freewalk(root: PhysPageNum) {
    for entry in table_entries(root).iter_mut() {
        assert!(
            !entry.is_leaf() && !entry.is_swapped(),
            "freewalk: encountered a mapped leaf; caller must unmap first"
        );
        if entry.is_valid() {
            freewalk(entry.ppn());
            *entry = PageTableEntry::EMPTY;
        }
    }
    meta::clear(root);
    frame::kfree(root);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore = "requires a booted kernel harness: page tables must be backed by real RAM"]
    fn walk_without_alloc_on_empty_root_returns_none() {
        let root = PhysPageNum::new(0);
        assert!(walk(root, VirtAddr::new(0x1000), false).is_none());
    }

    #[test]
    #[ignore = "requires a booted kernel harness: page tables must be backed by real RAM"]
    fn walk_panics_above_maxva() {
        let root = PhysPageNum::new(0);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            walk(root, VirtAddr::new(MAXVA), false)
        }));
        assert!(result.is_err());
    }
}
