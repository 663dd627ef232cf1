//! Page-fault glue: resolves a fault on a swapped-out user page by paging
//! it back in. A fault on anything else (no mapping, a mapped-but-absent
//! guard page, a genuine protection violation) is not this module's job —
//! the trap dispatcher that would report those to a process is an external
//! collaborator out of scope here.

use arch::{PageTableEntry, PhysPageNum, PteFlags, VirtAddr};
use config::mm::PAGE_SIZE;
use mm::{frame, meta, swap};

use super::{maxva_pages, walk};

/// What a fault resolution attempt found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOutcome {
    /// The page is now resident (either it already was, or this call
    /// brought it back from swap).
    Resolved,
    /// Not a swap-encoded fault: either `va` has no mapping, or it resolves
    /// to something other than a swapped-out leaf (a resident leaf whose
    /// permissions the access violated, an intermediate-only path, ...).
    /// The caller should kill the faulting process.
    NotPresent,
    /// A swapped-out page needed a frame and none could be freed.
    OutOfMemory,
}

/// Handles a fault at `va` against the page table rooted at `root`.
///
/// Swaps the faulting page back in if it's currently swapped out. A trap on
/// any other PTE state — no mapping, or a resident leaf whose permission
/// bits the access violated (the guard-page case: `uvmclear` only clears
/// `U`, so the leaf is still resident) — is a genuine protection violation;
/// there is no "already resolved" outcome for a non-swap-encoded fault, so
/// the caller kills the faulting process.
pub fn handle_page_fault(root: PhysPageNum, va: VirtAddr) -> FaultOutcome {
    let page_va = VirtAddr::new(va.to_usize() & !(PAGE_SIZE - 1));
    let Some(entry) = walk::walk(root, page_va, false) else {
        return FaultOutcome::NotPresent;
    };
    if !entry.is_swapped() {
        return FaultOutcome::NotPresent;
    }

    let slot = entry.swap_slot();
    let preserved = entry.flags();
    let Some(frame) = frame::kalloc() else {
        return FaultOutcome::OutOfMemory;
    };

    swap::swapread(frame, slot);
    swap::freeswap(slot);

    let resident_flags = (preserved - PteFlags::SWAP) | PteFlags::V;
    walk::write_pte(entry, PageTableEntry::new(frame, resident_flags));
    walk::tlb_shootdown(page_va);

    if resident_flags.contains(PteFlags::U) && !meta::is_page_table(frame) {
        meta::lru_add(frame, root, page_va.page_number(), maxva_pages());
    }
    FaultOutcome::Resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore = "requires a booted kernel harness: page tables must be backed by real RAM"]
    fn fault_on_unmapped_va_reports_not_present() {
        let root = PhysPageNum::new(0);
        assert_eq!(
            handle_page_fault(root, VirtAddr::new(0x1000)),
            FaultOutcome::NotPresent
        );
    }
}
