//! Eviction: the external collaborator `mm::frame::kalloc` calls into when
//! the free-list runs dry.
//!
//! Runs the Clock scan, writes the victim out to swap, and rewrites its PTE
//! to the swapped-out form before handing the frame back to the allocator.

use arch::PageTableEntry;
use mm::{frame, meta, swap};

use super::{clock, walk};

struct EvictorImpl;

#[crate_interface::impl_interface]
impl frame::Evictor for EvictorImpl {
    fn evictpage() -> bool {
        evictpage()
    }
}

/// Evicts one resident user page to swap. Returns `false` only when the
/// LRU list has nothing left to evict.
///
/// # Panics
///
/// Panics if the victim the Clock scan names has no LRU entry or its PTE
/// isn't a resident leaf — both are invariants the scan and the walker
/// maintain together and a violation means they've drifted out of sync.
pub fn evictpage() -> bool {
    let Some(victim) = clock::select_victim() else {
        return false;
    };
    let entry = meta::lru_lookup(victim).expect("evictpage: victim has no LRU entry");
    let va = entry.vaddr.address();
    let pte = walk::walk(entry.pagetable, va, false).expect("evictpage: victim PTE vanished");
    assert!(pte.is_leaf(), "evictpage: victim PTE is not a resident leaf");

    let slot = swap::allocswap();
    swap::swapwrite(victim, slot);

    meta::lru_remove(victim);

    let swapped = PageTableEntry::new_swapped(slot, pte.flags());
    walk::write_pte(pte, swapped);
    walk::tlb_shootdown(va);

    frame::kfree(victim);
    meta::clear(victim);
    true
}
