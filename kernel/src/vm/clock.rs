//! The Clock (second-chance) replacement scan, specialized to resolve each
//! LRU-linked candidate's PTE and apply the three-rule decision `mm::meta`
//! leaves to its caller.

use arch::PhysPageNum;
use mm::meta::{self, LruEntry, ProbeResult};
use mutex::SpinLock;

use super::walk;

static CURSOR: SpinLock<Option<usize>> = SpinLock::new(None);

/// Runs one Clock scan and returns the frame to evict, or `None` if no
/// frame is currently linked into the LRU list.
pub fn select_victim() -> Option<PhysPageNum> {
    let mut cursor = CURSOR.lock();
    meta::select_victim(&mut cursor, probe)
}

/// The PTE-level probe `mm::meta::select_victim` calls once per candidate.
///
/// Rule 1: not resolvable to a valid resident user leaf → skip.
/// Rule 2: Access bit set → clear it and give the page another lap.
/// Rule 3: clean and unaccessed → victim.
fn probe(entry: LruEntry) -> ProbeResult {
    let va = entry.vaddr.address();
    let Some(pte) = walk::walk(entry.pagetable, va, false) else {
        return ProbeResult::Skip;
    };
    if !pte.is_leaf() || !pte.is_user() {
        return ProbeResult::Skip;
    }
    if pte.is_accessed() {
        let mut cleared = *pte;
        cleared.clear_accessed();
        walk::write_pte(pte, cleared);
        walk::tlb_shootdown(va);
        return ProbeResult::AccessedGiveAnotherLap;
    }
    ProbeResult::Victim
}
