//! Per-physical-frame metadata table and the circular doubly-linked LRU
//! list threaded through it.
//!
//! Indexed by frame number (offset by the same base the frame allocator
//! uses), so any frame is addressable from its PTE in O(1) without a
//! separate heap-allocated list node — an arena of metadata entries, `prev`
//! and `next` stored as indices into it, per the no-separately-allocated-
//! nodes constraint this design is built around.

use alloc::vec::Vec;
use core::cell::SyncUnsafeCell;

use arch::{PhysPageNum, VirtPageNum};
use mutex::SpinLock;

/// Fields guarded by the metadata lock: whether a frame is a page-table
/// node, and — mutually exclusive with that — which address space and
/// virtual address it's mapped at if it's on the LRU list.
#[derive(Clone, Copy)]
struct Meta {
    is_page_table: bool,
    in_lru: bool,
    pagetable: PhysPageNum,
    vaddr: VirtPageNum,
}

impl Default for Meta {
    fn default() -> Self {
        Self {
            is_page_table: false,
            in_lru: false,
            pagetable: PhysPageNum::new(0),
            vaddr: VirtPageNum::new(0),
        }
    }
}

/// Fields guarded by the LRU lock: the circular doubly-linked list links.
#[derive(Clone, Copy, Default)]
struct LruLinks {
    prev: Option<usize>,
    next: Option<usize>,
}

struct MetaTable {
    meta: SpinLock<Vec<Meta>>,
    lru: SpinLock<LruList>,
}

struct LruList {
    links: Vec<LruLinks>,
    head: Option<usize>,
    tail: Option<usize>,
    count: usize,
}

static TABLE: SyncUnsafeCell<Option<MetaTable>> = SyncUnsafeCell::new(None);
/// Offset between a frame's physical page number and its index into the
/// table, mirroring [`crate::frame`]'s offset over the same frame range.
static OFFSET: SyncUnsafeCell<usize> = SyncUnsafeCell::new(0);

fn table() -> &'static MetaTable {
    // SAFETY: `init` runs once, before any other access; `TABLE` is never
    // written again afterward.
    unsafe { (*TABLE.get()).as_ref().expect("meta table used before init") }
}

fn index_of(ppn: PhysPageNum) -> usize {
    // SAFETY: `OFFSET` is written once during init.
    ppn.to_usize() - unsafe { *OFFSET.get() }
}

/// Initializes the metadata table over the same `(offset, count)` frame
/// range the frame allocator was initialized with.
///
/// # Safety
///
/// Must be called exactly once, after [`crate::frame::init`].
pub unsafe fn init(offset: usize, count: usize) {
    let table = MetaTable {
        meta: SpinLock::new(vec_default(count)),
        lru: SpinLock::new(LruList {
            links: vec_default(count),
            head: None,
            tail: None,
            count: 0,
        }),
    };
    // SAFETY: single initialization, happens-before any other access.
    unsafe {
        *OFFSET.get() = offset;
        *TABLE.get() = Some(table);
    }
}

fn vec_default<T: Default + Clone>(count: usize) -> Vec<T> {
    let mut v = Vec::with_capacity(count);
    v.resize(count, T::default());
    v
}

/// Marks a frame as an intermediate page-table node. Mutually exclusive
/// with `in_lru`; the walker clears it and calls [`lru_add`] if the frame
/// is later repurposed (it never is, in practice — page-table frames live
/// until their address space is freed).
pub fn mark_page_table(ppn: PhysPageNum) {
    let idx = index_of(ppn);
    let mut meta = table().meta.lock();
    if let Some(m) = meta.get_mut(idx) {
        m.is_page_table = true;
        m.in_lru = false;
    }
}

/// Clears a frame's metadata entirely, returning it to the "uncategorized"
/// state. Called when a page-table frame is freed by `freewalk` and when
/// the Evictor clears a victim's entry after eviction.
pub fn clear(ppn: PhysPageNum) {
    let idx = index_of(ppn);
    let mut meta = table().meta.lock();
    if let Some(m) = meta.get_mut(idx) {
        *m = Meta::default();
    }
}

pub fn is_page_table(ppn: PhysPageNum) -> bool {
    let idx = index_of(ppn);
    table()
        .meta
        .lock()
        .get(idx)
        .is_some_and(|m| m.is_page_table)
}

pub fn in_lru(ppn: PhysPageNum) -> bool {
    let idx = index_of(ppn);
    table().meta.lock().get(idx).is_some_and(|m| m.in_lru)
}

/// Snapshot of an LRU-linked frame's owning address space and mapped
/// address, used by the Clock scan and the Evictor.
#[derive(Clone, Copy)]
pub struct LruEntry {
    pub pagetable: PhysPageNum,
    pub vaddr: VirtPageNum,
}

pub fn lru_lookup(ppn: PhysPageNum) -> Option<LruEntry> {
    let idx = index_of(ppn);
    let meta = table().meta.lock();
    let m = meta.get(idx)?;
    m.in_lru.then_some(LruEntry {
        pagetable: m.pagetable,
        vaddr: m.vaddr,
    })
}

fn unlink(lru: &mut LruList, idx: usize) {
    let LruLinks { prev, next } = lru.links[idx];
    match prev {
        Some(p) => lru.links[p].next = next,
        None => lru.head = next,
    }
    match next {
        Some(n) => lru.links[n].prev = prev,
        None => lru.tail = prev,
    }
    lru.links[idx] = LruLinks::default();
}

fn link_tail(lru: &mut LruList, idx: usize) {
    lru.links[idx] = LruLinks {
        prev: lru.tail,
        next: None,
    };
    match lru.tail {
        Some(t) => lru.links[t].next = Some(idx),
        None => lru.head = Some(idx),
    }
    lru.tail = Some(idx);
}

/// Idempotent relocation of `ppn` to the LRU tail, recording it as mapped
/// at `vaddr` under `pagetable`. If already linked, unlinks first without
/// touching the population count; the net effect is always "now at tail".
///
/// No-op (rather than a panic) if `ppn` is out of range, `vaddr` is a
/// kernel address, or the frame is a page-table node — the eviction path's
/// metadata clearing can race a concurrent caller of this function on a
/// frame that has just changed roles, and tolerating that is cheaper than
/// serializing against it.
pub fn lru_add(ppn: PhysPageNum, pagetable: PhysPageNum, vaddr: VirtPageNum, maxva_pages: usize) {
    let idx = index_of(ppn);
    let mut meta = table().meta.lock();
    let Some(m) = meta.get_mut(idx) else { return };
    if m.is_page_table || vaddr.to_usize() >= maxva_pages {
        return;
    }
    let was_linked = m.in_lru;
    m.in_lru = true;
    m.pagetable = pagetable;
    m.vaddr = vaddr;
    drop(meta);

    let mut lru = table().lru.lock();
    if was_linked {
        unlink(&mut lru, idx);
    } else {
        lru.count += 1;
    }
    link_tail(&mut lru, idx);
}

/// Unlinks `ppn` from the LRU list if linked, clearing its `in_lru` flag
/// and list links. No-op if not linked or out of range.
pub fn lru_remove(ppn: PhysPageNum) {
    let idx = index_of(ppn);
    let mut meta = table().meta.lock();
    let Some(m) = meta.get_mut(idx) else { return };
    if !m.in_lru {
        return;
    }
    m.in_lru = false;
    drop(meta);

    let mut lru = table().lru.lock();
    unlink(&mut lru, idx);
    lru.count -= 1;
}

/// Number of frames currently linked into the LRU list.
pub fn lru_len() -> usize {
    table().lru.lock().count
}

/// Frame number the table index `idx` denotes, the inverse of `index_of`.
pub fn ppn_of_index(idx: usize) -> PhysPageNum {
    // SAFETY: `OFFSET` is written once during init.
    PhysPageNum::new(idx + unsafe { *OFFSET.get() })
}

/// What the Clock scan's PTE-level probe, invoked once per candidate frame
/// while both locks are held, found for that frame.
pub enum ProbeResult {
    /// Rule 1: the PTE can't be resolved, isn't a valid resident user
    /// leaf, or lies in the kernel direct-map range.
    Skip,
    /// Rule 2: the Access bit was set (and the caller already cleared it).
    AccessedGiveAnotherLap,
    /// Rule 3: a clean, unaccessed resident user leaf — evict this one.
    Victim,
}

/// Runs the Clock replacement scan, holding the metadata and LRU locks for
/// its entire duration as the design requires.
///
/// `cursor` is the persistent clock-hand position (frame table index);
/// `probe` is called with each candidate's owning address space and
/// mapped address and must resolve and inspect (and, if accessed, clear)
/// its PTE without touching this module's locks — the PTE-mutation lock
/// is acquired after this one in the lock order, never before.
///
/// Returns `None` only if the LRU list is empty. Otherwise advances
/// `cursor` past the chosen victim and returns it, guaranteed to
/// terminate within one lap of the list (the termination rule forces a
/// victim on the `count`-th candidate if rule 3 never fires).
pub fn select_victim(
    cursor: &mut Option<usize>,
    mut probe: impl FnMut(LruEntry) -> ProbeResult,
) -> Option<PhysPageNum> {
    let mut meta = table().meta.lock();
    let mut lru = table().lru.lock();
    let head = lru.head?;
    let mut idx = cursor.unwrap_or(head);
    let attempts = lru.count;

    for attempt in 0..attempts {
        let m = meta[idx];
        let entry = LruEntry {
            pagetable: m.pagetable,
            vaddr: m.vaddr,
        };
        let result = if attempt + 1 == attempts {
            ProbeResult::Victim
        } else {
            probe(entry)
        };
        match result {
            ProbeResult::Victim => {
                *cursor = lru.links[idx].next.or(lru.head);
                return Some(ppn_of_index(idx));
            }
            ProbeResult::Skip => {
                idx = lru.links[idx].next.unwrap_or(head);
            }
            ProbeResult::AccessedGiveAnotherLap => {
                let next = lru.links[idx].next.unwrap_or(head);
                unlink(&mut lru, idx);
                link_tail(&mut lru, idx);
                idx = next;
            }
        }
    }
    unreachable!("select_victim: attempts == 0 implies lru.count == 0, handled by head check above")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reset(count: usize) {
        unsafe {
            init(0, count);
        }
    }

    #[test]
    fn add_then_remove_round_trips_population() {
        reset(8);
        let ppn = PhysPageNum::new(3);
        lru_add(ppn, PhysPageNum::new(0), VirtPageNum::new(1), usize::MAX);
        assert_eq!(lru_len(), 1);
        assert!(in_lru(ppn));
        lru_remove(ppn);
        assert_eq!(lru_len(), 0);
        assert!(!in_lru(ppn));
    }

    #[test]
    fn re_add_relinks_at_tail_without_double_counting() {
        reset(8);
        let a = PhysPageNum::new(1);
        let b = PhysPageNum::new(2);
        lru_add(a, PhysPageNum::new(0), VirtPageNum::new(1), usize::MAX);
        lru_add(b, PhysPageNum::new(0), VirtPageNum::new(2), usize::MAX);
        lru_add(a, PhysPageNum::new(0), VirtPageNum::new(1), usize::MAX);
        assert_eq!(lru_len(), 2);
        assert_eq!(table().lru.lock().tail, Some(index_of(a)));
    }

    #[test]
    fn walking_next_from_head_visits_every_linked_frame_once() {
        reset(8);
        for i in 0..5usize {
            lru_add(
                PhysPageNum::new(i),
                PhysPageNum::new(0),
                VirtPageNum::new(i),
                usize::MAX,
            );
        }
        let mut seen = 0;
        let mut cur = table().lru.lock().head;
        let mut guard = 0;
        while let Some(idx) = cur {
            seen += 1;
            cur = table().lru.lock().links[idx].next;
            guard += 1;
            assert!(guard <= 5);
        }
        assert_eq!(seen, lru_len());
    }

    #[test]
    fn select_victim_skips_accessed_entries_then_picks_clean_one() {
        reset(8);
        for i in 0..3usize {
            lru_add(
                PhysPageNum::new(i),
                PhysPageNum::new(0),
                VirtPageNum::new(i),
                usize::MAX,
            );
        }
        // Frames 0 and 1 report as "accessed" once, frame 2 is clean.
        let mut accessed_seen = [false; 3];
        let mut cursor = None;
        let victim = select_victim(&mut cursor, |entry| {
            let i = entry.vaddr.to_usize();
            if i < 2 && !accessed_seen[i] {
                accessed_seen[i] = true;
                ProbeResult::AccessedGiveAnotherLap
            } else {
                ProbeResult::Victim
            }
        });
        assert_eq!(victim, Some(PhysPageNum::new(2)));
    }

    #[test]
    fn select_victim_on_empty_list_returns_none() {
        reset(8);
        let mut cursor = None;
        assert!(select_victim(&mut cursor, |_| ProbeResult::Victim).is_none());
    }

    #[test]
    fn lru_add_rejects_a_page_table_frame() {
        reset(8);
        let ppn = PhysPageNum::new(4);
        mark_page_table(ppn);
        lru_add(ppn, PhysPageNum::new(0), VirtPageNum::new(1), usize::MAX);
        assert!(is_page_table(ppn));
        assert!(!in_lru(ppn));
        assert_eq!(lru_len(), 0);
    }
}
