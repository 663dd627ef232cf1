//! Per-process address space: a page-table root plus the flat set of
//! operations that grow, shrink, copy, and tear it down.
//!
//! No VMA tree — every user mapping is an independent leaf PTE, grown and
//! shrunk one page at a time the way xv6's `uvm*` family does it. A CoW
//! clone and `mmap`/`shm`/ELF loading are out of scope; `uvmcopy` here is
//! the plain eager-copy form.

use alloc::vec::Vec;

use arch::{PhysAddr, PhysPageNum, PteFlags, VirtAddr};
use config::mm::PAGE_SIZE;
use mm::{frame, meta, swap};
use systype::{SysError, SysResult};

use super::{fault, maxva_pages, walk};

/// One process's page table, identified by its root frame.
///
/// Deliberately a thin newtype around the root rather than a struct that
/// also tracks VMAs or a size field — this subsystem's per-page metadata
/// table already knows which frames are mapped where, so nothing here
/// needs duplicating.
pub struct AddrSpace {
    root: PhysPageNum,
}

impl AddrSpace {
    pub fn root(&self) -> PhysPageNum {
        self.root
    }

    /// Allocates a fresh, empty page-table root.
    pub fn uvmcreate() -> SysResult<Self> {
        let root = frame::kalloc().ok_or(SysError::ENOMEM)?;
        // SAFETY: just allocated, not yet visible elsewhere.
        unsafe { root.as_bytes_mut() }.fill(0);
        meta::mark_page_table(root);
        Ok(Self { root })
    }

    /// Loads the first user page (typically `initcode`) at virtual address
    /// 0, for the very first process in the system.
    ///
    /// # Panics
    ///
    /// Panics if `image` is larger than one page.
    pub fn uvmfirst(&mut self, image: &[u8]) -> SysResult<()> {
        assert!(image.len() <= PAGE_SIZE, "uvmfirst: image exceeds one page");
        let frame = frame::kalloc().ok_or(SysError::ENOMEM)?;
        // SAFETY: just allocated, not yet visible elsewhere.
        let bytes = unsafe { frame.as_bytes_mut() };
        bytes.fill(0);
        bytes[..image.len()].copy_from_slice(image);
        walk::mappages(
            self.root,
            VirtAddr::new(0),
            PAGE_SIZE,
            PhysAddr::from(frame),
            PteFlags::R | PteFlags::W | PteFlags::X | PteFlags::U,
        )
    }

    /// Grows the address space from `old_size` to `new_size` bytes,
    /// allocating and mapping one zeroed frame per new page.
    ///
    /// Rolls back (unmapping and freeing whatever it already installed)
    /// and returns `ENOMEM` if allocation runs out partway through.
    ///
    /// # Errors
    ///
    /// Returns `EINVAL` if `new_size` would exceed the user ceiling.
    pub fn uvmalloc(&mut self, old_size: usize, new_size: usize, perm: PteFlags) -> SysResult<usize> {
        if new_size <= old_size {
            return Ok(old_size);
        }
        if new_size > maxva_pages() * PAGE_SIZE {
            return Err(SysError::EINVAL);
        }

        let old_top = VirtAddr::new(old_size).page_round_up();
        let mut va = old_top;
        let new_top = VirtAddr::new(new_size).page_round_up().to_usize();
        while va.to_usize() < new_top {
            match frame::kalloc() {
                Some(frame) => {
                    // SAFETY: just allocated, not yet visible elsewhere.
                    unsafe { frame.as_bytes_mut() }.fill(0);
                    if walk::mappages(self.root, va, PAGE_SIZE, PhysAddr::from(frame), perm | PteFlags::U).is_err() {
                        frame::kfree(frame);
                        self.uvmdealloc(va.to_usize(), old_top.to_usize());
                        return Err(SysError::ENOMEM);
                    }
                }
                None => {
                    let grown = va.to_usize();
                    self.uvmdealloc(grown, old_top.to_usize());
                    return Err(SysError::ENOMEM);
                }
            }
            va = VirtAddr::new(va.to_usize() + PAGE_SIZE);
        }
        Ok(new_size)
    }

    /// Shrinks the address space from `old_size` to `new_size` bytes,
    /// unmapping and freeing (or releasing the swap slot for) every page in
    /// between. No-op if `new_size >= old_size`.
    pub fn uvmdealloc(&mut self, old_size: usize, new_size: usize) -> usize {
        if new_size >= old_size {
            return old_size;
        }
        let old_top = VirtAddr::new(old_size).page_round_up().to_usize();
        let new_top = VirtAddr::new(new_size).page_round_up().to_usize();
        if old_top > new_top {
            let npages = (old_top - new_top) / PAGE_SIZE;
            walk::uvmunmap(self.root, VirtAddr::new(new_top), npages, true);
        }
        new_size
    }

    /// Unmaps and frees every user page below `maxva_pages()`, then frees
    /// the page-table frames themselves.
    pub fn uvmfree(&mut self, size: usize) {
        if size > 0 {
            let top = VirtAddr::new(size).page_round_up().to_usize();
            walk::uvmunmap(self.root, VirtAddr::new(0), top / PAGE_SIZE, true);
        }
        walk::freewalk(self.root);
    }

    /// Eagerly copies every mapped page below `size` bytes into `child`,
    /// resolving swapped-out source pages by faulting them back in first.
    ///
    /// Rolls back everything it mapped into `child` and returns `ENOMEM` on
    /// any failure partway through.
    pub fn uvmcopy(&mut self, child: &mut AddrSpace, size: usize) -> SysResult<()> {
        let npages = VirtAddr::new(size).page_round_up().to_usize() / PAGE_SIZE;
        for i in 0..npages {
            let va = VirtAddr::new(i * PAGE_SIZE);
            let entry = match walk::walk(self.root, va, false) {
                Some(e) if e.is_leaf() || e.is_swapped() => e,
                _ => continue,
            };
            // Strip SWAP (set on the swapped-out source) and V (not yet
            // installed in the child); `mappages` ORs in V itself.
            let perm = entry.flags() - PteFlags::SWAP - PteFlags::V;
            let dst = match frame::kalloc() {
                Some(d) => d,
                None => {
                    child.uvmdealloc(i * PAGE_SIZE, 0);
                    return Err(SysError::ENOMEM);
                }
            };

            if entry.is_swapped() {
                // The parent's PTE and swap slot are left exactly as they
                // are; only the child gets a materialized copy.
                swap::swapread(dst, entry.swap_slot());
            } else {
                let src = entry.ppn();
                // SAFETY: `dst` was just allocated and `src` is a mapped
                // leaf this call already holds a reference into.
                unsafe { dst.as_bytes_mut() }.copy_from_slice(unsafe { src.as_bytes_mut() });
            }

            if walk::mappages(child.root, va, PAGE_SIZE, PhysAddr::from(dst), perm).is_err() {
                frame::kfree(dst);
                child.uvmdealloc(i * PAGE_SIZE, 0);
                return Err(SysError::ENOMEM);
            }
        }
        Ok(())
    }

    /// Clears the `U` bit on the PTE mapping `va`, the primitive `exec`
    /// uses to protect a guard page below a growing stack.
    ///
    /// # Panics
    ///
    /// Panics if there is no mapping at `va`.
    pub fn uvmclear(&mut self, va: VirtAddr) {
        let entry = walk::walk(self.root, va, false).expect("uvmclear: no mapping at va");
        let cleared = arch::PageTableEntry::new(entry.ppn(), entry.flags() - PteFlags::U);
        walk::write_pte(entry, cleared);
        walk::tlb_shootdown(va);
    }

    /// Translates a user virtual address to its backing physical address,
    /// resolving a swapped-out page first.
    ///
    /// # Errors
    ///
    /// Returns `EFAULT` if `va` has no mapping, or the mapping isn't a
    /// user-accessible leaf, or resolving it runs out of memory.
    pub fn walkaddr(&mut self, va: VirtAddr) -> SysResult<PhysAddr> {
        self.resolve_if_swapped(va)?;
        let entry = walk::walk(self.root, va, false).ok_or(SysError::EFAULT)?;
        if !entry.is_leaf() || !entry.is_user() {
            return Err(SysError::EFAULT);
        }
        Ok(entry.ppn().address())
    }

    /// If the PTE mapping `va` is currently swapped out, drives the
    /// page-fault handler to bring it back in. No-op otherwise (including
    /// when `va` has no mapping at all — the caller's subsequent lookup
    /// reports that).
    fn resolve_if_swapped(&mut self, va: VirtAddr) -> SysResult<()> {
        let is_swapped = matches!(walk::walk(self.root, va, false), Some(e) if e.is_swapped());
        if !is_swapped {
            return Ok(());
        }
        match fault::handle_page_fault(self.root, va) {
            fault::FaultOutcome::Resolved => Ok(()),
            fault::FaultOutcome::OutOfMemory => Err(SysError::ENOMEM),
            fault::FaultOutcome::NotPresent => Err(SysError::EFAULT),
        }
    }

    /// Copies `src` into the user address space starting at `dst_va`,
    /// spanning as many pages as `src.len()` requires.
    ///
    /// # Errors
    ///
    /// Returns `EFAULT` if any destination page is unmapped, not writable,
    /// or not user-accessible.
    pub fn copyout(&mut self, dst_va: VirtAddr, src: &[u8]) -> SysResult<()> {
        let mut remaining = src;
        let mut va = dst_va.to_usize();
        while !remaining.is_empty() {
            let page_base = va & !(PAGE_SIZE - 1);
            let offset = va - page_base;
            let pa = self.walkaddr(VirtAddr::new(page_base))?;
            let entry = walk::walk(self.root, VirtAddr::new(page_base), false).ok_or(SysError::EFAULT)?;
            if !entry.flags().contains(PteFlags::W) {
                return Err(SysError::EFAULT);
            }
            let n = remaining.len().min(PAGE_SIZE - offset);
            // SAFETY: `pa` was just validated as a mapped, writable,
            // user-accessible frame.
            let dst_bytes = unsafe { core::slice::from_raw_parts_mut((pa.to_usize() + offset) as *mut u8, n) };
            dst_bytes.copy_from_slice(&remaining[..n]);
            remaining = &remaining[n..];
            va = page_base + PAGE_SIZE;
        }
        Ok(())
    }

    /// Copies `dst.len()` bytes out of the user address space starting at
    /// `src_va`.
    ///
    /// # Errors
    ///
    /// Returns `EFAULT` if any source page is unmapped or not
    /// user-accessible.
    pub fn copyin(&mut self, dst: &mut [u8], src_va: VirtAddr) -> SysResult<()> {
        let mut remaining = dst;
        let mut va = src_va.to_usize();
        while !remaining.is_empty() {
            let page_base = va & !(PAGE_SIZE - 1);
            let offset = va - page_base;
            let pa = self.walkaddr(VirtAddr::new(page_base))?;
            let n = remaining.len().min(PAGE_SIZE - offset);
            // SAFETY: `pa` was just validated as a mapped, user-accessible
            // frame.
            let src_bytes = unsafe { core::slice::from_raw_parts((pa.to_usize() + offset) as *const u8, n) };
            remaining[..n].copy_from_slice(src_bytes);
            remaining = &mut core::mem::replace(&mut remaining, &mut [])[n..];
            va = page_base + PAGE_SIZE;
        }
        Ok(())
    }

    /// Copies a NUL-terminated string out of the user address space
    /// starting at `src_va`, up to `max` bytes including the terminator.
    ///
    /// # Errors
    ///
    /// Returns `EFAULT` if any page along the way is unmapped or not
    /// user-accessible, or `EINVAL` if no NUL byte is found within `max`
    /// bytes.
    pub fn copyinstr(&mut self, src_va: VirtAddr, max: usize) -> SysResult<Vec<u8>> {
        let mut out = Vec::with_capacity(max.min(64));
        let mut va = src_va.to_usize();
        while out.len() < max {
            let page_base = va & !(PAGE_SIZE - 1);
            let offset = va - page_base;
            let pa = self.walkaddr(VirtAddr::new(page_base))?;
            let avail = (PAGE_SIZE - offset).min(max - out.len());
            // SAFETY: `pa` was just validated as a mapped, user-accessible
            // frame.
            let page = unsafe { core::slice::from_raw_parts((pa.to_usize() + offset) as *const u8, avail) };
            match page.iter().position(|&b| b == 0) {
                Some(i) => {
                    out.extend_from_slice(&page[..=i]);
                    return Ok(out);
                }
                None => out.extend_from_slice(page),
            }
            va = page_base + PAGE_SIZE;
        }
        Err(SysError::EINVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore = "requires a booted kernel harness: frame allocation needs real RAM"]
    fn uvmalloc_then_uvmdealloc_round_trips_size() {
        let mut space = AddrSpace::uvmcreate().unwrap();
        let grown = space.uvmalloc(0, 3 * PAGE_SIZE, PteFlags::R | PteFlags::W).unwrap();
        assert_eq!(grown, 3 * PAGE_SIZE);
        let shrunk = space.uvmdealloc(grown, PAGE_SIZE);
        assert_eq!(shrunk, PAGE_SIZE);
        space.uvmfree(shrunk);
    }

    #[test]
    #[ignore = "requires a booted kernel harness: frame allocation needs real RAM"]
    fn uvmalloc_rejects_size_above_maxva() {
        let mut space = AddrSpace::uvmcreate().unwrap();
        let result = space.uvmalloc(0, maxva_pages() * PAGE_SIZE + PAGE_SIZE, PteFlags::R | PteFlags::W);
        assert_eq!(result, Err(SysError::EINVAL));
    }
}
