//! Address types and utilities for Sv39.
//!
//! Provides types for physical and virtual addresses and page numbers, and
//! conversions between them.

use config::mm::{PA_WIDTH_SV39, PAGE_SIZE, PPN_WIDTH_SV39, VA_WIDTH_SV39, VPN_WIDTH_SV39};

/// An address in physical memory defined in Sv39.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PhysAddr(usize);

impl PhysAddr {
    /// Creates a new `PhysAddr` from the given address.
    ///
    /// # Panics
    ///
    /// Panics if the upper 8 bits are not all equal to bit 55.
    pub fn new(addr: usize) -> Self {
        let tmp = addr as isize >> PA_WIDTH_SV39;
        debug_assert!(tmp == 0 || tmp == -1, "invalid physical address: {addr:#x}");
        Self(addr)
    }

    pub fn to_usize(self) -> usize {
        self.0
    }

    pub fn page_offset(self) -> usize {
        self.0 % PAGE_SIZE
    }

    pub fn is_page_aligned(self) -> bool {
        self.page_offset() == 0
    }

    pub fn page_number(self) -> PhysPageNum {
        PhysPageNum::new((self.0 / PAGE_SIZE) & ((1 << PPN_WIDTH_SV39) - 1))
    }
}

/// An address in virtual memory defined in Sv39.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct VirtAddr(usize);

impl VirtAddr {
    /// Creates a new `VirtAddr` from the given address.
    ///
    /// # Panics
    ///
    /// Panics if the upper 25 bits are not all equal to bit 38.
    pub fn new(addr: usize) -> Self {
        let tmp = addr as isize >> VA_WIDTH_SV39;
        debug_assert!(tmp == 0 || tmp == -1, "invalid virtual address: {addr:#x}");
        Self(addr)
    }

    pub fn to_usize(self) -> usize {
        self.0
    }

    pub fn page_offset(self) -> usize {
        self.0 % PAGE_SIZE
    }

    pub fn is_page_aligned(self) -> bool {
        self.page_offset() == 0
    }

    pub fn page_number(self) -> VirtPageNum {
        VirtPageNum::new((self.0 / PAGE_SIZE) & ((1 << VPN_WIDTH_SV39) - 1))
    }

    /// Rounds up to the next page boundary (no-op if already aligned).
    pub fn page_round_up(self) -> Self {
        Self::new((self.0 + PAGE_SIZE - 1) & !(PAGE_SIZE - 1))
    }
}

/// A physical page number defined in Sv39 (44 significant bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PhysPageNum(usize);

impl PhysPageNum {
    pub fn new(ppn: usize) -> Self {
        debug_assert!(
            ppn >> PPN_WIDTH_SV39 == 0,
            "invalid physical page number: {ppn:#x}"
        );
        Self(ppn)
    }

    pub fn to_usize(self) -> usize {
        self.0
    }

    pub fn address(self) -> PhysAddr {
        PhysAddr::new(self.0 << (64 - PPN_WIDTH_SV39) >> (64 - PA_WIDTH_SV39))
    }

    /// Borrows the page's contents as a byte array.
    ///
    /// # Safety
    ///
    /// The caller must hold exclusive access to the frame, and the running
    /// page table must identity-map physical RAM at its own address (true
    /// of this kernel's direct map).
    pub unsafe fn as_bytes_mut(self) -> &'static mut [u8; PAGE_SIZE] {
        unsafe { &mut *(self.address().to_usize() as *mut [u8; PAGE_SIZE]) }
    }
}

/// A virtual page number defined in Sv39 (27 significant bits, split into
/// three 9-bit indices for the three page-table levels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct VirtPageNum(usize);

impl VirtPageNum {
    pub fn new(vpn: usize) -> Self {
        debug_assert!(
            vpn >> VPN_WIDTH_SV39 == 0,
            "invalid virtual page number: {vpn:#x}"
        );
        Self(vpn)
    }

    pub fn to_usize(self) -> usize {
        self.0
    }

    pub fn address(self) -> VirtAddr {
        VirtAddr::new(self.0 << (64 - VPN_WIDTH_SV39) >> (64 - VA_WIDTH_SV39))
    }

    /// Splits this VPN into its three 9-bit level indices, level 2 (root)
    /// first and level 0 (leaf) last, the order the walker descends in.
    pub fn indices(self) -> [usize; 3] {
        let mut vpn = self.0;
        let mut idx = [0usize; 3];
        for i in (0..3).rev() {
            idx[i] = vpn & 0x1ff;
            vpn >>= 9;
        }
        idx
    }
}

impl From<PhysPageNum> for PhysAddr {
    fn from(ppn: PhysPageNum) -> Self {
        ppn.address()
    }
}

impl From<VirtPageNum> for VirtAddr {
    fn from(vpn: VirtPageNum) -> Self {
        vpn.address()
    }
}

impl From<usize> for PhysAddr {
    fn from(addr: usize) -> Self {
        Self::new(addr)
    }
}

impl From<usize> for VirtAddr {
    fn from(addr: usize) -> Self {
        Self::new(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_offset_roundtrip() {
        let pa = PhysAddr::new(0x8020_1234);
        assert_eq!(pa.page_offset(), 0x234);
        assert_eq!(pa.page_number().address().to_usize(), 0x8020_1000);
    }

    #[test]
    fn vpn_indices_split_9_9_9() {
        // va = (l2=3, l1=1, l0=7) << 12
        let va = ((3usize << 18) | (1 << 9) | 7) << 12;
        let vpn = VirtAddr::new(va).page_number();
        assert_eq!(vpn.indices(), [3, 1, 7]);
    }

    #[test]
    fn page_round_up_is_idempotent_when_aligned() {
        let va = VirtAddr::new(0x1000);
        assert_eq!(va.page_round_up(), va);
        assert_eq!(VirtAddr::new(0x1001).page_round_up().to_usize(), 0x2000);
    }
}
