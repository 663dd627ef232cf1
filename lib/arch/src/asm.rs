//! Sv39 TLB and page-table-root control primitives.

use core::arch::asm;

use crate::address::VirtAddr;

/// Installs `root` (a physical frame number) as the active page table and
/// flushes the local TLB.
pub fn switch_pagetable(satp: usize) {
    unsafe {
        asm!(
            "csrw satp, {0}",
            "sfence.vma",
            in(reg) satp,
        );
    }
}

pub fn fence() {
    riscv::asm::fence();
}

pub fn fence_i() {
    riscv::asm::fence_i();
}

pub fn sfence_vma_all() {
    riscv::asm::sfence_vma_all();
}

/// Flushes the local TLB entry (if any) covering `va`.
pub fn sfence_vma_addr(va: VirtAddr) {
    riscv::asm::sfence_vma(0, va.to_usize());
}

/// TLB shootdown for a single page on the local hart, the form this
/// subsystem's walker and Evictor call after every PTE rewrite.
///
/// This design assumes a single hart services user traps (documented
/// open-question resolution), so a shootdown is just a local `sfence.vma`.
/// [`remote_shootdown`] is kept available for a multi-hart extension.
pub fn tlb_shootdown(va: VirtAddr) {
    sfence_vma_addr(va);
}

/// Broadcasts an `sfence.vma` IPI to every other hart via SBI RFENCE, for a
/// multi-hart deployment. Not invoked by this subsystem's single-hart
/// code paths; provided so a caller that does run multiple harts has a
/// ready-made shootdown primitive instead of needing to invent one.
pub fn remote_shootdown(va: VirtAddr, npages: usize) {
    sbi_rt::remote_sfence_vma(
        sbi_rt::HartMask::from_mask_base(usize::MAX, 0),
        va.to_usize(),
        npages * config::mm::PAGE_SIZE,
    );
}
