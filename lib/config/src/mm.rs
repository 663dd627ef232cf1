//! Sv39 memory layout constants.
//!
//! Values mirror the fixed, compile-time-known layout of a small Sv39
//! teaching kernel: a 128 MiB RAM window starting at `KERNBASE`, a kernel
//! image living at the bottom of it, the remainder allocatable, and a fixed
//! user virtual-address ceiling with the trampoline page pinned at the top.

/// Page size in bytes.
pub const PAGE_SIZE: usize = 4096;
/// Width of the in-page byte offset.
pub const PAGE_OFFSET_WIDTH: usize = 12;

/// Width of a physical address in Sv39 (bits 0..56 significant).
pub const PA_WIDTH_SV39: usize = 56;
/// Width of a virtual address in Sv39 (bits 0..39 significant, sign-extended).
pub const VA_WIDTH_SV39: usize = 39;
/// Width of a physical page number.
pub const PPN_WIDTH_SV39: usize = PA_WIDTH_SV39 - PAGE_OFFSET_WIDTH;
/// Width of a virtual page number.
pub const VPN_WIDTH_SV39: usize = VA_WIDTH_SV39 - PAGE_OFFSET_WIDTH;

/// Number of 9-bit index levels in an Sv39 page table.
pub const PT_LEVELS: usize = 3;
/// Number of entries in one page-table page (512 * 8 bytes = 4 KiB).
pub const PTE_PER_TABLE: usize = 512;

/// Highest valid user virtual address, one past the last byte a user
/// mapping may occupy. `TRAMPOLINE` sits one page below it, so ordinary
/// user mappings never reach it.
///
/// Matches the canonical xv6 choice: `1 << (9 + 9 + 9 + 12 - 1)`, i.e. one
/// bit short of the full 39-bit range, leaving the top PTE-tree branch
/// entirely for the trampoline and (if a kernel wanted one) a per-process
/// trap frame.
pub const MAXVA: usize = 1usize << (VA_WIDTH_SV39 - 1);

/// Virtual address of the trampoline page, mapped at the same address in
/// every address space's root page table.
pub const TRAMPOLINE: usize = MAXVA - PAGE_SIZE;

/// Start of physical RAM.
pub const RAM_START: usize = 0x8000_0000;
/// Size of physical RAM backing this kernel.
pub const RAM_SIZE: usize = 128 * 1024 * 1024;
/// One past the last usable physical address.
pub const PHYSTOP: usize = RAM_START + RAM_SIZE;

/// Start of the kernel's virtual address space (the direct map base).
pub const KERNBASE: usize = RAM_START;

/// Size of swap backing store this subsystem manages, in bytes. Capacity in
/// slots is `SWAPMAX / PAGE_SIZE`.
pub const SWAPMAX: usize = 8 * 1024 * 1024;

/// Size of the kernel heap used for non-page-granular kernel allocations
/// (metadata table storage, bitmaps, `Vec`s of tracked frames).
pub const KERNEL_HEAP_SIZE: usize = 4 * 1024 * 1024;

unsafe extern "C" {
    /// `riscv-rt`'s linker-provided heap-start symbol: the first byte past
    /// `.bss`, i.e. the first byte past the kernel image. Frames from here
    /// to `PHYSTOP` are allocatable. Bootstrap and linking are an external
    /// collaborator's job; this crate only reads the symbol it leaves behind.
    pub static _sheap: u8;
}

/// Physical address of the first allocatable frame, i.e. the end of the
/// kernel image rounded up to a page boundary.
pub fn kernel_end_phys() -> usize {
    let raw = &raw const _sheap as usize;
    (raw + PAGE_SIZE - 1) & !(PAGE_SIZE - 1)
}
