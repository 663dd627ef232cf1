#![no_std]
#![no_main]

mod console;
mod lang_item;
mod logging;
mod sbi;
mod vm;

/// Brings up logging, the kernel heap, the frame allocator, the per-frame
/// metadata table, and the swap subsystem, in that dependency order —
/// each later step's `init` assumes the ones before it already ran.
#[riscv_rt::entry]
fn main() -> ! {
    logger::init();
    log::info!("booting");

    // SAFETY: called once, here, before anything allocates.
    unsafe { mm::heap::init_heap_allocator() };
    // SAFETY: called once, here, before any frame is allocated.
    unsafe { mm::frame::init() };
    let (offset, count) = mm::frame::frame_range();
    // SAFETY: called once, here, immediately after `frame::init`.
    unsafe { mm::meta::init(offset, count) };
    mm::swap::init();
    mm::swap::MemSwapIo::init();

    log::info!("memory subsystem ready");
    sbi::shutdown(false);
    loop {}
}
