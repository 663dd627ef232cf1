use core::panic::PanicInfo;

use crate::{println, sbi};

#[panic_handler]
fn panic_handler(info: &PanicInfo) -> ! {
    println!("{:?}", info);
    sbi::shutdown(true);
    loop {}
}
