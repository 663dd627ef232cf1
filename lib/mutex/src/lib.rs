#![no_std]

mod mutex;

pub use mutex::{MutexSupport, Spin, SpinLock, SpinNoIrq, SpinNoIrqLock};
