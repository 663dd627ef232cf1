#![no_std]
#![feature(alloc_error_handler)]

extern crate alloc;

pub mod frame;
pub mod heap;
pub mod meta;
pub mod swap;

pub use frame::{kalloc, kfree};
pub use meta::{lru_add, lru_remove};
pub use swap::{allocswap, freeswap};
