#![no_std]
#![allow(unused)]

pub mod address;
pub mod asm;
pub mod pte;

pub use address::{PhysAddr, PhysPageNum, VirtAddr, VirtPageNum};
pub use pte::{PageTableEntry, PteFlags};
