//! Generates `memory.x` for `riscv-rt`'s default linker script from this
//! subsystem's compile-time memory layout, so the two stay in sync instead
//! of drifting apart as two hand-maintained copies of the same numbers.
//!
//! Kernel bootstrap and linking are out of this crate's scope (they're an
//! external collaborator's job); this is the minimum glue needed to make the
//! crate link and boot standalone for testing.

use std::{env, fs, path::PathBuf};

use config::mm::{RAM_SIZE, RAM_START};

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    let memory_x = format!(
        "MEMORY\n\
         {{\n\
         \x20   RAM : ORIGIN = {RAM_START:#x}, LENGTH = {RAM_SIZE:#x}\n\
         }}\n\
         REGION_ALIAS(\"REGION_TEXT\", RAM);\n\
         REGION_ALIAS(\"REGION_RODATA\", RAM);\n\
         REGION_ALIAS(\"REGION_DATA\", RAM);\n\
         REGION_ALIAS(\"REGION_BSS\", RAM);\n\
         REGION_ALIAS(\"REGION_HEAP\", RAM);\n\
         REGION_ALIAS(\"REGION_STACK\", RAM);\n"
    );
    fs::write(out_dir.join("memory.x"), memory_x).unwrap();

    println!("cargo:rustc-link-search={}", out_dir.display());
    println!("cargo:rerun-if-changed=build.rs");
}
