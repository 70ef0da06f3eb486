//! # symseek - runtime ELF symbol resolution
//!
//! Resolves symbol names to absolute runtime addresses inside shared
//! libraries already mapped into the calling process, without going through
//! the platform's dynamic-linker lookup APIs. That matters for internal
//! symbols: `dlsym` only sees what a library exports, while this crate reads
//! the library's own tables the way the dynamic linker does and can also
//! fall back to the full (debug) symbol table when one is present.
//!
//! ## Resolution Pipeline
//!
//! ```text
//! open("libdemo.so")
//!   │
//!   ├─ locator:  scan /proc/self/maps, first path containing the fragment
//!   │            wins; its start address becomes the base, its full path
//!   │            replaces the fragment
//!   ├─ mapper:   mmap the on-disk file read-only (not the running image)
//!   └─ scanner:  one pass over the section headers, recording .dynsym,
//!                .dynstr, .symtab, .strtab, .hash, .gnu.hash and the
//!                load bias (vaddr - file offset of the anchoring PROGBITS)
//!
//! symbol_address("some_internal_fn")
//!   │
//!   ├─ GNU hash:  bloom-filter fast reject, then chain walk
//!   ├─ SysV hash: bucket + chain walk
//!   ├─ linear:    lazily built index over .symtab (also serves prefixes)
//!   └─ translate: base + value - bias, or null if anything is missing
//! ```
//!
//! ## Failure Model
//!
//! Nothing in this crate panics on malformed input. A library that is not
//! mapped, a file that cannot be opened, or sections that are absent or
//! inconsistent all degrade to "resolves nothing": [`ElfImg::open`] always
//! returns an image, and every query on a degraded image answers null or
//! `None`. Callers wanting the cause use [`ElfImg::try_open`], which
//! reports a typed [`ImageError`] instead.
//!
//! ## Example
//!
//! ```no_run
//! use symseek::ElfImg;
//!
//! let libc = ElfImg::open("libc.so");
//! if libc.is_valid() {
//!     let malloc: *mut std::ffi::c_void = libc.symbol_address("malloc");
//!     let _ = malloc;
//! }
//! ```

mod elf;
mod errors;
pub mod hash;
mod image;
mod maps;
mod sections;
#[cfg(test)]
mod testelf;

pub use errors::ImageError;
pub use image::ElfImg;
