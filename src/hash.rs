//! The two symbol hash functions used by ELF dynamic linkers.
//!
//! Both are defined by the ABI, not by us: `.hash` sections are keyed by the
//! classic SysV hash, `.gnu.hash` sections by the djb2-style GNU hash. The
//! same name must hash identically here and in the linker that built the
//! image, or lookups silently miss.

/// Classic SysV ELF hash, used by `.hash` sections.
///
/// Accumulates four-bit shifts and folds the top nibble back down so the
/// value stays well distributed for long names.
#[must_use]
pub fn elf_hash(name: &str) -> u32 {
    let mut h: u32 = 0;
    for &byte in name.as_bytes() {
        h = (h << 4).wrapping_add(u32::from(byte));
        let g = h & 0xf000_0000;
        h ^= g;
        h ^= g >> 24;
    }
    h
}

/// GNU hash, used by `.gnu.hash` sections: djb2 variant with seed 5381,
/// `h = h * 33 + byte`.
#[must_use]
pub fn gnu_hash(name: &str) -> u32 {
    let mut h: u32 = 5381;
    for &byte in name.as_bytes() {
        h = h.wrapping_mul(33).wrapping_add(u32::from(byte));
    }
    h
}
