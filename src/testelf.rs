//! Builds minimal ELF64 images for tests.
//!
//! The layout mirrors what the scanner expects from real shared objects:
//! a null section first, `.dynsym`/`.dynstr` before the PROGBITS anchor,
//! both hash tables built over the single dynamic symbol "foo", and a
//! classic `.symtab`/`.strtab` pair carrying a few extra names for the
//! linear and prefix lookups. The section-header table sits at the end of
//! the file, as linkers emit it.

use crate::elf;
use crate::hash;

/// Virtual address of the PROGBITS anchor section.
pub(crate) const TEXT_ADDR: u64 = 0x2000;
/// File offset of the PROGBITS anchor section.
pub(crate) const TEXT_OFF: u64 = 0x1000;

/// Library-relative value of the dynamic symbol "foo".
pub(crate) const FOO_VALUE: u64 = 0x50;
/// Value of "foobar", present only in the classic symbol table.
pub(crate) const FOOBAR_VALUE: u64 = 0x60;
/// Value of "bar" (an OBJECT symbol), classic table only.
pub(crate) const BAR_VALUE: u64 = 0x70;

const SHDR_SIZE: usize = 64;

// Name offsets inside .shstrtab below.
const SHSTR: &[u8] = b"\0.dynsym\0.dynstr\0.text\0.gnu.hash\0.hash\0.symtab\0.strtab\0.shstrtab\0";
const N_DYNSYM: u32 = 1;
const N_DYNSTR: u32 = 9;
const N_TEXT: u32 = 17;
const N_GNU_HASH: u32 = 23;
const N_HASH: u32 = 33;
const N_SYMTAB: u32 = 39;
const N_STRTAB: u32 = 47;
const N_SHSTRTAB: u32 = 55;

// .dynstr: "foo" at offset 1.
const DYNSTR: &[u8] = b"\0foo\0";
// .strtab: foo@1, foobar@5, bar@12, zed@16.
const SYMSTR: &[u8] = b"\0foo\0foobar\0bar\0zed\0";

const STB_GLOBAL_FUNC: u8 = 0x12;
const STB_GLOBAL_OBJECT: u8 = 0x11;

fn sym(name: u32, info: u8, value: u64, size: u64) -> [u8; elf::SYM_SIZE] {
    let mut out = [0u8; elf::SYM_SIZE];
    out[0..4].copy_from_slice(&name.to_le_bytes());
    out[4] = info;
    out[6..8].copy_from_slice(&1u16.to_le_bytes()); // st_shndx: defined
    out[8..16].copy_from_slice(&value.to_le_bytes());
    out[16..24].copy_from_slice(&size.to_le_bytes());
    out
}

fn shdr(name: u32, kind: u32, addr: u64, offset: u64, size: u64, entsize: u64) -> [u8; SHDR_SIZE] {
    let mut out = [0u8; SHDR_SIZE];
    out[0..4].copy_from_slice(&name.to_le_bytes());
    out[4..8].copy_from_slice(&kind.to_le_bytes());
    out[16..24].copy_from_slice(&addr.to_le_bytes());
    out[24..32].copy_from_slice(&offset.to_le_bytes());
    out[32..40].copy_from_slice(&size.to_le_bytes());
    out[56..64].copy_from_slice(&entsize.to_le_bytes());
    out
}

/// Full image with the requested hash sections present.
pub(crate) fn build(with_gnu: bool, with_sysv: bool) -> Vec<u8> {
    build_impl(with_gnu, with_sysv, true)
}

/// Image whose section table carries no PROGBITS section at all, so the
/// load-bias precondition is never satisfied.
pub(crate) fn build_without_progbits() -> Vec<u8> {
    build_impl(true, true, false)
}

fn build_impl(with_gnu: bool, with_sysv: bool, with_progbits: bool) -> Vec<u8> {
    let mut out = vec![0u8; 64]; // Ehdr, filled in last
    let mut headers: Vec<[u8; SHDR_SIZE]> = vec![[0u8; SHDR_SIZE]]; // SHT_NULL

    // .dynsym: null entry plus "foo".
    let dynsym_off = out.len() as u64;
    out.extend_from_slice(&sym(0, 0, 0, 0));
    out.extend_from_slice(&sym(1, STB_GLOBAL_FUNC, FOO_VALUE, 0x10));
    headers.push(shdr(
        N_DYNSYM,
        elf::SHT_DYNSYM,
        0,
        dynsym_off,
        2 * elf::SYM_SIZE as u64,
        elf::SYM_SIZE as u64,
    ));

    let dynstr_off = out.len() as u64;
    out.extend_from_slice(DYNSTR);
    headers.push(shdr(N_DYNSTR, elf::SHT_STRTAB, 0, dynstr_off, DYNSTR.len() as u64, 0));

    // PROGBITS anchor at a fixed file offset so the bias is nonzero.
    out.resize(TEXT_OFF as usize, 0);
    out.extend_from_slice(&[0u8; 16]);
    if with_progbits {
        headers.push(shdr(N_TEXT, elf::SHT_PROGBITS, TEXT_ADDR, TEXT_OFF, 16, 0));
    }

    if with_gnu {
        let h = hash::gnu_hash("foo");
        let off = out.len() as u64;
        for word in [1u32, 1, 1, 6] {
            out.extend_from_slice(&word.to_le_bytes());
        }
        let bloom: u64 = (1 << (h % 64)) | (1 << ((h >> 6) % 64));
        out.extend_from_slice(&bloom.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes()); // bucket[0] -> symbol 1
        out.extend_from_slice(&(h | 1).to_le_bytes()); // chain: match + end marker
        headers.push(shdr(N_GNU_HASH, elf::SHT_GNU_HASH, 0, off, 32, 0));
    }

    if with_sysv {
        let off = out.len() as u64;
        // nbucket=1 nchain=2, bucket[0]=1, chain=[0, 0].
        for word in [1u32, 2, 1, 0, 0] {
            out.extend_from_slice(&word.to_le_bytes());
        }
        headers.push(shdr(N_HASH, elf::SHT_HASH, 0, off, 20, 0));
    }

    // Classic symbol table: "foo", "foobar", "bar", and a zero-sized "zed"
    // that the linear index must skip.
    let symtab_off = out.len() as u64;
    out.extend_from_slice(&sym(0, 0, 0, 0));
    out.extend_from_slice(&sym(1, STB_GLOBAL_FUNC, FOO_VALUE, 0x10));
    out.extend_from_slice(&sym(5, STB_GLOBAL_FUNC, FOOBAR_VALUE, 0x10));
    out.extend_from_slice(&sym(12, STB_GLOBAL_OBJECT, BAR_VALUE, 0x8));
    out.extend_from_slice(&sym(16, STB_GLOBAL_FUNC, 0x80, 0));
    headers.push(shdr(
        N_SYMTAB,
        elf::SHT_SYMTAB,
        0,
        symtab_off,
        5 * elf::SYM_SIZE as u64,
        elf::SYM_SIZE as u64,
    ));

    let symstr_off = out.len() as u64;
    out.extend_from_slice(SYMSTR);
    headers.push(shdr(N_STRTAB, elf::SHT_STRTAB, 0, symstr_off, SYMSTR.len() as u64, 0));

    let shstr_off = out.len() as u64;
    out.extend_from_slice(SHSTR);
    headers.push(shdr(N_SHSTRTAB, elf::SHT_STRTAB, 0, shstr_off, SHSTR.len() as u64, 0));

    let shoff = out.len() as u64;
    for header in &headers {
        out.extend_from_slice(header);
    }

    out[0..4].copy_from_slice(&elf::ELF_MAGIC);
    out[4] = elf::ELFCLASS64;
    out[5] = elf::ELFDATA2LSB;
    out[6] = 1; // EV_CURRENT
    out[0x28..0x30].copy_from_slice(&shoff.to_le_bytes());
    out[0x3a..0x3c].copy_from_slice(&(SHDR_SIZE as u16).to_le_bytes());
    out[0x3c..0x3e].copy_from_slice(&(headers.len() as u16).to_le_bytes());
    out[0x3e..0x40].copy_from_slice(&((headers.len() - 1) as u16).to_le_bytes());
    out
}
