//! One-pass classification of the ELF section-header table.
//!
//! The scanner walks the header table once, in file order, and records byte
//! offsets into the mapped file for everything the lookup engines need:
//! dynamic symbols and their strings, the classic symbol table and its
//! strings, both hash tables, and the load bias. Nothing here dereferences
//! section contents beyond the hash headers; offsets are validated lazily by
//! the bounds-checked reads in `elf` when a lookup actually touches them.

use crate::elf::{self, Ehdr, Shdr};
use log::debug;

/// Byte offset and entry count of one symbol table inside the mapping.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SymbolTable {
    pub offset: usize,
    pub count: usize,
}

/// Layout of a SysV `.hash` section: two header words, then `nbucket`
/// bucket words, then `nchain` chain words.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SysvHash {
    pub nbucket: u32,
    pub nchain: u32,
    pub bucket: usize,
    pub chain: usize,
}

/// Layout of a `.gnu.hash` section: four header words, `bloom_size` 64-bit
/// bloom words, `nbucket` bucket words, then the chain array whose first
/// entry corresponds to symbol index `symndx`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GnuHash {
    pub nbucket: u32,
    pub symndx: u32,
    pub bloom_size: u32,
    pub shift: u32,
    pub bloom: usize,
    pub bucket: usize,
    pub chain: usize,
}

/// Everything one pass over the section-header table yields. Absent or
/// unusable sections simply stay `None`; each lookup engine tolerates that
/// independently.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Sections {
    pub dynsym: Option<SymbolTable>,
    pub dynstr: Option<usize>,
    pub symtab: Option<SymbolTable>,
    pub strtab: Option<usize>,
    /// Virtual-address minus file-offset delta of the first PROGBITS section
    /// seen after both `dynsym` and `dynstr`. `None` means no section ever
    /// satisfied that precondition and computed addresses cannot be trusted.
    pub bias: Option<i64>,
    pub sysv: Option<SysvHash>,
    pub gnu: Option<GnuHash>,
}

impl Sections {
    /// Classify every section header, in file order. `None` only when the
    /// data is not 64-bit little-endian ELF at all; a truncated or oddly
    /// laid out header table yields whatever was classified before the
    /// first unreadable entry.
    pub(crate) fn scan(data: &[u8]) -> Option<Sections> {
        let ehdr = Ehdr::parse(data)?;
        let mut out = Sections::default();

        let entsize = usize::from(ehdr.shentsize);
        let shoff = usize::try_from(ehdr.shoff).ok()?;
        let shstr = header_at(data, shoff, entsize, usize::from(ehdr.shstrndx))
            .and_then(|sh| usize::try_from(sh.offset).ok());

        for i in 0..usize::from(ehdr.shnum) {
            let Some(sh) = header_at(data, shoff, entsize, i) else { break };
            let Ok(offset) = usize::try_from(sh.offset) else { continue };

            match sh.kind {
                elf::SHT_DYNSYM => {
                    if out.dynsym.is_none() {
                        out.dynsym = Some(SymbolTable {
                            offset,
                            count: symbol_count(sh.size, sh.entsize),
                        });
                    }
                }
                elf::SHT_SYMTAB => {
                    if section_name(data, shstr, sh.name) == Some(b".symtab") {
                        out.symtab = Some(SymbolTable {
                            offset,
                            count: symbol_count(sh.size, sh.entsize),
                        });
                    }
                }
                elf::SHT_STRTAB => {
                    if out.dynstr.is_none() {
                        out.dynstr = Some(offset);
                    }
                    if section_name(data, shstr, sh.name) == Some(b".strtab") {
                        out.strtab = Some(offset);
                    }
                }
                elf::SHT_PROGBITS => {
                    // The bias anchor must follow both tables; earlier
                    // PROGBITS sections (e.g. .interp) are not load anchors.
                    if out.bias.is_none()
                        && out.dynstr.is_some()
                        && out.dynsym.is_some()
                    {
                        out.bias = Some(sh.addr as i64 - sh.offset as i64);
                    }
                }
                elf::SHT_HASH => {
                    out.sysv = parse_sysv_hash(data, offset);
                }
                elf::SHT_GNU_HASH => {
                    out.gnu = parse_gnu_hash(data, offset);
                }
                _ => {}
            }
        }

        debug!(
            "sections: dynsym={:?} symtab={:?} sysv={} gnu={} bias={:?}",
            out.dynsym.map(|t| t.count),
            out.symtab.map(|t| t.count),
            out.sysv.is_some(),
            out.gnu.is_some(),
            out.bias,
        );
        Some(out)
    }
}

fn header_at(data: &[u8], shoff: usize, entsize: usize, index: usize) -> Option<Shdr> {
    let offset = shoff.checked_add(index.checked_mul(entsize)?)?;
    Shdr::parse(data, offset)
}

fn section_name<'a>(data: &'a [u8], shstr: Option<usize>, name: u32) -> Option<&'a [u8]> {
    elf::cstr_at(data, shstr?.checked_add(name as usize)?)
}

fn symbol_count(size: u64, entsize: u64) -> usize {
    let per_entry = if entsize == 0 { elf::SYM_SIZE as u64 } else { entsize };
    usize::try_from(size / per_entry).unwrap_or(0)
}

fn parse_sysv_hash(data: &[u8], offset: usize) -> Option<SysvHash> {
    let nbucket = elf::u32_at(data, offset)?;
    let nchain = elf::u32_at(data, offset.checked_add(4)?)?;
    let bucket = offset.checked_add(8)?;
    let chain = bucket.checked_add((nbucket as usize).checked_mul(4)?)?;
    Some(SysvHash { nbucket, nchain, bucket, chain })
}

fn parse_gnu_hash(data: &[u8], offset: usize) -> Option<GnuHash> {
    let nbucket = elf::u32_at(data, offset)?;
    let symndx = elf::u32_at(data, offset.checked_add(4)?)?;
    let bloom_size = elf::u32_at(data, offset.checked_add(8)?)?;
    let shift = elf::u32_at(data, offset.checked_add(12)?)?;
    let bloom = offset.checked_add(16)?;
    let bucket = bloom.checked_add((bloom_size as usize).checked_mul(8)?)?;
    let chain = bucket.checked_add((nbucket as usize).checked_mul(4)?)?;
    Some(GnuHash { nbucket, symndx, bloom_size, shift, bloom, bucket, chain })
}
