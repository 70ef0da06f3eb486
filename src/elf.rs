//! Minimal ELF64 little-endian decoding primitives.
//!
//! Only what symbol resolution needs: the file header, section headers and
//! symbol entries, decoded field by field through bounds-checked reads.
//! Every accessor fails closed — a read past the end of the mapping yields
//! `None` instead of touching memory outside it, so a truncated or malformed
//! image degrades to "nothing found" rather than crashing.

pub(crate) const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
pub(crate) const ELFCLASS64: u8 = 2;
pub(crate) const ELFDATA2LSB: u8 = 1;

pub(crate) const SHT_PROGBITS: u32 = 1;
pub(crate) const SHT_SYMTAB: u32 = 2;
pub(crate) const SHT_STRTAB: u32 = 3;
pub(crate) const SHT_HASH: u32 = 5;
pub(crate) const SHT_DYNSYM: u32 = 11;
/// GNU vendor extension; not part of the base section-type enum.
pub(crate) const SHT_GNU_HASH: u32 = 0x6fff_fff6;

pub(crate) const STT_OBJECT: u8 = 1;
pub(crate) const STT_FUNC: u8 = 2;

/// On-disk size of one `Elf64_Sym` entry.
pub(crate) const SYM_SIZE: usize = 24;

pub(crate) fn u16_at(data: &[u8], offset: usize) -> Option<u16> {
    let end = offset.checked_add(2)?;
    let bytes: [u8; 2] = data.get(offset..end)?.try_into().ok()?;
    Some(u16::from_le_bytes(bytes))
}

pub(crate) fn u32_at(data: &[u8], offset: usize) -> Option<u32> {
    let end = offset.checked_add(4)?;
    let bytes: [u8; 4] = data.get(offset..end)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}

pub(crate) fn u64_at(data: &[u8], offset: usize) -> Option<u64> {
    let end = offset.checked_add(8)?;
    let bytes: [u8; 8] = data.get(offset..end)?.try_into().ok()?;
    Some(u64::from_le_bytes(bytes))
}

/// NUL-terminated byte string starting at `offset`, bounded by the end of
/// `data`. `None` if the offset is out of range or no terminator exists.
pub(crate) fn cstr_at(data: &[u8], offset: usize) -> Option<&[u8]> {
    let tail = data.get(offset..)?;
    let len = tail.iter().position(|&b| b == 0)?;
    Some(&tail[..len])
}

/// The fields of `Elf64_Ehdr` that section discovery needs.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Ehdr {
    pub shoff: u64,
    pub shentsize: u16,
    pub shnum: u16,
    pub shstrndx: u16,
}

impl Ehdr {
    /// Decode the header after validating the identification bytes.
    /// Anything that is not 64-bit little-endian ELF is rejected outright.
    pub(crate) fn parse(data: &[u8]) -> Option<Ehdr> {
        let ident = data.get(..16)?;
        if ident[..4] != ELF_MAGIC
            || ident[4] != ELFCLASS64
            || ident[5] != ELFDATA2LSB
        {
            return None;
        }
        Some(Ehdr {
            shoff: u64_at(data, 0x28)?,
            shentsize: u16_at(data, 0x3a)?,
            shnum: u16_at(data, 0x3c)?,
            shstrndx: u16_at(data, 0x3e)?,
        })
    }
}

/// The fields of `Elf64_Shdr` that classification needs.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Shdr {
    pub name: u32,
    pub kind: u32,
    pub addr: u64,
    pub offset: u64,
    pub size: u64,
    pub entsize: u64,
}

impl Shdr {
    pub(crate) fn parse(data: &[u8], offset: usize) -> Option<Shdr> {
        Some(Shdr {
            name: u32_at(data, offset)?,
            kind: u32_at(data, offset.checked_add(4)?)?,
            addr: u64_at(data, offset.checked_add(16)?)?,
            offset: u64_at(data, offset.checked_add(24)?)?,
            size: u64_at(data, offset.checked_add(32)?)?,
            entsize: u64_at(data, offset.checked_add(56)?)?,
        })
    }
}

/// The fields of `Elf64_Sym` that lookups need.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Sym {
    pub name: u32,
    pub info: u8,
    pub value: u64,
    pub size: u64,
}

impl Sym {
    pub(crate) fn parse(data: &[u8], offset: usize) -> Option<Sym> {
        Some(Sym {
            name: u32_at(data, offset)?,
            info: *data.get(offset.checked_add(4)?)?,
            value: u64_at(data, offset.checked_add(8)?)?,
            size: u64_at(data, offset.checked_add(16)?)?,
        })
    }

    /// Low nibble of `st_info`: the symbol type (`STT_*`).
    pub(crate) fn st_type(self) -> u8 {
        self.info & 0xf
    }
}
