//! The parsed image: file mapping, lookup engines and address translation.
//!
//! An [`ElfImg`] is constructed once per target library. Construction locates
//! the loaded image in `/proc/self/maps`, maps the on-disk file read-only and
//! classifies its sections; every later query is a pure read over that state.
//! The only post-construction mutation is the lazily built linear index,
//! guarded by a `OnceLock` so concurrent first use stays race-free.

use crate::elf::{self, Sym};
use crate::errors::ImageError;
use crate::hash;
use crate::maps;
use crate::sections::Sections;
use log::{debug, error, warn};
use memmap2::Mmap;
use std::collections::BTreeMap;
use std::fs::File;
use std::ops::Bound;
use std::path::Path;
use std::ptr;
use std::sync::OnceLock;

/// A shared library mapped into the current process, opened from its on-disk
/// file for symbol resolution.
///
/// Resolution order is GNU hash, then SysV hash, then a linear scan of the
/// classic symbol table; the first engine reporting a nonzero value wins.
/// Absolute addresses are `base + value - bias`, where the bias is the
/// virtual-address/file-offset delta discovered during section scanning.
#[derive(Debug)]
pub struct ElfImg {
    path: String,
    base: Option<usize>,
    map: Option<Mmap>,
    sections: Sections,
    /// Name-to-value index over the classic symbol table, built on first use.
    linear: OnceLock<BTreeMap<Box<str>, u64>>,
}

impl ElfImg {
    /// Open the library whose mapped path contains `fragment`.
    ///
    /// Never fails loudly: if the library is not mapped into this process,
    /// or its file cannot be parsed, the returned image simply resolves
    /// nothing and [`is_valid`](Self::is_valid) reports accordingly.
    #[must_use]
    pub fn open(fragment: &str) -> Self {
        let mut img = Self::empty(fragment.to_string());
        match maps::find_loaded(fragment) {
            Ok(Some(found)) => {
                debug!("{} loaded at 0x{:x}", found.path, found.base);
                img.base = Some(found.base);
                img.path = found.path;
            }
            Ok(None) => debug!("no mapping matching {fragment:?} in /proc/self/maps"),
            Err(err) => error!("failed to read /proc/self/maps: {err}"),
        }
        if img.base.is_some() {
            if let Err(err) = img.load() {
                error!("failed to parse {}: {err}", img.path);
            }
        }
        img
    }

    /// Strict variant of [`open`](Self::open) reporting why resolution is
    /// unavailable instead of degrading silently.
    ///
    /// # Errors
    /// When the maps listing is unreadable, no mapping matches `fragment`,
    /// or the backing file cannot be opened, mapped or recognized as ELF64.
    pub fn try_open(fragment: &str) -> Result<Self, ImageError> {
        let found = maps::find_loaded(fragment)
            .map_err(ImageError::Maps)?
            .ok_or_else(|| ImageError::NotLoaded(fragment.to_string()))?;
        let mut img = Self::empty(found.path);
        img.base = Some(found.base);
        img.load()?;
        Ok(img)
    }

    /// Parse an on-disk ELF file that need not be mapped into this process.
    ///
    /// The base address stays unset, so offset queries work but address
    /// queries return null.
    ///
    /// # Errors
    /// When the file cannot be opened, mapped or recognized as ELF64.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ImageError> {
        let mut img = Self::empty(path.as_ref().to_string_lossy().into_owned());
        img.load()?;
        Ok(img)
    }

    fn empty(path: String) -> Self {
        ElfImg {
            path,
            base: None,
            map: None,
            sections: Sections::default(),
            linear: OnceLock::new(),
        }
    }

    /// Map the backing file read-only and scan its section headers. The
    /// mapping is owned by the image and released when it is dropped.
    #[allow(unsafe_code)]
    fn load(&mut self) -> Result<(), ImageError> {
        let open_err = |source| ImageError::Open { path: self.path.clone(), source };
        let file = File::open(&self.path).map_err(open_err)?;
        if file.metadata().map_err(open_err)?.len() == 0 {
            warn!("{} is empty", self.path);
        }
        // SAFETY: read-only shared mapping of a regular file, dropped
        // together with the image; no view outlives it.
        let map = unsafe { Mmap::map(&file) }
            .map_err(|source| ImageError::Map { path: self.path.clone(), source })?;
        let Some(sections) = Sections::scan(&map) else {
            return Err(ImageError::BadImage { path: self.path.clone() });
        };
        self.sections = sections;
        self.map = Some(map);
        Ok(())
    }

    /// Whether the library was found mapped into this process. Without a
    /// base address every address resolution returns null.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.base.is_some()
    }

    /// The image path, corrected to the full path from the maps listing
    /// when the locator matched.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Base address of the lowest mapped segment, if the library was found.
    #[must_use]
    pub fn base(&self) -> Option<usize> {
        self.base
    }

    /// Virtual-address/file-offset delta used for address translation.
    /// `None` means the scan never found a trustworthy anchor and address
    /// queries will refuse to guess.
    #[must_use]
    pub fn load_bias(&self) -> Option<i64> {
        self.sections.bias
    }

    /// Resolve a symbol name to its library-relative value, trying GNU hash,
    /// SysV hash and the linear symtab index in that order.
    #[must_use]
    pub fn symbol_offset(&self, name: &str) -> Option<u64> {
        if let Some(value) = nonzero(self.gnu_lookup(name, hash::gnu_hash(name))) {
            debug!("found {name} at offset 0x{value:x} in {} (gnu hash)", self.path);
            return Some(value);
        }
        if let Some(value) = nonzero(self.sysv_lookup(name, hash::elf_hash(name))) {
            debug!("found {name} at offset 0x{value:x} in {} (sysv hash)", self.path);
            return Some(value);
        }
        if let Some(value) = nonzero(self.linear_lookup(name)) {
            debug!("found {name} at offset 0x{value:x} in {} (symtab scan)", self.path);
            return Some(value);
        }
        None
    }

    /// Resolve the lexicographically smallest classic-symtab name extending
    /// `prefix` to its library-relative value.
    #[must_use]
    pub fn symbol_offset_by_prefix(&self, prefix: &str) -> Option<u64> {
        nonzero(self.prefix_lookup(prefix))
    }

    /// Resolve a symbol name to an absolute runtime pointer, or null when
    /// the name is unknown, the library is not mapped, or the load bias
    /// could not be determined.
    #[must_use]
    pub fn symbol_address<T>(&self, name: &str) -> *mut T {
        self.symbol_offset(name)
            .map_or(ptr::null_mut(), |value| self.absolute(value))
    }

    /// Prefix-matching variant of [`symbol_address`](Self::symbol_address),
    /// served by the linear index only.
    #[must_use]
    pub fn symbol_address_by_prefix<T>(&self, prefix: &str) -> *mut T {
        self.symbol_offset_by_prefix(prefix)
            .map_or(ptr::null_mut(), |value| self.absolute(value))
    }

    fn absolute<T>(&self, value: u64) -> *mut T {
        let Some(base) = self.base else { return ptr::null_mut() };
        let Some(bias) = self.sections.bias else {
            debug!(
                "load bias of {} undetermined, not translating offset 0x{value:x}",
                self.path
            );
            return ptr::null_mut();
        };
        base.wrapping_add(value as usize).wrapping_sub(bias as usize) as *mut T
    }

    fn data(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }

    fn dynsym_at(&self, index: u32) -> Option<Sym> {
        let table = self.sections.dynsym?;
        let index = index as usize;
        if index >= table.count {
            return None;
        }
        Sym::parse(self.data(), table.offset.checked_add(index * elf::SYM_SIZE)?)
    }

    fn dynsym_name_matches(&self, sym: Sym, name: &str) -> bool {
        let Some(strtab) = self.sections.dynstr else { return false };
        let resolved = strtab
            .checked_add(sym.name as usize)
            .and_then(|offset| elf::cstr_at(self.data(), offset));
        resolved == Some(name.as_bytes())
    }

    /// SysV `.hash` walk: bucket by hash, follow the chain until the zero
    /// terminator, require exact name equality.
    fn sysv_lookup(&self, name: &str, hash: u32) -> Option<u64> {
        let table = self.sections.sysv?;
        if table.nbucket == 0 {
            return None;
        }
        let data = self.data();
        let slot = (hash % table.nbucket) as usize;
        let mut index = elf::u32_at(data, table.bucket.checked_add(slot * 4)?)?;
        let mut hops = 0;
        while index != 0 {
            // A chain index at or past nchain, or more hops than entries,
            // means the table is malformed; fail closed.
            if index >= table.nchain || hops >= table.nchain {
                return None;
            }
            hops += 1;
            let sym = self.dynsym_at(index)?;
            if self.dynsym_name_matches(sym, name) {
                return Some(sym.value);
            }
            index = elf::u32_at(data, table.chain.checked_add(index as usize * 4)?)?;
        }
        None
    }

    /// `.gnu.hash` lookup: bloom-filter fast reject, then a chain walk from
    /// the bucket's starting symbol until an entry with the stop bit set.
    fn gnu_lookup(&self, name: &str, hash: u32) -> Option<u64> {
        const BLOOM_BITS: u32 = u64::BITS;
        let table = self.sections.gnu?;
        if table.nbucket == 0 || table.bloom_size == 0 {
            return None;
        }
        let data = self.data();

        let word_index = ((hash / BLOOM_BITS) % table.bloom_size) as usize;
        let word = elf::u64_at(data, table.bloom.checked_add(word_index * 8)?)?;
        // A shift wider than the hash means a corrupt header; shifted-out
        // bits simply contribute a zero bit position.
        let shifted = hash.checked_shr(table.shift).unwrap_or(0);
        let mask = (1u64 << (hash % BLOOM_BITS)) | (1u64 << (shifted % BLOOM_BITS));
        if word & mask != mask {
            // Provably absent; the chain is never touched.
            return None;
        }

        let slot = (hash % table.nbucket) as usize;
        let mut index = elf::u32_at(data, table.bucket.checked_add(slot * 4)?)?;
        if index < table.symndx {
            return None;
        }
        loop {
            let chain_off = (index - table.symndx) as usize * 4;
            let entry = elf::u32_at(data, table.chain.checked_add(chain_off)?)?;
            if (entry ^ hash) >> 1 == 0 {
                let sym = self.dynsym_at(index)?;
                if self.dynsym_name_matches(sym, name) {
                    return Some(sym.value);
                }
            }
            if entry & 1 == 1 {
                return None;
            }
            index = index.checked_add(1)?;
        }
    }

    /// The memoized name-to-value index over the classic symbol table.
    /// Only FUNC and OBJECT symbols with nonzero size are indexed; the
    /// first occurrence wins on duplicate names.
    fn linear_index(&self) -> &BTreeMap<Box<str>, u64> {
        self.linear.get_or_init(|| {
            let mut index = BTreeMap::new();
            let (Some(table), Some(strtab)) = (self.sections.symtab, self.sections.strtab)
            else {
                return index;
            };
            let data = self.data();
            for i in 0..table.count {
                let Some(offset) = table.offset.checked_add(i * elf::SYM_SIZE) else { break };
                let Some(sym) = Sym::parse(data, offset) else { break };
                if sym.size == 0
                    || (sym.st_type() != elf::STT_FUNC && sym.st_type() != elf::STT_OBJECT)
                {
                    continue;
                }
                let name = strtab
                    .checked_add(sym.name as usize)
                    .and_then(|off| elf::cstr_at(data, off))
                    .and_then(|bytes| std::str::from_utf8(bytes).ok());
                if let Some(name) = name {
                    index.entry(Box::from(name)).or_insert(sym.value);
                }
            }
            debug!("linear index over {} holds {} symbols", self.path, index.len());
            index
        })
    }

    fn linear_lookup(&self, name: &str) -> Option<u64> {
        self.linear_index().get(name).copied()
    }

    fn prefix_lookup(&self, prefix: &str) -> Option<u64> {
        let index = self.linear_index();
        let (name, value) = index
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .next()?;
        if !name.starts_with(prefix) {
            return None;
        }
        debug!("found {name} for prefix {prefix} at offset 0x{value:x} in {}", self.path);
        Some(*value)
    }
}

fn nonzero(value: Option<u64>) -> Option<u64> {
    value.filter(|&v| v != 0)
}
