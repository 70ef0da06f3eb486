//! Locating a loaded image via the process's own `/proc/self/maps`.
//!
//! Each line of the listing carries an address range, a permissions field
//! and, for file-backed mappings, a trailing path. The first line whose path
//! contains the requested fragment wins; since the kernel lists segments in
//! address order, that is the lowest-addressed segment of the library.

use log::debug;
use std::fs;
use std::io;

/// Where a library was found in the current address space.
#[derive(Debug, Clone)]
pub(crate) struct LoadedImage {
    /// Start of the lowest-addressed mapped segment.
    pub base: usize,
    /// Full on-disk path taken from the listing, which may be more complete
    /// than the fragment the caller supplied.
    pub path: String,
}

/// Scan this process's mapping listing for the first entry whose path
/// contains `fragment`.
///
/// # Errors
/// Only if the listing itself cannot be read; an absent library is `Ok(None)`.
pub(crate) fn find_loaded(fragment: &str) -> io::Result<Option<LoadedImage>> {
    let maps = fs::read_to_string("/proc/self/maps")?;
    Ok(search(&maps, fragment))
}

fn search(maps: &str, fragment: &str) -> Option<LoadedImage> {
    for line in maps.lines() {
        // Anonymous and special mappings ([stack], [vdso]) carry no path.
        let Some(slash) = line.find('/') else { continue };
        let path = &line[slash..];
        if !path.contains(fragment) {
            continue;
        }
        let Some(dash) = line.find('-') else { continue };
        let Ok(base) = usize::from_str_radix(&line[..dash], 16) else {
            continue;
        };
        debug!("matched {fragment:?} at 0x{base:x} ({path})");
        return Some(LoadedImage { base, path: path.to_string() });
    }
    None
}
