//! Structured error types for image resolution.
//!
//! Only the strict surfaces (`ElfImg::try_open`, `ElfImg::from_file`) report
//! these; `ElfImg::open` logs them and degrades to an image that resolves
//! nothing.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("failed to read /proc/self/maps: {0}")]
    Maps(#[source] std::io::Error),

    #[error("no mapping matching {0:?} in /proc/self/maps")]
    NotLoaded(String),

    #[error("failed to open {path}: {source}")]
    Open { path: String, source: std::io::Error },

    #[error("failed to map {path}: {source}")]
    Map { path: String, source: std::io::Error },

    #[error("{path} is not a 64-bit little-endian ELF image")]
    BadImage { path: String },
}
