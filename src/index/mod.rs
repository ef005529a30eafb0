//! Persistent line offset index
//!
//! The index is a sibling file `<text-file-name>.index` holding a table of
//! big-endian `u64` entries. Entry 0 is a zero sentinel and entry `k` is the
//! byte offset just past the terminator of line `k`, so a text file of `N`
//! lines produces `N + 1` entries and line `n` spans
//! `entry[n-1] .. entry[n] - 1`.
//!
//! All lookups are positioned reads against the table, so the cost of serving
//! a line is independent of the size of the text file. Performance beyond that
//! is left to the OS page cache.

mod builder;
mod reader;

pub use builder::{build, ensure_current, IndexStatus};
pub use reader::LineIndex;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Size of one index entry in bytes
pub const ENTRY_SIZE: u64 = 8;

/// Byte span of one line's content, terminator excluded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub offset: u64,
    pub size: u64,
}

impl Range {
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// One past the last content byte
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

/// Path of the index file that belongs to `text_path`
pub fn index_path_for(text_path: &Path) -> PathBuf {
    let mut name = OsString::from(text_path.as_os_str());
    name.push(".index");
    PathBuf::from(name)
}
