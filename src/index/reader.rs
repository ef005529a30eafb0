use super::{index_path_for, Range, ENTRY_SIZE};
use crate::error::{Error, Result};
use std::fs::File;
use std::io::ErrorKind;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

/// Read-only handle onto one text file's index.
///
/// Never mutated after construction. Each worker thread opens its own handle,
/// so lookups on one handle are sequential by construction.
#[derive(Debug)]
pub struct LineIndex {
    file: File,
    path: PathBuf,
    total_lines: u64,
}

impl LineIndex {
    /// Open the index that belongs to `text_path`
    pub fn open(text_path: &Path) -> Result<Self> {
        let path = index_path_for(text_path);
        let file = File::open(&path)?;
        let len = file.metadata()?.len();

        Ok(Self {
            file,
            path,
            total_lines: (len / ENTRY_SIZE).saturating_sub(1),
        })
    }

    pub fn total_lines(&self) -> u64 {
        self.total_lines
    }

    /// Byte range of line `line_number` (1-based).
    ///
    /// Returns `Ok(None)` for line numbers outside `1..=total_lines`; that is
    /// "no such line", not a failure. Read errors against the index are
    /// reported as data unavailability.
    pub fn lookup(&self, line_number: i64) -> Result<Option<Range>> {
        if line_number < 1 || line_number as u64 > self.total_lines {
            return Ok(None);
        }

        let mut buf = [0u8; 16];
        let position = (line_number as u64 - 1) * ENTRY_SIZE;
        let mut read = 0;

        // A single pread may return less than asked for
        while read < buf.len() {
            match self.file.read_at(&mut buf[read..], position + read as u64) {
                Ok(0) => {
                    return Err(Error::corrupt(format!(
                        "index {} ends inside entry {}",
                        self.path.display(),
                        line_number
                    )))
                }
                Ok(n) => read += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::data(e)),
            }
        }

        let offset = be_u64(&buf[..8]);
        let next = be_u64(&buf[8..]);

        match next.checked_sub(offset).and_then(|span| span.checked_sub(1)) {
            Some(size) => Ok(Some(Range::new(offset, size))),
            None => Err(Error::corrupt(format!(
                "index {} has decreasing entries at line {}",
                self.path.display(),
                line_number
            ))),
        }
    }
}

fn be_u64(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    u64::from_be_bytes(raw)
}
