use crate::error::{Error, Result};
use crate::index::LineIndex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Resources owned by one worker thread.
///
/// Open text files and index handles are cached per path for the lifetime of
/// the thread. Nothing here is shared, so the hot path takes no locks; each
/// thread holds at most one handle of each kind per path.
pub struct WorkerContext {
    files: HashMap<PathBuf, File>,
    indexes: HashMap<PathBuf, LineIndex>,
    buffer: Box<[u8]>,
}

impl WorkerContext {
    pub fn new(request_buffer_size: usize) -> Self {
        Self {
            files: HashMap::new(),
            indexes: HashMap::new(),
            buffer: vec![0u8; request_buffer_size].into_boxed_slice(),
        }
    }

    /// The thread's request buffer
    pub fn buffer(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    /// Open text file and index for `path`, opening them on first use.
    ///
    /// Failing to open either one means the served data is gone.
    pub fn resources(&mut self, path: &Path) -> Result<(&File, &LineIndex)> {
        let file = match self.files.entry(path.to_path_buf()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(File::open(path).map_err(Error::data)?),
        };

        let index = match self.indexes.entry(path.to_path_buf()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let index = LineIndex::open(path).map_err(|e| match e {
                    Error::Io(io) => Error::data(io),
                    other => other,
                })?;
                entry.insert(index)
            }
        };

        Ok((file, index))
    }

    /// Number of cached (file, index) handles
    pub fn cached(&self) -> (usize, usize) {
        (self.files.len(), self.indexes.len())
    }
}
