use super::index_path_for;
use crate::error::Result;
use memchr::memchr_iter;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

const SCAN_CHUNK: usize = 64 * 1024;

/// What `ensure_current` did to the index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
    /// No index existed, a new one was built
    Built,
    /// The text file was newer, the index was deleted and rebuilt
    Rebuilt,
    /// The existing index was kept
    Current,
}

/// Make sure the index for `text_path` exists and is not older than the text.
///
/// Called once at startup. An index whose modification time is not earlier
/// than the text file's is kept as is; anything else is replaced wholesale.
pub fn ensure_current(text_path: &Path) -> Result<IndexStatus> {
    let index_path = index_path_for(text_path);

    if !index_path.exists() {
        build(text_path)?;
        return Ok(IndexStatus::Built);
    }

    info!("Found existing index file {}", index_path.display());
    let text_modified = fs::metadata(text_path)?.modified()?;
    let index_modified = fs::metadata(&index_path)?.modified()?;

    if index_modified >= text_modified {
        info!("Skipping index build for {}", text_path.display());
        return Ok(IndexStatus::Current);
    }

    info!("Index for {} is stale, rebuilding", text_path.display());
    fs::remove_file(&index_path)?;
    build(text_path)?;
    Ok(IndexStatus::Rebuilt)
}

/// Scan `text_path` once and write its offset table next to it.
///
/// The table is written to a temporary sibling and renamed into place, so a
/// reader never observes a half-written index.
pub fn build(text_path: &Path) -> Result<PathBuf> {
    let index_path = index_path_for(text_path);
    let tmp_path = {
        let mut name = OsString::from(index_path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    };

    info!("Building index for {}", text_path.display());
    let start = Instant::now();

    let mut text = File::open(text_path)?;
    let mut out = BufWriter::with_capacity(SCAN_CHUNK, File::create(&tmp_path)?);

    let lines = match write_offsets(&mut text, &mut out) {
        Ok(lines) => lines,
        Err(e) => {
            drop(out);
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
    };

    out.into_inner().map_err(|e| e.into_error())?.sync_all()?;
    fs::rename(&tmp_path, &index_path)?;

    info!(
        "Finished building index of {} lines in {} ms",
        lines,
        start.elapsed().as_millis()
    );
    Ok(index_path)
}

/// Stream the sentinel and one cumulative offset per line into `out`.
///
/// Returns the number of lines indexed. A trailing line without `\n` still
/// gets an entry that accounts for a terminator, so its computed size is
/// its real length.
fn write_offsets<R: Read, W: Write>(text: &mut R, out: &mut W) -> std::io::Result<u64> {
    let mut chunk = vec![0u8; SCAN_CHUNK];
    let mut consumed: u64 = 0;
    let mut line_start: u64 = 0;
    let mut lines: u64 = 0;

    out.write_all(&0u64.to_be_bytes())?;

    loop {
        let n = match text.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        for pos in memchr_iter(b'\n', &chunk[..n]) {
            line_start = consumed + pos as u64 + 1;
            out.write_all(&line_start.to_be_bytes())?;
            lines += 1;
        }
        consumed += n as u64;
    }

    if consumed > line_start {
        out.write_all(&(consumed + 1).to_be_bytes())?;
        lines += 1;
    }

    out.flush()?;
    Ok(lines)
}
