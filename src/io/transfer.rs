use crate::error::{Error, Result};
use crate::index::Range;
use std::fs::File;
use std::io::{ErrorKind, Write};
use std::os::fd::AsFd;
use std::os::unix::fs::FileExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const COPY_CHUNK: usize = 64 * 1024;

static NEVER_CANCELLED: AtomicBool = AtomicBool::new(false);

/// Bounds on how long a worker may spin on a non-blocking socket
#[derive(Debug, Clone, Copy)]
pub struct IoLimits<'a> {
    /// Longest stall tolerated; `None` waits for as long as it takes
    pub timeout: Option<Duration>,
    /// Set when the pool wants in-flight work abandoned
    pub cancel: &'a AtomicBool,
}

impl IoLimits<'static> {
    /// No timeout and no cancellation, for sinks that never block
    pub fn unbounded() -> Self {
        IoLimits {
            timeout: None,
            cancel: &NEVER_CANCELLED,
        }
    }
}

impl IoLimits<'_> {
    /// Back off after `WouldBlock`, given when the stall began.
    pub fn stall(&self, since: Instant) -> Result<()> {
        if self.cancel.load(Ordering::Acquire) {
            return Err(Error::Shutdown);
        }
        if self.timeout.is_some_and(|t| since.elapsed() >= t) {
            return Err(Error::RequestTimeout);
        }
        thread::yield_now();
        Ok(())
    }
}

/// Write all of `data`, spinning while a non-blocking peer is full.
///
/// A peer that accepts nothing for `limits.timeout` is given up on. Failures
/// here belong to the connection, never to the served data.
pub fn write_fully<W: Write>(out: &mut W, mut data: &[u8], limits: IoLimits<'_>) -> Result<()> {
    let mut progress = Instant::now();
    while !data.is_empty() {
        match out.write(data) {
            Ok(0) => return Err(Error::ConnectionClosed),
            Ok(n) => {
                data = &data[n..];
                progress = Instant::now();
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => limits.stall(progress)?,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Copy `range` of `file` into `out` through a process buffer.
///
/// Byte-for-byte equivalent to [`send_range`]; used where `sendfile` is not
/// available and to verify the zero-copy path.
pub fn copy_range<W: Write>(
    file: &File,
    range: Range,
    out: &mut W,
    limits: IoLimits<'_>,
) -> Result<()> {
    let mut chunk = vec![0u8; COPY_CHUNK.min(range.size as usize)];
    let mut position = range.offset;

    while position < range.end() {
        let want = chunk.len().min((range.end() - position) as usize);
        match file.read_at(&mut chunk[..want], position) {
            Ok(0) => return Err(Error::corrupt("text file ended inside a line")),
            Ok(n) => {
                write_fully(out, &chunk[..n], limits)?;
                position += n as u64;
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(Error::data(e)),
        }
    }
    Ok(())
}

/// Move `range` of `file` straight to `socket` with `sendfile(2)`.
///
/// The kernel may move fewer bytes than requested, so this loops until the
/// whole range has gone out. The line terminator is never part of `range`.
/// A full socket is waited on under the same rules as [`write_fully`].
#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn send_range<S>(file: &File, socket: &S, range: Range, limits: IoLimits<'_>) -> Result<()>
where
    S: AsFd,
    for<'a> &'a S: Write,
{
    use nix::errno::Errno;
    use nix::sys::sendfile::sendfile;

    let mut offset = libc::off_t::try_from(range.offset)
        .map_err(|_| Error::corrupt(format!("line offset {} out of range", range.offset)))?;
    let mut sent: u64 = 0;
    let mut progress = Instant::now();

    while sent < range.size {
        let remaining = usize::try_from(range.size - sent).unwrap_or(usize::MAX);
        match sendfile(socket.as_fd(), file.as_fd(), Some(&mut offset), remaining) {
            Ok(0) => return Err(Error::corrupt("text file ended inside a line")),
            Ok(n) => {
                sent += n as u64;
                progress = Instant::now();
            }
            Err(Errno::EAGAIN) => limits.stall(progress)?,
            Err(Errno::EINTR) => {}
            Err(Errno::EIO) => return Err(Error::data(Errno::EIO.into())),
            Err(e) => return Err(Error::Io(e.into())),
        }
    }
    Ok(())
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub fn send_range<S>(file: &File, socket: &S, range: Range, limits: IoLimits<'_>) -> Result<()>
where
    S: AsFd,
    for<'a> &'a S: Write,
{
    let mut out = socket;
    copy_range(file, range, &mut out, limits)
}
