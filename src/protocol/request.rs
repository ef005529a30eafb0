use crate::error::{Error, Result};
use crate::io::IoLimits;
use std::io::{ErrorKind, Read};
use std::time::Instant;

/// One assembled client request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Request text with the trailing `\r\n` removed
    Line(String),
    /// The buffer filled up before a terminator arrived
    Oversized,
}

impl Request {
    pub fn as_str(&self) -> &str {
        match self {
            Request::Line(line) => line,
            Request::Oversized => "",
        }
    }
}

/// Assemble one request from a non-blocking `reader` into `buf`.
///
/// Reads are retried until the data received so far ends in `\r\n` or the
/// buffer is full. The socket was reported readable once before this is
/// called; it is not handed back to the reactor mid-request, so `WouldBlock`
/// is simply retried. The whole request has to arrive within
/// `limits.timeout`, counted from the first read.
pub fn read_request<R: Read>(
    mut reader: R,
    buf: &mut [u8],
    limits: IoLimits<'_>,
) -> Result<Request> {
    let started = Instant::now();
    let mut filled = 0;

    while !is_complete(buf, filled) {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return Err(Error::ConnectionClosed),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::WouldBlock => limits.stall(started)?,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }

    if !ends_with_crlf(&buf[..filled]) {
        return Ok(Request::Oversized);
    }

    let body = &buf[..filled - 2];
    Ok(Request::Line(String::from_utf8_lossy(body).into_owned()))
}

#[inline]
fn is_complete(buf: &[u8], filled: usize) -> bool {
    filled == buf.len() || ends_with_crlf(&buf[..filled])
}

#[inline]
fn ends_with_crlf(data: &[u8]) -> bool {
    data.ends_with(b"\r\n")
}
