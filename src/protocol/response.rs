use crate::error::Result;
use crate::index::Range;
use crate::io::{copy_range, send_range, write_fully, IoLimits};
use std::fs::File;
use std::io::Write;
use std::os::fd::AsFd;

/// Success marker
pub const OK: &[u8] = b"OK\r\n";
/// Error marker
pub const ERR: &[u8] = b"ERR\r\n";
/// Bare terminator
pub const CRLF: &[u8] = b"\r\n";

/// Where command responses go.
///
/// The socket implementation moves line bytes with `sendfile`; the `Vec<u8>`
/// implementation copies them, which is what tests compare against.
pub trait ResponseSink {
    /// Send the whole of `data`
    fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Send the bytes of `range` from `file`
    fn transfer(&mut self, file: &File, range: Range) -> Result<()>;

    fn send_ok(&mut self) -> Result<()> {
        self.send(OK)
    }

    fn send_err(&mut self) -> Result<()> {
        self.send(ERR)
    }

    fn send_crlf(&mut self) -> Result<()> {
        self.send(CRLF)
    }
}

impl ResponseSink for Vec<u8> {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        self.extend_from_slice(data);
        Ok(())
    }

    fn transfer(&mut self, file: &File, range: Range) -> Result<()> {
        copy_range(file, range, self, IoLimits::unbounded())
    }
}

/// Response sink over a (possibly non-blocking) client socket.
///
/// A peer that stops reading stalls writes; `limits` decides how long that
/// is tolerated.
pub struct SocketSink<'a, S> {
    socket: &'a S,
    limits: IoLimits<'a>,
}

impl<'a, S> SocketSink<'a, S>
where
    S: AsFd,
    for<'b> &'b S: Write,
{
    pub fn new(socket: &'a S, limits: IoLimits<'a>) -> Self {
        Self { socket, limits }
    }
}

impl<S> ResponseSink for SocketSink<'_, S>
where
    S: AsFd,
    for<'b> &'b S: Write,
{
    fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut out = self.socket;
        write_fully(&mut out, data, self.limits)
    }

    fn transfer(&mut self, file: &File, range: Range) -> Result<()> {
        send_range(file, self.socket, range, self.limits)
    }
}
