use mio::net::TcpStream;
use mio::unix::SourceFd;
use mio::{Interest, Registry, Token};
use std::io;
use std::net::{Shutdown, SocketAddr};
use std::os::fd::AsRawFd;
use std::sync::Arc;

/// Where a connection stands with respect to the worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Registered for reads, no task in flight
    Idle,
    /// A worker task owns the socket; readiness is ignored
    Claimed,
    /// Deregistered and shut down
    Closed,
}

/// Reactor-side record of one client connection.
///
/// Only the reactor thread touches this record. Workers hold a clone of the
/// socket while the connection is claimed and report back through a
/// [`Notifier`](super::Notifier).
pub struct Connection {
    pub token: Token,
    pub addr: SocketAddr,
    stream: Arc<TcpStream>,
    state: ConnState,
    requests: u64,
}

impl Connection {
    /// Register `stream` for read readiness under `token`
    pub fn register(
        registry: &Registry,
        mut stream: TcpStream,
        token: Token,
        addr: SocketAddr,
    ) -> io::Result<Self> {
        registry.register(&mut stream, token, Interest::READABLE)?;
        Ok(Self {
            token,
            addr,
            stream: Arc::new(stream),
            state: ConnState::Idle,
            requests: 0,
        })
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    /// Requests dispatched on this connection so far
    pub fn requests(&self) -> u64 {
        self.requests
    }

    /// Claim the connection for one request task.
    ///
    /// Returns the socket to hand to the worker, or `None` when a task is
    /// already in flight or the connection is gone.
    pub fn claim(&mut self) -> Option<Arc<TcpStream>> {
        if self.state != ConnState::Idle {
            return None;
        }
        self.state = ConnState::Claimed;
        self.requests += 1;
        Some(Arc::clone(&self.stream))
    }

    /// Undo a claim whose task never reached the pool
    pub fn unclaim(&mut self) {
        if self.state == ConnState::Claimed {
            self.state = ConnState::Idle;
            self.requests -= 1;
        }
    }

    /// Return to idle after a task finished and re-arm read interest.
    ///
    /// Re-registering makes the poller report data that arrived while the
    /// connection was claimed, which edge-triggered polling would otherwise
    /// never announce again.
    pub fn release(&mut self, registry: &Registry) -> io::Result<()> {
        if self.state != ConnState::Claimed {
            return Ok(());
        }
        self.state = ConnState::Idle;
        let fd = self.stream.as_raw_fd();
        registry.reregister(&mut SourceFd(&fd), self.token, Interest::READABLE)
    }

    /// Deregister and shut the socket down. Idempotent.
    pub fn close(&mut self, registry: &Registry) {
        if self.state == ConnState::Closed {
            return;
        }
        self.state = ConnState::Closed;
        let fd = self.stream.as_raw_fd();
        let _ = registry.deregister(&mut SourceFd(&fd));
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}
