//! Network layer: per-connection state, socket setup and the worker → reactor channel

mod connection;
mod notify;

pub use connection::{ConnState, Connection};
pub use notify::{Completion, Notifier, ShutdownReason};

use crate::config::Config;
use mio::net::TcpStream;
use nix::sys::socket::{setsockopt, sockopt};
use std::io;

/// Apply latency and buffer tuning to a freshly accepted socket
pub fn tune_socket(stream: &TcpStream, config: &Config) -> io::Result<()> {
    stream.set_nodelay(config.tcp_nodelay)?;
    setsockopt(stream, sockopt::SndBuf, &config.socket_buffer_size)?;
    setsockopt(stream, sockopt::RcvBuf, &config.socket_buffer_size)?;
    Ok(())
}
