//! text-line-server: serves single lines of very large text files over TCP
//!
//! A client sends `GET <n>` and receives line `n` of the configured file.
//! Lookups go through a persistent offset index built once next to the text
//! file, so serving cost does not grow with the size of the file.
//!
//! # Architecture
//!
//! - One reactor thread on a mio event loop accepts sockets and detects readable connections
//! - A bounded worker pool runs requests, at most one in flight per connection
//! - Each worker owns its open file and index handles, no locks on the hot path
//! - Line bytes go from the file to the socket with `sendfile(2)`

/// Configuration management for the server
pub mod config;

/// Error types and result aliases
pub mod error;

/// Offset index build, staleness check and lookup
pub mod index;

/// Zero-copy and copy-based byte transfer
pub mod io;

/// Network layer for connection management
pub mod network;

/// Line protocol implementation
pub mod protocol;

/// Core server implementation
pub mod server;

/// Worker pool and request handling
pub mod worker;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use error::{Error, Result};
pub use server::Server;
