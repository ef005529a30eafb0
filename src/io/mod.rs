//! Byte movement between the text file and client sockets

pub mod transfer;

pub use transfer::{copy_range, send_range, write_fully, IoLimits};
