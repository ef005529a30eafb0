use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serving data unavailable: {0}")]
    DataUnavailable(#[source] io::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Request not completed before deadline")]
    RequestTimeout,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Server shutting down")]
    Shutdown,

    #[error("System error: {0}")]
    System(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap an I/O failure against the text file or its index
    pub fn data(err: io::Error) -> Self {
        Error::DataUnavailable(err)
    }

    /// Data corruption detected while serving (truncated file, broken index)
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Error::DataUnavailable(io::Error::new(io::ErrorKind::InvalidData, msg.into()))
    }

    /// Whether this error takes the whole server down rather than one connection
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::DataUnavailable(_))
    }
}
