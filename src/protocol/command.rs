use super::request::Request;
use super::response::ResponseSink;
use crate::error::Result;
use crate::index::LineIndex;
use std::fs::File;

/// The closed set of protocol commands.
///
/// Resolved from the first space-delimited token of a request, matched
/// case-sensitively. Tokens are separated by single spaces, so a tab, a
/// leading space or a doubled space makes the request malformed. Variants
/// are stateless; each one validates the rest of the request itself and
/// answers `ERR` when it does not fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `GET <n>`
    Get,
    /// `QUIT`
    Quit,
    /// `SHUTDOWN`
    Shutdown,
    /// Anything unrecognised
    Err,
}

/// What the connection should do once a command has run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Release the claim and wait for the next request
    Continue,
    /// Close this connection, nothing was sent
    Close,
    /// Begin server shutdown, nothing was sent
    Shutdown,
}

impl Command {
    /// Map a request to its command variant
    pub fn resolve(request: &Request) -> Self {
        let line = match request {
            Request::Line(line) => line,
            Request::Oversized => return Command::Err,
        };

        match line.split(' ').next() {
            Some("GET") => Command::Get,
            Some("QUIT") => Command::Quit,
            Some("SHUTDOWN") => Command::Shutdown,
            _ => Command::Err,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Get => "GET",
            Command::Quit => "QUIT",
            Command::Shutdown => "SHUTDOWN",
            Command::Err => "ERR",
        }
    }

    /// Run the command for `request`, writing any response into `sink`.
    ///
    /// Protocol errors are answered with `ERR` and never surface as `Err`;
    /// an `Err` return is either a connection failure or, when
    /// [`Error::is_fatal`](crate::Error::is_fatal), lost access to the data.
    pub fn execute<S: ResponseSink>(
        self,
        request: &Request,
        file: &File,
        index: &LineIndex,
        sink: &mut S,
    ) -> Result<Outcome> {
        let line = request.as_str();

        match self {
            Command::Get => {
                get(line, file, index, sink)?;
                Ok(Outcome::Continue)
            }
            Command::Quit if line == "QUIT" => Ok(Outcome::Close),
            Command::Shutdown if line == "SHUTDOWN" => Ok(Outcome::Shutdown),
            Command::Quit | Command::Shutdown | Command::Err => {
                sink.send_err()?;
                Ok(Outcome::Continue)
            }
        }
    }
}

/// `GET <n>`: exactly two tokens, the second a signed 64-bit line number.
/// Trailing spaces are ignored.
fn get<S: ResponseSink>(line: &str, file: &File, index: &LineIndex, sink: &mut S) -> Result<()> {
    let mut tokens = line.trim_end_matches(' ').split(' ').skip(1);
    let line_number = match (tokens.next(), tokens.next()) {
        (Some(arg), None) => arg.parse::<i64>().ok(),
        _ => None,
    };

    let range = match line_number {
        Some(n) => index.lookup(n)?,
        None => None,
    };

    match range {
        Some(range) => {
            sink.send_ok()?;
            sink.transfer(file, range)?;
            sink.send_crlf()
        }
        None => sink.send_err(),
    }
}
