//! Line protocol: request assembly, command dispatch and response framing
//!
//! | Request      | Success                   | Error     |
//! |--------------|---------------------------|-----------|
//! | `GET <n>`    | `OK\r\n<line-bytes>\r\n`  | `ERR\r\n` |
//! | `QUIT`       | connection closed         | `ERR\r\n` |
//! | `SHUTDOWN`   | server shuts down         | `ERR\r\n` |
//! | anything else|                           | `ERR\r\n` |

pub mod command;
pub mod request;
pub mod response;

pub use command::{Command, Outcome};
pub use request::{read_request, Request};
pub use response::{ResponseSink, SocketSink, CRLF, ERR, OK};
