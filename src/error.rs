//! Error taxonomy for the 9P2000 client.
//!
//! A server typically reports failures by wrapping a POSIX errno value.
//! A client has no such obligation, so the variants here name the
//! failure directly instead of going through an errno indirection.

use std::fmt;
use std::io;

/// Crate-wide result alias.
pub type Result<T> = ::std::result::Result<T, Error>;

/// Errors returned by 9P2000 client operations.
#[derive(Debug)]
pub enum Error {
    /// Header decode failed, size mismatch, tag/type mismatch, truncated
    /// string/qid, or an unexpected reply shape for the verb that was
    /// sent.
    MalformedMessage(String),

    /// Received an even-numbered (T-message) reply, or a `Tversion` reply
    /// whose version string is neither "9P2000" nor an `Rerror`/"unknown".
    Unsupported(String),

    /// Server replied to `version` with the string `"unknown"`.
    UnsupportedProtocol,

    /// Server's negotiated `msize` exceeds this client's offered `MSIZE`.
    MessageTooLarge { negotiated: u32, max: u32 },

    /// An outbound message body would not fit the remaining buffer space.
    Overflow,

    /// A `walk` path has more than [`crate::fcall::MAXWEL`] elements.
    NameTooLong,

    /// No free slot in the fid table, or no fresh random fid could be
    /// drawn after `MAXFIDS` attempts.
    TableFull,

    /// `clunk`/`remove` of a fid not present in the table, or an attempt
    /// to delete the root fid through the table directly.
    BadFid,

    /// `walk` resolved fewer path elements than requested; the server
    /// stopped at `resolved` elements (see `walk(5)`).
    PartialWalk { resolved: u16 },

    /// A transport callback returned an error.
    TransportError(io::Error),

    /// The server replied with `Rerror`, carrying this message.
    ServerError(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MalformedMessage(msg) => write!(f, "malformed 9P message: {msg}"),
            Error::Unsupported(msg) => write!(f, "unsupported: {msg}"),
            Error::UnsupportedProtocol => {
                write!(f, "server does not understand the 9P2000 version string")
            }
            Error::MessageTooLarge { negotiated, max } => write!(
                f,
                "server negotiated msize {negotiated} exceeds client max {max}"
            ),
            Error::Overflow => write!(f, "message body exceeds available buffer space"),
            Error::NameTooLong => write!(f, "walk path exceeds the maximum of 16 name elements"),
            Error::TableFull => write!(f, "fid table is full"),
            Error::BadFid => write!(f, "fid not present, or attempted to free the root fid"),
            Error::PartialWalk { resolved } => {
                write!(f, "walk only resolved {resolved} of the requested elements")
            }
            Error::TransportError(e) => write!(f, "transport error: {e}"),
            Error::ServerError(msg) => write!(f, "server error: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::TransportError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::TransportError(e)
    }
}
