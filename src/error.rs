//! Unified error type.

use std::fmt;

/// The error type returned by manila's fallible operations.
///
/// Application-level errors (404, 422, etc.) are expressed as
/// [`Fault`](crate::Fault) envelope values, not as `Error`s. This type
/// surfaces infrastructure failures: binding the listener, accepting a
/// connection, or encoding an envelope body.
#[derive(Debug)]
pub enum Error {
    /// Socket-level I/O failure while accepting or serving a connection.
    Io(std::io::Error),
    /// The configured bind address could not be parsed as `host:port`.
    InvalidAddr(String),
    /// Binding the listener failed. Fatal: there is no fallback port.
    Bind { addr: String, source: std::io::Error },
    /// An envelope body failed to encode as JSON. Terminal for the
    /// response it belongs to; never retried.
    Serialize(serde_json::Error),
    /// The response could not be assembled, e.g. a cookie rendered to an
    /// invalid header value.
    Http(http::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::InvalidAddr(addr) => write!(f, "invalid bind address `{addr}`"),
            Self::Bind { addr, source } => write!(f, "bind {addr}: {source}"),
            Self::Serialize(e) => write!(f, "encode response body: {e}"),
            Self::Http(e) => write!(f, "assemble response: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) | Self::Bind { source: e, .. } => Some(e),
            Self::Serialize(e) => Some(e),
            Self::Http(e) => Some(e),
            Self::InvalidAddr(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialize(e)
    }
}
