use std::fmt;
use std::io;

/// Result of every fallible operation in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-level error codes, the few the library itself produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppError {
    /// A buffer or length limit would be exceeded.
    Overflow,
    /// Semantically invalid data, e.g. a short read or a bad wire tag.
    Invalid,
}

/// Errors are carried in one of four categories. Callers discriminate the
/// category at the service boundary to decide between closing the socket
/// and sending an error response.
#[derive(Debug)]
pub enum Error {
    /// Operating system error: file I/O, resolution and friends.
    Os(io::Error),
    /// TCP/IP error produced by a socket operation.
    Tcp(io::Error),
    /// HTTP protocol error carrying a status code in 100..=599.
    Http(u16),
    /// Application error.
    App(AppError),
}

impl Error {
    /// The HTTP status code, if this is a protocol error.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Error::Http(status) => Some(*status),
            _ => None,
        }
    }

    /// True for errors produced by socket operations. Such connections are
    /// discarded without trying to write anything more to them.
    pub fn is_tcp(&self) -> bool {
        match self {
            Error::Tcp(_) => true,
            _ => false,
        }
    }

    pub fn is_os(&self) -> bool {
        match self {
            Error::Os(_) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Os(err) => write!(f, "os error: {}", err),
            Error::Tcp(err) => write!(f, "tcp/ip error: {}", err),
            Error::Http(status) => write!(f, "http error: {}", status),
            Error::App(AppError::Overflow) => write!(f, "application error: overflow"),
            Error::App(AppError::Invalid) => write!(f, "application error: invalid data"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Os(err) | Error::Tcp(err) => Some(err),
            _ => None,
        }
    }
}
