use crate::addrinfo::ResolveError;
use std::os::unix::io::RawFd;
use std::{error, fmt, io, result};

/// Result type of a listener acquisition.
pub type Result<T> = result::Result<T, Error>;

/// Why no listen socket could be produced.
///
/// Every variant is terminal: recoverable problems with a single candidate
/// address are reported while iterating and never surface here on their own.
#[derive(Debug)]
pub enum Error {
    /// Asking the activation protocol how many sockets were passed failed.
    Activation(io::Error),
    /// Checking the type of the inherited socket failed.
    InheritedCheck { fd: RawFd, source: io::Error },
    /// The inherited descriptor is not an internet stream socket in listening
    /// mode.
    NotTcpListener { fd: RawFd },
    /// The host or port could not be resolved.
    Resolve(ResolveError),
    /// Every candidate address failed somewhere between `socket()` and
    /// `listen()`.
    Exhausted { candidates: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Activation(e) => write!(fmt, "sd_listen_fds: {e}"),
            Error::InheritedCheck { fd, source } => {
                write!(fmt, "sd_is_socket_inet on fd {fd}: {source}")
            }
            Error::NotTcpListener { fd } => {
                write!(fmt, "inherited fd {fd} is not a TCP listen socket")
            }
            Error::Resolve(e) => write!(fmt, "getaddrinfo(): {e}"),
            Error::Exhausted { candidates: 0 } => {
                write!(fmt, "name resolution returned no addresses")
            }
            Error::Exhausted { candidates } => {
                write!(fmt, "none of {candidates} addresses could be bound")
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Activation(e) => Some(e),
            Error::InheritedCheck { source, .. } => Some(source),
            Error::Resolve(e) => Some(e),
            Error::NotTcpListener { .. } | Error::Exhausted { .. } => None,
        }
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> io::Error {
        match e {
            Error::Activation(e) | Error::InheritedCheck { source: e, .. } => e,
            Error::Resolve(e) => e.into(),
            e @ Error::NotTcpListener { .. } => io::Error::new(io::ErrorKind::InvalidInput, e),
            e @ Error::Exhausted { .. } => io::Error::new(io::ErrorKind::AddrNotAvailable, e),
        }
    }
}
