use crate::addrinfo::Candidate;
use crate::config::ListenerConfig;
use crate::report::Report;
use socket2::{Domain, Socket};
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};

/// One setting applied to every freshly created listen socket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SockOpt {
    NonBlocking,
    ReuseAddr,
    KeepAlive,
    Linger,
    NoDelay,
}

impl SockOpt {
    /// In the order they are applied.
    pub const ALL: [SockOpt; 5] = [
        SockOpt::NonBlocking,
        SockOpt::ReuseAddr,
        SockOpt::KeepAlive,
        SockOpt::Linger,
        SockOpt::NoDelay,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SockOpt::NonBlocking => "O_NONBLOCK",
            SockOpt::ReuseAddr => "SO_REUSEADDR",
            SockOpt::KeepAlive => "SO_KEEPALIVE",
            SockOpt::Linger => "SO_LINGER",
            SockOpt::NoDelay => "TCP_NODELAY",
        }
    }

    /// What a failure to apply this option on `fd` is reported as.
    pub fn context(self, fd: RawFd) -> String {
        match self {
            SockOpt::NonBlocking => format!("setting {}", self.name()),
            _ => format!("setting {} on fd {}", self.name(), fd),
        }
    }

    pub fn apply(self, socket: &Socket, config: &ListenerConfig) -> io::Result<()> {
        match self {
            SockOpt::NonBlocking => socket.set_nonblocking(true),
            SockOpt::ReuseAddr => socket.set_reuse_address(true),
            SockOpt::KeepAlive => socket.set_keepalive(true),
            SockOpt::Linger => socket.set_linger(Some(config.linger)),
            SockOpt::NoDelay => socket.set_nodelay(true),
        }
    }
}

/// Text of the verbose line announcing that `fd` got bound to `candidate`.
///
/// The candidate is rendered numerically; should that fail, the host and port
/// as given by the caller are printed instead.
pub fn bind_line(fd: RawFd, candidate: &Candidate, host: Option<&str>, port: &str) -> String {
    let (h, p) = match candidate.numeric_host_service() {
        Ok(hp) => hp,
        Err(e) => {
            log::debug!("getnameinfo() on fd {}: {}", fd, e);
            (host.unwrap_or("").to_owned(), port.to_owned())
        }
    };
    if candidate.domain() == Domain::IPV6 {
        format!("bind {fd} [{h}]:{p}")
    } else {
        format!("bind {fd} {h}:{p}")
    }
}

/// Make one attempt at a listen socket for `candidate`.
///
/// Every failure is reported and yields `None`; the socket created for the
/// attempt is closed by then.
pub fn bind_candidate(
    candidate: &Candidate,
    host: Option<&str>,
    port: &str,
    config: &ListenerConfig,
    report: &dyn Report,
) -> Option<Socket> {
    let socket = match Socket::new(candidate.domain(), candidate.socket_type(), candidate.protocol()) {
        Ok(socket) => socket,
        Err(e) => {
            report.warn("socket()", &e);
            return None;
        }
    };
    let fd = socket.as_raw_fd();

    for opt in SockOpt::ALL {
        if let Err(e) = opt.apply(&socket, config) {
            report.warn(&opt.context(fd), &e);
            return None;
        }
    }

    if let Err(e) = socket.bind(candidate.addr()) {
        report.warn("bind()", &e);
        return None;
    }
    if config.verbose {
        report.verbose(&bind_line(fd, candidate, host, port));
    }

    if let Err(e) = socket.listen(config.backlog) {
        report.warn("listen()", &e);
        return None;
    }

    Some(socket)
}

/// Try `candidates` in order; the first one that can be bound and listened on
/// wins and no further candidates are attempted.
pub fn bind_first(
    candidates: &[Candidate],
    host: Option<&str>,
    port: &str,
    config: &ListenerConfig,
    report: &dyn Report,
) -> Option<(usize, Socket)> {
    for (i, candidate) in candidates.iter().enumerate() {
        log::trace!("trying candidate {} of {}: {:?}", i + 1, candidates.len(), candidate);
        if let Some(socket) = bind_candidate(candidate, host, port, config, report) {
            return Some((i, socket));
        }
    }
    None
}
