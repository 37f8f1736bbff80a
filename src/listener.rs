use crate::addrinfo::{GetAddrInfo, Resolve};
use crate::config::ListenerConfig;
use crate::daemon::{Activation, Systemd};
use crate::report::{LogReport, Report};
use crate::socket::bind_first;
use crate::{Error, Result};
use socket2::{SockAddr, SockRef};
use std::io;
use std::net::{SocketAddr, TcpListener};
use std::os::unix::io::{AsFd, AsRawFd, BorrowedFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};

/// Where a [`Listener`] came from.
#[derive(Debug, Clone)]
pub enum Origin {
    /// Passed down through socket activation and used as is.
    Inherited,
    /// Created here and bound to this resolved address.
    Bound(SockAddr),
}

/// A TCP socket in listening mode, ready for an accept loop.
///
/// Freshly bound sockets are non-blocking, have `SO_REUSEADDR`,
/// `SO_KEEPALIVE`, `TCP_NODELAY` and an abortive `SO_LINGER` set. Inherited
/// ones are left exactly as the service manager configured them.
#[derive(Debug)]
pub struct Listener {
    fd: OwnedFd,
    origin: Origin,
}

impl Listener {
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn is_inherited(&self) -> bool {
        matches!(self.origin, Origin::Inherited)
    }

    /// The address the socket is bound to, as the kernel reports it.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        SockRef::from(&self.fd).local_addr()?.as_socket().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "not an internet socket")
        })
    }

    pub fn into_tcp_listener(self) -> TcpListener {
        TcpListener::from(self.fd)
    }
}

impl AsRawFd for Listener {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl AsFd for Listener {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl IntoRawFd for Listener {
    fn into_raw_fd(self) -> RawFd {
        self.fd.into_raw_fd()
    }
}

impl From<Listener> for OwnedFd {
    fn from(listener: Listener) -> OwnedFd {
        listener.fd
    }
}

/// Look for a socket passed by the service manager.
///
/// `Ok(None)` when nothing was passed. A passed descriptor that is not a TCP
/// listener is discarded and fails the whole acquisition.
fn check_inherited<A: Activation>(activation: &mut A, report: &dyn Report) -> Result<Option<OwnedFd>> {
    let n = match activation.listen_fds() {
        Ok(n) => n,
        Err(e) => {
            report.warn("sd_listen_fds", &e);
            return Err(Error::Activation(e));
        }
    };
    if n == 0 {
        return Ok(None);
    }
    if n > 1 {
        report.warnx("inherited more than one listen socket; ignoring all but the first");
    }

    let fd = activation.first_fd();
    match activation.is_tcp_listener(fd) {
        Ok(true) => {
            log::debug!("using inherited listen socket on fd {}", fd);
            Ok(Some(unsafe { OwnedFd::from_raw_fd(fd) }))
        }
        Ok(false) => {
            report.warnx("inherited fd is not a TCP listen socket");
            activation.discard(fd);
            Err(Error::NotTcpListener { fd })
        }
        Err(e) => {
            report.warn("sd_is_socket_inet", &e);
            activation.discard(fd);
            Err(Error::InheritedCheck { fd, source: e })
        }
    }
}

/// [`acquire_listener`] with the activation protocol, the resolver and the
/// diagnostics receiver supplied by the caller.
pub fn acquire_listener_with<A, R>(
    mut activation: A,
    mut resolver: R,
    report: &dyn Report,
    host: Option<&str>,
    port: &str,
    config: &ListenerConfig,
) -> Result<Listener>
where
    A: Activation,
    R: Resolve,
{
    if let Some(fd) = check_inherited(&mut activation, report)? {
        return Ok(Listener {
            fd,
            origin: Origin::Inherited,
        });
    }

    let candidates = match resolver.resolve(host, port) {
        Ok(candidates) => candidates,
        Err(e) => {
            report.warnx(&format!("getaddrinfo(): {e}"));
            return Err(Error::Resolve(e));
        }
    };
    log::debug!("{} candidate addresses for {}:{}", candidates.len(), host.unwrap_or("*"), port);

    match bind_first(&candidates, host, port, config, report) {
        Some((i, socket)) => Ok(Listener {
            fd: OwnedFd::from(socket),
            origin: Origin::Bound(candidates[i].addr().clone()),
        }),
        None => Err(Error::Exhausted {
            candidates: candidates.len(),
        }),
    }
}

/// Get a TCP listen socket for `host` and `port`.
///
/// A socket passed through systemd socket activation wins and is returned
/// untouched; the host and port are not even resolved then. Otherwise the
/// addresses `host` (or, for `None`, the wildcard address) and `port` resolve
/// to are tried in order, and the first one that can be bound and listened on
/// is returned.
///
/// Problems are logged through the `log` crate as they happen; the returned
/// error only says which stage gave up.
pub fn acquire_listener(host: Option<&str>, port: &str, config: &ListenerConfig) -> Result<Listener> {
    acquire_listener_with(
        Systemd::new(config.unset_environment),
        GetAddrInfo,
        &LogReport,
        host,
        port,
        config,
    )
}
