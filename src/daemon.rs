use crate::cvt;
use libc::c_int;
use socket2::{SockRef, Type};
use std::env;
use std::io;
use std::mem;
use std::net::TcpListener;
use std::os::unix::io::{BorrowedFd, FromRawFd, RawFd};

/// Number of the first passed file descriptor
pub const LISTEN_FDS_START: RawFd = 3;

/// Options for checking whether a socket is in listening mode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Listening {
    /// Verify that socket is in listening mode
    IsListening,
    /// Verify that socket is not in listening mode
    IsNotListening,
    /// Don't check whether socket is listening
    NoListeningCheck,
}

/// Socket types understood by [`is_socket`] and [`is_socket_inet`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SocketType {
    Stream,
    Datagram,
    Raw,
}

#[inline]
/// Converts an optional socket type to the correct constant, or 0 for no type
/// check
fn get_c_socktype(socktype: Option<SocketType>) -> c_int {
    match socktype {
        Some(SocketType::Stream) => libc::SOCK_STREAM,
        Some(SocketType::Datagram) => libc::SOCK_DGRAM,
        Some(SocketType::Raw) => libc::SOCK_RAW,
        None => 0,
    }
}

/// Parse the `$LISTEN_PID` and `$LISTEN_FDS` values the service manager put
/// into the environment of the process with id `own_pid`.
///
/// Returns 0 when either variable is missing or the sockets were meant for a
/// different process, and `InvalidInput` when a value is malformed.
pub fn parse_listen_fds(
    listen_pid: Option<&str>,
    listen_fds: Option<&str>,
    own_pid: u32,
) -> io::Result<usize> {
    let pid = match listen_pid {
        Some(pid) => pid.parse::<u32>().map_err(|e| invalid("LISTEN_PID", e))?,
        None => return Ok(0),
    };
    if pid != own_pid {
        return Ok(0);
    }

    let n = match listen_fds {
        Some(n) => n.parse::<usize>().map_err(|e| invalid("LISTEN_FDS", e))?,
        None => return Ok(0),
    };
    if n > (c_int::MAX - LISTEN_FDS_START) as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("LISTEN_FDS={n} is out of range"),
        ));
    }
    Ok(n)
}

fn invalid(var: &str, err: std::num::ParseIntError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, format!("{var}: {err}"))
}

fn var(name: &str) -> io::Result<Option<String>> {
    match env::var(name) {
        Ok(v) => Ok(Some(v)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e @ env::VarError::NotUnicode(_)) => {
            Err(io::Error::new(io::ErrorKind::InvalidInput, format!("{name}: {e}")))
        }
    }
}

fn set_cloexec(fd: RawFd) -> io::Result<()> {
    let flags = cvt(unsafe { libc::fcntl(fd, libc::F_GETFD) })?;
    if flags & libc::FD_CLOEXEC == 0 {
        cvt(unsafe { libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) })?;
    }
    Ok(())
}

/// Returns how many file descriptors have been passed. Removes the
/// `$LISTEN_FDS` and `$LISTEN_PID` file descriptors from the environment if
/// `unset_environment` is `true`
///
/// Every passed descriptor gets `FD_CLOEXEC` set, so that it does not leak
/// into processes spawned later on.
pub fn listen_fds(unset_environment: bool) -> io::Result<usize> {
    let result = var("LISTEN_PID").and_then(|pid| {
        let fds = var("LISTEN_FDS")?;
        let n = parse_listen_fds(pid.as_deref(), fds.as_deref(), std::process::id())?;
        for fd in LISTEN_FDS_START..LISTEN_FDS_START + n as RawFd {
            set_cloexec(fd)?;
        }
        Ok(n)
    });

    if unset_environment {
        env::remove_var("LISTEN_PID");
        env::remove_var("LISTEN_FDS");
        env::remove_var("LISTEN_FDNAMES");
    }

    result
}

fn is_fd_socket(fd: RawFd) -> io::Result<bool> {
    let mut st = mem::MaybeUninit::<libc::stat>::uninit();
    cvt(unsafe { libc::fstat(fd, st.as_mut_ptr()) })?;
    let st = unsafe { st.assume_init() };
    Ok(st.st_mode & libc::S_IFMT == libc::S_IFSOCK)
}

fn is_socket_internal(
    sock: &SockRef<'_>,
    socktype: Option<SocketType>,
    listening: Listening,
) -> io::Result<bool> {
    let c_socktype = get_c_socktype(socktype);
    if c_socktype != 0 && sock.r#type()? != Type::from(c_socktype) {
        return Ok(false);
    }

    let want = match listening {
        Listening::IsListening => Some(true),
        Listening::IsNotListening => Some(false),
        Listening::NoListeningCheck => None,
    };
    if let Some(want) = want {
        if sock.is_listener()? != want {
            return Ok(false);
        }
    }

    Ok(true)
}

/// Identifies whether the passed file descriptor is a socket. If family and
/// type are supplied, they must match as well. See `Listening` for listening
/// check parameters.
pub fn is_socket(
    fd: RawFd,
    family: Option<c_int>,
    socktype: Option<SocketType>,
    listening: Listening,
) -> io::Result<bool> {
    if !is_fd_socket(fd)? {
        return Ok(false);
    }
    // fstat succeeded, so fd is open for at least the duration of this call
    let fd = unsafe { BorrowedFd::borrow_raw(fd) };
    let sock = SockRef::from(&fd);
    if !is_socket_internal(&sock, socktype, listening)? {
        return Ok(false);
    }

    match family {
        Some(family) => Ok(c_int::from(sock.local_addr()?.family()) == family),
        None => Ok(true),
    }
}

/// Identifies whether the passed file descriptor is an Internet socket. If
/// family and type are supplied, they must match as well. See `Listening` for
/// listening check parameters.
pub fn is_socket_inet(
    fd: RawFd,
    family: Option<c_int>,
    socktype: Option<SocketType>,
    listening: Listening,
    port: Option<u16>,
) -> io::Result<bool> {
    if !is_fd_socket(fd)? {
        return Ok(false);
    }
    let fd = unsafe { BorrowedFd::borrow_raw(fd) };
    let sock = SockRef::from(&fd);
    if !is_socket_internal(&sock, socktype, listening)? {
        return Ok(false);
    }

    let local = sock.local_addr()?;
    let inet = match local.as_socket() {
        Some(inet) => inet,
        None => return Ok(false),
    };
    if family.map_or(false, |f| f != c_int::from(local.family())) {
        return Ok(false);
    }
    if port.map_or(false, |p| p != inet.port()) {
        return Ok(false);
    }

    Ok(true)
}

/// Take ownership of a passed descriptor as a [`TcpListener`], after checking
/// that it is an internet stream socket in listening mode.
///
/// # Safety
///
/// `fd` must be open and owned by nobody else; the returned listener closes
/// it on drop.
pub unsafe fn tcp_listener(fd: RawFd) -> io::Result<TcpListener> {
    if !is_socket_inet(fd, None, Some(SocketType::Stream), Listening::IsListening, None)? {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("fd {fd} is not a TCP listen socket"),
        ));
    }
    Ok(TcpListener::from_raw_fd(fd))
}

/// Source of sockets handed down by a service manager.
///
/// [`acquire_listener_with`](crate::acquire_listener_with) only ever looks at
/// the first passed descriptor.
pub trait Activation {
    /// How many descriptors were passed.
    fn listen_fds(&mut self) -> io::Result<usize>;

    /// Descriptor number of the first passed socket.
    fn first_fd(&self) -> RawFd {
        LISTEN_FDS_START
    }

    /// Whether `fd` is an internet stream socket in listening mode.
    fn is_tcp_listener(&mut self, fd: RawFd) -> io::Result<bool>;

    /// Get rid of a passed descriptor that was rejected.
    fn discard(&mut self, fd: RawFd) {
        unsafe {
            libc::close(fd);
        }
    }
}

impl<A: Activation + ?Sized> Activation for &mut A {
    fn listen_fds(&mut self) -> io::Result<usize> {
        (**self).listen_fds()
    }

    fn first_fd(&self) -> RawFd {
        (**self).first_fd()
    }

    fn is_tcp_listener(&mut self, fd: RawFd) -> io::Result<bool> {
        (**self).is_tcp_listener(fd)
    }

    fn discard(&mut self, fd: RawFd) {
        (**self).discard(fd)
    }
}

/// The systemd protocol as spoken through `$LISTEN_PID` and `$LISTEN_FDS`,
/// implemented without linking libsystemd.
#[derive(Debug, Default, Clone, Copy)]
pub struct Systemd {
    pub unset_environment: bool,
}

impl Systemd {
    pub fn new(unset_environment: bool) -> Self {
        Systemd { unset_environment }
    }
}

impl Activation for Systemd {
    fn listen_fds(&mut self) -> io::Result<usize> {
        listen_fds(self.unset_environment)
    }

    fn is_tcp_listener(&mut self, fd: RawFd) -> io::Result<bool> {
        is_socket_inet(fd, None, Some(SocketType::Stream), Listening::IsListening, None)
    }
}

/// The systemd protocol as implemented by libsystemd's `sd_listen_fds(3)`.
#[cfg(feature = "libsystemd")]
#[cfg_attr(feature = "unstable-doc-cfg", doc(cfg(feature = "libsystemd")))]
#[derive(Debug, Default, Clone, Copy)]
pub struct LibSystemd {
    pub unset_environment: bool,
}

#[cfg(feature = "libsystemd")]
impl LibSystemd {
    pub fn new(unset_environment: bool) -> Self {
        LibSystemd { unset_environment }
    }
}

#[cfg(feature = "libsystemd")]
impl Activation for LibSystemd {
    fn listen_fds(&mut self) -> io::Result<usize> {
        let fds = sd_try!(ffi::daemon::sd_listen_fds(self.unset_environment as c_int));
        Ok(fds as usize)
    }

    fn first_fd(&self) -> RawFd {
        ffi::daemon::SD_LISTEN_FDS_START
    }

    fn is_tcp_listener(&mut self, fd: RawFd) -> io::Result<bool> {
        let result = sd_try!(ffi::daemon::sd_is_socket_inet(fd, 0, libc::SOCK_STREAM, 1, 0));
        Ok(result != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{TcpStream, UdpSocket};
    use std::os::unix::io::AsRawFd;

    #[test]
    fn listen_pid_missing_means_nothing_passed() {
        assert_eq!(parse_listen_fds(None, Some("2"), 42).unwrap(), 0);
    }

    #[test]
    fn listen_pid_for_another_process() {
        assert_eq!(parse_listen_fds(Some("41"), Some("2"), 42).unwrap(), 0);
    }

    #[test]
    fn listen_fds_missing() {
        assert_eq!(parse_listen_fds(Some("42"), None, 42).unwrap(), 0);
    }

    #[test]
    fn listen_fds_counted() {
        assert_eq!(parse_listen_fds(Some("42"), Some("1"), 42).unwrap(), 1);
        assert_eq!(parse_listen_fds(Some("42"), Some("3"), 42).unwrap(), 3);
    }

    #[test]
    fn malformed_values_are_errors() {
        let e = parse_listen_fds(Some("pid"), Some("1"), 42).unwrap_err();
        assert_eq!(e.kind(), io::ErrorKind::InvalidInput);
        let e = parse_listen_fds(Some("42"), Some("-1"), 42).unwrap_err();
        assert_eq!(e.kind(), io::ErrorKind::InvalidInput);
        let e = parse_listen_fds(Some("42"), Some("99999999999"), 42).unwrap_err();
        assert_eq!(e.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn tcp_listener_is_inet_listening() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let fd = listener.as_raw_fd();
        let port = listener.local_addr().unwrap().port();

        assert!(is_socket_inet(fd, None, Some(SocketType::Stream), Listening::IsListening, None).unwrap());
        assert!(is_socket_inet(fd, Some(libc::AF_INET), None, Listening::IsListening, Some(port)).unwrap());
        assert!(!is_socket_inet(fd, Some(libc::AF_INET6), None, Listening::NoListeningCheck, None).unwrap());
        assert!(!is_socket_inet(fd, None, None, Listening::NoListeningCheck, Some(port.wrapping_add(1))).unwrap());
        assert!(!is_socket(fd, None, Some(SocketType::Datagram), Listening::NoListeningCheck).unwrap());
        assert!(is_socket(fd, Some(libc::AF_INET), None, Listening::IsListening).unwrap());
    }

    #[test]
    fn connected_stream_is_not_listening() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let stream = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let fd = stream.as_raw_fd();

        assert!(!is_socket_inet(fd, None, Some(SocketType::Stream), Listening::IsListening, None).unwrap());
        assert!(is_socket_inet(fd, None, Some(SocketType::Stream), Listening::IsNotListening, None).unwrap());
    }

    #[test]
    fn udp_socket_is_not_stream() {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        assert!(!Systemd::default().is_tcp_listener(socket.as_raw_fd()).unwrap());
    }

    #[test]
    fn pipe_is_not_a_socket() {
        let mut fds = [0 as c_int; 2];
        cvt(unsafe { libc::pipe(fds.as_mut_ptr()) }).unwrap();
        let result = is_socket(fds[0], None, None, Listening::NoListeningCheck);
        unsafe {
            libc::close(fds[0]);
            libc::close(fds[1]);
        }
        assert!(!result.unwrap());
    }

    #[test]
    fn adopt_checked_listener() {
        use std::os::unix::io::IntoRawFd;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let adopted = unsafe { tcp_listener(listener.into_raw_fd()) }.unwrap();
        assert_eq!(adopted.local_addr().unwrap(), addr);
    }
}
