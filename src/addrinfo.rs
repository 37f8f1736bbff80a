use foreign_types::{foreign_type, ForeignType};
use libc::{c_char, c_int, socklen_t};
use socket2::{Domain, Protocol, SockAddr, Type};
use std::ffi::{CStr, CString};
use std::net::SocketAddr;
use std::{error, fmt, io, mem, ptr};

const NI_MAXHOST: usize = 1025;
const NI_MAXSERV: usize = 32;

foreign_type! {
    /// The list `getaddrinfo(3)` hands out, freed on drop.
    pub unsafe type AddrInfo {
        type CType = libc::addrinfo;
        fn drop = libc::freeaddrinfo;
    }
}

/// Failure to resolve a host and port.
#[derive(Debug)]
pub enum ResolveError {
    /// The host or port contains a NUL byte.
    Nul(&'static str),
    /// `getaddrinfo` failed with an `EAI_*` code.
    Gai { code: c_int, message: String },
    /// `getaddrinfo` failed with `EAI_SYSTEM`.
    System(io::Error),
}

impl ResolveError {
    fn from_gai(code: c_int) -> Self {
        if code == libc::EAI_SYSTEM {
            return ResolveError::System(io::Error::last_os_error());
        }
        ResolveError::Gai {
            code,
            message: gai_message(code),
        }
    }
}

fn gai_message(code: c_int) -> String {
    unsafe { CStr::from_ptr(libc::gai_strerror(code)) }
        .to_string_lossy()
        .into_owned()
}

impl fmt::Display for ResolveError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::Nul(what) => write!(fmt, "{what} contains a NUL byte"),
            ResolveError::Gai { message, .. } => fmt.write_str(message),
            ResolveError::System(e) => fmt::Display::fmt(e, fmt),
        }
    }
}

impl error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            ResolveError::System(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ResolveError> for io::Error {
    fn from(e: ResolveError) -> io::Error {
        match e {
            ResolveError::System(e) => e,
            e @ ResolveError::Nul(_) => io::Error::new(io::ErrorKind::InvalidInput, e),
            e => io::Error::new(io::ErrorKind::Other, e),
        }
    }
}

/// One address a listen socket may be bound to.
#[derive(Debug, Clone)]
pub struct Candidate {
    domain: Domain,
    ty: Type,
    protocol: Option<Protocol>,
    addr: SockAddr,
}

impl Candidate {
    /// A stream candidate for `addr`, as `getaddrinfo` would produce it for a
    /// numeric host and port.
    pub fn new(addr: SockAddr) -> Candidate {
        Candidate {
            domain: addr.domain(),
            ty: Type::STREAM,
            protocol: Some(Protocol::TCP),
            addr,
        }
    }

    /// # Safety
    ///
    /// `ai` must be an entry of a list returned by `getaddrinfo`.
    unsafe fn from_addrinfo(ai: &libc::addrinfo) -> Option<Candidate> {
        if ai.ai_addr.is_null() {
            return None;
        }
        let mut storage: libc::sockaddr_storage = mem::zeroed();
        let len = (ai.ai_addrlen as usize).min(mem::size_of::<libc::sockaddr_storage>());
        ptr::copy_nonoverlapping(
            ai.ai_addr as *const u8,
            &mut storage as *mut _ as *mut u8,
            len,
        );
        Some(Candidate {
            domain: Domain::from(ai.ai_family),
            ty: Type::from(ai.ai_socktype),
            protocol: Some(Protocol::from(ai.ai_protocol)),
            addr: SockAddr::new(storage, len as socklen_t),
        })
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn socket_type(&self) -> Type {
        self.ty
    }

    pub fn protocol(&self) -> Option<Protocol> {
        self.protocol
    }

    pub fn addr(&self) -> &SockAddr {
        &self.addr
    }

    /// `None` for anything but IPv4 and IPv6.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        self.addr.as_socket()
    }

    /// Render host and port numerically with `getnameinfo(3)`.
    pub fn numeric_host_service(&self) -> io::Result<(String, String)> {
        let mut host = [0 as c_char; NI_MAXHOST];
        let mut serv = [0 as c_char; NI_MAXSERV];
        let r = unsafe {
            libc::getnameinfo(
                self.addr.as_ptr(),
                self.addr.len(),
                host.as_mut_ptr(),
                host.len() as _,
                serv.as_mut_ptr(),
                serv.len() as _,
                libc::NI_NUMERICHOST | libc::NI_NUMERICSERV,
            )
        };
        if r != 0 {
            return Err(ResolveError::from_gai(r).into());
        }
        let host = unsafe { CStr::from_ptr(host.as_ptr()) };
        let serv = unsafe { CStr::from_ptr(serv.as_ptr()) };
        Ok((
            host.to_string_lossy().into_owned(),
            serv.to_string_lossy().into_owned(),
        ))
    }
}

impl From<SocketAddr> for Candidate {
    fn from(addr: SocketAddr) -> Candidate {
        Candidate::new(SockAddr::from(addr))
    }
}

/// Turns a host and port into the addresses to try binding, in order.
pub trait Resolve {
    /// `host` of `None` means every local address.
    fn resolve(&mut self, host: Option<&str>, port: &str) -> Result<Vec<Candidate>, ResolveError>;
}

impl<R: Resolve + ?Sized> Resolve for &mut R {
    fn resolve(&mut self, host: Option<&str>, port: &str) -> Result<Vec<Candidate>, ResolveError> {
        (**self).resolve(host, port)
    }
}

/// Passive, family agnostic stream lookups through `getaddrinfo(3)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GetAddrInfo;

impl Resolve for GetAddrInfo {
    fn resolve(&mut self, host: Option<&str>, port: &str) -> Result<Vec<Candidate>, ResolveError> {
        resolve_passive(host, port)
    }
}

/// Resolve `host` and `port` for binding a TCP listen socket.
///
/// The result keeps the resolver's order. `getaddrinfo`'s own list is freed
/// before returning.
pub fn resolve_passive(host: Option<&str>, port: &str) -> Result<Vec<Candidate>, ResolveError> {
    let c_host = host
        .map(CString::new)
        .transpose()
        .map_err(|_| ResolveError::Nul("host"))?;
    let c_port = CString::new(port).map_err(|_| ResolveError::Nul("port"))?;

    let mut hints: libc::addrinfo = unsafe { mem::zeroed() };
    hints.ai_family = libc::AF_UNSPEC;
    hints.ai_socktype = libc::SOCK_STREAM;
    hints.ai_flags = libc::AI_PASSIVE;

    let mut res: *mut libc::addrinfo = ptr::null_mut();
    let r = unsafe {
        libc::getaddrinfo(
            c_host.as_ref().map_or(ptr::null(), |h| h.as_ptr()),
            c_port.as_ptr(),
            &hints,
            &mut res,
        )
    };
    if r != 0 {
        return Err(ResolveError::from_gai(r));
    }
    if res.is_null() {
        return Ok(Vec::new());
    }

    let list = unsafe { AddrInfo::from_ptr(res) };
    let mut candidates = Vec::new();
    let mut ai = list.as_ptr();
    while !ai.is_null() {
        let entry = unsafe { &*ai };
        candidates.extend(unsafe { Candidate::from_addrinfo(entry) });
        ai = entry.ai_next;
    }
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_loopback() {
        let candidates = resolve_passive(Some("127.0.0.1"), "11300").unwrap();
        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.domain(), Domain::IPV4);
        assert_eq!(c.socket_type(), Type::STREAM);
        assert_eq!(c.socket_addr(), Some("127.0.0.1:11300".parse().unwrap()));
        assert_eq!(
            c.numeric_host_service().unwrap(),
            ("127.0.0.1".to_owned(), "11300".to_owned())
        );
    }

    #[test]
    fn wildcard_is_unspecified() {
        let candidates = resolve_passive(None, "0").unwrap();
        assert!(!candidates.is_empty());
        for c in &candidates {
            let addr = c.socket_addr().unwrap();
            assert!(addr.ip().is_unspecified(), "{:?}", addr);
            assert_eq!(addr.port(), 0);
        }
    }

    #[test]
    fn unknown_service() {
        match resolve_passive(Some("127.0.0.1"), "no-such-service-here") {
            Err(ResolveError::Gai { .. }) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn nul_in_host() {
        match resolve_passive(Some("local\0host"), "80") {
            Err(ResolveError::Nul("host")) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn unspecified_family_does_not_render() {
        let storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
        let addr = unsafe { SockAddr::new(storage, mem::size_of::<libc::sa_family_t>() as socklen_t) };
        let candidate = Candidate::new(addr);
        assert!(candidate.socket_addr().is_none());
        assert!(candidate.numeric_host_service().is_err());
    }
}
