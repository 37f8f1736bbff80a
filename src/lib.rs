//! Acquire the TCP listen socket a server runs its accept loop on.
//!
//! A socket passed down by systemd (or anything else speaking the socket
//! activation protocol) is preferred. Without one, the host and port are
//! resolved and the first candidate address that can be bound and listened on
//! wins.
//!
//! ```no_run
//! let listener = sdlisten::acquire_listener(None, "8080", &Default::default())?;
//! let listener = listener.into_tcp_listener();
//! # Ok::<(), sdlisten::Error>(())
//! ```
#![doc(html_root_url = "https://docs.rs/sdlisten/0.1.0")]
#![warn(rust_2018_idioms)]
#![cfg_attr(feature = "unstable-doc-cfg", feature(doc_cfg))]

#[cfg(feature = "libsystemd")]
extern crate libsystemd_sys as ffi;

use libc::c_int;
use std::io;

/// An analogue of `try!()` for systemd FFI calls.
///
/// The parameter should be a call to a systemd FFI fn with a c_int return
/// value. It is called, and if the return is negative then `sd_try!()`
/// interprets it as an error code and returns an `io::Error` from the enclosing fn.
/// Otherwise, the value of `sd_try!()` is the non-negative value returned by
/// the FFI call.
#[macro_export]
macro_rules! sd_try {
    ($e:expr) => {{
        $crate::ffi_result(unsafe { $e })?
    }};
}

/// Convert a systemd style return value (negative errno on failure) into a
/// `Result`.
#[inline]
pub fn ffi_result(ret: c_int) -> io::Result<c_int> {
    if ret < 0 {
        Err(io::Error::from_raw_os_error(-ret))
    } else {
        Ok(ret)
    }
}

/// Convert a libc style return value (-1 and `errno` on failure) into a
/// `Result`.
#[inline]
pub(crate) fn cvt(ret: c_int) -> io::Result<c_int> {
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

/// The socket activation protocol: how many sockets were passed, and what
/// they are.
pub mod daemon;

/// Name resolution into candidate bind addresses.
pub mod addrinfo;

/// Creating, configuring, binding and listening on fresh sockets.
pub mod socket;

/// Diagnostics for every failed step of an acquisition.
pub mod report;

mod config;
mod error;
mod listener;

#[cfg(doctest)]
doc_comment::doctest!("../README.md");

pub use config::{ListenerConfig, DEFAULT_BACKLOG};
pub use error::{Error, Result};
pub use listener::{acquire_listener, acquire_listener_with, Listener, Origin};
