//! Low-level bindings to the socket activation half of `sd-daemon(3)`.
//!
//! Only the calls needed to receive and check listen sockets passed by the
//! service manager are bound here. They are documented by the
//! `sd_listen_fds(3)` and `sd_is_socket_inet(3)` man pages.

pub use std::os::raw::c_int;

pub mod daemon;
