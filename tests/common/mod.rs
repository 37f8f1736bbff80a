//! Stand-ins for the service manager, the resolver and the diagnostics sink.
#![allow(dead_code)]

use sdlisten::addrinfo::{Candidate, Resolve, ResolveError};
use sdlisten::daemon::{self, Activation, Listening, SocketType};
use sdlisten::report::Report;
use std::cell::RefCell;
use std::io;
use std::net::SocketAddr;
use std::os::unix::io::RawFd;

pub struct FakeActivation {
    pub count: Result<usize, i32>,
    pub fd: RawFd,
    pub valid: Result<bool, i32>,
    pub checked: Vec<RawFd>,
    pub discarded: Vec<RawFd>,
}

impl FakeActivation {
    pub fn passing(count: usize, fd: RawFd, valid: Result<bool, i32>) -> Self {
        FakeActivation {
            count: Ok(count),
            fd,
            valid,
            checked: Vec::new(),
            discarded: Vec::new(),
        }
    }

    pub fn nothing() -> Self {
        Self::passing(0, -1, Ok(false))
    }
}

impl Activation for FakeActivation {
    fn listen_fds(&mut self) -> io::Result<usize> {
        self.count.map_err(io::Error::from_raw_os_error)
    }

    fn first_fd(&self) -> RawFd {
        self.fd
    }

    fn is_tcp_listener(&mut self, fd: RawFd) -> io::Result<bool> {
        self.checked.push(fd);
        self.valid.map_err(io::Error::from_raw_os_error)
    }

    fn discard(&mut self, fd: RawFd) {
        self.discarded.push(fd);
        unsafe {
            libc::close(fd);
        }
    }
}

#[derive(Default)]
pub struct FakeResolver {
    pub calls: usize,
    pub candidates: Vec<Candidate>,
}

impl Resolve for FakeResolver {
    fn resolve(&mut self, _host: Option<&str>, _port: &str) -> Result<Vec<Candidate>, ResolveError> {
        self.calls += 1;
        Ok(self.candidates.clone())
    }
}

#[derive(Default)]
pub struct RecordingReport {
    pub warnings: RefCell<Vec<String>>,
    pub verbose: RefCell<Vec<String>>,
}

impl Report for RecordingReport {
    fn warn(&self, context: &str, err: &io::Error) {
        self.warnings.borrow_mut().push(format!("{context}: {err}"));
    }

    fn warnx(&self, message: &str) {
        self.warnings.borrow_mut().push(message.to_owned());
    }

    fn verbose(&self, line: &str) {
        self.verbose.borrow_mut().push(line.to_owned());
    }
}

pub fn loopback(port: u16) -> Candidate {
    Candidate::from(SocketAddr::from(([127, 0, 0, 1], port)))
}

pub fn is_listening(fd: RawFd) -> bool {
    daemon::is_socket_inet(fd, None, Some(SocketType::Stream), Listening::IsListening, None).unwrap()
}
