//! Acquire a listen socket the way a server would at startup, then answer
//! every connection with a greeting.
//!
//! # Using systemd:
//!
//! `greeter.socket`:
//! ```
//! [Socket]
//! ListenStream=11300
//!
//! [Install]
//! WantedBy=sockets.target
//! ```
//!
//! `greeter.service`:
//! ```
//! [Unit]
//! Requires=greeter.socket
//!
//! [Service]
//! ExecStart=/usr/local/bin/greeter
//! ```
//!
//! # Alternately, using `systemfd`
//!
//! ```
//! systemfd -s 11300 -- cargo run --example greeter
//! ```
//!
//! # Or on its own
//!
//! ```
//! cargo run --example greeter -- -v localhost 11300
//! ```

#![warn(rust_2018_idioms)]

use sdlisten::{acquire_listener, ListenerConfig};
use std::io::{self, Write};
use std::net::TcpStream;

fn handle_client(mut stream: TcpStream) -> io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.write_all(b"HI\n")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut verbose = false;
    let mut positional = Vec::new();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "-v" => verbose = true,
            _ => positional.push(arg),
        }
    }
    let host = positional.first().filter(|h| !h.is_empty()).map(String::as_str);
    let port = positional.get(1).map_or("11300", String::as_str);

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if verbose { "debug" } else { "warn" }),
    )
    .init();

    let listener = acquire_listener(host, port, &ListenerConfig::new().verbose(verbose))?;
    log::info!("listening on {}", listener.local_addr()?);

    let listener = listener.into_tcp_listener();
    listener.set_nonblocking(false)?;
    for stream in listener.incoming() {
        if let Err(e) = handle_client(stream?) {
            log::warn!("client: {}", e);
        }
    }
    Ok(())
}
