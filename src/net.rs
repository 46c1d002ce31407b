//! TCP connection helpers
//!
//! Thin wrappers that produce configured `TcpStream`s and listeners for
//! the connection layer. Sockets are built through `socket2` so connect
//! timeouts and listen backlog are available on stable Rust.

use crate::error::{Error, Result};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Connect to a remote peer with an optional timeout
///
/// Resolves `addr`, tries each resolved address in order, and returns
/// the first stream that connects. TCP_NODELAY is enabled; frame writes
/// are already batched, so Nagle only adds latency here.
pub fn connect<A: ToSocketAddrs>(addr: A, timeout: Option<Duration>) -> Result<TcpStream> {
    let mut last_err = None;

    for sock_addr in addr.to_socket_addrs()? {
        match connect_one(sock_addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }

    Err(last_err.unwrap_or_else(|| {
        Error::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            "address resolved to nothing",
        ))
    }))
}

fn connect_one(addr: SocketAddr, timeout: Option<Duration>) -> Result<TcpStream> {
    let domain = Domain::for_address(addr);
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    socket.set_nodelay(true)?;

    match timeout {
        Some(dur) => socket.connect_timeout(&addr.into(), dur)?,
        None => socket.connect(&addr.into())?,
    }

    Ok(socket.into())
}

/// Bind a listener with SO_REUSEADDR and a deep backlog
pub fn listen<A: ToSocketAddrs>(addr: A) -> Result<TcpListener> {
    let sock_addr = addr
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "address resolved to nothing",
            ))
        })?;

    let domain = Domain::for_address(sock_addr);
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    socket.set_reuse_address(true)?;
    socket.bind(&sock_addr.into())?;
    socket.listen(128)?;

    Ok(socket.into())
}

/// Apply the per-connection socket options to an accepted stream
pub fn configure_accepted(stream: &TcpStream) -> Result<()> {
    stream.set_nodelay(true)?;
    Ok(())
}
