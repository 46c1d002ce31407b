//! Session operations abstraction
//!
//! The engine never touches a socket directly: everything goes through
//! the [`SessionOps`] trait, so plain TCP, TLS, or an in-memory pipe all
//! drive the same frame machinery. [`Session`] adds poll-based timeouts
//! and the exact-length read/write loops the frame codec needs.

use crate::error::{Error, Result};
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::os::fd::AsRawFd;
use std::time::Duration;

/// Session operations trait
///
/// Abstracts over the underlying transport for poll/read/write/close.
pub trait SessionOps {
    /// Poll the session for readiness.
    ///
    /// Returns true if the session is ready for the requested operation.
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> Result<bool>;

    /// Read data from the session
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write data to the session
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Close the session
    fn close(&mut self) -> Result<()>;
}

/// Poll events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEvents {
    Read,
    Write,
    Both,
}

/// A transport wrapped with timeout handling
pub struct Session<S: SessionOps> {
    ops: S,
    timeout: Option<Duration>,
}

impl<S: SessionOps> Session<S> {
    /// Create a new session with the default 10 second timeout
    pub fn new(ops: S) -> Self {
        Session {
            ops,
            timeout: Some(Duration::from_secs(10)),
        }
    }

    /// Set the timeout for operations
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Get the timeout
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Read data, polling first
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.ops.poll(PollEvents::Read, self.timeout)? {
            return Err(Error::Timeout);
        }
        self.ops.read(buf)
    }

    /// Fill the whole buffer or fail. A clean EOF mid-frame is reported
    /// as `ConnectionClosed`.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read(&mut buf[filled..])?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
            filled += n;
        }
        Ok(())
    }

    /// Write data, polling first
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if !self.ops.poll(PollEvents::Write, self.timeout)? {
            return Err(Error::Timeout);
        }
        self.ops.write(buf)
    }

    /// Write the whole buffer or fail
    pub fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        let mut written = 0;
        while written < buf.len() {
            let n = self.write(&buf[written..])?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
            written += n;
        }
        Ok(())
    }

    /// Close the session
    pub fn close(&mut self) -> Result<()> {
        self.ops.close()
    }

    /// Get a reference to the underlying transport
    pub fn get_ref(&self) -> &S {
        &self.ops
    }

    /// Get a mutable reference to the underlying transport
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.ops
    }
}

/// Plain TCP session operations
pub struct TcpSessionOps {
    stream: TcpStream,
}

impl TcpSessionOps {
    /// Create session operations from a TCP stream
    pub fn new(stream: TcpStream) -> Self {
        TcpSessionOps { stream }
    }

    /// Get a reference to the underlying stream
    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    /// Get a mutable reference to the underlying stream
    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }
}

impl SessionOps for TcpSessionOps {
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> Result<bool> {
        use libc::{poll, pollfd, POLLIN, POLLOUT};

        let mut pfd = pollfd {
            fd: self.stream.as_raw_fd(),
            events: match events {
                PollEvents::Read => POLLIN,
                PollEvents::Write => POLLOUT,
                PollEvents::Both => POLLIN | POLLOUT,
            },
            revents: 0,
        };

        let timeout_ms = timeout.map(|d| d.as_millis() as i32).unwrap_or(-1);

        let result = unsafe { poll(&mut pfd as *mut pollfd, 1, timeout_ms) };

        if result < 0 {
            return Err(Error::Io(io::Error::last_os_error()));
        }

        Ok(result > 0)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.stream.read(buf).map_err(Error::from)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.stream.write(buf).map_err(Error::from)
    }

    fn close(&mut self) -> Result<()> {
        use std::net::Shutdown;
        self.stream.shutdown(Shutdown::Both).map_err(Error::from)
    }
}

/// Helper to wrap a TCP stream into a session
pub fn from_tcp_stream(stream: TcpStream) -> Session<TcpSessionOps> {
    Session::new(TcpSessionOps::new(stream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_tcp_session_ops() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(b"Hello").unwrap();
        });

        let stream = TcpStream::connect(addr).unwrap();
        let mut session = TcpSessionOps::new(stream);

        assert!(session
            .poll(PollEvents::Read, Some(Duration::from_secs(1)))
            .unwrap());

        let mut buf = [0u8; 5];
        let n = session.read(&mut buf).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buf, b"Hello");

        handle.join().unwrap();
    }

    #[test]
    fn test_session_read_exact() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            // Dribble the bytes out in two writes
            stream.write_all(b"01234").unwrap();
            thread::sleep(Duration::from_millis(20));
            stream.write_all(b"56789").unwrap();
        });

        let stream = TcpStream::connect(addr).unwrap();
        let mut session = from_tcp_stream(stream);

        let mut buf = [0u8; 10];
        session.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"0123456789");

        handle.join().unwrap();
    }

    #[test]
    fn test_session_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let _handle = thread::spawn(move || {
            let (_stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_secs(2));
        });

        let stream = TcpStream::connect(addr).unwrap();
        let mut session = from_tcp_stream(stream);
        session.set_timeout(Some(Duration::from_millis(100)));

        let mut buf = [0u8; 10];
        let result = session.read(&mut buf);
        assert!(matches!(result, Err(Error::Timeout)));
    }
}
