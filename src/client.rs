//! HTTP/2 client
//!
//! A synchronous client driving [`H2Connection`] over any transport.
//! Requests are sent on freshly opened odd-numbered streams and the
//! dispatch loop is pumped until the response for that stream is
//! complete, so responses interleaved across streams are all captured.
//!
//! ```no_run
//! use h2wire::{H2ClientBuilder};
//!
//! let mut client = H2ClientBuilder::new()
//!     .connect("example.com:80")
//!     .unwrap();
//! let response = client.get("example.com", "/").unwrap();
//! println!("status: {}", response.status());
//! ```

use crate::connection::H2Connection;
use crate::error::{Error, ErrorCode, Result};
use crate::net;
use crate::session::{from_tcp_stream, Session, SessionOps, TcpSessionOps};
use crate::settings::{Settings, SettingsBuilder};
use crate::stream::StreamId;
use log::debug;
use std::net::ToSocketAddrs;
use std::time::{Duration, Instant};

/// Builder for [`H2Client`]
pub struct H2ClientBuilder {
    settings: Settings,
    timeout: Option<Duration>,
}

impl H2ClientBuilder {
    /// Create a builder with client defaults: push disabled, everything
    /// else at the RFC 7540 values.
    pub fn new() -> Self {
        let settings = SettingsBuilder::new()
            .enable_push(false)
            .build()
            .unwrap_or_default();
        H2ClientBuilder {
            settings,
            timeout: Some(Duration::from_secs(10)),
        }
    }

    /// Advertise a header table size
    pub fn header_table_size(mut self, size: u32) -> Self {
        self.settings.header_table_size = Some(size);
        self
    }

    /// Allow or forbid server push (forbidden by default)
    pub fn enable_push(mut self, enable: bool) -> Self {
        self.settings.enable_push = Some(enable);
        self
    }

    /// Limit the number of streams the server may open toward us
    pub fn max_concurrent_streams(mut self, max: u32) -> Self {
        self.settings.max_concurrent_streams = Some(max);
        self
    }

    /// Advertise an initial stream window size
    pub fn initial_window_size(mut self, size: u32) -> Self {
        self.settings.initial_window_size = Some(size);
        self
    }

    /// Advertise a maximum frame size
    pub fn max_frame_size(mut self, size: u32) -> Self {
        self.settings.max_frame_size = Some(size);
        self
    }

    /// I/O timeout for the connection (default 10 seconds)
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Connect over TCP and perform the HTTP/2 handshake
    pub fn connect<A: ToSocketAddrs>(self, addr: A) -> Result<H2Client<TcpSessionOps>> {
        let stream = net::connect(addr, self.timeout)?;
        let mut session = from_tcp_stream(stream);
        session.set_timeout(self.timeout);
        self.handshake(session)
    }

    /// Perform the handshake over an existing session (any transport)
    pub fn handshake<S: SessionOps>(self, session: Session<S>) -> Result<H2Client<S>> {
        let conn = H2Connection::client_handshake(session, self.settings)?;
        Ok(H2Client { conn })
    }
}

impl Default for H2ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A connected HTTP/2 client
pub struct H2Client<S: SessionOps> {
    conn: H2Connection<S>,
}

impl<S: SessionOps> H2Client<S> {
    /// Send a GET request and wait for the complete response
    pub fn get(&mut self, authority: &str, path: &str) -> Result<H2Response> {
        self.request("GET", authority, path, &[], None)
    }

    /// Send a POST request with a body and wait for the complete response
    pub fn post(&mut self, authority: &str, path: &str, body: &[u8]) -> Result<H2Response> {
        self.request("POST", authority, path, &[], Some(body))
    }

    /// Send a request and pump the connection until its response is done.
    ///
    /// `extra_headers` are appended after the pseudo-headers; names are
    /// lowercased on the way out as HPACK requires.
    pub fn request(
        &mut self,
        method: &str,
        authority: &str,
        path: &str,
        extra_headers: &[(&str, &str)],
        body: Option<&[u8]>,
    ) -> Result<H2Response> {
        let stream_id = self.conn.open_stream()?;

        let mut headers: Vec<(&str, &str)> = vec![
            (":method", method),
            (":scheme", "http"),
            (":authority", authority),
            (":path", path),
        ];
        headers.extend_from_slice(extra_headers);

        let block = self.conn.hpack_mut().encode(&headers)?;
        let end_stream = body.is_none();
        self.conn.send_headers(stream_id, block, end_stream)?;

        if let Some(body) = body {
            self.conn.send_data(stream_id, body, true)?;
        }

        debug!("request {} {} on stream {}", method, path, stream_id);
        self.recv_response(stream_id)
    }

    /// Pump the dispatch loop until the given stream's response is
    /// complete, then decode it.
    fn recv_response(&mut self, stream_id: StreamId) -> Result<H2Response> {
        loop {
            {
                let stream = self
                    .conn
                    .streams()
                    .get(stream_id)
                    .ok_or(Error::StreamClosed(stream_id))?;

                if let Some(code) = stream.reset_code() {
                    return Err(match code {
                        ErrorCode::RefusedStream => Error::RefusedStream(stream_id),
                        ErrorCode::Cancel => Error::Cancel(stream_id),
                        other => Error::Protocol(format!(
                            "stream {} reset by server: {}",
                            stream_id, other
                        )),
                    });
                }

                if stream.headers_complete() && stream.stream_complete() {
                    break;
                }
            }

            self.conn.recv_frame()?;
        }

        let (headers, body) = {
            let stream = self
                .conn
                .streams_mut()
                .get_mut(stream_id)
                .ok_or(Error::StreamClosed(stream_id))?;
            let headers = stream
                .take_headers()
                .ok_or_else(|| Error::InvalidHeader("response without headers".into()))?;
            (headers, stream.take_body())
        };

        let status = headers
            .status
            .ok_or_else(|| Error::InvalidHeader("response without :status".into()))?;

        self.conn.streams_mut().cleanup_closed();

        Ok(H2Response {
            stream_id,
            status,
            headers: headers.fields,
            body,
        })
    }

    /// Round-trip a PING and measure the latency
    pub fn ping(&mut self) -> Result<Duration> {
        let data: [u8; 8] = rand_ping_payload();
        let start = Instant::now();
        self.conn.send_ping(data)?;

        loop {
            match self.conn.recv_frame()? {
                crate::frame::Frame::Ping(pong) if pong.ack && pong.data == data => {
                    return Ok(start.elapsed());
                }
                _ => {}
            }
        }
    }

    /// Announce shutdown and close the transport
    pub fn close(&mut self) -> Result<()> {
        self.conn.send_goaway(ErrorCode::NoError, b"")?;
        self.conn.session_mut().close()
    }

    /// Access the underlying connection for advanced use
    pub fn connection_mut(&mut self) -> &mut H2Connection<S> {
        &mut self.conn
    }
}

/// Derive a PING payload from the current time; uniqueness is all that
/// matters here, not unpredictability.
fn rand_ping_payload() -> [u8; 8] {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    nanos.to_be_bytes()
}

/// A complete HTTP/2 response
#[derive(Debug)]
pub struct H2Response {
    stream_id: StreamId,
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl H2Response {
    /// The stream the response arrived on
    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    /// HTTP status code
    pub fn status(&self) -> u16 {
        self.status
    }

    /// All headers in arrival order
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Look up a header by (case-insensitive) name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Response body bytes
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Response body as UTF-8, lossy
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
