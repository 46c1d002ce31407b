//! HTTP/2 server
//!
//! The server side of the connection: accepts the client preface,
//! exchanges SETTINGS and then hands out complete [`H2Request`]s one at
//! a time. Responses, trailers and server push all go back through the
//! same [`H2Connection`] the client front end uses.

use crate::connection::H2Connection;
use crate::error::{Error, ErrorCode, Result};
use crate::frame::Frame;
use crate::session::{from_tcp_stream, Session, SessionOps, TcpSessionOps};
use crate::settings::{Settings, SettingsBuilder};
use crate::net;
use crate::stream::StreamId;
use log::debug;
use std::net::TcpStream;
use std::time::Duration;

/// Builder for [`H2Server`]
pub struct H2ServerBuilder {
    settings: Settings,
    timeout: Option<Duration>,
}

impl H2ServerBuilder {
    /// Create a builder with a modest default concurrency limit
    pub fn new() -> Self {
        let settings = SettingsBuilder::new()
            .max_concurrent_streams(100)
            .build()
            .unwrap_or_default();
        H2ServerBuilder {
            settings,
            timeout: Some(Duration::from_secs(10)),
        }
    }

    /// Advertise a header table size
    pub fn header_table_size(mut self, size: u32) -> Self {
        self.settings.header_table_size = Some(size);
        self
    }

    /// Limit the number of streams a client may have in flight
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

    /// Take an accepted TCP stream through the server handshake
    pub fn accept(self, stream: TcpStream) -> Result<H2Server<TcpSessionOps>> {
        net::configure_accepted(&stream)?;
        let mut session = from_tcp_stream(stream);
        session.set_timeout(self.timeout);
        self.handshake(session)
    }

    /// Perform the handshake over an existing session (any transport)
    pub fn handshake<S: SessionOps>(self, session: Session<S>) -> Result<H2Server<S>> {
        let conn = H2Connection::server_handshake(session, self.settings)?;
        Ok(H2Server { conn })
    }
}

impl Default for H2ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// One accepted HTTP/2 connection, server side
pub struct H2Server<S: SessionOps> {
    conn: H2Connection<S>,
}

impl<S: SessionOps> H2Server<S> {
    /// Pump the connection until a complete request (headers and body)
    /// has arrived, then decode and return it.
    ///
    /// Returns `ConnectionClosed` once the client sends GOAWAY and no
    /// further requests can arrive.
    pub fn recv_request(&mut self) -> Result<H2Request> {
        loop {
            if let Some(stream_id) = self.complete_request_stream() {
                return self.decode_request(stream_id);
            }

            match self.conn.recv_frame()? {
                Frame::Goaway(_) => {
                    if self.complete_request_stream().is_none() {
                        return Err(Error::ConnectionClosed);
                    }
                }
                _ => {}
            }
        }
    }

    /// Find a client-initiated stream whose request is fully received
    /// and not yet consumed.
    fn complete_request_stream(&self) -> Option<StreamId> {
        let mut ids: Vec<StreamId> = self
            .conn
            .streams()
            .ids()
            .into_iter()
            .filter(|id| id % 2 == 1)
            .collect();
        ids.sort_unstable();

        ids.into_iter().find(|&id| {
            self.conn
                .streams()
                .get(id)
                .map(|s| {
                    s.headers_complete()
                        && s.stream_complete()
                        && s.reset_code().is_none()
                        && s.headers().is_some()
                })
                .unwrap_or(false)
        })
    }

    fn decode_request(&mut self, stream_id: StreamId) -> Result<H2Request> {
        let (headers, body) = {
            let stream = self
                .conn
                .streams_mut()
                .get_mut(stream_id)
                .ok_or(Error::StreamClosed(stream_id))?;
            let headers = stream
                .take_headers()
                .ok_or_else(|| Error::InvalidHeader("request without headers".into()))?;
            (headers, stream.take_body())
        };

        let method = headers
            .method
            .clone()
            .ok_or_else(|| Error::InvalidHeader("request without :method".into()))?;
        let path = headers
            .path
            .clone()
            .ok_or_else(|| Error::InvalidHeader("request without :path".into()))?;

        debug!("request {} {} on stream {}", method, path, stream_id);

        Ok(H2Request {
            stream_id,
            method,
            path,
            scheme: headers.scheme,
            authority: headers.authority,
            headers: headers.fields,
            body,
        })
    }

    /// Send a complete response on a stream
    pub fn send_response(
        &mut self,
        stream_id: StreamId,
        status: u16,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<()> {
        let status_str = status.to_string();
        let mut all: Vec<(&str, &str)> = vec![(":status", &status_str)];
        all.extend_from_slice(headers);

        let block = self.conn.hpack_mut().encode(&all)?;
        let end_stream = body.is_empty();
        self.conn.send_headers(stream_id, block, end_stream)?;

        if !body.is_empty() {
            self.conn.send_data(stream_id, body, true)?;
        }

        self.conn.streams_mut().cleanup_closed();
        Ok(())
    }

    /// Send response headers without ending the stream; follow up with
    /// [`send_body_chunk`](Self::send_body_chunk) and
    /// [`send_trailers`](Self::send_trailers).
    pub fn send_response_headers(
        &mut self,
        stream_id: StreamId,
        status: u16,
        headers: &[(&str, &str)],
    ) -> Result<()> {
        let status_str = status.to_string();
        let mut all: Vec<(&str, &str)> = vec![(":status", &status_str)];
        all.extend_from_slice(headers);

        let block = self.conn.hpack_mut().encode(&all)?;
        self.conn.send_headers(stream_id, block, false)
    }

    /// Send part of a response body
    pub fn send_body_chunk(
        &mut self,
        stream_id: StreamId,
        chunk: &[u8],
        end_stream: bool,
    ) -> Result<()> {
        self.conn.send_data(stream_id, chunk, end_stream)
    }

    /// Send trailers, ending the stream
    pub fn send_trailers(&mut self, stream_id: StreamId, trailers: &[(&str, &str)]) -> Result<()> {
        let block = self.conn.hpack_mut().encode(trailers)?;
        self.conn.send_headers(stream_id, block, true)
    }

    /// Promise a pushed response on a new even stream.
    ///
    /// Fails with `PushDisabled` unless the client advertised
    /// ENABLE_PUSH=1. Returns the promised stream id; the caller then
    /// sends the pushed response on it with
    /// [`send_response`](Self::send_response).
    pub fn push_promise(
        &mut self,
        stream_id: StreamId,
        authority: &str,
        path: &str,
    ) -> Result<StreamId> {
        if !self.conn.remote_settings().enable_push() {
            return Err(Error::PushDisabled);
        }

        let promised_id = self.conn.streams_mut().reserve_local()?;

        let headers: Vec<(&str, &str)> = vec![
            (":method", "GET"),
            (":scheme", "http"),
            (":authority", authority),
            (":path", path),
        ];
        let block = self.conn.hpack_mut().encode(&headers)?;
        self.conn.send_push_promise(stream_id, promised_id, block)?;

        Ok(promised_id)
    }

    /// Reject a stream without tearing down the connection
    pub fn reset_stream(&mut self, stream_id: StreamId, code: ErrorCode) -> Result<()> {
        self.conn.send_rst_stream(stream_id, code)
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

/// A complete HTTP/2 request
#[derive(Debug)]
pub struct H2Request {
    stream_id: StreamId,
    method: String,
    path: String,
    scheme: Option<String>,
    authority: Option<String>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl H2Request {
    /// The stream this request arrived on; pass it back to
    /// [`H2Server::send_response`]
    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    /// Request method
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Request path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Request scheme, if sent
    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    /// Request authority, if sent
    pub fn authority(&self) -> Option<&str> {
        self.authority.as_deref()
    }

    /// All regular headers in arrival order
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

    /// Request body bytes
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Request body as UTF-8, lossy
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = H2ServerBuilder::new();
        assert_eq!(builder.settings.max_concurrent_streams, Some(100));
        assert_eq!(builder.timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_request_accessors() {
        let request = H2Request {
            stream_id: 1,
            method: "POST".into(),
            path: "/upload".into(),
            scheme: Some("http".into()),
            authority: Some("localhost".into()),
            headers: vec![("content-type".into(), "application/json".into())],
            body: b"{}".to_vec(),
        };

        assert_eq!(request.method(), "POST");
        assert_eq!(request.path(), "/upload");
        assert_eq!(request.scheme(), Some("http"));
        assert_eq!(request.header("Content-Type"), Some("application/json"));
        assert_eq!(request.body_string(), "{}");
    }
}
