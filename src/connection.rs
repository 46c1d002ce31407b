//! HTTP/2 connection state machine
//!
//! [`H2Connection`] owns everything one connection needs: the transport
//! session, the stream map, both HPACK directions, the connection-level
//! flow control windows and the negotiated settings. The client and
//! server front ends drive it through a small set of send operations and
//! a single [`recv_frame`](H2Connection::recv_frame) dispatch loop.
//!
//! Incoming frames are fully processed before they are handed back to
//! the caller; stream state, window accounting and automatic replies
//! (PING ACK, SETTINGS ACK, WINDOW_UPDATE replenishment) all happen in
//! the dispatcher. Dropping the returned frame is therefore always safe.

use crate::codec::FrameCodec;
use crate::error::{Error, ErrorCode, Result};
use crate::flow::FlowControl;
use crate::frame::*;
use crate::hpack::HpackContext;
use crate::session::{Session, SessionOps};
use crate::settings::Settings;
use crate::stream::{StreamId, StreamMap};
use crate::CONNECTION_PREFACE;
use bytes::Bytes;
use log::{debug, trace, warn};

/// Which side of the connection we are
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

impl Role {
    fn is_client(self) -> bool {
        matches!(self, Role::Client)
    }
}

/// An unfinished header block: CONTINUATION frames arrive on
/// `stream_id` and extend the block accumulating on `target`. The two
/// differ only for PUSH_PROMISE, whose block belongs to the promised
/// stream while its fragments travel on the associated stream.
#[derive(Debug, Clone, Copy)]
struct OpenHeaderBlock {
    stream_id: StreamId,
    target: StreamId,
}

/// An established HTTP/2 connection over some transport
pub struct H2Connection<S: SessionOps> {
    session: Session<S>,
    role: Role,
    streams: StreamMap,
    hpack: HpackContext,
    /// Settings we announced
    local_settings: Settings,
    /// Settings the peer announced, merged as SETTINGS frames arrive
    remote_settings: Settings,
    /// Connection-level flow control windows (stream 0)
    flow: FlowControl,
    /// Header block still owed CONTINUATION frames
    expecting_continuation: Option<OpenHeaderBlock>,
    /// Peer acknowledged our SETTINGS
    settings_acked: bool,
    /// Peer sent at least one SETTINGS frame
    remote_settings_received: bool,
    goaway_sent: Option<(StreamId, ErrorCode)>,
    goaway_received: Option<GoawayFrame>,
}

impl<S: SessionOps> H2Connection<S> {
    /// Perform the client side of the connection handshake.
    ///
    /// Sends the connection preface and our SETTINGS, then reads frames
    /// until the peer's SETTINGS arrive. The peer's ACK of our SETTINGS
    /// may come later; it is picked up by the normal dispatch loop.
    pub fn client_handshake(mut session: Session<S>, settings: Settings) -> Result<Self> {
        settings.validate()?;

        session.write_all(CONNECTION_PREFACE)?;

        let mut conn = Self::new(session, Role::Client, settings);
        conn.send_local_settings()?;
        conn.await_remote_settings()?;

        Ok(conn)
    }

    /// Perform the server side of the connection handshake.
    ///
    /// Expects the 24-byte client preface on the wire, then exchanges
    /// SETTINGS the same way the client side does.
    pub fn server_handshake(mut session: Session<S>, settings: Settings) -> Result<Self> {
        settings.validate()?;

        let mut preface = [0u8; 24];
        session.read_exact(&mut preface)?;
        if preface != *CONNECTION_PREFACE {
            return Err(Error::MissingPreface);
        }

        let mut conn = Self::new(session, Role::Server, settings);
        conn.send_local_settings()?;
        conn.await_remote_settings()?;

        Ok(conn)
    }

    fn new(session: Session<S>, role: Role, local_settings: Settings) -> Self {
        let mut streams = StreamMap::new(role.is_client());
        streams.set_max_remote_streams(local_settings.max_concurrent_streams());
        streams.set_recv_initial_window(local_settings.initial_window_size());

        let mut hpack = HpackContext::new();
        // Our decoder table is bounded by what we advertise
        hpack.set_max_table_size(local_settings.header_table_size());

        H2Connection {
            session,
            role,
            streams,
            hpack,
            local_settings,
            remote_settings: Settings::default(),
            flow: FlowControl::new(),
            expecting_continuation: None,
            settings_acked: false,
            remote_settings_received: false,
            goaway_sent: None,
            goaway_received: None,
        }
    }

    fn send_local_settings(&mut self) -> Result<()> {
        let frame = SettingsFrame::new(self.local_settings.clone());
        let encoded = FrameCodec::encode_settings_frame(&frame);
        FrameCodec::write_frame(&mut self.session, &encoded)?;
        debug!("sent SETTINGS ({:?})", self.role);
        Ok(())
    }

    fn await_remote_settings(&mut self) -> Result<()> {
        while !self.remote_settings_received {
            match self.recv_frame() {
                Ok(_) => {}
                Err(Error::Timeout) => return Err(Error::SettingsTimeout),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Announce new settings to the peer mid-connection. The frame is sent
    /// immediately; receive-side effects (HPACK table size, concurrency
    /// limit, initial window for new streams) are applied right away so the
    /// peer never sees us reject what we advertised.
    pub fn update_settings(&mut self, settings: Settings) -> Result<()> {
        settings.validate()?;
        self.local_settings.merge(&settings);
        self.streams
            .set_max_remote_streams(self.local_settings.max_concurrent_streams());
        self.streams
            .set_recv_initial_window(self.local_settings.initial_window_size());
        self.hpack
            .set_max_table_size(self.local_settings.header_table_size());
        self.settings_acked = false;
        let frame = SettingsFrame::new(settings);
        let encoded = FrameCodec::encode_settings_frame(&frame);
        FrameCodec::write_frame(&mut self.session, &encoded)?;
        debug!("sent SETTINGS update ({:?})", self.role);
        Ok(())
    }

    /// Our role on this connection
    pub fn role(&self) -> Role {
        self.role
    }

    /// The settings we announced
    pub fn local_settings(&self) -> &Settings {
        &self.local_settings
    }

    /// The settings the peer has announced so far
    pub fn remote_settings(&self) -> &Settings {
        &self.remote_settings
    }

    /// Whether the peer has acknowledged our SETTINGS
    pub fn settings_acked(&self) -> bool {
        self.settings_acked
    }

    /// The GOAWAY frame the peer sent, if any
    pub fn goaway_received(&self) -> Option<&GoawayFrame> {
        self.goaway_received.as_ref()
    }

    /// Stream map accessor
    pub fn streams(&self) -> &StreamMap {
        &self.streams
    }

    /// Mutable stream map accessor
    pub fn streams_mut(&mut self) -> &mut StreamMap {
        &mut self.streams
    }

    /// HPACK encoder/decoder pair
    pub fn hpack_mut(&mut self) -> &mut HpackContext {
        &mut self.hpack
    }

    /// Underlying session accessor
    pub fn session_mut(&mut self) -> &mut Session<S> {
        &mut self.session
    }

    /// Open a new locally initiated stream
    pub fn open_stream(&mut self) -> Result<StreamId> {
        if let Some(goaway) = &self.goaway_received {
            return Err(Error::GoawayReceived {
                last_stream_id: goaway.last_stream_id,
                error_code: goaway.error_code,
            });
        }
        self.streams.open_local()
    }

    /// Largest payload we accept, from our own SETTINGS
    fn local_max_frame_size(&self) -> usize {
        self.local_settings.max_frame_size() as usize
    }

    /// Largest payload the peer accepts
    fn remote_max_frame_size(&self) -> usize {
        self.remote_settings.max_frame_size() as usize
    }

    // --- send path ---------------------------------------------------

    /// Send a header block on a stream, fragmenting into HEADERS plus
    /// CONTINUATION frames when it exceeds the peer's max frame size.
    pub fn send_headers(
        &mut self,
        stream_id: StreamId,
        header_block: Bytes,
        end_stream: bool,
    ) -> Result<()> {
        let max = self.remote_max_frame_size();

        let stream = self
            .streams
            .get_mut(stream_id)
            .ok_or(Error::InvalidStreamId(stream_id))?;
        stream.send_headers(end_stream)?;

        let first_len = header_block.len().min(max);
        let first = header_block.slice(..first_len);
        let mut rest = header_block.slice(first_len..);
        let end_headers = rest.is_empty();

        let frame = HeadersFrame::new(stream_id, first, end_stream, end_headers);
        let encoded = FrameCodec::encode_headers_frame(&frame);
        FrameCodec::write_frame(&mut self.session, &encoded)?;
        trace!("sent HEADERS stream={} end_stream={}", stream_id, end_stream);

        while !rest.is_empty() {
            let chunk_len = rest.len().min(max);
            let chunk = rest.slice(..chunk_len);
            rest = rest.slice(chunk_len..);

            let cont = ContinuationFrame::new(stream_id, chunk, rest.is_empty());
            let encoded = FrameCodec::encode_continuation_frame(&cont);
            FrameCodec::write_frame(&mut self.session, &encoded)?;
            trace!("sent CONTINUATION stream={}", stream_id);
        }

        Ok(())
    }

    /// Send a body on a stream, chunked to the peer's max frame size and
    /// gated on both the stream and connection send windows.
    ///
    /// When both windows are exhausted this blocks on the dispatch loop
    /// until the peer grants more credit via WINDOW_UPDATE.
    pub fn send_data(&mut self, stream_id: StreamId, data: &[u8], end_stream: bool) -> Result<()> {
        if data.is_empty() {
            let frame = DataFrame::new(stream_id, Bytes::new(), end_stream);
            let stream = self
                .streams
                .get_mut(stream_id)
                .ok_or(Error::InvalidStreamId(stream_id))?;
            stream.send_data(0, end_stream)?;
            let encoded = FrameCodec::encode_data_frame(&frame);
            return FrameCodec::write_frame(&mut self.session, &encoded);
        }

        let mut offset = 0;
        while offset < data.len() {
            let remaining = data.len() - offset;
            let max_frame = self.remote_max_frame_size();

            let stream_window = self
                .streams
                .get(stream_id)
                .ok_or(Error::InvalidStreamId(stream_id))?
                .flow()
                .send_window()
                .size();
            let conn_window = self.flow.send_window().size();
            let window = stream_window.min(conn_window);

            if window <= 0 {
                trace!(
                    "send window empty on stream {} (stream={}, conn={}), waiting",
                    stream_id,
                    stream_window,
                    conn_window
                );
                // Frames received here are fully processed by dispatch,
                // so dropping the returned value loses nothing.
                self.recv_frame()?;
                continue;
            }

            let chunk = remaining.min(window as usize).min(max_frame);
            let last = offset + chunk == data.len() && end_stream;

            let stream = self
                .streams
                .get_mut(stream_id)
                .ok_or(Error::InvalidStreamId(stream_id))?;
            let granted = stream.send_data(chunk, last)?;
            debug_assert_eq!(granted, chunk);
            self.flow.consume_send(chunk);

            let frame = DataFrame::new(
                stream_id,
                Bytes::copy_from_slice(&data[offset..offset + chunk]),
                last,
            );
            let encoded = FrameCodec::encode_data_frame(&frame);
            FrameCodec::write_frame(&mut self.session, &encoded)?;
            trace!(
                "sent DATA stream={} len={} end_stream={}",
                stream_id,
                chunk,
                last
            );

            offset += chunk;
        }

        Ok(())
    }

    /// Send a PING
    pub fn send_ping(&mut self, data: [u8; 8]) -> Result<()> {
        let encoded = FrameCodec::encode_ping_frame(&PingFrame::new(data));
        FrameCodec::write_frame(&mut self.session, &encoded)
    }

    /// Send RST_STREAM and close the stream locally
    pub fn send_rst_stream(&mut self, stream_id: StreamId, code: ErrorCode) -> Result<()> {
        if let Some(stream) = self.streams.get_mut(stream_id) {
            stream.reset(code);
        }
        let encoded = FrameCodec::encode_rst_stream_frame(&RstStreamFrame::new(stream_id, code));
        FrameCodec::write_frame(&mut self.session, &encoded)
    }

    /// Send GOAWAY announcing graceful (or not) shutdown
    pub fn send_goaway(&mut self, code: ErrorCode, debug_data: &[u8]) -> Result<()> {
        let last = self.streams.highest_remote_id();
        let frame = GoawayFrame::new(last, code, Bytes::copy_from_slice(debug_data));
        let encoded = FrameCodec::encode_goaway_frame(&frame);
        FrameCodec::write_frame(&mut self.session, &encoded)?;
        self.goaway_sent = Some((last, code));
        debug!("sent GOAWAY last_stream={} code={}", last, code);
        Ok(())
    }

    /// Send a PUSH_PROMISE reserving `promised_id` (server only).
    ///
    /// The caller must have checked the peer's ENABLE_PUSH setting and
    /// reserved the id through the stream map.
    pub fn send_push_promise(
        &mut self,
        stream_id: StreamId,
        promised_id: StreamId,
        header_block: Bytes,
    ) -> Result<()> {
        let frame = PushPromiseFrame::new(stream_id, promised_id, header_block, true);
        let encoded = FrameCodec::encode_push_promise_frame(&frame);
        FrameCodec::write_frame(&mut self.session, &encoded)?;
        trace!(
            "sent PUSH_PROMISE stream={} promised={}",
            stream_id,
            promised_id
        );
        Ok(())
    }

    /// Grant the peer additional credit on a stream (or the connection
    /// when `stream_id` is 0). Mostly driven automatically by the
    /// dispatch loop; exposed for manual window management.
    pub fn send_window_update(&mut self, stream_id: StreamId, increment: u32) -> Result<()> {
        let encoded =
            FrameCodec::encode_window_update_frame(&WindowUpdateFrame::new(stream_id, increment));
        FrameCodec::write_frame(&mut self.session, &encoded)?;

        if stream_id == 0 {
            self.flow.apply_window_update_sent(increment)?;
        } else if let Some(stream) = self.streams.get_mut(stream_id) {
            stream.flow_mut().apply_window_update_sent(increment)?;
        }
        Ok(())
    }

    // --- receive path ------------------------------------------------

    /// Read, process and return the next frame.
    ///
    /// All protocol bookkeeping happens before the frame is returned:
    /// stream state transitions, window charges and replenishment,
    /// SETTINGS application and automatic ACKs. Frames that carry no
    /// information for the caller (unknown types, frames on reset
    /// streams) are skipped and the loop continues.
    ///
    /// A connection error sends GOAWAY before returning `Err`; a stream
    /// error sends RST_STREAM and continues the loop.
    pub fn recv_frame(&mut self) -> Result<Frame> {
        loop {
            let max_frame_size = self.local_max_frame_size();
            let (header, payload) = FrameCodec::read_frame(&mut self.session, max_frame_size)?;

            let frame = match FrameCodec::decode(&header, payload) {
                Ok(frame) => frame,
                Err(e) => return self.fail_connection(e),
            };

            // A header block in flight permits nothing but CONTINUATION
            // on the same stream (Section 6.10)
            if let Some(open) = self.expecting_continuation {
                let ok = matches!(&frame, Frame::Continuation(c) if c.stream_id == open.stream_id);
                if !ok {
                    return self.fail_connection(Error::Protocol(format!(
                        "expected CONTINUATION on stream {}",
                        open.stream_id
                    )));
                }
            }

            match self.process_frame(frame) {
                Ok(Some(frame)) => return Ok(frame),
                Ok(None) => continue,
                Err(e) if e.is_stream_error() => {
                    let stream_id = match &e {
                        Error::StreamClosed(id)
                        | Error::StreamProtocol(id, _)
                        | Error::RefusedStream(id)
                        | Error::Cancel(id) => *id,
                        _ => continue,
                    };
                    warn!("stream error on {}: {}", stream_id, e);
                    self.send_rst_stream(stream_id, e.error_code())?;
                    continue;
                }
                Err(e) => return self.fail_connection(e),
            }
        }
    }

    fn fail_connection(&mut self, err: Error) -> Result<Frame> {
        warn!("connection error: {}", err);
        if self.goaway_sent.is_none() {
            // Best effort; the transport may already be gone
            let _ = self.send_goaway(err.error_code(), err.to_string().as_bytes());
        }
        Err(err)
    }

    fn process_frame(&mut self, frame: Frame) -> Result<Option<Frame>> {
        match frame {
            Frame::Data(f) => self.on_data(f),
            Frame::Headers(f) => self.on_headers(f),
            Frame::Priority(f) => self.on_priority(f),
            Frame::RstStream(f) => self.on_rst_stream(f),
            Frame::Settings(f) => self.on_settings(f),
            Frame::PushPromise(f) => self.on_push_promise(f),
            Frame::Ping(f) => self.on_ping(f),
            Frame::Goaway(f) => self.on_goaway(f),
            Frame::WindowUpdate(f) => self.on_window_update(f),
            Frame::Continuation(f) => self.on_continuation(f),
            Frame::Unknown { frame_type, .. } => {
                trace!("ignoring unknown frame type 0x{:x}", frame_type);
                Ok(None)
            }
        }
    }

    fn on_data(&mut self, frame: DataFrame) -> Result<Option<Frame>> {
        let flow_len = frame.flow_controlled_len();

        // Connection window first; a breach here is a connection error
        self.flow.charge_received(flow_len)?;

        let stream = match self.streams.get_mut(frame.stream_id) {
            Some(s) => s,
            None => {
                // DATA on an idle stream is a connection error; ids
                // below the local counter or at/below the remote
                // high-water mark once existed and may arrive late
                // after we dropped the stream
                let known_locally = frame.stream_id < self.streams.peek_next_local_id();
                let known_remotely = frame.stream_id <= self.streams.highest_remote_id();
                if known_locally || known_remotely {
                    self.replenish_connection_window()?;
                    return Ok(None);
                }
                return Err(Error::Protocol(format!(
                    "DATA on idle stream {}",
                    frame.stream_id
                )));
            }
        };

        if stream.reset_code().is_some() {
            // Frames racing our RST_STREAM, drop but keep the window math
            self.replenish_connection_window()?;
            return Ok(None);
        }

        stream.recv_data(&frame.data, flow_len, frame.end_stream)?;

        self.replenish_connection_window()?;
        self.replenish_stream_window(frame.stream_id)?;

        trace!(
            "recv DATA stream={} len={} end_stream={}",
            frame.stream_id,
            frame.data.len(),
            frame.end_stream
        );
        Ok(Some(Frame::Data(frame)))
    }

    fn replenish_connection_window(&mut self) -> Result<()> {
        if let Some(increment) = self.flow.pending_window_update() {
            let encoded =
                FrameCodec::encode_window_update_frame(&WindowUpdateFrame::new(0, increment));
            FrameCodec::write_frame(&mut self.session, &encoded)?;
            self.flow.apply_window_update_sent(increment)?;
            trace!("replenished connection window by {}", increment);
        }
        Ok(())
    }

    fn replenish_stream_window(&mut self, stream_id: StreamId) -> Result<()> {
        let increment = match self.streams.get(stream_id) {
            Some(s) if !s.state().is_closed() => s.flow().pending_window_update(),
            _ => None,
        };
        if let Some(increment) = increment {
            let encoded = FrameCodec::encode_window_update_frame(&WindowUpdateFrame::new(
                stream_id, increment,
            ));
            FrameCodec::write_frame(&mut self.session, &encoded)?;
            if let Some(stream) = self.streams.get_mut(stream_id) {
                stream.flow_mut().apply_window_update_sent(increment)?;
            }
        }
        Ok(())
    }

    /// Bound the accumulating header block by our advertised
    /// SETTINGS_MAX_HEADER_LIST_SIZE. A fragment we refuse to buffer can
    /// never reach the shared decoder, so the breach is terminal for the
    /// whole connection, not just the stream.
    fn check_header_block_bound(&self, stream_id: StreamId) -> Result<()> {
        let limit = match self.local_settings.max_header_list_size() {
            Some(limit) => limit as usize,
            None => return Ok(()),
        };
        if let Some(stream) = self.streams.get(stream_id) {
            if stream.header_block().len() > limit {
                return Err(Error::Protocol(format!(
                    "header block on stream {} exceeds {} bytes",
                    stream_id, limit
                )));
            }
        }
        Ok(())
    }

    /// Run a completed header block through the shared HPACK decoder.
    ///
    /// Blocks are decoded here, in wire order, the moment END_HEADERS
    /// arrives; consuming them later (or never) cannot desynchronize the
    /// dynamic table the peer's encoder assumes we keep.
    fn decode_header_block(&mut self, stream_id: StreamId) -> Result<()> {
        let block = match self.streams.get_mut(stream_id) {
            Some(stream) => stream.take_header_block(),
            None => return Ok(()),
        };
        let decoded = self.hpack.decode(&block)?;
        if let Some(stream) = self.streams.get_mut(stream_id) {
            stream.merge_headers(decoded);
        }
        Ok(())
    }

    fn on_headers(&mut self, frame: HeadersFrame) -> Result<Option<Frame>> {
        let stream_id = frame.stream_id;

        let is_remote_initiated = if self.role.is_client() {
            stream_id % 2 == 0
        } else {
            stream_id % 2 == 1
        };

        if !self.streams.contains(stream_id) {
            if is_remote_initiated {
                self.streams.open_remote(stream_id)?;
            } else {
                return Err(Error::Protocol(format!(
                    "HEADERS on unopened local stream {}",
                    stream_id
                )));
            }
        }

        let stream = self
            .streams
            .get_mut(stream_id)
            .ok_or(Error::InvalidStreamId(stream_id))?;

        if let Some(priority) = frame.priority {
            stream.set_priority(priority);
        }
        stream.recv_headers(&frame.header_block, frame.end_stream, frame.end_headers)?;
        self.check_header_block_bound(stream_id)?;

        self.expecting_continuation = if frame.end_headers {
            self.decode_header_block(stream_id)?;
            None
        } else {
            Some(OpenHeaderBlock {
                stream_id,
                target: stream_id,
            })
        };

        trace!(
            "recv HEADERS stream={} end_stream={} end_headers={}",
            stream_id,
            frame.end_stream,
            frame.end_headers
        );
        Ok(Some(Frame::Headers(frame)))
    }

    fn on_continuation(&mut self, frame: ContinuationFrame) -> Result<Option<Frame>> {
        // Fragments extend the open block's target, which is the
        // promised stream when the block came in on a PUSH_PROMISE
        let target = match self.expecting_continuation {
            Some(open) => open.target,
            None => {
                return Err(Error::Protocol(format!(
                    "CONTINUATION on stream {} without an open header block",
                    frame.stream_id
                )))
            }
        };

        let stream = self
            .streams
            .get_mut(target)
            .ok_or_else(|| Error::Protocol("CONTINUATION on unknown stream".into()))?;

        stream.recv_continuation(&frame.header_block, frame.end_headers)?;
        self.check_header_block_bound(target)?;

        if frame.end_headers {
            self.decode_header_block(target)?;
            self.expecting_continuation = None;
        }

        Ok(Some(Frame::Continuation(frame)))
    }

    fn on_priority(&mut self, frame: PriorityFrame) -> Result<Option<Frame>> {
        if frame.stream_id == frame.priority.stream_dependency {
            // A stream cannot depend on itself (Section 5.3.1)
            return Err(Error::Protocol(format!(
                "stream {} depends on itself",
                frame.stream_id
            )));
        }
        // PRIORITY is valid in any state, including idle and closed
        if let Some(stream) = self.streams.get_mut(frame.stream_id) {
            stream.set_priority(frame.priority);
        }
        Ok(Some(Frame::Priority(frame)))
    }

    fn on_rst_stream(&mut self, frame: RstStreamFrame) -> Result<Option<Frame>> {
        match self.streams.get_mut(frame.stream_id) {
            Some(stream) => stream.reset(frame.error_code),
            None => {
                // RST_STREAM on an idle stream is a connection error;
                // ids below the local counter or at/below the remote
                // high-water mark once existed and may be reset late
                let known_locally = frame.stream_id < self.streams.peek_next_local_id();
                let known_remotely = frame.stream_id <= self.streams.highest_remote_id();
                if !known_locally && !known_remotely {
                    return Err(Error::Protocol(format!(
                        "RST_STREAM on idle stream {}",
                        frame.stream_id
                    )));
                }
            }
        }
        debug!(
            "recv RST_STREAM stream={} code={}",
            frame.stream_id, frame.error_code
        );
        Ok(Some(Frame::RstStream(frame)))
    }

    fn on_settings(&mut self, frame: SettingsFrame) -> Result<Option<Frame>> {
        if frame.ack {
            self.settings_acked = true;
            debug!("peer acknowledged our SETTINGS");
            return Ok(None);
        }

        frame.settings.validate()?;

        // Section 6.9.2: a new INITIAL_WINDOW_SIZE adjusts every open
        // stream's send window by the delta
        if let Some(size) = frame.settings.initial_window_size {
            self.streams.apply_send_initial_window(size)?;
        }
        if let Some(max) = frame.settings.max_concurrent_streams {
            self.streams.set_max_local_streams(Some(max));
        }

        self.remote_settings.merge(&frame.settings);
        self.remote_settings_received = true;

        let ack = FrameCodec::encode_settings_frame(&SettingsFrame::ack());
        FrameCodec::write_frame(&mut self.session, &ack)?;
        debug!("recv SETTINGS, sent ACK");

        Ok(Some(Frame::Settings(frame)))
    }

    fn on_push_promise(&mut self, frame: PushPromiseFrame) -> Result<Option<Frame>> {
        if !self.role.is_client() {
            return Err(Error::Protocol(
                "PUSH_PROMISE received by server".into(),
            ));
        }
        if !self.local_settings.enable_push() {
            // We advertised ENABLE_PUSH=0; a promise is a connection error
            return Err(Error::PushDisabled);
        }

        self.streams.reserve_remote(frame.promised_stream_id)?;

        let stream = self
            .streams
            .get_mut(frame.promised_stream_id)
            .ok_or(Error::InvalidStreamId(frame.promised_stream_id))?;
        stream.recv_continuation(&frame.header_block, frame.end_headers)?;
        self.check_header_block_bound(frame.promised_stream_id)?;

        self.expecting_continuation = if frame.end_headers {
            self.decode_header_block(frame.promised_stream_id)?;
            None
        } else {
            Some(OpenHeaderBlock {
                stream_id: frame.stream_id,
                target: frame.promised_stream_id,
            })
        };

        debug!(
            "recv PUSH_PROMISE stream={} promised={}",
            frame.stream_id, frame.promised_stream_id
        );
        Ok(Some(Frame::PushPromise(frame)))
    }

    fn on_ping(&mut self, frame: PingFrame) -> Result<Option<Frame>> {
        if !frame.ack {
            let pong = FrameCodec::encode_ping_frame(&PingFrame::ack(frame.data));
            FrameCodec::write_frame(&mut self.session, &pong)?;
            trace!("recv PING, sent ACK");
        }
        Ok(Some(Frame::Ping(frame)))
    }

    fn on_goaway(&mut self, frame: GoawayFrame) -> Result<Option<Frame>> {
        debug!(
            "recv GOAWAY last_stream={} code={}",
            frame.last_stream_id, frame.error_code
        );
        self.goaway_received = Some(frame.clone());
        Ok(Some(Frame::Goaway(frame)))
    }

    fn on_window_update(&mut self, frame: WindowUpdateFrame) -> Result<Option<Frame>> {
        if frame.stream_id == 0 {
            self.flow.increase_send(frame.increment)?;
            trace!(
                "connection send window now {}",
                self.flow.send_window().size()
            );
        } else {
            if frame.increment == 0 {
                // A zero increment is a stream error here, a connection
                // error only on stream 0 (Section 6.9)
                return Err(Error::StreamProtocol(
                    frame.stream_id,
                    "WINDOW_UPDATE increment must be non-zero".into(),
                ));
            }
            match self.streams.get_mut(frame.stream_id) {
                Some(stream) => {
                    stream.flow_mut().increase_send(frame.increment)?;
                }
                None => {
                    // Likely a window grant racing stream teardown
                    trace!(
                        "WINDOW_UPDATE for unknown stream {}, ignoring",
                        frame.stream_id
                    );
                }
            }
        }
        Ok(Some(Frame::WindowUpdate(frame)))
    }
}
