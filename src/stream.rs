//! HTTP/2 stream management
//!
//! The stream state machine of RFC 7540 Section 5.1 and the per-connection
//! stream map that enforces identifier and concurrency rules.

use crate::error::{Error, Result};
use crate::flow::FlowControl;
use crate::frame::PrioritySpec;
use crate::hpack::HeaderList;
use crate::MAX_STREAM_ID;
use std::collections::HashMap;

/// Stream ID type
pub type StreamId = u32;

/// Stream state as defined in RFC 7540 Section 5.1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Idle: no frames have been sent or received
    Idle,
    /// Reserved (local): we sent PUSH_PROMISE
    ReservedLocal,
    /// Reserved (remote): we received PUSH_PROMISE
    ReservedRemote,
    /// Open: both sides can send frames
    Open,
    /// Half-closed (local): we sent END_STREAM, peer may still send
    HalfClosedLocal,
    /// Half-closed (remote): peer sent END_STREAM, we may still send
    HalfClosedRemote,
    /// Closed
    Closed,
}

impl StreamState {
    /// Check if we may send DATA in this state
    pub fn can_send(&self) -> bool {
        matches!(self, StreamState::Open | StreamState::HalfClosedRemote)
    }

    /// Check if the peer may send DATA in this state
    pub fn can_receive(&self) -> bool {
        matches!(self, StreamState::Open | StreamState::HalfClosedLocal)
    }

    /// Check if stream is closed
    pub fn is_closed(&self) -> bool {
        matches!(self, StreamState::Closed)
    }
}

/// A single HTTP/2 stream: state, flow control windows and the header
/// block / body accumulated so far.
#[derive(Debug)]
pub struct H2Stream {
    id: StreamId,
    state: StreamState,
    flow: FlowControl,
    priority: Option<PrioritySpec>,
    /// Header block fragments, concatenated across HEADERS + CONTINUATION
    header_block: Vec<u8>,
    /// Fields decoded from completed header blocks, in wire order; a
    /// second block (trailers) appends its regular fields
    headers: Option<HeaderList>,
    /// Accumulated DATA payloads
    body: Vec<u8>,
    headers_complete: bool,
    stream_complete: bool,
    /// Set when the stream ends via RST_STREAM rather than END_STREAM
    reset: Option<crate::error::ErrorCode>,
}

impl H2Stream {
    /// Create a new idle stream with default window sizes
    pub fn new(id: StreamId) -> Self {
        Self::with_window_sizes(id, crate::DEFAULT_INITIAL_WINDOW_SIZE, crate::DEFAULT_INITIAL_WINDOW_SIZE)
    }

    /// Create a new idle stream with the negotiated window sizes
    pub fn with_window_sizes(id: StreamId, send_size: u32, recv_size: u32) -> Self {
        H2Stream {
            id,
            state: StreamState::Idle,
            flow: FlowControl::with_initial_sizes(send_size, recv_size),
            priority: None,
            header_block: Vec::new(),
            headers: None,
            body: Vec::new(),
            headers_complete: false,
            stream_complete: false,
            reset: None,
        }
    }

    /// Get stream ID
    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Get stream state
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Get flow control
    pub fn flow(&self) -> &FlowControl {
        &self.flow
    }

    /// Get mutable flow control
    pub fn flow_mut(&mut self) -> &mut FlowControl {
        &mut self.flow
    }

    /// Get priority
    pub fn priority(&self) -> Option<&PrioritySpec> {
        self.priority.as_ref()
    }

    /// Set priority
    pub fn set_priority(&mut self, priority: PrioritySpec) {
        self.priority = Some(priority);
    }

    /// True once END_HEADERS has been seen
    pub fn headers_complete(&self) -> bool {
        self.headers_complete
    }

    /// True once END_STREAM has been seen
    pub fn stream_complete(&self) -> bool {
        self.stream_complete
    }

    /// The RST_STREAM code that ended this stream, if any
    pub fn reset_code(&self) -> Option<crate::error::ErrorCode> {
        self.reset
    }

    /// Accumulated header block
    pub fn header_block(&self) -> &[u8] {
        &self.header_block
    }

    /// Take the accumulated header block
    pub fn take_header_block(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.header_block)
    }

    /// Decoded header fields, once at least one block has completed
    pub fn headers(&self) -> Option<&HeaderList> {
        self.headers.as_ref()
    }

    /// Take the decoded headers
    pub fn take_headers(&mut self) -> Option<HeaderList> {
        self.headers.take()
    }

    /// Store a decoded header block. A later block (trailers) appends
    /// its regular fields; pseudo-headers from the first block win.
    pub fn merge_headers(&mut self, decoded: HeaderList) {
        match &mut self.headers {
            None => self.headers = Some(decoded),
            Some(existing) => {
                if existing.status.is_none() {
                    existing.status = decoded.status;
                }
                existing.fields.extend(decoded.fields);
            }
        }
    }

    /// Accumulated body
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Take the accumulated body
    pub fn take_body(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.body)
    }

    /// Process an incoming HEADERS frame (or its header block fragment)
    pub fn recv_headers(&mut self, fragment: &[u8], end_stream: bool, end_headers: bool) -> Result<()> {
        match self.state {
            StreamState::Idle => {
                self.state = if end_stream {
                    StreamState::HalfClosedRemote
                } else {
                    StreamState::Open
                };
            }
            StreamState::ReservedRemote => {
                self.state = if end_stream {
                    StreamState::Closed
                } else {
                    StreamState::HalfClosedLocal
                };
            }
            StreamState::Open | StreamState::HalfClosedLocal => {
                // Trailers
                if end_stream {
                    self.state = match self.state {
                        StreamState::HalfClosedLocal => StreamState::Closed,
                        _ => StreamState::HalfClosedRemote,
                    };
                }
            }
            _ => {
                return Err(Error::StreamClosed(self.id));
            }
        }

        self.header_block.extend_from_slice(fragment);

        if end_headers {
            self.headers_complete = true;
        }
        if end_stream {
            self.stream_complete = true;
        }

        Ok(())
    }

    /// Append a CONTINUATION fragment to the header block
    pub fn recv_continuation(&mut self, fragment: &[u8], end_headers: bool) -> Result<()> {
        if self.headers_complete {
            return Err(Error::Protocol(format!(
                "CONTINUATION on stream {} after END_HEADERS",
                self.id
            )));
        }
        self.header_block.extend_from_slice(fragment);
        if end_headers {
            self.headers_complete = true;
        }
        Ok(())
    }

    /// Process an incoming DATA payload (already flow-charged by caller
    /// at the connection level; this charges the stream window).
    pub fn recv_data(&mut self, data: &[u8], flow_len: usize, end_stream: bool) -> Result<()> {
        if !self.state.can_receive() {
            return Err(Error::StreamClosed(self.id));
        }

        self.flow.charge_received(flow_len)?;
        self.body.extend_from_slice(data);

        if end_stream {
            self.stream_complete = true;
            self.state = match self.state {
                StreamState::Open => StreamState::HalfClosedRemote,
                StreamState::HalfClosedLocal => StreamState::Closed,
                other => other,
            };
        }

        Ok(())
    }

    /// Account for an outgoing HEADERS frame
    pub fn send_headers(&mut self, end_stream: bool) -> Result<()> {
        match self.state {
            StreamState::Idle => {
                self.state = if end_stream {
                    StreamState::HalfClosedLocal
                } else {
                    StreamState::Open
                };
            }
            StreamState::ReservedLocal => {
                self.state = if end_stream {
                    StreamState::Closed
                } else {
                    StreamState::HalfClosedRemote
                };
            }
            StreamState::Open | StreamState::HalfClosedRemote => {
                if end_stream {
                    self.state = match self.state {
                        StreamState::HalfClosedRemote => StreamState::Closed,
                        _ => StreamState::HalfClosedLocal,
                    };
                }
            }
            _ => {
                return Err(Error::StreamClosed(self.id));
            }
        }

        Ok(())
    }

    /// Account for an outgoing DATA frame.
    ///
    /// Returns the flow-control credit actually granted; callers chunk or
    /// block when this is short of `data_len`.
    pub fn send_data(&mut self, data_len: usize, end_stream: bool) -> Result<usize> {
        if !self.state.can_send() {
            return Err(Error::StreamClosed(self.id));
        }

        let granted = self.flow.consume_send(data_len);

        if end_stream {
            self.state = match self.state {
                StreamState::Open => StreamState::HalfClosedLocal,
                StreamState::HalfClosedRemote => StreamState::Closed,
                other => other,
            };
        }

        Ok(granted)
    }

    /// Move to Reserved (local): we promised this stream with PUSH_PROMISE
    pub fn reserve_local(&mut self) -> Result<()> {
        if self.state != StreamState::Idle {
            return Err(Error::Protocol(format!(
                "cannot reserve stream {} in state {:?}",
                self.id, self.state
            )));
        }
        self.state = StreamState::ReservedLocal;
        Ok(())
    }

    /// Move to Reserved (remote): the peer promised this stream
    pub fn reserve_remote(&mut self) -> Result<()> {
        if self.state != StreamState::Idle {
            return Err(Error::Protocol(format!(
                "cannot reserve stream {} in state {:?}",
                self.id, self.state
            )));
        }
        self.state = StreamState::ReservedRemote;
        Ok(())
    }

    /// Close the stream after an RST_STREAM (either direction)
    pub fn reset(&mut self, code: crate::error::ErrorCode) {
        self.reset = Some(code);
        self.state = StreamState::Closed;
    }

    /// Close the stream
    pub fn close(&mut self) {
        self.state = StreamState::Closed;
    }
}

/// The stream multiplexer: owns every stream of one connection and
/// enforces the Section 5.1.1 identifier rules.
#[derive(Debug)]
pub struct StreamMap {
    streams: HashMap<StreamId, H2Stream>,
    /// Next id for locally initiated streams (odd for clients, even for servers)
    next_local_id: StreamId,
    /// Highest peer-initiated id seen so far
    highest_remote_id: StreamId,
    /// Peer's MAX_CONCURRENT_STREAMS, limiting streams we open
    max_local_streams: Option<u32>,
    /// Our MAX_CONCURRENT_STREAMS, limiting streams the peer opens
    max_remote_streams: Option<u32>,
    /// Negotiated initial window sizes for newly created streams
    send_initial_window: u32,
    recv_initial_window: u32,
}

impl StreamMap {
    /// Create a new stream map.
    ///
    /// Clients initiate odd stream ids, servers even (RFC 7540
    /// Section 5.1.1). Server-initiated ids start at 2; 0 is the
    /// connection itself.
    pub fn new(is_client: bool) -> Self {
        StreamMap {
            streams: HashMap::new(),
            next_local_id: if is_client { 1 } else { 2 },
            highest_remote_id: 0,
            max_local_streams: None,
            max_remote_streams: None,
            send_initial_window: crate::DEFAULT_INITIAL_WINDOW_SIZE,
            recv_initial_window: crate::DEFAULT_INITIAL_WINDOW_SIZE,
        }
    }

    /// Limit on streams we may have open (peer's setting)
    pub fn set_max_local_streams(&mut self, max: Option<u32>) {
        self.max_local_streams = max;
    }

    /// Limit on streams the peer may have open (our setting)
    pub fn set_max_remote_streams(&mut self, max: Option<u32>) {
        self.max_remote_streams = max;
    }

    /// Update the send-side initial window for new streams
    pub fn set_send_initial_window(&mut self, size: u32) {
        self.send_initial_window = size;
    }

    /// Update the receive-side initial window for new streams
    pub fn set_recv_initial_window(&mut self, size: u32) {
        self.recv_initial_window = size;
    }

    /// Next id a local open would use, without allocating it
    pub fn peek_next_local_id(&self) -> StreamId {
        self.next_local_id
    }

    /// Highest peer-initiated stream id processed so far (for GOAWAY)
    pub fn highest_remote_id(&self) -> StreamId {
        self.highest_remote_id
    }

    fn local_parity(&self) -> u32 {
        self.next_local_id % 2
    }

    fn count_active_local(&self) -> usize {
        let parity = self.local_parity();
        self.streams
            .values()
            .filter(|s| s.id() % 2 == parity && !s.state().is_closed())
            .count()
    }

    fn count_active_remote(&self) -> usize {
        let parity = 1 - self.local_parity();
        self.streams
            .values()
            .filter(|s| s.id() % 2 == parity && !s.state().is_closed())
            .count()
    }

    /// Allocate the next local stream id and create the stream.
    ///
    /// Fails with `TooManyStreams` at the peer's concurrency limit and
    /// `InvalidStreamId` when the 31-bit id space is exhausted.
    pub fn open_local(&mut self) -> Result<StreamId> {
        if let Some(max) = self.max_local_streams {
            if self.count_active_local() >= max as usize {
                return Err(Error::TooManyStreams);
            }
        }

        if self.next_local_id > MAX_STREAM_ID {
            return Err(Error::InvalidStreamId(self.next_local_id));
        }

        let stream_id = self.next_local_id;
        self.next_local_id += 2;

        let stream =
            H2Stream::with_window_sizes(stream_id, self.send_initial_window, self.recv_initial_window);
        self.streams.insert(stream_id, stream);

        Ok(stream_id)
    }

    /// Register a peer-initiated stream.
    ///
    /// Enforces parity (the peer must use its own id space), strict
    /// monotonicity, and our concurrency limit (REFUSED_STREAM).
    pub fn open_remote(&mut self, stream_id: StreamId) -> Result<&mut H2Stream> {
        let remote_parity = 1 - self.local_parity();
        if stream_id % 2 != remote_parity || stream_id == 0 {
            return Err(Error::Protocol(format!(
                "peer opened stream {} outside its id space",
                stream_id
            )));
        }

        if stream_id <= self.highest_remote_id {
            // Re-opening an old id is a connection error (Section 5.1.1)
            return Err(Error::Protocol(format!(
                "stream id {} not greater than highest seen ({})",
                stream_id, self.highest_remote_id
            )));
        }

        if let Some(max) = self.max_remote_streams {
            if self.count_active_remote() >= max as usize {
                return Err(Error::RefusedStream(stream_id));
            }
        }

        self.highest_remote_id = stream_id;
        let stream =
            H2Stream::with_window_sizes(stream_id, self.send_initial_window, self.recv_initial_window);
        self.streams.insert(stream_id, stream);
        Ok(self
            .streams
            .get_mut(&stream_id)
            .ok_or(Error::InvalidStreamId(stream_id))?)
    }

    /// Reserve a local stream id for a PUSH_PROMISE we send
    pub fn reserve_local(&mut self) -> Result<StreamId> {
        let id = self.open_local()?;
        if let Some(stream) = self.streams.get_mut(&id) {
            stream.reserve_local()?;
        }
        Ok(id)
    }

    /// Register a stream the peer reserved via PUSH_PROMISE
    pub fn reserve_remote(&mut self, promised_id: StreamId) -> Result<()> {
        let stream = self.open_remote(promised_id)?;
        stream.reserve_remote()
    }

    /// Get a stream by ID
    pub fn get(&self, stream_id: StreamId) -> Option<&H2Stream> {
        self.streams.get(&stream_id)
    }

    /// Get a mutable stream by ID
    pub fn get_mut(&mut self, stream_id: StreamId) -> Option<&mut H2Stream> {
        self.streams.get_mut(&stream_id)
    }

    /// Whether the map knows this id (including closed streams)
    pub fn contains(&self, stream_id: StreamId) -> bool {
        self.streams.contains_key(&stream_id)
    }

    /// Remove a stream
    pub fn remove(&mut self, stream_id: StreamId) -> Option<H2Stream> {
        self.streams.remove(&stream_id)
    }

    /// Number of streams not yet closed
    pub fn active_count(&self) -> usize {
        self.streams
            .values()
            .filter(|s| !s.state().is_closed())
            .count()
    }

    /// All known stream IDs
    pub fn ids(&self) -> Vec<StreamId> {
        self.streams.keys().copied().collect()
    }

    /// Apply a peer SETTINGS_INITIAL_WINDOW_SIZE change to every stream's
    /// send window (Section 6.9.2) and remember it for future streams.
    pub fn apply_send_initial_window(&mut self, new_size: u32) -> Result<()> {
        for stream in self.streams.values_mut() {
            stream.flow_mut().send_window_mut().update_initial_size(new_size)?;
        }
        self.send_initial_window = new_size;
        Ok(())
    }

    /// Drop closed streams
    pub fn cleanup_closed(&mut self) {
        self.streams.retain(|_, stream| !stream.state().is_closed());
    }
}
