//! HTTP/2 error types
//!
//! Errors are split along the RFC 7540 Section 5.4 axis: connection errors
//! tear down the whole connection with a GOAWAY, stream errors reset one
//! stream with RST_STREAM. [`Error::error_code`] maps each variant to the
//! Section 7 code that goes on the wire.

use std::fmt;

/// HTTP/2 errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error on the underlying transport
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection-level protocol violation (GOAWAY with PROTOCOL_ERROR)
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Implementation fault
    #[error("internal error: {0}")]
    Internal(String),

    /// Flow-control accounting violated (window overflow or exhausted)
    #[error("flow control error: {0}")]
    FlowControl(String),

    /// Peer never acknowledged our SETTINGS
    #[error("settings timeout")]
    SettingsTimeout,

    /// Frame arrived for a stream in the Closed state
    #[error("stream {0} closed")]
    StreamClosed(u32),

    /// Protocol violation confined to one stream (RST_STREAM with
    /// PROTOCOL_ERROR, Section 5.4.2)
    #[error("protocol error on stream {0}: {1}")]
    StreamProtocol(u32, String),

    /// Frame length violates a fixed or negotiated size bound
    #[error("frame size error: {0}")]
    FrameSize(String),

    /// Stream refused before any processing (safe to retry)
    #[error("stream {0} refused")]
    RefusedStream(u32),

    /// Peer cancelled the stream with RST_STREAM
    #[error("stream {0} cancelled")]
    Cancel(u32),

    /// HPACK coding failed; the shared table may be out of sync
    #[error("compression error: {0}")]
    Compression(String),

    /// Invalid stream identifier for the operation
    #[error("invalid stream ID: {0}")]
    InvalidStreamId(u32),

    /// Stream id space exhausted or concurrency limit reached
    #[error("too many concurrent streams")]
    TooManyStreams,

    /// A SETTINGS parameter carried a value outside its legal range
    #[error("invalid settings value: {0}")]
    InvalidSettings(String),

    /// Peer sent GOAWAY or the transport reached EOF
    #[error("connection closed")]
    ConnectionClosed,

    /// Server did not receive "PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n"
    #[error("missing connection preface")]
    MissingPreface,

    /// Malformed header field (bad octets, unknown or misplaced pseudo-header)
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// Timeout waiting for the transport
    #[error("timeout")]
    Timeout,

    /// Peer pushed a stream while SETTINGS_ENABLE_PUSH is 0
    #[error("push not allowed by peer settings")]
    PushDisabled,

    /// GOAWAY received; carries the peer's last processed stream id
    #[error("GOAWAY received, last stream {last_stream_id}, code {error_code}")]
    GoawayReceived {
        last_stream_id: u32,
        error_code: ErrorCode,
    },
}

impl Error {
    /// The RFC 7540 Section 7 code this error maps to on the wire.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Error::Protocol(_)
            | Error::StreamProtocol(..)
            | Error::InvalidStreamId(_)
            | Error::MissingPreface
            | Error::InvalidHeader(_)
            | Error::PushDisabled => ErrorCode::ProtocolError,
            Error::FlowControl(_) => ErrorCode::FlowControlError,
            Error::SettingsTimeout => ErrorCode::SettingsTimeout,
            Error::StreamClosed(_) => ErrorCode::StreamClosed,
            Error::FrameSize(_) => ErrorCode::FrameSizeError,
            Error::RefusedStream(_) | Error::TooManyStreams => ErrorCode::RefusedStream,
            Error::Cancel(_) => ErrorCode::Cancel,
            Error::Compression(_) => ErrorCode::CompressionError,
            Error::InvalidSettings(_) => ErrorCode::ProtocolError,
            Error::GoawayReceived { error_code, .. } => *error_code,
            _ => ErrorCode::InternalError,
        }
    }

    /// True for errors that only poison a single stream (Section 5.4.2).
    pub fn is_stream_error(&self) -> bool {
        matches!(
            self,
            Error::StreamClosed(_)
                | Error::StreamProtocol(..)
                | Error::RefusedStream(_)
                | Error::Cancel(_)
        )
    }
}

/// HTTP/2 error codes as defined in RFC 7540 Section 7
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    /// Graceful shutdown
    NoError = 0x0,
    /// Protocol error detected
    ProtocolError = 0x1,
    /// Implementation fault
    InternalError = 0x2,
    /// Flow-control limits exceeded
    FlowControlError = 0x3,
    /// Settings not acknowledged
    SettingsTimeout = 0x4,
    /// Frame received for closed stream
    StreamClosed = 0x5,
    /// Frame size incorrect
    FrameSizeError = 0x6,
    /// Stream not processed
    RefusedStream = 0x7,
    /// Stream cancelled
    Cancel = 0x8,
    /// Compression state not updated
    CompressionError = 0x9,
    /// TCP connection error for CONNECT method
    ConnectError = 0xa,
    /// Processing capacity exceeded
    EnhanceYourCalm = 0xb,
    /// Negotiated TLS parameters not acceptable
    InadequateSecurity = 0xc,
    /// Use HTTP/1.1 for the request
    Http11Required = 0xd,
}

impl ErrorCode {
    /// Convert error code to u32
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Create error code from u32; unknown codes are treated as
    /// INTERNAL_ERROR per RFC 7540 Section 7.
    pub fn from_u32(code: u32) -> Self {
        match code {
            0x0 => ErrorCode::NoError,
            0x1 => ErrorCode::ProtocolError,
            0x2 => ErrorCode::InternalError,
            0x3 => ErrorCode::FlowControlError,
            0x4 => ErrorCode::SettingsTimeout,
            0x5 => ErrorCode::StreamClosed,
            0x6 => ErrorCode::FrameSizeError,
            0x7 => ErrorCode::RefusedStream,
            0x8 => ErrorCode::Cancel,
            0x9 => ErrorCode::CompressionError,
            0xa => ErrorCode::ConnectError,
            0xb => ErrorCode::EnhanceYourCalm,
            0xc => ErrorCode::InadequateSecurity,
            0xd => ErrorCode::Http11Required,
            _ => ErrorCode::InternalError,
        }
    }

    /// Get error name
    pub fn name(&self) -> &'static str {
        match self {
            ErrorCode::NoError => "NO_ERROR",
            ErrorCode::ProtocolError => "PROTOCOL_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::FlowControlError => "FLOW_CONTROL_ERROR",
            ErrorCode::SettingsTimeout => "SETTINGS_TIMEOUT",
            ErrorCode::StreamClosed => "STREAM_CLOSED",
            ErrorCode::FrameSizeError => "FRAME_SIZE_ERROR",
            ErrorCode::RefusedStream => "REFUSED_STREAM",
            ErrorCode::Cancel => "CANCEL",
            ErrorCode::CompressionError => "COMPRESSION_ERROR",
            ErrorCode::ConnectError => "CONNECT_ERROR",
            ErrorCode::EnhanceYourCalm => "ENHANCE_YOUR_CALM",
            ErrorCode::InadequateSecurity => "INADEQUATE_SECURITY",
            ErrorCode::Http11Required => "HTTP_1_1_REQUIRED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:x})", self.name(), self.as_u32())
    }
}

/// Result type for HTTP/2 operations
pub type Result<T> = std::result::Result<T, Error>;
