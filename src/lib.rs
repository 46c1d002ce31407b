//! h2wire - a synchronous HTTP/2 connection engine
//!
//! This crate implements the HTTP/2 wire protocol (RFC 7540) and speaks
//! HPACK (RFC 7541) through the `hpack` crate. It is deliberately
//! transport-generic and runtime-free: all I/O goes through the
//! [`session::SessionOps`] trait, so the same engine drives plain TCP,
//! a TLS session, or an in-memory pipe in tests.
//!
//! # Architecture
//!
//! - `codec`: frame header and typed payload encoding/decoding
//! - `frame`: typed structs for all ten RFC 7540 frame types
//! - `settings`: SETTINGS parameters, validation and wire format
//! - `flow`: connection- and stream-level flow control windows
//! - `stream`: stream state machine and the per-connection stream map
//! - `hpack`: header compression adapter with a shared dynamic table
//! - `connection`: preface, settings exchange and frame dispatch
//! - `client` / `server`: request/response convenience on top of
//!   [`connection::H2Connection`]
//!
//! # Examples
//!
//! ```no_run
//! use h2wire::H2ClientBuilder;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = H2ClientBuilder::new().connect("127.0.0.1:8080")?;
//! let response = client.get("127.0.0.1:8080", "/")?;
//! assert_eq!(response.status(), 200);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod codec;
pub mod connection;
pub mod error;
pub mod flow;
pub mod frame;
pub mod hpack;
pub mod net;
pub mod server;
pub mod session;
pub mod settings;
pub mod stream;

pub use client::{H2Client, H2ClientBuilder, H2Response};
pub use connection::{H2Connection, Role};
pub use error::{Error, ErrorCode, Result};
pub use frame::{Frame, FrameFlags, FrameType};
pub use server::{H2Request, H2Server, H2ServerBuilder};
pub use settings::{Settings, SettingsBuilder};
pub use stream::{H2Stream, StreamId, StreamState};

/// HTTP/2 connection preface that must be sent by clients
///
/// From RFC 7540 Section 3.5:
/// "PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n"
pub const CONNECTION_PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// Default initial window size (65535 bytes)
pub const DEFAULT_INITIAL_WINDOW_SIZE: u32 = 65535;

/// Default maximum frame size (16384 bytes)
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16384;

/// Default header table size (4096 bytes)
pub const DEFAULT_HEADER_TABLE_SIZE: u32 = 4096;

/// Maximum stream ID value (2^31 - 1)
pub const MAX_STREAM_ID: u32 = 0x7FFF_FFFF;

/// Stream ID 0 (connection-level)
pub const CONNECTION_STREAM_ID: u32 = 0;
