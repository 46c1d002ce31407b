//! HTTP/2 frame encoding and decoding
//!
//! Low-level frame construction and parsing. Encoders produce complete
//! wire frames (header plus payload) as [`Bytes`]; the decode path turns
//! a raw header and payload into a typed [`Frame`], enforcing the fixed
//! payload sizes and padding rules of RFC 7540 Section 6.

use crate::error::{Error, ErrorCode, Result};
use crate::frame::*;
use crate::session::{Session, SessionOps};
use crate::settings::Settings;
use bytes::{BufMut, Bytes, BytesMut};

/// HTTP/2 frame header size (9 bytes)
pub const FRAME_HEADER_SIZE: usize = 9;

/// Largest payload the 24-bit length field can express (16MB - 1)
pub const MAX_FRAME_PAYLOAD: usize = 0x00FF_FFFF;

/// Frame codec for encoding/decoding HTTP/2 frames
pub struct FrameCodec;

impl FrameCodec {
    /// Encode a frame header into a buffer
    pub fn encode_header(
        frame_type: FrameType,
        flags: FrameFlags,
        stream_id: u32,
        length: usize,
    ) -> [u8; FRAME_HEADER_SIZE] {
        let mut header = [0u8; FRAME_HEADER_SIZE];

        // Length (24 bits, big-endian)
        header[0] = ((length >> 16) & 0xFF) as u8;
        header[1] = ((length >> 8) & 0xFF) as u8;
        header[2] = (length & 0xFF) as u8;

        // Type (8 bits)
        header[3] = frame_type.as_u8();

        // Flags (8 bits)
        header[4] = flags.as_u8();

        // Stream ID (31 bits, big-endian, reserved bit is 0)
        let stream_id = stream_id & 0x7FFF_FFFF;
        header[5] = ((stream_id >> 24) & 0xFF) as u8;
        header[6] = ((stream_id >> 16) & 0xFF) as u8;
        header[7] = ((stream_id >> 8) & 0xFF) as u8;
        header[8] = (stream_id & 0xFF) as u8;

        header
    }

    /// Decode a frame header from bytes
    pub fn decode_header(bytes: &[u8; FRAME_HEADER_SIZE]) -> FrameHeader {
        let length =
            ((bytes[0] as usize) << 16) | ((bytes[1] as usize) << 8) | (bytes[2] as usize);

        let raw_type = bytes[3];
        let flags = FrameFlags::from_u8(bytes[4]);

        // Stream ID (31 bits, ignore reserved bit)
        let stream_id = ((bytes[5] as u32 & 0x7F) << 24)
            | ((bytes[6] as u32) << 16)
            | ((bytes[7] as u32) << 8)
            | (bytes[8] as u32);

        FrameHeader {
            raw_type,
            flags,
            stream_id,
            length,
        }
    }

    /// Encode a DATA frame
    pub fn encode_data_frame(frame: &DataFrame) -> Bytes {
        let mut buf = BytesMut::new();

        let mut payload_len = frame.data.len();
        let mut flags = FrameFlags::empty();

        if frame.end_stream {
            flags.set(FrameFlags::END_STREAM);
        }

        let padding_len = if let Some(pad_len) = frame.padding {
            flags.set(FrameFlags::PADDED);
            payload_len += 1 + pad_len as usize;
            pad_len
        } else {
            0
        };

        let header = Self::encode_header(FrameType::Data, flags, frame.stream_id, payload_len);
        buf.put_slice(&header);

        if frame.padding.is_some() {
            buf.put_u8(padding_len);
        }

        buf.put_slice(&frame.data);

        if padding_len > 0 {
            buf.put_bytes(0, padding_len as usize);
        }

        buf.freeze()
    }

    /// Encode a HEADERS frame
    pub fn encode_headers_frame(frame: &HeadersFrame) -> Bytes {
        let mut buf = BytesMut::new();

        let mut payload_len = frame.header_block.len();
        let mut flags = FrameFlags::empty();

        if frame.end_stream {
            flags.set(FrameFlags::END_STREAM);
        }
        if frame.end_headers {
            flags.set(FrameFlags::END_HEADERS);
        }

        if frame.priority.is_some() {
            flags.set(FrameFlags::PRIORITY);
            payload_len += 5;
        }

        let padding_len = if let Some(pad_len) = frame.padding {
            flags.set(FrameFlags::PADDED);
            payload_len += 1 + pad_len as usize;
            pad_len
        } else {
            0
        };

        let header = Self::encode_header(FrameType::Headers, flags, frame.stream_id, payload_len);
        buf.put_slice(&header);

        if frame.padding.is_some() {
            buf.put_u8(padding_len);
        }

        if let Some(priority) = &frame.priority {
            let mut dep = priority.stream_dependency;
            if priority.exclusive {
                dep |= 0x8000_0000;
            }
            buf.put_u32(dep);
            buf.put_u8(priority.weight);
        }

        buf.put_slice(&frame.header_block);

        if padding_len > 0 {
            buf.put_bytes(0, padding_len as usize);
        }

        buf.freeze()
    }

    /// Encode a PRIORITY frame
    pub fn encode_priority_frame(frame: &PriorityFrame) -> Bytes {
        let mut buf = BytesMut::new();

        // Payload is always 5 bytes
        let header =
            Self::encode_header(FrameType::Priority, FrameFlags::empty(), frame.stream_id, 5);
        buf.put_slice(&header);

        let mut dep = frame.priority.stream_dependency;
        if frame.priority.exclusive {
            dep |= 0x8000_0000;
        }
        buf.put_u32(dep);
        buf.put_u8(frame.priority.weight);

        buf.freeze()
    }

    /// Encode a RST_STREAM frame
    pub fn encode_rst_stream_frame(frame: &RstStreamFrame) -> Bytes {
        let mut buf = BytesMut::new();

        // Payload is always 4 bytes
        let header =
            Self::encode_header(FrameType::RstStream, FrameFlags::empty(), frame.stream_id, 4);
        buf.put_slice(&header);
        buf.put_u32(frame.error_code.as_u32());

        buf.freeze()
    }

    /// Encode a SETTINGS frame
    pub fn encode_settings_frame(frame: &SettingsFrame) -> Bytes {
        let mut buf = BytesMut::new();

        let flags = if frame.ack {
            FrameFlags::from_u8(FrameFlags::ACK)
        } else {
            FrameFlags::empty()
        };

        let payload = if frame.ack {
            BytesMut::new()
        } else {
            frame.settings.encode_payload()
        };

        // Stream ID must be 0 for SETTINGS
        let header = Self::encode_header(FrameType::Settings, flags, 0, payload.len());
        buf.put_slice(&header);
        buf.put_slice(&payload);

        buf.freeze()
    }

    /// Encode a PUSH_PROMISE frame
    pub fn encode_push_promise_frame(frame: &PushPromiseFrame) -> Bytes {
        let mut buf = BytesMut::new();

        let mut payload_len = 4 + frame.header_block.len();
        let mut flags = FrameFlags::empty();

        if frame.end_headers {
            flags.set(FrameFlags::END_HEADERS);
        }

        let padding_len = if let Some(pad_len) = frame.padding {
            flags.set(FrameFlags::PADDED);
            payload_len += 1 + pad_len as usize;
            pad_len
        } else {
            0
        };

        let header =
            Self::encode_header(FrameType::PushPromise, flags, frame.stream_id, payload_len);
        buf.put_slice(&header);

        if frame.padding.is_some() {
            buf.put_u8(padding_len);
        }

        buf.put_u32(frame.promised_stream_id & 0x7FFF_FFFF);
        buf.put_slice(&frame.header_block);

        if padding_len > 0 {
            buf.put_bytes(0, padding_len as usize);
        }

        buf.freeze()
    }

    /// Encode a PING frame
    pub fn encode_ping_frame(frame: &PingFrame) -> Bytes {
        let mut buf = BytesMut::new();

        let flags = if frame.ack {
            FrameFlags::from_u8(FrameFlags::ACK)
        } else {
            FrameFlags::empty()
        };

        // Stream ID must be 0 for PING, payload is always 8 bytes
        let header = Self::encode_header(FrameType::Ping, flags, 0, 8);
        buf.put_slice(&header);
        buf.put_slice(&frame.data);

        buf.freeze()
    }

    /// Encode a GOAWAY frame
    pub fn encode_goaway_frame(frame: &GoawayFrame) -> Bytes {
        let mut buf = BytesMut::new();

        let payload_len = 8 + frame.debug_data.len();

        // Stream ID must be 0 for GOAWAY
        let header = Self::encode_header(FrameType::Goaway, FrameFlags::empty(), 0, payload_len);
        buf.put_slice(&header);

        buf.put_u32(frame.last_stream_id & 0x7FFF_FFFF);
        buf.put_u32(frame.error_code.as_u32());
        buf.put_slice(&frame.debug_data);

        buf.freeze()
    }

    /// Encode a WINDOW_UPDATE frame
    pub fn encode_window_update_frame(frame: &WindowUpdateFrame) -> Bytes {
        let mut buf = BytesMut::new();

        // Payload is always 4 bytes
        let header = Self::encode_header(
            FrameType::WindowUpdate,
            FrameFlags::empty(),
            frame.stream_id,
            4,
        );
        buf.put_slice(&header);
        buf.put_u32(frame.increment & 0x7FFF_FFFF);

        buf.freeze()
    }

    /// Encode a CONTINUATION frame
    pub fn encode_continuation_frame(frame: &ContinuationFrame) -> Bytes {
        let mut buf = BytesMut::new();

        let flags = if frame.end_headers {
            FrameFlags::from_u8(FrameFlags::END_HEADERS)
        } else {
            FrameFlags::empty()
        };

        let header = Self::encode_header(
            FrameType::Continuation,
            flags,
            frame.stream_id,
            frame.header_block.len(),
        );
        buf.put_slice(&header);
        buf.put_slice(&frame.header_block);

        buf.freeze()
    }

    /// Decode a frame from its header and payload
    ///
    /// Enforces the per-type payload size rules (PING is 8 bytes,
    /// RST_STREAM and WINDOW_UPDATE are 4, PRIORITY is 5, SETTINGS is a
    /// multiple of 6, GOAWAY at least 8) and the stream-id zero/non-zero
    /// requirement of each type. Unknown frame types decode to
    /// [`Frame::Unknown`].
    pub fn decode(header: &FrameHeader, payload: Bytes) -> Result<Frame> {
        debug_assert_eq!(header.length, payload.len());

        let frame_type = match header.frame_type() {
            Some(t) => t,
            None => {
                return Ok(Frame::Unknown {
                    frame_type: header.raw_type,
                    stream_id: header.stream_id,
                })
            }
        };

        if frame_type.is_connection_level() && header.stream_id != 0 {
            return Err(Error::Protocol(format!(
                "{} frame with non-zero stream id {}",
                frame_type.name(),
                header.stream_id
            )));
        }

        match frame_type {
            FrameType::Data => Self::decode_data(header, payload),
            FrameType::Headers => Self::decode_headers(header, payload),
            FrameType::Priority => Self::decode_priority(header, payload),
            FrameType::RstStream => Self::decode_rst_stream(header, payload),
            FrameType::Settings => Self::decode_settings(header, payload),
            FrameType::PushPromise => Self::decode_push_promise(header, payload),
            FrameType::Ping => Self::decode_ping(header, payload),
            FrameType::Goaway => Self::decode_goaway(header, payload),
            FrameType::WindowUpdate => Self::decode_window_update(header, payload),
            FrameType::Continuation => Self::decode_continuation(header, payload),
        }
    }

    /// Strip the pad length octet and trailing padding from a payload.
    ///
    /// A pad length that covers the whole remaining payload is a
    /// connection error of type PROTOCOL_ERROR (Section 6.1).
    fn strip_padding(flags: FrameFlags, mut payload: Bytes) -> Result<(Bytes, Option<u8>)> {
        if !flags.is_padded() {
            return Ok((payload, None));
        }

        if payload.is_empty() {
            return Err(Error::FrameSize(
                "padded frame missing pad length octet".into(),
            ));
        }

        let pad_len = payload[0];
        let _ = payload.split_to(1);

        // The pad length octet counts toward the payload, so padding that
        // covers everything after it is one byte too much already.
        if pad_len as usize > payload.len() {
            return Err(Error::Protocol(format!(
                "pad length {} exceeds payload",
                pad_len
            )));
        }

        let data = payload.split_to(payload.len() - pad_len as usize);
        Ok((data, Some(pad_len)))
    }

    fn decode_data(header: &FrameHeader, payload: Bytes) -> Result<Frame> {
        if header.stream_id == 0 {
            return Err(Error::Protocol("DATA frame on stream 0".into()));
        }

        let (data, padding) = Self::strip_padding(header.flags, payload)?;

        Ok(Frame::Data(DataFrame {
            stream_id: header.stream_id,
            data,
            end_stream: header.flags.is_end_stream(),
            padding,
        }))
    }

    fn decode_headers(header: &FrameHeader, payload: Bytes) -> Result<Frame> {
        if header.stream_id == 0 {
            return Err(Error::Protocol("HEADERS frame on stream 0".into()));
        }

        let (mut block, padding) = Self::strip_padding(header.flags, payload)?;

        let priority = if header.flags.is_priority() {
            if block.len() < 5 {
                return Err(Error::FrameSize(
                    "HEADERS priority section truncated".into(),
                ));
            }
            let raw = u32::from_be_bytes([block[0], block[1], block[2], block[3]]);
            let weight = block[4];
            let _ = block.split_to(5);
            Some(PrioritySpec {
                stream_dependency: raw & 0x7FFF_FFFF,
                exclusive: raw & 0x8000_0000 != 0,
                weight,
            })
        } else {
            None
        };

        Ok(Frame::Headers(HeadersFrame {
            stream_id: header.stream_id,
            header_block: block,
            end_stream: header.flags.is_end_stream(),
            end_headers: header.flags.is_end_headers(),
            priority,
            padding,
        }))
    }

    fn decode_priority(header: &FrameHeader, payload: Bytes) -> Result<Frame> {
        if header.stream_id == 0 {
            return Err(Error::Protocol("PRIORITY frame on stream 0".into()));
        }
        if payload.len() != 5 {
            return Err(Error::FrameSize(format!(
                "PRIORITY payload must be 5 bytes, got {}",
                payload.len()
            )));
        }

        let raw = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);

        Ok(Frame::Priority(PriorityFrame {
            stream_id: header.stream_id,
            priority: PrioritySpec {
                stream_dependency: raw & 0x7FFF_FFFF,
                exclusive: raw & 0x8000_0000 != 0,
                weight: payload[4],
            },
        }))
    }

    fn decode_rst_stream(header: &FrameHeader, payload: Bytes) -> Result<Frame> {
        if header.stream_id == 0 {
            return Err(Error::Protocol("RST_STREAM frame on stream 0".into()));
        }
        if payload.len() != 4 {
            return Err(Error::FrameSize(format!(
                "RST_STREAM payload must be 4 bytes, got {}",
                payload.len()
            )));
        }

        let code = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);

        Ok(Frame::RstStream(RstStreamFrame {
            stream_id: header.stream_id,
            error_code: ErrorCode::from_u32(code),
        }))
    }

    fn decode_settings(header: &FrameHeader, payload: Bytes) -> Result<Frame> {
        if header.flags.is_ack() {
            if !payload.is_empty() {
                return Err(Error::FrameSize(
                    "SETTINGS ACK must have an empty payload".into(),
                ));
            }
            return Ok(Frame::Settings(SettingsFrame::ack()));
        }

        let settings = Settings::parse_payload(&payload)?;
        Ok(Frame::Settings(SettingsFrame::new(settings)))
    }

    fn decode_push_promise(header: &FrameHeader, payload: Bytes) -> Result<Frame> {
        if header.stream_id == 0 {
            return Err(Error::Protocol("PUSH_PROMISE frame on stream 0".into()));
        }

        let (mut block, padding) = Self::strip_padding(header.flags, payload)?;

        if block.len() < 4 {
            return Err(Error::FrameSize(
                "PUSH_PROMISE missing promised stream id".into(),
            ));
        }
        let promised = u32::from_be_bytes([block[0], block[1], block[2], block[3]]) & 0x7FFF_FFFF;
        let _ = block.split_to(4);

        Ok(Frame::PushPromise(PushPromiseFrame {
            stream_id: header.stream_id,
            promised_stream_id: promised,
            header_block: block,
            end_headers: header.flags.is_end_headers(),
            padding,
        }))
    }

    fn decode_ping(header: &FrameHeader, payload: Bytes) -> Result<Frame> {
        if payload.len() != 8 {
            return Err(Error::FrameSize(format!(
                "PING payload must be 8 bytes, got {}",
                payload.len()
            )));
        }

        let mut data = [0u8; 8];
        data.copy_from_slice(&payload);

        Ok(Frame::Ping(PingFrame {
            ack: header.flags.is_ack(),
            data,
        }))
    }

    fn decode_goaway(_header: &FrameHeader, mut payload: Bytes) -> Result<Frame> {
        if payload.len() < 8 {
            return Err(Error::FrameSize(format!(
                "GOAWAY payload must be at least 8 bytes, got {}",
                payload.len()
            )));
        }

        let last = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]])
            & 0x7FFF_FFFF;
        let code = u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]);
        let debug_data = payload.split_off(8);

        Ok(Frame::Goaway(GoawayFrame {
            last_stream_id: last,
            error_code: ErrorCode::from_u32(code),
            debug_data,
        }))
    }

    fn decode_window_update(header: &FrameHeader, payload: Bytes) -> Result<Frame> {
        if payload.len() != 4 {
            return Err(Error::FrameSize(format!(
                "WINDOW_UPDATE payload must be 4 bytes, got {}",
                payload.len()
            )));
        }

        let increment =
            u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) & 0x7FFF_FFFF;

        Ok(Frame::WindowUpdate(WindowUpdateFrame {
            stream_id: header.stream_id,
            increment,
        }))
    }

    fn decode_continuation(header: &FrameHeader, payload: Bytes) -> Result<Frame> {
        if header.stream_id == 0 {
            return Err(Error::Protocol("CONTINUATION frame on stream 0".into()));
        }

        Ok(Frame::Continuation(ContinuationFrame {
            stream_id: header.stream_id,
            header_block: payload,
            end_headers: header.flags.is_end_headers(),
        }))
    }

    /// Write a complete encoded frame to a session
    pub fn write_frame<S: SessionOps>(session: &mut Session<S>, frame_data: &[u8]) -> Result<()> {
        session.write_all(frame_data)
    }

    /// Read one raw frame (header and payload) from a session
    ///
    /// `max_frame_size` is the local SETTINGS_MAX_FRAME_SIZE; a longer
    /// payload is a FRAME_SIZE_ERROR before any bytes of it are read.
    pub fn read_frame<S: SessionOps>(
        session: &mut Session<S>,
        max_frame_size: usize,
    ) -> Result<(FrameHeader, Bytes)> {
        let mut header_bytes = [0u8; FRAME_HEADER_SIZE];
        session.read_exact(&mut header_bytes)?;

        let header = Self::decode_header(&header_bytes);

        if header.length > max_frame_size {
            return Err(Error::FrameSize(format!(
                "frame payload {} exceeds maximum {}",
                header.length, max_frame_size
            )));
        }

        let mut payload = vec![0u8; header.length];
        if header.length > 0 {
            session.read_exact(&mut payload)?;
        }

        Ok((header, Bytes::from(payload)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingsBuilder;

    fn decode_wire(wire: &Bytes) -> Frame {
        let mut header_bytes = [0u8; FRAME_HEADER_SIZE];
        header_bytes.copy_from_slice(&wire[..FRAME_HEADER_SIZE]);
        let header = FrameCodec::decode_header(&header_bytes);
        let payload = wire.slice(FRAME_HEADER_SIZE..);
        FrameCodec::decode(&header, payload).unwrap()
    }

    #[test]
    fn test_encode_decode_header() {
        let flags = FrameFlags::from_u8(FrameFlags::END_STREAM | FrameFlags::END_HEADERS);
        let header = FrameCodec::encode_header(FrameType::Headers, flags, 42, 1234);
        let decoded = FrameCodec::decode_header(&header);

        assert_eq!(decoded.frame_type(), Some(FrameType::Headers));
        assert_eq!(decoded.flags.as_u8(), flags.as_u8());
        assert_eq!(decoded.stream_id, 42);
        assert_eq!(decoded.length, 1234);
    }

    #[test]
    fn test_header_reserved_bit_masked() {
        let header = FrameCodec::encode_header(
            FrameType::Data,
            FrameFlags::empty(),
            0xFFFF_FFFF,
            0,
        );
        let decoded = FrameCodec::decode_header(&header);
        assert_eq!(decoded.stream_id, 0x7FFF_FFFF);
    }

    #[test]
    fn test_encode_data_frame() {
        let frame = DataFrame::new(1, Bytes::from("Hello"), true);
        let encoded = FrameCodec::encode_data_frame(&frame);

        assert_eq!(encoded[0..3], [0, 0, 5]);
        assert_eq!(encoded[3], FrameType::Data.as_u8());
        assert_eq!(encoded[4], FrameFlags::END_STREAM);
        assert_eq!(&encoded[5..9], &[0, 0, 0, 1]);
        assert_eq!(&encoded[9..], b"Hello");
    }

    #[test]
    fn test_data_frame_padding_roundtrip() {
        let frame = DataFrame::new(1, Bytes::from("Hi"), false).with_padding(10);
        let encoded = FrameCodec::encode_data_frame(&frame);

        // 1 (pad length) + 2 (data) + 10 (padding) = 13
        assert_eq!(encoded[0..3], [0, 0, 13]);
        assert_eq!(encoded[4] & FrameFlags::PADDED, FrameFlags::PADDED);
        assert_eq!(encoded[9], 10);

        match decode_wire(&encoded) {
            Frame::Data(f) => {
                assert_eq!(&f.data[..], b"Hi");
                assert_eq!(f.padding, Some(10));
                assert!(!f.end_stream);
            }
            other => panic!("expected DATA, got {:?}", other),
        }
    }

    #[test]
    fn test_data_frame_pad_length_too_large() {
        // Payload: pad length 5 but only 3 bytes follow
        let mut wire = BytesMut::new();
        wire.put_slice(&FrameCodec::encode_header(
            FrameType::Data,
            FrameFlags::from_u8(FrameFlags::PADDED),
            1,
            4,
        ));
        wire.put_u8(5);
        wire.put_slice(b"abc");
        let wire = wire.freeze();

        let mut header_bytes = [0u8; FRAME_HEADER_SIZE];
        header_bytes.copy_from_slice(&wire[..FRAME_HEADER_SIZE]);
        let header = FrameCodec::decode_header(&header_bytes);
        let result = FrameCodec::decode(&header, wire.slice(FRAME_HEADER_SIZE..));
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[test]
    fn test_headers_frame_priority_roundtrip() {
        let frame = HeadersFrame::new(3, Bytes::from_static(b"\x82"), false, true)
            .with_priority(PrioritySpec::new(1, true, 200));
        let encoded = FrameCodec::encode_headers_frame(&frame);

        match decode_wire(&encoded) {
            Frame::Headers(f) => {
                assert_eq!(f.stream_id, 3);
                assert_eq!(&f.header_block[..], b"\x82");
                assert!(f.end_headers);
                let p = f.priority.unwrap();
                assert_eq!(p.stream_dependency, 1);
                assert!(p.exclusive);
                assert_eq!(p.weight, 200);
            }
            other => panic!("expected HEADERS, got {:?}", other),
        }
    }

    #[test]
    fn test_encode_settings_frame() {
        let settings = SettingsBuilder::new()
            .header_table_size(8192)
            .enable_push(false)
            .initial_window_size(65535)
            .build()
            .unwrap();

        let encoded = FrameCodec::encode_settings_frame(&SettingsFrame::new(settings));

        assert_eq!(encoded[3], FrameType::Settings.as_u8());
        assert_eq!(&encoded[5..9], &[0, 0, 0, 0]);
        // 3 settings * 6 bytes
        assert_eq!(encoded[0..3], [0, 0, 18]);
    }

    #[test]
    fn test_settings_ack_with_payload_rejected() {
        let header = FrameHeader {
            raw_type: FrameType::Settings.as_u8(),
            flags: FrameFlags::from_u8(FrameFlags::ACK),
            stream_id: 0,
            length: 6,
        };
        let result = FrameCodec::decode(&header, Bytes::from_static(&[0; 6]));
        assert!(matches!(result, Err(Error::FrameSize(_))));
    }

    #[test]
    fn test_settings_nonzero_stream_rejected() {
        let header = FrameHeader {
            raw_type: FrameType::Settings.as_u8(),
            flags: FrameFlags::empty(),
            stream_id: 1,
            length: 0,
        };
        let result = FrameCodec::decode(&header, Bytes::new());
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[test]
    fn test_ping_frame_roundtrip() {
        let data = [1, 2, 3, 4, 5, 6, 7, 8];
        let encoded = FrameCodec::encode_ping_frame(&PingFrame::new(data));

        assert_eq!(encoded[0..3], [0, 0, 8]);

        match decode_wire(&encoded) {
            Frame::Ping(f) => {
                assert!(!f.ack);
                assert_eq!(f.data, data);
            }
            other => panic!("expected PING, got {:?}", other),
        }
    }

    #[test]
    fn test_ping_wrong_size_rejected() {
        let header = FrameHeader {
            raw_type: FrameType::Ping.as_u8(),
            flags: FrameFlags::empty(),
            stream_id: 0,
            length: 7,
        };
        let result = FrameCodec::decode(&header, Bytes::from_static(&[0; 7]));
        assert!(matches!(result, Err(Error::FrameSize(_))));
    }

    #[test]
    fn test_goaway_roundtrip() {
        let frame = GoawayFrame::new(5, ErrorCode::EnhanceYourCalm, Bytes::from_static(b"slow"));
        let encoded = FrameCodec::encode_goaway_frame(&frame);

        match decode_wire(&encoded) {
            Frame::Goaway(f) => {
                assert_eq!(f.last_stream_id, 5);
                assert_eq!(f.error_code, ErrorCode::EnhanceYourCalm);
                assert_eq!(&f.debug_data[..], b"slow");
            }
            other => panic!("expected GOAWAY, got {:?}", other),
        }
    }

    #[test]
    fn test_window_update_roundtrip() {
        let encoded =
            FrameCodec::encode_window_update_frame(&WindowUpdateFrame::new(42, 1000));

        assert_eq!(encoded[0..3], [0, 0, 4]);

        match decode_wire(&encoded) {
            Frame::WindowUpdate(f) => {
                assert_eq!(f.stream_id, 42);
                assert_eq!(f.increment, 1000);
            }
            other => panic!("expected WINDOW_UPDATE, got {:?}", other),
        }
    }

    #[test]
    fn test_rst_stream_wrong_size_rejected() {
        let header = FrameHeader {
            raw_type: FrameType::RstStream.as_u8(),
            flags: FrameFlags::empty(),
            stream_id: 1,
            length: 3,
        };
        let result = FrameCodec::decode(&header, Bytes::from_static(&[0; 3]));
        assert!(matches!(result, Err(Error::FrameSize(_))));
    }

    #[test]
    fn test_push_promise_roundtrip() {
        let frame = PushPromiseFrame::new(1, 2, Bytes::from_static(b"\x82\x84"), true);
        let encoded = FrameCodec::encode_push_promise_frame(&frame);

        match decode_wire(&encoded) {
            Frame::PushPromise(f) => {
                assert_eq!(f.stream_id, 1);
                assert_eq!(f.promised_stream_id, 2);
                assert_eq!(&f.header_block[..], b"\x82\x84");
                assert!(f.end_headers);
            }
            other => panic!("expected PUSH_PROMISE, got {:?}", other),
        }
    }

    #[test]
    fn test_continuation_roundtrip() {
        let frame = ContinuationFrame::new(5, Bytes::from_static(b"\x86"), true);
        let encoded = FrameCodec::encode_continuation_frame(&frame);

        match decode_wire(&encoded) {
            Frame::Continuation(f) => {
                assert_eq!(f.stream_id, 5);
                assert_eq!(&f.header_block[..], b"\x86");
                assert!(f.end_headers);
            }
            other => panic!("expected CONTINUATION, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_frame_type() {
        let header = FrameHeader {
            raw_type: 0xb0,
            flags: FrameFlags::empty(),
            stream_id: 3,
            length: 2,
        };
        match FrameCodec::decode(&header, Bytes::from_static(&[1, 2])).unwrap() {
            Frame::Unknown {
                frame_type,
                stream_id,
            } => {
                assert_eq!(frame_type, 0xb0);
                assert_eq!(stream_id, 3);
            }
            other => panic!("expected Unknown, got {:?}", other),
        }
    }
}
