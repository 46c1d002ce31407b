//! HTTP/2 protocol integration tests
//!
//! These tests exercise the protocol machinery across module borders:
//! - Frame encoding/decoding through the codec
//! - Settings wire format
//! - Flow control accounting
//! - Stream id and state rules
//! - HPACK round trips with a live dynamic table

use bytes::Bytes;
use h2wire::codec::{FrameCodec, FRAME_HEADER_SIZE};
use h2wire::error::{Error, ErrorCode};
use h2wire::flow::{FlowControl, FlowWindow, MAX_WINDOW_SIZE};
use h2wire::frame::*;
use h2wire::hpack::HpackContext;
use h2wire::settings::{Settings, SettingsBuilder};
use h2wire::stream::{StreamMap, StreamState};

fn decode_wire(wire: &Bytes) -> Frame {
    let mut header_bytes = [0u8; FRAME_HEADER_SIZE];
    header_bytes.copy_from_slice(&wire[..FRAME_HEADER_SIZE]);
    let header = FrameCodec::decode_header(&header_bytes);
    FrameCodec::decode(&header, wire.slice(FRAME_HEADER_SIZE..)).unwrap()
}

#[test]
fn test_settings_frame_wire_format() {
    let settings = SettingsBuilder::new()
        .header_table_size(8192)
        .enable_push(false)
        .max_concurrent_streams(100)
        .initial_window_size(65535)
        .max_frame_size(16384)
        .max_header_list_size(8192)
        .build()
        .unwrap();

    let encoded = FrameCodec::encode_settings_frame(&SettingsFrame::new(settings));

    assert_eq!(encoded[3], FrameType::Settings.as_u8());
    assert_eq!(&encoded[5..9], &[0, 0, 0, 0]);
    assert_eq!(encoded[4], 0);

    // 6 settings * 6 bytes each
    let length = u32::from_be_bytes([0, encoded[0], encoded[1], encoded[2]]);
    assert_eq!(length, 36);

    // And it parses back
    let parsed = Settings::parse_payload(&encoded[FRAME_HEADER_SIZE..]).unwrap();
    assert_eq!(parsed.header_table_size(), 8192);
    assert!(!parsed.enable_push());
    assert_eq!(parsed.max_concurrent_streams(), Some(100));
}

#[test]
fn test_settings_unknown_parameter_ignored() {
    // id 0xfff0 is not assigned; the payload must still parse
    let mut payload = Vec::new();
    payload.extend_from_slice(&0xfff0u16.to_be_bytes());
    payload.extend_from_slice(&7u32.to_be_bytes());
    payload.extend_from_slice(&0x3u16.to_be_bytes()); // MAX_CONCURRENT_STREAMS
    payload.extend_from_slice(&42u32.to_be_bytes());

    let parsed = Settings::parse_payload(&payload).unwrap();
    assert_eq!(parsed.max_concurrent_streams(), Some(42));
}

#[test]
fn test_settings_invalid_values_rejected() {
    // ENABLE_PUSH must be 0 or 1
    let mut payload = Vec::new();
    payload.extend_from_slice(&0x2u16.to_be_bytes());
    payload.extend_from_slice(&2u32.to_be_bytes());
    assert!(matches!(
        Settings::parse_payload(&payload),
        Err(Error::Protocol(_))
    ));

    // INITIAL_WINDOW_SIZE above 2^31-1 is a flow control error
    let mut payload = Vec::new();
    payload.extend_from_slice(&0x4u16.to_be_bytes());
    payload.extend_from_slice(&0x8000_0000u32.to_be_bytes());
    assert!(matches!(
        Settings::parse_payload(&payload),
        Err(Error::FlowControl(_))
    ));

    // Length not a multiple of 6
    assert!(matches!(
        Settings::parse_payload(&[0u8; 5]),
        Err(Error::FrameSize(_))
    ));
}

#[test]
fn test_header_block_fragmentation_and_reassembly() {
    // A header block split over HEADERS + 2 CONTINUATION frames must
    // reassemble byte-identically on the receiving stream
    let block: Vec<u8> = (0..300u32).map(|i| (i % 251) as u8).collect();

    let headers = FrameCodec::encode_headers_frame(&HeadersFrame::new(
        1,
        Bytes::copy_from_slice(&block[..100]),
        false,
        false,
    ));
    let cont1 = FrameCodec::encode_continuation_frame(&ContinuationFrame::new(
        1,
        Bytes::copy_from_slice(&block[100..200]),
        false,
    ));
    let cont2 = FrameCodec::encode_continuation_frame(&ContinuationFrame::new(
        1,
        Bytes::copy_from_slice(&block[200..]),
        true,
    ));

    let mut map = StreamMap::new(false);
    let stream = map.open_remote(1).unwrap();

    match decode_wire(&headers) {
        Frame::Headers(f) => stream
            .recv_headers(&f.header_block, f.end_stream, f.end_headers)
            .unwrap(),
        other => panic!("expected HEADERS, got {:?}", other),
    }
    for wire in [&cont1, &cont2] {
        match decode_wire(wire) {
            Frame::Continuation(f) => stream
                .recv_continuation(&f.header_block, f.end_headers)
                .unwrap(),
            other => panic!("expected CONTINUATION, got {:?}", other),
        }
    }

    assert!(stream.headers_complete());
    assert_eq!(stream.header_block(), &block[..]);
}

#[test]
fn test_flow_window_never_exceeds_maximum() {
    let mut window = FlowWindow::new();
    assert_eq!(window.size(), 65535);

    // Push right up to the cap
    window.increase((MAX_WINDOW_SIZE - 65535) as u32).unwrap();
    assert_eq!(window.size(), MAX_WINDOW_SIZE);

    // One more byte overflows
    let err = window.increase(1).unwrap_err();
    assert!(matches!(err, Error::FlowControl(_)));

    // A zero increment is a protocol error
    let err = window.increase(0).unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
}

#[test]
fn test_flow_window_can_go_negative_via_settings() {
    let mut window = FlowWindow::new();
    assert_eq!(window.consume(40_000), 40_000);
    assert_eq!(window.size(), 25_535);

    // Peer shrinks INITIAL_WINDOW_SIZE below what is outstanding
    window.update_initial_size(10_000).unwrap();
    assert_eq!(window.size(), 25_535 - 55_535);
    assert!(!window.has_capacity());

    // Credit brings it back up
    window.increase(60_000).unwrap();
    assert!(window.has_capacity());
}

#[test]
fn test_flow_receive_overrun_is_an_error() {
    let mut flow = FlowControl::new();
    flow.charge_received(65535).unwrap();

    let err = flow.charge_received(1).unwrap_err();
    assert!(matches!(err, Error::FlowControl(_)));
}

#[test]
fn test_flow_replenishment_threshold() {
    let mut flow = FlowControl::new();
    assert!(flow.pending_window_update().is_none());

    // Below half the initial window a replenishment is due
    flow.charge_received(40_000).unwrap();
    let increment = flow.pending_window_update().unwrap();
    assert_eq!(increment, 40_000);

    flow.apply_window_update_sent(increment).unwrap();
    assert!(flow.pending_window_update().is_none());
    assert_eq!(flow.recv_window().size(), 65535);
}

#[test]
fn test_stream_id_rules_end_to_end() {
    // Server view of a client connection
    let mut map = StreamMap::new(false);

    map.open_remote(1).unwrap();
    map.open_remote(3).unwrap();

    // Even id from a client is a protocol violation
    assert!(matches!(map.open_remote(2), Err(Error::Protocol(_))));
    // So is going backwards
    assert!(matches!(map.open_remote(1), Err(Error::Protocol(_))));
    // Skipping ids is allowed as long as they increase
    map.open_remote(9).unwrap();
    assert_eq!(map.highest_remote_id(), 9);
}

#[test]
fn test_request_response_stream_lifecycle() {
    let mut map = StreamMap::new(true);
    let id = map.open_local().unwrap();
    assert_eq!(id, 1);

    let stream = map.get_mut(id).unwrap();

    // Request: HEADERS with END_STREAM
    stream.send_headers(true).unwrap();
    assert_eq!(stream.state(), StreamState::HalfClosedLocal);

    // Response: HEADERS then DATA with END_STREAM
    stream.recv_headers(b"\x88", false, true).unwrap();
    stream.recv_data(b"response body", 13, true).unwrap();

    assert_eq!(stream.state(), StreamState::Closed);
    assert_eq!(stream.body(), b"response body");

    map.cleanup_closed();
    assert!(map.get(id).is_none());
}

#[test]
fn test_rst_stream_frame_roundtrip() {
    let encoded =
        FrameCodec::encode_rst_stream_frame(&RstStreamFrame::new(7, ErrorCode::RefusedStream));

    match decode_wire(&encoded) {
        Frame::RstStream(f) => {
            assert_eq!(f.stream_id, 7);
            assert_eq!(f.error_code, ErrorCode::RefusedStream);
        }
        other => panic!("expected RST_STREAM, got {:?}", other),
    }
}

#[test]
fn test_unknown_error_code_maps_to_internal() {
    assert_eq!(ErrorCode::from_u32(0xdead_beef), ErrorCode::InternalError);
    assert_eq!(ErrorCode::from_u32(0x0), ErrorCode::NoError);
    assert_eq!(ErrorCode::from_u32(0xd), ErrorCode::Http11Required);
}

#[test]
fn test_hpack_request_roundtrip() {
    let mut encoder_side = HpackContext::new();
    let mut decoder_side = HpackContext::new();

    let block = encoder_side
        .encode(&[
            (":method", "GET"),
            (":scheme", "http"),
            (":authority", "example.com"),
            (":path", "/index.html"),
            ("accept", "text/html"),
        ])
        .unwrap();

    let headers = decoder_side.decode(&block).unwrap();
    assert_eq!(headers.method.as_deref(), Some("GET"));
    assert_eq!(headers.scheme.as_deref(), Some("http"));
    assert_eq!(headers.authority.as_deref(), Some("example.com"));
    assert_eq!(headers.path.as_deref(), Some("/index.html"));
    assert_eq!(headers.get("accept"), Some("text/html"));
}

#[test]
fn test_hpack_dynamic_table_persists_across_blocks() {
    let mut encoder_side = HpackContext::new();
    let mut decoder_side = HpackContext::new();

    let headers: &[(&str, &str)] = &[
        (":method", "GET"),
        (":path", "/repeated"),
        ("x-request-id", "aaaaaaaaaaaaaaaaaaaaaaaa"),
    ];

    let first = encoder_side.encode(headers).unwrap();
    let second = encoder_side.encode(headers).unwrap();

    // The repeated literal is table-indexed the second time
    assert!(second.len() < first.len());

    // The decoder table stayed in sync across both blocks
    decoder_side.decode(&first).unwrap();
    let decoded = decoder_side.decode(&second).unwrap();
    assert_eq!(decoded.get("x-request-id"), Some("aaaaaaaaaaaaaaaaaaaaaaaa"));
}

#[test]
fn test_hpack_uppercase_header_rejected_on_decode() {
    // A raw literal with an uppercase name must not decode cleanly.
    // 0x40 = literal with incremental indexing, new name
    let mut block = Vec::new();
    block.push(0x40);
    block.push(4);
    block.extend_from_slice(b"NAME");
    block.push(5);
    block.extend_from_slice(b"value");

    let mut ctx = HpackContext::new();
    let result = ctx.decode(&block);
    assert!(result.is_err());
}
