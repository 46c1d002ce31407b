//! HTTP/2 performance benchmarks
//!
//! Measures the hot paths of the engine:
//! - Frame header encoding/decoding
//! - DATA frame construction and parsing at several payload sizes
//! - SETTINGS wire format
//! - HPACK compression/decompression with a warm dynamic table
//! - Flow control window accounting
//! - Stream map churn
//!
//! Run with: cargo bench --bench h2_performance

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use h2wire::codec::{FrameCodec, FRAME_HEADER_SIZE};
use h2wire::flow::FlowControl;
use h2wire::frame::{DataFrame, FrameFlags, FrameType, SettingsFrame};
use h2wire::hpack::HpackContext;
use h2wire::settings::{Settings, SettingsBuilder};
use h2wire::stream::StreamMap;

fn bench_frame_header(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_header");

    group.bench_function("encode", |b| {
        b.iter(|| {
            let header = FrameCodec::encode_header(
                black_box(FrameType::Data),
                black_box(FrameFlags::from_u8(0x01)),
                black_box(1),
                black_box(1024),
            );
            black_box(header);
        });
    });

    let encoded =
        FrameCodec::encode_header(FrameType::Data, FrameFlags::from_u8(0x01), 1, 1024);
    group.bench_function("decode", |b| {
        b.iter(|| {
            let header = FrameCodec::decode_header(black_box(&encoded));
            black_box(header);
        });
    });

    group.finish();
}

fn bench_data_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("data_frame");

    for size in [64usize, 1024, 16384] {
        group.throughput(Throughput::Bytes(size as u64));

        let payload = Bytes::from(vec![0xabu8; size]);
        group.bench_with_input(BenchmarkId::new("encode", size), &size, |b, _| {
            b.iter(|| {
                let frame = DataFrame::new(1, payload.clone(), false);
                black_box(FrameCodec::encode_data_frame(&frame));
            });
        });

        let wire = FrameCodec::encode_data_frame(&DataFrame::new(1, payload.clone(), false));
        group.bench_with_input(BenchmarkId::new("decode", size), &size, |b, _| {
            b.iter(|| {
                let mut header_bytes = [0u8; FRAME_HEADER_SIZE];
                header_bytes.copy_from_slice(&wire[..FRAME_HEADER_SIZE]);
                let header = FrameCodec::decode_header(&header_bytes);
                let frame =
                    FrameCodec::decode(&header, wire.slice(FRAME_HEADER_SIZE..)).unwrap();
                black_box(frame);
            });
        });
    }

    group.finish();
}

fn bench_settings(c: &mut Criterion) {
    let mut group = c.benchmark_group("settings");

    let settings = SettingsBuilder::new()
        .header_table_size(8192)
        .enable_push(false)
        .max_concurrent_streams(100)
        .initial_window_size(1 << 20)
        .max_frame_size(16384)
        .build()
        .unwrap();

    group.bench_function("encode_frame", |b| {
        b.iter(|| {
            let frame = SettingsFrame::new(settings.clone());
            black_box(FrameCodec::encode_settings_frame(&frame));
        });
    });

    let payload = settings.encode_payload();
    group.bench_function("parse_payload", |b| {
        b.iter(|| {
            black_box(Settings::parse_payload(black_box(&payload)).unwrap());
        });
    });

    group.finish();
}

fn bench_hpack(c: &mut Criterion) {
    let mut group = c.benchmark_group("hpack");

    let headers: &[(&str, &str)] = &[
        (":method", "GET"),
        (":scheme", "https"),
        (":authority", "www.example.com"),
        (":path", "/resource/with/a/fairly/long/path"),
        ("accept", "text/html,application/xhtml+xml"),
        ("accept-encoding", "gzip, deflate, br"),
        ("user-agent", "bench/1.0"),
        ("cookie", "session=0123456789abcdef0123456789abcdef"),
    ];

    group.bench_function("encode_warm_table", |b| {
        let mut ctx = HpackContext::new();
        // Warm the dynamic table so the steady state is measured
        ctx.encode(headers).unwrap();
        b.iter(|| {
            black_box(ctx.encode(black_box(headers)).unwrap());
        });
    });

    group.bench_function("decode_warm_table", |b| {
        let mut encoder = HpackContext::new();
        let mut decoder = HpackContext::new();
        let warmup = encoder.encode(headers).unwrap();
        decoder.decode(&warmup).unwrap();
        let block = encoder.encode(headers).unwrap();
        b.iter(|| {
            black_box(decoder.decode(black_box(&block)).unwrap());
        });
    });

    group.finish();
}

fn bench_flow_control(c: &mut Criterion) {
    let mut group = c.benchmark_group("flow_control");

    group.bench_function("consume_and_refill", |b| {
        let mut flow = FlowControl::new();
        b.iter(|| {
            let granted = flow.consume_send(black_box(16384));
            flow.increase_send(granted as u32).unwrap();
            black_box(granted);
        });
    });

    group.bench_function("charge_and_replenish", |b| {
        let mut flow = FlowControl::new();
        b.iter(|| {
            flow.charge_received(black_box(40_000)).unwrap();
            let increment = flow.pending_window_update().unwrap();
            flow.apply_window_update_sent(increment).unwrap();
        });
    });

    group.finish();
}

fn bench_stream_map(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_map");

    group.bench_function("open_close_cleanup", |b| {
        b.iter(|| {
            let mut map = StreamMap::new(true);
            for _ in 0..10 {
                let id = map.open_local().unwrap();
                map.get_mut(id).unwrap().close();
            }
            map.cleanup_closed();
            black_box(map.active_count());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_frame_header,
    bench_data_frames,
    bench_settings,
    bench_hpack,
    bench_flow_control,
    bench_stream_map
);
criterion_main!(benches);
