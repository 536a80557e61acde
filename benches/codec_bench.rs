//! Criterion benchmark untuk wire codec
//!
//! Run dengan: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use aegis::protocol::{
    BatchDecoder, BatchEncoder, CommandCode, ProtectionMessage, ProtectionRequest,
};

fn bench_message_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("message_codec");
    group.throughput(Throughput::Elements(1));

    group.bench_function("encode", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let msg = ProtectionMessage::new(CommandCode::RequestBufferReady, black_box(i));
            i = i.wrapping_add(1);
            black_box(msg.as_bytes()[0])
        });
    });

    group.bench_function("decode", |b| {
        let msg = ProtectionMessage::new(CommandCode::RequestBufferReady, 0x1000);
        let bytes = msg.as_bytes().to_vec();
        b.iter(|| {
            let decoded = ProtectionMessage::from_bytes(black_box(&bytes)).unwrap();
            black_box(decoded.buffer_address)
        });
    });

    group.finish();
}

fn bench_batch_codec(c: &mut Criterion) {
    const BATCH: usize = 32;

    let mut group = c.benchmark_group("batch_codec");
    group.throughput(Throughput::Elements(BATCH as u64));

    group.bench_function("encode_32", |b| {
        let mut encoder = BatchEncoder::new(BATCH);
        b.iter(|| {
            encoder.reset();
            for id in 0..BATCH as u32 {
                encoder.push(&ProtectionRequest::ensure_conservative_reporting(
                    black_box(id),
                    0x1000,
                    64,
                ));
            }
            black_box(encoder.finish().len())
        });
    });

    group.bench_function("decode_32", |b| {
        let mut encoder = BatchEncoder::new(BATCH);
        for id in 0..BATCH as u32 {
            encoder.push(&ProtectionRequest::ensure_conservative_reporting(id, 0x1000, 64));
        }
        let bytes = encoder.finish().to_vec();

        b.iter(|| {
            let decoder = BatchDecoder::new(black_box(&bytes)).unwrap();
            let mut sum = 0u64;
            for request in decoder {
                sum = sum.wrapping_add(request.address);
            }
            black_box(sum)
        });
    });

    group.finish();
}

criterion_group!(benches, bench_message_codec, bench_batch_codec);
criterion_main!(benches);
