//! Aegis - GC Protection Message Channel
//!
//! Binary default: micro-benchmark lokal untuk codec dan shared buffer.
//! Untuk session sungguhan lihat bin aegis_debugger (consumer) dan
//! aegis_runtime (producer).

use aegis::core::SharedBuffer;
use aegis::protocol::{
    BatchDecoder, BatchEncoder, CommandCode, ProtectionMessage, ProtectionRequest,
};
use std::time::Instant;

fn main() {
    println!("🛡️  Aegis GC Protection Channel - self check");
    println!("============================================\n");

    benchmark_codec();
    benchmark_shared_buffer();

    println!("\n✅ All benchmarks complete!");
    println!("\nTo start the debugger endpoint: cargo run --release --bin aegis_debugger");
}

fn benchmark_codec() {
    println!("📊 Codec Benchmark (16-byte records)");
    println!("------------------------------------");

    const ITERATIONS: usize = 1_000_000;

    // Message encode/decode
    let start = Instant::now();
    let mut checksum = 0u64;
    for i in 0..ITERATIONS {
        let msg = ProtectionMessage::new(CommandCode::RequestBufferReady, i as u64);
        let decoded = ProtectionMessage::from_bytes(msg.as_bytes()).unwrap();
        checksum = checksum.wrapping_add(decoded.buffer_address);
    }
    let msg_duration = start.elapsed();

    // Batch encode/decode (32 requests per batch)
    let mut encoder = BatchEncoder::new(32);
    let start = Instant::now();
    let mut applied = 0usize;
    for i in 0..(ITERATIONS / 32) {
        encoder.reset();
        for j in 0..32u32 {
            encoder.push(&ProtectionRequest::ensure_conservative_reporting(
                j,
                (i * 32 + j as usize) as u64,
                64,
            ));
        }
        let decoder = BatchDecoder::new(encoder.finish()).unwrap();
        applied += decoder.count();
    }
    let batch_duration = start.elapsed();

    let msg_ns = msg_duration.as_nanos() as f64 / ITERATIONS as f64;
    let req_ns = batch_duration.as_nanos() as f64 / applied as f64;

    println!("  Message roundtrip: {:.2} ns/op (checksum {})", msg_ns, checksum);
    println!("  Request in batch:  {:.2} ns/op ({} requests)\n", req_ns, applied);
}

fn benchmark_shared_buffer() {
    println!("📊 Shared Buffer Benchmark (mmap publish/slice)");
    println!("-----------------------------------------------");

    const ITERATIONS: usize = 100_000;

    let path = "aegis_bench.dat";
    let mut buffer = SharedBuffer::open(path, 16 * 1024 * 1024).unwrap();

    let mut encoder = BatchEncoder::new(32);
    for i in 0..32u32 {
        encoder.push(&ProtectionRequest::ensure_conservative_reporting(i, 0x1000, 64));
    }
    let batch = encoder.finish().to_vec();

    let start = Instant::now();
    let mut last_offset = 0u64;
    for _ in 0..ITERATIONS {
        if let Some(offset) = buffer.publish(&batch) {
            last_offset = offset;
        }
    }
    let publish_duration = start.elapsed();

    let start = Instant::now();
    for _ in 0..ITERATIONS {
        buffer.slice(last_offset, batch.len());
    }
    let slice_duration = start.elapsed();

    let publish_ns = publish_duration.as_nanos() as f64 / ITERATIONS as f64;
    let slice_ns = slice_duration.as_nanos() as f64 / ITERATIONS as f64;

    println!("  Batch size: {} bytes (32 requests)", batch.len());
    println!("  Publish latency: {:.2} ns/op", publish_ns);
    println!("  Slice latency:   {:.2} ns/op\n", slice_ns);

    std::fs::remove_file(path).ok();
}
