//! Session Loopback Test - producer dan consumer end-to-end
//!
//! Endpoint dijalankan di thread test via poll_once supaya stats dan
//! tracker bisa diperiksa di antara iterasi; producer berjalan di
//! thread terpisah lewat TCP localhost dan shared buffer file.
//!
//! Usage:
//!   cargo test --test session_loopback

use std::io::Write;
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

use aegis::core::SharedBuffer;
use aegis::protocol::{
    BatchEncoder, CommandCode, ProtectionMessage, ProtectionRequest, MAX_REQUESTS_PER_BATCH,
};
use aegis::session::{DebuggerEndpoint, ProtectedRegion, ProtocolError, RuntimeProducer};

const STORAGE_CAPACITY: usize = 1 << 20;
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

fn bind_endpoint(storage: &str) -> (DebuggerEndpoint, SocketAddr) {
    std::fs::remove_file(storage).ok(); // state lama dari run sebelumnya

    let any: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let endpoint = DebuggerEndpoint::bind(any, storage, STORAGE_CAPACITY).unwrap();
    let addr = endpoint.local_addr().unwrap();
    (endpoint, addr)
}

/// Poll endpoint sampai predicate terpenuhi atau timeout.
fn pump_until<F: Fn(&DebuggerEndpoint) -> bool>(endpoint: &mut DebuggerEndpoint, done: F) {
    let deadline = Instant::now() + TEST_TIMEOUT;
    while !done(endpoint) {
        assert!(Instant::now() < deadline, "test timed out waiting for endpoint");
        endpoint.poll_once(Some(Duration::from_millis(5))).unwrap();
    }
}

#[test]
fn test_full_session_roundtrip() {
    let storage = "test_session_roundtrip.dat";
    let (mut endpoint, addr) = bind_endpoint(storage);

    // Handle 500 dibuat debugger out-of-band; runtime akan melepasnya
    endpoint.tracker.register_handle(500);

    let storage_owned = storage.to_string();
    let producer = thread::spawn(move || {
        let mut producer =
            RuntimeProducer::connect(addr, &storage_owned, STORAGE_CAPACITY, 64).unwrap();

        // Batch 1: dua ensure, satu remove, satu remove-handle
        producer.ensure_conservative_reporting(1, 0x1000, 64).unwrap();
        producer.ensure_conservative_reporting(2, 0x2000, 128).unwrap();
        producer.remove_conservative_reporting(2).unwrap();
        producer.remove_handle(500).unwrap();
        let offset = producer.flush().unwrap();
        assert!(offset.is_some());

        // Batch 2: satu request dengan kind unrecognized - harus di-skip
        let mut bogus = ProtectionRequest::remove_handle(9);
        bogus.kind = 0x7777;
        producer.stage(bogus).unwrap();
        producer.flush().unwrap();

        // Announce conservative reporting buffer
        producer.announce_reporting_buffer(4096).unwrap();
    });

    pump_until(&mut endpoint, |e| {
        e.stats.messages_received.load(Ordering::Relaxed) >= 3
            && e.stats.requests_applied.load(Ordering::Relaxed) >= 4
    });
    producer.join().unwrap();

    // Region 1 masih dilindungi, region 2 sudah dihapus
    assert_eq!(
        endpoint.tracker.region(1),
        Some(&ProtectedRegion {
            address: 0x1000,
            size: 64
        })
    );
    assert_eq!(endpoint.tracker.region(2), None);
    assert_eq!(endpoint.tracker.region_count(), 1);

    // Handle 500 sudah dilepas
    assert!(!endpoint.tracker.is_handle_live(500));

    // Reporting buffer tercatat
    assert!(endpoint.tracker.reporting_buffer().is_some());

    // Request bogus di-skip, bukan fatal
    assert_eq!(endpoint.stats.unrecognized_requests.load(Ordering::Relaxed), 1);
    assert_eq!(endpoint.stats.requests_applied.load(Ordering::Relaxed), 4);
    assert_eq!(endpoint.stats.unrecognized_messages.load(Ordering::Relaxed), 0);

    std::fs::remove_file(storage).ok();
}

#[test]
fn test_unrecognized_message_is_dropped_not_fatal() {
    let storage = "test_session_unrecognized.dat";
    let (mut endpoint, addr) = bind_endpoint(storage);

    let sender = thread::spawn(move || {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.set_nodelay(true).unwrap();

        // Message dengan command code di luar set yang dikenal
        let unknown = ProtectionMessage {
            command_code: 7,
            unused: 0xFFFF_FFFF, // don't-care, tidak boleh mempengaruhi apa pun
            buffer_address: 0xDEAD,
        };
        stream.write_all(unknown.as_bytes()).unwrap();

        // Frame valid dikirim terpotong untuk menguji reassembly parsial
        let valid =
            ProtectionMessage::new(CommandCode::ConservativeReportingBufferReady, 0x800);
        let bytes = valid.as_bytes();
        stream.write_all(&bytes[..10]).unwrap();
        stream.flush().unwrap();
        thread::sleep(Duration::from_millis(50));
        stream.write_all(&bytes[10..]).unwrap();
        stream.flush().unwrap();

        // Tahan koneksi sampai consumer selesai membaca
        thread::sleep(Duration::from_millis(200));
    });

    pump_until(&mut endpoint, |e| {
        e.stats.messages_received.load(Ordering::Relaxed) >= 2
    });
    sender.join().unwrap();

    // Message unknown di-drop, session tetap memproses frame berikutnya
    assert_eq!(endpoint.stats.unrecognized_messages.load(Ordering::Relaxed), 1);
    assert_eq!(endpoint.tracker.reporting_buffer(), Some(0x800));

    std::fs::remove_file(storage).ok();
}

#[test]
fn test_bad_batch_offset_is_dropped_not_fatal() {
    let storage = "test_session_bad_offset.dat";
    let (mut endpoint, addr) = bind_endpoint(storage);

    let storage_owned = storage.to_string();
    let sender = thread::spawn(move || {
        let mut shared = SharedBuffer::open(&storage_owned, STORAGE_CAPACITY).unwrap();
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.set_nodelay(true).unwrap();

        // Notifikasi menunjuk keluar dari data area
        let bogus = ProtectionMessage::new(
            CommandCode::RequestBufferReady,
            (STORAGE_CAPACITY as u64) * 2,
        );
        stream.write_all(bogus.as_bytes()).unwrap();

        // Batch dengan count korup di dalam buffer
        let mut corrupt = [0u8; 8];
        corrupt[0..4].copy_from_slice(&u32::MAX.to_le_bytes());
        let corrupt_offset = shared.publish(&corrupt).unwrap();
        let notify = ProtectionMessage::new(CommandCode::RequestBufferReady, corrupt_offset);
        stream.write_all(notify.as_bytes()).unwrap();

        // Batch valid setelahnya harus tetap diproses
        let mut encoder = BatchEncoder::new(4);
        encoder.push(&ProtectionRequest::ensure_conservative_reporting(11, 0x9000, 32));
        let offset = shared.publish(encoder.finish()).unwrap();
        let notify = ProtectionMessage::new(CommandCode::RequestBufferReady, offset);
        stream.write_all(notify.as_bytes()).unwrap();
        stream.flush().unwrap();

        // Tahan koneksi sampai consumer selesai membaca
        thread::sleep(Duration::from_millis(200));
    });

    pump_until(&mut endpoint, |e| {
        e.stats.messages_received.load(Ordering::Relaxed) >= 3
            && e.stats.requests_applied.load(Ordering::Relaxed) >= 1
    });
    sender.join().unwrap();

    // Dua batch rusak di-drop, session jalan terus
    assert_eq!(endpoint.stats.batches_dropped.load(Ordering::Relaxed), 2);
    assert_eq!(
        endpoint.tracker.region(11),
        Some(&ProtectedRegion {
            address: 0x9000,
            size: 32
        })
    );
    assert_eq!(endpoint.stats.requests_applied.load(Ordering::Relaxed), 1);

    std::fs::remove_file(storage).ok();
}

#[test]
fn test_batch_full_reports_effective_capacity() {
    let storage = "test_session_clamp.dat";
    let (_endpoint, addr) = bind_endpoint(storage);

    // Minta kapasitas di atas batas - encoder meng-clamp
    let mut producer = RuntimeProducer::connect(
        addr,
        storage,
        STORAGE_CAPACITY,
        MAX_REQUESTS_PER_BATCH + 8,
    )
    .unwrap();

    for id in 0..MAX_REQUESTS_PER_BATCH as u32 {
        producer.remove_handle(id).unwrap();
    }

    // Error melaporkan kapasitas efektif, bukan yang diminta caller
    match producer.remove_handle(u32::MAX) {
        Err(ProtocolError::BatchFull { capacity }) => {
            assert_eq!(capacity, MAX_REQUESTS_PER_BATCH);
        }
        other => panic!("expected BatchFull, got {:?}", other),
    }

    std::fs::remove_file(storage).ok();
}

#[test]
fn test_staging_past_batch_capacity_fails_cleanly() {
    let storage = "test_session_overflow.dat";
    let (_endpoint, addr) = bind_endpoint(storage);

    let mut producer = RuntimeProducer::connect(addr, storage, STORAGE_CAPACITY, 16).unwrap();

    // Encoder penuh setelah kapasitas batch tercapai
    for id in 0..16 {
        producer.remove_handle(id).unwrap();
    }
    assert!(producer.remove_handle(99).is_err());

    // Flush mengosongkan batch sehingga staging bisa lanjut
    producer.flush().unwrap();
    producer.remove_handle(99).unwrap();

    std::fs::remove_file(storage).ok();
}
