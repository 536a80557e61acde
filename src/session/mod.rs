//! Session Layer: producer/consumer di atas wire format
//!
//! - `RuntimeProducer`: sisi runtime, stage request lalu kirim notifikasi
//! - `DebuggerEndpoint`: sisi debugger, poll loop + dispatch per command code
//! - `ProtocolError`: taxonomy error; unrecognized message/request non-fatal

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

mod consumer;
mod producer;

pub use consumer::{DebuggerEndpoint, ProtectedRegion, ProtectionTracker};
pub use producer::RuntimeProducer;

#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Command code di luar set yang dikenal. Non-fatal: message di-drop.
    #[error("unrecognized command code {0}, message dropped")]
    UnrecognizedMessage(u32),
    /// Request kind di luar set yang dikenal. Non-fatal: request di-skip.
    #[error("unrecognized request kind {0}, request skipped")]
    UnrecognizedRequest(u16),
    /// Batch header mengklaim lebih banyak record daripada yang terbaca.
    #[error("request batch at offset {offset:#x} is truncated or corrupt")]
    TruncatedBatch { offset: u64 },
    /// Batch tidak muat di shared buffer.
    #[error("batch of {len} bytes does not fit shared buffer")]
    BufferFull { len: usize },
    /// Encoder batch penuh sebelum flush.
    #[error("batch encoder full ({capacity} requests), flush required")]
    BatchFull { capacity: usize },
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Statistik session - atomic counters, bisa dibaca dari thread lain.
#[derive(Default)]
pub struct SessionStats {
    pub messages_received: AtomicU64,
    pub requests_applied: AtomicU64,
    pub unrecognized_messages: AtomicU64,
    pub unrecognized_requests: AtomicU64,
    pub batches_dropped: AtomicU64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log ringkasan lewat `log` (dipanggil periodik oleh binary).
    pub fn log_summary(&self) {
        log::info!(
            "session stats: {} messages, {} requests applied, {} unrecognized messages, {} unrecognized requests, {} batches dropped",
            self.messages_received.load(Ordering::Relaxed),
            self.requests_applied.load(Ordering::Relaxed),
            self.unrecognized_messages.load(Ordering::Relaxed),
            self.unrecognized_requests.load(Ordering::Relaxed),
            self.batches_dropped.load(Ordering::Relaxed),
        );
    }
}
